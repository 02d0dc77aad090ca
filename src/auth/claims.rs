use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The identity service mints both kinds; only `access` opens the API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Bearer token payload. `exp`, `iss` and `aud` are checked by
/// `jsonwebtoken` during decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl Claims {
    pub fn opens_api(&self) -> bool {
        self.kind == TokenKind::Access
    }
}
