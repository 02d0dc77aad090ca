use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

pub const USERNAME_MAX_LEN: usize = 150;
pub const NAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;

lazy_static! {
    // Letters, digits and @/./+/-/_ only. `\w` is Unicode-aware.
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty()
        || username.chars().count() > USERNAME_MAX_LEN
        || !USERNAME_RE.is_match(username)
    {
        return Err(ApiError::invalid(
            "Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only.",
        ));
    }
    Ok(())
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    email.len() <= EMAIL_MAX_LEN && EMAIL_RE.is_match(email)
}

pub fn validate_person_name(field: &str, value: &str) -> Result<(), ApiError> {
    let len = value.trim().chars().count();
    if len == 0 || len > NAME_MAX_LEN {
        return Err(ApiError::invalid(format!(
            "{field} must be between 1 and {NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}
