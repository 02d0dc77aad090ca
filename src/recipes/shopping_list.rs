use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::repo_types::CartLine;
use crate::{error::ApiError, state::AppState, users::services as users};

pub const FILE_NAME: &str = "ShoppingList.txt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

/// Merges cart lines by ingredient name.
///
/// Lines are grouped by the name string alone, so two ingredients that share
/// a name but not a unit end up in one group. The unit of a group is the one
/// of its first line and groups keep first-seen order.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingListItem>
where
    I: IntoIterator<Item = CartLine>,
{
    let mut items: Vec<ShoppingListItem> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in lines {
        match index.get(&line.name) {
            Some(&i) => items[i].total_amount += i64::from(line.amount),
            None => {
                index.insert(line.name.clone(), items.len());
                items.push(ShoppingListItem {
                    name: line.name,
                    measurement_unit: line.measurement_unit,
                    total_amount: i64::from(line.amount),
                });
            }
        }
    }
    items
}

/// Plain-text export: `- {name}: {amount} {unit}` per line.
pub fn render(items: &[ShoppingListItem]) -> String {
    let mut out = String::new();
    for item in items {
        let _ = writeln!(
            out,
            "- {}: {} {}",
            item.name, item.total_amount, item.measurement_unit
        );
    }
    out
}

pub async fn build(st: &AppState, user_id: Uuid) -> Result<Vec<ShoppingListItem>, ApiError> {
    users::current_user(st, user_id).await?;
    let lines = st.recipes.cart_lines(user_id).await?;
    debug!(user_id = %user_id, lines = lines.len(), "aggregating shopping list");
    Ok(aggregate(lines))
}
