//! Final supply bookkeeping
//!
//! At most one final supply is "active" per account at a time: the latest
//! record whose supply the marketplace still reports open. A newly created
//! final supply simply supersedes the old record.

use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entities::final_supplies;
use crate::entities::prelude::FinalSupplies;

/// Latest final supply recorded for an account, if any
pub async fn get_latest(
    db: &DatabaseConnection,
    account: &str,
) -> Result<Option<final_supplies::Model>, Box<dyn std::error::Error + Send + Sync>> {
    let record = FinalSupplies::find()
        .filter(final_supplies::Column::Account.eq(account))
        .order_by_desc(final_supplies::Column::CreatedAt)
        .one(db)
        .await?;

    match &record {
        Some(found) => tracing::info!(
            "Latest final supply for account {}: {}",
            account,
            found.supply_id
        ),
        None => tracing::info!("No final supplies recorded for account {}", account),
    }

    Ok(record)
}

pub async fn save(
    db: &DatabaseConnection,
    supply_id: &str,
    account: &str,
    supply_name: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let model = final_supplies::ActiveModel {
        supply_id: Set(supply_id.to_string()),
        account: Set(account.to_string()),
        supply_name: Set(supply_name.to_string()),
        ..Default::default()
    };

    FinalSupplies::insert(model)
        .on_conflict(
            OnConflict::columns([
                final_supplies::Column::SupplyId,
                final_supplies::Column::Account,
            ])
            .update_column(final_supplies::Column::SupplyName)
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::info!(
        "Saved final supply {} ({}) for account {}",
        supply_id,
        supply_name,
        account
    );
    Ok(())
}

/// Builds the final supply name from the source supply name: the technical
/// suffix is stripped and the final marker appended.
pub fn final_supply_name(source_name: &str) -> String {
    let base = source_name
        .strip_suffix("_ТЕХ")
        .or_else(|| source_name.strip_suffix("_TEX"))
        .unwrap_or(source_name);
    format!("{}_ФИНАЛ", base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_name_strips_technical_suffix() {
        assert_eq!(final_supply_name("3 круг 26.10._ТЕХ"), "3 круг 26.10._ФИНАЛ");
        assert_eq!(final_supply_name("round 3_TEX"), "round 3_ФИНАЛ");
    }

    #[test]
    fn test_final_name_without_suffix() {
        assert_eq!(final_supply_name("plain name"), "plain name_ФИНАЛ");
    }
}
