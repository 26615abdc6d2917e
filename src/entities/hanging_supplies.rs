//! `SeaORM` Entity for the hanging_supplies table
//!
//! Hanging supplies are virtual supplies that get pushed into delivery even
//! when the product is not physically present. `order_data` holds the order
//! snapshot, `shipped_orders` the fictitious dispatches, `changes_log` the
//! append-only reconciliation diff.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hanging_supplies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub supply_id: String,
    pub account: String,
    pub order_data: Json,
    pub shipped_orders: Json,
    pub changes_log: Json,
    pub is_fictitious_delivered: bool,
    pub fictitious_delivered_at: Option<DateTimeWithTimeZone>,
    pub fictitious_delivery_operator: Option<String>,
    pub operator: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
