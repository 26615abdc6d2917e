//! `SeaORM` Entity for the order_status_snapshots table
//!
//! Local mirror of WB assembly tasks, one row per (order_id, account).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "order_status_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i64,
    pub nm_id: i64,
    pub converted_price: i32,
    pub account: String,
    pub supplier_status: Option<String>,
    pub wb_status: Option<String>,
    pub created_at: Option<DateTimeWithTimeZone>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
