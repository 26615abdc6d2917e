//! `SeaORM` Entity for the order_status_log table
//!
//! Append-only history of every status an assembly task passed through.
//! Duplicate (order_id, status, supply_id, account) tuples are collapsed by a
//! unique index with NULLS NOT DISTINCT; inserts go through
//! `ON CONFLICT DO NOTHING`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "order_status_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i64,
    pub status: String,
    pub supply_id: Option<String>,
    pub account: String,
    pub operator: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
