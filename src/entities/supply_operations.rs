//! `SeaORM` Entity for the supply_operations table
//!
//! Operation state persistence: one row per operation id, written at start
//! (PROCESSING) and finished as SUCCESS/FAILED with the response payload.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supply_operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub operation_id: String,
    pub operator: Option<String>,
    pub request_payload: Json,
    pub response_data: Option<Json>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
