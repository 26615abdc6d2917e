//! `SeaORM` Entity for the onec_delivery_log table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "onec_delivery_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub integration_id: String,
    pub account_name: String,
    pub inn: Option<String>,
    pub supply_id: String,
    pub wild_code: String,
    pub order_id: i64,
    pub nm_id: Option<i64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub price: Option<f64>,
    pub count: i32,
    pub status: String,
    pub sent_at: DateTimeWithTimeZone,
    pub response_data: Option<Json>,
    pub error_details: Option<Json>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
