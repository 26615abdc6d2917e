//! `SeaORM` Entity for the final_supplies table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "final_supplies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub supply_id: String,
    pub account: String,
    pub supply_name: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
