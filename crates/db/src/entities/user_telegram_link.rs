//! User to Telegram chat link entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Links a user to their Telegram chat. Unique both ways.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_telegram_link")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,

    /// Telegram chat identifier.
    #[sea_orm(unique)]
    pub telegram_chat_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
