use crate::models::entities::enum_types::CardNetwork;
use chrono::{DateTime, Utc};
use diesel::{Associations, Identifiable, Insertable, Queryable};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = crate::schema::credit_cards)]
#[diesel(belongs_to(crate::models::entities::user::User))]
pub struct CreditCard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub last4: String,
    pub network: CardNetwork,
    pub issuer: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::credit_cards)]
pub struct NewCreditCard<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub last4: &'a str,
    pub network: CardNetwork,
    pub issuer: &'a str,
    pub is_active: bool,
}
