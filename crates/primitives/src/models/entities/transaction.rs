use crate::models::entities::enum_types::{CurrencyCode, TxnStatus};
use chrono::{DateTime, Utc};
use diesel::{Associations, Identifiable, Insertable, Queryable};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(belongs_to(crate::models::entities::user::User))]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_id: Uuid,
    pub amount_cents: i64,
    pub currency: CurrencyCode,
    pub merchant_name: String,
    pub merchant_category: String,
    pub merchant_city: Option<String>,
    pub merchant_state: Option<String>,
    pub merchant_country: Option<String>,
    pub merchant_latitude: Option<f64>,
    pub merchant_longitude: Option<f64>,
    pub occurred_at: DateTime<Utc>,
    pub status: TxnStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.merchant_latitude, self.merchant_longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn amount_dollars(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::transactions)]
pub struct NewTransaction<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_id: Uuid,
    pub amount_cents: i64,
    pub currency: CurrencyCode,
    pub merchant_name: &'a str,
    pub merchant_category: &'a str,
    pub merchant_city: Option<&'a str>,
    pub merchant_state: Option<&'a str>,
    pub merchant_country: Option<&'a str>,
    pub merchant_latitude: Option<f64>,
    pub merchant_longitude: Option<f64>,
    pub occurred_at: DateTime<Utc>,
    pub status: TxnStatus,
}
