use crate::models::entities::enum_types::TxnStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct IngestTransactionRequest {
    pub user_id: Uuid,
    pub card_id: Uuid,
    /// Amount in major units; refunds use status REFUNDED, never a negative
    /// amount.
    #[validate(range(min = 0.0))]
    pub amount: f64,
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    #[validate(length(min = 1, max = 256))]
    pub merchant_name: String,
    #[validate(length(min = 1, max = 128))]
    pub merchant_category: String,
    pub merchant_city: Option<String>,
    pub merchant_state: Option<String>,
    pub merchant_country: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub coords: Option<Coords>,
    pub status: TxnStatus,
}

impl IngestTransactionRequest {
    pub fn amount_cents(&self) -> i64 {
        (self.amount * 100.0).round() as i64
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestTransactionResponse {
    pub transaction_id: Uuid,
    pub status: String,
}
