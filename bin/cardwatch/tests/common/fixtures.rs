#![allow(dead_code)]

use cardwatch_core::repositories::{CardRepository, TransactionRepository, UserRepository};
use cardwatch_primitives::models::{
    CardNetwork, CreditCard, CurrencyCode, NewCreditCard, NewTransaction, NewUser, Transaction,
    TxnStatus, User,
};
use chrono::{DateTime, Duration, Utc};
use diesel::PgConnection;
use uuid::Uuid;

pub struct UserFixture<'a> {
    pub email: &'a str,
    pub home_state: Option<&'a str>,
    pub location_consent: bool,
    pub webhook_url: Option<&'a str>,
    pub webhook_secret: Option<&'a str>,
}

impl Default for UserFixture<'_> {
    fn default() -> Self {
        Self {
            email: "user@example.com",
            home_state: Some("CA"),
            location_consent: false,
            webhook_url: None,
            webhook_secret: None,
        }
    }
}

pub fn seed_user(conn: &mut PgConnection, fixture: UserFixture) -> User {
    let unique_email = format!("{}_{}", Uuid::new_v4(), fixture.email);
    UserRepository::upsert(
        conn,
        NewUser {
            id: Uuid::new_v4(),
            email: &unique_email,
            home_city: Some("San Francisco"),
            home_state: fixture.home_state,
            home_country: Some("US"),
            home_latitude: Some(37.7749),
            home_longitude: Some(-122.4194),
            timezone: "America/Los_Angeles",
            credit_limit_cents: 1_500_000,
            current_balance_cents: 0,
            location_consent: fixture.location_consent,
            webhook_url: fixture.webhook_url,
            webhook_secret: fixture.webhook_secret,
        },
    )
    .expect("seed user")
}

pub fn set_last_known(
    conn: &mut PgConnection,
    user_id: Uuid,
    lat: f64,
    lon: f64,
    at: DateTime<Utc>,
) {
    UserRepository::advance_last_known(conn, user_id, lat, lon, at).expect("set last known");
}

pub fn seed_card(conn: &mut PgConnection, user_id: Uuid) -> CreditCard {
    CardRepository::insert(
        conn,
        NewCreditCard {
            id: Uuid::new_v4(),
            user_id,
            last4: "4242",
            network: CardNetwork::Visa,
            issuer: "Test Bank",
            is_active: true,
        },
    )
    .expect("seed card")
}

pub struct TxnFixture<'a> {
    pub amount_cents: i64,
    pub currency: CurrencyCode,
    pub merchant_name: &'a str,
    pub merchant_category: &'a str,
    pub merchant_state: Option<&'a str>,
    pub coords: Option<(f64, f64)>,
    pub occurred_at: DateTime<Utc>,
    pub status: TxnStatus,
}

impl Default for TxnFixture<'_> {
    fn default() -> Self {
        Self {
            amount_cents: 10_000,
            currency: CurrencyCode::USD,
            merchant_name: "ACME",
            merchant_category: "shopping",
            merchant_state: Some("CA"),
            coords: None,
            occurred_at: Utc::now(),
            status: TxnStatus::Approved,
        }
    }
}

pub fn seed_txn(
    conn: &mut PgConnection,
    user_id: Uuid,
    card_id: Uuid,
    fixture: TxnFixture,
) -> Transaction {
    TransactionRepository::insert(
        conn,
        NewTransaction {
            id: Uuid::new_v4(),
            user_id,
            card_id,
            amount_cents: fixture.amount_cents,
            currency: fixture.currency,
            merchant_name: fixture.merchant_name,
            merchant_category: fixture.merchant_category,
            merchant_city: None,
            merchant_state: fixture.merchant_state,
            merchant_country: Some("US"),
            merchant_latitude: fixture.coords.map(|c| c.0),
            merchant_longitude: fixture.coords.map(|c| c.1),
            occurred_at: fixture.occurred_at,
            status: fixture.status,
        },
    )
    .expect("seed transaction")
}

/// Thirty settled dining transactions averaging $67 across the last month.
pub fn seed_dining_history(conn: &mut PgConnection, user_id: Uuid, card_id: Uuid) {
    for day in 1..=30i64 {
        seed_txn(
            conn,
            user_id,
            card_id,
            TxnFixture {
                amount_cents: 6_700,
                merchant_name: "Luigi's",
                merchant_category: "dining",
                occurred_at: Utc::now() - Duration::days(day),
                status: TxnStatus::Settled,
                ..Default::default()
            },
        );
    }
}
