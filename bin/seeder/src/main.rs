use cardwatch_core::clients::embedder::{EmbedderBackend, EmbedderClient};
use cardwatch_primitives::models::entities::enum_types::{
    CardNetwork, CurrencyCode, TxnStatus,
};
use cardwatch_primitives::models::{
    NewCategorySynonym, NewCreditCard, NewTransaction, NewUser,
};
use cardwatch_primitives::schema::{
    alert_notifications, alert_rules, category_synonyms, credit_cards, transactions, users,
};
use chrono::{Duration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use dotenvy::dotenv;
use std::env;
use uuid::Uuid;

const SYNONYMS: &[(&str, &str)] = &[
    ("dining", "dining"),
    ("restaurants", "dining"),
    ("restaurant", "dining"),
    ("food", "dining"),
    ("eating out", "dining"),
    ("groceries", "groceries"),
    ("grocery", "groceries"),
    ("supermarket", "groceries"),
    ("travel", "travel"),
    ("flights", "travel"),
    ("hotels", "travel"),
    ("electronics", "electronics"),
    ("gadgets", "electronics"),
    ("gas", "gas"),
    ("fuel", "gas"),
    ("entertainment", "entertainment"),
    ("streaming", "entertainment"),
];

fn establish_connection() -> PgConnection {
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgConnection::establish(&database_url)
        .unwrap_or_else(|_| panic!("Error connecting to {}", database_url))
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    println!("Seeding database...");

    let mut conn = establish_connection();

    clean_db(&mut conn);

    let demo_id = seed_user(&mut conn, "demo@cardwatch.dev", "CA", true);
    let traveler_id = seed_user(&mut conn, "traveler@cardwatch.dev", "NY", false);

    let demo_card = seed_card(&mut conn, demo_id, "4242", CardNetwork::Visa);
    let traveler_card = seed_card(&mut conn, traveler_id, "9001", CardNetwork::Amex);

    seed_dining_history(&mut conn, demo_id, demo_card);
    seed_transaction(
        &mut conn,
        traveler_id,
        traveler_card,
        12_999,
        "Delta Air Lines",
        "travel",
        Some("GA"),
        3,
    );

    seed_synonyms(&mut conn).await;

    println!("Database seeded successfully!");
}

fn clean_db(conn: &mut PgConnection) {
    println!("Cleaning database...");
    diesel::delete(alert_notifications::table)
        .execute(conn)
        .expect("Error clearing notifications");
    diesel::delete(alert_rules::table)
        .execute(conn)
        .expect("Error clearing rules");
    diesel::delete(transactions::table)
        .execute(conn)
        .expect("Error clearing transactions");
    diesel::delete(credit_cards::table)
        .execute(conn)
        .expect("Error clearing cards");
    diesel::delete(users::table)
        .execute(conn)
        .expect("Error clearing users");
    diesel::delete(category_synonyms::table)
        .execute(conn)
        .expect("Error clearing synonyms");
}

fn seed_user(conn: &mut PgConnection, email: &str, home_state: &str, consent: bool) -> Uuid {
    let id = Uuid::new_v4();
    diesel::insert_into(users::table)
        .values(&NewUser {
            id,
            email,
            home_city: Some("San Francisco"),
            home_state: Some(home_state),
            home_country: Some("US"),
            home_latitude: Some(37.7749),
            home_longitude: Some(-122.4194),
            timezone: "America/Los_Angeles",
            credit_limit_cents: 1_500_000,
            current_balance_cents: 0,
            location_consent: consent,
            webhook_url: None,
            webhook_secret: None,
        })
        .execute(conn)
        .expect("Error inserting user");
    println!("Created user: {}", email);
    id
}

fn seed_card(conn: &mut PgConnection, user_id: Uuid, last4: &str, network: CardNetwork) -> Uuid {
    let id = Uuid::new_v4();
    diesel::insert_into(credit_cards::table)
        .values(&NewCreditCard {
            id,
            user_id,
            last4,
            network,
            issuer: "Demo Bank",
            is_active: true,
        })
        .execute(conn)
        .expect("Error inserting card");
    id
}

#[allow(clippy::too_many_arguments)]
fn seed_transaction(
    conn: &mut PgConnection,
    user_id: Uuid,
    card_id: Uuid,
    amount_cents: i64,
    merchant: &str,
    category: &str,
    state: Option<&str>,
    days_ago: i64,
) {
    diesel::insert_into(transactions::table)
        .values(&NewTransaction {
            id: Uuid::new_v4(),
            user_id,
            card_id,
            amount_cents,
            currency: CurrencyCode::USD,
            merchant_name: merchant,
            merchant_category: category,
            merchant_city: None,
            merchant_state: state,
            merchant_country: Some("US"),
            merchant_latitude: None,
            merchant_longitude: None,
            occurred_at: Utc::now() - Duration::days(days_ago),
            status: TxnStatus::Settled,
        })
        .execute(conn)
        .expect("Error inserting transaction");
}

/// Thirty days of dining around $67 so percent-delta demos have a baseline.
fn seed_dining_history(conn: &mut PgConnection, user_id: Uuid, card_id: Uuid) {
    let merchants = ["Luigi's", "Taqueria Norte", "Pho 88", "Bistro Lyon"];
    for day in 1..=30 {
        let merchant = merchants[(day as usize) % merchants.len()];
        let amount = 6_700 + ((day * 37) % 900) - 450;
        seed_transaction(
            conn,
            user_id,
            card_id,
            amount,
            merchant,
            "dining",
            Some("CA"),
            day,
        );
    }
    println!("Seeded 30 days of dining history");
}

async fn seed_synonyms(conn: &mut PgConnection) {
    let embedder = EmbedderClient::mock(384);
    let texts: Vec<String> = SYNONYMS.iter().map(|(s, _)| s.to_string()).collect();
    let vectors = embedder
        .embed_batch(&texts)
        .await
        .expect("Mock embedder cannot fail");

    for (&(synonym, canonical), embedding) in SYNONYMS.iter().zip(vectors) {
        diesel::insert_into(category_synonyms::table)
            .values(&NewCategorySynonym {
                id: Uuid::new_v4(),
                synonym,
                canonical,
                embedding,
            })
            .on_conflict(category_synonyms::synonym)
            .do_nothing()
            .execute(conn)
            .expect("Error inserting synonym");
    }
    println!("Seeded {} category synonyms", SYNONYMS.len());
}
