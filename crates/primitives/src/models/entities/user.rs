use chrono::{DateTime, Utc};
use diesel::{Identifiable, Insertable, Queryable};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub home_city: Option<String>,
    pub home_state: Option<String>,
    pub home_country: Option<String>,
    pub home_latitude: Option<f64>,
    pub home_longitude: Option<f64>,
    pub timezone: String,
    pub credit_limit_cents: i64,
    pub current_balance_cents: i64,
    pub location_consent: bool,
    pub last_known_latitude: Option<f64>,
    pub last_known_longitude: Option<f64>,
    pub last_known_at: Option<DateTime<Utc>>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// App-reported coordinates are only usable when the user consented to
    /// location tracking.
    pub fn consented_last_known(&self) -> Option<(f64, f64, DateTime<Utc>)> {
        if !self.location_consent {
            return None;
        }
        match (
            self.last_known_latitude,
            self.last_known_longitude,
            self.last_known_at,
        ) {
            (Some(lat), Some(lon), Some(at)) => Some((lat, lon, at)),
            _ => None,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub home_city: Option<&'a str>,
    pub home_state: Option<&'a str>,
    pub home_country: Option<&'a str>,
    pub home_latitude: Option<f64>,
    pub home_longitude: Option<f64>,
    pub timezone: &'a str,
    pub credit_limit_cents: i64,
    pub current_balance_cents: i64,
    pub location_consent: bool,
    pub webhook_url: Option<&'a str>,
    pub webhook_secret: Option<&'a str>,
}
