//! Behavioural analysis over a user's transaction history.
//!
//! Everything here is a pure read: the same inputs always produce the same
//! outputs and nothing is ever written back. Computations are bounded by the
//! window they are asked about.

pub mod geocode;

use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{BaselineKind, Transaction, TxnStatus, User};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::repositories::TransactionRepository;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Beyond this distance from the last known position a transaction is
/// flagged even when the travel time would be plausible.
const DISTANT_KM: f64 = 500.0;

/// Extra slack on a declared recurring interval to absorb billing-cycle
/// wobble.
pub const RECURRING_BUFFER_DAYS: i64 = 5;

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_KM
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationRisk {
    None,
    OutOfHomeState,
    DistantFromLastKnown,
    ImpossibleTravel,
}

/// Categorical location risk for a transaction. App-reported coordinates
/// are only consulted when the user consented; merchant state vs home state
/// needs no consent.
pub fn location_risk(user: &User, txn: &Transaction, max_kmh: f64) -> LocationRisk {
    if let (Some((txn_lat, txn_lon)), Some((last_lat, last_lon, last_at))) =
        (txn.coords(), user.consented_last_known())
    {
        if validate_coordinates(txn_lat, txn_lon) && validate_coordinates(last_lat, last_lon) {
            let distance_km = haversine_km(last_lat, last_lon, txn_lat, txn_lon);
            let elapsed_hours =
                (txn.occurred_at - last_at).num_seconds().max(0) as f64 / 3600.0;

            // Zero elapsed time with real displacement is as impossible as
            // any speed.
            if distance_km > 1.0 && (elapsed_hours == 0.0 || distance_km / elapsed_hours > max_kmh)
            {
                return LocationRisk::ImpossibleTravel;
            }
            if distance_km > DISTANT_KM {
                return LocationRisk::DistantFromLastKnown;
            }
        }
    }

    if let (Some(merchant_state), Some(home_state)) =
        (txn.merchant_state.as_deref(), user.home_state.as_deref())
    {
        if !merchant_state.eq_ignore_ascii_case(home_state) {
            return LocationRisk::OutOfHomeState;
        }
    }

    LocationRisk::None
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn settled_amounts(
    txns: &[Transaction],
    category: Option<&str>,
    merchant: Option<&str>,
) -> Vec<f64> {
    txns.iter()
        .filter(|t| t.status != TxnStatus::Declined && t.status != TxnStatus::Refunded)
        .filter(|t| {
            category
                .map(|c| t.merchant_category.eq_ignore_ascii_case(c))
                .unwrap_or(true)
        })
        .filter(|t| {
            merchant
                .map(|m| t.merchant_name.to_lowercase().contains(&m.to_lowercase()))
                .unwrap_or(true)
        })
        .map(|t| t.amount_cents as f64)
        .collect()
}

/// AVG/MEDIAN/LAST_N spend (in cents) over a window ending just before
/// `before`, filtered by category and/or merchant. None when there is no
/// qualifying history.
#[allow(clippy::too_many_arguments)]
pub fn baseline(
    conn: &mut PgConnection,
    user_id: Uuid,
    metric: BaselineKind,
    category: Option<&str>,
    merchant: Option<&str>,
    window_days: i64,
    before: DateTime<Utc>,
) -> Result<Option<f64>, ApiError> {
    let window_start = before - Duration::days(window_days);
    let txns = TransactionRepository::window_for_user(conn, user_id, window_start, before)?;
    let mut amounts = settled_amounts(&txns, category, merchant);

    let value = match metric {
        BaselineKind::Avg => {
            if amounts.is_empty() {
                None
            } else {
                Some(amounts.iter().sum::<f64>() / amounts.len() as f64)
            }
        }
        BaselineKind::Median => median(&mut amounts),
        BaselineKind::LastN | BaselineKind::SameMerchantLastN => {
            // amounts are window-ordered ascending by occurred_at; take the
            // most recent N = 5 and average them.
            let n = 5.min(amounts.len());
            if n == 0 {
                None
            } else {
                let tail = &amounts[amounts.len() - n..];
                Some(tail.iter().sum::<f64>() / n as f64)
            }
        }
    };
    Ok(value)
}

/// Ratio of a transaction's amount to the rolling 30-day median of
/// same-category spend. 0.0 when there is no history to compare against.
pub fn anomaly_score(conn: &mut PgConnection, txn: &Transaction) -> Result<f64, ApiError> {
    let base = baseline(
        conn,
        txn.user_id,
        BaselineKind::Median,
        Some(&txn.merchant_category),
        None,
        30,
        txn.occurred_at,
    )?;
    Ok(match base {
        Some(median) if median > 0.0 => (txn.amount_cents as f64 / median).max(0.0),
        _ => 0.0,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringSeries {
    pub merchant: String,
    pub period_days: f64,
    pub expected_amount_cents: f64,
    pub observations: usize,
    pub last_seen: DateTime<Utc>,
}

impl RecurringSeries {
    /// Percent drift of an observed charge against the expected amount.
    pub fn drift_pct(&self, amount_cents: i64) -> f64 {
        if self.expected_amount_cents <= 0.0 {
            return 0.0;
        }
        ((amount_cents as f64 - self.expected_amount_cents).abs() / self.expected_amount_cents)
            * 100.0
    }

    /// Whether a charge at `at` fits the series cadence, within the billing
    /// buffer.
    pub fn on_schedule(&self, at: DateTime<Utc>) -> bool {
        let gap_days = (at - self.last_seen).num_days() as f64;
        (gap_days - self.period_days).abs() <= RECURRING_BUFFER_DAYS as f64
    }
}

/// Best-fit recurring series for a merchant: median gap between consecutive
/// charges and median amount. Needs at least three observations to call
/// something a series.
pub fn recurring_series(
    conn: &mut PgConnection,
    user_id: Uuid,
    merchant: &str,
) -> Result<Option<RecurringSeries>, ApiError> {
    let mut txns =
        TransactionRepository::for_merchant(conn, user_id, &merchant.to_lowercase(), 50)?;
    txns.retain(|t| t.status != TxnStatus::Declined);
    if txns.len() < 3 {
        return Ok(None);
    }
    txns.sort_by_key(|t| t.occurred_at);

    let mut gaps: Vec<f64> = txns
        .windows(2)
        .map(|w| (w[1].occurred_at - w[0].occurred_at).num_hours() as f64 / 24.0)
        .collect();
    let mut amounts: Vec<f64> = txns.iter().map(|t| t.amount_cents as f64).collect();

    let (Some(period_days), Some(expected)) = (median(&mut gaps), median(&mut amounts)) else {
        return Ok(None);
    };
    if period_days <= 0.0 {
        return Ok(None);
    }

    Ok(Some(RecurringSeries {
        merchant: merchant.to_string(),
        period_days,
        expected_amount_cents: expected,
        observations: txns.len(),
        last_seen: txns.last().map(|t| t.occurred_at).unwrap_or_else(Utc::now),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardwatch_primitives::models::CurrencyCode;

    fn user_at(lat: f64, lon: f64, at: DateTime<Utc>, consent: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "u@example.com".into(),
            home_city: Some("San Francisco".into()),
            home_state: Some("CA".into()),
            home_country: Some("US".into()),
            home_latitude: Some(37.77),
            home_longitude: Some(-122.42),
            timezone: "America/Los_Angeles".into(),
            credit_limit_cents: 1_500_000,
            current_balance_cents: 0,
            location_consent: consent,
            last_known_latitude: Some(lat),
            last_known_longitude: Some(lon),
            last_known_at: Some(at),
            webhook_url: None,
            webhook_secret: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn txn_at(
        lat: Option<f64>,
        lon: Option<f64>,
        state: Option<&str>,
        at: DateTime<Utc>,
    ) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            card_id: Uuid::new_v4(),
            amount_cents: 10_000,
            currency: CurrencyCode::USD,
            merchant_name: "ACME".into(),
            merchant_category: "shopping".into(),
            merchant_city: None,
            merchant_state: state.map(|s| s.to_string()),
            merchant_country: Some("US".into()),
            merchant_latitude: lat,
            merchant_longitude: lon,
            occurred_at: at,
            status: TxnStatus::Approved,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn haversine_sf_to_boston() {
        let km = haversine_km(37.77, -122.42, 42.36, -71.06);
        assert!((km - 4340.0).abs() < 50.0, "got {}", km);
    }

    #[test]
    fn sf_to_boston_in_thirty_minutes_is_impossible() {
        let t0 = Utc::now();
        let user = user_at(37.77, -122.42, t0, true);
        let txn = txn_at(
            Some(42.36),
            Some(-71.06),
            Some("MA"),
            t0 + Duration::minutes(30),
        );
        assert_eq!(location_risk(&user, &txn, 800.0), LocationRisk::ImpossibleTravel);
    }

    #[test]
    fn no_consent_falls_back_to_state_comparison() {
        let t0 = Utc::now();
        let user = user_at(37.77, -122.42, t0, false);
        let txn = txn_at(None, None, Some("NY"), t0 + Duration::minutes(30));
        assert_eq!(location_risk(&user, &txn, 800.0), LocationRisk::OutOfHomeState);
    }

    #[test]
    fn same_state_without_coords_is_no_risk() {
        let t0 = Utc::now();
        let user = user_at(37.77, -122.42, t0, false);
        let txn = txn_at(None, None, Some("ca"), t0 + Duration::hours(1));
        assert_eq!(location_risk(&user, &txn, 800.0), LocationRisk::None);
    }

    #[test]
    fn plausible_travel_far_away_is_distant() {
        let t0 = Utc::now();
        let user = user_at(37.77, -122.42, t0, true);
        // SF -> Boston after a week: slow enough, still far away
        let txn = txn_at(
            Some(42.36),
            Some(-71.06),
            Some("CA"),
            t0 + Duration::days(7),
        );
        assert_eq!(
            location_risk(&user, &txn, 800.0),
            LocationRisk::DistantFromLastKnown
        );
    }

    #[test]
    fn median_of_even_set_averages_midpoints() {
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut [5.0]), Some(5.0));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn drift_pct_is_symmetric() {
        let series = RecurringSeries {
            merchant: "Streamly".into(),
            period_days: 30.0,
            expected_amount_cents: 1_000.0,
            observations: 4,
            last_seen: Utc::now(),
        };
        assert!((series.drift_pct(1_200) - 20.0).abs() < 1e-9);
        assert!((series.drift_pct(800) - 20.0).abs() < 1e-9);
    }
}
