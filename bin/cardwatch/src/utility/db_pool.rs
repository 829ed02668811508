use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use eyre::Report;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::time::Duration;
use tracing::info;

/// Sizes the pool for Cardwatch's actual consumers: every evaluation worker
/// (cores x 4) can hold a connection for up to the 2s rule-SQL statement
/// timeout, dispatch workers (cores x 2) take short status-update
/// connections, and API handlers plus the compiler's validation runs need
/// headroom on top. `DB_POOL_MAX` overrides the computed size.
pub fn create_db_pool() -> Result<Pool<ConnectionManager<PgConnection>>, Report> {
    let db_url = SecretString::new(Box::from(
        env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
    ));

    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let default_max = (cores * 6 + 8).min(80) as u32;
    let max_size = env::var("DB_POOL_MAX")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default_max);

    let manager = ConnectionManager::<PgConnection>::new(db_url.expose_secret());

    let pool = Pool::builder()
        .max_size(max_size)
        // enough warm connections to absorb a burst of ingested
        // transactions without paying connection setup on the hot path
        .min_idle(Some((max_size / 8).max(2)))
        // rule SQL is capped at 2s; waiting twice that for a connection
        // means the pool is the bottleneck and the caller should see it
        .connection_timeout(Duration::from_secs(4))
        .idle_timeout(Some(Duration::from_secs(120)))
        .max_lifetime(Some(Duration::from_secs(900)))
        .test_on_check_out(true)
        .build(manager)?;

    info!(max_size, "PostgreSQL pool sized for evaluation and dispatch workers");

    Ok(pool)
}
