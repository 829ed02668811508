use std::env;
use std::io::{stdout, IsTerminal};
use tracing_subscriber::EnvFilter;

/// Cardwatch's own crates default to info while chatty HTTP internals stay
/// at warn; the pipeline's structured fields (rule_id, txn_id,
/// notification_id) are what operators grep for, so non-TTY output is JSON
/// with the current span attached.
const DEFAULT_DIRECTIVES: &str =
    "info,cardwatch=info,cardwatch_core=info,cardwatch_api=info,hyper=warn,tower_http=warn";

pub fn setup_logging() {
    let is_terminal = IsTerminal::is_terminal(&stdout());
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    if is_terminal {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(true)
            .with_target(true)
            .compact()
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_current_span(true)
            .flatten_event(true)
            .init();
    }
    tracing::info!(
        filter = %env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_DIRECTIVES.to_string()),
        "Cardwatch logging initialized"
    );
}
