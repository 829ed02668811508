use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

use crate::clients::{EmailClient, EmbedderClient, LlmClient, TokenBucket, WebhookClient};
use crate::fx::FxTable;
use crate::orchestrator::queue::{EvalQueue, WorkQueue};
use eyre::Result;
pub use cardwatch_primitives::models::app_config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub http_client: Client,
    pub config: AppConfig,
    pub llm: LlmClient,
    pub embedder: EmbedderClient,
    pub email: EmailClient,
    pub webhook: WebhookClient,
    pub fx: FxTable,
    pub eval_queue: Arc<EvalQueue>,
    pub dispatch_queue: Arc<WorkQueue<Uuid>>,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig) -> Result<Arc<Self>> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        // One bucket per upstream so a chatty compiler cannot starve the
        // embedder and vice versa.
        let llm_bucket = Arc::new(TokenBucket::new(4, 2.0));
        let embed_bucket = Arc::new(TokenBucket::new(8, 4.0));

        let llm = LlmClient::from_config(&config.llm, http.clone(), llm_bucket);
        let embedder = EmbedderClient::from_config(&config.embedder, http.clone(), embed_bucket);

        let email = EmailClient::new();
        let webhook = WebhookClient::new(http.clone(), config.dispatch.webhook_timeout_secs);

        let fx = match FxTable::load(&config.fx_table_path) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    "FX table unavailable ({}); only same-currency conversions will work",
                    e
                );
                FxTable::usd_only()
            }
        };

        let eval_queue = Arc::new(EvalQueue::new(config.eval.queue_max));
        let dispatch_queue = Arc::new(WorkQueue::new(config.eval.queue_max * 4));

        Ok(Arc::new(Self {
            db,
            http_client: http,
            config,
            llm,
            embedder,
            email,
            webhook,
            fx,
            eval_queue,
            dispatch_queue,
        }))
    }
}
