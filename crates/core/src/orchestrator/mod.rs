//! Ingestion boundary and background worker pools.
//!
//! Every accepted transaction is persisted first, then queued for
//! evaluation. Evaluation workers drain the fair per-user queue; each
//! completed evaluation forwards its fresh notification ids to the dispatch
//! pool. Shutdown closes the queues, drains within a deadline, then aborts
//! whatever is left.

pub mod queue;

use crate::app_state::AppState;
use crate::dispatcher::Dispatcher;
use crate::evaluator::RuleEvaluator;
use crate::repositories::{CardRepository, TransactionRepository, UserRepository};
use cardwatch_primitives::models::{
    CurrencyCode, IngestTransactionRequest, IngestTransactionResponse, NewTransaction,
};
use cardwatch_primitives::ApiError;
use queue::EnqueueError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

const STORE_RETRY_ATTEMPTS: u32 = 3;
const STORE_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct Orchestrator {
    eval_handles: Vec<JoinHandle<()>>,
    dispatch_handles: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    /// Accepts one inbound transaction: persist first, then schedule
    /// evaluation. The row is committed before the enqueue, so a 429 on a
    /// full queue never loses the transaction itself.
    pub async fn ingest(
        state: &AppState,
        req: IngestTransactionRequest,
    ) -> Result<IngestTransactionResponse, ApiError> {
        let currency = CurrencyCode::parse(&req.currency)?;

        let txn = {
            let mut conn = state.db.get()?;
            let user = UserRepository::find_by_id(&mut conn, req.user_id)?
                .ok_or_else(|| ApiError::NotFound(format!("User {}", req.user_id)))?;
            CardRepository::find_for_user(&mut conn, req.card_id, req.user_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Card {}", req.card_id)))?;

            let txn = TransactionRepository::insert(
                &mut conn,
                NewTransaction {
                    id: Uuid::new_v4(),
                    user_id: req.user_id,
                    card_id: req.card_id,
                    amount_cents: req.amount_cents(),
                    currency,
                    merchant_name: &req.merchant_name,
                    merchant_category: &req.merchant_category,
                    merchant_city: req.merchant_city.as_deref(),
                    merchant_state: req.merchant_state.as_deref(),
                    merchant_country: req.merchant_country.as_deref(),
                    merchant_latitude: req.coords.as_ref().map(|c| c.lat),
                    merchant_longitude: req.coords.as_ref().map(|c| c.lon),
                    occurred_at: req.occurred_at,
                    status: req.status,
                },
            )?;

            // Location tracking only follows users who opted in.
            if user.location_consent {
                if let Some(coords) = &req.coords {
                    UserRepository::advance_last_known(
                        &mut conn,
                        user.id,
                        coords.lat,
                        coords.lon,
                        req.occurred_at,
                    )?;
                }
            }
            txn
        };

        match state.eval_queue.try_enqueue(txn.user_id, txn.id) {
            Ok(()) => Ok(IngestTransactionResponse {
                transaction_id: txn.id,
                status: "scheduled".to_string(),
            }),
            Err(EnqueueError::Full) => {
                warn!(txn_id = %txn.id, "Evaluation queue full, rejecting ingestion");
                Err(ApiError::QueueFull)
            }
            Err(EnqueueError::Closed) => Err(ApiError::Internal(
                "ingestion is shutting down".to_string(),
            )),
        }
    }

    /// Spawns the evaluation and dispatch pools.
    pub fn spawn(state: Arc<AppState>) -> Self {
        let eval_handles = (0..state.config.eval.workers)
            .map(|worker| {
                let state = state.clone();
                tokio::spawn(async move {
                    eval_worker(state, worker).await;
                })
            })
            .collect();

        let dispatch_handles = (0..state.config.dispatch.workers)
            .map(|worker| {
                let state = state.clone();
                tokio::spawn(async move {
                    dispatch_worker(state, worker).await;
                })
            })
            .collect();

        info!("Orchestrator workers started");
        Self {
            eval_handles,
            dispatch_handles,
        }
    }

    /// Closes the queues and drains within `drain`; whatever is still
    /// in flight afterwards is cancelled.
    pub async fn shutdown(self, state: &AppState, drain: Duration) {
        info!("Draining evaluation queue");
        state.eval_queue.close();
        let deadline = tokio::time::Instant::now() + drain;
        for mut handle in self.eval_handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!("Evaluation worker exceeded drain deadline, cancelling");
                handle.abort();
            }
        }

        info!("Draining dispatch queue");
        state.dispatch_queue.close();
        for mut handle in self.dispatch_handles {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!("Dispatch worker exceeded drain deadline, cancelling");
                handle.abort();
            }
        }
    }
}

async fn eval_worker(state: Arc<AppState>, worker: usize) {
    while let Some((user_id, transaction_id)) = state.eval_queue.pop().await {
        let mut attempt = 0;
        loop {
            match RuleEvaluator::evaluate(&state, transaction_id).await {
                Ok(report) => {
                    for notification_id in report.notifications {
                        if state.dispatch_queue.try_enqueue(notification_id).is_err() {
                            warn!(
                                %notification_id,
                                "Dispatch queue rejected notification; it stays QUEUED for redelivery"
                            );
                        }
                    }
                    break;
                }
                // Store outages are worth a bounded retry; everything else
                // is logged and the transaction moves on.
                Err(ApiError::DatabaseConnection(e)) if attempt < STORE_RETRY_ATTEMPTS => {
                    attempt += 1;
                    warn!(
                        worker,
                        %transaction_id,
                        attempt,
                        "Data store unavailable during evaluation, retrying: {}",
                        e
                    );
                    tokio::time::sleep(STORE_RETRY_DELAY * attempt).await;
                }
                Err(e) => {
                    error!(worker, %user_id, %transaction_id, "Evaluation failed: {}", e);
                    break;
                }
            }
        }
    }
    info!(worker, "Evaluation worker drained");
}

async fn dispatch_worker(state: Arc<AppState>, worker: usize) {
    while let Some(notification_id) = state.dispatch_queue.pop().await {
        if let Err(e) = Dispatcher::dispatch(&state, notification_id).await {
            error!(worker, %notification_id, "Dispatch failed: {}", e);
        }
    }
    info!(worker, "Dispatch worker drained");
}
