pub mod app_config;
pub mod dtos;
pub mod entities;

// Re-export commonly used types
pub use app_config::AppConfig;
pub use dtos::ingest_dto::{Coords, IngestTransactionRequest, IngestTransactionResponse};
pub use dtos::notification_dto::{NotificationListQuery, NotificationOut, WebhookAlertPayload};
pub use dtos::rule_dto::{
    RuleCreateRequest, RuleOut, RuleUpdateRequest, RuleValidateRequest, RuleValidationResponse,
};
pub use entities::alert_rule::{AlertRule, NewAlertRule};
pub use entities::category_synonym::{CategorySynonym, NewCategorySynonym};
pub use entities::credit_card::{CreditCard, NewCreditCard};
pub use entities::enum_types::{
    BaselineKind, CardNetwork, CurrencyCode, NotificationChannel, NotificationStatus, RuleKind,
    Severity, TxnStatus,
};
pub use entities::notification::{AlertNotification, NewAlertNotification};
pub use entities::rule_history::{NewRuleHistoryEntry, RuleHistoryEntry};
pub use entities::transaction::{NewTransaction, Transaction};
pub use entities::user::{NewUser, User};
