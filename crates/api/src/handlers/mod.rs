pub mod create_rule;
pub mod delete_rule;
pub mod get_rule;
pub mod health;
pub mod ingest_transaction;
pub mod list_notifications;
pub mod list_rules;
pub mod mark_notification_read;
pub mod rule_history;
pub mod update_rule;
pub mod validate_rule;
