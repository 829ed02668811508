pub mod alert_rule;
pub mod category_synonym;
pub mod credit_card;
pub mod enum_types;
pub mod notification;
pub mod rule_history;
pub mod transaction;
pub mod user;
