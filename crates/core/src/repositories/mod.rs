pub mod card_repository;
pub mod notification_repository;
pub mod rule_repository;
pub mod rule_sql;
pub mod synonym_repository;
pub mod transaction_repository;
pub mod user_repository;

pub use card_repository::CardRepository;
pub use notification_repository::NotificationRepository;
pub use rule_repository::RuleRepository;
pub use synonym_repository::SynonymRepository;
pub use transaction_repository::TransactionRepository;
pub use user_repository::UserRepository;
