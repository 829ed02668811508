use crate::handlers::{
    create_rule::__path_create_rule, delete_rule::__path_delete_rule, get_rule::__path_get_rule,
    health::__path_health_check, ingest_transaction::__path_ingest_transaction,
    list_notifications::__path_list_notifications, list_rules::__path_list_rules,
    mark_notification_read::__path_mark_notification_read, rule_history::__path_rule_history,
    update_rule::__path_update_rule, validate_rule::__path_validate_rule,
};
use cardwatch_primitives::models::{
    IngestTransactionRequest, NotificationOut, RuleCreateRequest, RuleOut, RuleUpdateRequest,
    RuleValidateRequest, RuleValidationResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        ingest_transaction, validate_rule, create_rule, list_rules, get_rule,
        update_rule, delete_rule, rule_history, list_notifications,
        mark_notification_read, health_check
    ),
    components(schemas(
        IngestTransactionRequest,
        RuleValidateRequest,
        RuleCreateRequest,
        RuleUpdateRequest,
        RuleOut,
        RuleValidationResponse,
        NotificationOut
    )),
    tags(
        (name = "Ingestion", description = "Transaction intake"),
        (name = "Rules", description = "Alert rule authoring"),
        (name = "Notifications", description = "Alert notification access"),
        (name = "Ops", description = "Health and metrics")
    )
)]
pub struct ApiDoc;
