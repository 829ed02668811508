use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{
    AlertRule, NewAlertRule, NewRuleHistoryEntry, RuleHistoryEntry,
};
use cardwatch_primitives::schema::{alert_rules, rule_history};
use chrono::Utc;
use diesel::prelude::*;
use pgvector::{Vector, VectorExpressionMethods};
use serde_json::Value;
use uuid::Uuid;

pub struct RuleRepository;

impl RuleRepository {
    pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<AlertRule>, ApiError> {
        alert_rules::table
            .find(id)
            .first::<AlertRule>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    pub fn find_for_user(
        conn: &mut PgConnection,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AlertRule>, ApiError> {
        alert_rules::table
            .find(id)
            .filter(alert_rules::user_id.eq(user_id))
            .first::<AlertRule>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    pub fn list_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<AlertRule>, ApiError> {
        alert_rules::table
            .filter(alert_rules::user_id.eq(user_id))
            .order((alert_rules::created_at.asc(), alert_rules::id.asc()))
            .load::<AlertRule>(conn)
            .map_err(ApiError::from)
    }

    /// Active rules in deterministic evaluation order (created_at, id).
    pub fn active_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<AlertRule>, ApiError> {
        alert_rules::table
            .filter(alert_rules::user_id.eq(user_id))
            .filter(alert_rules::is_active.eq(true))
            .order((alert_rules::created_at.asc(), alert_rules::id.asc()))
            .load::<AlertRule>(conn)
            .map_err(ApiError::from)
    }

    /// Rule and embedding land in one row, so the write is atomic by
    /// construction.
    pub fn insert(conn: &mut PgConnection, new_rule: NewAlertRule) -> Result<AlertRule, ApiError> {
        diesel::insert_into(alert_rules::table)
            .values(&new_rule)
            .get_result::<AlertRule>(conn)
            .map_err(ApiError::from)
    }

    /// Replaces a rule with its recompiled successor and archives the prior
    /// version, atomically. Only called once a compile reached Valid.
    #[allow(clippy::too_many_arguments)]
    pub fn replace_compiled(
        conn: &mut PgConnection,
        rule_id: Uuid,
        nl_text: &str,
        kind: cardwatch_primitives::models::RuleKind,
        sql_text: &str,
        sql_params: Value,
        severity: cardwatch_primitives::models::Severity,
        channels: Value,
        nl_embedding: Vector,
    ) -> Result<AlertRule, ApiError> {
        conn.transaction::<_, ApiError, _>(|conn| {
            let prior = alert_rules::table
                .find(rule_id)
                .first::<AlertRule>(conn)
                .map_err(ApiError::from)?;

            diesel::insert_into(rule_history::table)
                .values(&NewRuleHistoryEntry {
                    id: Uuid::new_v4(),
                    rule_id,
                    nl_text: &prior.nl_text,
                    sql_text: &prior.sql_text,
                })
                .execute(conn)?;

            diesel::update(alert_rules::table.find(rule_id))
                .set((
                    alert_rules::nl_text.eq(nl_text),
                    alert_rules::kind.eq(kind),
                    alert_rules::sql_text.eq(sql_text),
                    alert_rules::sql_params.eq(sql_params),
                    alert_rules::severity.eq(severity),
                    alert_rules::channels.eq(channels),
                    alert_rules::nl_embedding.eq(nl_embedding),
                    alert_rules::validated_sql.eq(true),
                    alert_rules::consecutive_failures.eq(0),
                    alert_rules::updated_at.eq(Utc::now()),
                ))
                .get_result::<AlertRule>(conn)
                .map_err(ApiError::from)
        })
    }

    /// Nearest active rules for this user by cosine distance. Returns
    /// (rule_id, distance) where distance = 1 - cosine similarity.
    pub fn nearest_active_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        embedding: &Vector,
        k: i64,
    ) -> Result<Vec<(Uuid, f64)>, ApiError> {
        alert_rules::table
            .filter(alert_rules::user_id.eq(user_id))
            .filter(alert_rules::is_active.eq(true))
            .select((
                alert_rules::id,
                alert_rules::nl_embedding.cosine_distance(embedding.clone()),
            ))
            .order(alert_rules::nl_embedding.cosine_distance(embedding.clone()))
            .limit(k)
            .load::<(Uuid, f64)>(conn)
            .map_err(ApiError::from)
    }

    pub fn set_active(
        conn: &mut PgConnection,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<(), ApiError> {
        diesel::update(alert_rules::table.find(rule_id))
            .set((
                alert_rules::is_active.eq(is_active),
                alert_rules::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    }

    pub fn update_channels_severity(
        conn: &mut PgConnection,
        rule_id: Uuid,
        channels: Option<Value>,
        severity: Option<cardwatch_primitives::models::Severity>,
    ) -> Result<AlertRule, ApiError> {
        conn.transaction::<_, ApiError, _>(|conn| {
            if let Some(channels) = channels {
                diesel::update(alert_rules::table.find(rule_id))
                    .set(alert_rules::channels.eq(channels))
                    .execute(conn)?;
            }
            if let Some(severity) = severity {
                diesel::update(alert_rules::table.find(rule_id))
                    .set(alert_rules::severity.eq(severity))
                    .execute(conn)?;
            }
            diesel::update(alert_rules::table.find(rule_id))
                .set(alert_rules::updated_at.eq(Utc::now()))
                .get_result::<AlertRule>(conn)
                .map_err(ApiError::from)
        })
    }

    pub fn delete(conn: &mut PgConnection, rule_id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
        let deleted = diesel::delete(
            alert_rules::table
                .find(rule_id)
                .filter(alert_rules::user_id.eq(user_id)),
        )
        .execute(conn)?;
        Ok(deleted > 0)
    }

    /// Records a successful trigger. Skipped on replay so idempotent
    /// re-evaluation never double-counts.
    pub fn record_trigger(conn: &mut PgConnection, rule_id: Uuid) -> Result<(), ApiError> {
        diesel::update(alert_rules::table.find(rule_id))
            .set((
                alert_rules::trigger_count.eq(alert_rules::trigger_count + 1),
                alert_rules::last_triggered_at.eq(Utc::now()),
                alert_rules::consecutive_failures.eq(0),
                alert_rules::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    }

    pub fn reset_failures(conn: &mut PgConnection, rule_id: Uuid) -> Result<(), ApiError> {
        diesel::update(alert_rules::table.find(rule_id))
            .set(alert_rules::consecutive_failures.eq(0))
            .execute(conn)?;
        Ok(())
    }

    /// Bumps the consecutive-failure counter; at `limit` the rule is
    /// deactivated. Returns true when this call performed the deactivation.
    pub fn record_failure(
        conn: &mut PgConnection,
        rule_id: Uuid,
        limit: i32,
    ) -> Result<bool, ApiError> {
        conn.transaction::<_, ApiError, _>(|conn| {
            let failures: i32 = diesel::update(alert_rules::table.find(rule_id))
                .set((
                    alert_rules::consecutive_failures.eq(alert_rules::consecutive_failures + 1),
                    alert_rules::updated_at.eq(Utc::now()),
                ))
                .returning(alert_rules::consecutive_failures)
                .get_result::<i32>(conn)?;

            if failures >= limit {
                diesel::update(alert_rules::table.find(rule_id))
                    .set(alert_rules::is_active.eq(false))
                    .execute(conn)?;
                return Ok(true);
            }
            Ok(false)
        })
    }

    pub fn history(
        conn: &mut PgConnection,
        rule_id: Uuid,
    ) -> Result<Vec<RuleHistoryEntry>, ApiError> {
        rule_history::table
            .filter(rule_history::rule_id.eq(rule_id))
            .order(rule_history::changed_at.desc())
            .load::<RuleHistoryEntry>(conn)
            .map_err(ApiError::from)
    }
}
