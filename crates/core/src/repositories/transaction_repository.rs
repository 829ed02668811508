use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{NewTransaction, Transaction, TxnStatus};
use cardwatch_primitives::schema::transactions;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

pub struct TransactionRepository;

impl TransactionRepository {
    pub fn insert(
        conn: &mut PgConnection,
        new_txn: NewTransaction,
    ) -> Result<Transaction, ApiError> {
        diesel::insert_into(transactions::table)
            .values(&new_txn)
            .get_result::<Transaction>(conn)
            .map_err(ApiError::from)
    }

    pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Transaction>, ApiError> {
        transactions::table
            .find(id)
            .first::<Transaction>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    /// Transactions are append-only; only the status column may advance.
    pub fn advance_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: TxnStatus,
    ) -> Result<(), ApiError> {
        diesel::update(transactions::table.find(id))
            .set(transactions::status.eq(status))
            .execute(conn)?;
        Ok(())
    }

    pub fn latest_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Option<Transaction>, ApiError> {
        transactions::table
            .filter(transactions::user_id.eq(user_id))
            .order(transactions::occurred_at.desc())
            .first::<Transaction>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    pub fn recent_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Transaction>, ApiError> {
        transactions::table
            .filter(transactions::user_id.eq(user_id))
            .order(transactions::occurred_at.desc())
            .limit(limit)
            .load::<Transaction>(conn)
            .map_err(ApiError::from)
    }

    pub fn window_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, ApiError> {
        transactions::table
            .filter(transactions::user_id.eq(user_id))
            .filter(transactions::occurred_at.ge(from))
            .filter(transactions::occurred_at.lt(to))
            .order(transactions::occurred_at.asc())
            .load::<Transaction>(conn)
            .map_err(ApiError::from)
    }

    pub fn for_merchant(
        conn: &mut PgConnection,
        user_id: Uuid,
        merchant_lower: &str,
        limit: i64,
    ) -> Result<Vec<Transaction>, ApiError> {
        transactions::table
            .filter(transactions::user_id.eq(user_id))
            .filter(transactions::merchant_name.ilike(format!("%{}%", merchant_lower)))
            .order(transactions::occurred_at.desc())
            .limit(limit)
            .load::<Transaction>(conn)
            .map_err(ApiError::from)
    }

    /// Distinct merchant names in this user's history, used by the compiler
    /// to ground free-form merchant mentions.
    pub fn merchant_names_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Vec<String>, ApiError> {
        transactions::table
            .filter(transactions::user_id.eq(user_id))
            .select(transactions::merchant_name)
            .distinct()
            .load::<String>(conn)
            .map_err(ApiError::from)
    }
}
