use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{CreditCard, NewCreditCard};
use cardwatch_primitives::schema::credit_cards;
use diesel::prelude::*;
use uuid::Uuid;

pub struct CardRepository;

impl CardRepository {
    pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<CreditCard>, ApiError> {
        credit_cards::table
            .find(id)
            .first::<CreditCard>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    pub fn find_for_user(
        conn: &mut PgConnection,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CreditCard>, ApiError> {
        credit_cards::table
            .find(id)
            .filter(credit_cards::user_id.eq(user_id))
            .first::<CreditCard>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    pub fn insert(conn: &mut PgConnection, card: NewCreditCard) -> Result<CreditCard, ApiError> {
        diesel::insert_into(credit_cards::table)
            .values(&card)
            .get_result::<CreditCard>(conn)
            .map_err(ApiError::from)
    }
}
