use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::{NewUser, User};
use cardwatch_primitives::schema::users;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

pub struct UserRepository;

impl UserRepository {
    pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>, ApiError> {
        users::table
            .find(id)
            .first::<User>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    pub fn upsert(conn: &mut PgConnection, new_user: NewUser) -> Result<User, ApiError> {
        diesel::insert_into(users::table)
            .values(&new_user)
            .on_conflict(users::id)
            .do_update()
            .set((
                users::email.eq(new_user.email),
                users::home_city.eq(new_user.home_city),
                users::home_state.eq(new_user.home_state),
                users::home_country.eq(new_user.home_country),
                users::home_latitude.eq(new_user.home_latitude),
                users::home_longitude.eq(new_user.home_longitude),
                users::timezone.eq(new_user.timezone),
                users::credit_limit_cents.eq(new_user.credit_limit_cents),
                users::current_balance_cents.eq(new_user.current_balance_cents),
                users::location_consent.eq(new_user.location_consent),
                users::webhook_url.eq(new_user.webhook_url),
                users::webhook_secret.eq(new_user.webhook_secret),
                users::updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(conn)
            .map_err(ApiError::from)
    }

    /// Tracks the most recent transaction location for location-drift and
    /// impossible-travel checks. Only moves forward in time.
    pub fn advance_last_known(
        conn: &mut PgConnection,
        id: Uuid,
        lat: f64,
        lon: f64,
        at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        diesel::update(users::table.find(id))
            .filter(
                users::last_known_at
                    .is_null()
                    .or(users::last_known_at.lt(at)),
            )
            .set((
                users::last_known_latitude.eq(lat),
                users::last_known_longitude.eq(lon),
                users::last_known_at.eq(at),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    }
}
