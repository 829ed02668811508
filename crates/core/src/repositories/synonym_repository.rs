use cardwatch_primitives::error::ApiError;
use cardwatch_primitives::models::NewCategorySynonym;
use cardwatch_primitives::schema::category_synonyms;
use diesel::prelude::*;
use pgvector::{Vector, VectorExpressionMethods};

pub struct SynonymRepository;

impl SynonymRepository {
    pub fn exact(conn: &mut PgConnection, synonym: &str) -> Result<Option<String>, ApiError> {
        category_synonyms::table
            .filter(category_synonyms::synonym.eq(synonym))
            .select(category_synonyms::canonical)
            .first::<String>(conn)
            .optional()
            .map_err(ApiError::from)
    }

    /// Nearest canonical categories by cosine distance, ties broken by the
    /// lowest canonical sort so grounding stays deterministic.
    pub fn nearest(
        conn: &mut PgConnection,
        embedding: &Vector,
        k: i64,
    ) -> Result<Vec<(String, f64)>, ApiError> {
        category_synonyms::table
            .select((
                category_synonyms::canonical,
                category_synonyms::embedding.cosine_distance(embedding.clone()),
            ))
            .order((
                category_synonyms::embedding.cosine_distance(embedding.clone()),
                category_synonyms::canonical.asc(),
            ))
            .limit(k)
            .load::<(String, f64)>(conn)
            .map_err(ApiError::from)
    }

    pub fn insert(
        conn: &mut PgConnection,
        synonym: NewCategorySynonym,
    ) -> Result<(), ApiError> {
        diesel::insert_into(category_synonyms::table)
            .values(&synonym)
            .on_conflict(category_synonyms::synonym)
            .do_nothing()
            .execute(conn)?;
        Ok(())
    }

    pub fn canonicals(conn: &mut PgConnection) -> Result<Vec<String>, ApiError> {
        category_synonyms::table
            .select(category_synonyms::canonical)
            .distinct()
            .order(category_synonyms::canonical.asc())
            .load::<String>(conn)
            .map_err(ApiError::from)
    }
}
