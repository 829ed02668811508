use diesel::{Identifiable, Insertable, Queryable};
use pgvector::Vector;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::category_synonyms)]
pub struct CategorySynonym {
    pub id: Uuid,
    pub synonym: String,
    pub canonical: String,
    pub embedding: Vector,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::category_synonyms)]
pub struct NewCategorySynonym<'a> {
    pub id: Uuid,
    pub synonym: &'a str,
    pub canonical: &'a str,
    pub embedding: Vector,
}
