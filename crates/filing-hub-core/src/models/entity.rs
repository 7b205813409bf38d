use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::entities;

/// A company known to one of the supported markets.
///
/// Created on the first search that mentions it; never deleted by the
/// pipeline. `(market_type, market_entity_id)` is the natural key, where
/// `market_entity_id` is the market-native identifier (CIK, company number,
/// LEI).
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = entities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Entity {
    pub entity_id: Uuid,
    pub market_type: String,
    pub market_entity_id: String,
    pub company_name: String,
    pub entity_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New entity for insertion
#[derive(Debug, Clone, Insertable, Validate, Deserialize)]
#[diesel(table_name = entities)]
pub struct NewEntity {
    #[validate(length(min = 1, max = 20))]
    pub market_type: String,
    #[validate(length(min = 1, max = 100))]
    pub market_entity_id: String,
    #[validate(length(min = 1, max = 255))]
    pub company_name: String,
    pub entity_status: String,
}

impl NewEntity {
    pub fn active(market_type: &str, market_entity_id: &str, company_name: &str) -> Self {
        Self {
            market_type: market_type.to_string(),
            market_entity_id: market_entity_id.to_string(),
            company_name: company_name.to_string(),
            entity_status: "active".to_string(),
        }
    }
}

impl Entity {
    /// Look up an entity by its market-native identity
    pub async fn find_by_market_identity(
        pool: &crate::database::DatabasePool,
        market_type: &str,
        market_entity_id: &str,
    ) -> crate::error::AppResult<Option<Self>> {
        use crate::schema::entities::dsl;

        let mut conn = pool.get().await?;

        let entity = dsl::entities
            .filter(dsl::market_type.eq(market_type))
            .filter(dsl::market_entity_id.eq(market_entity_id))
            .first::<Self>(&mut conn)
            .await
            .optional()?;

        Ok(entity)
    }

    /// Find an entity by `(market_type, market_entity_id)`, creating it if absent
    pub async fn find_or_create(
        pool: &crate::database::DatabasePool,
        new_entity: &NewEntity,
    ) -> crate::error::AppResult<Self> {
        use crate::schema::entities::dsl;

        new_entity.validate()?;

        if let Some(existing) = Self::find_by_market_identity(
            pool,
            &new_entity.market_type,
            &new_entity.market_entity_id,
        )
        .await?
        {
            return Ok(existing);
        }

        let mut conn = pool.get().await?;

        let entity = diesel::insert_into(dsl::entities)
            .values(new_entity)
            .on_conflict((dsl::market_type, dsl::market_entity_id))
            .do_nothing()
            .get_result::<Self>(&mut conn)
            .await
            .optional()?;

        match entity {
            Some(entity) => Ok(entity),
            // Lost the insert race; the row exists now
            None => Self::find_by_market_identity(
                pool,
                &new_entity.market_type,
                &new_entity.market_entity_id,
            )
            .await?
            .ok_or_else(|| crate::error::AppError::not_found("Entity")),
        }
    }
}
