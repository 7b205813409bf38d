use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schema::markets;

/// A supported regulatory market
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = markets)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Market {
    pub market_id: String,
    pub market_name: String,
    pub market_country: String,
    pub api_base_url: String,
    pub is_active: bool,
    pub rate_limit_per_minute: i32,
    pub user_agent_required: bool,
}

/// New market row for insertion
#[derive(Debug, Clone, Insertable, Validate, Deserialize)]
#[diesel(table_name = markets)]
pub struct NewMarket {
    #[validate(length(min = 1, max = 20))]
    pub market_id: String,
    #[validate(length(min = 1, max = 255))]
    pub market_name: String,
    #[validate(length(min = 3, max = 3))]
    pub market_country: String,
    #[validate(url)]
    pub api_base_url: String,
    pub is_active: bool,
    #[validate(range(min = 1, max = 10000))]
    pub rate_limit_per_minute: i32,
    pub user_agent_required: bool,
}

/// Predefined markets
impl Market {
    /// U.S. Securities and Exchange Commission (EDGAR)
    pub fn sec() -> NewMarket {
        NewMarket {
            market_id: "sec".to_string(),
            market_name: "U.S. Securities and Exchange Commission".to_string(),
            market_country: "USA".to_string(),
            api_base_url: "https://data.sec.gov".to_string(),
            is_active: true,
            rate_limit_per_minute: 600,
            user_agent_required: true,
        }
    }

    /// UK Companies House
    pub fn uk_frc() -> NewMarket {
        NewMarket {
            market_id: "uk_frc".to_string(),
            market_name: "UK Companies House".to_string(),
            market_country: "GBR".to_string(),
            api_base_url: "https://api.companieshouse.gov.uk".to_string(),
            is_active: true,
            rate_limit_per_minute: 120,
            user_agent_required: false,
        }
    }

    /// ESEF filings aggregator (filings.xbrl.org)
    pub fn esef() -> NewMarket {
        NewMarket {
            market_id: "esef".to_string(),
            market_name: "ESEF - European Single Electronic Format".to_string(),
            market_country: "EUR".to_string(),
            api_base_url: "https://filings.xbrl.org".to_string(),
            is_active: true,
            rate_limit_per_minute: 60,
            user_agent_required: false,
        }
    }

    /// All supported markets in registration order
    pub fn seed_data() -> Vec<NewMarket> {
        vec![Self::sec(), Self::uk_frc(), Self::esef()]
    }

    /// Seed the markets table. Idempotent - existing rows are left untouched.
    pub async fn seed(pool: &crate::database::DatabasePool) -> crate::error::AppResult<usize> {
        use crate::schema::markets::dsl;

        let mut conn = pool.get().await?;
        let mut added = 0;

        for market in Self::seed_data() {
            let inserted = diesel::insert_into(dsl::markets)
                .values(&market)
                .on_conflict(dsl::market_id)
                .do_nothing()
                .execute(&mut conn)
                .await?;
            added += inserted;
        }

        Ok(added)
    }

    /// Fetch a market row by id
    pub async fn find_by_id(
        pool: &crate::database::DatabasePool,
        market_id: &str,
    ) -> crate::error::AppResult<Option<Self>> {
        use crate::schema::markets::dsl;

        let mut conn = pool.get().await?;

        let market = dsl::markets
            .filter(dsl::market_id.eq(market_id))
            .first::<Self>(&mut conn)
            .await
            .optional()?;

        Ok(market)
    }
}
