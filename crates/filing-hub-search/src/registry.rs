use filing_hub_core::error::{AppError, AppResult};
use filing_hub_core::Config;

use crate::esef::EsefSearcher;
use crate::searcher::MarketSearcher;
use crate::sec::SecSearcher;
use crate::uk::UkSearcher;

/// Markets with a registered searcher, in registration order
pub const SUPPORTED_MARKETS: &[&str] =
    &[crate::sec::MARKET_ID, crate::uk::MARKET_ID, crate::esef::MARKET_ID];

/// Construct the searcher for a market.
///
/// The market id -> constructor table is the single place a new market is
/// wired in.
pub fn get_searcher(market_id: &str, config: &Config) -> AppResult<Box<dyn MarketSearcher>> {
    match market_id {
        crate::sec::MARKET_ID => Ok(Box::new(SecSearcher::new(config)?)),
        crate::uk::MARKET_ID => Ok(Box::new(UkSearcher::new(config)?)),
        crate::esef::MARKET_ID => Ok(Box::new(EsefSearcher::new(config)?)),
        other => Err(AppError::SearchError(format!(
            "Market '{}' not registered. Available markets: {:?}",
            other, SUPPORTED_MARKETS
        ))),
    }
}

/// List of registered market ids
pub fn available_markets() -> Vec<&'static str> {
    SUPPORTED_MARKETS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_market_is_rejected() {
        // REQUIREMENT: Only registered markets can be searched
        // PURPOSE: Verify the registry error names the available markets
        std::env::remove_var("UK_CH_API_KEY");
        let config = Config::from_env().unwrap();

        let result = get_searcher("asx", &config);
        let err = result.err().expect("unknown market should error");
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn test_available_markets() {
        // REQUIREMENT: Three markets are supported
        // PURPOSE: Verify the registration list
        assert_eq!(available_markets(), vec!["sec", "uk_frc", "esef"]);
    }
}
