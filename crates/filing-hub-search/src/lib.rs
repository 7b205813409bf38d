//! # FilingHub Search
//!
//! Market searchers for SEC EDGAR, UK Companies House, and the ESEF filings
//! aggregator, plus the orchestrator that persists normalized results into
//! the download queue.

pub mod esef;
pub mod orchestrator;
pub mod rate_limit;
pub mod registry;
pub mod searcher;
pub mod sec;
pub mod uk;

pub use orchestrator::SearchOrchestrator;
pub use registry::{available_markets, get_searcher};
pub use searcher::{FilingRecord, MarketSearcher};
