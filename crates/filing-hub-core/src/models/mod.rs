pub mod downloaded_filing;
pub mod entity;
pub mod filing_search;
pub mod market;
pub mod status;
pub mod taxonomy_library;

pub use downloaded_filing::{DownloadedFiling, NewDownloadedFiling};
pub use entity::{Entity, NewEntity};
pub use filing_search::{DownloadableFiling, FilingSearch, NewFilingSearch};
pub use market::{Market, NewMarket};
pub use status::DownloadStatus;
pub use taxonomy_library::{NewTaxonomyLibrary, TaxonomyLibrary, TaxonomySaveOutcome};
