//! # FilingHub Acquire
//!
//! Distribution-agnostic acquisition pipeline: detects how a remote artifact
//! is packaged (archive, single iXBRL document, schema closure, or browsable
//! directory), routes it to the matching handler, retries transient failures
//! with backoff, and commits database state only after the files have been
//! verified on disk.

pub mod archive;
pub mod coordinator;
pub mod detector;
pub mod directory;
pub mod failure;
pub mod headers;
pub mod http;
pub mod paths;
pub mod processor;
pub mod result;
pub mod retry;
pub mod stream;
pub mod temp;
pub mod validator;
pub mod xsd;

pub use coordinator::{DownloadCoordinator, ProcessingStats};
pub use paths::{PathResolver, WorkItem};
pub use detector::{Detection, DistributionDetector, DistributionType};
pub use processor::DistributionProcessor;
pub use result::{
    DownloadResult, ErrorStage, ExtractionResult, ProcessingResult, ValidationResult,
};
