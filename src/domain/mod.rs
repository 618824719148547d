//! Core data model shared by every stage of an analysis run.

pub mod filter;
pub mod request;
pub mod response;
pub mod results;
pub mod structure;

pub use filter::{FilterMatcher, FilterOrigin, FilterSpec, PatternDecision};
pub use request::{AnalysisRequest, PatternType};
pub use response::{
    AnalysisResponse, ErrorDetail, ErrorKind, ResponseStatus, Stage, StageOutcome, StageRecord,
    Warning,
};
pub use results::{
    DiagramResult, DiagramSource, ExcludedFile, ExtractionResult, ExtractionTotals, FileError,
    IncludedFile, SkipReason,
};
pub use structure::{
    FetchMetadata, FileRecord, RepositorySnapshot, StructureStats, StructureSummary, Truncation,
};

/// Default per-file size cap (50 KiB), matching what the hosted API accepted.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024;
