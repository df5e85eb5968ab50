pub mod context;
pub mod engine;

pub use engine::{
    ClearReport, EngineStatus, IngestReport, QueryOutcome, RagEngine, TenantStats,
};
