//! Core ingestion pipeline for stockpipe.
//!
//! This crate contains:
//! - Domain types for daily stock observations
//! - CSV/JSON source readers
//! - Normalization, validation and business-key deduplication
//! - Fixture snapshot building and the bulk loader
//! - The reset-and-reload orchestrator and the exposed pipeline operations
//!
//! Stores are reached only through the [`ObservationStore`] handle passed to
//! each operation.

pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod reload;
pub mod snapshot;
pub mod source;
pub mod validate;

pub use config::{PipelineConfig, DEFAULT_FIXTURE_MODEL, DEFAULT_PROGRESS_INTERVAL};
pub use dedup::{DedupDecision, Deduplicator, ExistingKeys, PreloadedKeys, StoreLookup};
pub use domain::{BusinessKey, StockObservation, TradeDate, MAX_TRADE_CODE_LEN, REQUIRED_FIELDS};
pub use error::{
    FieldViolation, MalformedRecord, PipelineError, RecordError, ResetError, ResetStage, RowError,
    ValidationError, ViolationKind,
};
pub use normalize::{normalize, NormalizedRecord};
pub use pipeline::{
    build_fixture, ingest_incremental, list_distinct_instrument_codes, reset_and_reload,
    snapshot_store, FixtureReport, IngestReport, ReloadReport,
};
pub use reload::ReloadOutcome;
pub use snapshot::{build_snapshot, read_fixture, render_fixture, FixtureEntry, Snapshot, SourcedObservation};
pub use source::{locate_source, RawRow, RawValue, Source, SourceFormat};
pub use stockpipe_warehouse::{
    MemoryStore, ObservationQuery, ObservationRow, ObservationStore, StoreError, StoredObservation,
};
pub use validate::validate;
