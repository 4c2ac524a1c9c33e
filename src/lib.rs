// Tax Filing - Core Library
// Fixed-width information-return files, exposed for the CLI and tests

pub mod error;
pub mod codec;
pub mod sequence;
pub mod record;      // Schemas + composer
pub mod entities;
pub mod db;
pub mod config;
pub mod aggregator;  // Source rows → payees
pub mod generator;   // NEC + foreign withholding

// Re-export commonly used types
pub use error::{FilingError, FilingResult};
pub use sequence::SequenceTracker;
pub use record::{
    BoundValues, CodecRule, FieldSpec, FieldValue,
    RecordComposer, RecordSchema, RecordType, RenderedRecord,
};
pub use entities::{Address, Company, RecipientProfile};
pub use db::{
    SourceTransaction, TransactionKind, TransactionStatus, FilingEvent, FilingSummary,
    setup_database, load_snapshot, record_filing_event, filing_history, reported_payee_ids,
};
pub use config::{FilerConfig, Thresholds, TransmitterConfig};
pub use aggregator::{
    ControlTotals, EligibilityCriteria, FilingSnapshot, PayeeAggregate,
    PayeeAggregator, Residency,
};
pub use generator::{
    FilingOutput, FilingRequest, FormGenerator, FormKind, FormSchemas,
    NecGenerator, WithholdingGenerator,
    generate_filing, generator_for, load_generator,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
