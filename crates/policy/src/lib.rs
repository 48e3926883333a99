//! Policy enforcement for Tableward: the per-agent policy store, the
//! statement classifier, the row-filter compiler, and the audit trail.
//!
//! Everything here runs before a statement touches the database and decides
//! whether it may. The decision functions are pure over a policy snapshot;
//! the store guarantees a snapshot never changes mid-evaluation.

pub mod audit;
pub mod classifier;
pub mod rowfilter;
pub mod store;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use classifier::{Classification, classify, detect_operation};
pub use rowfilter::{FilterContext, TableFilter, augment_statement, compile, compile_filters};
pub use store::PolicyStore;
