pub mod processor;
pub mod run;
pub mod summary;

pub use processor::TriageProcessor;
pub use run::{rank, IncidentFailure, TriageRun};
pub use summary::{RepeatTerminal, TriageSummary};
