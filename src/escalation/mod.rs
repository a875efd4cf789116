pub mod engine;

pub use engine::{EscalationEngine, EscalationThresholds};
