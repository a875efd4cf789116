pub mod feedback;
pub mod incident;
pub mod issue;
pub mod triage;

pub use feedback::*;
pub use incident::*;
pub use issue::*;
pub use triage::*;
