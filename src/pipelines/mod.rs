//! Workflow pipelines orchestrating stateless services.

pub mod issue;
pub mod sign;
pub mod verify;

pub use issue::{IssueWorkflow, IssuedIdentity};
pub use sign::{SignWorkflow, SignatureSummary, SignedDocument};
pub use verify::VerifyWorkflow;
