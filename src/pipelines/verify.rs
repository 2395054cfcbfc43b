//! `VerifyWorkflow`: high-level facade for verifying detached signatures.
//!
//! Delegates to `SignatureVerifier`; keeps symmetry with the issue & sign workflows.

use crate::{
    domain::verification::VerificationReport,
    services::verification::{CertificateSummary, SignatureVerifier},
    DocSignResult,
};

/// Orchestrates verification of a payload against a detached container.
pub struct VerifyWorkflow {
    svc: SignatureVerifier,
}

impl Default for VerifyWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            svc: SignatureVerifier::new(),
        }
    }

    /// Run verification over the payload and container bytes.
    #[must_use]
    pub fn run(&self, payload: &[u8], container: &[u8]) -> VerificationReport {
        self.svc.verify_detailed(payload, container)
    }

    /// Certificates embedded in the container.
    pub fn inspect(&self, container: &[u8]) -> DocSignResult<Vec<CertificateSummary>> {
        self.svc.inspect(container)
    }
}
