//! docsign library
//!
//! Detached CMS/PKCS#7 document signing: issue a self-signed identity into a
//! PKCS#12 keystore, sign arbitrary bytes with a keystore entry, and verify a
//! detached signature against the original payload.
//!
//! Layers:
//! - `domain`: strongly typed values (certificates, key material, algorithms)
//! - `services`: stateless keystore, issuance, signing and verification
//! - `pipelines`: the issue / sign / verify workflows composed from services
//! - `infra`: errors, configuration and crypto provider initialization

pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use infra::{config, error};

pub use domain::container::SignatureContainer;
pub use domain::crypto::{
    Certificate, HashAlgorithm, KeyAlgorithm, KeyMaterial, SignatureAlgorithm,
};
pub use domain::types::{KeyAlias, KeystorePassword};
pub use domain::verification::{VerificationOutcome, VerificationReport};
pub use infra::error::{
    CertificateIssuanceError, DocSignError, DocSignResult, KeystoreError, SigningError,
};
pub use pipelines::{
    IssueWorkflow, IssuedIdentity, SignWorkflow, SignatureSummary, SignedDocument, VerifyWorkflow,
};
pub use services::keystore::{Keystore, KeystoreFormat, KeystoreLoader};

/// Issue `CN=<subject_common_name>` and wrap it in a one-entry PKCS#12
/// keystore under `alias`, protected by `password`.
///
/// Always uses the built-in validity of `DEFAULT_VALIDITY_DAYS` (365 days).
/// To honor a configured `validity_days`, run
/// `IssueWorkflow::new().with_validity_days(days)` as the CLI does.
pub fn issue_self_signed_identity(
    password: &str,
    alias: &str,
    subject_common_name: &str,
) -> DocSignResult<IssuedIdentity> {
    let password = KeystorePassword::new(password)?;
    let alias = KeyAlias::new(alias)?;
    IssueWorkflow::new().run(&password, &alias, subject_common_name)
}

/// Sign `payload` with the entry `alias` of a keystore.
pub fn sign_document(
    payload: &[u8],
    keystore_bytes: &[u8],
    password: &str,
    alias: &str,
) -> DocSignResult<SignedDocument> {
    let password = KeystorePassword::new(password)?;
    SignWorkflow::new().run(payload, keystore_bytes, &password, alias)
}

/// `true` when `signature_container` holds a signer that verifies over `payload`.
///
/// Malformed input yields `false`; this never fails.
#[must_use]
pub fn verify_document(payload: &[u8], signature_container: &[u8]) -> bool {
    VerifyWorkflow::new()
        .run(payload, signature_container)
        .is_verified()
}
