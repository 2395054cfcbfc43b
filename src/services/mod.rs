//! Service layer module root.
//! Stateless keystore, issuance, signing and verification services.

pub mod cms_builder;
pub mod issuer;
pub mod keystore;
pub(crate) mod pkcs12;
pub mod verification;

pub use cms_builder::SignatureEngine;
pub use issuer::CertificateIssuer;
pub use keystore::{Keystore, KeystoreEntry, KeystoreFormat, KeystoreLoader};
pub use verification::{CertificateSummary, SignatureVerifier};
