//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers for cryptographic artifacts including:
//! - Hash algorithms and digest values with size validation
//! - Certificates with their decoded identity fields
//! - Key material pairing a private key with its certificate
//! - The closed key-algorithm to signature-algorithm table

mod algorithm;
mod cert;
mod digest_bytes;
mod hash;
mod key;

pub use algorithm::{DeclaredAlgorithm, KeyAlgorithm, SignatureAlgorithm};
pub use cert::{Certificate, CertificateError};
pub use digest_bytes::DigestBytes;
pub use hash::HashAlgorithm;
pub use key::KeyMaterial;
