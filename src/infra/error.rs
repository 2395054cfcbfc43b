//! Error types for keystore, issuance and signing operations.
//! Verification never fails with an error; see `domain::verification`.

use thiserror::Error;

/// Result type for keystore operations
pub type KeystoreResult<T> = Result<T, KeystoreError>;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Result type for the composed document operations
pub type DocSignResult<T> = Result<T, DocSignError>;

/// Failures while opening, resolving or serializing a keystore
#[derive(Error, Debug, miette::Diagnostic)]
pub enum KeystoreError {
    #[error("No keystore format available (tried: {tried})")]
    #[diagnostic(help("at least one of pkcs12 or default must be in the format list"))]
    UnsupportedFormat { tried: String },

    #[error("Invalid keystore password: {0}")]
    BadPassword(String),

    #[error("Alias '{alias}' not found. Available aliases: [{}]", available.join(", "))]
    AliasNotFound {
        alias: String,
        available: Vec<String>,
    },

    #[error("Entry '{alias}' is not a private key entry (found {found})")]
    KeyTypeMismatch { alias: String, found: String },

    #[error("Malformed keystore: {0}")]
    Malformed(String),

    #[error("Keystore cannot be serialized: {0}")]
    Unserializable(String),

    #[error("Keystore IO error: {0}")]
    IoFailure(String),
}

impl From<std::io::Error> for KeystoreError {
    fn from(error: std::io::Error) -> Self {
        KeystoreError::IoFailure(error.to_string())
    }
}

/// Failures while generating a self-signed identity
#[derive(Error, Debug, miette::Diagnostic)]
pub enum CertificateIssuanceError {
    #[error("Key generation failed: {0}")]
    KeyGenFailure(String),

    #[error("Invalid subject DN: {0}")]
    #[diagnostic(help("use comma separated KEY=value pairs, e.g. CN=alice,O=Example"))]
    InvalidSubject(String),

    #[error("Certificate build failed: {0}")]
    CertificateBuild(String),
}

/// Failures while producing a signature container
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Cryptographic failure: {0}")]
    CryptoFailure(String),

    #[error("CMS encoding error: {0}")]
    Encoding(String),
}

impl From<openssl::error::ErrorStack> for SigningError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        SigningError::CryptoFailure(error.to_string())
    }
}

impl From<der::Error> for SigningError {
    fn from(error: der::Error) -> Self {
        SigningError::Encoding(error.to_string())
    }
}

/// Top-level error for the composed issue/sign operations and the CLI
#[derive(Error, Debug, miette::Diagnostic)]
pub enum DocSignError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Keystore(#[from] KeystoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Issuance(#[from] CertificateIssuanceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Signing(#[from] SigningError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for DocSignError {
    fn from(error: std::io::Error) -> Self {
        DocSignError::IoError(error.to_string())
    }
}
