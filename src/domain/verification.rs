//! Verification domain types for detached signature containers.
//!
//! Callers of the public API only see a boolean. These types keep the reason
//! behind a negative answer so it can be logged or shown on request.

use std::fmt;

/// Why a single signer could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerFailure {
    /// No embedded certificate carries the signer's issuer and serial.
    NoMatchingCertificate,
    /// More than one embedded certificate carries the signer's issuer and serial.
    AmbiguousCertificate(usize),
    /// The signer is identified by subject key identifier, which is not matched here.
    UnsupportedSignerIdentifier,
    /// Declared digest/signature algorithm is not understood or does not fit the key.
    UnsupportedAlgorithm(String),
    /// The `contentType` attribute is missing or names another content type
    /// than the container's `eContentType`.
    ContentTypeMismatch,
    /// The `messageDigest` attribute is missing or differs from the payload digest.
    DigestMismatch,
    /// The signature value does not verify under the certificate's public key.
    SignatureInvalid,
}

impl fmt::Display for SignerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerFailure::NoMatchingCertificate => write!(f, "no matching certificate"),
            SignerFailure::AmbiguousCertificate(n) => {
                write!(f, "{n} certificates match the signer identifier")
            }
            SignerFailure::UnsupportedSignerIdentifier => {
                write!(f, "signer identified by subject key identifier")
            }
            SignerFailure::UnsupportedAlgorithm(algo) => write!(f, "unsupported algorithm {algo}"),
            SignerFailure::ContentTypeMismatch => write!(f, "content type attribute mismatch"),
            SignerFailure::DigestMismatch => write!(f, "message digest mismatch"),
            SignerFailure::SignatureInvalid => write!(f, "signature invalid"),
        }
    }
}

/// Outcome for one SignerInfo, in container order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerOutcome {
    /// Position of the SignerInfo in the container.
    pub index: usize,
    /// Subject DN of the matched certificate, when one was found.
    pub subject: Option<String>,
    /// `None` when this signer verified.
    pub failure: Option<SignerFailure>,
}

impl SignerOutcome {
    #[must_use]
    pub fn verified(&self) -> bool {
        self.failure.is_none()
    }
}

/// Container-level reason for `NotVerified`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotVerifiedReason {
    /// Bytes are not a CMS `SignedData` container.
    Malformed(String),
    /// The container holds no SignerInfo.
    NoSigners,
    /// Every signer was skipped or failed; see the per-signer outcomes.
    NoSignerVerified,
}

impl fmt::Display for NotVerifiedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotVerifiedReason::Malformed(msg) => write!(f, "malformed container: {msg}"),
            NotVerifiedReason::NoSigners => write!(f, "container has no signers"),
            NotVerifiedReason::NoSignerVerified => write!(f, "no signer verified"),
        }
    }
}

/// Externally visible verification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    NotVerified(NotVerifiedReason),
}

/// Result of verifying a detached signature container against a payload.
///
/// `signers` lists the signers evaluated before the first success, so a
/// verified report ends with the verifying signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub outcome: VerificationOutcome,
    pub signers: Vec<SignerOutcome>,
}

impl VerificationReport {
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            outcome: VerificationOutcome::NotVerified(NotVerifiedReason::Malformed(
                message.into(),
            )),
            signers: Vec::new(),
        }
    }

    /// Build the report from the evaluated signers.
    #[must_use]
    pub fn from_signers(signers: Vec<SignerOutcome>) -> Self {
        let outcome = if signers.is_empty() {
            VerificationOutcome::NotVerified(NotVerifiedReason::NoSigners)
        } else if signers.iter().any(SignerOutcome::verified) {
            VerificationOutcome::Verified
        } else {
            VerificationOutcome::NotVerified(NotVerifiedReason::NoSignerVerified)
        };
        Self { outcome, signers }
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.outcome == VerificationOutcome::Verified
    }

    /// The signer that verified, if any.
    #[must_use]
    pub fn verified_signer(&self) -> Option<&SignerOutcome> {
        self.signers.iter().find(|s| s.verified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, failure: Option<SignerFailure>) -> SignerOutcome {
        SignerOutcome {
            index,
            subject: Some("CN=alice".to_string()),
            failure,
        }
    }

    #[test]
    fn test_empty_report_has_no_signers() {
        let report = VerificationReport::from_signers(Vec::new());
        assert!(!report.is_verified());
        assert_eq!(
            report.outcome,
            VerificationOutcome::NotVerified(NotVerifiedReason::NoSigners)
        );
    }

    #[test]
    fn test_any_verified_signer_verifies() {
        let report = VerificationReport::from_signers(vec![
            outcome(0, Some(SignerFailure::NoMatchingCertificate)),
            outcome(1, None),
        ]);
        assert!(report.is_verified());
        assert_eq!(report.verified_signer().map(|s| s.index), Some(1));
    }

    #[test]
    fn test_all_failed() {
        let report =
            VerificationReport::from_signers(vec![outcome(0, Some(SignerFailure::SignatureInvalid))]);
        assert_eq!(
            report.outcome,
            VerificationOutcome::NotVerified(NotVerifiedReason::NoSignerVerified)
        );
        assert!(report.verified_signer().is_none());
    }

    #[test]
    fn test_malformed() {
        let report = VerificationReport::malformed("truncated");
        assert!(!report.is_verified());
        assert_eq!(
            report.outcome.clone(),
            VerificationOutcome::NotVerified(NotVerifiedReason::Malformed("truncated".into()))
        );
    }
}
