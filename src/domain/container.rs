//! Detached CMS `SignedData` container.
//! Newtype around the DER encoding produced by the signing engine.

use std::fmt;

use super::crypto::SignatureAlgorithm;

/// DER-encoded `ContentInfo` wrapping a detached `SignedData`.
///
/// Never embeds the signed content; verification needs the original payload.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureContainer {
    der: Vec<u8>,
    signature_algorithm: SignatureAlgorithm,
}

impl SignatureContainer {
    #[must_use]
    pub fn new(der: Vec<u8>, signature_algorithm: SignatureAlgorithm) -> Self {
        Self {
            der,
            signature_algorithm,
        }
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    /// Algorithm used by the single signer.
    #[must_use]
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.der.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }
}

impl fmt::Debug for SignatureContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignatureContainer(algorithm={}, len={})",
            self.signature_algorithm,
            self.der.len()
        )
    }
}
