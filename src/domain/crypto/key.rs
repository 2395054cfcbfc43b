use std::fmt;

use openssl::pkey::{PKey, Private};

use super::{Certificate, KeyAlgorithm, SignatureAlgorithm};

/// A private key together with the certificate that binds its public half.
///
/// Call-scoped: produced by issuance or keystore resolution and handed to the
/// signing engine; the subsystem never persists it on its own.
#[derive(Clone)]
pub struct KeyMaterial {
    private_key: PKey<Private>,
    algorithm: KeyAlgorithm,
    certificate: Certificate,
}

impl KeyMaterial {
    #[must_use]
    pub fn new(private_key: PKey<Private>, certificate: Certificate) -> Self {
        let algorithm = KeyAlgorithm::of(&private_key);
        Self {
            private_key,
            algorithm,
            certificate,
        }
    }

    #[must_use]
    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Signature algorithm the engine will use for this key.
    #[must_use]
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::for_key(self.algorithm)
    }
}

// Key bytes never appear in debug output
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyMaterial(algorithm={}, certificate={:?})",
            self.algorithm, self.certificate
        )
    }
}
