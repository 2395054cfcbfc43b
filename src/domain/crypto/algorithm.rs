//! Key and signature algorithm tables.
//!
//! The key algorithm to signature algorithm mapping is a closed table with a
//! single fallback entry; verification maps declared OIDs back to a key family
//! and digest.

use std::fmt;
use std::str::FromStr;

use der::asn1::ObjectIdentifier;
use der::Any;
use openssl::pkey::{Id, PKeyRef};
use spki::AlgorithmIdentifierOwned;

use super::HashAlgorithm;
use crate::domain::constants;

/// Asymmetric key family of a private or public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    Dsa,
    Ec,
    /// Any other key type (Ed25519, SM2, ...)
    Unknown,
}

impl KeyAlgorithm {
    /// Classify an OpenSSL key.
    #[must_use]
    pub fn of<T>(key: &PKeyRef<T>) -> Self {
        match key.id() {
            Id::RSA => KeyAlgorithm::Rsa,
            Id::DSA => KeyAlgorithm::Dsa,
            Id::EC => KeyAlgorithm::Ec,
            _ => KeyAlgorithm::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Dsa => "DSA",
            KeyAlgorithm::Ec => "EC",
            KeyAlgorithm::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature algorithms produced by the signing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Sha256WithRsa,
    Sha256WithDsa,
    Sha256WithEcdsa,
}

impl SignatureAlgorithm {
    /// Entry used for key types outside the table.
    pub const FALLBACK: SignatureAlgorithm = SignatureAlgorithm::Sha256WithRsa;

    /// Select the signature algorithm for a key family.
    ///
    /// Unrecognized key types fall back to `SHA256withRSA`; signing then fails
    /// later if the key cannot actually perform it.
    #[must_use]
    pub fn for_key(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Rsa => SignatureAlgorithm::Sha256WithRsa,
            KeyAlgorithm::Dsa => SignatureAlgorithm::Sha256WithDsa,
            KeyAlgorithm::Ec => SignatureAlgorithm::Sha256WithEcdsa,
            KeyAlgorithm::Unknown => {
                log::warn!(
                    "Unknown key algorithm, using {}",
                    Self::FALLBACK.as_str()
                );
                Self::FALLBACK
            }
        }
    }

    /// JCA-style algorithm name, as reported to callers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256WithRsa => "SHA256withRSA",
            SignatureAlgorithm::Sha256WithDsa => "SHA256withDSA",
            SignatureAlgorithm::Sha256WithEcdsa => "SHA256withECDSA",
        }
    }

    #[must_use]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Sha256
    }

    #[must_use]
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        match self {
            SignatureAlgorithm::Sha256WithRsa => KeyAlgorithm::Rsa,
            SignatureAlgorithm::Sha256WithDsa => KeyAlgorithm::Dsa,
            SignatureAlgorithm::Sha256WithEcdsa => KeyAlgorithm::Ec,
        }
    }

    #[must_use]
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRsa => constants::SHA256_WITH_RSA,
            SignatureAlgorithm::Sha256WithDsa => constants::DSA_WITH_SHA256,
            SignatureAlgorithm::Sha256WithEcdsa => constants::ECDSA_WITH_SHA256,
        }
    }

    /// AlgorithmIdentifier for the SignerInfo `signatureAlgorithm` field.
    /// RSA carries NULL parameters (RFC 4055); DSA and ECDSA omit them.
    #[must_use]
    pub fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned {
        let parameters = match self {
            SignatureAlgorithm::Sha256WithRsa => Some(Any::null()),
            SignatureAlgorithm::Sha256WithDsa | SignatureAlgorithm::Sha256WithEcdsa => None,
        };
        AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHA256WITHRSA" => Ok(SignatureAlgorithm::Sha256WithRsa),
            "SHA256WITHDSA" => Ok(SignatureAlgorithm::Sha256WithDsa),
            "SHA256WITHECDSA" => Ok(SignatureAlgorithm::Sha256WithEcdsa),
            _ => Err(format!("unknown signature algorithm: {s}")),
        }
    }
}

/// Signature OIDs accepted by the verifier, with the digest fixed by combined OIDs.
const DECLARED_SIGNATURE_OIDS: &[(ObjectIdentifier, KeyAlgorithm, Option<HashAlgorithm>)] = &[
    (constants::RSA_ENCRYPTION, KeyAlgorithm::Rsa, None),
    (constants::SHA256_WITH_RSA, KeyAlgorithm::Rsa, Some(HashAlgorithm::Sha256)),
    (constants::SHA384_WITH_RSA, KeyAlgorithm::Rsa, Some(HashAlgorithm::Sha384)),
    (constants::SHA512_WITH_RSA, KeyAlgorithm::Rsa, Some(HashAlgorithm::Sha512)),
    (constants::DSA, KeyAlgorithm::Dsa, None),
    (constants::DSA_WITH_SHA256, KeyAlgorithm::Dsa, Some(HashAlgorithm::Sha256)),
    (constants::DSA_WITH_SHA384, KeyAlgorithm::Dsa, Some(HashAlgorithm::Sha384)),
    (constants::DSA_WITH_SHA512, KeyAlgorithm::Dsa, Some(HashAlgorithm::Sha512)),
    (constants::EC_PUBLIC_KEY, KeyAlgorithm::Ec, None),
    (constants::ECDSA_WITH_SHA256, KeyAlgorithm::Ec, Some(HashAlgorithm::Sha256)),
    (constants::ECDSA_WITH_SHA384, KeyAlgorithm::Ec, Some(HashAlgorithm::Sha384)),
    (constants::ECDSA_WITH_SHA512, KeyAlgorithm::Ec, Some(HashAlgorithm::Sha512)),
];

/// Key family and digest declared by a SignerInfo, as understood by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredAlgorithm {
    pub key: KeyAlgorithm,
    pub hash: HashAlgorithm,
}

impl DeclaredAlgorithm {
    /// Interpret a SignerInfo's `signatureAlgorithm` and `digestAlgorithm` OIDs.
    ///
    /// Combined OIDs (e.g. `sha256WithRSAEncryption`) must agree with the
    /// digest algorithm; bare key OIDs (`rsaEncryption`) take the digest from
    /// `digestAlgorithm`. Returns `None` for anything else (RSASSA-PSS, SM2, ...).
    #[must_use]
    pub fn from_oids(signature: &ObjectIdentifier, digest: &ObjectIdentifier) -> Option<Self> {
        let hash = HashAlgorithm::from_oid(digest)?;
        let (_, key, combined_hash) = DECLARED_SIGNATURE_OIDS
            .iter()
            .find(|(oid, _, _)| oid == signature)?;
        match combined_hash {
            Some(combined) if *combined != hash => None,
            _ => Some(Self { key: *key, hash }),
        }
    }
}
