//! Self-signed identity issuance.
//!
//! Generates a fresh RSA key pair and a v3 certificate whose issuer equals its
//! subject, signed with SHA-256. Persisting the result is the caller's job
//! (`Keystore::serialize`).

use std::time::{SystemTime, UNIX_EPOCH};

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder};

use crate::domain::constants::RSA_KEY_BITS;
use crate::domain::crypto::{Certificate, KeyMaterial};
use crate::infra::error::CertificateIssuanceError;
use crate::infra::provider::ensure_crypto_provider_initialized;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

fn build_err(context: &str) -> impl Fn(openssl::error::ErrorStack) -> CertificateIssuanceError + '_ {
    move |e| CertificateIssuanceError::CertificateBuild(format!("{context}: {e}"))
}

/// Issues self-signed identities.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateIssuer;

impl CertificateIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generate a 2048-bit RSA key and a self-signed certificate for `subject_dn`.
    pub fn issue_self_signed(
        &self,
        subject_dn: &str,
        validity_days: u32,
    ) -> Result<KeyMaterial, CertificateIssuanceError> {
        ensure_crypto_provider_initialized();
        let rsa = Rsa::generate(RSA_KEY_BITS)
            .map_err(|e| CertificateIssuanceError::KeyGenFailure(format!("RSA gen failed: {e}")))?;
        let pkey = PKey::from_rsa(rsa)
            .map_err(|e| CertificateIssuanceError::KeyGenFailure(format!("PKey failed: {e}")))?;
        self.certify(pkey, subject_dn, validity_days)
    }

    /// Wrap an existing key pair in a self-signed certificate.
    pub fn certify(
        &self,
        pkey: PKey<Private>,
        subject_dn: &str,
        validity_days: u32,
    ) -> Result<KeyMaterial, CertificateIssuanceError> {
        ensure_crypto_provider_initialized();
        let name = parse_subject_dn(subject_dn)?;

        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CertificateIssuanceError::CertificateBuild(format!("Clock error: {e}")))?;
        let issued_secs = i64::try_from(issued_at.as_secs())
            .map_err(|e| CertificateIssuanceError::CertificateBuild(format!("Clock error: {e}")))?;
        let expires_secs = issued_secs + i64::from(validity_days) * SECONDS_PER_DAY;

        let mut builder = X509Builder::new().map_err(build_err("X509 builder"))?;
        builder.set_version(2).map_err(build_err("Set version"))?;

        // Issuance time in milliseconds; distinguishing, not a security parameter
        let millis = u64::try_from(issued_at.as_millis())
            .map_err(|e| CertificateIssuanceError::CertificateBuild(format!("Clock error: {e}")))?;
        let serial = BigNum::from_slice(&millis.to_be_bytes())
            .and_then(|bn| bn.to_asn1_integer())
            .map_err(build_err("Serial number"))?;
        builder
            .set_serial_number(&serial)
            .map_err(build_err("Set serial"))?;

        builder.set_subject_name(&name).map_err(build_err("Set subject"))?;
        builder.set_issuer_name(&name).map_err(build_err("Set issuer"))?;

        let not_before = Asn1Time::from_unix(issued_secs as _).map_err(build_err("not_before"))?;
        let not_after = Asn1Time::from_unix(expires_secs as _).map_err(build_err("not_after"))?;
        builder
            .set_not_before(&not_before)
            .map_err(build_err("Set not_before"))?;
        builder
            .set_not_after(&not_after)
            .map_err(build_err("Set not_after"))?;

        builder.set_pubkey(&pkey).map_err(build_err("Set pubkey"))?;
        builder
            .append_extension(
                BasicConstraints::new()
                    .critical()
                    .build()
                    .map_err(build_err("Basic constraints"))?,
            )
            .map_err(build_err("Append basic constraints"))?;
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .digital_signature()
                    .non_repudiation()
                    .build()
                    .map_err(build_err("Key usage"))?,
            )
            .map_err(build_err("Append key usage"))?;

        builder
            .sign(&pkey, MessageDigest::sha256())
            .map_err(build_err("Sign certificate"))?;
        let x509 = builder.build();

        let certificate = Certificate::from_x509(&x509)
            .map_err(|e| CertificateIssuanceError::CertificateBuild(e.to_string()))?;
        log::info!(
            "Issued self-signed certificate for {} (serial {})",
            certificate.subject_dn(),
            certificate.serial_hex()
        );
        Ok(KeyMaterial::new(pkey, certificate))
    }
}

/// Parse `CN=alice,O=Example` into an X.509 name, entries in the given order.
///
/// Escaped commas are not supported.
pub fn parse_subject_dn(subject_dn: &str) -> Result<X509Name, CertificateIssuanceError> {
    let invalid = |msg: String| CertificateIssuanceError::InvalidSubject(msg);
    if subject_dn.trim().is_empty() {
        return Err(invalid("subject DN is empty".to_string()));
    }

    let mut builder =
        X509NameBuilder::new().map_err(|e| invalid(format!("Name builder: {e}")))?;
    for component in subject_dn.split(',') {
        let Some((field, value)) = component.split_once('=') else {
            return Err(invalid(format!("missing '=' in '{}'", component.trim())));
        };
        let (field, value) = (field.trim(), value.trim());
        if field.is_empty() || value.is_empty() {
            return Err(invalid(format!("empty attribute in '{}'", component.trim())));
        }
        builder
            .append_entry_by_text(field, value)
            .map_err(|e| invalid(format!("{field}={value}: {e}")))?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_self_signed_identity() {
        let key = CertificateIssuer::new()
            .issue_self_signed("CN=alice", 365)
            .unwrap();
        let cert = key.certificate();
        assert_eq!(cert.subject_dn(), "CN=alice");
        assert_eq!(cert.issuer_dn(), "CN=alice");
        assert!(cert.is_self_signed());
        assert_eq!(key.signature_algorithm().as_str(), "SHA256withRSA");

        let validity = cert.not_after().duration_since(cert.not_before()).unwrap();
        assert_eq!(validity, Duration::from_secs(365 * 24 * 60 * 60));

        let rsa = key.private_key().rsa().unwrap();
        assert_eq!(rsa.size() * 8, RSA_KEY_BITS);
    }

    #[test]
    fn test_certificate_key_matches_private_key() {
        let key = CertificateIssuer::new()
            .issue_self_signed("CN=bob,O=Example", 1)
            .unwrap();
        let public = key.certificate().public_key().unwrap();
        assert!(key.private_key().public_eq(&public));
    }

    #[test]
    fn test_serials_are_time_derived() {
        let issuer = CertificateIssuer::new();
        let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
        let key = issuer.issue_self_signed("CN=serial", 1).unwrap();
        let serial = u128::from_str_radix(&key.certificate().serial_hex(), 16).unwrap();
        assert!(serial >= before);
    }

    #[test]
    fn test_invalid_subjects() {
        for dn in ["", "alice", "CN=", "=alice", "NOTAFIELD=x"] {
            assert!(
                matches!(
                    parse_subject_dn(dn),
                    Err(CertificateIssuanceError::InvalidSubject(_))
                ),
                "DN should be rejected: {dn}"
            );
        }
    }
}
