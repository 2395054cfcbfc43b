//! Verification service: checks a detached signature container against the
//! payload it claims to sign.
//!
//! Authenticates "signed by the certificate embedded in the container" only;
//! no chain building, trust store or revocation checks take place. Every
//! failure collapses to a negative report, never an error.
//!
//! Signers are evaluated in the order they are encoded, and signed attributes
//! are verified over the bytes found in the container rather than over a
//! re-encoding, which would differ whenever the producer did not sort them.
//! BER input (indefinite lengths from streaming producers) is re-encoded as
//! DER by OpenSSL before decoding.

use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedAttributes, SignedData, SignerIdentifier, SignerInfo};
use der::asn1::ObjectIdentifier;
use der::{Any, Decode, Encode, Tag, TagNumber, Tagged};
use openssl::cms::CmsContentInfo;
use openssl::pkey::{PKey, Public};
use openssl::sign::Verifier;
use serde::Serialize;

use crate::domain::constants::{ID_CONTENT_TYPE, ID_MESSAGE_DIGEST, ID_SIGNED_DATA};
use crate::domain::crypto::{Certificate, DeclaredAlgorithm, HashAlgorithm, KeyAlgorithm};
use crate::domain::verification::{SignerFailure, SignerOutcome, VerificationReport};
use crate::infra::error::{DocSignError, DocSignResult};
use crate::infra::provider::ensure_crypto_provider_initialized;

/// Operator-facing description of a certificate embedded in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: String,
    pub not_after: String,
    pub self_signed: bool,
}

impl From<&Certificate> for CertificateSummary {
    fn from(cert: &Certificate) -> Self {
        let validity = &cert.parsed().tbs_certificate.validity;
        Self {
            subject: cert.subject_dn(),
            issuer: cert.issuer_dn(),
            serial: cert.serial_hex(),
            not_before: validity.not_before.to_date_time().to_string(),
            not_after: validity.not_after.to_date_time().to_string(),
            self_signed: cert.is_self_signed(),
        }
    }
}

/// Stateless verifier for detached CMS `SignedData` containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// `true` when at least one signer verifies over `payload`.
    #[must_use]
    pub fn verify(&self, payload: &[u8], container: &[u8]) -> bool {
        self.verify_detailed(payload, container).is_verified()
    }

    /// Evaluate signers in container order, stopping at the first success.
    #[must_use]
    pub fn verify_detailed(&self, payload: &[u8], container: &[u8]) -> VerificationReport {
        ensure_crypto_provider_initialized();
        let decoded = match decode_container(container) {
            Ok(decoded) => decoded,
            Err(msg) => {
                log::debug!("Container rejected: {msg}");
                return VerificationReport::malformed(msg);
            }
        };

        let certificates = embedded_certificates(&decoded.signed_data);
        let content_type = decoded.signed_data.encap_content_info.econtent_type;
        let mut outcomes = Vec::new();
        for (index, signer) in decoded.signers.iter().enumerate() {
            let outcome = verify_signer(index, signer, &certificates, &content_type, payload);
            match &outcome.failure {
                None => log::debug!("Signer {index} verified"),
                Some(failure) => log::debug!("Signer {index} skipped: {failure}"),
            }
            let verified = outcome.verified();
            outcomes.push(outcome);
            if verified {
                break;
            }
        }

        let report = VerificationReport::from_signers(outcomes);
        log::info!(
            "Verification result: {}",
            if report.is_verified() {
                "verified"
            } else {
                "not verified"
            }
        );
        report
    }

    /// List the certificates carried by a container.
    pub fn inspect(&self, container: &[u8]) -> DocSignResult<Vec<CertificateSummary>> {
        ensure_crypto_provider_initialized();
        let decoded = decode_container(container).map_err(DocSignError::InvalidInput)?;
        Ok(embedded_certificates(&decoded.signed_data)
            .iter()
            .map(CertificateSummary::from)
            .collect())
    }
}

const SIGNED_ATTRS_TAG: Tag = Tag::ContextSpecific {
    constructed: true,
    number: TagNumber::N0,
};

struct DecodedContainer {
    signed_data: SignedData,
    // encoded order, which `SignedData::signer_infos` does not keep
    signers: Vec<EncodedSigner>,
}

/// A SignerInfo together with its signed attributes as they were signed.
struct EncodedSigner {
    info: SignerInfo,
    // DER `SET OF Attribute` rebuilt from the `[0]` contents in the container
    signed_attrs: Option<Vec<u8>>,
}

fn decode_container(container: &[u8]) -> Result<DecodedContainer, String> {
    let content_info = content_info(container)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(format!(
            "content type {} is not signedData",
            content_info.content_type
        ));
    }
    let inner = content_info
        .content
        .to_der()
        .map_err(|e| format!("content re-encode failed: {e}"))?;
    let signed_data = SignedData::from_der(&inner).map_err(|e| format!("invalid SignedData: {e}"))?;
    let signers =
        encoded_signers(&content_info.content).map_err(|e| format!("invalid SignerInfos: {e}"))?;
    Ok(DecodedContainer {
        signed_data,
        signers,
    })
}

fn content_info(container: &[u8]) -> Result<ContentInfo, String> {
    let der_error = match ContentInfo::from_der(container) {
        Ok(info) => return Ok(info),
        Err(e) => e,
    };
    let der = CmsContentInfo::from_der(container)
        .and_then(|cms| cms.to_der())
        .map_err(|_| format!("not a CMS ContentInfo: {der_error}"))?;
    log::debug!(
        "BER container re-encoded as DER ({} -> {} bytes)",
        container.len(),
        der.len()
    );
    ContentInfo::from_der(&der).map_err(|e| format!("not a CMS ContentInfo: {e}"))
}

fn encoded_signers(signed_data: &Any) -> der::Result<Vec<EncodedSigner>> {
    let fields: Vec<Any> = signed_data.decode_as()?;
    let set = fields.last().ok_or_else(|| Tag::Sequence.value_error())?;
    if set.tag() != Tag::Set {
        return Err(set.tag().unexpected_error(Some(Tag::Set)));
    }
    // SET OF decoding sorts its elements; read the same bytes as a SEQUENCE
    let signers: Vec<Any> = Any::new(Tag::Sequence, set.value())?.decode_as()?;

    signers
        .iter()
        .map(|signer| {
            let info: SignerInfo = signer.decode_as()?;
            let parts: Vec<Any> = signer.decode_as()?;
            // version, sid and digestAlgorithm come first
            let signed_attrs = parts
                .iter()
                .skip(3)
                .find(|part| part.tag() == SIGNED_ATTRS_TAG)
                .map(|part| Any::new(Tag::Set, part.value()).and_then(|set| set.to_der()))
                .transpose()?;
            Ok(EncodedSigner { info, signed_attrs })
        })
        .collect()
}

// Certificates that do not decode are ignored; they can never match a signer.
fn embedded_certificates(signed_data: &SignedData) -> Vec<Certificate> {
    let Some(set) = &signed_data.certificates else {
        return Vec::new();
    };
    set.0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => Certificate::from_parsed(cert.clone()).ok(),
            CertificateChoices::Other(_) => None,
        })
        .collect()
}

fn verify_signer(
    index: usize,
    encoded: &EncodedSigner,
    certificates: &[Certificate],
    content_type: &ObjectIdentifier,
    payload: &[u8],
) -> SignerOutcome {
    let signer = &encoded.info;
    let fail = |subject: Option<String>, failure| SignerOutcome {
        index,
        subject,
        failure: Some(failure),
    };

    let SignerIdentifier::IssuerAndSerialNumber(id) = &signer.sid else {
        return fail(None, SignerFailure::UnsupportedSignerIdentifier);
    };
    let matching: Vec<&Certificate> = certificates.iter().filter(|c| c.matches(id)).collect();
    let cert = match matching.as_slice() {
        [] => return fail(None, SignerFailure::NoMatchingCertificate),
        [cert] => *cert,
        many => return fail(None, SignerFailure::AmbiguousCertificate(many.len())),
    };
    let subject = Some(cert.subject_dn());

    let Some(declared) =
        DeclaredAlgorithm::from_oids(&signer.signature_algorithm.oid, &signer.digest_alg.oid)
    else {
        return fail(
            subject,
            SignerFailure::UnsupportedAlgorithm(signer.signature_algorithm.oid.to_string()),
        );
    };
    let Ok(public_key) = cert.public_key() else {
        return fail(
            subject,
            SignerFailure::UnsupportedAlgorithm("undecodable public key".to_string()),
        );
    };
    let key_algorithm = KeyAlgorithm::of(&public_key);
    if key_algorithm != declared.key {
        return fail(
            subject,
            SignerFailure::UnsupportedAlgorithm(format!(
                "{} signature with {key_algorithm} key",
                declared.key
            )),
        );
    }

    let signature = signer.signature.as_bytes();
    let verified = match (&signer.signed_attrs, &encoded.signed_attrs) {
        (Some(attrs), Some(signed_bytes)) => {
            if !content_type_matches(attrs, content_type) {
                return fail(subject, SignerFailure::ContentTypeMismatch);
            }
            if !message_digest_matches(attrs, declared.hash, payload) {
                return fail(subject, SignerFailure::DigestMismatch);
            }
            check_signature(&public_key, declared.hash, signed_bytes, signature)
        }
        (Some(_), None) => false,
        (None, _) => check_signature(&public_key, declared.hash, payload, signature),
    };

    if verified {
        SignerOutcome {
            index,
            subject,
            failure: None,
        }
    } else {
        fail(subject, SignerFailure::SignatureInvalid)
    }
}

// The value of an attribute that occurs once with exactly one value.
fn single_value<'a>(attrs: &'a SignedAttributes, oid: &ObjectIdentifier) -> Option<&'a Any> {
    let mut found = attrs.iter().filter(|attr| &attr.oid == oid);
    let (Some(attr), None) = (found.next(), found.next()) else {
        return None;
    };
    let mut values = attr.values.iter();
    match (values.next(), values.next()) {
        (Some(value), None) => Some(value),
        _ => None,
    }
}

fn content_type_matches(attrs: &SignedAttributes, expected: &ObjectIdentifier) -> bool {
    single_value(attrs, &ID_CONTENT_TYPE)
        .and_then(|value| value.decode_as::<ObjectIdentifier>().ok())
        .is_some_and(|oid| &oid == expected)
}

fn message_digest_matches(attrs: &SignedAttributes, hash: HashAlgorithm, payload: &[u8]) -> bool {
    single_value(attrs, &ID_MESSAGE_DIGEST).is_some_and(|value| {
        value.tag() == Tag::OctetString && hash.digest(payload).matches(value.value())
    })
}

fn check_signature(key: &PKey<Public>, hash: HashAlgorithm, data: &[u8], signature: &[u8]) -> bool {
    Verifier::new(hash.message_digest(), key)
        .and_then(|mut verifier| verifier.verify_oneshot(signature, data))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verification::{NotVerifiedReason, VerificationOutcome};
    use crate::services::cms_builder::SignatureEngine;
    use crate::services::issuer::CertificateIssuer;

    fn signed(payload: &[u8]) -> (Vec<u8>, Certificate) {
        let key = CertificateIssuer::new()
            .issue_self_signed("CN=alice", 30)
            .unwrap();
        let container = SignatureEngine::new().sign(payload, &key).unwrap();
        (container.into_der(), key.certificate().clone())
    }

    #[test]
    fn test_round_trip() {
        let (container, _) = signed(b"hello world");
        let verifier = SignatureVerifier::new();
        assert!(verifier.verify(b"hello world", &container));

        let report = verifier.verify_detailed(b"hello world", &container);
        assert_eq!(report.outcome, VerificationOutcome::Verified);
        assert_eq!(
            report.verified_signer().and_then(|s| s.subject.as_deref()),
            Some("CN=alice")
        );
    }

    #[test]
    fn test_payload_tamper_is_digest_mismatch() {
        let (container, _) = signed(b"hello world");
        let report = SignatureVerifier::new().verify_detailed(b"hello worlD", &container);
        assert!(!report.is_verified());
        assert_eq!(report.signers.len(), 1);
        assert_eq!(report.signers[0].failure, Some(SignerFailure::DigestMismatch));
    }

    #[test]
    fn test_indefinite_length_outer_sequence() {
        let (container, _) = signed(b"hello world");
        let header = match container[1] {
            long if long & 0x80 != 0 => 2 + usize::from(long & 0x7f),
            _ => 2,
        };
        let mut ber = vec![0x30, 0x80];
        ber.extend_from_slice(&container[header..]);
        ber.extend_from_slice(&[0x00, 0x00]);
        assert!(ContentInfo::from_der(&ber).is_err());

        let verifier = SignatureVerifier::new();
        assert!(verifier.verify(b"hello world", &ber));
        assert!(!verifier.verify(b"hello worlD", &ber));
    }

    #[test]
    fn test_signed_attributes_taken_from_container() {
        let (container, _) = signed(b"data");
        let decoded = decode_container(&container).unwrap();
        assert_eq!(decoded.signers.len(), 1);
        let signer = &decoded.signers[0];
        let reencoded = signer.info.signed_attrs.as_ref().unwrap().to_der().unwrap();
        assert_eq!(signer.signed_attrs.as_deref(), Some(reencoded.as_slice()));
        assert_eq!(&reencoded[..1], &[0x31]);
    }

    #[test]
    fn test_malformed_container() {
        let verifier = SignatureVerifier::new();
        let inputs: [&[u8]; 3] = [b"", b"not a container", &[0x30, 0x03, 0x02, 0x01, 0x01]];
        for bytes in inputs {
            let report = verifier.verify_detailed(b"payload", bytes);
            assert!(matches!(
                report.outcome,
                VerificationOutcome::NotVerified(NotVerifiedReason::Malformed(_))
            ));
            assert!(!verifier.verify(b"payload", bytes));
        }
    }

    #[test]
    fn test_inspect_lists_signer_certificate() {
        let (container, cert) = signed(b"data");
        let summaries = SignatureVerifier::new().inspect(&container).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0], CertificateSummary::from(&cert));
        assert_eq!(summaries[0].subject, "CN=alice");
        assert!(summaries[0].self_signed);

        assert!(matches!(
            SignatureVerifier::new().inspect(b"junk"),
            Err(DocSignError::InvalidInput(_))
        ));
    }
}
