//! Detached CMS `SignedData` construction.
//!
//! The payload digest travels in the `messageDigest` signed attribute and the
//! private key signs the DER `SET OF` signed attributes; the payload itself is
//! never embedded in the container.

use std::time::SystemTime;

use cms::cert::CertificateChoices;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use der::asn1::{OctetString, SetOfVec, UtcTime};
use der::{Any, Encode};
use openssl::sign::Signer;
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;

use crate::domain::constants::{
    ID_CONTENT_TYPE, ID_DATA, ID_MESSAGE_DIGEST, ID_SIGNED_DATA, ID_SIGNING_TIME,
};
use crate::domain::container::SignatureContainer;
use crate::domain::crypto::{DigestBytes, HashAlgorithm, KeyMaterial, SignatureAlgorithm};
use crate::infra::error::{SigningError, SigningResult};
use crate::infra::provider::ensure_crypto_provider_initialized;

/// Produces detached signature containers from key material.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureEngine {
    algorithm: Option<SignatureAlgorithm>,
}

impl SignatureEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a signature algorithm instead of deriving it from the key.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Like [`Self::with_algorithm`], taking a JCA-style name such as `SHA256withECDSA`.
    pub fn with_algorithm_name(self, name: &str) -> SigningResult<Self> {
        let algorithm = name
            .parse::<SignatureAlgorithm>()
            .map_err(SigningError::UnsupportedAlgorithm)?;
        Ok(self.with_algorithm(algorithm))
    }

    fn select_algorithm(&self, key: &KeyMaterial) -> SigningResult<SignatureAlgorithm> {
        let algorithm = self
            .algorithm
            .unwrap_or_else(|| key.signature_algorithm());
        // Covers the RSA fallback for unknown key types too
        if algorithm.key_algorithm() != key.algorithm() {
            return Err(SigningError::CryptoFailure(format!(
                "{} key cannot produce {algorithm}",
                key.algorithm()
            )));
        }
        Ok(algorithm)
    }

    /// Sign `payload` and return the DER `ContentInfo`.
    pub fn sign(&self, payload: &[u8], key: &KeyMaterial) -> SigningResult<SignatureContainer> {
        ensure_crypto_provider_initialized();
        let algorithm = self.select_algorithm(key)?;
        let hash = algorithm.hash_algorithm();
        let digest = hash.digest(payload);
        log::debug!(
            "Signing {} bytes as {} for {}",
            payload.len(),
            algorithm,
            key.certificate().subject_dn()
        );

        let signed_attrs = build_signed_attributes(&digest, SystemTime::now())?;
        let signature = sign_attributes(&signed_attrs, key, hash)?;

        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(key.certificate().issuer_and_serial()),
            digest_alg: digest_algorithm_identifier(hash),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: algorithm.algorithm_identifier(),
            signature: OctetString::new(signature)?,
            unsigned_attrs: None,
        };

        let certificates = SetOfVec::try_from(vec![CertificateChoices::Certificate(
            key.certificate().parsed().clone(),
        )])?;
        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![digest_algorithm_identifier(hash)])?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(certificates)),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
        };

        let content_info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data)?,
        };
        let der = content_info.to_der()?;
        log::info!("Created {algorithm} signature container ({} bytes)", der.len());
        Ok(SignatureContainer::new(der, algorithm))
    }
}

fn digest_algorithm_identifier(hash: HashAlgorithm) -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: hash.oid(),
        parameters: None,
    }
}

fn attribute(oid: der::asn1::ObjectIdentifier, value: Any) -> SigningResult<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// contentType, signingTime and messageDigest, sorted into DER SET OF order.
pub(crate) fn build_signed_attributes(
    digest: &DigestBytes,
    signing_time: SystemTime,
) -> SigningResult<SignedAttributes> {
    let attributes = vec![
        attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_DATA)?)?,
        attribute(
            ID_SIGNING_TIME,
            Any::encode_from(&UtcTime::from_system_time(signing_time)?)?,
        )?,
        attribute(
            ID_MESSAGE_DIGEST,
            Any::encode_from(&OctetString::new(digest.as_slice())?)?,
        )?,
    ];
    Ok(SetOfVec::try_from(attributes)?)
}

fn sign_attributes(
    signed_attrs: &SignedAttributes,
    key: &KeyMaterial,
    hash: HashAlgorithm,
) -> SigningResult<Vec<u8>> {
    // Signed over the explicit SET OF encoding, not the [0] IMPLICIT form
    let to_be_signed = signed_attrs.to_der()?;
    let mut signer = Signer::new(hash.message_digest(), key.private_key())?;
    Ok(signer.sign_oneshot_to_vec(&to_be_signed)?)
}
