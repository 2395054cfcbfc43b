//! Shared fixtures for integration tests.
//!
//! Keys are generated per test; nothing is read from disk.

#![allow(dead_code)]

pub mod pkcs12;

use cms::cert::CertificateChoices;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use der::asn1::{ObjectIdentifier, OctetString, SetOfVec};
use der::Tagged;
use der::{Any, Decode, Encode, Reader, SliceReader};
use docsign::domain::constants::{ID_CONTENT_TYPE, ID_DATA, ID_MESSAGE_DIGEST, ID_SIGNED_DATA};
use docsign::services::CertificateIssuer;
use docsign::{Certificate, HashAlgorithm, KeyMaterial, SignatureAlgorithm};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use openssl::x509::{X509Builder, X509NameBuilder};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;

pub const PASSWORD: &str = "pw1234";
pub const ALIAS: &str = "mykey";

pub fn rsa_key(cn: &str) -> KeyMaterial {
    CertificateIssuer::new()
        .issue_self_signed(&format!("CN={cn}"), 30)
        .expect("RSA identity")
}

pub fn ec_key(cn: &str) -> KeyMaterial {
    let group = openssl::ec::EcGroup::from_curve_name(openssl::nid::Nid::X9_62_PRIME256V1)
        .expect("P-256 group");
    let pkey = PKey::from_ec_key(openssl::ec::EcKey::generate(&group).expect("EC key"))
        .expect("EC pkey");
    CertificateIssuer::new()
        .certify(pkey, &format!("CN={cn}"), 30)
        .expect("EC identity")
}

pub fn dsa_key(cn: &str) -> KeyMaterial {
    let pkey = PKey::from_dsa(openssl::dsa::Dsa::generate(2048).expect("DSA key")).expect("DSA pkey");
    CertificateIssuer::new()
        .certify(pkey, &format!("CN={cn}"), 30)
        .expect("DSA identity")
}

/// RSA identity with a chosen serial, to build colliding issuer+serial pairs.
pub fn rsa_key_with_serial(cn: &str, serial: u32) -> KeyMaterial {
    let pkey = PKey::from_rsa(openssl::rsa::Rsa::generate(2048).unwrap()).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    let cert = Certificate::from_x509(&builder.build()).unwrap();
    KeyMaterial::new(pkey, cert)
}

pub fn decode_signed_data(container: &[u8]) -> SignedData {
    let info = ContentInfo::from_der(container).expect("ContentInfo");
    assert_eq!(info.content_type, ID_SIGNED_DATA);
    SignedData::from_der(&info.content.to_der().unwrap()).expect("SignedData")
}

pub fn encode_signed_data(signed_data: &SignedData) -> Vec<u8> {
    ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::encode_from(signed_data).unwrap(),
    }
    .to_der()
    .unwrap()
}

pub fn signer_infos(signed_data: &SignedData) -> Vec<SignerInfo> {
    signed_data.signer_infos.0.iter().cloned().collect()
}

/// Hand-built SignerInfo, optionally with signed attributes.
///
/// `declared` overrides the signatureAlgorithm OID written into the SignerInfo.
pub struct SignerTemplate<'a> {
    pub key: &'a KeyMaterial,
    pub hash: HashAlgorithm,
    pub with_signed_attrs: bool,
    pub declared: Option<ObjectIdentifier>,
    /// Value of the contentType signed attribute.
    pub content_type: ObjectIdentifier,
}

pub fn build_signer(template: &SignerTemplate<'_>, payload: &[u8]) -> SignerInfo {
    let md = template.hash.message_digest();
    let (signed_attrs, to_be_signed) = if template.with_signed_attrs {
        let digest = template.hash.digest(payload);
        let attrs: SignedAttributes = SetOfVec::try_from(vec![
            Attribute {
                oid: ID_CONTENT_TYPE,
                values: SetOfVec::try_from(vec![Any::encode_from(&template.content_type).unwrap()])
                    .unwrap(),
            },
            Attribute {
                oid: ID_MESSAGE_DIGEST,
                values: SetOfVec::try_from(vec![Any::encode_from(
                    &OctetString::new(digest.as_slice()).unwrap(),
                )
                .unwrap()])
                .unwrap(),
            },
        ])
        .unwrap();
        let der = attrs.to_der().unwrap();
        (Some(attrs), der)
    } else {
        (None, payload.to_vec())
    };

    let mut signer = Signer::new(md, template.key.private_key()).unwrap();
    let signature = signer.sign_oneshot_to_vec(&to_be_signed).unwrap();

    let default_algorithm = SignatureAlgorithm::for_key(template.key.algorithm()).algorithm_identifier();
    let signature_algorithm = match template.declared {
        Some(oid) => AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        },
        None => default_algorithm,
    };

    SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(template.key.certificate().issuer_and_serial()),
        digest_alg: AlgorithmIdentifierOwned {
            oid: template.hash.oid(),
            parameters: None,
        },
        signed_attrs,
        signature_algorithm,
        signature: OctetString::new(signature).unwrap(),
        unsigned_attrs: None,
    }
}

/// Detached container from explicit signers and certificates.
pub fn assemble(signers: Vec<SignerInfo>, certificates: &[&Certificate]) -> Vec<u8> {
    let mut digest_set = SetOfVec::new();
    for signer in &signers {
        if !digest_set.iter().any(|a: &AlgorithmIdentifierOwned| a == &signer.digest_alg) {
            digest_set.insert(signer.digest_alg.clone()).unwrap();
        }
    }

    let mut certificate_set = SetOfVec::new();
    for cert in certificates {
        certificate_set
            .insert(CertificateChoices::Certificate(cert.parsed().clone()))
            .unwrap();
    }

    let mut signer_set = SetOfVec::new();
    for signer in signers {
        signer_set.insert(signer).unwrap();
    }

    encode_signed_data(&SignedData {
        version: CmsVersion::V1,
        digest_algorithms: digest_set,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: None,
        },
        certificates: if certificates.is_empty() {
            None
        } else {
            Some(CertificateSet(certificate_set))
        },
        crls: None,
        signer_infos: SignerInfos(signer_set),
    })
}

/// Re-encode the outer `levels` of constructed values with indefinite
/// lengths, the way streaming BER producers write them.
pub fn indefinite_length(der: &[u8], levels: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut reader = SliceReader::new(der).unwrap();
    while !reader.is_finished() {
        let element = Any::decode(&mut reader).unwrap();
        if levels > 0 && element.tag().is_constructed() {
            out.push(u8::from(element.tag()));
            out.push(0x80);
            out.extend(indefinite_length(element.value(), levels - 1));
            out.extend([0x00, 0x00]);
        } else {
            out.extend(element.to_der().unwrap());
        }
    }
    out
}

/// Replace the single occurrence of `needle` with an equally long `replacement`.
pub fn replace_once(haystack: &mut [u8], needle: &[u8], replacement: &[u8]) {
    assert_eq!(needle.len(), replacement.len());
    let positions: Vec<usize> = haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(position, _)| position)
        .collect();
    assert_eq!(positions.len(), 1, "needle must occur exactly once");
    haystack[positions[0]..positions[0] + needle.len()].copy_from_slice(replacement);
}
