//! Hand-assembled PKCS#12 files holding several private keys.
//!
//! OpenSSL's builder writes a single key per file. Java `keytool` writes one
//! shrouded key bag and one certificate bag per entry, each tagged with a
//! friendlyName and a localKeyId, and protects the lot with an HMAC. The
//! fixture lays files out the same way.

use cms::content_info::ContentInfo;
use der::asn1::{BmpString, ObjectIdentifier, OctetString, SetOfVec};
use der::{Any, Encode, EncodeValue, Tag, TagNumber, Tagged};
use docsign::domain::constants::{
    ID_DATA, ID_SHA256, PKCS12_CERT_BAG, PKCS12_SHROUDED_KEY_BAG, PKCS9_FRIENDLY_NAME,
    PKCS9_LOCAL_KEY_ID, PKCS9_X509_CERTIFICATE,
};
use docsign::KeyMaterial;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use openssl::symm::Cipher;
use sha2::{Digest, Sha256};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;

const MAC_ITERATIONS: u32 = 2048;
const MAC_SALT: [u8; 8] = *b"docsign!";
// SHA-256 input block size
const KDF_BLOCK: usize = 64;

/// PKCS#12 with one key entry per `(alias, key)`, encrypted under `password`.
pub fn multi_key_pfx(entries: &[(&str, &KeyMaterial)], password: &str) -> Vec<u8> {
    let mut bags = Vec::new();
    for (index, (alias, key)) in entries.iter().enumerate() {
        let local_key_id = [index as u8 + 1];
        let shrouded = key
            .private_key()
            .private_key_to_pkcs8_passphrase(Cipher::aes_256_cbc(), password.as_bytes())
            .unwrap();
        bags.push(safe_bag(
            PKCS12_SHROUDED_KEY_BAG,
            shrouded,
            bag_attributes(alias, &local_key_id),
        ));

        let cert_bag = vec![
            any(&PKCS9_X509_CERTIFICATE),
            explicit(any(&OctetString::new(key.certificate().as_der()).unwrap()).to_der().unwrap()),
        ];
        bags.push(safe_bag(
            PKCS12_CERT_BAG,
            cert_bag.to_der().unwrap(),
            bag_attributes(alias, &local_key_id),
        ));
    }

    let auth_safe = vec![data(bags.to_der().unwrap())].to_der().unwrap();
    let mac_data = vec![
        any(&vec![
            any(&AlgorithmIdentifierOwned {
                oid: ID_SHA256,
                parameters: Some(Any::null()),
            }),
            any(&OctetString::new(mac(password, &auth_safe)).unwrap()),
        ]),
        any(&OctetString::new(MAC_SALT.to_vec()).unwrap()),
        any(&MAC_ITERATIONS),
    ];

    vec![any(&3u8), any(&data(auth_safe)), any(&mac_data)]
        .to_der()
        .unwrap()
}

fn any<T: Tagged + EncodeValue>(value: &T) -> Any {
    Any::encode_from(value).unwrap()
}

fn explicit(inner: Vec<u8>) -> Any {
    let tag = Tag::ContextSpecific {
        constructed: true,
        number: TagNumber::N0,
    };
    Any::new(tag, inner).unwrap()
}

fn data(content: Vec<u8>) -> ContentInfo {
    ContentInfo {
        content_type: ID_DATA,
        content: any(&OctetString::new(content).unwrap()),
    }
}

fn safe_bag(bag_id: ObjectIdentifier, value: Vec<u8>, attributes: Any) -> Any {
    any(&vec![any(&bag_id), explicit(value), attributes])
}

fn bag_attributes(alias: &str, local_key_id: &[u8]) -> Any {
    let attributes: SetOfVec<Attribute> = SetOfVec::try_from(vec![
        Attribute {
            oid: PKCS9_FRIENDLY_NAME,
            values: SetOfVec::try_from(vec![any(&BmpString::from_utf8(alias).unwrap())]).unwrap(),
        },
        Attribute {
            oid: PKCS9_LOCAL_KEY_ID,
            values: SetOfVec::try_from(vec![any(&OctetString::new(local_key_id).unwrap())])
                .unwrap(),
        },
    ])
    .unwrap();
    any(&attributes)
}

// RFC 7292 appendix B.2 with ID = 3 (MAC key). One SHA-256 block is the key.
fn mac_key(password: &str) -> Vec<u8> {
    let mut bmp: Vec<u8> = password.encode_utf16().flat_map(u16::to_be_bytes).collect();
    bmp.extend_from_slice(&[0, 0]);

    let mut input = vec![3u8; KDF_BLOCK];
    input.extend(repeat_to_blocks(&MAC_SALT));
    input.extend(repeat_to_blocks(&bmp));

    let mut block = Sha256::digest(&input).to_vec();
    for _ in 1..MAC_ITERATIONS {
        block = Sha256::digest(&block).to_vec();
    }
    block
}

fn repeat_to_blocks(bytes: &[u8]) -> Vec<u8> {
    let len = bytes.len().div_ceil(KDF_BLOCK) * KDF_BLOCK;
    bytes.iter().copied().cycle().take(len).collect()
}

fn mac(password: &str, auth_safe: &[u8]) -> Vec<u8> {
    let key = PKey::hmac(&mac_key(password)).unwrap();
    let mut signer = Signer::new(MessageDigest::sha256(), &key).unwrap();
    signer.update(auth_safe).unwrap();
    signer.sign_to_vec().unwrap()
}
