//! Read-only walk over PKCS#12 SafeContents.
//!
//! `PKCS12_parse` hands back a single private key. Stores written by Java
//! `keytool` may hold several, each under its own friendlyName, so the key
//! bags are listed here and decrypted one by one by the loader.
//!
//! Only SafeContents carried as plain `id-data` are visited. Key bags inside
//! `id-encryptedData` are left to OpenSSL.

use cms::content_info::ContentInfo;
use der::asn1::{BmpString, ObjectIdentifier, OctetString, SetOfVec};
use der::{Any, Decode, Tag, TagNumber, Tagged};
use x509_cert::attr::Attribute;

use crate::domain::constants::{
    ID_DATA, PKCS12_KEY_BAG, PKCS12_SHROUDED_KEY_BAG, PKCS9_FRIENDLY_NAME,
};

/// Encoded private key of a key bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyBagValue {
    /// PKCS#8 `PrivateKeyInfo`
    Plain(Vec<u8>),
    /// PKCS#8 `EncryptedPrivateKeyInfo`
    Shrouded(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyBag {
    pub friendly_name: Option<String>,
    pub value: KeyBagValue,
}

/// Key bags of a DER-encoded PFX, in file order.
pub(crate) fn key_bags(pfx: &[u8]) -> der::Result<Vec<KeyBag>> {
    let pfx: Vec<Any> = Vec::from_der(pfx)?;
    let auth_safe: ContentInfo = pfx
        .get(1)
        .ok_or_else(|| Tag::Sequence.value_error())?
        .decode_as()?;
    if auth_safe.content_type != ID_DATA {
        // public-key integrity mode, nothing readable without the signer
        return Ok(Vec::new());
    }

    let safes: Vec<ContentInfo> =
        Vec::from_der(auth_safe.content.decode_as::<OctetString>()?.as_bytes())?;
    let mut bags = Vec::new();
    for safe in safes.iter().filter(|safe| safe.content_type == ID_DATA) {
        let contents: Vec<Any> =
            Vec::from_der(safe.content.decode_as::<OctetString>()?.as_bytes())?;
        for bag in &contents {
            if let Some(key_bag) = key_bag(bag)? {
                bags.push(key_bag);
            }
        }
    }
    Ok(bags)
}

// SafeBag ::= SEQUENCE { bagId, bagValue [0] EXPLICIT, bagAttributes SET OF OPTIONAL }
fn key_bag(bag: &Any) -> der::Result<Option<KeyBag>> {
    let fields: Vec<Any> = bag.decode_as()?;
    let (Some(bag_id), Some(bag_value)) = (fields.first(), fields.get(1)) else {
        return Err(Tag::Sequence.value_error());
    };
    let bag_id: ObjectIdentifier = bag_id.decode_as()?;
    let explicit = Tag::ContextSpecific {
        constructed: true,
        number: TagNumber::N0,
    };
    if bag_value.tag() != explicit {
        return Err(bag_value.tag().unexpected_error(Some(explicit)));
    }

    let encoded = bag_value.value().to_vec();
    let value = if bag_id == PKCS12_SHROUDED_KEY_BAG {
        KeyBagValue::Shrouded(encoded)
    } else if bag_id == PKCS12_KEY_BAG {
        KeyBagValue::Plain(encoded)
    } else {
        return Ok(None);
    };

    let friendly_name = match fields.get(2) {
        Some(attributes) => friendly_name(&attributes.decode_as()?)?,
        None => None,
    };
    Ok(Some(KeyBag {
        friendly_name,
        value,
    }))
}

fn friendly_name(attributes: &SetOfVec<Attribute>) -> der::Result<Option<String>> {
    let Some(attribute) = attributes.iter().find(|a| a.oid == PKCS9_FRIENDLY_NAME) else {
        return Ok(None);
    };
    match attribute.values.iter().next() {
        Some(value) => Ok(Some(value.decode_as::<BmpString>()?.to_string())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::issuer::CertificateIssuer;
    use openssl::pkcs12::Pkcs12;
    use openssl::x509::X509;

    fn openssl_pfx(name: Option<&str>) -> Vec<u8> {
        let key = CertificateIssuer::new()
            .issue_self_signed("CN=bags", 1)
            .unwrap();
        let cert = X509::from_der(key.certificate().as_der()).unwrap();
        let mut builder = Pkcs12::builder();
        if let Some(name) = name {
            builder.name(name);
        }
        builder.pkey(key.private_key()).cert(&cert);
        builder.build2("pw1234").unwrap().to_der().unwrap()
    }

    #[test]
    fn test_single_shrouded_key_bag() {
        let bags = key_bags(&openssl_pfx(Some("mykey"))).unwrap();
        assert_eq!(bags.len(), 1);
        assert_eq!(bags[0].friendly_name.as_deref(), Some("mykey"));
        assert!(matches!(bags[0].value, KeyBagValue::Shrouded(_)));
    }

    #[test]
    fn test_key_bag_without_name() {
        let bags = key_bags(&openssl_pfx(None)).unwrap();
        assert_eq!(bags.len(), 1);
        assert_eq!(bags[0].friendly_name, None);
    }

    #[test]
    fn test_not_a_pfx() {
        assert!(key_bags(b"\x30\x03\x02\x01\x03").is_err());
        assert!(key_bags(b"garbage").is_err());
    }
}
