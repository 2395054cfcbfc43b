//! Keystore loading, alias resolution and serialization.
//!
//! Formats are tried in a fixed priority order. The first format with an
//! implementation in this build becomes the type handle, and the bytes are
//! parsed exactly once with it; a parse failure does not advance to the next
//! format.

use std::collections::BTreeMap;
use std::fmt;
use std::os::raw::c_int;
use std::path::Path;
use std::str::FromStr;

use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::x509::{X509Ref, X509};
use sha2::{Digest, Sha256};

use crate::domain::crypto::{Certificate, KeyMaterial};
use crate::domain::types::{KeyAlias, KeystorePassword};
use crate::infra::error::{KeystoreError, KeystoreResult};
use crate::infra::provider::{ensure_crypto_provider_initialized, legacy_ciphers_available};
use crate::services::pkcs12::{self, KeyBag, KeyBagValue};

/// Keystore container encodings, in the order callers usually try them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeystoreFormat {
    /// Java KeyStore (`0xFEEDFEED`)
    Jks,
    /// PKCS#12 / PFX
    Pkcs12,
    /// Bouncy Castle keystore
    Bks,
    /// Platform default keystore type (PKCS#12)
    Default,
}

impl KeystoreFormat {
    /// Default priority order.
    pub const PRIORITY: [KeystoreFormat; 4] = [
        KeystoreFormat::Jks,
        KeystoreFormat::Pkcs12,
        KeystoreFormat::Bks,
        KeystoreFormat::Default,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            KeystoreFormat::Jks => "jks",
            KeystoreFormat::Pkcs12 => "pkcs12",
            KeystoreFormat::Bks => "bks",
            KeystoreFormat::Default => "default",
        }
    }

    /// Whether this build carries an implementation for the format.
    #[must_use]
    pub fn is_available(&self) -> bool {
        match self {
            KeystoreFormat::Pkcs12 | KeystoreFormat::Default => true,
            KeystoreFormat::Jks | KeystoreFormat::Bks => false,
        }
    }

    fn load(self, bytes: &[u8], password: &KeystorePassword) -> KeystoreResult<Keystore> {
        match self {
            KeystoreFormat::Pkcs12 | KeystoreFormat::Default => load_pkcs12(self, bytes, password),
            KeystoreFormat::Jks | KeystoreFormat::Bks => Err(KeystoreError::UnsupportedFormat {
                tried: self.as_str().to_string(),
            }),
        }
    }
}

impl fmt::Display for KeystoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeystoreFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jks" => Ok(KeystoreFormat::Jks),
            "pkcs12" | "p12" | "pfx" => Ok(KeystoreFormat::Pkcs12),
            "bks" => Ok(KeystoreFormat::Bks),
            "default" => Ok(KeystoreFormat::Default),
            other => Err(format!("unknown keystore format: {other}")),
        }
    }
}

/// Opens keystore containers using an ordered list of formats.
#[derive(Debug, Clone)]
pub struct KeystoreLoader {
    formats: Vec<KeystoreFormat>,
}

impl Default for KeystoreLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl KeystoreLoader {
    /// Loader with the default priority `jks, pkcs12, bks, default`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            formats: KeystoreFormat::PRIORITY.to_vec(),
        }
    }

    #[must_use]
    pub fn with_formats(formats: Vec<KeystoreFormat>) -> Self {
        Self { formats }
    }

    #[must_use]
    pub fn formats(&self) -> &[KeystoreFormat] {
        &self.formats
    }

    /// First available format in priority order.
    pub fn select_format(&self) -> KeystoreResult<KeystoreFormat> {
        for format in &self.formats {
            if format.is_available() {
                return Ok(*format);
            }
            log::warn!("{format} keystore not available, trying next format");
        }
        Err(KeystoreError::UnsupportedFormat {
            tried: self
                .formats
                .iter()
                .map(KeystoreFormat::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Open a keystore from bytes.
    pub fn open(&self, bytes: &[u8], password: &KeystorePassword) -> KeystoreResult<Keystore> {
        ensure_crypto_provider_initialized();
        let format = self.select_format()?;
        log::debug!("Opening keystore as {format}");
        let keystore = format.load(bytes, password)?;
        log::info!(
            "Keystore loaded successfully ({format}, {} entries)",
            keystore.len()
        );
        Ok(keystore)
    }

    /// Read a keystore file and open it.
    pub fn open_path<P: AsRef<Path>>(
        &self,
        path: P,
        password: &KeystorePassword,
    ) -> KeystoreResult<Keystore> {
        let path = path.as_ref();
        log::debug!("Keystore path: {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| {
            KeystoreError::IoFailure(format!(
                "Cannot open keystore file {}: {e}",
                path.display()
            ))
        })?;
        self.open(&bytes, password)
    }
}

/// One aliased keystore entry.
#[derive(Debug, Clone)]
pub enum KeystoreEntry {
    /// Asymmetric private key with its certificate
    PrivateKey(KeyMaterial),
    /// Certificate without a private key
    TrustedCertificate(Certificate),
}

impl KeystoreEntry {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            KeystoreEntry::PrivateKey(_) => "private key entry",
            KeystoreEntry::TrustedCertificate(_) => "trusted certificate entry",
        }
    }

    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        match self {
            KeystoreEntry::PrivateKey(key) => key.certificate(),
            KeystoreEntry::TrustedCertificate(cert) => cert,
        }
    }
}

/// An opened keystore: aliased entries unlocked by one password.
pub struct Keystore {
    format: KeystoreFormat,
    entries: BTreeMap<String, KeystoreEntry>,
    // SHA-256 of the unlocking password; None for keystores built in memory
    password_fingerprint: Option<[u8; 32]>,
}

impl Keystore {
    /// In-memory keystore holding a single private key entry.
    #[must_use]
    pub fn with_key_entry(alias: &KeyAlias, key: KeyMaterial) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(alias.as_str().to_string(), KeystoreEntry::PrivateKey(key));
        Self {
            format: KeystoreFormat::Pkcs12,
            entries,
            password_fingerprint: None,
        }
    }

    /// In-memory keystore holding a single certificate entry.
    #[must_use]
    pub fn with_certificate_entry(alias: &KeyAlias, certificate: Certificate) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            alias.as_str().to_string(),
            KeystoreEntry::TrustedCertificate(certificate),
        );
        Self {
            format: KeystoreFormat::Pkcs12,
            entries,
            password_fingerprint: None,
        }
    }

    #[must_use]
    pub fn format(&self) -> KeystoreFormat {
        self.format
    }

    /// All aliases, sorted.
    #[must_use]
    pub fn aliases(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    #[must_use]
    pub fn contains_alias(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    #[must_use]
    pub fn entry(&self, alias: &str) -> Option<&KeystoreEntry> {
        self.entries.get(alias)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `alias` to key material.
    pub fn resolve(&self, alias: &str, password: &KeystorePassword) -> KeystoreResult<KeyMaterial> {
        let Some(entry) = self.entries.get(alias) else {
            let available = self.aliases();
            log::warn!("Alias '{alias}' not found in keystore");
            log::debug!("Available aliases: {available:?}");
            return Err(KeystoreError::AliasNotFound {
                alias: alias.to_string(),
                available,
            });
        };

        if let Some(expected) = &self.password_fingerprint {
            if !openssl::memcmp::eq(expected, &fingerprint(password)) {
                return Err(KeystoreError::BadPassword(format!(
                    "Cannot recover key for alias '{alias}'"
                )));
            }
        }

        match entry {
            KeystoreEntry::PrivateKey(key) => {
                log::debug!("Private key algorithm: {}", key.algorithm());
                log::debug!("Certificate subject: {}", key.certificate().subject_dn());
                Ok(key.clone())
            }
            other => Err(KeystoreError::KeyTypeMismatch {
                alias: alias.to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    /// Encode as a password-protected PKCS#12 container.
    ///
    /// The container holds exactly one entry, stored under its alias as the
    /// PKCS#12 friendly name so `open` + `resolve` recover it unchanged.
    pub fn serialize(&self, password: &KeystorePassword) -> KeystoreResult<Vec<u8>> {
        ensure_crypto_provider_initialized();
        let mut iter = self.entries.iter();
        let (Some((alias, entry)), None) = (iter.next(), iter.next()) else {
            return Err(KeystoreError::Unserializable(format!(
                "PKCS#12 output holds exactly one entry, keystore has {}",
                self.entries.len()
            )));
        };

        let cert = X509::from_der(entry.certificate().as_der())
            .map_err(|e| KeystoreError::Unserializable(format!("Certificate: {e}")))?;
        let mut builder = Pkcs12::builder();
        builder.name(alias);
        builder.cert(&cert);
        if let KeystoreEntry::PrivateKey(key) = entry {
            builder.pkey(key.private_key());
        }
        let pkcs12 = builder
            .build2(password.as_str())
            .map_err(|e| KeystoreError::Unserializable(format!("PKCS#12 build failed: {e}")))?;
        let der = pkcs12
            .to_der()
            .map_err(|e| KeystoreError::Unserializable(format!("PKCS#12 encoding failed: {e}")))?;
        log::debug!("Serialized keystore entry '{alias}' ({} bytes)", der.len());
        Ok(der)
    }
}

impl fmt::Debug for Keystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keystore")
            .field("format", &self.format)
            .field("aliases", &self.aliases())
            .finish()
    }
}

fn fingerprint(password: &KeystorePassword) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

fn alias_of(cert: &X509Ref, fallback: String) -> String {
    cert.alias()
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .filter(|alias| !alias.is_empty())
        .unwrap_or(fallback)
}

fn certificate(cert: &X509Ref) -> KeystoreResult<Certificate> {
    Certificate::from_x509(cert)
        .map_err(|e| KeystoreError::Malformed(format!("Unreadable certificate: {e}")))
}

fn insert_entry(entries: &mut BTreeMap<String, KeystoreEntry>, alias: String, entry: KeystoreEntry) {
    if entries.contains_key(&alias) {
        log::warn!("Duplicate alias '{alias}' in keystore, keeping first entry");
        return;
    }
    entries.insert(alias, entry);
}

// ERR_LIB_PKCS12 / PKCS12_R_MAC_VERIFY_FAILURE
const LIB_PKCS12: c_int = 35;
const MAC_VERIFY_FAILURE: c_int = 113;

// Only a failed MAC means the password is wrong; anything else is the file.
fn parse_failure(error: ErrorStack) -> KeystoreError {
    let mac_failed = error.errors().iter().any(|e| {
        (e.library_code() == LIB_PKCS12 && e.reason_code() == MAC_VERIFY_FAILURE)
            || e.reason().is_some_and(|r| r.contains("mac verify failure"))
    });
    let reasons: Vec<&str> = error.errors().iter().filter_map(|e| e.reason()).collect();
    if mac_failed {
        return KeystoreError::BadPassword(format!("Keystore integrity check failed: {error}"));
    }
    if reasons.iter().any(|r| r.contains("unsupported")) && !legacy_ciphers_available() {
        return KeystoreError::Malformed(format!(
            "Keystore uses a cipher this OpenSSL build cannot load (legacy provider missing): {error}"
        ));
    }
    KeystoreError::Malformed(format!("Cannot decode PKCS#12 contents: {error}"))
}

fn plaintext_key_bags(pkcs12: &Pkcs12) -> Vec<KeyBag> {
    let bags = pkcs12
        .to_der()
        .map_err(|e| e.to_string())
        .and_then(|der| pkcs12::key_bags(&der).map_err(|e| e.to_string()));
    match bags {
        Ok(bags) => bags,
        Err(e) => {
            log::debug!("SafeContents not inspected: {e}");
            Vec::new()
        }
    }
}

// Pairs every key bag with the certificate holding its public key.
fn key_entries(
    bags: Vec<KeyBag>,
    certificates: &mut Vec<X509>,
    password: &KeystorePassword,
) -> KeystoreResult<Vec<(String, KeyMaterial)>> {
    let mut keys = Vec::with_capacity(bags.len());
    for (index, bag) in bags.into_iter().enumerate() {
        let alias = bag
            .friendly_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| (index + 1).to_string());
        let pkey = match &bag.value {
            KeyBagValue::Shrouded(der) => {
                PKey::private_key_from_pkcs8_passphrase(der, password.as_bytes())
            }
            KeyBagValue::Plain(der) => PKey::private_key_from_pkcs8(der),
        }
        .map_err(|e| KeystoreError::Malformed(format!("Cannot decrypt key '{alias}': {e}")))?;

        let position = certificates
            .iter()
            .position(|cert| {
                cert.public_key()
                    .map(|public| public.public_eq(&pkey))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                KeystoreError::Malformed(format!("Key '{alias}' has no matching certificate"))
            })?;
        let cert = certificates.remove(position);
        keys.push((alias, KeyMaterial::new(pkey, certificate(&cert)?)));
    }
    Ok(keys)
}

fn load_pkcs12(
    format: KeystoreFormat,
    bytes: &[u8],
    password: &KeystorePassword,
) -> KeystoreResult<Keystore> {
    let pkcs12 = Pkcs12::from_der(bytes)
        .map_err(|e| KeystoreError::Malformed(format!("Not a PKCS#12 container: {e}")))?;
    let parsed = pkcs12.parse2(password.as_str()).map_err(parse_failure)?;

    let mut entries = BTreeMap::new();
    let mut certificates: Vec<X509> = parsed
        .ca
        .map(|ca| ca.into_iter().collect())
        .unwrap_or_default();

    let bags = plaintext_key_bags(&pkcs12);
    if bags.len() > 1 {
        log::debug!("Keystore holds {} key entries", bags.len());
        if let Some(cert) = parsed.cert {
            certificates.insert(0, cert);
        }
        for (alias, material) in key_entries(bags, &mut certificates, password)? {
            insert_entry(&mut entries, alias, KeystoreEntry::PrivateKey(material));
        }
    } else {
        match (parsed.pkey, parsed.cert) {
            (Some(pkey), Some(cert)) => {
                let alias = alias_of(&cert, "1".to_string());
                let material = KeyMaterial::new(pkey, certificate(&cert)?);
                entries.insert(alias, KeystoreEntry::PrivateKey(material));
            }
            (Some(_), None) => {
                return Err(KeystoreError::Malformed(
                    "Private key has no matching certificate".to_string(),
                ));
            }
            (None, Some(cert)) => {
                let alias = alias_of(&cert, "1".to_string());
                entries.insert(alias, KeystoreEntry::TrustedCertificate(certificate(&cert)?));
            }
            (None, None) => {}
        }
    }

    for (index, cert) in certificates.iter().enumerate() {
        let alias = alias_of(cert, format!("cert-{}", index + 1));
        insert_entry(&mut entries, alias, KeystoreEntry::TrustedCertificate(certificate(cert)?));
    }

    Ok(Keystore {
        format,
        entries,
        password_fingerprint: Some(fingerprint(password)),
    })
}
