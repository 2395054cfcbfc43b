use std::fmt;
use std::time::SystemTime;

use cms::cert::IssuerAndSerialNumber;
use der::{Decode, Encode};
use openssl::pkey::{PKey, Public};
use openssl::x509::{X509Ref, X509};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

/// Errors raised while decoding certificate material.
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate decode failed: {0}")]
    Decode(#[from] der::Error),
    #[error("certificate key extraction failed: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}

/// Immutable X.509 certificate: the raw DER plus its decoded structure.
#[derive(Clone)]
pub struct Certificate {
    der: Box<[u8]>,
    parsed: Box<x509_cert::Certificate>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let parsed = x509_cert::Certificate::from_der(der)?;
        Ok(Self {
            der: der.into(),
            parsed: Box::new(parsed),
        })
    }

    pub fn from_x509(cert: &X509Ref) -> Result<Self, CertificateError> {
        Self::from_der(&cert.to_der()?)
    }

    /// Wrap a certificate already decoded from a CMS container.
    pub fn from_parsed(parsed: x509_cert::Certificate) -> Result<Self, CertificateError> {
        let der = parsed.to_der()?;
        Ok(Self {
            der: der.into_boxed_slice(),
            parsed: Box::new(parsed),
        })
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn parsed(&self) -> &x509_cert::Certificate {
        &self.parsed
    }

    /// Subject DN in RFC 4514 form, e.g. `CN=alice`.
    #[must_use]
    pub fn subject_dn(&self) -> String {
        self.parsed.tbs_certificate.subject.to_string()
    }

    /// Issuer DN in RFC 4514 form.
    #[must_use]
    pub fn issuer_dn(&self) -> String {
        self.parsed.tbs_certificate.issuer.to_string()
    }

    #[must_use]
    pub fn issuer(&self) -> &Name {
        &self.parsed.tbs_certificate.issuer
    }

    #[must_use]
    pub fn serial_number(&self) -> &SerialNumber {
        &self.parsed.tbs_certificate.serial_number
    }

    /// Serial number as lowercase hex of its big-endian bytes.
    #[must_use]
    pub fn serial_hex(&self) -> String {
        hex::encode(self.serial_number().as_bytes())
    }

    #[must_use]
    pub fn not_before(&self) -> SystemTime {
        self.parsed.tbs_certificate.validity.not_before.to_system_time()
    }

    #[must_use]
    pub fn not_after(&self) -> SystemTime {
        self.parsed.tbs_certificate.validity.not_after.to_system_time()
    }

    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        self.parsed.tbs_certificate.subject == self.parsed.tbs_certificate.issuer
    }

    /// Public key for signature verification.
    pub fn public_key(&self) -> Result<PKey<Public>, CertificateError> {
        Ok(X509::from_der(&self.der)?.public_key()?)
    }

    /// IssuerAndSerialNumber identifying this certificate in a SignerInfo.
    #[must_use]
    pub fn issuer_and_serial(&self) -> IssuerAndSerialNumber {
        IssuerAndSerialNumber {
            issuer: self.issuer().clone(),
            serial_number: self.serial_number().clone(),
        }
    }

    #[must_use]
    pub fn matches(&self, id: &IssuerAndSerialNumber) -> bool {
        self.issuer() == &id.issuer && self.serial_number() == &id.serial_number
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Certificate(subject={}, serial={}, len={})",
            self.subject_dn(),
            self.serial_hex(),
            self.der.len()
        )
    }
}
