//! `SignWorkflow`: keystore bytes + password + alias in, detached signature out.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::domain::constants::SIGNATURE_FILE_EXTENSION;
use crate::domain::container::SignatureContainer;
use crate::domain::crypto::SignatureAlgorithm;
use crate::domain::types::{KeyAlias, KeystorePassword};
use crate::infra::error::{DocSignResult, KeystoreResult};
use crate::services::cms_builder::SignatureEngine;
use crate::services::keystore::{Keystore, KeystoreLoader};

/// Result of signing a document.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    pub signature_container: SignatureContainer,
    pub signature_algorithm: SignatureAlgorithm,
    pub certificate_der: Vec<u8>,
}

impl SignedDocument {
    /// Signer certificate as standard base64 without line breaks.
    #[must_use]
    pub fn certificate_base64(&self) -> String {
        STANDARD.encode(&self.certificate_der)
    }

    #[must_use]
    pub fn summary(&self) -> SignatureSummary {
        SignatureSummary {
            algorithm: self.signature_algorithm.as_str().to_string(),
            certificate: self.certificate_base64(),
            signature_path: None,
        }
    }

    /// Write the container as `<alias>.p7s` under `dir`, replacing any previous one.
    pub fn write_container(&self, dir: &Path, alias: &KeyAlias) -> DocSignResult<PathBuf> {
        let path = dir.join(format!("{alias}.{SIGNATURE_FILE_EXTENSION}"));
        std::fs::write(&path, self.signature_container.as_der())?;
        log::info!("Detached signature saved at {}", path.display());
        Ok(path)
    }
}

/// Text-only description of a signature, as handed across process boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSummary {
    pub algorithm: String,
    pub certificate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_path: Option<PathBuf>,
}

/// Opens a keystore, resolves the alias and signs.
pub struct SignWorkflow {
    loader: KeystoreLoader,
    engine: SignatureEngine,
}

impl Default for SignWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl SignWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: KeystoreLoader::new(),
            engine: SignatureEngine::new(),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: KeystoreLoader) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: SignatureEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Sign `payload` with the key stored under `alias`.
    pub fn run(
        &self,
        payload: &[u8],
        keystore_bytes: &[u8],
        password: &KeystorePassword,
        alias: &str,
    ) -> DocSignResult<SignedDocument> {
        let keystore = self.loader.open(keystore_bytes, password)?;
        self.run_with_keystore(payload, &keystore, password, alias)
    }

    /// Open a keystore file with this workflow's format list.
    pub fn open_keystore<P: AsRef<Path>>(
        &self,
        path: P,
        password: &KeystorePassword,
    ) -> KeystoreResult<Keystore> {
        self.loader.open_path(path, password)
    }

    /// Sign with an already opened keystore.
    pub fn run_with_keystore(
        &self,
        payload: &[u8],
        keystore: &Keystore,
        password: &KeystorePassword,
        alias: &str,
    ) -> DocSignResult<SignedDocument> {
        let key = keystore.resolve(alias, password)?;
        let signature_container = self.engine.sign(payload, &key)?;
        Ok(SignedDocument {
            signature_algorithm: signature_container.signature_algorithm(),
            certificate_der: key.certificate().as_der().to_vec(),
            signature_container,
        })
    }
}
