//! `IssueWorkflow`: fresh self-signed identity packaged as a one-entry keystore.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::domain::constants::{DEFAULT_VALIDITY_DAYS, KEYSTORE_FILE_EXTENSION};
use crate::domain::crypto::KeyMaterial;
use crate::domain::types::{KeyAlias, KeystorePassword};
use crate::infra::error::{DocSignError, DocSignResult};
use crate::services::issuer::CertificateIssuer;
use crate::services::keystore::Keystore;

/// A newly issued identity and its serialized keystore.
#[derive(Debug, Clone)]
pub struct IssuedIdentity {
    pub alias: KeyAlias,
    pub key: KeyMaterial,
    /// PKCS#12 bytes holding `alias` only, protected by the issuing password
    pub keystore: Vec<u8>,
}

impl IssuedIdentity {
    /// Write the keystore as `<alias>.pfx` under `dir`.
    ///
    /// An existing file is only replaced when `overwrite` is set.
    pub fn write_keystore(&self, dir: &Path, overwrite: bool) -> DocSignResult<PathBuf> {
        let path = dir.join(format!("{}.{KEYSTORE_FILE_EXTENSION}", self.alias));
        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = options.open(&path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => DocSignError::InvalidInput(format!(
                "Keystore {} already exists",
                path.display()
            )),
            _ => DocSignError::IoError(format!("Cannot create {}: {e}", path.display())),
        })?;
        file.write_all(&self.keystore)?;
        log::info!("Keystore written to {}", path.display());
        Ok(path)
    }
}

/// Issues a self-signed identity and serializes it under an alias.
pub struct IssueWorkflow {
    issuer: CertificateIssuer,
    validity_days: u32,
}

impl Default for IssueWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl IssueWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            issuer: CertificateIssuer::new(),
            validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }

    #[must_use]
    pub fn with_validity_days(mut self, validity_days: u32) -> Self {
        self.validity_days = validity_days;
        self
    }

    /// Issue `CN=<common_name>` and serialize it under `alias` with `password`.
    pub fn run(
        &self,
        password: &KeystorePassword,
        alias: &KeyAlias,
        common_name: &str,
    ) -> DocSignResult<IssuedIdentity> {
        let common_name = common_name.trim();
        if common_name.is_empty() {
            return Err(DocSignError::InvalidInput(
                "Subject common name is empty".to_string(),
            ));
        }

        log::info!("Issuing identity '{alias}' for CN={common_name}");
        let key = self
            .issuer
            .issue_self_signed(&format!("CN={common_name}"), self.validity_days)?;
        let keystore = Keystore::with_key_entry(alias, key.clone()).serialize(password)?;
        Ok(IssuedIdentity {
            alias: alias.clone(),
            key,
            keystore,
        })
    }
}
