//! Type-safe wrappers using new-type pattern
//!
//! Keystore passwords and aliases are validated once at the boundary so the
//! services can rely on them.

use std::fmt;
use std::str::FromStr;

use crate::infra::error::{DocSignError, DocSignResult};

/// Maximum accepted alias length.
const MAX_ALIAS_LEN: usize = 128;

/// Type-safe wrapper for keystore passwords
#[derive(Clone, PartialEq, Eq)]
pub struct KeystorePassword(String);

impl KeystorePassword {
    /// Create a new KeystorePassword after validation
    pub fn new(password: impl AsRef<str>) -> DocSignResult<Self> {
        let password = password.as_ref();
        Self::validate_password(password)?;
        Ok(KeystorePassword(password.to_string()))
    }

    /// Get the password as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the password as bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    fn validate_password(password: &str) -> DocSignResult<()> {
        // OpenSSL takes passwords as C strings
        if password.contains('\0') {
            return Err(DocSignError::InvalidInput(
                "Keystore password must not contain NUL characters".to_string(),
            ));
        }
        Ok(())
    }
}

impl FromStr for KeystorePassword {
    type Err = DocSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// Never print the password itself
impl fmt::Display for KeystorePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PASSWORD REDACTED]")
    }
}

impl fmt::Debug for KeystorePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeystorePassword([REDACTED])")
    }
}

/// Type-safe wrapper for keystore entry aliases
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyAlias(String);

impl KeyAlias {
    /// Create a new KeyAlias after validation
    pub fn new(alias: impl AsRef<str>) -> DocSignResult<Self> {
        let alias = alias.as_ref();
        Self::validate_alias(alias)?;
        Ok(KeyAlias(alias.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate_alias(alias: &str) -> DocSignResult<()> {
        if alias.trim().is_empty() {
            return Err(DocSignError::InvalidInput(
                "Alias cannot be empty".to_string(),
            ));
        }

        if alias.len() > MAX_ALIAS_LEN {
            return Err(DocSignError::InvalidInput(format!(
                "Alias too long: {} characters (maximum {MAX_ALIAS_LEN})",
                alias.len()
            )));
        }

        // Aliases become file names (<alias>.pfx, <alias>.p7s)
        if alias.contains(['/', '\\', '\0']) || alias == "." || alias == ".." {
            return Err(DocSignError::InvalidInput(format!(
                "Alias contains characters not allowed in file names: {alias}"
            )));
        }

        Ok(())
    }
}

impl FromStr for KeyAlias {
    type Err = DocSignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_is_redacted() {
        let password = KeystorePassword::new("pw1234").unwrap();
        assert_eq!(password.as_str(), "pw1234");
        assert_eq!(password.to_string(), "[PASSWORD REDACTED]");
        assert!(!format!("{password:?}").contains("pw1234"));
    }

    #[test]
    fn test_password_validation() {
        assert!(KeystorePassword::new("").is_ok());
        assert!(KeystorePassword::new("pw\0").is_err());
    }

    #[test]
    fn test_alias_validation() {
        let valid_aliases = vec!["mykey", "signing key", "alice-2024"];
        for alias in valid_aliases {
            assert!(KeyAlias::new(alias).is_ok(), "Alias should be valid: {alias}");
        }

        let too_long = "a".repeat(MAX_ALIAS_LEN + 1);
        let invalid_aliases = vec!["", "   ", "../up", "a/b", "a\\b", "..", too_long.as_str()];
        for alias in invalid_aliases {
            assert!(KeyAlias::new(alias).is_err(), "Alias should be invalid: {alias}");
        }
    }
}
