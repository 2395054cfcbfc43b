//! Process-wide cryptographic provider initialization.
//!
//! OpenSSL keeps global algorithm tables. They are initialized exactly once per
//! process, on first use by any public operation or explicitly at startup.
//!
//! PKCS#12 files written by Java keystores, Android and `openssl pkcs12
//! -legacy` encrypt their certificate bags with RC2-40, which OpenSSL 3 only
//! ships in the `legacy` provider. That provider is loaded next to the default
//! one and kept for the lifetime of the process.

use std::sync::{Once, OnceLock};

use openssl::provider::Provider;

static INIT: Once = Once::new();
static LEGACY: OnceLock<Provider> = OnceLock::new();

/// Initialize the OpenSSL provider tables once.
///
/// Concurrent callers block until the first caller has finished; later calls
/// return immediately.
pub fn ensure_crypto_provider_initialized() {
    INIT.call_once(|| {
        openssl::init();
        // retain_fallbacks keeps the default provider for everything else
        match Provider::try_load(None, "legacy", true) {
            Ok(provider) => {
                let _ = LEGACY.set(provider);
                log::debug!("OpenSSL legacy provider loaded");
            }
            Err(e) => log::warn!(
                "OpenSSL legacy provider unavailable, RC2/RC4 PKCS#12 files cannot be opened: {e}"
            ),
        }
        log::debug!("Crypto provider initialized ({})", openssl::version::version());
    });
}

/// Whether legacy PKCS#12 ciphers (RC2-40, RC4) can be used in this process.
#[must_use]
pub fn legacy_ciphers_available() -> bool {
    ensure_crypto_provider_initialized();
    LEGACY.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_is_idempotent_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(ensure_crypto_provider_initialized))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        ensure_crypto_provider_initialized();
        assert!(INIT.is_completed());
    }

    #[test]
    fn test_legacy_provider_is_loaded() {
        assert!(legacy_ciphers_available());
        assert!(openssl::cipher::Cipher::fetch(None, "RC2-40-CBC", None).is_ok());
    }
}
