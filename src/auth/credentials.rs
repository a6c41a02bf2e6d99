//! Wallet credentials for marketplace authentication.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64, engine::general_purpose::URL_SAFE_NO_PAD};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::BidderError;

/// A signing wallet: secret key, derived action address, payout address.
///
/// The action address identifies the wallet on marketplace-mutating calls
/// and is derived deterministically from the signing key. The payout
/// address receives proceeds and is configured independently. Credentials
/// are immutable after construction.
#[derive(Clone)]
pub struct WalletCredentials {
    /// Human-readable label for logs and snapshots
    pub label: String,
    /// The signing key (base64, private)
    signing_key: SecretString,
    /// Address derived from the signing key, used to authorize actions
    pub action_address: String,
    /// Address that receives proceeds
    pub payout_address: String,
}

impl WalletCredentials {
    /// Create credentials from a base64-encoded signing key.
    ///
    /// The action address is derived from the decoded key. A key that is
    /// not valid base64, or decodes to nothing, is a configuration error:
    /// a pool cannot be built from it.
    pub fn new(
        label: impl Into<String>,
        signing_key: impl Into<String>,
        payout_address: impl Into<String>,
    ) -> Result<Self, BidderError> {
        let label = label.into();
        let signing_key = signing_key.into();

        let decoded = BASE64.decode(&signing_key).map_err(|_| {
            BidderError::Config(format!("wallet {label}: signing key is not valid base64"))
        })?;
        if decoded.is_empty() {
            return Err(BidderError::Config(format!(
                "wallet {label}: signing key is empty"
            )));
        }

        let action_address = derive_action_address(&decoded);

        Ok(Self {
            label,
            signing_key: SecretString::from(signing_key),
            action_address,
            payout_address: payout_address.into(),
        })
    }

    /// Create credentials from environment variables.
    ///
    /// Reads the signing key from `key_var` and the payout address from
    /// `payout_var`. Missing variables are a configuration error.
    pub fn from_env(
        label: impl Into<String>,
        key_var: &str,
        payout_var: &str,
    ) -> Result<Self, BidderError> {
        let key = std::env::var(key_var)
            .map_err(|_| BidderError::Config(format!("environment variable {key_var} not set")))?;
        let payout = std::env::var(payout_var).map_err(|_| {
            BidderError::Config(format!("environment variable {payout_var} not set"))
        })?;
        Self::new(label, key, payout)
    }

    /// Get the signing key for signature generation.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_signing_key(&self) -> &str {
        self.signing_key.expose_secret()
    }
}

impl std::fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("label", &self.label)
            .field("signing_key", &"[REDACTED]")
            .field("action_address", &self.action_address)
            .field("payout_address", &self.payout_address)
            .finish()
    }
}

/// Derive the action address from the decoded signing key.
///
/// SHA-256 of the key bytes, URL-safe base64 without padding.
fn derive_action_address(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        BASE64.encode("test_signing_key")
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = WalletCredentials::new("main", test_key(), "payout_addr").unwrap();
        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("main"));
        assert!(!debug_str.contains(&test_key()));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_action_address_is_deterministic() {
        let a = WalletCredentials::new("a", test_key(), "p1").unwrap();
        let b = WalletCredentials::new("b", test_key(), "p2").unwrap();
        assert_eq!(a.action_address, b.action_address);
    }

    #[test]
    fn test_different_keys_different_addresses() {
        let a = WalletCredentials::new("a", BASE64.encode("key_one"), "p").unwrap();
        let b = WalletCredentials::new("b", BASE64.encode("key_two"), "p").unwrap();
        assert_ne!(a.action_address, b.action_address);
    }

    #[test]
    fn test_invalid_base64_key_is_fatal() {
        let result = WalletCredentials::new("bad", "not base64!!!", "p");
        assert!(matches!(result, Err(BidderError::Config(_))));
    }

    #[test]
    fn test_empty_key_is_fatal() {
        let result = WalletCredentials::new("empty", "", "p");
        assert!(matches!(result, Err(BidderError::Config(_))));
    }
}
