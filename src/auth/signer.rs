//! HMAC-SHA512 payload signing.
//!
//! The marketplace authenticates mutating requests with a detached
//! signature computed over the request body:
//! ```text
//! HMAC-SHA512(payload, base64_decode(signing_key))
//! ```
//! The signature is base64-encoded and sent in the `X-Bidder-Signature`
//! header alongside the wallet's action address.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::auth::WalletCredentials;
use crate::error::BidderError;

type HmacSha512 = Hmac<Sha512>;

/// The signing capability consumed by the marketplace client.
///
/// Implement this trait to delegate signing elsewhere, for example to a
/// hardware signer or a remote signing service.
pub trait Signer: Send + Sync {
    /// Sign a payload with the given wallet's key.
    ///
    /// Returns a base64-encoded detached signature.
    fn sign(&self, wallet: &WalletCredentials, payload: &[u8]) -> Result<String, BidderError>;
}

/// Default signer: HMAC-SHA512 keyed by the decoded wallet key.
#[derive(Debug, Default, Clone, Copy)]
pub struct HmacSigner;

impl Signer for HmacSigner {
    fn sign(&self, wallet: &WalletCredentials, payload: &[u8]) -> Result<String, BidderError> {
        // Credentials were validated at construction, but the key is opaque
        // to the pool so decode failures still map to an auth error here.
        let key = BASE64
            .decode(wallet.expose_signing_key())
            .map_err(|_| BidderError::Auth("signing key must be valid base64".to_string()))?;

        let mut hmac = HmacSha512::new_from_slice(&key)
            .map_err(|e| BidderError::Auth(format!("Invalid HMAC key: {e}")))?;
        hmac.update(payload);
        let result = hmac.finalize().into_bytes();

        Ok(BASE64.encode(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> WalletCredentials {
        WalletCredentials::new("test", BASE64.encode("test_secret_key"), "payout").unwrap()
    }

    #[test]
    fn test_signature_shape() {
        let signature = HmacSigner.sign(&wallet(), b"payload").unwrap();

        // HMAC-SHA512 produces 64 bytes, base64 encoded = 88 chars with padding
        assert!(BASE64.decode(&signature).is_ok());
        assert_eq!(signature.len(), 88);
    }

    #[test]
    fn test_signature_consistency() {
        let w = wallet();
        let sig1 = HmacSigner.sign(&w, b"same payload").unwrap();
        let sig2 = HmacSigner.sign(&w, b"same payload").unwrap();
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_signature_changes_with_payload() {
        let w = wallet();
        let sig1 = HmacSigner.sign(&w, b"payload one").unwrap();
        let sig2 = HmacSigner.sign(&w, b"payload two").unwrap();
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn test_signature_changes_with_key() {
        let w1 = WalletCredentials::new("a", BASE64.encode("key_one"), "p").unwrap();
        let w2 = WalletCredentials::new("b", BASE64.encode("key_two"), "p").unwrap();
        let sig1 = HmacSigner.sign(&w1, b"payload").unwrap();
        let sig2 = HmacSigner.sign(&w2, b"payload").unwrap();
        assert_ne!(sig1, sig2);
    }
}
