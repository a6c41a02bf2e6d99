//! Wallet credential management and payload signing.
//!
//! This module provides:
//! - Wallet credential handling with secure key storage
//! - Action address derivation from the signing key
//! - The signing-capability seam used by the marketplace client

mod credentials;
mod signer;

pub use credentials::WalletCredentials;
pub use signer::{HmacSigner, Signer};
