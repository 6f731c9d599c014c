//! Credential validation.
//!
//! A credential is a capability username plus a password minted from a
//! shared secret:
//!
//! ```text
//! password  = <unix-seconds> ":" hex(HMAC-SHA256(secret, username ":" unix-seconds)[..10])
//! ```
//!
//! The validator is built once at startup and shared by every pipeline.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

/// Number of leading HMAC bytes carried in a password.
const SIGNATURE_BYTES: usize = 10;

/// Tolerated clock skew for credentials issued in the future.
const MAX_FUTURE_SKEW_SECS: i64 = 60;

/// Decides whether a username/password pair is a currently valid credential.
#[async_trait]
pub trait CredentialValidator: Send + Sync + 'static {
    async fn validate(&self, username: &str, password: &str) -> bool;
}

/// HMAC validator over a shared secret with a fixed validity window.
#[derive(Clone)]
pub struct HmacCredentialValidator {
    mac: HmacSha256,
    ttl: Duration,
}

impl HmacCredentialValidator {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
            ttl,
        })
    }

    fn signer(&self, username: &str, timestamp: i64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(username.as_bytes());
        mac.update(b":");
        mac.update(timestamp.to_string().as_bytes());
        mac
    }

    /// Mint a password for `username`, valid from `at`.
    pub fn issue(&self, username: &str, at: OffsetDateTime) -> String {
        let timestamp = at.unix_timestamp();
        let digest = self.signer(username, timestamp).finalize().into_bytes();
        format!("{timestamp}:{}", hex::encode(&digest[..SIGNATURE_BYTES]))
    }

    /// Check a credential against the given clock.
    pub fn check(&self, username: &str, password: &str, now: OffsetDateTime) -> bool {
        let Some((timestamp, signature)) = password.split_once(':') else {
            return false;
        };
        let Ok(timestamp) = timestamp.parse::<i64>() else {
            return false;
        };

        let Some(age) = now.unix_timestamp().checked_sub(timestamp) else {
            tracing::debug!(timestamp, "credential timestamp out of range");
            return false;
        };
        if age < -MAX_FUTURE_SKEW_SECS {
            tracing::debug!(timestamp, "credential issued in the future");
            return false;
        }
        if u64::try_from(age).is_ok_and(|age| age > self.ttl.as_secs()) {
            tracing::debug!(timestamp, "credential expired");
            return false;
        }

        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        if signature.len() != SIGNATURE_BYTES {
            return false;
        }
        self.signer(username, timestamp)
            .verify_truncated_left(&signature)
            .is_ok()
    }
}

#[async_trait]
impl CredentialValidator for HmacCredentialValidator {
    async fn validate(&self, username: &str, password: &str) -> bool {
        self.check(username, password, OffsetDateTime::now_utc())
    }
}
