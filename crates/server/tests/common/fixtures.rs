//! Test fixtures for generating test data and credentials.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use porter_server::HmacCredentialValidator;
use std::time::Duration;
use time::OffsetDateTime;

/// Shared secret of `AuthConfig::for_testing()`.
pub const TEST_SECRET: &str = "test-shared-secret";

/// A service id in the hyphenated UUID form.
pub const SERVICE_ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

/// Generate deterministic test data based on a seed.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Mint a password for `username` with the test secret.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn password_for(username: &str) -> String {
    HmacCredentialValidator::new(TEST_SECRET.as_bytes(), Duration::from_secs(604800))
        .expect("valid secret")
        .issue(username, OffsetDateTime::now_utc())
}

/// `Authorization` header value for a freshly minted credential.
#[allow(dead_code)]
pub fn basic_auth(username: &str) -> String {
    basic_auth_with(username, &password_for(username))
}

/// `Authorization` header value for an explicit pair.
#[allow(dead_code)]
pub fn basic_auth_with(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// The `token` query parameter form of a credential, URL-safe for base64.
#[allow(dead_code)]
pub fn query_token(username: &str) -> String {
    let encoded = STANDARD.encode(format!("{username}:{}", password_for(username)));
    encoded
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D")
}

/// `Upload-Metadata` header value carrying `filename`.
#[allow(dead_code)]
pub fn upload_metadata(filename: &str) -> String {
    format!(
        "filename {},filetype {}",
        STANDARD.encode(filename),
        STANDARD.encode("application/octet-stream")
    )
}
