//! PKCE (Proof Key for Code Exchange) generation for OAuth 2.0
//!
//! Implements RFC 7636 with the `S256` method. The authorization request
//! carries the challenge; the verifier stays local until token exchange.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 16;
const NONCE_BYTES: usize = 16;

/// Generate a cryptographically secure code verifier
///
/// Returns 32 random bytes base64url-encoded without padding (43 characters),
/// within the RFC 7636 bounds of 43 to 128 characters.
pub fn generate_code_verifier() -> String {
    random_token(VERIFIER_BYTES)
}

/// Derive the code challenge: `BASE64URL(SHA256(ASCII(code_verifier)))`
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Random CSRF token bound to one authorization request
pub fn generate_state() -> String {
    random_token(STATE_BYTES)
}

/// Random replay-protection token echoed back in the ID token
pub fn generate_nonce() -> String {
    random_token(NONCE_BYTES)
}

/// Exact comparison of the stored and returned state values
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected == actual
}

/// Whether `verifier` satisfies RFC 7636 §4.1: 43 to 128 characters from
/// `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`.
pub fn is_valid_verifier(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len())
        && verifier.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE material for one authorization request
///
/// Created when the authorization URL is built and consumed exactly once at
/// callback.
#[derive(Debug, Clone)]
pub struct PkceMaterial {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
    pub nonce: String,
}

impl PkceMaterial {
    /// Generate fresh, independent verifier, state and nonce values.
    ///
    /// ```
    /// use pingauth_core::auth::pkce::PkceMaterial;
    ///
    /// let material = PkceMaterial::generate();
    /// assert!(material.code_verifier.len() >= 43);
    /// assert_eq!(material.challenge_method(), "S256");
    /// ```
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);

        Self { code_verifier, code_challenge, state: generate_state(), nonce: generate_nonce() }
    }

    /// Challenge method, always `S256`
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}
