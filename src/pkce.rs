//! Proof Key for Code Exchange (RFC 7636) helpers.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, RngCore, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Verifier length used by the agent authentication flow.
pub const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Verifier/challenge pair for one authorization-code exchange.
#[derive(Clone)]
pub struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	/// Generates a fresh pair with a [`PKCE_VERIFIER_LEN`]-character verifier.
	pub fn generate() -> Self {
		let verifier = generate_code_verifier(PKCE_VERIFIER_LEN);
		let challenge = generate_code_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}

	/// Secret verifier sent to the token endpoint.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Challenge sent to the authorize endpoint.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Returns a URL-safe random verifier of exactly `length` characters.
///
/// `length` bytes are drawn from the thread-local CSPRNG and base64url encoded, so the encoded
/// form is always long enough to truncate.
pub fn generate_code_verifier(length: usize) -> String {
	let mut bytes = vec![0_u8; length];

	rand::rng().fill_bytes(&mut bytes);

	let mut encoded = URL_SAFE_NO_PAD.encode(bytes);

	encoded.truncate(length);

	encoded
}

/// Base64url (no padding) SHA-256 digest of `verifier`.
pub fn generate_code_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}

/// Alphanumeric random string used for `state` and `nonce` values.
pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
