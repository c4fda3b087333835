//! Token cache contract, its in-memory backend, and the identity correlation store.

pub mod correlation;
pub mod memory;

pub use correlation::{AuthorizationRequest, CorrelationStore};
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Token, TokenKind},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by token caches.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the token stored under its own key.
	fn save(&self, token: Token) -> StoreFuture<'_, ()>;

	/// Fetches the token stored under `key`, if present.
	fn fetch<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<Token>>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Cache key for a stored token.
///
/// The textual part is `subject + "_" + scopes joined by "_"` in request order. Scopes are not
/// sorted, so a read must use the same ordering as the write that populated the entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
	/// Identity the token belongs to; keeps agent and user entries apart.
	pub kind: TokenKind,
	/// Concatenated subject and scope fragment.
	pub key: String,
}
impl StoreKey {
	/// Builds a key from its parts.
	pub fn new(kind: TokenKind, subject: &str, scopes: &ScopeList) -> Self {
		Self { kind, key: format!("{subject}_{}", scopes.key_fragment()) }
	}

	/// Key a token is stored under.
	pub fn for_token(token: &Token) -> Self {
		Self::new(token.kind, &token.subject, &token.scopes)
	}
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}:{}", self.kind, self.key)
	}
}
