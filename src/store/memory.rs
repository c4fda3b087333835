//! Thread-safe in-memory [`TokenStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::Token,
	store::{StoreError, StoreFuture, StoreKey, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<StoreKey, Token>>>;

/// Process-lifetime token cache. Entries are never evicted on expiry.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of cached tokens.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, token: Token) -> Result<(), StoreError> {
		let key = StoreKey::for_token(&token);

		map.write().insert(key, token);

		Ok(())
	}

	fn fetch_now(map: StoreMap, key: &StoreKey) -> Option<Token> {
		map.read().get(key).cloned()
	}
}
impl TokenStore for MemoryStore {
	fn save(&self, token: Token) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, token) })
	}

	fn fetch<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<Token>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::fetch_now(map, key)) })
	}
}
