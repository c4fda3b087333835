//! Shared helpers for flow implementations.

// std
use std::hash::Hash;
// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	auth::{ScopeList, ThreadId, UserId},
	error::ConfigError,
	flows::Broker,
};

/// Scopes requested for the meeting-booking user token.
pub const MEETING_SCOPES: [&str; 2] = ["openid", "create_meeting"];
/// Scopes requested for the agent's own token.
pub const AGENT_SCOPES: [&str; 1] = ["openid"];

/// Builds a scope list from a fixed set of known-valid scopes.
pub fn scopes_of(values: &[&str]) -> Result<ScopeList> {
	ScopeList::new(values.iter().copied()).map_err(|e| ConfigError::from(e).into())
}

/// Async mutexes created on demand per key.
///
/// An entry is removed as soon as its last holder releases it and nobody is waiting, so the
/// map only tracks keys with work in flight.
#[derive(Debug)]
pub(crate) struct KeyedLocks<K>(Mutex<HashMap<K, Arc<AsyncMutex<()>>>>);
impl<K> KeyedLocks<K>
where
	K: Clone + Eq + Hash,
{
	/// Waits for exclusive access to `key`.
	pub(crate) async fn lock(&self, key: &K) -> KeyedGuard<'_, K> {
		let lock = {
			let mut locks = self.0.lock();

			locks.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
		};
		let held = lock.lock_arc().await;

		KeyedGuard { locks: self, key: key.clone(), held: Some(held) }
	}

	/// Number of keys currently held or awaited.
	#[cfg(test)]
	pub(crate) fn len(&self) -> usize {
		self.0.lock().len()
	}
}
impl<K> Default for KeyedLocks<K> {
	fn default() -> Self {
		Self(Mutex::new(HashMap::new()))
	}
}

/// Exclusive access to one key of a [`KeyedLocks`]; pruning happens on drop.
pub(crate) struct KeyedGuard<'a, K>
where
	K: Clone + Eq + Hash,
{
	locks: &'a KeyedLocks<K>,
	key: K,
	held: Option<MutexGuardArc<()>>,
}
impl<K> Drop for KeyedGuard<'_, K>
where
	K: Clone + Eq + Hash,
{
	fn drop(&mut self) {
		drop(self.held.take());

		let mut locks = self.locks.0.lock();

		// Waiters hold their own clone, so a count of one means only the map refers to it.
		if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
			locks.remove(&self.key);
		}
	}
}

/// Resolves the end user bound to `thread`.
pub(crate) fn user_for_thread(broker: &Broker, thread: &ThreadId) -> Result<UserId> {
	broker
		.correlation
		.get_user_id_from_thread(thread)
		.ok_or_else(|| Error::UnknownThread { thread: thread.to_string() })
}

/// Shortens an opaque value so it can appear in errors and logs without being replayable.
pub(crate) fn redact(value: &str) -> String {
	let prefix: String = value.chars().take(4).collect();

	format!("{prefix}…")
}
