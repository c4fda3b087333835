//! Identity correlation: thread ↔ user, OAuth `state` → thread, user claims, and pending
//! authorization requests.
//!
//! The identity provider's redirect carries only `state` and `code`, so everything needed to
//! finish the exchange (originating thread, user, scopes) is recovered from this store.

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, ThreadId, TokenKind, UserClaims, UserId},
	store::StoreKey,
};

/// Authorization request awaiting (or holding) the code returned by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// Opaque `state` embedded in the authorization URL.
	pub state: String,
	/// Thread that produced the authorization URL.
	pub thread: ThreadId,
	/// End user who must consent.
	pub user: UserId,
	/// Scopes requested, in request order.
	pub scopes: ScopeList,
	/// Authorization code, once the redirect arrives.
	pub code: Option<String>,
}
impl AuthorizationRequest {
	/// Cache key the resulting user token is stored under.
	pub fn token_key(&self) -> StoreKey {
		StoreKey::new(TokenKind::User, &self.user, &self.scopes)
	}
}
impl Debug for AuthorizationRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationRequest")
			.field("state", &self.state)
			.field("thread", &self.thread)
			.field("user", &self.user)
			.field("scopes", &self.scopes)
			.field("code", &self.code.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

#[derive(Debug, Default)]
struct Correlations {
	thread_users: HashMap<ThreadId, UserId>,
	state_threads: HashMap<String, ThreadId>,
	user_claims: HashMap<UserId, UserClaims>,
	pending: HashMap<String, AuthorizationRequest>,
	pending_by_key: HashMap<StoreKey, String>,
	latest_by_user: HashMap<UserId, String>,
}

/// Bidirectional identity maps shared by the broker.
#[derive(Debug, Default)]
pub struct CorrelationStore(RwLock<Correlations>);
impl CorrelationStore {
	/// Binds a conversation thread to the end user driving it.
	pub fn store_user_id_against_thread(&self, thread: &ThreadId, user: &UserId) {
		self.0.write().thread_users.insert(thread.clone(), user.clone());
	}

	/// End user bound to the thread, if any.
	pub fn get_user_id_from_thread(&self, thread: &ThreadId) -> Option<UserId> {
		self.0.read().thread_users.get(thread).cloned()
	}

	/// Records which thread generated an OAuth `state`.
	pub fn store_thread_against_state(&self, thread: &ThreadId, state: &str) {
		self.0.write().state_threads.insert(state.to_owned(), thread.clone());
	}

	/// Thread that generated the OAuth `state`, if known.
	pub fn get_thread_from_state(&self, state: &str) -> Option<ThreadId> {
		self.0.read().state_threads.get(state).cloned()
	}

	/// Stores (or replaces) the claims for a user.
	pub fn store_user_claims(&self, user: &UserId, claims: UserClaims) {
		self.0.write().user_claims.insert(user.clone(), claims);
	}

	/// Claims for the user, if any were stored.
	pub fn get_user_claims(&self, user: &UserId) -> Option<UserClaims> {
		self.0.read().user_claims.get(user).cloned()
	}

	/// Registers a pending request, replacing any earlier request for the same user and scopes.
	///
	/// The replaced request's `state` stops being redeemable. Also records `state → thread`.
	pub fn insert_pending(&self, request: AuthorizationRequest) {
		let mut inner = self.0.write();
		let key = request.token_key();

		if let Some(previous) = inner.pending_by_key.insert(key, request.state.clone()) {
			inner.pending.remove(&previous);
		}

		inner.state_threads.insert(request.state.clone(), request.thread.clone());
		inner.latest_by_user.insert(request.user.clone(), request.state.clone());
		inner.pending.insert(request.state.clone(), request);
	}

	/// Pending request for `state`, if it is still live.
	pub fn pending_by_state(&self, state: &str) -> Option<AuthorizationRequest> {
		self.0.read().pending.get(state).cloned()
	}

	/// Attaches `code` to the user's most recent pending request and returns it.
	pub fn attach_code_for_user(&self, user: &UserId, code: &str) -> Option<AuthorizationRequest> {
		let mut inner = self.0.write();
		let state = inner.latest_by_user.get(user)?.clone();

		attach(&mut inner, &state, code)
	}

	/// Attaches `code` to the pending request for `state` and returns it.
	pub fn attach_code_for_state(&self, state: &str, code: &str) -> Option<AuthorizationRequest> {
		attach(&mut self.0.write(), state, code)
	}
}

fn attach(inner: &mut Correlations, state: &str, code: &str) -> Option<AuthorizationRequest> {
	let request = inner.pending.get_mut(state)?;

	request.code = Some(code.to_owned());

	Some(request.clone())
}
