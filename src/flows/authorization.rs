//! User consent: authorization URLs, code correlation, and the delegated exchange.
//!
//! An authorization URL binds a fresh `state` to the originating thread and records a pending
//! [`AuthorizationRequest`] keyed by (user, scopes). When the identity provider redirects back,
//! the code is attached to that request and exchanged for a token that represents the agent
//! acting on behalf of the user; the agent's own token for the originating thread rides along as
//! `actor_token`.

// self
use crate::{
	_prelude::*,
	auth::{ORGANIZATION_CLAIM, ScopeList, ThreadId, Token, TokenKind, UserClaims, UserId},
	flows::{Broker, common},
	oauth::TokenTarget,
	obs::{self, FlowKind},
	pkce,
	store::{AuthorizationRequest, StoreKey},
};

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 16;
const FEDERATED_IDP_HINT: &str = "OrganizationSSO";

impl Broker {
	/// Binds the end user driving `thread`.
	pub fn store_user_id_against_thread(&self, thread: &ThreadId, user: &UserId) {
		self.correlation.store_user_id_against_thread(thread, user);
	}

	/// End user bound to `thread`, if any.
	pub fn get_user_id_from_thread(&self, thread: &ThreadId) -> Option<UserId> {
		self.correlation.get_user_id_from_thread(thread)
	}

	/// Thread that generated `state`, if known.
	pub fn get_thread_from_state(&self, state: &str) -> Option<ThreadId> {
		self.correlation.get_thread_from_state(state)
	}

	/// Stores (or replaces) the claims for `user`.
	pub fn store_user_claims(&self, user: &UserId, claims: UserClaims) {
		self.correlation.store_user_claims(user, claims);
	}

	/// Claims for `user`, if any were stored.
	pub fn get_user_claims(&self, user: &UserId) -> Option<UserClaims> {
		self.correlation.get_user_claims(user)
	}

	/// Builds the consent URL for `user` and records the pending request.
	///
	/// The organization is read from the claims of the user bound to `thread`; a missing
	/// `user_org` claim is [`Error::MissingClaim`]. Any pending request for the same user and
	/// scope list is replaced and its `state` stops being redeemable.
	pub fn get_authorization_url(
		&self,
		thread: &ThreadId,
		user: &UserId,
		scopes: &ScopeList,
	) -> Result<Url> {
		obs::observe_sync(FlowKind::Authorization, "get_authorization_url", || {
			let claims_owner = self.get_user_id_from_thread(thread).unwrap_or_else(|| user.clone());
			let organization = self
				.correlation
				.get_user_claims(&claims_owner)
				.and_then(|claims| claims.organization().map(str::to_owned))
				.ok_or_else(|| Error::MissingClaim {
					user: claims_owner.to_string(),
					claim: ORGANIZATION_CLAIM,
				})?;
			let state = pkce::random_string(STATE_LEN);
			let nonce = pkce::random_string(NONCE_LEN);
			let config = &self.config;
			let mut url = config.endpoints.authorize.clone();

			url.query_pairs_mut()
				.append_pair("client_id", &config.client_id)
				.append_pair("redirect_uri", config.redirect_uri.as_str())
				.append_pair("scope", &scopes.joined())
				.append_pair("response_type", "code")
				.append_pair("response_mode", "query")
				.append_pair("state", &state)
				.append_pair("requested_actor", &config.agent.id)
				.append_pair("nonce", &nonce)
				.append_pair("orgId", &organization)
				.append_pair("fidp", FEDERATED_IDP_HINT);

			self.correlation.insert_pending(AuthorizationRequest {
				state,
				thread: thread.clone(),
				user: user.clone(),
				scopes: scopes.clone(),
				code: None,
			});

			Ok(url)
		})
	}

	/// Attaches `code` to the most recent pending request of `user`.
	pub fn store_auth_code(&self, user: &UserId, code: &str) -> Result<AuthorizationRequest> {
		self.correlation
			.attach_code_for_user(user, code)
			.ok_or_else(|| Error::NoPendingRequest { reference: user.to_string() })
	}

	/// Attaches `code` to the pending request identified by the redirect's `state`.
	pub fn store_auth_code_for_state(
		&self,
		state: &str,
		code: &str,
	) -> Result<AuthorizationRequest> {
		self.correlation
			.attach_code_for_state(state, code)
			.ok_or_else(|| Error::NoPendingRequest { reference: common::redact(state) })
	}

	/// Exchanges the code attached to `state` for a delegated user token and caches it.
	pub async fn fetch_user_token(&self, state: &str) -> Result<Token> {
		obs::observe(FlowKind::UserToken, "fetch_user_token", async move {
			let request = self
				.correlation
				.pending_by_state(state)
				.ok_or_else(|| Error::NoPendingRequest { reference: common::redact(state) })?;
			let code = request.code.clone().ok_or(Error::MissingAuthorizationCode)?;
			let actor_thread =
				self.get_thread_from_state(state).unwrap_or_else(|| request.thread.clone());
			let actor = self.fetch_agent_token(&actor_thread).await?;
			let target = TokenTarget {
				kind: TokenKind::User,
				subject: &request.user,
				scopes: &request.scopes,
			};
			let token = self
				.facade()?
				.exchange_code_with_actor(target, &code, actor.access_token.expose())
				.await?;

			self.store.save(token.clone()).await?;

			Ok(token)
		})
		.await
	}

	/// Cached delegated token for `user` and `scopes`, with no freshness check.
	///
	/// The lookup uses the exact scope order; a token issued for `["openid", "create_meeting"]`
	/// is not found under `["create_meeting", "openid"]`.
	pub async fn get_user_token(&self, user: &UserId, scopes: &ScopeList) -> Result<Option<Token>> {
		let key = StoreKey::new(TokenKind::User, user, scopes);

		Ok(self.store.fetch(&key).await?)
	}

	/// Redirect handler: attaches `code` to `state` and runs the delegated exchange.
	///
	/// Returns the originating thread with the issued token.
	pub async fn complete_authorization(
		&self,
		state: &str,
		code: &str,
	) -> Result<(ThreadId, Token)> {
		let request = self.store_auth_code_for_state(state, code)?;
		let token = self.fetch_user_token(state).await?;

		Ok((request.thread, token))
	}
}
