//! Agent self-authentication.
//!
//! The agent authenticates as itself through the identity provider's direct-authentication
//! API: the authorize endpoint is called with `response_mode=direct` and a PKCE challenge and
//! returns a `flowId`; the agent's name and secret are submitted to the basic authenticator for
//! that flow, which answers with an authorization code; the code and verifier are exchanged at
//! the token endpoint with the resource server as `resource`. The resulting token is cached per
//! conversation thread and later injected as the `actor_token` of delegated exchanges.

// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	auth::{ThreadId, Token, TokenKind},
	flows::{
		Broker,
		common::{self, AGENT_SCOPES},
	},
	oauth::TokenTarget,
	obs::{self, FlowKind},
	pkce::{self, PkcePair},
	store::StoreKey,
};

const AUTHORIZE_ENDPOINT: &str = "authorize";
const AUTHN_ENDPOINT: &str = "authn";
const AGENT_STATE_LEN: usize = 32;

#[derive(Debug, Deserialize)]
struct DirectAuthorizeResponse {
	#[serde(rename = "flowId")]
	flow_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthenticateResponse {
	#[serde(rename = "authData", default)]
	auth_data: Option<AuthData>,
}

#[derive(Debug, Deserialize)]
struct AuthData {
	code: Option<String>,
}

impl Broker {
	/// Returns the agent token cached for `thread`, authenticating the agent when none exists.
	///
	/// Concurrent callers for the same thread share a single authentication. A missing
	/// `flowId` or authorization code is reported as [`Error::AgentAuthentication`] and is not
	/// retried.
	pub async fn fetch_agent_token(&self, thread: &ThreadId) -> Result<Token> {
		obs::observe(FlowKind::AgentToken, "fetch_agent_token", async move {
			let scopes = common::scopes_of(&AGENT_SCOPES)?;
			let key = StoreKey::new(TokenKind::Agent, thread, &scopes);
			let _singleflight = self.flow_guards.lock(&key).await;

			if let Some(cached) = self.store.fetch(&key).await? {
				return Ok(cached);
			}

			let pkce = PkcePair::generate();
			let flow_id = self.start_direct_authorization(&pkce).await?;
			let code = self.authenticate_agent(&flow_id).await?;
			let target = TokenTarget { kind: TokenKind::Agent, subject: thread, scopes: &scopes };
			let token = self
				.facade()?
				.exchange_code_with_verifier(
					target,
					&code,
					pkce.verifier(),
					self.config.resource_indicator(),
				)
				.await?;

			self.store.save(token.clone()).await?;

			Ok(token)
		})
		.await
	}

	async fn start_direct_authorization(&self, pkce: &PkcePair) -> Result<String> {
		let config = &self.config;
		let state = pkce::random_string(AGENT_STATE_LEN);
		let scope = AGENT_SCOPES.join(" ");
		let form = [
			("client_id", config.client_id.as_str()),
			("client_secret", config.client_secret.expose()),
			("response_type", "code"),
			("redirect_uri", config.redirect_uri.as_str()),
			("state", state.as_str()),
			("scope", scope.as_str()),
			("response_mode", "direct"),
			("code_challenge", pkce.challenge()),
			("code_challenge_method", pkce.method().as_str()),
			("resource", config.resource_indicator()),
		];
		let request = self.http_client.post(config.endpoints.authorize.clone()).form(&form);
		let response = self.http_client.send(AUTHORIZE_ENDPOINT, request).await?;

		if !response.status.is_success() {
			let status = response.status.as_u16();

			return Err(Error::AgentAuthentication {
				reason: format!("authorize endpoint answered with status {status}"),
			});
		}

		response
			.decode::<DirectAuthorizeResponse>(AUTHORIZE_ENDPOINT)?
			.flow_id
			.filter(|id| !id.is_empty())
			.ok_or_else(|| Error::AgentAuthentication {
				reason: "authorize response did not include a flowId".into(),
			})
	}

	async fn authenticate_agent(&self, flow_id: &str) -> Result<String> {
		let config = &self.config;
		let body = json!({
			"flowId": flow_id,
			"selectedAuthenticator": {
				"authenticatorId": config.authenticator_id,
				"params": {
					"username": config.agent.name,
					"password": config.agent.secret.expose(),
				},
			},
		});
		let request = self.http_client.post(config.endpoints.authn.clone()).json(&body);
		let response = self.http_client.send(AUTHN_ENDPOINT, request).await?;

		if !response.status.is_success() {
			return Err(Error::AgentAuthentication {
				reason: format!("authenticator answered with status {}", response.status.as_u16()),
			});
		}

		response
			.decode::<AuthenticateResponse>(AUTHN_ENDPOINT)?
			.auth_data
			.and_then(|data| data.code)
			.filter(|code| !code.is_empty())
			.ok_or_else(|| Error::AgentAuthentication {
				reason: "authenticator response did not include an authorization code".into(),
			})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn authenticator_response_tolerates_missing_auth_data() {
		let body: AuthenticateResponse =
			serde_json::from_str("{\"flowStatus\":\"INCOMPLETE\"}").expect("Body should decode.");

		assert!(body.auth_data.is_none());

		let body: AuthenticateResponse = serde_json::from_str("{\"authData\":{\"code\":\"abc\"}}")
			.expect("Body should decode.");

		assert_eq!(body.auth_data.and_then(|data| data.code).as_deref(), Some("abc"));
	}
}
