//! Environment-driven broker configuration.
//!
//! Every required variable must be present and non-blank at startup; a missing value is a
//! [`ConfigError::MissingEnv`] rather than a silent default.

// std
use std::{env, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	auth::{AgentId, TokenSecret},
	error::ConfigError,
};

/// Resource indicator and meetings API base used when `RESOURCE_SERVER_URL` is unset.
pub const DEFAULT_RESOURCE_SERVER: &str = "http://localhost:9091";
/// Identifier of the identity provider's basic (username/password) authenticator.
pub const DEFAULT_AUTHENTICATOR_ID: &str = "QmFzaWNBdXRoZW50aWNhdG9yOkxPQ0FM";
/// Per-request timeout used when `HTTP_TIMEOUT_SECS` is unset.
pub const DEFAULT_HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Credentials the agent uses to authenticate itself.
#[derive(Clone, Debug)]
pub struct AgentCredentials {
	/// Agent identifier sent as `requested_actor`.
	pub id: AgentId,
	/// Username presented to the basic authenticator.
	pub name: String,
	/// Password presented to the basic authenticator.
	pub secret: TokenSecret,
}

/// Identity provider endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoints {
	/// Authorization endpoint (user consent URL and agent `response_mode=direct` flow).
	pub authorize: Url,
	/// Direct authentication (authenticator) endpoint.
	pub authn: Url,
	/// Token endpoint for every grant.
	pub token: Url,
}

/// Complete broker configuration.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, sent in the form body.
	pub client_secret: TokenSecret,
	/// Identity provider endpoints.
	pub endpoints: ProviderEndpoints,
	/// Redirect URI registered for the client.
	pub redirect_uri: Url,
	/// Agent credentials.
	pub agent: AgentCredentials,
	/// Meetings resource server; also the `resource` indicator for agent tokens.
	pub resource_server: Url,
	/// Authenticator selected during agent authentication.
	pub authenticator_id: String,
	/// Timeout applied to every outbound request.
	pub http_timeout: StdDuration,
}
impl BrokerConfig {
	/// Loads the configuration from process environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Loads the configuration through an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |var: &'static str| lookup(var).filter(|value| !value.trim().is_empty());
		let required = |var: &'static str| read(var).ok_or(ConfigError::MissingEnv { var });
		let url = |var: &'static str, raw: String| {
			Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { var, source })
		};
		let endpoints = ProviderEndpoints {
			authorize: url("AUTHORIZE_URL", required("AUTHORIZE_URL")?)?,
			authn: url("AUTHN_URL", required("AUTHN_URL")?)?,
			token: url("TOKEN_URL", required("TOKEN_URL")?)?,
		};
		let agent = AgentCredentials {
			id: AgentId::new(required("AGENT_ID")?)?,
			name: required("AGENT_NAME")?,
			secret: TokenSecret::new(required("AGENT_SECRET")?),
		};
		let resource_server = url(
			"RESOURCE_SERVER_URL",
			read("RESOURCE_SERVER_URL").unwrap_or_else(|| DEFAULT_RESOURCE_SERVER.into()),
		)?;
		let http_timeout = match read("HTTP_TIMEOUT_SECS") {
			Some(raw) => parse_timeout(&raw)?,
			None => DEFAULT_HTTP_TIMEOUT,
		};

		Ok(Self {
			client_id: required("CLIENT_ID")?,
			client_secret: TokenSecret::new(required("CLIENT_SECRET")?),
			endpoints,
			redirect_uri: url("REDIRECT_URI", required("REDIRECT_URI")?)?,
			agent,
			resource_server,
			authenticator_id: read("AUTHENTICATOR_ID")
				.unwrap_or_else(|| DEFAULT_AUTHENTICATOR_ID.into()),
			http_timeout,
		})
	}

	/// `resource` indicator without the trailing slash `Url` adds to bare origins.
	pub fn resource_indicator(&self) -> &str {
		self.resource_server.as_str().trim_end_matches('/')
	}

	/// `POST` target for new meetings.
	pub fn meetings_endpoint(&self) -> Result<Url, ConfigError> {
		let base = self.resource_indicator();

		Url::parse(&format!("{base}/meetings"))
			.map_err(|source| ConfigError::InvalidUrl { var: "RESOURCE_SERVER_URL", source })
	}
}

fn parse_timeout(raw: &str) -> Result<StdDuration, ConfigError> {
	match raw.trim().parse::<u64>() {
		Ok(0) => Err(ConfigError::InvalidEnv {
			var: "HTTP_TIMEOUT_SECS",
			reason: "timeout must be at least one second".into(),
		}),
		Ok(secs) => Ok(StdDuration::from_secs(secs)),
		Err(e) => Err(ConfigError::InvalidEnv { var: "HTTP_TIMEOUT_SECS", reason: e.to_string() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base_env() -> HashMap<&'static str, &'static str> {
		HashMap::from_iter([
			("CLIENT_ID", "client"),
			("CLIENT_SECRET", "client-secret"),
			("TOKEN_URL", "https://idp.example.com/oauth2/token"),
			("AUTHORIZE_URL", "https://idp.example.com/oauth2/authorize"),
			("AUTHN_URL", "https://idp.example.com/oauth2/authn"),
			("REDIRECT_URI", "https://app.example.com/callback"),
			("AGENT_ID", "agent-1"),
			("AGENT_NAME", "scheduler"),
			("AGENT_SECRET", "agent-secret"),
		])
	}

	fn load(env: &HashMap<&'static str, &'static str>) -> Result<BrokerConfig, ConfigError> {
		BrokerConfig::from_lookup(|key| env.get(key).map(|value| value.to_string()))
	}

	#[test]
	fn loads_required_values_and_defaults() {
		let config = load(&base_env()).expect("Complete environment should load.");

		assert_eq!(config.client_id, "client");
		assert_eq!(config.agent.id.as_ref(), "agent-1");
		assert_eq!(config.resource_indicator(), DEFAULT_RESOURCE_SERVER);
		assert_eq!(
			config.meetings_endpoint().expect("Meetings endpoint should build.").as_str(),
			"http://localhost:9091/meetings"
		);
		assert_eq!(config.authenticator_id, DEFAULT_AUTHENTICATOR_ID);
		assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
	}

	#[test]
	fn missing_or_blank_required_values_are_fatal() {
		let mut env = base_env();

		env.remove("AGENT_SECRET");

		assert!(matches!(load(&env), Err(ConfigError::MissingEnv { var: "AGENT_SECRET" })));

		let mut env = base_env();

		env.insert("CLIENT_ID", "   ");

		assert!(matches!(load(&env), Err(ConfigError::MissingEnv { var: "CLIENT_ID" })));
	}

	#[test]
	fn invalid_values_are_reported_by_variable() {
		let mut env = base_env();

		env.insert("TOKEN_URL", "not a url");

		assert!(matches!(load(&env), Err(ConfigError::InvalidUrl { var: "TOKEN_URL", .. })));

		let mut env = base_env();

		env.insert("HTTP_TIMEOUT_SECS", "0");

		assert!(matches!(
			load(&env),
			Err(ConfigError::InvalidEnv { var: "HTTP_TIMEOUT_SECS", .. })
		));
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let config = load(&base_env()).expect("Complete environment should load.");
		let rendered = format!("{config:?}");

		assert!(!rendered.contains("client-secret"));
		assert!(!rendered.contains("agent-secret"));
	}
}
