//! Broker-level error types shared across flows, stores, and the action gate.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Requested scopes exceed what the provider is willing to grant.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Provider rejected the grant (e.g., a reused or expired code).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// No authorization request is pending for the given user or state.
	#[error("No pending authorization request for {reference}.")]
	NoPendingRequest {
		/// User identifier or redacted state the lookup was keyed by.
		reference: String,
	},
	/// The pending authorization request has not received a code yet.
	#[error("Authorization request has not received an authorization code.")]
	MissingAuthorizationCode,
	/// A claim required to build the authorization URL is missing.
	#[error("User `{user}` is missing the `{claim}` claim.")]
	MissingClaim {
		/// User whose claims were inspected.
		user: String,
		/// Name of the missing claim.
		claim: &'static str,
	},
	/// No end user has been bound to the conversation thread.
	#[error("No user is associated with thread `{thread}`.")]
	UnknownThread {
		/// Thread identifier.
		thread: String,
	},
	/// The agent could not authenticate itself against the identity provider.
	#[error("Agent authentication failed: {reason}.")]
	AgentAuthentication {
		/// Broker-supplied reason string.
		reason: String,
	},
	/// No delegated token has been issued for the user and scope list.
	#[error("No delegated token is cached for user `{user}`; authorization is required.")]
	MissingUserToken {
		/// User identifier.
		user: String,
	},
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A required environment variable is missing or blank.
	#[error("Environment variable `{var}` is required.")]
	MissingEnv {
		/// Variable name.
		var: &'static str,
	},
	/// An environment variable holds an invalid value.
	#[error("Environment variable `{var}` is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		var: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// A configured endpoint is not a valid URL.
	#[error("Endpoint `{var}` is not a valid URL.")]
	InvalidUrl {
		/// Variable or endpoint name.
		var: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configured identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Request scopes failed validation.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token builder validation failed.
	#[error("Unable to build token.")]
	TokenBuild(#[from] crate::auth::TokenBuilderError),
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned an unexpected but non-fatal response.
	#[error("The {endpoint} endpoint returned an unexpected response: {message}.")]
	Upstream {
		/// Endpoint label (token, authorize, authn, meetings).
		endpoint: &'static str,
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream responded with malformed JSON that could not be parsed.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The request exceeded the configured timeout.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

/// Maps a reqwest failure for the given endpoint into the broker taxonomy.
pub(crate) fn map_reqwest_error(endpoint: &'static str, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Timeout { endpoint }.into();
	}

	TransportError::network(endpoint, err).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn transport_messages_never_embed_urls() {
		let err: Error = TransportError::network(
			"meetings",
			std::io::Error::other("connect to http://localhost:9091 refused"),
		)
		.into();
		let rendered = err.to_string();

		assert!(!rendered.contains("http://"), "Rendered error leaked a URL: {rendered}");
		assert!(rendered.contains("meetings"));
	}

	#[test]
	fn missing_claim_names_user_and_claim() {
		let err = Error::MissingClaim { user: "alice".into(), claim: "user_org" };

		assert_eq!(err.to_string(), "User `alice` is missing the `user_org` claim.");
	}
}
