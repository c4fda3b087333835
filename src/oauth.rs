//! Token endpoint facade built on the `oauth2` crate.
//!
//! Three exchanges are supported: the delegated authorization-code grant carrying an
//! `actor_token`, the PKCE authorization-code grant the agent uses for itself (with a
//! `resource` indicator), and the client-credentials grant. Client authentication always uses
//! form-body `client_id`/`client_secret`.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Token, TokenKind},
	config::BrokerConfig,
	error::{ConfigError, TransientError, TransportError, map_reqwest_error},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const TOKEN_ENDPOINT: &str = "token";

/// OAuth 2.0 grant types used by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant (delegated or PKCE).
	AuthorizationCode,
	/// Client Credentials grant for app-only tokens.
	ClientCredentials,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::ClientCredentials => "client_credentials",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Subject and scopes a token request is made for.
#[derive(Clone, Debug)]
pub(crate) struct TokenTarget<'a> {
	pub(crate) kind: TokenKind,
	pub(crate) subject: &'a str,
	pub(crate) scopes: &'a ScopeList,
}

pub(crate) struct BasicFacade<'a> {
	oauth_client: ConfiguredBasicClient,
	http_client: &'a ReqwestHttpClient,
}
impl<'a> BasicFacade<'a> {
	pub(crate) fn from_config(
		config: &BrokerConfig,
		http_client: &'a ReqwestHttpClient,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(config.endpoints.authorize.to_string())
			.map_err(|source| ConfigError::InvalidUrl { var: "AUTHORIZE_URL", source })?;
		let token_url = TokenUrl::new(config.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidUrl { var: "TOKEN_URL", source })?;
		let redirect_url = RedirectUrl::new(config.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidUrl { var: "REDIRECT_URI", source })?;
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client })
	}

	/// `authorization_code` grant whose result represents the agent acting for the user.
	pub(crate) async fn exchange_code_with_actor(
		&self,
		target: TokenTarget<'_>,
		code: &str,
		actor_token: &str,
	) -> Result<Token> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.instrumented(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.add_extra_param("scope", target.scopes.joined())
			.add_extra_param("actor_token", actor_token.to_owned())
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(GrantType::AuthorizationCode, meta.take(), err))?;

		map_token_response(target, response)
	}

	/// PKCE `authorization_code` grant used by the agent's own authentication.
	pub(crate) async fn exchange_code_with_verifier(
		&self,
		target: TokenTarget<'_>,
		code: &str,
		verifier: &str,
		resource: &str,
	) -> Result<Token> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.instrumented(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()))
			.add_extra_param("scope", target.scopes.joined())
			.add_extra_param("resource", resource.to_owned())
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(GrantType::AuthorizationCode, meta.take(), err))?;

		map_token_response(target, response)
	}

	/// `client_credentials` grant for app-level tokens.
	pub(crate) async fn exchange_client_credentials(
		&self,
		target: TokenTarget<'_>,
	) -> Result<Token> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.instrumented(meta.clone());
		let mut request = self.oauth_client.exchange_client_credentials();

		for scope in target.scopes.iter() {
			request = request.add_scope(Scope::new(scope.to_owned()));
		}

		let response = request
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(GrantType::ClientCredentials, meta.take(), err))?;

		map_token_response(target, response)
	}
}

fn map_token_response(target: TokenTarget<'_>, response: BasicTokenResponse) -> Result<Token> {
	let expires_in = response
		.expires_in()
		.map(|ttl| i64::try_from(ttl.as_secs()).map(Duration::seconds))
		.transpose()
		.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	Token::builder(target.kind, target.subject, target.scopes.clone())
		.access_token(response.access_token().secret().to_owned())
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(expires_in)
		.build()
		.map_err(|e| ConfigError::from(e).into())
}

fn map_request_error(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(grant, response, meta),
		RequestTokenError::Request(error) => map_transport_error(meta, error),
		RequestTokenError::Parse(source, _body) => TransientError::ResponseParse {
			endpoint: TOKEN_ENDPOINT,
			source,
			status: meta_status(meta),
		}
		.into(),
		RequestTokenError::Other(message) => TransientError::Upstream {
			endpoint: TOKEN_ENDPOINT,
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_server_response(
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_string();
	let reason = match response.error_description() {
		Some(description) => format!("{grant} grant failed with {code}: {description}"),
		None => format!("{grant} grant failed with {code}"),
	};

	match classify_oauth_error(&code).unwrap_or_else(|| classify_status(meta_status(meta))) {
		ErrorClass::InvalidGrant => Error::InvalidGrant { reason },
		ErrorClass::InvalidClient => Error::InvalidClient { reason },
		ErrorClass::InsufficientScope => Error::InsufficientScope { reason },
		ErrorClass::Transient => TransientError::Upstream {
			endpoint: TOKEN_ENDPOINT,
			message: reason,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_transport_error(
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<ReqwestError>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => map_reqwest_error(TOKEN_ENDPOINT, *inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::Upstream {
			endpoint: TOKEN_ENDPOINT,
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::Upstream {
			endpoint: TOKEN_ENDPOINT,
			message: "HTTP client error".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ErrorClass {
	InvalidGrant,
	InvalidClient,
	InsufficientScope,
	Transient,
}

fn classify_oauth_error(code: &str) -> Option<ErrorClass> {
	match code.to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" => Some(ErrorClass::InvalidGrant),
		"invalid_client" | "unauthorized_client" => Some(ErrorClass::InvalidClient),
		"invalid_scope" | "insufficient_scope" => Some(ErrorClass::InsufficientScope),
		"temporarily_unavailable" | "server_error" => Some(ErrorClass::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ErrorClass {
	match status {
		Some(400 | 404 | 410) => ErrorClass::InvalidGrant,
		Some(401) => ErrorClass::InvalidClient,
		Some(403) => ErrorClass::InsufficientScope,
		_ => ErrorClass::Transient,
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_error_codes_take_precedence_over_status() {
		assert_eq!(classify_oauth_error("invalid_grant"), Some(ErrorClass::InvalidGrant));
		assert_eq!(classify_oauth_error("UNAUTHORIZED_CLIENT"), Some(ErrorClass::InvalidClient));
		assert_eq!(classify_oauth_error("invalid_scope"), Some(ErrorClass::InsufficientScope));
		assert_eq!(classify_oauth_error("invalid_request"), None);
	}

	#[test]
	fn status_fallback_covers_common_codes() {
		assert_eq!(classify_status(Some(400)), ErrorClass::InvalidGrant);
		assert_eq!(classify_status(Some(401)), ErrorClass::InvalidClient);
		assert_eq!(classify_status(Some(403)), ErrorClass::InsufficientScope);
		assert_eq!(classify_status(Some(503)), ErrorClass::Transient);
		assert_eq!(classify_status(None), ErrorClass::Transient);
	}

	#[test]
	fn grant_labels_match_rfc_6749() {
		assert_eq!(GrantType::AuthorizationCode.to_string(), "authorization_code");
		assert_eq!(GrantType::ClientCredentials.as_str(), "client_credentials");
	}
}
