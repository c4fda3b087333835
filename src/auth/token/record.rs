//! Issued token records and their builder.

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, token::secret::TokenSecret},
};

/// Identity a token was issued to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// The agent's own token, cached per conversation thread.
	Agent,
	/// Delegated token representing the agent acting for an end user.
	User,
	/// Application token from the client credentials grant.
	App,
}
impl TokenKind {
	/// Returns a stable label for keys and logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::Agent => "agent",
			TokenKind::User => "user",
			TokenKind::App => "app",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the provider returned an empty access token.
	#[error("Access token cannot be empty.")]
	EmptyAccessToken,
}

/// Bearer token obtained from the identity provider.
///
/// The cache never evicts tokens on expiry; [`is_expired_at`](Self::is_expired_at) is
/// informational and callers must not assume a cached token is still live.
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
	/// Identity the token was issued to.
	pub kind: TokenKind,
	/// Thread id for agent tokens, user id for user tokens, client id for app tokens.
	pub subject: String,
	/// Scopes requested when the token was issued, in request order.
	pub scopes: ScopeList,
	/// Bearer secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Expiry derived from `expires_in`, when the provider reported one.
	pub expires_at: Option<OffsetDateTime>,
}
impl Token {
	/// Returns a builder for the provided identity and scopes.
	pub fn builder(kind: TokenKind, subject: impl Into<String>, scopes: ScopeList) -> TokenBuilder {
		TokenBuilder::new(kind, subject.into(), scopes)
	}

	/// Returns `true` when an expiry is known and has passed at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Value for an `Authorization` header.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("kind", &self.kind)
			.field("subject", &self.subject)
			.field("scopes", &self.scopes)
			.field("access_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug)]
pub struct TokenBuilder {
	kind: TokenKind,
	subject: String,
	scopes: ScopeList,
	access_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenBuilder {
	fn new(kind: TokenKind, subject: String, scopes: ScopeList) -> Self {
		Self { kind, subject, scopes, access_token: None, issued_at: None, expires_in: None }
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Option<Duration>) -> Self {
		self.expires_in = duration;

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self.access_token.ok_or(TokenBuilderError::MissingAccessToken)?;

		if access_token.expose().is_empty() {
			return Err(TokenBuilderError::EmptyAccessToken);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = self.expires_in.map(|delta| issued_at + delta);

		Ok(Token {
			kind: self.kind,
			subject: self.subject,
			scopes: self.scopes,
			access_token,
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn scopes() -> ScopeList {
		ScopeList::new(["openid", "create_meeting"]).expect("Scope fixture should be valid.")
	}

	#[test]
	fn builder_derives_optional_expiry() {
		let issued = macros::datetime!(2025-06-01 10:00 UTC);
		let token = Token::builder(TokenKind::User, "alice", scopes())
			.access_token("secret")
			.issued_at(issued)
			.expires_in(Some(Duration::minutes(30)))
			.build()
			.expect("Token builder should succeed with a relative expiry.");

		assert_eq!(token.expires_at, Some(macros::datetime!(2025-06-01 10:30 UTC)));
		assert!(!token.is_expired_at(macros::datetime!(2025-06-01 10:29 UTC)));
		assert!(token.is_expired_at(macros::datetime!(2025-06-01 10:30 UTC)));
		assert_eq!(token.bearer(), "Bearer secret");
	}

	#[test]
	fn tokens_without_expiry_never_report_expired() {
		let token = Token::builder(TokenKind::Agent, "thread-1", scopes())
			.access_token("agent")
			.build()
			.expect("Token builder should succeed without an expiry.");

		assert!(token.expires_at.is_none());
		assert!(!token.is_expired_at(OffsetDateTime::now_utc() + Duration::days(365)));
	}

	#[test]
	fn builder_rejects_missing_or_empty_secrets() {
		assert_eq!(
			Token::builder(TokenKind::App, "client", scopes()).build().map(|_| ()),
			Err(TokenBuilderError::MissingAccessToken)
		);
		assert_eq!(
			Token::builder(TokenKind::App, "client", scopes()).access_token("").build().map(|_| ()),
			Err(TokenBuilderError::EmptyAccessToken)
		);
	}

	#[test]
	fn debug_output_redacts_secret() {
		let token = Token::builder(TokenKind::User, "alice", scopes())
			.access_token("super-secret")
			.build()
			.expect("Token builder should succeed.");
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("super-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
