//! Client Credentials flow for app-level tokens.
//!
//! App tokens are neither user- nor agent-specific and are not cached: every call performs a
//! fresh `client_credentials` grant.

// self
use crate::{
	_prelude::*,
	auth::{ScopeList, Token, TokenKind},
	flows::Broker,
	oauth::TokenTarget,
	obs::{self, FlowKind},
};

impl Broker {
	/// Performs the `client_credentials` grant for `scopes`.
	pub async fn fetch_app_token(&self, scopes: &ScopeList) -> Result<Token> {
		obs::observe(FlowKind::AppToken, "fetch_app_token", async move {
			let target =
				TokenTarget { kind: TokenKind::App, subject: &self.config.client_id, scopes };

			self.facade()?.exchange_client_credentials(target).await
		})
		.await
	}
}
