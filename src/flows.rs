//! Broker service coordinating agent, delegated, and app token flows.

pub mod agent;
pub mod authorization;
pub mod common;

mod client_credentials;

// self
use crate::{
	_prelude::*,
	config::BrokerConfig,
	flows::common::KeyedLocks,
	http::ReqwestHttpClient,
	oauth::BasicFacade,
	store::{CorrelationStore, MemoryStore, StoreKey, TokenStore},
};

/// OAuth broker for one identity provider and one agent identity.
///
/// The broker owns the token cache and the correlation store; both are plain service objects
/// built here and shared by reference, so a process may run several independent brokers (tests
/// do). Cloning is cheap and shares every map.
#[derive(Clone)]
pub struct Broker {
	/// Configuration loaded at startup.
	pub config: Arc<BrokerConfig>,
	/// HTTP client used for every outbound call.
	pub http_client: ReqwestHttpClient,
	/// Token cache for agent and user tokens.
	pub store: Arc<dyn TokenStore>,
	/// Thread, state, and claim correlation maps.
	pub correlation: Arc<CorrelationStore>,
	pub(crate) flow_guards: Arc<KeyedLocks<StoreKey>>,
}
impl Broker {
	/// Creates a broker with an in-memory token cache and a client honoring the configured
	/// timeout.
	pub fn new(config: BrokerConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.http_timeout)?;

		Ok(Self::with_parts(config, http_client, Arc::new(MemoryStore::default())))
	}

	/// Creates a broker from caller-provided transport and token cache.
	pub fn with_parts(
		config: BrokerConfig,
		http_client: ReqwestHttpClient,
		store: Arc<dyn TokenStore>,
	) -> Self {
		Self {
			config: Arc::new(config),
			http_client,
			store,
			correlation: Default::default(),
			flow_guards: Default::default(),
		}
	}

	pub(crate) fn facade(&self) -> Result<BasicFacade<'_>> {
		BasicFacade::from_config(&self.config, &self.http_client)
	}
}
impl Debug for Broker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("client_id", &self.config.client_id)
			.field("agent", &self.config.agent.id)
			.field("token_endpoint", &self.config.endpoints.token.as_str())
			.finish()
	}
}
