#![allow(dead_code)]

// crates.io
use httpmock::{Mock, prelude::*};
// self
use agent_token_broker::{
	auth::{ScopeList, ThreadId, UserClaims, UserId},
	config::BrokerConfig,
	flows::Broker,
	gate::ActionGate,
	url::Url,
};

pub const CLIENT_ID: &str = "booking-client";
pub const CLIENT_SECRET: &str = "booking-secret";
pub const AGENT_ID: &str = "agent-7";
pub const AGENT_NAME: &str = "scheduler-agent";
pub const AGENT_SECRET: &str = "agent-password";
pub const ORG: &str = "org-acme";
pub const AGENT_CODE: &str = "agent-code";
pub const AGENT_TOKEN: &str = "agent-access-token";
pub const USER_CODE: &str = "user-code";
pub const USER_TOKEN: &str = "user-access-token";

pub fn config(server: &MockServer) -> BrokerConfig {
	let base = server.base_url();
	let env = [
		("CLIENT_ID", CLIENT_ID.to_string()),
		("CLIENT_SECRET", CLIENT_SECRET.to_string()),
		("TOKEN_URL", format!("{base}/oauth2/token")),
		("AUTHORIZE_URL", format!("{base}/oauth2/authorize")),
		("AUTHN_URL", format!("{base}/oauth2/authn")),
		("REDIRECT_URI", "https://app.example.com/callback".to_string()),
		("AGENT_ID", AGENT_ID.to_string()),
		("AGENT_NAME", AGENT_NAME.to_string()),
		("AGENT_SECRET", AGENT_SECRET.to_string()),
		("RESOURCE_SERVER_URL", base),
		("HTTP_TIMEOUT_SECS", "5".to_string()),
	];

	BrokerConfig::from_lookup(|key| {
		env.iter().find(|(name, _)| *name == key).map(|(_, value)| value.clone())
	})
	.expect("Test configuration should load.")
}

pub fn broker(server: &MockServer) -> Broker {
	Broker::new(config(server)).expect("Broker should build for tests.")
}

pub fn gate(server: &MockServer) -> ActionGate {
	ActionGate::new(broker(server))
}

pub fn thread(value: &str) -> ThreadId {
	ThreadId::new(value).expect("Thread fixture should be valid.")
}

pub fn user(value: &str) -> UserId {
	UserId::new(value).expect("User fixture should be valid.")
}

pub fn scopes(values: &[&str]) -> ScopeList {
	ScopeList::new(values.iter().copied()).expect("Scope fixture should be valid.")
}

/// Binds `user` to `thread` and gives the user an organization claim.
pub fn bind(broker: &Broker, thread: &ThreadId, user: &UserId) {
	broker.store_user_id_against_thread(thread, user);
	broker.store_user_claims(user, UserClaims::with_organization(ORG));
}

pub fn token_body(access_token: &str) -> String {
	format!("{{\"access_token\":\"{access_token}\",\"token_type\":\"Bearer\",\"expires_in\":3600}}")
}

pub struct AgentFlowMocks<'a> {
	pub authorize: Mock<'a>,
	pub authn: Mock<'a>,
	pub token: Mock<'a>,
}

/// Mocks the three agent authentication round trips.
pub async fn mock_agent_flow(server: &MockServer) -> AgentFlowMocks<'_> {
	let authorize = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/authorize")
				.form_urlencoded_tuple("response_mode", "direct")
				.form_urlencoded_tuple("code_challenge_method", "S256")
				.form_urlencoded_tuple("client_id", CLIENT_ID);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"flowId\":\"flow-1\",\"flowStatus\":\"INCOMPLETE\"}");
		})
		.await;
	let authn = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/authn")
				.body_includes("\"flowId\":\"flow-1\"")
				.body_includes(AGENT_NAME)
				.body_includes(AGENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body(format!(
					"{{\"flowStatus\":\"SUCCESS_COMPLETED\",\
					 \"authData\":{{\"code\":\"{AGENT_CODE}\"}}}}"
				));
		})
		.await;
	let resource = server.base_url();
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", AGENT_CODE)
				.form_urlencoded_tuple("resource", resource.as_str())
				.form_urlencoded_tuple("scope", "openid");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(AGENT_TOKEN));
		})
		.await;

	AgentFlowMocks { authorize, authn, token }
}

/// Mocks the delegated exchange that must carry the agent token as `actor_token`.
pub async fn mock_user_exchange(server: &MockServer) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", USER_CODE)
				.form_urlencoded_tuple("actor_token", AGENT_TOKEN)
				.form_urlencoded_tuple("scope", "openid create_meeting")
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(USER_TOKEN));
		})
		.await
}

/// Extracts a query parameter from a URL.
pub fn query_value(url: &str, name: &str) -> String {
	let url = Url::parse(url).expect("Authorization URL should parse.");

	url.query_pairs()
		.find(|(key, _)| key == name)
		.map(|(_, value)| value.into_owned())
		.unwrap_or_else(|| panic!("Authorization URL should carry `{name}`."))
}
