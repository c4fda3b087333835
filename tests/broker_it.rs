mod common;

// crates.io
use httpmock::prelude::*;
// self
use agent_token_broker::{
	auth::{TokenKind, UserClaims},
	error::Error,
};
use common::*;

#[tokio::test]
async fn agent_token_runs_three_round_trips_once_per_thread() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let mocks = mock_agent_flow(&server).await;
	let thread = thread("thread-agent");
	let first = broker.fetch_agent_token(&thread).await.expect("Agent flow should succeed.");
	let second = broker.fetch_agent_token(&thread).await.expect("Cached agent token should load.");

	assert_eq!(first.kind, TokenKind::Agent);
	assert_eq!(first.subject, "thread-agent");
	assert_eq!(first.access_token.expose(), AGENT_TOKEN);
	assert_eq!(second.access_token.expose(), AGENT_TOKEN);
	assert!(first.expires_at.is_some());

	mocks.authorize.assert_calls_async(1).await;
	mocks.authn.assert_calls_async(1).await;
	mocks.token.assert_calls_async(1).await;

	broker
		.fetch_agent_token(&common::thread("thread-other"))
		.await
		.expect("A second thread should authenticate separately.");

	mocks.token.assert_calls_async(2).await;
}

#[tokio::test]
async fn missing_authenticator_code_fails_without_token_exchange() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let authorize = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/authorize");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"flowId\":\"flow-1\"}");
		})
		.await;
	let authn = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/authn");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"flowStatus\":\"FAIL_INCOMPLETE\"}");
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token");
			then.status(200).header("content-type", "application/json").body(token_body("unused"));
		})
		.await;
	let err = broker
		.fetch_agent_token(&thread("thread-agent"))
		.await
		.expect_err("Missing authenticator code should fail.");

	assert!(matches!(err, Error::AgentAuthentication { .. }), "Unexpected error: {err:?}");

	authorize.assert_calls_async(1).await;
	authn.assert_calls_async(1).await;
	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn authorization_url_carries_consent_parameters() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let thread = thread("thread-url");
	let user = user("alice");

	bind(&broker, &thread, &user);

	let url = broker
		.get_authorization_url(&thread, &user, &scopes(&["openid", "create_meeting"]))
		.expect("Authorization URL should build.");
	let url = url.as_str();

	assert!(url.starts_with(&format!("{}/oauth2/authorize?", server.base_url())));
	assert_eq!(query_value(url, "client_id"), CLIENT_ID);
	assert_eq!(query_value(url, "redirect_uri"), "https://app.example.com/callback");
	assert_eq!(query_value(url, "scope"), "openid create_meeting");
	assert_eq!(query_value(url, "response_type"), "code");
	assert_eq!(query_value(url, "response_mode"), "query");
	assert_eq!(query_value(url, "requested_actor"), AGENT_ID);
	assert_eq!(query_value(url, "orgId"), ORG);
	assert_eq!(query_value(url, "fidp"), "OrganizationSSO");
	assert_eq!(query_value(url, "nonce").len(), 16);

	let state = query_value(url, "state");

	assert_eq!(state.len(), 32);
	assert_eq!(broker.get_thread_from_state(&state), Some(thread));
}

#[tokio::test]
async fn authorization_url_requires_organization_claim() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let thread = thread("thread-claims");
	let user = user("bob");

	broker.store_user_id_against_thread(&thread, &user);
	broker.store_user_claims(&user, UserClaims::default());

	let err = broker
		.get_authorization_url(&thread, &user, &scopes(&["openid"]))
		.expect_err("Missing organization claim should fail.");

	assert!(
		matches!(err, Error::MissingClaim { claim: "user_org", .. }),
		"Unexpected error: {err:?}"
	);
}

#[tokio::test]
async fn code_correlation_errors_are_explicit() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let thread = thread("thread-codes");
	let user = user("carol");

	assert!(matches!(
		broker.store_auth_code(&user, "early-code"),
		Err(Error::NoPendingRequest { .. })
	));
	assert!(matches!(
		broker.fetch_user_token("unknown-state").await,
		Err(Error::NoPendingRequest { .. })
	));

	bind(&broker, &thread, &user);

	let url = broker
		.get_authorization_url(&thread, &user, &scopes(&["openid", "create_meeting"]))
		.expect("Authorization URL should build.");
	let state = query_value(url.as_str(), "state");

	assert!(matches!(
		broker.fetch_user_token(&state).await,
		Err(Error::MissingAuthorizationCode)
	));

	let request =
		broker.store_auth_code(&user, USER_CODE).expect("Pending request should accept code.");

	assert_eq!(request.state, state);
}

#[tokio::test]
async fn user_token_exchange_injects_actor_token_and_caches_by_scope_order() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let agent = mock_agent_flow(&server).await;
	let exchange = mock_user_exchange(&server).await;
	let thread = thread("thread-obo");
	let user = user("dave");
	let requested = scopes(&["openid", "create_meeting"]);

	bind(&broker, &thread, &user);

	let url = broker
		.get_authorization_url(&thread, &user, &requested)
		.expect("Authorization URL should build.");
	let state = query_value(url.as_str(), "state");

	broker.store_auth_code(&user, USER_CODE).expect("Pending request should accept code.");

	let token = broker.fetch_user_token(&state).await.expect("Delegated exchange should succeed.");

	assert_eq!(token.kind, TokenKind::User);
	assert_eq!(token.access_token.expose(), USER_TOKEN);

	agent.token.assert_calls_async(1).await;
	exchange.assert_calls_async(1).await;

	let cached = broker
		.get_user_token(&user, &requested)
		.await
		.expect("Cache read should succeed.")
		.expect("Token should be cached under the requested scope order.");

	assert_eq!(cached.access_token.expose(), USER_TOKEN);

	// Cache keys keep scope order, so the reversed list is a different entry.
	let reversed = broker
		.get_user_token(&user, &scopes(&["create_meeting", "openid"]))
		.await
		.expect("Cache read should succeed.");

	assert!(reversed.is_none());
}

#[tokio::test]
async fn newer_authorization_request_replaces_the_older_state() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let thread = thread("thread-replace");
	let user = user("erin");
	let requested = scopes(&["openid", "create_meeting"]);

	bind(&broker, &thread, &user);

	let first =
		broker.get_authorization_url(&thread, &user, &requested).expect("First URL should build.");
	let second =
		broker.get_authorization_url(&thread, &user, &requested).expect("Second URL should build.");
	let first_state = query_value(first.as_str(), "state");
	let second_state = query_value(second.as_str(), "state");

	assert_ne!(first_state, second_state);
	assert!(matches!(
		broker.store_auth_code_for_state(&first_state, USER_CODE),
		Err(Error::NoPendingRequest { .. })
	));
	assert!(broker.store_auth_code_for_state(&second_state, USER_CODE).is_ok());
}

#[tokio::test]
async fn complete_authorization_returns_originating_thread() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let _agent = mock_agent_flow(&server).await;
	let exchange = mock_user_exchange(&server).await;
	let thread = thread("thread-callback");
	let user = user("frank");

	bind(&broker, &thread, &user);

	let url = broker
		.get_authorization_url(&thread, &user, &scopes(&["openid", "create_meeting"]))
		.expect("Authorization URL should build.");
	let state = query_value(url.as_str(), "state");
	let (origin, token) = broker
		.complete_authorization(&state, USER_CODE)
		.await
		.expect("Callback should complete the exchange.");

	assert_eq!(origin, thread);
	assert_eq!(token.subject, "frank");

	exchange.assert_async().await;
}

#[tokio::test]
async fn app_tokens_use_client_credentials_and_are_not_cached() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.form_urlencoded_tuple("grant_type", "client_credentials")
				.form_urlencoded_tuple("scope", "internal_org_user_mgt_view")
				.form_urlencoded_tuple("client_id", CLIENT_ID);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("app-token"));
		})
		.await;
	let requested = scopes(&["internal_org_user_mgt_view"]);
	let first = broker.fetch_app_token(&requested).await.expect("App token should be issued.");
	let second = broker.fetch_app_token(&requested).await.expect("App token should be issued.");

	assert_eq!(first.kind, TokenKind::App);
	assert_eq!(second.access_token.expose(), "app-token");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn token_endpoint_errors_are_classified() {
	let server = MockServer::start_async().await;
	let broker = broker(&server);
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"code expired\"}");
		})
		.await;
	let err = broker
		.fetch_app_token(&scopes(&["openid"]))
		.await
		.expect_err("Rejected grant should fail.");

	match err {
		Error::InvalidGrant { reason } => assert!(reason.contains("code expired")),
		other => panic!("Unexpected error: {other:?}"),
	}
}
