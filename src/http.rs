//! Transport primitives for identity-provider and resource-server calls.
//!
//! [`ReqwestHttpClient`] is the broker's single HTTP stack. Token endpoint calls go through
//! the `oauth2` crate via [`InstrumentedHandle`], which records the response status and
//! `Retry-After` hint into a [`ResponseMetadataSlot`] so error mapping can classify
//! failures. The non-OAuth calls (direct authentication, meetings API) use
//! [`ReqwestHttpClient::send`] and decode JSON with `serde_path_to_error`.

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	RequestBuilder, StatusCode,
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, map_reqwest_error},
};

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Raw response from a non-OAuth endpoint.
#[derive(Clone, Debug)]
pub struct JsonResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl JsonResponse {
	/// Decodes the body, reporting the JSON path of the first mismatch.
	pub fn decode<T>(&self, endpoint: &'static str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		decode_json(endpoint, &self.body, Some(self.status.as_u16()))
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are never followed: the token and authentication endpoints answer directly, and a
/// redirect from them indicates a misconfiguration rather than something to chase.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that applies `timeout` to every request and never follows redirects.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(timeout).redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Builds an instrumented handle for `oauth2` requests.
	pub fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}

	/// Sends a prepared request and buffers the body.
	pub async fn send(
		&self,
		endpoint: &'static str,
		request: RequestBuilder,
	) -> Result<JsonResponse> {
		let response = request.send().await.map_err(|e| map_reqwest_error(endpoint, e))?;
		let status = response.status();
		let body =
			response.bytes().await.map_err(|e| map_reqwest_error(endpoint, e))?.to_vec();

		Ok(JsonResponse { status, body })
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Instrumented adapter that implements [`AsyncHttpClient`] for reqwest.
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle passed to `oauth2` request builders.
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Decodes a JSON body with path-aware errors.
pub(crate) fn decode_json<T>(endpoint: &'static str, body: &[u8], status: Option<u16>) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| TransientError::ResponseParse { endpoint, source, status }.into())
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
