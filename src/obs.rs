//! Optional observability helpers for broker and gate flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `agent_broker.flow` with the `flow`
//!   (operation) and `stage` (call site) fields, plus `warn` events for upstream failures.
//! - Enable `metrics` to increment the `agent_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the broker and the action gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Agent self-authentication (authorize, authenticate, PKCE exchange).
	AgentToken,
	/// Authorization URL construction and code correlation.
	Authorization,
	/// Delegated code exchange carrying the actor token.
	UserToken,
	/// Client credentials grant.
	AppToken,
	/// Booking preview tool.
	Preview,
	/// Booking commit tool.
	Commit,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AgentToken => "agent_token",
			FlowKind::Authorization => "authorization",
			FlowKind::UserToken => "user_token",
			FlowKind::AppToken => "app_token",
			FlowKind::Preview => "preview",
			FlowKind::Commit => "commit",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker or gate operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span and records attempt plus outcome.
pub(crate) async fn observe<T, E, Fut>(
	kind: FlowKind,
	stage: &'static str,
	fut: Fut,
) -> Result<T, E>
where
	E: Display,
	Fut: Future<Output = Result<T, E>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			warn_flow_failure(kind, stage, e);
			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}

/// Synchronous counterpart of [`observe`].
pub(crate) fn observe_sync<T, E, F>(kind: FlowKind, stage: &'static str, f: F) -> Result<T, E>
where
	E: Display,
	F: FnOnce() -> Result<T, E>,
{
	let _entered = FlowSpan::new(kind, stage).entered();

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = f();

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			warn_flow_failure(kind, stage, e);
			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_snake_case() {
		assert_eq!(FlowKind::AgentToken.to_string(), "agent_token");
		assert_eq!(FlowKind::Commit.as_str(), "commit");
		assert_eq!(FlowOutcome::Failure.to_string(), "failure");
	}

	#[tokio::test]
	async fn observe_passes_results_through() {
		let ok: Result<u8, String> = observe(FlowKind::AppToken, "test", async { Ok(7) }).await;
		let err: Result<u8, String> =
			observe(FlowKind::AppToken, "test", async { Err("boom".into()) }).await;

		assert_eq!(ok, Ok(7));
		assert_eq!(err, Err("boom".to_string()));
	}
}
