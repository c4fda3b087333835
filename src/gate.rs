//! Flow-state-gated booking tools.
//!
//! [`ActionGate::preview`] hands the user a booking summary plus a consent link and records
//! `BOOKING_PREVIEW_INITIATED`. [`ActionGate::commit`] only runs once that marker is present
//! anywhere in the thread's log; it resolves the delegated token before touching the log, then
//! records `BOOKING_PREVIEW_COMPLETED` and `BOOKING_INITIATED` and posts the booking. A `201`
//! records `BOOKING_COMPLETED` and clears the log; anything else puts
//! `BOOKING_PREVIEW_INITIATED` back so the user can retry without a new preview.
//!
//! Tool operations never return `Err`: every failure becomes a [`ToolOutput`]. Operations on
//! one thread are serialized; different threads proceed in parallel.

pub mod envelope;
pub mod meetings;

pub use envelope::*;
pub use meetings::{BookingOutcome, MeetingInput, local_time_zone};

// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	auth::ThreadId,
	flow_state::{FlowStateMarker, FlowStateTracker},
	flows::{
		Broker,
		common::{self, KeyedLocks, MEETING_SCOPES},
	},
	obs::{self, FlowKind},
};

/// Errors raised inside gate operations before they are folded into a [`ToolOutput`].
#[derive(Debug, ThisError)]
pub enum GateError {
	/// A required booking field is empty.
	#[error(
		"{field} is required. Look for it in the conversation or ask the user for the {field}."
	)]
	MissingField {
		/// Wire name of the missing field.
		field: &'static str,
	},
	/// Commit was attempted before a preview was issued on the thread.
	#[error("Booking preview not completed")]
	PreviewNotCompleted,
	/// Broker failure (authorization, token, transport).
	#[error(transparent)]
	Broker(#[from] Error),
}

/// Preview and commit operations over one broker and one flow-state tracker.
#[derive(Clone, Debug)]
pub struct ActionGate {
	broker: Broker,
	flow_state: Arc<FlowStateTracker>,
	thread_guards: Arc<KeyedLocks<ThreadId>>,
}
impl ActionGate {
	/// Creates a gate with a fresh flow-state tracker.
	pub fn new(broker: Broker) -> Self {
		Self::with_tracker(broker, Default::default())
	}

	/// Creates a gate sharing an existing tracker.
	pub fn with_tracker(broker: Broker, flow_state: Arc<FlowStateTracker>) -> Self {
		Self { broker, flow_state, thread_guards: Default::default() }
	}

	/// Broker used for authorization and tokens.
	pub fn broker(&self) -> &Broker {
		&self.broker
	}

	/// Flow-state tracker shared with the turn handler.
	pub fn flow_state(&self) -> &Arc<FlowStateTracker> {
		&self.flow_state
	}

	/// Validates the booking, issues a consent URL, and records `BOOKING_PREVIEW_INITIATED`.
	pub async fn preview(&self, thread: &ThreadId, input: MeetingInput) -> ToolOutput {
		let _serialized = self.thread_guards.lock(thread).await;
		let result =
			obs::observe(FlowKind::Preview, "preview", async { self.try_preview(thread, input) })
				.await;

		result.unwrap_or_else(|e| ToolOutput::preview_error(e.to_string()))
	}

	/// Posts the previewed booking with the user's delegated token.
	pub async fn commit(&self, thread: &ThreadId, input: MeetingInput) -> ToolOutput {
		let _serialized = self.thread_guards.lock(thread).await;
		let result = obs::observe(FlowKind::Commit, "commit", self.try_commit(thread, input)).await;

		result.unwrap_or_else(|e| ToolOutput::commit_error(e.to_string()))
	}

	/// Redirect handler: exchanges the code and records `BOOKING_AUTHORIZED` on the thread that
	/// produced `state`.
	pub async fn complete_authorization(&self, state: &str, code: &str) -> Result<ThreadId> {
		let thread = self
			.broker
			.get_thread_from_state(state)
			.ok_or_else(|| Error::NoPendingRequest { reference: common::redact(state) })?;
		let _serialized = self.thread_guards.lock(&thread).await;
		let (thread, _) = self.broker.complete_authorization(state, code).await?;

		self.flow_state.add_state(&thread, FlowStateMarker::BookingAuthorized);

		Ok(thread)
	}

	fn try_preview(&self, thread: &ThreadId, input: MeetingInput) -> Result<ToolOutput, GateError> {
		let meeting = input.validate()?;
		let user = common::user_for_thread(&self.broker, thread)?;
		let scopes = common::scopes_of(&MEETING_SCOPES)?;
		let authorization_url = self.broker.get_authorization_url(thread, &user, &scopes)?;

		self.flow_state.add_state(thread, FlowStateMarker::PreviewInitiated);

		Ok(ToolOutput::new(
			meeting.summary(),
			json!({
				"authorization_url": authorization_url.as_str(),
				"schedule_preview": meeting,
			}),
		)
		.with_frontend_state(FrontendState::BookingPreview))
	}

	async fn try_commit(
		&self,
		thread: &ThreadId,
		input: MeetingInput,
	) -> Result<ToolOutput, GateError> {
		if !self.flow_state.contains(thread, FlowStateMarker::PreviewInitiated) {
			return Err(GateError::PreviewNotCompleted);
		}

		let meeting = input.validate()?;
		let user = common::user_for_thread(&self.broker, thread)?;
		let scopes = common::scopes_of(&MEETING_SCOPES)?;
		let token = self
			.broker
			.get_user_token(&user, &scopes)
			.await?
			.ok_or_else(|| Error::MissingUserToken { user: user.to_string() })?;
		let endpoint = self.broker.config.meetings_endpoint().map_err(Error::from)?;

		self.flow_state.add_state(thread, FlowStateMarker::PreviewCompleted);
		self.flow_state.add_state(thread, FlowStateMarker::BookingInitiated);

		let outcome =
			match meetings::create_meeting(&self.broker.http_client, endpoint, &token, &meeting)
				.await
			{
				Ok(outcome) => outcome,
				Err(e) => {
					self.flow_state.add_state(thread, FlowStateMarker::PreviewInitiated);

					return Err(e.into());
				},
			};

		match outcome {
			BookingOutcome::Created { id } => {
				self.flow_state.add_state(thread, FlowStateMarker::BookingCompleted);
				self.flow_state.clear_state(thread);

				let id_text = meetings::display_id(&id);

				Ok(ToolOutput::new(
					format!(
						"Meeting successfully scheduled on {} at {}. Meeting ID: {id_text}",
						meeting.date, meeting.start_time
					),
					json!({ "meeting_details": { "meeting_id": id } }),
				))
			},
			BookingOutcome::Rejected { status, detail } => {
				let status = format!("status {status}");

				obs::warn_flow_failure(FlowKind::Commit, "meetings_api", &status);
				self.flow_state.add_state(thread, FlowStateMarker::PreviewInitiated);

				Ok(ToolOutput::new(
					format!("Failed to schedule meeting: {detail}"),
					json!({ "meeting_details": { "error": detail, "status": "failed" } }),
				))
			},
		}
	}
}
