//! Per-thread log of meeting-scheduling lifecycle markers.
//!
//! Each conversation thread owns an ordered, append-only marker log. Gating decisions test
//! membership in the log (not the most recent marker), and the log is only ever cleared in
//! bulk once a booking completes. A second per-message log records the same markers and is
//! cleared independently by the turn handler; it is never consulted for gating.

// self
use crate::{_prelude::*, auth::ThreadId};

/// Lifecycle step completed in the meeting-scheduling conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStateMarker {
	/// A booking preview and authorization URL were handed to the user.
	#[serde(rename = "BOOKING_PREVIEW_INITIATED")]
	PreviewInitiated,
	/// The user confirmed the preview and commit started.
	#[serde(rename = "BOOKING_PREVIEW_COMPLETED")]
	PreviewCompleted,
	/// The booking request is about to be sent downstream.
	BookingInitiated,
	/// The identity provider redirected back and a delegated token was issued.
	BookingAuthorized,
	/// The meetings API confirmed the booking.
	BookingCompleted,
}
impl FlowStateMarker {
	/// Marker name as shown to the planner.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowStateMarker::PreviewInitiated => "BOOKING_PREVIEW_INITIATED",
			FlowStateMarker::PreviewCompleted => "BOOKING_PREVIEW_COMPLETED",
			FlowStateMarker::BookingInitiated => "BOOKING_INITIATED",
			FlowStateMarker::BookingAuthorized => "BOOKING_AUTHORIZED",
			FlowStateMarker::BookingCompleted => "BOOKING_COMPLETED",
		}
	}
}
impl Display for FlowStateMarker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Ordered marker sequence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowStateLog(Vec<FlowStateMarker>);
impl FlowStateLog {
	/// Appends a marker.
	pub fn push(&mut self, marker: FlowStateMarker) {
		self.0.push(marker);
	}

	/// Returns true if the marker appears anywhere in the log.
	pub fn contains(&self, marker: FlowStateMarker) -> bool {
		self.0.contains(&marker)
	}

	/// Removes every marker.
	pub fn clear(&mut self) {
		self.0.clear();
	}

	/// Markers in insertion order.
	pub fn as_slice(&self) -> &[FlowStateMarker] {
		&self.0
	}

	/// Returns true when no markers are recorded.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl Display for FlowStateLog {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		for (idx, marker) in self.0.iter().enumerate() {
			if idx > 0 {
				f.write_str(" ")?;
			}

			f.write_str(marker.as_str())?;
		}

		Ok(())
	}
}

#[derive(Debug, Default)]
struct ThreadLogs {
	thread: FlowStateLog,
	message: FlowStateLog,
}

/// Process-wide mapping from thread id to its marker logs.
///
/// Individual calls are atomic; sequences of calls that must not interleave (check then
/// mutate) are serialized per thread by the action gate.
#[derive(Debug, Default)]
pub struct FlowStateTracker {
	threads: RwLock<HashMap<ThreadId, ThreadLogs>>,
}
impl FlowStateTracker {
	/// Appends `marker` to the thread log and the per-message log.
	pub fn add_state(&self, thread: &ThreadId, marker: FlowStateMarker) {
		let mut threads = self.threads.write();
		let logs = threads.entry(thread.clone()).or_default();

		logs.thread.push(marker);
		logs.message.push(marker);
	}

	/// Thread log, or empty if the thread has never been touched.
	pub fn get_states(&self, thread: &ThreadId) -> Vec<FlowStateMarker> {
		self.threads
			.read()
			.get(thread)
			.map(|logs| logs.thread.as_slice().to_vec())
			.unwrap_or_default()
	}

	/// Space-joined marker names for planner prompts; empty for unknown threads.
	pub fn get_states_as_string(&self, thread: &ThreadId) -> String {
		self.threads.read().get(thread).map(|logs| logs.thread.to_string()).unwrap_or_default()
	}

	/// Membership test used for gating.
	pub fn contains(&self, thread: &ThreadId, marker: FlowStateMarker) -> bool {
		self.threads.read().get(thread).is_some_and(|logs| logs.thread.contains(marker))
	}

	/// Resets the thread log after a terminal success.
	pub fn clear_state(&self, thread: &ThreadId) {
		if let Some(logs) = self.threads.write().get_mut(thread) {
			logs.thread.clear();
		}
	}

	/// Markers recorded since the last [`clear_message_states`](Self::clear_message_states).
	pub fn message_states(&self, thread: &ThreadId) -> Vec<FlowStateMarker> {
		self.threads
			.read()
			.get(thread)
			.map(|logs| logs.message.as_slice().to_vec())
			.unwrap_or_default()
	}

	/// Resets the per-message log at the start of a turn.
	pub fn clear_message_states(&self, thread: &ThreadId) {
		if let Some(logs) = self.threads.write().get_mut(thread) {
			logs.message.clear();
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn thread(id: &str) -> ThreadId {
		ThreadId::new(id).expect("Thread fixture should be valid.")
	}

	#[test]
	fn string_form_follows_call_order() {
		let tracker = FlowStateTracker::default();
		let t = thread("t-order");

		assert_eq!(tracker.get_states_as_string(&t), "");

		tracker.add_state(&t, FlowStateMarker::PreviewInitiated);
		tracker.add_state(&t, FlowStateMarker::BookingAuthorized);
		tracker.add_state(&t, FlowStateMarker::PreviewInitiated);

		assert_eq!(
			tracker.get_states_as_string(&t),
			"BOOKING_PREVIEW_INITIATED BOOKING_AUTHORIZED BOOKING_PREVIEW_INITIATED"
		);
		assert_eq!(tracker.get_states(&t).len(), 3);
	}

	#[test]
	fn clear_empties_thread_log_but_not_message_log() {
		let tracker = FlowStateTracker::default();
		let t = thread("t-clear");

		tracker.add_state(&t, FlowStateMarker::PreviewInitiated);
		tracker.add_state(&t, FlowStateMarker::BookingCompleted);
		tracker.clear_state(&t);

		assert!(tracker.get_states(&t).is_empty());
		assert!(!tracker.contains(&t, FlowStateMarker::PreviewInitiated));
		assert_eq!(tracker.message_states(&t).len(), 2);

		tracker.clear_message_states(&t);

		assert!(tracker.message_states(&t).is_empty());
	}

	#[test]
	fn threads_are_isolated() {
		let tracker = FlowStateTracker::default();
		let a = thread("t-a");
		let b = thread("t-b");

		tracker.add_state(&a, FlowStateMarker::PreviewInitiated);

		assert!(tracker.contains(&a, FlowStateMarker::PreviewInitiated));
		assert!(!tracker.contains(&b, FlowStateMarker::PreviewInitiated));
		assert!(tracker.get_states(&b).is_empty());

		tracker.clear_state(&b);

		assert_eq!(tracker.get_states(&a), vec![FlowStateMarker::PreviewInitiated]);
	}

	#[test]
	fn markers_serialize_with_planner_names() {
		let log = FlowStateLog(vec![
			FlowStateMarker::PreviewInitiated,
			FlowStateMarker::BookingInitiated,
		]);

		assert_eq!(
			serde_json::to_string(&log).expect("Log should serialize."),
			"[\"BOOKING_PREVIEW_INITIATED\",\"BOOKING_INITIATED\"]"
		);
	}
}
