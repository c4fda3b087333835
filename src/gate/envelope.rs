//! Structured responses returned by gated tools.
//!
//! Only `response.chat_response` is shown to the end user; `tool_response` and
//! `frontend_state` are machine-consumed. Chat text is scrubbed of anything that looks like a
//! URL when the envelope is built, so an authorization URL can only travel in `tool_response`.

// crates.io
use serde_json::{Value, json};
// self
use crate::_prelude::*;

const LINK_PLACEHOLDER: &str = "[link omitted]";

/// UI hint attached to preview responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrontendState {
	/// Show the booking preview with its consent link.
	BookingPreview,
	/// The preview could not be produced.
	BookingPreviewError,
}

/// User-visible text plus the machine-readable payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
	/// Text shown in the chat window.
	pub chat_response: String,
	/// Payload for the frontend; never rendered verbatim.
	pub tool_response: Value,
}

/// Envelope returned by every gated operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
	/// Chat text and payload.
	pub response: ToolResponse,
	/// Optional UI hint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub frontend_state: Option<FrontendState>,
}
impl ToolOutput {
	/// Builds an envelope, scrubbing URLs from the chat text.
	pub fn new(chat_response: impl AsRef<str>, tool_response: Value) -> Self {
		let chat_response = scrub_urls(chat_response.as_ref());

		Self { response: ToolResponse { chat_response, tool_response }, frontend_state: None }
	}

	/// Plain chat reply with an empty payload.
	pub fn chat(chat_response: impl AsRef<str>) -> Self {
		Self::new(chat_response, json!({}))
	}

	/// Attaches a UI hint.
	pub fn with_frontend_state(mut self, state: FrontendState) -> Self {
		self.frontend_state = Some(state);

		self
	}

	/// Preview failure: the message is the chat text and the payload is empty.
	pub fn preview_error(message: impl AsRef<str>) -> Self {
		Self::chat(message).with_frontend_state(FrontendState::BookingPreviewError)
	}

	/// Commit failure caught at the gate boundary.
	pub fn commit_error(message: impl AsRef<str>) -> Self {
		let message = scrub_urls(message.as_ref());

		Self::new(
			format!("An error occurred while scheduling the meeting: {message}"),
			json!({ "error": message, "status": "error" }),
		)
	}

	/// Text shown to the user.
	pub fn chat_response(&self) -> &str {
		&self.response.chat_response
	}

	/// Machine-readable payload.
	pub fn tool_response(&self) -> &Value {
		&self.response.tool_response
	}
}

/// Replaces every whitespace-delimited word containing a URL scheme separator.
pub fn scrub_urls(text: &str) -> String {
	if !text.contains("://") {
		return text.to_owned();
	}

	let mut out = String::with_capacity(text.len());
	let mut word = String::new();

	for ch in text.chars() {
		if ch.is_whitespace() {
			flush_word(&mut out, &mut word);
			out.push(ch);
		} else {
			word.push(ch);
		}
	}

	flush_word(&mut out, &mut word);

	out
}

fn flush_word(out: &mut String, word: &mut String) {
	if word.contains("://") {
		out.push_str(LINK_PLACEHOLDER);
	} else {
		out.push_str(word);
	}

	word.clear();
}
