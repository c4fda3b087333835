//! Booking input and the downstream meetings API client.

// std
use std::env;
// crates.io
use reqwest::{StatusCode, header::CONTENT_TYPE};
use serde::Deserializer;
use serde_json::Value;
use time::UtcOffset;
// self
use crate::{_prelude::*, auth::Token, gate::GateError, http::ReqwestHttpClient};

const MEETINGS_ENDPOINT: &str = "meetings";
const DEFAULT_FAILURE_DETAIL: &str = "Meeting scheduling failed";

/// Booking fields as supplied by the planner.
///
/// Missing and `null` fields deserialize as empty strings so validation can name the first
/// absent one; `duration` also accepts a JSON number.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetingInput {
	/// Meeting topic.
	#[serde(deserialize_with = "string_or_null")]
	pub topic: String,
	/// Date in `YYYY-MM-DD` form.
	#[serde(deserialize_with = "string_or_null")]
	pub date: String,
	/// Start time in `HH:MM` form.
	#[serde(deserialize_with = "string_or_null")]
	pub start_time: String,
	/// Duration in minutes.
	#[serde(deserialize_with = "string_or_number")]
	pub duration: String,
	/// IANA zone name or offset; defaults to the local zone when empty.
	#[serde(deserialize_with = "string_or_null")]
	pub time_zone: String,
}
impl MeetingInput {
	/// Checks required fields in order and fills in the local time zone when none was given.
	pub fn validate(mut self) -> Result<Self, GateError> {
		for (field, value) in [
			("topic", &self.topic),
			("date", &self.date),
			("startTime", &self.start_time),
			("duration", &self.duration),
		] {
			if value.trim().is_empty() {
				return Err(GateError::MissingField { field });
			}
		}

		if self.time_zone.trim().is_empty() {
			self.time_zone = local_time_zone();
		}

		Ok(self)
	}

	/// Markdown summary for the chat window.
	pub fn summary(&self) -> String {
		format!(
			"Please confirm the booking:\n\n- **Topic:** {}\n- **Date:** {}\n\
			 - **Start time:** {}\n- **Duration:** {} minutes\n- **Time zone:** {}",
			self.topic, self.date, self.start_time, self.duration, self.time_zone
		)
	}
}

/// Result of a booking request that reached the meetings API.
#[derive(Clone, Debug, PartialEq)]
pub enum BookingOutcome {
	/// `201 Created`.
	Created {
		/// Identifier of the new meeting.
		id: Value,
	},
	/// Any other status.
	Rejected {
		/// HTTP status.
		status: u16,
		/// `detail` from the error body, or a generic message.
		detail: String,
	},
}

#[derive(Debug, Deserialize)]
struct CreatedMeeting {
	id: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
	#[serde(default)]
	detail: Option<Value>,
}

/// Posts a booking with the delegated token as bearer credential.
pub(crate) async fn create_meeting(
	http_client: &ReqwestHttpClient,
	endpoint: Url,
	token: &Token,
	meeting: &MeetingInput,
) -> Result<BookingOutcome> {
	let request = http_client
		.post(endpoint)
		.bearer_auth(token.access_token.expose())
		.header(CONTENT_TYPE, "application/json")
		.json(meeting);
	let response = http_client.send(MEETINGS_ENDPOINT, request).await?;

	if response.status == StatusCode::CREATED {
		let created = response.decode::<CreatedMeeting>(MEETINGS_ENDPOINT)?;

		return Ok(BookingOutcome::Created { id: created.id });
	}

	let detail = serde_json::from_slice::<ErrorBody>(&response.body)
		.unwrap_or_default()
		.detail
		.map(|detail| match detail {
			Value::String(text) => text,
			other => other.to_string(),
		})
		.filter(|detail| !detail.is_empty())
		.unwrap_or_else(|| DEFAULT_FAILURE_DETAIL.into());

	Ok(BookingOutcome::Rejected { status: response.status.as_u16(), detail })
}

/// Renders a meeting id without JSON quoting.
pub(crate) fn display_id(id: &Value) -> String {
	match id {
		Value::String(text) => text.clone(),
		other => other.to_string(),
	}
}

/// Local zone: `TZ`, else the local UTC offset, else `UTC`.
pub fn local_time_zone() -> String {
	let configured = env::var("TZ").ok().map(|tz| tz.trim().trim_start_matches(':').to_owned());

	if let Some(zone) = configured.filter(|zone| !zone.is_empty()) {
		return zone;
	}

	match UtcOffset::current_local_offset() {
		Ok(offset) if !offset.is_utc() => format_offset(offset),
		_ => "UTC".into(),
	}
}

fn format_offset(offset: UtcOffset) -> String {
	let (hours, minutes, _) = offset.as_hms();
	let sign = if offset.is_negative() { '-' } else { '+' };

	format!("UTC{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Text(String),
		Number(serde_json::Number),
	}

	Ok(match Option::<Raw>::deserialize(deserializer)? {
		Some(Raw::Text(text)) => text,
		Some(Raw::Number(number)) => number.to_string(),
		None => String::new(),
	})
}
