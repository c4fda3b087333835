//! Capability table mapping tool names to input schemas and handlers.
//!
//! The planner picks a tool by name and supplies a JSON payload; the registry decodes the
//! payload into the tool's input type before the handler runs, so a malformed call is rejected
//! with the JSON path of the first mismatch instead of reaching the gate.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	auth::ThreadId,
	gate::{ActionGate, MeetingInput, ToolOutput},
};

/// Name of the booking preview tool.
pub const PREVIEW_TOOL: &str = "ScheduleMeetingPreviewTool";
/// Name of the booking commit tool.
pub const SCHEDULE_TOOL: &str = "ScheduleMeetingTool";

/// Boxed future returned by tool handlers.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolOutput> + 'a + Send>>;

/// Description advertised to the planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
	/// Unique tool name.
	pub name: String,
	/// What the tool does.
	pub description: String,
	/// JSON Schema for the tool input.
	pub input_schema: Value,
}

/// A callable capability with a typed input.
pub trait Tool
where
	Self: 'static + Send + Sync,
{
	/// Input the payload must decode into.
	type Input: 'static + Send + DeserializeOwned;

	/// Name, description, and schema.
	fn spec(&self) -> ToolSpec;

	/// Runs the tool for `thread`.
	fn call<'a>(&'a self, thread: &'a ThreadId, input: Self::Input) -> ToolFuture<'a>;
}

/// Errors raised before a handler runs.
#[derive(Debug, ThisError)]
pub enum ToolError {
	/// No tool is registered under the name.
	#[error("Unknown tool `{name}`.")]
	UnknownTool {
		/// Requested name.
		name: String,
	},
	/// The payload does not match the tool's input type.
	#[error("Invalid input for `{tool}` at `{path}`: {message}.")]
	InvalidInput {
		/// Tool name.
		tool: String,
		/// JSON path of the first mismatch.
		path: String,
		/// Decoder message.
		message: String,
	},
}

trait ErasedTool
where
	Self: Send + Sync,
{
	fn spec(&self) -> &ToolSpec;

	fn invoke<'a>(
		&'a self,
		thread: &'a ThreadId,
		payload: Value,
	) -> Result<ToolFuture<'a>, ToolError>;
}

struct Registered<T>
where
	T: Tool,
{
	spec: ToolSpec,
	tool: T,
}
impl<T> ErasedTool for Registered<T>
where
	T: Tool,
{
	fn spec(&self) -> &ToolSpec {
		&self.spec
	}

	fn invoke<'a>(
		&'a self,
		thread: &'a ThreadId,
		payload: Value,
	) -> Result<ToolFuture<'a>, ToolError> {
		let input = serde_path_to_error::deserialize::<_, T::Input>(payload).map_err(|e| {
			ToolError::InvalidInput {
				tool: self.spec.name.clone(),
				path: e.path().to_string(),
				message: e.inner().to_string(),
			}
		})?;

		Ok(self.tool.call(thread, input))
	}
}

/// Registered tools keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
	tools: HashMap<String, Box<dyn ErasedTool>>,
}
impl ToolRegistry {
	/// Registry exposing the booking preview and commit tools of `gate`.
	pub fn with_booking_tools(gate: ActionGate) -> Self {
		let mut registry = Self::default();

		registry.register(PreviewTool(gate.clone()));
		registry.register(ScheduleTool(gate));

		registry
	}

	/// Adds or replaces a tool under its spec name.
	pub fn register<T>(&mut self, tool: T)
	where
		T: Tool,
	{
		let spec = tool.spec();

		self.tools.insert(spec.name.clone(), Box::new(Registered { spec, tool }));
	}

	/// Specs of every registered tool, sorted by name.
	pub fn specs(&self) -> Vec<ToolSpec> {
		let mut specs = self.tools.values().map(|tool| tool.spec().clone()).collect::<Vec<_>>();

		specs.sort_by(|a, b| a.name.cmp(&b.name));

		specs
	}

	/// Number of registered tools.
	pub fn len(&self) -> usize {
		self.tools.len()
	}

	/// Returns true when no tools are registered.
	pub fn is_empty(&self) -> bool {
		self.tools.is_empty()
	}

	/// Decodes `payload` for the named tool and runs it.
	pub async fn invoke(
		&self,
		name: &str,
		thread: &ThreadId,
		payload: Value,
	) -> Result<ToolOutput, ToolError> {
		let tool =
			self.tools.get(name).ok_or_else(|| ToolError::UnknownTool { name: name.to_owned() })?;

		Ok(tool.invoke(thread, payload)?.await)
	}
}
impl Debug for ToolRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let tools = self.tools.keys().collect::<Vec<_>>();

		f.debug_struct("ToolRegistry").field("tools", &tools).finish()
	}
}

/// Booking preview backed by [`ActionGate::preview`].
#[derive(Clone, Debug)]
pub struct PreviewTool(pub ActionGate);
impl Tool for PreviewTool {
	type Input = MeetingInput;

	fn spec(&self) -> ToolSpec {
		ToolSpec {
			name: PREVIEW_TOOL.into(),
			description: "Get meeting scheduling preview.".into(),
			input_schema: meeting_schema(),
		}
	}

	fn call<'a>(&'a self, thread: &'a ThreadId, input: Self::Input) -> ToolFuture<'a> {
		Box::pin(self.0.preview(thread, input))
	}
}

/// Booking commit backed by [`ActionGate::commit`].
#[derive(Clone, Debug)]
pub struct ScheduleTool(pub ActionGate);
impl Tool for ScheduleTool {
	type Input = MeetingInput;

	fn spec(&self) -> ToolSpec {
		ToolSpec {
			name: SCHEDULE_TOOL.into(),
			description: "Schedule a meeting for specified date, time and duration.".into(),
			input_schema: meeting_schema(),
		}
	}

	fn call<'a>(&'a self, thread: &'a ThreadId, input: Self::Input) -> ToolFuture<'a> {
		Box::pin(self.0.commit(thread, input))
	}
}

fn meeting_schema() -> Value {
	json!({
		"type": "object",
		"properties": {
			"topic": { "type": "string", "description": "Topic of the meeting" },
			"date": { "type": "string", "description": "Date of the meeting in YYYY-MM-DD format" },
			"startTime": {
				"type": "string",
				"description": "Start time of the meeting in HH:MM format"
			},
			"duration": {
				"type": ["string", "integer"],
				"description": "Duration of the meeting in minutes"
			},
			"timeZone": {
				"type": "string",
				"description": "Time zone for the booking; the local zone when empty"
			},
		},
		"required": ["topic", "date", "startTime", "duration"],
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct Echo;
	impl Tool for Echo {
		type Input = MeetingInput;

		fn spec(&self) -> ToolSpec {
			ToolSpec { name: "Echo".into(), description: "Echo.".into(), input_schema: json!({}) }
		}

		fn call<'a>(&'a self, _: &'a ThreadId, input: Self::Input) -> ToolFuture<'a> {
			Box::pin(async move { ToolOutput::chat(input.topic) })
		}
	}

	fn registry() -> ToolRegistry {
		let mut registry = ToolRegistry::default();

		registry.register(Echo);

		registry
	}

	#[tokio::test]
	async fn decodes_payload_before_calling_handler() {
		let thread = ThreadId::new("t-1").expect("Thread fixture should be valid.");
		let output = registry()
			.invoke("Echo", &thread, json!({ "topic": "Sync" }))
			.await
			.expect("Valid payload should run.");

		assert_eq!(output.chat_response(), "Sync");
	}

	#[tokio::test]
	async fn rejects_unknown_tools_and_bad_payloads() {
		let thread = ThreadId::new("t-1").expect("Thread fixture should be valid.");
		let registry = registry();

		assert!(matches!(
			registry.invoke("Missing", &thread, json!({})).await,
			Err(ToolError::UnknownTool { .. })
		));

		match registry.invoke("Echo", &thread, json!({ "topic": ["not", "text"] })).await {
			Err(ToolError::InvalidInput { tool, path, .. }) => {
				assert_eq!(tool, "Echo");
				assert_eq!(path, "topic");
			},
			other => panic!("Unexpected invoke result: {other:?}"),
		}
	}

	#[test]
	fn schema_lists_required_fields() {
		let schema = meeting_schema();

		assert_eq!(schema["required"], json!(["topic", "date", "startTime", "duration"]));
		assert_eq!(registry().specs()[0].name, "Echo");
	}
}
