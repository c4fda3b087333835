//! Turn orchestration: binds the user to the thread, consults the planner, and dispatches the
//! planner's tool call through the [`ToolRegistry`].
//!
//! The planner (typically an LLM) is a black box behind [`TurnPlanner`]: given the user's
//! message, the thread's flow-state string, and the available tools, it returns a chat reply and
//! at most one tool call.

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	auth::{ThreadId, UserClaims, UserId},
	gate::{ActionGate, ToolOutput},
	tools::{ToolRegistry, ToolSpec},
};

/// Boxed future returned by [`TurnPlanner::plan`].
pub type PlanFuture<'a> = Pin<Box<dyn Future<Output = Result<Plan, PlannerError>> + 'a + Send>>;

/// Input handed to the planner for one turn.
#[derive(Clone, Copy, Debug)]
pub struct PlanRequest<'a> {
	/// Thread the turn belongs to.
	pub thread: &'a ThreadId,
	/// Raw user message.
	pub message: &'a str,
	/// Space-joined flow markers of the thread.
	pub flow_state: &'a str,
	/// Tools the planner may call.
	pub tools: &'a [ToolSpec],
}

/// Tool invocation chosen by the planner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
	/// Registered tool name.
	pub name: String,
	/// JSON payload for the tool.
	#[serde(default)]
	pub input: Value,
}

/// Planner decision for one turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
	/// Reply used when no tool is called.
	pub chat_response: String,
	/// Optional tool invocation.
	#[serde(default)]
	pub tool_call: Option<ToolCall>,
}
impl Plan {
	/// Plain chat reply.
	pub fn reply(chat_response: impl Into<String>) -> Self {
		Self { chat_response: chat_response.into(), tool_call: None }
	}

	/// Reply that invokes `name` with `input`.
	pub fn call(chat_response: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
		Self {
			chat_response: chat_response.into(),
			tool_call: Some(ToolCall { name: name.into(), input }),
		}
	}
}

/// Failure reported by a planner.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Planner failed: {message}.")]
pub struct PlannerError {
	/// Planner-supplied message.
	pub message: String,
}
impl PlannerError {
	/// Creates an error from any message.
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

/// Decision process that turns a message into a reply and optional tool call.
pub trait TurnPlanner
where
	Self: Send + Sync,
{
	/// Plans the response to one turn.
	fn plan<'a>(&'a self, request: PlanRequest<'a>) -> PlanFuture<'a>;
}

/// One inbound user turn.
#[derive(Clone, Debug)]
pub struct Turn {
	/// Conversation thread.
	pub thread: ThreadId,
	/// End user sending the message.
	pub user: UserId,
	/// Claims to record for the user, typically from their ID token.
	pub claims: Option<UserClaims>,
	/// Message text.
	pub message: String,
}

/// Orchestrates turns against one gate.
pub struct Agent {
	gate: ActionGate,
	registry: ToolRegistry,
	planner: Arc<dyn TurnPlanner>,
}
impl Agent {
	/// Creates an agent exposing the booking tools of `gate`.
	pub fn new(gate: ActionGate, planner: Arc<dyn TurnPlanner>) -> Self {
		let registry = ToolRegistry::with_booking_tools(gate.clone());

		Self { gate, registry, planner }
	}

	/// Gate the agent dispatches to.
	pub fn gate(&self) -> &ActionGate {
		&self.gate
	}

	/// Capability table offered to the planner.
	pub fn registry(&self) -> &ToolRegistry {
		&self.registry
	}

	/// Handles one turn and returns the envelope shown to the frontend.
	pub async fn handle_turn(&self, turn: Turn) -> ToolOutput {
		let broker = self.gate.broker();
		let flow_state = self.gate.flow_state();

		broker.store_user_id_against_thread(&turn.thread, &turn.user);

		if let Some(claims) = turn.claims {
			broker.store_user_claims(&turn.user, claims);
		}

		flow_state.clear_message_states(&turn.thread);

		let states = flow_state.get_states_as_string(&turn.thread);
		let tools = self.registry.specs();
		let request = PlanRequest {
			thread: &turn.thread,
			message: &turn.message,
			flow_state: &states,
			tools: &tools,
		};
		let plan = match self.planner.plan(request).await {
			Ok(plan) => plan,
			Err(e) => return error_output(&e),
		};

		match plan.tool_call {
			Some(call) => self
				.registry
				.invoke(&call.name, &turn.thread, call.input)
				.await
				.unwrap_or_else(|e| error_output(&e)),
			None => ToolOutput::chat(plan.chat_response),
		}
	}
}
impl Debug for Agent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Agent").field("gate", &self.gate).field("registry", &self.registry).finish()
	}
}

fn error_output(error: &dyn Display) -> ToolOutput {
	let message = error.to_string();

	ToolOutput::new(&message, json!({ "error": message, "status": "error" }))
}
