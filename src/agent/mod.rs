//! Agent module - the bounded reasoning loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and user prompt
//! 2. Call the model with the agent's tools offered (never forced)
//! 3. Execute requested tool calls, structured or inline, and feed results back
//! 4. Repeat until the model answers in plain text or the step budget runs out
//!
//! Every run is reported as a stream of [`AgentEvent`]s ending with `done`.

mod agent_loop;
mod events;
mod inline;
mod prompt;

pub use agent_loop::{AgentRuntime, TaskOutcome, TaskRequest, NO_RESPONSE_PLACEHOLDER};
pub use events::{AgentEvent, FinalPayload, DONE_SENTINEL};
pub use inline::{parse_inline_tool_call, InlineToolCall};
pub use prompt::{build_system_prompt, build_user_message, parse_tool_names};
