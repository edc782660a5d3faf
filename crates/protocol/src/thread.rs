use serde::{Deserialize, Serialize};

use crate::event::ContentData;

/// Who authored a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human user.
    User,
    /// The agent, including tool results it produced.
    Assistant,
}

/// Summary of one server-side thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    /// The owning user.
    pub user_id: String,
    /// The thread handle.
    pub thread_id: String,
    /// Display title.
    pub title: String,
}

/// One checkpointed item of a thread's durable log.
///
/// The set of items for one thread forms a tree under the parent
/// relation `previous_checkpoint_id -> checkpoint_id`; items sharing a
/// parent are sibling branches at the same conversation position. The
/// server returns items in chronological arrival order, which is *not*
/// sorted by tree position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadItem {
    /// The thread this item belongs to.
    pub thread_id: String,
    /// The checkpoint id of this turn.
    pub checkpoint_id: String,
    /// The checkpoint this turn was made from.
    pub previous_checkpoint_id: String,
    /// Who authored the turn.
    #[serde(rename = "type")]
    pub role: Role,
    /// Raw content entries of the turn.
    #[serde(default)]
    pub content: Vec<ThreadItemContent>,
}

/// One raw content entry within a [`ThreadItem`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ThreadItemContent {
    /// A user text input.
    UserEvent {
        /// The text the user sent.
        #[serde(default)]
        content: Option<String>,
    },
    /// A piece of assistant output.
    AssistantContent {
        /// The content payload.
        #[serde(default)]
        data: Option<ContentData>,
    },
    /// The result of a tool invocation.
    ToolResult {
        /// Raw result payload.
        #[serde(default)]
        content: Option<String>,
        /// Correlation id of the tool call this result answers.
        #[serde(default)]
        call_id: Option<String>,
    },
    /// Any entry type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// Parameters for invoking one agent turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// The thread to run the turn on.
    pub thread_id: String,
    /// The user input, if this turn was triggered by one. Replays of an
    /// assistant turn carry no user message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    /// The checkpoint to resume from. Absent for the first turn of a
    /// thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

/// Response to a thread-creation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadResponse {
    /// The handle of the new thread.
    pub thread_id: String,
}

/// Response to an agent-list request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentListResponse {
    /// Names of the agents the server can run turns with.
    pub agents: Vec<String>,
}
