use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single event pushed by the server while an agent turn is running.
///
/// Events are delivered as an ordered sequence over one logical channel
/// per turn, terminated by stream completion or an error. Note that the
/// sequence is ordered by *emission*, not by commitment: optimistic
/// [`AssistantPartialText`](AgentEvent::AssistantPartialText) previews
/// may arrive before the authoritative
/// [`AssistantStart`](AgentEvent::AssistantStart) that commits the turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    /// The checkpoint recorded before the very first turn of a thread.
    IdBeforeInvoke {
        /// The checkpoint id.
        id: String,
    },
    /// The server committed the in-flight user turn under this id.
    UserEventId {
        /// The checkpoint id assigned to the user turn.
        id: String,
    },
    /// An assistant turn has been committed and starts producing
    /// authoritative content.
    AssistantStart {
        /// The checkpoint id assigned to the assistant turn.
        id: String,
    },
    /// One complete piece of assistant content.
    AssistantContent {
        /// The content payload.
        data: ContentData,
    },
    /// The result of a tool invocation, committed as its own turn.
    ToolResult {
        /// The checkpoint id assigned to the tool-result turn.
        id: String,
        /// Correlation id of the tool call this result answers.
        call_id: String,
        /// Raw result payload.
        content: String,
    },
    /// An optimistic text delta for the assistant turn in flight.
    AssistantPartialText {
        /// The text fragment to append.
        text: String,
    },
    /// Any event type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// The payload of an assistant content entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContentData {
    /// A complete text fragment.
    Text {
        /// The text content. Absent in malformed payloads.
        #[serde(default)]
        content: Option<String>,
    },
    /// A tool invocation requested by the assistant.
    ToolCall {
        /// Correlation id for the call.
        #[serde(default)]
        id: Option<String>,
        /// Name of the tool to invoke.
        #[serde(default)]
        name: Option<String>,
        /// Arguments to pass to the tool.
        #[serde(default)]
        args: Option<Map<String, Value>>,
    },
    /// Any content subtype this client does not understand.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_partial_text() {
        let event: AgentEvent =
            serde_json::from_value(json!({ "type": "assistantPartialText", "text": "He" }))
                .unwrap();
        assert_eq!(
            event,
            AgentEvent::AssistantPartialText {
                text: "He".to_owned()
            }
        );
    }

    #[test]
    fn test_decode_tool_call_content() {
        let event: AgentEvent = serde_json::from_value(json!({
            "type": "assistantContent",
            "data": {
                "type": "toolCall",
                "id": "call_123",
                "name": "add_integers",
                "args": { "a": 123, "b": 456 }
            }
        }))
        .unwrap();
        let AgentEvent::AssistantContent {
            data: ContentData::ToolCall { id, name, args },
        } = event
        else {
            panic!("decoded to the wrong variant: {event:?}");
        };
        assert_eq!(id.as_deref(), Some("call_123"));
        assert_eq!(name.as_deref(), Some("add_integers"));
        assert_eq!(args.unwrap().get("a"), Some(&json!(123)));
    }

    #[test]
    fn test_decode_tool_result() {
        let event: AgentEvent = serde_json::from_value(json!({
            "type": "toolResult",
            "id": "r1",
            "callId": "call_123",
            "content": "579"
        }))
        .unwrap();
        assert_eq!(
            event,
            AgentEvent::ToolResult {
                id: "r1".to_owned(),
                call_id: "call_123".to_owned(),
                content: "579".to_owned()
            }
        );
    }

    #[test]
    fn test_unknown_event_type_is_not_an_error() {
        let event: AgentEvent =
            serde_json::from_value(json!({ "type": "somethingNew", "id": "x" })).unwrap();
        assert_eq!(event, AgentEvent::Unknown);

        let data: ContentData =
            serde_json::from_value(json!({ "type": "image", "url": "http://x" })).unwrap();
        assert_eq!(data, ContentData::Unknown);
    }
}
