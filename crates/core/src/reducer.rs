//! The live-event reducer: one server event in, one tree mutation out.
//!
//! Events arrive in emission order, not commitment order. Optimistic
//! `assistantPartialText` previews accumulate in a provisional branch
//! (placeholder id `""`) until an authoritative `assistantStart` or
//! `toolResult` commits the turn; committing patches the id and drops
//! the preview, since the authoritative content arrives separately.

use weft_protocol::{AgentEvent, ContentData, Role};

use crate::chat::Chat;
use crate::tree::{Branch, Part};

impl Chat {
    /// Applies one streaming event to this chat's tree.
    ///
    /// Each event is a discrete state transition, applied synchronously
    /// and in full before the next event is considered. Unrecognized
    /// events are logged and skipped; they never fail the stream.
    pub fn apply_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::IdBeforeInvoke { id } => {
                // Only the very first turn of a thread establishes the
                // root checkpoint.
                if self.root_checkpoint_id().is_none() {
                    self.set_root_checkpoint_id(id);
                }
            }
            AgentEvent::UserEventId { id } => {
                if let Some(tail) = self.tail_mut() {
                    tail.current_branch_mut().id = id;
                }
            }
            AgentEvent::AssistantPartialText { text } => {
                if !self.tail_is_provisional_assistant() {
                    self.push_message(Branch::provisional(Role::Assistant));
                }
                let tail = self.tail_mut().expect("internal state is inconsistent");
                tail.current_branch_mut().append_text(&text);
            }
            AgentEvent::AssistantStart { id } => {
                self.begin_turn();
                self.commit_assistant_turn(id);
            }
            AgentEvent::AssistantContent { data } => match data {
                ContentData::Text { content } => {
                    self.push_part(Part::text(content.unwrap_or_default()));
                }
                ContentData::ToolCall { id, name, args } => {
                    self.push_part(Part::ToolCall {
                        tool_name: name.unwrap_or_default(),
                        parameters: args.unwrap_or_default(),
                        tool_call_id: id,
                    });
                }
                ContentData::Unknown => {
                    warn!("ignoring assistant content with unknown subtype");
                }
            },
            AgentEvent::ToolResult { id, call_id, content } => {
                self.commit_assistant_turn(id);
                self.push_part(Part::ToolCallResponse {
                    data: content,
                    tool_call_id: Some(call_id),
                });
            }
            AgentEvent::Unknown => {
                warn!("ignoring agent event with unrecognized type");
            }
        }
    }

    fn tail_is_provisional_assistant(&self) -> bool {
        self.tail().is_some_and(|tail| {
            let branch = tail.current_branch();
            branch.role == Role::Assistant && branch.is_provisional()
        })
    }

    /// Reconciles the provisional assistant branch at the tail with its
    /// committed id, discarding the optimistic preview parts; when
    /// there is nothing to reconcile, opens a fresh assistant message
    /// instead.
    fn commit_assistant_turn(&mut self, id: String) {
        if self.tail_is_provisional_assistant() {
            let tail = self.tail_mut().expect("internal state is inconsistent");
            let branch = tail.current_branch_mut();
            branch.id = id;
            branch.parts.clear();
        } else {
            self.push_message(Branch::new(id, Role::Assistant, Vec::new()));
        }
    }

    fn push_part(&mut self, part: Part) {
        let Some(tail) = self.tail_mut() else {
            debug!("dropping a content part: chat has no messages yet");
            return;
        };
        tail.current_branch_mut().parts.push(part);
    }
}
