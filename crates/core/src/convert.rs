//! Reconstruction of the conversation tree from a thread's flat log.
//!
//! The server stores a thread as checkpointed items in arrival order.
//! Items sharing a `previous_checkpoint_id` are sibling branches at one
//! conversation position, so the log describes a tree even though it is
//! delivered flat and unsorted by tree position.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use weft_protocol::{ContentData, ThreadItem, ThreadItemContent};

use crate::tree::{Branch, Message, Part};

/// A successfully reconstructed thread.
#[derive(Clone, Debug)]
pub struct ConvertedThread {
    /// The first message of the conversation, with the branch path
    /// toward the most recently committed item pre-selected.
    pub root: Message,
    /// The checkpoint that logically precedes the very first turn.
    pub root_checkpoint_id: String,
}

/// Error returned when a thread log cannot be reconstructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConvertError {
    /// No parent checkpoint qualifies as the root: every
    /// `previous_checkpoint_id` also appears as some item's own
    /// checkpoint, which means the input is malformed or cyclic.
    NoRoot,
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::NoRoot => {
                write!(f, "thread log has no root checkpoint")
            }
        }
    }
}

impl Error for ConvertError {}

/// Converts the flat item log of one thread into a conversation tree.
///
/// Returns `Ok(None)` for an empty log. A log with items but no
/// identifiable root is a contract breach on the server side and
/// reported as [`ConvertError::NoRoot`].
pub fn convert_thread_items(
    items: &[ThreadItem],
) -> Result<Option<ConvertedThread>, ConvertError> {
    if items.is_empty() {
        return Ok(None);
    }

    // Group items by their parent checkpoint. Each group is the sibling
    // set of one message; arrival order within a group fixes branch
    // order.
    let mut groups: HashMap<&str, Vec<&ThreadItem>> = HashMap::new();
    let mut group_order: Vec<&str> = Vec::new();
    for item in items {
        let key = item.previous_checkpoint_id.as_str();
        let group = groups.entry(key).or_default();
        if group.is_empty() {
            group_order.push(key);
        }
        group.push(item);
    }

    // The root group is keyed by the one parent id that never appears
    // as an item's own checkpoint.
    let checkpoint_ids: HashSet<&str> =
        items.iter().map(|item| item.checkpoint_id.as_str()).collect();
    let root_key = group_order
        .iter()
        .copied()
        .find(|key| !checkpoint_ids.contains(key))
        .ok_or(ConvertError::NoRoot)?;

    let mut root = build_message(root_key, &mut groups);

    // Make the most recently committed item visible by default.
    let last_checkpoint = items[items.len() - 1].checkpoint_id.as_str();
    if !root.select_path_to(last_checkpoint) {
        warn!("latest checkpoint {last_checkpoint} is not reachable from the root");
    }

    Ok(Some(ConvertedThread {
        root,
        root_checkpoint_id: root_key.to_owned(),
    }))
}

/// Builds the message for one sibling group, recursively attaching the
/// continuation of every branch whose checkpoint has followers.
fn build_message(key: &str, groups: &mut HashMap<&str, Vec<&ThreadItem>>) -> Message {
    let items = groups
        .remove(key)
        .expect("internal state is inconsistent");
    let mut branches = Vec::with_capacity(items.len());
    for item in items {
        let mut branch = Branch::new(
            item.checkpoint_id.as_str(),
            item.role,
            convert_parts(&item.content),
        );
        if groups.contains_key(item.checkpoint_id.as_str()) {
            branch.next = Some(Box::new(build_message(&item.checkpoint_id, groups)));
        }
        branches.push(branch);
    }
    Message::from_branches(branches)
}

fn convert_parts(entries: &[ThreadItemContent]) -> Vec<Part> {
    let mut parts = Vec::new();
    for entry in entries {
        match entry {
            ThreadItemContent::UserEvent { content } => {
                if let Some(content) = content {
                    parts.push(Part::text(content.clone()));
                }
            }
            ThreadItemContent::AssistantContent { data } => match data {
                Some(ContentData::Text {
                    content: Some(content),
                }) => {
                    parts.push(Part::text(content.clone()));
                }
                Some(ContentData::ToolCall { id, name, args }) => {
                    parts.push(Part::ToolCall {
                        tool_name: name.clone().unwrap_or_default(),
                        parameters: args.clone().unwrap_or_default(),
                        tool_call_id: id.clone(),
                    });
                }
                Some(ContentData::Unknown) => {
                    warn!("skipping assistant content with unknown subtype");
                }
                Some(ContentData::Text { content: None }) | None => {}
            },
            ThreadItemContent::ToolResult { content, call_id } => {
                parts.push(Part::ToolCallResponse {
                    data: content.clone().unwrap_or_default(),
                    tool_call_id: call_id.clone(),
                });
            }
            ThreadItemContent::Unknown => {
                warn!("skipping thread item content with unknown type");
            }
        }
    }
    parts
}
