//! The branching conversation tree.
//!
//! A conversation is a chain of [`Message`]s. Each message holds one or
//! more sibling [`Branch`]es, alternative contents at the same position
//! such as a regenerated assistant reply or an edited user turn, and an
//! index selecting the active one. A branch exclusively owns the message
//! that followed it, so the conversation forms a tree (never a graph
//! with merges) and switching branches swaps the entire continuation.

use serde_json::{Map, Value};
use weft_protocol::Role;

/// One piece of content within a branch.
#[derive(Clone, Debug, PartialEq)]
pub enum Part {
    /// Plain text.
    Text {
        /// The text content.
        content: String,
    },
    /// A tool invocation requested by the assistant.
    ToolCall {
        /// Name of the invoked tool.
        tool_name: String,
        /// Arguments passed to the tool.
        parameters: Map<String, Value>,
        /// Server-side correlation id for the call, if any.
        tool_call_id: Option<String>,
    },
    /// The result of a tool invocation.
    ToolCallResponse {
        /// Raw result payload.
        data: String,
        /// Correlation id of the call this result answers, if any.
        tool_call_id: Option<String>,
    },
}

impl Part {
    /// Creates a text part.
    #[inline]
    pub fn text<S: Into<String>>(content: S) -> Self {
        Part::Text {
            content: content.into(),
        }
    }
}

/// One concrete version at a message position.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    /// The checkpoint id the server assigned to this turn, or `""`
    /// while the turn is still in flight and unconfirmed. Once patched
    /// to a real id it is permanent.
    pub id: String,
    /// Who authored this branch.
    pub role: Role,
    /// Ordered content of this branch.
    pub parts: Vec<Part>,
    /// The message that followed this branch, if any. Exclusively owned
    /// by this branch.
    pub next: Option<Box<Message>>,
}

impl Branch {
    /// Creates a committed branch with the given parts.
    pub fn new<S: Into<String>>(id: S, role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: id.into(),
            role,
            parts,
            next: None,
        }
    }

    /// Creates an in-flight branch with a placeholder id and no parts.
    pub fn provisional(role: Role) -> Self {
        Self::new("", role, Vec::new())
    }

    /// Returns whether this branch has not been committed yet.
    #[inline]
    pub fn is_provisional(&self) -> bool {
        self.id.is_empty()
    }

    /// Appends a text delta, merging it into a trailing text part when
    /// there is one.
    pub fn append_text(&mut self, delta: &str) {
        if let Some(Part::Text { content }) = self.parts.last_mut() {
            content.push_str(delta);
        } else {
            self.parts.push(Part::text(delta));
        }
    }
}

/// A position in the conversation together with its sibling branches.
///
/// Invariants: the branch sequence is never empty, sibling order is
/// creation order (only ever appended to), and the active index is
/// always within bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    branches: Vec<Branch>,
    active: usize,
}

impl Message {
    /// Creates a message with a single branch.
    pub fn new(branch: Branch) -> Self {
        Self {
            branches: vec![branch],
            active: 0,
        }
    }

    pub(crate) fn from_branches(branches: Vec<Branch>) -> Self {
        assert!(!branches.is_empty(), "a message must have at least one branch");
        Self {
            branches,
            active: 0,
        }
    }

    /// Returns all sibling branches in creation order.
    #[inline]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Returns the index of the active branch.
    #[inline]
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Returns the active branch.
    #[inline]
    pub fn current_branch(&self) -> &Branch {
        &self.branches[self.active]
    }

    /// Returns the active branch mutably.
    #[inline]
    pub fn current_branch_mut(&mut self) -> &mut Branch {
        &mut self.branches[self.active]
    }

    /// Returns the identifier of this message, which is the id of its
    /// active branch.
    #[inline]
    pub fn id(&self) -> &str {
        &self.current_branch().id
    }

    /// Returns the visible text of this message: the content of the
    /// last text part of the active branch, or `""` when there is none.
    pub fn current_text(&self) -> &str {
        self.current_branch()
            .parts
            .iter()
            .rev()
            .find_map(|part| match part {
                Part::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    /// Appends a sibling branch and makes it active.
    pub fn push_branch(&mut self, branch: Branch) {
        self.branches.push(branch);
        self.active = self.branches.len() - 1;
    }

    /// Switches the active branch.
    ///
    /// Panics when `index` is out of range; callers passing an invalid
    /// index have broken the contract with the tree.
    pub fn set_active(&mut self, index: usize) {
        assert!(
            index < self.branches.len(),
            "branch index {index} out of range ({} branches)",
            self.branches.len()
        );
        self.active = index;
    }

    /// Activates the branch path leading to `target_id`, scanning
    /// siblings depth first in creation order.
    ///
    /// Returns `true` when the target was found; active indices along
    /// the winning path are updated, everything else is left untouched.
    /// When the target exists under more than one sibling's subtree the
    /// first sibling in iteration order wins; this is defined behavior,
    /// relied upon not to happen for globally unique checkpoint ids.
    pub fn select_path_to(&mut self, target_id: &str) -> bool {
        for index in 0..self.branches.len() {
            if self.branches[index].id == target_id {
                self.active = index;
                return true;
            }
            if let Some(next) = self.branches[index].next.as_deref_mut() {
                if next.select_path_to(target_id) {
                    self.active = index;
                    return true;
                }
            }
        }
        false
    }

    /// Returns the tail of this subtree: the message reached by walking
    /// forward through active branches until one has no continuation.
    pub fn tail(&self) -> &Message {
        let mut node = self;
        while let Some(next) = node.current_branch().next.as_deref() {
            node = next;
        }
        node
    }

    /// Returns the tail of this subtree mutably.
    pub fn tail_mut(&mut self) -> &mut Message {
        let mut node = self;
        while node.current_branch().next.is_some() {
            let active = node.active;
            node = node.branches[active]
                .next
                .as_deref_mut()
                .expect("internal state is inconsistent");
        }
        node
    }
}
