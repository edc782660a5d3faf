//! A single conversation and its mutation surface.

use weft_protocol::{Role, ThreadInfo};

use crate::convert::ConvertedThread;
use crate::tree::{Branch, Message, Part};

/// One conversation: its identity, server thread handle, and the owned
/// message tree.
///
/// A chat starts empty; its tree is attached once when the thread's
/// history is fetched and advanced in memory afterwards. The tail (the
/// message reached by walking active branches from the root) is always
/// derived by that walk, never cached, so switching branches cannot
/// leave a stale pointer behind.
#[derive(Clone, Debug)]
pub struct Chat {
    id: String,
    title: String,
    thread_id: Option<String>,
    root_checkpoint_id: Option<String>,
    root: Option<Message>,
    content_loaded: bool,
    generating: bool,
}

impl Chat {
    /// Creates an empty chat with no server thread attached.
    pub fn new<I: Into<String>, T: Into<String>>(id: I, title: T) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            thread_id: None,
            root_checkpoint_id: None,
            root: None,
            content_loaded: false,
            generating: false,
        }
    }

    /// Attaches a server thread handle.
    pub fn with_thread<S: Into<String>>(mut self, thread_id: S) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Creates an empty chat backed by a server thread, with the thread
    /// handle doubling as the chat id.
    pub fn for_thread(info: &ThreadInfo) -> Self {
        Chat::new(info.thread_id.clone(), info.title.clone()).with_thread(info.thread_id.clone())
    }

    /// Returns the chat id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display title.
    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sets the display title.
    #[inline]
    pub fn set_title<S: Into<String>>(&mut self, title: S) {
        self.title = title.into();
    }

    /// Returns the server thread handle, if any.
    #[inline]
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Returns the checkpoint that logically precedes the first turn.
    #[inline]
    pub fn root_checkpoint_id(&self) -> Option<&str> {
        self.root_checkpoint_id.as_deref()
    }

    pub(crate) fn set_root_checkpoint_id(&mut self, id: String) {
        self.root_checkpoint_id = Some(id);
    }

    /// Returns whether this chat has no messages yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns whether the thread history has been fetched and attached.
    #[inline]
    pub fn is_content_loaded(&self) -> bool {
        self.content_loaded
    }

    /// Returns whether a turn is currently streaming into this chat.
    #[inline]
    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Marks the start of a turn.
    #[inline]
    pub fn begin_turn(&mut self) {
        self.generating = true;
    }

    /// Marks the end of a turn, whether it completed, failed, or was
    /// cancelled. The tree keeps whatever the turn managed to produce.
    #[inline]
    pub fn finish_turn(&mut self) {
        self.generating = false;
    }

    /// Attaches the fetched thread history. An empty history still
    /// marks the content as loaded.
    pub fn attach_history(&mut self, converted: Option<ConvertedThread>) {
        if let Some(converted) = converted {
            self.root = Some(converted.root);
            self.root_checkpoint_id = Some(converted.root_checkpoint_id);
        }
        self.content_loaded = true;
    }

    /// Returns the root message, if any.
    #[inline]
    pub fn root_message(&self) -> Option<&Message> {
        self.root.as_ref()
    }

    /// Returns the tail message: the end of the active path.
    #[inline]
    pub fn tail(&self) -> Option<&Message> {
        self.root.as_ref().map(Message::tail)
    }

    pub(crate) fn tail_mut(&mut self) -> Option<&mut Message> {
        self.root.as_mut().map(Message::tail_mut)
    }

    /// Returns the messages along the active path, root first.
    pub fn visible_messages(&self) -> Vec<&Message> {
        let mut result = Vec::new();
        let mut node = self.root.as_ref();
        while let Some(message) = node {
            result.push(message);
            node = message.current_branch().next.as_deref();
        }
        result
    }

    fn find_message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        let mut node = self.root.as_mut();
        while let Some(message) = node {
            if message.id() == message_id {
                return Some(message);
            }
            node = message.current_branch_mut().next.as_deref_mut();
        }
        None
    }

    /// Appends a new message holding `branch` at the tail of the active
    /// path, or makes it the root of an empty chat.
    pub fn push_message(&mut self, branch: Branch) {
        let message = Message::new(branch);
        match self.tail_mut() {
            Some(tail) => tail.current_branch_mut().next = Some(Box::new(message)),
            None => self.root = Some(message),
        }
    }

    /// Appends a sibling branch to the message identified by
    /// `message_id` on the active path and makes it active.
    ///
    /// Panics when the id does not resolve; that is a contract breach
    /// by the caller, not a user-facing condition.
    pub fn push_sibling(&mut self, message_id: &str, branch: Branch) {
        let chat_id = self.id.clone();
        let message = self
            .find_message_mut(message_id)
            .unwrap_or_else(|| {
                panic!("message {message_id} is not on the active path of chat {chat_id}")
            });
        message.push_branch(branch);
    }

    /// Switches the active branch of the message identified by
    /// `message_id`. The tail is implicitly recomputed since it is
    /// derived from active indices.
    ///
    /// Panics when the message id does not resolve or the index is out
    /// of range.
    pub fn switch_branch(&mut self, message_id: &str, index: usize) {
        let chat_id = self.id.clone();
        let message = self
            .find_message_mut(message_id)
            .unwrap_or_else(|| {
                panic!("message {message_id} is not on the active path of chat {chat_id}")
            });
        message.set_active(index);
    }

    /// Resolves the checkpoint to resume from when branching at the
    /// message identified by `message_id`.
    ///
    /// For the root message this is the chat's root checkpoint; for any
    /// other message on the active path it is the id of the branch
    /// whose continuation the message is. `None` means the id is not
    /// reachable along the active path, which callers must treat as a
    /// structural violation.
    pub fn resume_checkpoint_for(&self, message_id: &str) -> Option<&str> {
        let root = self.root.as_ref()?;
        if root.id() == message_id {
            return self.root_checkpoint_id.as_deref();
        }
        let mut message = root;
        loop {
            let branch = message.current_branch();
            let next = branch.next.as_deref()?;
            if next.id() == message_id {
                return Some(&branch.id);
            }
            message = next;
        }
    }

    /// Stages a regeneration of the assistant message identified by
    /// `message_id`: appends a provisional assistant sibling, makes it
    /// active, and returns the checkpoint to resume the turn from. The
    /// previous reply stays reachable by switching branches.
    pub fn stage_replay(&mut self, message_id: &str) -> String {
        let checkpoint = self.resume_point(message_id);
        self.push_sibling(message_id, Branch::provisional(Role::Assistant));
        checkpoint
    }

    /// Stages an edit of the user message identified by `message_id`:
    /// appends a provisional user sibling carrying the edited text,
    /// makes it active, and returns the checkpoint to resume from.
    pub fn stage_edit(&mut self, message_id: &str, text: &str) -> String {
        let checkpoint = self.resume_point(message_id);
        let mut branch = Branch::provisional(Role::User);
        branch.parts.push(Part::text(text));
        self.push_sibling(message_id, branch);
        checkpoint
    }

    fn resume_point(&self, message_id: &str) -> String {
        self.resume_checkpoint_for(message_id)
            .unwrap_or_else(|| {
                panic!("message {message_id} does not resolve to a checkpoint in chat {}", self.id)
            })
            .to_owned()
    }
}
