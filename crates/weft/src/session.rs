use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::poll_fn;
use std::pin::pin;

use weft_core::{Chat, ChatStore, ConvertError, convert_thread_items};
use weft_core::tree::{Branch, Part};
use weft_protocol::{
    AgentTransport, Role, ThreadService, TransportError, TurnRequest, TurnStream,
};

/// The title a chat carries until its first message names it.
const DEFAULT_TITLE: &str = "New chat";

/// How many characters of the first message become the title.
const MAX_AUTO_TITLE_LEN: usize = 20;

/// Error type for [`Session`].
#[derive(Debug)]
pub enum Error {
    /// The chat has no server thread to run turns against.
    NoThread,
    /// A turn is already streaming into the chat.
    TurnInProgress,
    /// The fetched thread history could not be converted into a tree.
    Convert(ConvertError),
    /// The transport failed.
    Transport(Box<dyn TransportError>),
}

impl Error {
    fn transport<E: TransportError>(err: E) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoThread => write!(f, "the chat has no server thread"),
            Self::TurnInProgress => write!(f, "a turn is already in progress"),
            Self::Convert(err) => write!(f, "converting thread history: {err}"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Convert(err) => Some(err),
            Self::Transport(err) => Some(err.as_ref() as &(dyn StdError + 'static)),
            _ => None,
        }
    }
}

/// A chat session, like a window that lists conversations and streams
/// agent replies into the selected one.
///
/// The session owns the [`ChatStore`] and a transport, and exposes the
/// operations a front end needs: loading and managing chats, sending
/// messages, regenerating or editing past messages, and switching
/// between sibling branches. Turns are driven to completion inside the
/// operation that started them; events mutate the tree as they arrive.
pub struct Session<T> {
    transport: T,
    store: ChatStore,
}

impl<T> Session<T> {
    /// Creates a session over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            store: ChatStore::new(),
        }
    }

    /// Returns the chat store.
    #[inline]
    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Returns the chat store mutably, for hosts that manage chat
    /// state themselves.
    #[inline]
    pub fn store_mut(&mut self) -> &mut ChatStore {
        &mut self.store
    }

    /// Switches the active branch of a message in the given chat.
    ///
    /// Panics when the chat id is unknown, or when the message id does
    /// not resolve within it.
    pub fn switch_branch(&mut self, chat_id: &str, message_id: &str, index: usize) {
        let chat = self
            .store
            .get_mut(chat_id)
            .unwrap_or_else(|| panic!("chat {chat_id} is not in the store"));
        chat.switch_branch(message_id, index);
    }
}

impl<T> Session<T>
where
    T: AgentTransport + ThreadService,
{
    /// Fetches the thread list and rebuilds the store from it, newest
    /// first, selecting the first chat. When the server has no threads
    /// yet, one is created so the session always has a place to type
    /// into. The selected chat's history is fetched right away.
    pub async fn load_chats(&mut self) -> Result<(), Error> {
        let threads = ThreadService::list_threads(&self.transport)
            .await
            .map_err(Error::transport)?;
        let chats = threads.iter().map(Chat::for_thread).collect();
        self.store.replace_all(chats);

        if self.store.is_empty() {
            self.create_chat(None).await?;
        }
        self.ensure_content().await
    }

    /// Selects a chat, fetching its history when it has not been loaded
    /// yet.
    pub async fn select_chat(&mut self, chat_id: &str) -> Result<(), Error> {
        self.store.set_current(chat_id);
        self.ensure_content().await
    }

    /// Fetches the list of agents the server can run turns with.
    ///
    /// When no agent is selected yet, the first available one becomes
    /// the selection; the chat list is left alone.
    pub async fn load_agents(&mut self) -> Result<Vec<String>, Error> {
        let agents = ThreadService::list_agents(&self.transport)
            .await
            .map_err(Error::transport)?;
        if self.transport.selected_agent().is_none() {
            if let Some(first) = agents.first() {
                self.transport.select_agent(Some(first.as_str()));
            }
        }
        Ok(agents)
    }

    /// Switches the server-side agent. Threads are scoped per agent, so
    /// a change reloads the chat list; selecting the already-selected
    /// agent does nothing.
    pub async fn select_agent(&mut self, agent: Option<&str>) -> Result<(), Error> {
        if self.transport.selected_agent().as_deref() == agent {
            return Ok(());
        }
        self.transport.select_agent(agent);
        self.load_chats().await
    }

    /// Fetches and attaches the selected chat's history if it has not
    /// been loaded yet.
    pub async fn ensure_content(&mut self) -> Result<(), Error> {
        let (chat_id, thread_id) = match self.store.current_chat() {
            Some(chat) if !chat.is_content_loaded() => {
                (chat.id().to_owned(), chat.thread_id().map(str::to_owned))
            }
            _ => return Ok(()),
        };

        let converted = match thread_id {
            Some(thread_id) => {
                let items = ThreadService::thread_items(&self.transport, &thread_id)
                    .await
                    .map_err(Error::transport)?;
                convert_thread_items(&items).map_err(Error::Convert)?
            }
            None => None,
        };

        if let Some(chat) = self.store.get_mut(&chat_id) {
            chat.attach_history(converted);
        }
        Ok(())
    }

    /// Creates a chat and selects it.
    ///
    /// When the newest chat is still empty it is reused instead of
    /// piling up blank threads on the server.
    pub async fn create_chat(&mut self, title: Option<&str>) -> Result<(), Error> {
        let reusable_id = self
            .store
            .iter()
            .next()
            .filter(|first| first.is_empty() && first.is_content_loaded())
            .map(|first| first.id().to_owned());
        if let Some(id) = reusable_id {
            self.store.set_current(&id);
            return Ok(());
        }

        let title = title.unwrap_or(DEFAULT_TITLE);
        let created = ThreadService::create_thread(&self.transport, title)
            .await
            .map_err(Error::transport)?;
        debug!("created thread {}", created.thread_id);

        let mut chat =
            Chat::new(created.thread_id.clone(), title).with_thread(created.thread_id.clone());
        // A fresh thread has no history to fetch.
        chat.attach_history(None);
        self.store.push_front(chat);
        self.store.set_current(&created.thread_id);
        Ok(())
    }

    /// Deletes a chat on the server and drops it from the store.
    pub async fn delete_chat(&mut self, chat_id: &str) -> Result<(), Error> {
        if let Some(thread_id) = self.store.get(chat_id).and_then(Chat::thread_id) {
            let thread_id = thread_id.to_owned();
            ThreadService::delete_thread(&self.transport, &thread_id)
                .await
                .map_err(Error::transport)?;
        }
        self.store.remove(chat_id);
        Ok(())
    }

    /// Renames a chat on the server and in the store.
    pub async fn rename_chat(&mut self, chat_id: &str, title: &str) -> Result<(), Error> {
        if let Some(thread_id) = self.store.get(chat_id).and_then(Chat::thread_id) {
            let thread_id = thread_id.to_owned();
            ThreadService::rename_thread(&self.transport, &thread_id, title)
                .await
                .map_err(Error::transport)?;
        }
        if let Some(chat) = self.store.get_mut(chat_id) {
            chat.set_title(title);
        }
        Ok(())
    }

    /// Sends a user message in the selected chat and drives the
    /// resulting turn to completion.
    ///
    /// The message shows up in the tree immediately as a provisional
    /// branch; the stream later reconciles it with its server-assigned
    /// checkpoint id. The first message of a chat also becomes its
    /// title.
    pub async fn send_message(&mut self, text: &str) -> Result<(), Error> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let chat = self.store.current_chat().ok_or(Error::NoThread)?;
        let thread_id = chat.thread_id().ok_or(Error::NoThread)?.to_owned();
        if chat.is_generating() {
            return Err(Error::TurnInProgress);
        }
        let needs_title = chat.is_empty();

        // Resolved before the provisional branch lands, so the turn
        // resumes from the last committed message.
        let checkpoint_id = chat
            .tail()
            .map(|tail| tail.id().to_owned())
            .or_else(|| chat.root_checkpoint_id().map(str::to_owned));

        if needs_title {
            let title = auto_title(text);
            // Best effort: the local title sticks even when the server
            // rename fails.
            if let Err(err) = ThreadService::rename_thread(&self.transport, &thread_id, &title).await
            {
                warn!("failed to auto-title thread {thread_id}: {err}");
            }
            if let Some(chat) = self.store.current_chat_mut() {
                chat.set_title(title);
            }
        }

        let chat = self
            .store
            .current_chat_mut()
            .expect("internal state is inconsistent");
        let mut branch = Branch::provisional(Role::User);
        branch.parts.push(Part::text(text));
        chat.push_message(branch);

        let req = TurnRequest {
            thread_id,
            user_message: Some(text.to_owned()),
            checkpoint_id,
        };
        self.drive_turn(req).await
    }

    /// Regenerates the assistant message identified by `message_id`:
    /// the previous reply stays reachable as a sibling branch.
    pub async fn replay(&mut self, message_id: &str) -> Result<(), Error> {
        let chat = self.store.current_chat_mut().ok_or(Error::NoThread)?;
        let thread_id = chat.thread_id().ok_or(Error::NoThread)?.to_owned();
        if chat.is_generating() {
            return Err(Error::TurnInProgress);
        }

        let checkpoint = chat.stage_replay(message_id);
        let req = TurnRequest {
            thread_id,
            user_message: None,
            checkpoint_id: Some(checkpoint),
        };
        self.drive_turn(req).await
    }

    /// Replaces the user message identified by `message_id` with an
    /// edited version on a new branch and reruns the turn from there.
    pub async fn edit_message(&mut self, message_id: &str, text: &str) -> Result<(), Error> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let chat = self.store.current_chat_mut().ok_or(Error::NoThread)?;
        let thread_id = chat.thread_id().ok_or(Error::NoThread)?.to_owned();
        if chat.is_generating() {
            return Err(Error::TurnInProgress);
        }

        let checkpoint = chat.stage_edit(message_id, text);
        let req = TurnRequest {
            thread_id,
            user_message: Some(text.to_owned()),
            checkpoint_id: Some(checkpoint),
        };
        self.drive_turn(req).await
    }

    /// Runs one turn against the transport, applying events to the
    /// selected chat as they arrive.
    async fn drive_turn(&mut self, req: TurnRequest) -> Result<(), Error> {
        let turn_fut = self.transport.run_turn(&req);

        let chat = self
            .store
            .current_chat_mut()
            .expect("internal state is inconsistent");
        chat.begin_turn();
        // The guard clears the generating flag on every exit path,
        // including the caller dropping us mid-stream. Whatever the
        // turn managed to produce stays in the tree.
        let mut guard = TurnGuard { chat };

        let stream = turn_fut.await.map_err(Error::transport)?;
        let mut stream = pin!(stream);
        loop {
            match poll_fn(|cx| stream.as_mut().poll_next_event(cx)).await {
                Ok(Some(event)) => guard.chat.apply_event(event),
                Ok(None) => return Ok(()),
                Err(err) => return Err(Error::transport(err)),
            }
        }
    }
}

struct TurnGuard<'a> {
    chat: &'a mut Chat,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.chat.finish_turn();
    }
}

fn auto_title(text: &str) -> String {
    let mut title: String = text.chars().take(MAX_AUTO_TITLE_LEN).collect();
    if text.chars().count() > MAX_AUTO_TITLE_LEN {
        title.push_str("...");
    }
    title
}
