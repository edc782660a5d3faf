//! A local fake transport for testing purpose.
//!
//! Before running turns, you need to set up the turn script, which is
//! the sequence of event streams the transport should produce. Each
//! `run_turn` call consumes the next scripted turn; running out of
//! script is an error. The transport also keeps an in-memory thread
//! table so that the thread CRUD surface can be exercised without a
//! server.
//!
//! # Note
//!
//! This type is not optimized for production use, there are heavy
//! memory copies involved. You should only use it for testing.

mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::time::{Sleep, sleep};
use weft_protocol::{
    AgentEvent, AgentTransport, CreateThreadResponse, ErrorKind, ThreadInfo, ThreadItem,
    ThreadService, TransportError, TurnRequest, TurnStream,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl TransportError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct Inner {
    turns: Mutex<VecDeque<PresetTurn>>,
    threads: Mutex<Vec<ThreadInfo>>,
    items: Mutex<HashMap<String, Vec<ThreadItem>>>,
    requests: Mutex<Vec<TurnRequest>>,
    next_thread_id: Mutex<u32>,
    agents: Mutex<Vec<String>>,
    selected_agent: Mutex<Option<String>>,
}

/// A scripted in-memory transport.
#[derive(Clone, Default)]
pub struct TestTransport {
    inner: Arc<Inner>,
    delay: Option<Duration>,
}

impl TestTransport {
    /// Appends a scripted turn to the script.
    pub fn push_turn(&self, preset: PresetTurn) {
        self.inner.turns.lock().unwrap().push_back(preset);
    }

    /// Makes every stream wait this long before each event.
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Seeds a thread into the in-memory thread table.
    pub fn add_thread(&self, info: ThreadInfo) {
        self.inner.threads.lock().unwrap().push(info);
    }

    /// Seeds the checkpointed log of a thread.
    pub fn set_items(&self, thread_id: impl Into<String>, items: Vec<ThreadItem>) {
        self.inner.items.lock().unwrap().insert(thread_id.into(), items);
    }

    /// Returns every turn request received so far.
    pub fn recorded_requests(&self) -> Vec<TurnRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    /// Seeds the names the agent-list endpoint reports.
    pub fn set_agents(&self, agents: Vec<String>) {
        *self.inner.agents.lock().unwrap() = agents;
    }
}

impl AgentTransport for TestTransport {
    type Error = Error;
    type Stream = TestTurnStream;

    fn run_turn(
        &self,
        req: &TurnRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static {
        self.inner.requests.lock().unwrap().push(req.clone());
        let turn = self.inner.turns.lock().unwrap().pop_front();
        let delay = self.delay;
        ready(match turn {
            Some(preset) => Ok(TestTurnStream {
                events: preset.events.into(),
                error: preset.error,
                delay,
                sleep: None,
                done: false,
            }),
            None => Err(Error::new("no scripted turns left", ErrorKind::Other)),
        })
    }
}

impl ThreadService for TestTransport {
    type Error = Error;

    async fn list_agents(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.agents.lock().unwrap().clone())
    }

    fn selected_agent(&self) -> Option<String> {
        self.inner.selected_agent.lock().unwrap().clone()
    }

    fn select_agent(&mut self, agent: Option<&str>) {
        *self.inner.selected_agent.lock().unwrap() = agent.map(str::to_owned);
    }

    async fn list_threads(&self) -> Result<Vec<ThreadInfo>, Error> {
        Ok(self.inner.threads.lock().unwrap().clone())
    }

    async fn create_thread(&self, title: &str) -> Result<CreateThreadResponse, Error> {
        let thread_id = {
            let mut next = self.inner.next_thread_id.lock().unwrap();
            *next += 1;
            format!("thread-{next}")
        };
        self.inner.threads.lock().unwrap().insert(0, ThreadInfo {
            user_id: "guest".to_owned(),
            thread_id: thread_id.clone(),
            title: title.to_owned(),
        });
        Ok(CreateThreadResponse { thread_id })
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), Error> {
        self.inner
            .threads
            .lock()
            .unwrap()
            .retain(|info| info.thread_id != thread_id);
        self.inner.items.lock().unwrap().remove(thread_id);
        Ok(())
    }

    async fn rename_thread(&self, thread_id: &str, title: &str) -> Result<(), Error> {
        let mut threads = self.inner.threads.lock().unwrap();
        match threads.iter_mut().find(|info| info.thread_id == thread_id) {
            Some(info) => {
                info.title = title.to_owned();
                Ok(())
            }
            None => Err(Error::new(
                format!("thread {thread_id} does not exist"),
                ErrorKind::Fatal,
            )),
        }
    }

    async fn thread_items(&self, thread_id: &str) -> Result<Vec<ThreadItem>, Error> {
        Ok(self
            .inner
            .items
            .lock()
            .unwrap()
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// The stream produced for one scripted turn.
pub struct TestTurnStream {
    events: VecDeque<AgentEvent>,
    error: Option<PresetError>,
    delay: Option<Duration>,
    sleep: Option<Pin<Box<Sleep>>>,
    done: bool,
}

impl TurnStream for TestTurnStream {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<AgentEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if this.done {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        if let Some(delay) = this.delay {
            let sleep_fut = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
            ready!(sleep_fut.as_mut().poll(cx));
            this.sleep = None;
        }

        if let Some(event) = this.events.pop_front() {
            return Poll::Ready(Ok(Some(event)));
        }

        this.done = true;
        match this.error.take() {
            Some(err) => Poll::Ready(Err(Error::new(err.message, err.kind))),
            None => Poll::Ready(Ok(None)),
        }
    }
}
