use std::error::Error;
use std::pin::Pin;
use std::task::{self, Poll};

use crate::error::ErrorKind;
use crate::event::AgentEvent;
use crate::thread::{CreateThreadResponse, ThreadInfo, ThreadItem, TurnRequest};

/// The error type for a transport implementation.
pub trait TransportError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A live stream of events for one agent turn.
///
/// Events must be delivered in emission order; consumers apply each one
/// before pulling the next.
pub trait TurnStream: Sized + Send + 'static {
    /// The error type that may be returned by the stream.
    type Error: TransportError;

    /// Attempts to pull out the next event from the stream.
    ///
    /// # Return value
    ///
    /// - `Poll::Pending` means the stream is still waiting for the next
    ///   event. Implementations will ensure that the current task is
    ///   notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` delivers an event; subsequent
    ///   calls may produce further events.
    /// - `Poll::Ready(Ok(None))` means the turn has completed normally.
    /// - `Poll::Ready(Err(error))` means the stream terminated with an
    ///   error. Events delivered before the error remain valid; there is
    ///   no rollback.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<AgentEvent>, Self::Error>>;
}

/// A type that can start agent turns and stream their events back.
///
/// Once the transport is created, it should behave like a stateless
/// object. It can still have internal state, but callers should not
/// rely on it, and the transport should be prepared for being dropped
/// anytime.
pub trait AgentTransport: Send + Sync {
    /// The error type that may be returned by the transport.
    type Error: TransportError;

    /// The stream type produced for each turn.
    type Stream: TurnStream<Error = Self::Error>;

    /// Starts a turn and resolves to its event stream.
    fn run_turn(
        &self,
        req: &TurnRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static;
}

/// Request/response access to the server's thread log.
///
/// A server may host several named agents; threads are scoped to the
/// selected one, so switching agents changes what the thread operations
/// see.
pub trait ThreadService: Send + Sync {
    /// The error type that may be returned by the service.
    type Error: TransportError;

    /// Lists the names of the agents available on the server.
    fn list_agents(&self) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;

    /// Returns the name of the currently selected agent, if any.
    fn selected_agent(&self) -> Option<String>;

    /// Selects the agent subsequent operations run against. `None`
    /// falls back to the server's default agent.
    fn select_agent(&mut self, agent: Option<&str>);

    /// Lists the threads of the current user, newest first.
    fn list_threads(
        &self,
    ) -> impl Future<Output = Result<Vec<ThreadInfo>, Self::Error>> + Send;

    /// Creates a new thread with the given title.
    fn create_thread(
        &self,
        title: &str,
    ) -> impl Future<Output = Result<CreateThreadResponse, Self::Error>> + Send;

    /// Deletes a thread.
    fn delete_thread(
        &self,
        thread_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Updates a thread's display title.
    fn rename_thread(
        &self,
        thread_id: &str,
        title: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Fetches the full checkpointed log of a thread.
    fn thread_items(
        &self,
        thread_id: &str,
    ) -> impl Future<Output = Result<Vec<ThreadItem>, Self::Error>> + Send;
}
