//! Wire-level contracts between the chat client and an agent-thread server.
//!
//! This crate establishes the protocol the rest of the workspace builds
//! on: the streaming events pushed while a turn is running, the flat
//! checkpointed items returned by a history fetch, and the traits a
//! transport implementation should adhere to.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that transport implementors should adhere to. Unknown
//! event and content subtypes deserialize into explicit `Unknown`
//! variants so that a new server feature never breaks an old client.

#![deny(missing_docs)]

mod error;
mod event;
mod thread;
mod transport;

pub use error::*;
pub use event::*;
pub use thread::*;
pub use transport::*;
