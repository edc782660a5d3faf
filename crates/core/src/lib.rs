//! Core conversation state: the branching message tree, its
//! reconstruction from the server's flat thread log, and the reducer
//! that applies live streaming events to it.
//!
//! Nothing in this crate performs I/O. The converter runs once when a
//! thread's history is fetched, and the reducer advances the resulting
//! tree in memory as events arrive; both treat structural violations as
//! defects and fail fast.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod chat;
mod convert;
mod reducer;
mod store;
pub mod tree;

pub use chat::Chat;
pub use convert::{ConvertError, ConvertedThread, convert_thread_items};
pub use store::ChatStore;
