//! An out-of-the-box client for branching, replayable agent conversations.
//!
//! The crate assembles the conversation-tree core and the HTTP transport
//! into a [`Session`] you can drive directly. You can also swap in your
//! own transport by implementing the protocol traits.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod session;

pub use session::{Error, Session};

/// Re-exports of [`weft_core`] crate.
pub mod core {
    pub use weft_core::*;
}

/// Re-exports of [`weft_client`] crate.
pub mod client {
    pub use weft_client::*;
}

/// Re-exports of [`weft_protocol`] crate.
pub mod protocol {
    pub use weft_protocol::*;
}
