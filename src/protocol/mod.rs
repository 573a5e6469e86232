//! Wire protocol for the voice channel.

pub mod messages;

pub use messages::{Capabilities, ClientMessage, ServerEvent};
