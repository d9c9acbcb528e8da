//! Messaging Channel Layer
//!
//! - `traits`: the messaging contract used by the incident core
//! - `slack`: Slack Web API implementation of that contract
//! - `socket`: Slack Socket Mode event source feeding the dispatch loop

pub mod slack;
pub mod socket;
pub mod traits;

pub use slack::{SlackChannel, SlackConfig};
pub use socket::SlackSocket;
pub use traits::{
    ChannelError, ChannelInfo, InboundMessage, MessagingService, PinnedItem, PostedMessage,
    UserProfile,
};
