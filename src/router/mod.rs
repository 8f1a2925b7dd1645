pub mod engine;
pub mod event;
pub mod message;
pub mod subscriber;
pub mod topic;

pub use engine::Router;
pub use event::{DropReason, RouterEvent};
pub use message::{Message, MessageKind};
pub use subscriber::{Subscriber, SubscriberHandle};
