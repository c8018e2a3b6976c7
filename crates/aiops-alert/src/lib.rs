//! aiops-alert — operator notifications.
//!
//! `AlertDispatcher` sends every event to each registered channel in
//! turn. A channel that fails or hangs is logged and skipped; it never
//! stops delivery to the others and never reaches the caller.
//!
//! Channels without a configured destination are simply not registered.
//! The chat webhook channel lives here; the SNS channel lives in
//! `aiops-aws` next to the other AWS clients.

pub mod dispatcher;
pub mod slack;

pub use dispatcher::{AlertDispatcher, DispatchReport};
pub use slack::SlackWebhook;
