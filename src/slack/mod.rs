//! Slack messaging and inbound events.
//!
//! The rest of the crate talks to Slack only through [`MessagingGateway`].
//! Two implementations exist: [`SlackGateway`] calls the Web API with the
//! retry policy in [`retry`], and [`MockGateway`] only logs. Which one is used
//! is decided once, when the application state is built. Inbound Events API
//! callbacks are decoded in [`events`].

pub mod error;
pub mod events;
pub mod gateway;
pub mod messages;
pub mod retry;

pub use error::{SlackError, SlackResponse, SlackResult};
pub use events::{handle_event, EventOutcome, EventPayload};
pub use gateway::{build_gateway, MessagingGateway, MockGateway, SlackGateway};
pub use messages::{NotificationContext, SlackMessageContent};
pub use retry::RetryPolicy;
