//! Push notification fan-out for activities.
//!
//! Formatting is a pure lookup on `ActivityType`; delivery goes through a
//! `PushTransport` so the dispatcher can be exercised without a push service.

pub mod dispatch;
pub mod format;
pub mod transport;

pub use dispatch::{FanoutReport, PushDispatcher};
pub use format::{NotificationContent, PushData, PushPayload, activity_url, format_for_activity};
pub use transport::{DeliveryError, PushTransport, RelayPushTransport, Subscription};
