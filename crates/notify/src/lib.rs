//! Alert delivery for committee alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable delivery channels
//! - Webhook and SMTP email notifier implementations
//! - Minijinja template rendering for alert messages
//! - Dispatcher that fans an alert out to every configured channel

pub mod dispatcher;
pub mod email;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use templating::AlertMessage;
pub use traits::{AlertNotification, DispatchResult, Notifier, NotifyError};
