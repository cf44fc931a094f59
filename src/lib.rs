//! herald - an in-process publish/subscribe notification core
//!
//! This library provides the fan-out backbone that event-driven features
//! plug into: a strict, caller-awaited [`Publisher`] and a lenient,
//! fire-and-forget [`Dispatcher`], both driven by a type-keyed
//! [`HandlerRegistry`].

pub mod cli;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod publisher;
pub mod registry;

// Re-export core types for convenience
pub use crate::core::{Notification, NotificationHandler, PublishError};
pub use crate::dispatcher::Dispatcher;
pub use crate::publisher::Publisher;
pub use crate::registry::{HandlerRegistry, RegistryBuilder, ResolvedHandler, Scope};
