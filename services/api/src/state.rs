//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the coach engine,
//! the knowledge base it reads from and the optional outbound delivery
//! channel shared by every handler.

use crate::delivery::Notifier;
use coach_core::{Coach, knowledge::KnowledgeBase};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coach: Arc<Coach>,
    /// The same knowledge base the coach was built with.
    pub knowledge: Arc<KnowledgeBase>,
    /// WeCom robot; `None` when no webhook is configured.
    pub notifier: Option<Arc<dyn Notifier>>,
}
