//! Deterministic decision core of the helpdesk bot.
//!
//! Everything in here is synchronous and side-effect free once the
//! configuration has been loaded: knowledge lookup, intent resolution and the
//! escalation policy are plain functions over immutable configuration and the
//! per-session state passed in by the caller.

pub mod config;
pub mod error;
pub mod escalation;
pub mod intent;
pub mod knowledge;
pub mod session;
pub mod trace;
