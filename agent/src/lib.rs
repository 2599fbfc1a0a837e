//! Client side of the helpdesk bot.
//!
//! [`pipeline::Pipeline`] runs one request end to end: knowledge lookup,
//! intent resolution, the escalation decision against the session arena,
//! response generation, the conditional action dispatch and finally the
//! trace. Generation, dispatch and trace output sit behind traits so the
//! pipeline can be driven by fakes.

pub mod arena;
pub mod dispatch;
pub mod generator;
pub mod mcp_client;
pub mod pipeline;
pub mod prompt;
pub mod settings;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;
