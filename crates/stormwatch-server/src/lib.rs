//! HTTP API and pipeline orchestration for the stormwatch alerting
//! server.

pub mod api;
pub mod app;
pub mod channels;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod state;
