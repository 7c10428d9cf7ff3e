//! Coach API Library Crate
//!
//! This library contains the web service around the training coach:
//! configuration, the Postgres training recorder, outbound WeCom delivery,
//! API handlers, and routing. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod db;
pub mod delivery;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
