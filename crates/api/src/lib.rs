//! Shoplane API library.
//!
//! The REST backend as a library, so the router can be driven by the
//! integration tests and the CLI without a listening socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;
