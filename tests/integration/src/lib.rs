//! Integration test utilities for the chat client
//!
//! This crate provides a scripted HTTP executor and a paused wall clock for
//! driving the rate limiter end to end, plus a bare HTTP server for the
//! reqwest-backed requester.


pub use fixtures::*;
pub use helpers::*;
