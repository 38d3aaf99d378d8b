//! Shared helpers for the gitdeck integration tests.
//!
//! Every test gets its own workspace directory and its own config directory, so settings
//! written by one test are never seen by another.

pub mod assertions;
pub mod repository;
