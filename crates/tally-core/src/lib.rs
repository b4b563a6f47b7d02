//! Core types and trait definitions for the Tally survey engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! It owns the survey data model, the validation rules applied before
//! anything is persisted, the status lifecycle, and answer aggregation.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod analytics;
pub mod answer;
pub mod error;
pub mod lifecycle;
pub mod question;
pub mod store;
pub mod submission;
pub mod survey;
pub mod user;

pub use error::{Error, Result};
