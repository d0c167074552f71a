//! Feed fan-out and bounded cache-backed pagination engine.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
