//! Application services: feed reads, fan-out, follow graph routing and gates.

pub mod error;
pub mod fanout;
pub mod feed;
pub mod friendships;
pub mod gatekeeper;
pub mod jobs;
pub mod pagination;
pub mod repos;
