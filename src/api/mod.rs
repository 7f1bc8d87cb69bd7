//! Remote feed store: domain types, wire types and the HTTP client.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::{FeedApi, HttpApi};
