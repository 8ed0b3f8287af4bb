//! Resource clients and the per-endpoint client cache

pub mod cache;
pub mod client;
pub mod factory;

pub use cache::*;
pub use client::*;
pub use factory::*;
