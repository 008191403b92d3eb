pub mod client;
pub mod provider_base;

pub use client::*;
