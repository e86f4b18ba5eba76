//! Coiny Fees Server
//!
//! Fetches fee estimates from two providers, blends them with [`coiny_fees`],
//! caches the result and publishes a summary when fees move.

pub mod api;
pub mod cli;
pub mod config;
pub mod persistence;
pub mod price;
pub mod publisher;
pub mod server;
pub mod service;
pub mod sources;
