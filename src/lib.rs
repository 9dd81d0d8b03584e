// src/lib.rs

//! eventfeed library
//!
//! Collects kids' event listings from many sources, deduplicates and
//! validates them, resolves venue place ids and writes a static JSON feed
//! with weekly shards.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
