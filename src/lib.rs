//! pgmon Gateway Library
//!
//! This library provides the query gateway and schema provisioning
//! logic for the pgmon PostgreSQL metrics/logs store.

pub mod api;
pub mod config;
pub mod error;
pub mod params;
pub mod pool;
pub mod provision;
pub mod query;
