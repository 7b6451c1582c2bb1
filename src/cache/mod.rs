/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Cache-aside reads over the shared store.
//!
//! Entries live under `prefix + id` and come in three shapes:
//!
//! - a JSON document with a store TTL (physical expiry),
//! - a [`LogicalEntry`] wrapping the document with its own expiry timestamp
//!   and no store TTL (hot keys that must never miss),
//! - an empty string with a short TTL, caching "not found" so repeated misses
//!   do not reach the system of record.
//!
//! Stampede protection comes in two flavors. [`CacheClient::query_with_mutex`]
//! lets one caller rebuild while the rest wait and retry.
//! [`CacheClient::query_with_logical_expiry`] never blocks: an expired entry
//! is served stale while a single background task refreshes it.

pub mod client;
pub mod entry;

#[cfg(test)]
mod tests;

pub use client::{CacheClient, CacheConfig, CacheError, LoaderError};
pub use entry::LogicalEntry;
