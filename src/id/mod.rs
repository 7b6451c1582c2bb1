/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Globally unique 64-bit order identifiers.
//!
//! # Layout
//!
//! ```text
//!  63  62                          32 31                            0
//! +---+------------------------------+-------------------------------+
//! | 0 | seconds since epoch (31 bit) |  per-day store counter (32)   |
//! +---+------------------------------+-------------------------------+
//! ```
//!
//! The counter key is scoped to `namespace` and the calendar date
//! (`icr:{namespace}:{yyyy:MM:dd}`), so it restarts every day without any
//! reset logic and the number of counter keys stays bounded.

pub mod generator;

#[cfg(test)]
mod tests;

pub use generator::{
    COUNTER_BITS, DEFAULT_EPOCH_SECONDS, DecodedId, IdError, IdGenerator, MAX_TIMESTAMP,
};
