/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Seckill admission.
//!
//! The store mirror of a voucher is a stock counter and a set of buyers. A
//! single atomic script reads both and reserves one unit, so the decision
//! needs one store round-trip and no lock. The system of record is never
//! consulted on this path.
//!
//! | Key | Type | Content |
//! |---|---|---|
//! | `seckill:stock:{voucher_id}` | string | units left |
//! | `seckill:order:{voucher_id}` | set | buyers holding a unit |
//! | `seckill:voucher:{voucher_id}` | hash | `stock`, `begin_time`, `end_time` (epoch ms) |

pub mod admission;
pub mod error;
pub mod service;
pub mod voucher;

#[cfg(test)]
mod tests;

pub use admission::{Admission, AdmissionScript};
pub use error::SeckillError;
pub use service::SeckillService;
pub use voucher::{SeckillVoucher, WindowState};
