//! # carelane-id
//!
//! Record numbers and typed row IDs for the carelane hospital backend.
//!
//! ## Design Principles
//!
//! - Record numbers are human-readable, year-scoped, and system-generated;
//!   row IDs are opaque database surrogates
//! - All numbers have a canonical string representation with strict parsing
//!   for inputs and lenient recovery when deriving the next number in a series
//! - Numbers are typed by kind to prevent mixing entity families
//!
//! ## Number Format
//!
//! All record numbers use the format `{prefix}{year}-{sequence}` where the
//! sequence is zero-padded to six digits:
//!
//! - `MR2024-000001` — patient medical record number
//! - `APT2024-000153` — appointment number
//! - `TXN2024-004021` — billing transaction number
//!
//! Within a (prefix, year) series the sequence is monotonically increasing
//! in issuance order and restarts at 1 each calendar year. Uniqueness is
//! enforced by the storage layer, not by this crate.

mod error;
mod macros;
mod number;
mod types;

pub use error::NumberError;
pub use number::{NumberKind, RecordNumber};
pub use types::*;
