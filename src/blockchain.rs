// Thin re-export module: implementation is in `blockchain/core.rs` so the
// ledger (block construction, append path) and chain verification can live
// in separate files.

pub mod core;
pub use self::core::*;
