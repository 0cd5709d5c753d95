//! CampusChain - an append-only, hash-linked ledger for campus issue lifecycle events
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Block structure, the `Ledger`, and chain verification
//! - [`events`] - Typed issue lifecycle payloads
//!
//! ## Cryptography
//! - [`crypto`] - Block digest (SHA-256 over a length-prefixed encoding)
//!
//! ## State Management
//! - [`persistence`] - Storage adapters (JSON file, SQLite, in-memory)
//!
//! ## Integration
//! - `api` - REST API (feature `api`)
//! - `node` - Service bootstrap (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`cli`] - Setup shared by the binaries

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod events;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "api")]
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
