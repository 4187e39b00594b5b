// crates/mirrordb-config/src/lib.rs
// ============================================================================
// Module: mirrordb Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for mirrordb.toml semantics.
// Dependencies: mirrordb-core, mirrordb-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `mirrordb-config` defines the configuration model for a mirrordb
//! database: file locations, `SQLite` settings, memory-designated tables,
//! script limits, and pipeline sizing. Validation is strict and fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
