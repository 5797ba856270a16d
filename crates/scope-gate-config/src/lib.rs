// crates/scope-gate-config/src/lib.rs
// ============================================================================
// Module: Scope Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for scope-gate.toml semantics.
// Dependencies: scope-gate-core, scope-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `scope-gate-config` defines the configuration model for Scope Gate: the
//! permission map, token gate settings, credential store backend, audit sink,
//! and relation scopes. Validation is strict and fails closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
