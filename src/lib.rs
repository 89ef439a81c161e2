//! Purpose: Shared library crate used by the `kvit` CLI, the `kvitd` daemon, and tests.
//! Exports: `api` (public surface), `core` (addressing, values, stores), `config`, `paths`, `serve`.
//! Role: Keeps the list-emulation scheme independent of any transport.
//! Invariants: Core modules take their store and paths as explicit inputs; no hidden globals.
pub mod api;
pub mod config;
pub mod core;
pub mod paths;
pub mod serve;
