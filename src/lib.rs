//! # miru - website change monitoring engine
//!
//! Periodic execution of administrator-uploaded interpreter scripts, each of
//! which checks one target site and reports what changed since its previous
//! run:
//! - Time-based selection of ready monitors from a shared store
//! - Subprocess execution with a structured stdin/stdout envelope
//! - Per-monitor state threaded forward across invocations
//! - Append-only report persistence
//! - Graceful shutdown across concurrent runners
//!
//! ## Architecture
//!
//! ```text
//!   tick ─▶ ┌─────────────────────────────┐
//!           │          Watcher            │
//!           │  poll ─▶ FIFO ─▶ dispatch   │──▶ tokio task per runner
//!           └─────────────────────────────┘         │
//!                │ ▲                                ▼
//!                ▼ │ reports              ┌──────────────────┐
//!           ┌──────────────┐   stdin ───▶ │  script runner   │
//!           │ MonitorStore │              │ python|ruby|perl │
//!           └──────────────┘   stdout ◀── └──────────────────┘
//! ```
//!
//! The watcher owns the result and error channels; each runner owns its
//! child process and pipes for exactly one invocation.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod monitor;
pub mod report;
pub mod runner;
pub mod store;
pub mod types;
pub mod watcher;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};
