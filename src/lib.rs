//! # themesched Library
//!
//! Internal library for the themesched binary, a time-of-day theme scheduler.
//!
//! This library exists to enable testing of the scheduling internals and to
//! keep CLI dispatch (main.rs) separate from application logic.
//!
//! ## Architecture
//!
//! - **Schedule**: `schedule` parses raw settings entries into a validated
//!   table; `clock` handles the time-of-day representation.
//! - **Engine**: `engine` resolves which slot is current and which fires
//!   next, and dispatches applies through injected collaborators.
//! - **Collaborators**: `apply` defines the applier, filter, and
//!   notification seams with their default implementations.
//! - **Runtime**: `runloop` drives the engine on a worker thread, `daemon`
//!   wires lock, signals, settings, and loop together.
//! - **Infrastructure**: single-instance locking, signal handling, logging,
//!   CLI subcommands.

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod apply;
pub mod args;
pub mod clock;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod lock;
pub mod runloop;
pub mod schedule;
pub mod signals;

pub use engine::{Collaborators, Engine, SchedulerState};
pub use schedule::{RawThemeEntry, ScheduleError, ScheduleTable, ThemeRecord};
