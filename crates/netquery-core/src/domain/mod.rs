//! Domain entities for netquery.
//!
//! This module contains pure bookkeeping with no infrastructure dependencies.
//! Nothing in here opens a socket or reads a clock: timestamps are passed in
//! by the caller as plain milliseconds, which keeps every state transition
//! reproducible in unit tests.

/// Game mode and mission identifiers, and their short descriptions.
pub mod game;

/// Discovery targets and the registry that owns them.
///
/// See [`target::TargetRegistry`] for the main type.
pub mod target;
