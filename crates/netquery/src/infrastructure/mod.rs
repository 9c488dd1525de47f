//! Infrastructure layer for netquery.
//!
//! Contains OS-facing adapters: the UDP transport and query responder, the
//! clocks, config file storage, and terminal output.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `netquery_core`, but MUST NOT be imported by the `application` layer
//! outside of its tests.

pub mod clock;
pub mod network;
pub mod presentation;
pub mod storage;
