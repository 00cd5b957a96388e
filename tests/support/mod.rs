//! Shared test tooling (SPEC_FULL.md §6 expansion), generalized from the
//! teacher's `h2_test_support` crate: an in-memory duplex transport plus a
//! frame-builder for scripting a fake peer, both built directly on this
//! crate's own codec instead of a separate test-support crate.

pub mod frames;
pub mod mock_io;
