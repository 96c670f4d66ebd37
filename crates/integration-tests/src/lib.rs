//! End-to-end tests for Relay; see `tests/`
