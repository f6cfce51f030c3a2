//! Property-based tests for template processing.
//!
//! These tests use proptest to generate random templates and verify that
//! invariants hold for all of them.
