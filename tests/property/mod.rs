//! Property-based tests for migration guarantees
