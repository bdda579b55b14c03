//! Command-line interface for FamDB, exposed as a library so the
//! command drivers can be exercised directly in tests.

pub mod cli;
