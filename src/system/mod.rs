//! # System Interaction Layer
//!
//! Process-level concerns around the interpreter.
//!
//! ## Modules
//!
//! - **`supervisor`**: The reload loop. Normalizes the startup arguments, starts
//!   fresh interpreter runs on reload and persists the final working directory.
//! - **`memtrace`**: Optional resident-memory sampling around runs, switched on
//!   once per process by `=m`.

pub mod memtrace;
pub mod supervisor;
