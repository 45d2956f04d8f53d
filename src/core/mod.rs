//! Core session state shared across the codebase.

mod state;

pub use state::{Shutdown, is_shutdown, register_session, setup_shutdown_handler};
