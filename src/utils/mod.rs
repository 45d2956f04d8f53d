//! Utility modules shared across the session.

pub mod exec;
pub mod hash;
pub mod mime;
pub mod path;
