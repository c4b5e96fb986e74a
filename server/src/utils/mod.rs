//! Utility functions for the application

pub mod api_key;
pub mod crypto;
pub mod file;
pub mod json;
pub mod time;
