// Startup configuration and operator control mapping.

pub mod controls;
pub mod error;
pub mod store;
pub mod types;
