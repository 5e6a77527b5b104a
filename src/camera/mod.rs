// Camera domain: pipeline description, device backends, and the fallback chain.

pub mod backend;
pub mod chain;
pub mod error;
pub mod gst;
pub mod mock;
pub mod pipeline;
pub mod synthetic;
pub mod types;
