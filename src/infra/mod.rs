//! Infrastructure adapters: HTTP protocols, local processes and runtime bootstrap.

pub mod browser;
pub mod discovery;
pub mod editor;
pub mod error;
pub mod indieauth;
pub mod micropub;
pub mod telemetry;
