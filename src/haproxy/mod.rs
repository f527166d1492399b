//! Everything concerning the HAProxy instance this process owns: its
//! in-memory config model, its admin socket, and its subprocess lifecycle.

pub mod admin;
pub mod config_model;
pub mod process;

pub use admin::{AdminClient, ServerStatus};
pub use config_model::{ConfigModel, ServerEntry};
pub use process::HaproxyProcess;
