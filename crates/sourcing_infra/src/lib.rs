#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod config;
pub mod fx;
pub mod notify;
pub mod store;

pub use bootstrap::{DeskRuntime, open_desk};
pub use config::DeskSettings;
