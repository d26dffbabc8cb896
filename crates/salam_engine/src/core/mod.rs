//! Core configuration types shared by every bootstrap stage

pub mod config;

pub use config::{ApplicationConfig, BootstrapConfig, WindowConfig};
