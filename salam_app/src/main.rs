//! Salam application
//!
//! Opens a window, brings Vulkan up against it and keeps the presentation
//! surface alive across background/foreground transitions until the window
//! is closed.

use salam_engine::prelude::*;
use std::process::ExitCode;

const CONFIG_PATH: &str = "salam.toml";

fn run(config: &BootstrapConfig) -> Result<i32, BootstrapError> {
    log::info!(
        "Starting {} ({}x{})",
        config.application.name,
        config.window.width,
        config.window.height
    );
    Bootstrap::new(config)?.run()
}

fn main() -> ExitCode {
    let config = match BootstrapConfig::load_validated(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            log::error!("Couldn't load {CONFIG_PATH}: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.log_level);

    match run(&config) {
        Ok(code) => {
            log::info!("Exiting with code {code}");
            u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
