//! Tracing subscriber built from the notification channels.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use qualgate_rs::core::config::NotificationConfig;

/// Install the console and file layers. `--verbose` lowers the console
/// level to debug.
pub fn init(notifications: &NotificationConfig, verbose: bool) {
    let console_level = if verbose {
        Level::DEBUG
    } else {
        notifications.console.level.as_tracing_level()
    };

    let console = notifications.console.enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::from_level(console_level))
    });

    let file = if notifications.file.enabled {
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&notifications.file.path)
        {
            Ok(handle) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(handle))
                    .with_filter(LevelFilter::from_level(
                        notifications.file.level.as_tracing_level(),
                    )),
            ),
            Err(err) => {
                eprintln!(
                    "Failed to open notification log {}: {}",
                    notifications.file.path.display(),
                    err
                );
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry().with(console).with(file).init();
}
