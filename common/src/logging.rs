use std::time::Instant;

use anyhow::Context;
use log::LevelFilter;

/// Installs a stderr logger. Stdout is left free for generated code.
pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    let start = Instant::now();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}ms][{}][{}] {}",
                start.elapsed().as_millis(),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("a logger is already installed")
}
