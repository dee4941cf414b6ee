/*
 * This file is part of max6639-tools.
 *
 * Copyright (C) 2025 max6639-tools contributors
 *
 * max6639-tools is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * max6639-tools is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with max6639-tools. If not, see <https://www.gnu.org/licenses/>.
 */

use clap::Parser;
use tracing::{debug, warn};

use max6639::cli::{run_cli, Cli};
use max6639::logger;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(&log_level)
        .init();

    if cli.logging {
        match logger::init_logging(None) {
            Ok(path) => debug!(path = %path.display(), "Event logging enabled"),
            Err(e) => warn!("Event logging unavailable: {}", e),
        }
    }

    let result = run_cli(&cli);
    logger::shutdown_logging();
    result
}
