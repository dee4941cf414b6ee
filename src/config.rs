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

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bus::is_valid_address;
use crate::data::{ChannelSettings, DeviceConfig, RpmRange};
use crate::error::{Max6639Error, Result};
use crate::registers::{address, CHANNEL_COUNT, DEFAULT_PPR, MAX_DUTY, RPM_RANGES};

/// Per-channel section of the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SavedChannel {
    /// THERM limit, degC
    pub temp_max_c: u8,
    /// ALERT limit, degC
    pub temp_crit_c: u8,
    /// OT limit, degC
    pub temp_emergency_c: u8,
    /// Target duty at startup, 0-120
    pub duty: u8,
}

impl Default for SavedChannel {
    fn default() -> Self {
        let d = ChannelSettings::default();
        Self {
            temp_max_c: d.therm_limit,
            temp_crit_c: d.alert_limit,
            temp_emergency_c: d.ot_limit,
            duty: d.target_duty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SavedConfig {
    pub bus: u32,
    pub address: u16,
    /// Take the address even when a kernel driver owns it
    pub force: bool,
    pub ppr: u8,
    /// Tach full scale in RPM: 2000, 4000, 8000 or 16000
    pub rpm_range: u32,
    pub pwm_polarity_high: bool,
    pub channels: [SavedChannel; CHANNEL_COUNT],
}

impl Default for SavedConfig {
    fn default() -> Self {
        Self {
            bus: address::DEFAULT_BUS,
            address: address::DEFAULT,
            force: false,
            ppr: DEFAULT_PPR,
            rpm_range: RpmRange::default().full_scale(),
            pwm_polarity_high: true,
            channels: [SavedChannel::default(); CHANNEL_COUNT],
        }
    }
}

impl SavedConfig {
    /// Chip settings for `Max6639::init`
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            ppr: self.ppr,
            rpm_range: RpmRange::from_full_scale(self.rpm_range),
            pwm_polarity_high: self.pwm_polarity_high,
            channels: self.channels.map(|c| ChannelSettings {
                therm_limit: c.temp_max_c,
                alert_limit: c.temp_crit_c,
                ot_limit: c.temp_emergency_c,
                target_duty: c.duty,
            }),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("max6639").join("config.json");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join("max6639")
            .join("config.json");
    }
    PathBuf::from("/etc/max6639/config.json")
}

/// Load and validate the config at `path`, or at `config_path()` when none is
/// given. A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<SavedConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let data = match fs::read_to_string(&path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(SavedConfig::default());
        }
        Err(source) => return Err(Max6639Error::FileRead { path, source }),
    };
    let cfg: SavedConfig = serde_json::from_str(&data)?;
    validate_saved_config(&cfg)?;
    debug!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

pub fn save_config(path: &Path, cfg: &SavedConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn validate_saved_config(cfg: &SavedConfig) -> Result<()> {
    if !is_valid_address(cfg.address) {
        return Err(Max6639Error::invalid_config(
            "address",
            format!("0x{:02x} is outside 0x03-0x77", cfg.address),
        ));
    }

    for (i, ch) in cfg.channels.iter().enumerate() {
        if ch.duty > MAX_DUTY {
            return Err(Max6639Error::invalid_config(
                format!("channels[{}].duty", i),
                format!("{} exceeds {}", ch.duty, MAX_DUTY),
            ));
        }
        if !(ch.temp_max_c <= ch.temp_crit_c && ch.temp_crit_c <= ch.temp_emergency_c) {
            warn!(
                channel = i,
                max = ch.temp_max_c,
                crit = ch.temp_crit_c,
                emergency = ch.temp_emergency_c,
                "Temperature limits are not ascending"
            );
        }
    }

    // Normalized by the driver, not rejected
    if !RPM_RANGES.contains(&cfg.rpm_range) {
        warn!(rpm_range = cfg.rpm_range, "Unknown RPM range, 4000 will be used");
    }
    Ok(())
}
