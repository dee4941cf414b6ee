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

//! Device configuration and telemetry snapshot types
//!
//! `DeviceConfig` is what the caller wants written into the chip.
//! `DeviceSnapshot` holds the register-derived values the driver last read or
//! wrote. Both are owned by the caller; the driver only borrows them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::convert;
use crate::error::{Max6639Error, Result};
use crate::registers::{CHANNEL_COUNT, DEFAULT_PPR, DEFAULT_RPM_RANGE_INDEX, MAX_DUTY, RPM_RANGES};

/// One of the two temperature/fan lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    One,
    Two,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel::One, Channel::Two];

    /// Register index of this channel (0 or 1)
    pub const fn index(self) -> usize {
        match self {
            Channel::One => 0,
            Channel::Two => 1,
        }
    }
}

impl TryFrom<usize> for Channel {
    type Error = Max6639Error;

    fn try_from(value: usize) -> Result<Self> {
        match value {
            0 => Ok(Channel::One),
            1 => Ok(Channel::Two),
            n => Err(Max6639Error::invalid_argument(format!(
                "channel {} out of range (0-{})",
                n,
                CHANNEL_COUNT - 1
            ))),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Tachometer full-scale range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpmRange {
    Rpm2000,
    #[default]
    Rpm4000,
    Rpm8000,
    Rpm16000,
}

impl RpmRange {
    pub const ALL: [RpmRange; 4] = [
        RpmRange::Rpm2000,
        RpmRange::Rpm4000,
        RpmRange::Rpm8000,
        RpmRange::Rpm16000,
    ];

    /// Value of the FAN_CONFIG1 range field
    pub const fn index(self) -> u8 {
        match self {
            RpmRange::Rpm2000 => 0,
            RpmRange::Rpm4000 => 1,
            RpmRange::Rpm8000 => 2,
            RpmRange::Rpm16000 => 3,
        }
    }

    pub const fn full_scale(self) -> u32 {
        RPM_RANGES[self.index() as usize]
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Map a full-scale RPM value to its range; unknown values select 4000 RPM
    pub fn from_full_scale(rpm: u32) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.full_scale() == rpm)
            .unwrap_or(Self::ALL[DEFAULT_RPM_RANGE_INDEX as usize])
    }
}

impl fmt::Display for RpmRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} RPM", self.full_scale())
    }
}

/// Per-channel values written during initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// THERM limit in whole degC (hwmon temp_max)
    pub therm_limit: u8,
    /// ALERT limit in whole degC (hwmon temp_crit)
    pub alert_limit: u8,
    /// OT limit in whole degC (hwmon temp_emergency)
    pub ot_limit: u8,
    /// Target duty in 1/120 slots
    pub target_duty: u8,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            therm_limit: 80,
            alert_limit: 90,
            ot_limit: 100,
            target_duty: 30,
        }
    }
}

/// Caller supplied chip configuration, applied once by `Max6639::init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Tach pulses per revolution, 1-4; anything else is treated as 2
    pub ppr: u8,
    pub rpm_range: RpmRange,
    /// PWM output polarity; true drives the output high for "on"
    pub pwm_polarity_high: bool,
    pub channels: [ChannelSettings; CHANNEL_COUNT],
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ppr: DEFAULT_PPR,
            rpm_range: RpmRange::default(),
            pwm_polarity_high: true,
            channels: [ChannelSettings::default(); CHANNEL_COUNT],
        }
    }
}

impl DeviceConfig {
    pub fn channel(&self, ch: Channel) -> &ChannelSettings {
        &self.channels[ch.index()]
    }

    /// Check the values that cannot be normalized by policy
    pub fn validate(&self) -> Result<()> {
        for ch in Channel::ALL {
            let duty = self.channel(ch).target_duty;
            if duty > MAX_DUTY {
                return Err(Max6639Error::invalid_argument(format!(
                    "channel {} target duty {} exceeds {}",
                    ch, duty, MAX_DUTY
                )));
            }
        }
        Ok(())
    }
}

/// Decoded temperature registers of one channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TempReading {
    /// 11-bit composite in 0.125 degC units
    pub raw: u16,
    /// Diode fault reported by the chip
    pub fault: bool,
}

impl TempReading {
    pub fn millidegrees(&self) -> i32 {
        convert::temp_from_reg(self.raw)
    }
}

/// Register values sampled from, or last written to, the chip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    /// Temperature, in 1/8 degC
    pub temp_raw: [u16; CHANNEL_COUNT],
    /// Temperature diode failure
    pub temp_fault: [bool; CHANNEL_COUNT],
    /// Raw tach count
    pub fan_count: [u8; CHANNEL_COUNT],
    /// Channel alarm bits
    pub status: u8,

    // Register values only written to
    /// Duty in 1/120 slots
    pub duty: [u8; CHANNEL_COUNT],
    pub therm_limit: [u8; CHANNEL_COUNT],
    pub alert_limit: [u8; CHANNEL_COUNT],
    pub ot_limit: [u8; CHANNEL_COUNT],

    // Register values initialized only once
    /// Pulses per revolution minus one (0..3)
    pub ppr_reg: u8,
    pub rpm_range: RpmRange,
}

/// Per-channel values in user units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub channel: usize,
    pub temp_millidegrees: i32,
    pub temp_fault: bool,
    pub fan_rpm: u32,
    pub pwm: u8,
    pub alarm: bool,
    pub temp_max: i32,
    pub temp_crit: i32,
    pub temp_emergency: i32,
}

impl DeviceSnapshot {
    pub fn temp_reading(&self, ch: Channel) -> TempReading {
        TempReading {
            raw: self.temp_raw[ch.index()],
            fault: self.temp_fault[ch.index()],
        }
    }

    /// Temperature in milli-degrees Celsius
    pub fn temp_input(&self, ch: Channel) -> i32 {
        convert::temp_from_reg(self.temp_raw[ch.index()])
    }

    pub fn temp_fault(&self, ch: Channel) -> bool {
        self.temp_fault[ch.index()]
    }

    pub fn temp_max(&self, ch: Channel) -> i32 {
        convert::temp_limit_from_reg(self.therm_limit[ch.index()])
    }

    pub fn temp_crit(&self, ch: Channel) -> i32 {
        convert::temp_limit_from_reg(self.alert_limit[ch.index()])
    }

    pub fn temp_emergency(&self, ch: Channel) -> i32 {
        convert::temp_limit_from_reg(self.ot_limit[ch.index()])
    }

    /// Fan speed in RPM, 0 when stalled or not yet measured
    pub fn fan_input(&self, ch: Channel) -> u32 {
        convert::fan_from_reg(self.fan_count[ch.index()], self.rpm_range)
    }

    /// Duty in the 0-255 domain
    pub fn pwm(&self, ch: Channel) -> u8 {
        convert::duty_to_pwm(self.duty[ch.index()])
    }

    pub fn alarm(&self, ch: Channel) -> bool {
        self.status & (1 << ch.index()) != 0
    }

    /// Pulses per revolution currently programmed (1-4)
    pub fn ppr(&self) -> u8 {
        self.ppr_reg + 1
    }

    pub fn report(&self, ch: Channel) -> ChannelReport {
        ChannelReport {
            channel: ch.index(),
            temp_millidegrees: self.temp_input(ch),
            temp_fault: self.temp_fault(ch),
            fan_rpm: self.fan_input(ch),
            pwm: self.pwm(ch),
            alarm: self.alarm(ch),
            temp_max: self.temp_max(ch),
            temp_crit: self.temp_crit(ch),
            temp_emergency: self.temp_emergency(ch),
        }
    }
}
