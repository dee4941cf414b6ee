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

//! Register file dump and decoding
//!
//! `REGISTERS` is a declarative table of the named registers; rendering walks
//! it generically instead of having per-register code.

use std::fmt::{self, Write as _};

use crate::data::RpmRange;
use crate::registers::{
    fan_config1, fan_config2a, fan_config3, fan_ppr, gconfig, identity, regs, temp_ext, CHANNEL_COUNT,
    MAX_DUTY, REGISTER_SPACE,
};

/// A named register and how to render its value
#[derive(Clone, Copy)]
pub struct RegisterDescriptor {
    pub name: &'static str,
    pub offset: u8,
    pub decode: fn(u8) -> String,
}

impl fmt::Debug for RegisterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterDescriptor")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .finish()
    }
}

const fn reg(name: &'static str, offset: u8, decode: fn(u8) -> String) -> RegisterDescriptor {
    RegisterDescriptor { name, offset, decode }
}

pub static REGISTERS: &[RegisterDescriptor] = &[
    reg("TEMP1", regs::temp(0), decode_celsius),
    reg("TEMP2", regs::temp(1), decode_celsius),
    reg("STATUS", regs::STATUS, decode_status),
    reg("OUTPUT_MASK", regs::OUTPUT_MASK, decode_hex),
    reg("GCONFIG", regs::GCONFIG, decode_gconfig),
    reg("TEMP_EXT1", regs::temp_ext(0), decode_temp_ext),
    reg("TEMP_EXT2", regs::temp_ext(1), decode_temp_ext),
    reg("ALERT_LIMIT1", regs::alert_limit(0), decode_celsius),
    reg("ALERT_LIMIT2", regs::alert_limit(1), decode_celsius),
    reg("OT_LIMIT1", regs::ot_limit(0), decode_celsius),
    reg("OT_LIMIT2", regs::ot_limit(1), decode_celsius),
    reg("THERM_LIMIT1", regs::therm_limit(0), decode_celsius),
    reg("THERM_LIMIT2", regs::therm_limit(1), decode_celsius),
    reg("FAN1_CONFIG1", regs::fan_config1(0), decode_fan_config1),
    reg("FAN1_CONFIG2A", regs::fan_config2a(0), decode_polarity),
    reg("FAN1_CONFIG2B", regs::fan_config2b(0), decode_hex),
    reg("FAN1_CONFIG3", regs::fan_config3(0), decode_fan_config3),
    reg("FAN2_CONFIG1", regs::fan_config1(1), decode_fan_config1),
    reg("FAN2_CONFIG2A", regs::fan_config2a(1), decode_polarity),
    reg("FAN2_CONFIG2B", regs::fan_config2b(1), decode_hex),
    reg("FAN2_CONFIG3", regs::fan_config3(1), decode_fan_config3),
    reg("FAN1_CNT", regs::fan_cnt(0), decode_tach),
    reg("FAN2_CNT", regs::fan_cnt(1), decode_tach),
    reg("TARGET_CNT1", regs::target_cnt(0), decode_tach),
    reg("TARGET_CNT2", regs::target_cnt(1), decode_tach),
    reg("FAN1_PPR", regs::fan_ppr(0), decode_ppr),
    reg("FAN2_PPR", regs::fan_ppr(1), decode_ppr),
    reg("TARGTDUTY1", regs::targtduty(0), decode_duty),
    reg("TARGTDUTY2", regs::targtduty(1), decode_duty),
    reg("FAN_START_TEMP1", regs::fan_start_temp(0), decode_celsius),
    reg("FAN_START_TEMP2", regs::fan_start_temp(1), decode_celsius),
    reg("DEVID", regs::DEVID, decode_devid),
    reg("MANUID", regs::MANUID, decode_manuid),
    reg("DEVREV", regs::DEVREV, decode_hex),
];

pub fn register_name(offset: u8) -> Option<&'static str> {
    REGISTERS.iter().find(|d| d.offset == offset).map(|d| d.name)
}

fn decode_hex(value: u8) -> String {
    format!("0x{:02x}", value)
}

fn decode_celsius(value: u8) -> String {
    format!("{} degC", value)
}

fn decode_temp_ext(value: u8) -> String {
    let eighths = (value >> temp_ext::FRACTION_SHIFT) as u32 * 125;
    if value & temp_ext::FAULT != 0 {
        format!("+0.{:03} degC, diode fault", eighths)
    } else {
        format!("+0.{:03} degC", eighths)
    }
}

fn decode_status(value: u8) -> String {
    let alarms: Vec<String> = (0..CHANNEL_COUNT as u8)
        .filter(|i| value & (1u8 << *i) != 0)
        .map(|i| format!("ch{}", i))
        .collect();
    if alarms.is_empty() {
        format!("0x{:02x} (no channel alarm)", value)
    } else {
        format!("0x{:02x} (alarm: {})", value, alarms.join(", "))
    }
}

fn decode_gconfig(value: u8) -> String {
    let flags = [
        (gconfig::STANDBY, "standby"),
        (gconfig::POR, "por"),
        (gconfig::DISABLE_TIMEOUT, "no-timeout"),
        (gconfig::CH2_LOCAL, "ch2-local"),
        (gconfig::PWM_FREQ_HI, "pwm-freq-hi"),
    ];
    let set: Vec<&str> = flags.iter().filter(|(bit, _)| value & bit != 0).map(|(_, n)| *n).collect();
    format!("0x{:02x} [{}]", value, set.join(" "))
}

fn decode_fan_config1(value: u8) -> String {
    let mode = if value & fan_config1::PWM != 0 { "pwm" } else { "rpm" };
    let range = RpmRange::from_index(value & fan_config1::RANGE_MASK).unwrap_or_default();
    format!("0x{:02x} ({} mode, {})", value, mode, range)
}

fn decode_polarity(value: u8) -> String {
    let polarity = if value & fan_config2a::POLARITY_HIGH != 0 { "high" } else { "low" };
    format!("0x{:02x} (polarity {})", value, polarity)
}

fn decode_fan_config3(value: u8) -> String {
    let therm = if value & fan_config3::THERM_FULL_SPEED != 0 { ", therm full speed" } else { "" };
    format!("0x{:02x} (freq sel {}{})", value, value & fan_config3::FREQ_MASK, therm)
}

fn decode_tach(value: u8) -> String {
    format!("{} counts", value)
}

fn decode_ppr(value: u8) -> String {
    format!("{} ppr", (value >> fan_ppr::SHIFT) + 1)
}

fn decode_duty(value: u8) -> String {
    format!("{}/{} ({}%)", value, MAX_DUTY, value as u32 * 100 / MAX_DUTY as u32)
}

fn decode_devid(value: u8) -> String {
    let tag = if value == identity::DEVICE_ID { "MAX6639" } else { "unknown" };
    format!("0x{:02x} ({})", value, tag)
}

fn decode_manuid(value: u8) -> String {
    let tag = if value == identity::MANUFACTURER_ID { "Maxim" } else { "unknown" };
    format!("0x{:02x} ({})", value, tag)
}

/// Snapshot of the whole register file; `None` where the read failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDump {
    values: [Option<u8>; REGISTER_SPACE],
}

impl Default for RegisterDump {
    fn default() -> Self {
        Self { values: [None; REGISTER_SPACE] }
    }
}

impl RegisterDump {
    pub fn get(&self, offset: u8) -> Option<u8> {
        self.values.get(offset as usize).copied().flatten()
    }

    pub fn set(&mut self, offset: u8, value: Option<u8>) {
        if let Some(slot) = self.values.get_mut(offset as usize) {
            *slot = value;
        }
    }

    /// Number of registers that could not be read
    pub fn failed_reads(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// i2cdump style 16 column grid
    pub fn hex_grid(&self) -> String {
        let mut out = String::from("    ");
        for col in 0..0x10 {
            let _ = write!(out, " {:2x}", col);
        }
        out.push('\n');
        for (row, chunk) in self.values.chunks(0x10).enumerate() {
            let _ = write!(out, "{:02x}: ", row * 0x10);
            let cells: Vec<String> = chunk
                .iter()
                .map(|v| v.map(|b| format!("{:02x}", b)).unwrap_or_else(|| "--".into()))
                .collect();
            out.push_str(&cells.join(" "));
            out.push('\n');
        }
        out
    }

    /// One line per named register with its decoded meaning
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for desc in REGISTERS {
            let decoded = match self.get(desc.offset) {
                Some(v) => (desc.decode)(v),
                None => "--".to_string(),
            };
            let _ = writeln!(out, "{:<16} 0x{:02x}  {}", desc.name, desc.offset, decoded);
        }
        out
    }
}

impl fmt::Display for RegisterDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex_grid())
    }
}
