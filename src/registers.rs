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

//! MAX6639 register map and protocol constants
//!
//! All register offsets, bit masks and identity values live here. Channel
//! indexed registers take the channel index (0 or 1).

/// Number of temperature/fan channels on the chip
pub const CHANNEL_COUNT: usize = 2;

/// Size of the register file (0x00..=0x3F)
pub const REGISTER_SPACE: usize = 0x40;

/// Bus addressing defaults
pub mod address {
    /// Default I2C bus number
    pub const DEFAULT_BUS: u32 = 1;

    /// Default 7-bit slave address (ADD pin floating)
    pub const DEFAULT: u16 = 0x2f;

    /// Addresses the chip can be strapped to
    pub const CANDIDATES: [u16; 3] = [0x2c, 0x2e, 0x2f];
}

/// Register offsets
pub mod regs {
    pub const STATUS: u8 = 0x02;
    pub const OUTPUT_MASK: u8 = 0x03;
    pub const GCONFIG: u8 = 0x04;
    pub const DEVID: u8 = 0x3D;
    pub const MANUID: u8 = 0x3E;
    pub const DEVREV: u8 = 0x3F;

    pub const fn temp(ch: usize) -> u8 {
        ch as u8
    }

    pub const fn temp_ext(ch: usize) -> u8 {
        0x05 + ch as u8
    }

    pub const fn alert_limit(ch: usize) -> u8 {
        0x08 + ch as u8
    }

    pub const fn ot_limit(ch: usize) -> u8 {
        0x0A + ch as u8
    }

    pub const fn therm_limit(ch: usize) -> u8 {
        0x0C + ch as u8
    }

    pub const fn fan_config1(ch: usize) -> u8 {
        0x10 + ch as u8 * 4
    }

    pub const fn fan_config2a(ch: usize) -> u8 {
        0x11 + ch as u8 * 4
    }

    pub const fn fan_config2b(ch: usize) -> u8 {
        0x12 + ch as u8 * 4
    }

    pub const fn fan_config3(ch: usize) -> u8 {
        0x13 + ch as u8 * 4
    }

    pub const fn fan_cnt(ch: usize) -> u8 {
        0x20 + ch as u8
    }

    pub const fn target_cnt(ch: usize) -> u8 {
        0x22 + ch as u8
    }

    pub const fn fan_ppr(ch: usize) -> u8 {
        0x24 + ch as u8
    }

    pub const fn targtduty(ch: usize) -> u8 {
        0x26 + ch as u8
    }

    pub const fn fan_start_temp(ch: usize) -> u8 {
        0x28 + ch as u8
    }
}

/// Global configuration register bits
pub mod gconfig {
    pub const STANDBY: u8 = 0x80;
    pub const POR: u8 = 0x40;
    pub const DISABLE_TIMEOUT: u8 = 0x20;
    pub const CH2_LOCAL: u8 = 0x10;
    pub const PWM_FREQ_HI: u8 = 0x08;

    /// Value written at the end of initialization to start monitoring
    pub const MONITOR: u8 = DISABLE_TIMEOUT | CH2_LOCAL | PWM_FREQ_HI;
}

/// Fan configuration 1 bits
pub mod fan_config1 {
    /// PWM (duty) control mode
    pub const PWM: u8 = 0x80;
    /// Low bits select the tachometer range
    pub const RANGE_MASK: u8 = 0x03;
}

/// Fan configuration 2a polarity patterns
pub mod fan_config2a {
    pub const POLARITY_LOW: u8 = 0x00;
    pub const POLARITY_HIGH: u8 = 0x02;
}

/// Fan configuration 3 bits
pub mod fan_config3 {
    /// Drive the fan at full speed while THERM is asserted
    pub const THERM_FULL_SPEED: u8 = 0x40;
    /// PWM frequency select; with PWM_FREQ_HI set this is 25kHz
    pub const FREQ_SELECT: u8 = 0x03;
    pub const FREQ_MASK: u8 = 0x03;
}

/// Pulses-per-revolution register layout
pub mod fan_ppr {
    /// (ppr - 1) sits in the top two bits
    pub const SHIFT: u8 = 6;
}

/// Extended temperature register layout
pub mod temp_ext {
    /// Diode fault flag
    pub const FAULT: u8 = 0x01;
    /// Fraction bits (0.125 degC) are bits 7..5
    pub const FRACTION_SHIFT: u8 = 5;
}

/// Identity values read back from DEVID / MANUID
pub mod identity {
    pub const DEVICE_ID: u8 = 0x58;
    pub const MANUFACTURER_ID: u8 = 0x4D;
}

/// Tachometer full-scale ranges in RPM, indexed by the FAN_CONFIG1 range field
pub const RPM_RANGES: [u32; 4] = [2000, 4000, 8000, 16000];

/// Range index used when a requested full-scale value is not in RPM_RANGES
pub const DEFAULT_RPM_RANGE_INDEX: u8 = 1;

/// Fans emit two tach pulses per revolution unless configured otherwise
pub const DEFAULT_PPR: u8 = 2;
pub const MIN_PPR: u8 = 1;
pub const MAX_PPR: u8 = 4;

/// The chip divides each PWM period into 120 time slots
pub const MAX_DUTY: u8 = 120;

/// Upper bound of the external duty/PWM domain
pub const MAX_PWM: u8 = 255;

/// Raw tach count the chip reports for a stalled or missing fan
pub const TACH_STALLED: u8 = 0xFF;

/// Time the chip needs after a power-on-reset before register access is reliable
pub const RESET_SETTLE_MS: u32 = 1000;
