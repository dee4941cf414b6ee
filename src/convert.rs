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

//! Conversions between physical units and MAX6639 register encodings
//!
//! # Temperature
//!
//! Readings are an 11-bit value in 0.125 degC steps: the TEMP register holds
//! the whole degrees and TEMP_EXT bits 7..5 the fraction. Limits are whole
//! degrees. User facing values are milli-degrees, as in hwmon.
//!
//! # Fan speed
//!
//! The chip reports the tach period, not frequency, so RPM is inversely
//! proportional to the count.
//!
//! # Duty
//!
//! The chip divides a PWM period into 120 slots; callers use 0-255.

use crate::data::{RpmRange, TempReading};
use crate::registers::{temp_ext, DEFAULT_PPR, MAX_DUTY, MAX_PPR, MAX_PWM, MIN_PPR, TACH_STALLED};

/// Restrict `val` to `lo..=hi`, passing in-range values through unchanged
#[inline]
pub fn clamp_val<T: Ord>(val: T, lo: T, hi: T) -> T {
    if val < lo {
        lo
    } else if val > hi {
        hi
    } else {
        val
    }
}

/// Milli-degrees to a limit register value (whole degC, 0-255)
#[inline]
pub fn temp_limit_to_reg(millidegrees: i32) -> u8 {
    clamp_val(millidegrees / 1000, 0, 255) as u8
}

#[inline]
pub fn temp_limit_from_reg(reg: u8) -> i32 {
    reg as i32 * 1000
}

/// Composite reading (1/8 degC) to milli-degrees
#[inline]
pub fn temp_from_reg(raw: u16) -> i32 {
    raw as i32 * 125
}

/// Fraction and fault bit of TEMP_EXT alone, whole degrees left at zero
pub fn decode_temp_ext(ext: u8) -> TempReading {
    TempReading {
        raw: (ext >> temp_ext::FRACTION_SHIFT) as u16,
        fault: ext & temp_ext::FAULT != 0,
    }
}

/// Combine the TEMP and TEMP_EXT register values of one channel
pub fn decode_temperature(temp: u8, ext: u8) -> TempReading {
    let mut reading = decode_temp_ext(ext);
    reading.raw |= (temp as u16) << 3;
    reading
}

/// Raw tach count to RPM; 0 and 0xFF mean no valid measurement
pub fn fan_from_reg(count: u8, range: RpmRange) -> u32 {
    if count == 0 || count == TACH_STALLED {
        return 0;
    }
    range.full_scale() * 30 / count as u32
}

/// 0-255 duty to the chip's 0-120 slot count
#[inline]
pub fn pwm_to_duty(value: i32) -> u8 {
    let value = clamp_val(value, 0, MAX_PWM as i32);
    (value * MAX_DUTY as i32 / MAX_PWM as i32) as u8
}

/// 0-120 slot count back to 0-255
#[inline]
pub fn duty_to_pwm(duty: u8) -> u8 {
    let duty = clamp_val(duty, 0, MAX_DUTY);
    (duty as u32 * MAX_PWM as u32 / MAX_DUTY as u32) as u8
}

/// Replace an unsupported pulses-per-revolution value with the default
#[inline]
pub fn normalize_ppr(ppr: u8) -> u8 {
    if (MIN_PPR..=MAX_PPR).contains(&ppr) {
        ppr
    } else {
        DEFAULT_PPR
    }
}
