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

//! max6639 - Driver for the Maxim MAX6639 temperature monitor and fan controller
//!
//! This library provides the register map, unit conversions and the driver
//! state machine for the chip, on top of a byte-wide register bus. The Linux
//! i2c-dev transport and the `max6639ctl` command line front end live here too.

pub mod bus;
pub mod cli;
pub mod config;
pub mod convert;
pub mod data;
pub mod driver;
pub mod dump;
pub mod error;
pub mod logger;
pub mod registers;

#[cfg(test)]
pub mod test_utils;

pub use bus::{I2cDevice, RegisterBus};
pub use data::{Channel, ChannelSettings, DeviceConfig, DeviceSnapshot, RpmRange, TempReading};
pub use driver::{ChipIdentity, Max6639, StdDelay, TempLimit};
pub use dump::RegisterDump;
pub use error::{Max6639Error, Result};
