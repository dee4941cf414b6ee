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

//! Register bus transport
//!
//! `RegisterBus` is the single-byte read/write primitive the driver runs on.
//! `I2cDevice` implements it with SMBus byte-data transfers on Linux i2c-dev,
//! through the `i2cdev` crate.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use tracing::{debug, trace};

use crate::error::{Max6639Error, Result};

/// Byte-addressed register access on an already addressed device
#[cfg_attr(test, mockall::automock)]
pub trait RegisterBus {
    fn read_byte_data(&mut self, register: u8) -> io::Result<u8>;

    fn write_byte_data(&mut self, register: u8, value: u8) -> io::Result<()>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read_byte_data(&mut self, register: u8) -> io::Result<u8> {
        (**self).read_byte_data(register)
    }

    fn write_byte_data(&mut self, register: u8, value: u8) -> io::Result<()> {
        (**self).write_byte_data(register, value)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn read_byte_data(&mut self, register: u8) -> io::Result<u8> {
        (**self).read_byte_data(register)
    }

    fn write_byte_data(&mut self, register: u8, value: u8) -> io::Result<()> {
        (**self).write_byte_data(register, value)
    }
}

/// Valid 7-bit addresses outside the reserved ranges
pub const fn is_valid_address(address: u16) -> bool {
    address >= 0x03 && address <= 0x77
}

/// Character device path for bus `bus`: `/dev/i2c-N`, or the devfs style
/// `/dev/i2c/N` when only that exists
pub fn bus_path(bus: u32) -> PathBuf {
    let primary = PathBuf::from(format!("/dev/i2c-{}", bus));
    let fallback = PathBuf::from(format!("/dev/i2c/{}", bus));
    if !primary.exists() && fallback.exists() {
        fallback
    } else {
        primary
    }
}

/// An opened i2c-dev handle bound to one slave address
pub struct I2cDevice {
    dev: LinuxI2CDevice,
    path: PathBuf,
    address: u16,
}

impl fmt::Debug for I2cDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cDevice")
            .field("path", &self.path)
            .field("address", &format_args!("0x{:02x}", self.address))
            .finish()
    }
}

impl I2cDevice {
    /// Open bus `bus` and select `address`. `force` takes the address even if
    /// a kernel driver has claimed it.
    pub fn open(bus: u32, address: u16, force: bool) -> Result<Self> {
        if !is_valid_address(address) {
            return Err(Max6639Error::invalid_argument(format!(
                "I2C address 0x{:02x} outside 0x03-0x77",
                address
            )));
        }

        let path = bus_path(bus);
        let dev = open_device(&path, address, force).map_err(|e| open_error(&path, address, e))?;
        debug!(path = %path.display(), address = %format!("0x{:02x}", address), force, "Opened I2C device");
        Ok(Self { dev, path, address })
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_device(path: &Path, address: u16, force: bool) -> std::result::Result<LinuxI2CDevice, LinuxI2CError> {
    if force {
        // SAFETY: the caller asked to share the address with whatever kernel
        // driver owns it; all accesses are plain SMBus byte transfers.
        unsafe { LinuxI2CDevice::force_new(path, address) }
    } else {
        LinuxI2CDevice::new(path, address)
    }
}

/// Busy means the file opened but a kernel driver owns the address
fn open_error(path: &Path, address: u16, e: LinuxI2CError) -> Max6639Error {
    let source = io::Error::from(e);
    if source.raw_os_error() == Some(libc::EBUSY) {
        debug!("Address 0x{:02x} is busy, a kernel driver may own it (use --force)", address);
        return Max6639Error::SetAddress { address, source };
    }
    Max6639Error::DeviceOpen { path: path.to_path_buf(), source }
}

impl RegisterBus for I2cDevice {
    fn read_byte_data(&mut self, register: u8) -> io::Result<u8> {
        let value = self.dev.smbus_read_byte_data(register).map_err(io::Error::from)?;
        trace!(register = %format!("0x{:02x}", register), value = %format!("0x{:02x}", value), "smbus read");
        Ok(value)
    }

    fn write_byte_data(&mut self, register: u8, value: u8) -> io::Result<()> {
        trace!(register = %format!("0x{:02x}", register), value = %format!("0x{:02x}", value), "smbus write");
        self.dev.smbus_write_byte_data(register, value).map_err(io::Error::from)
    }
}
