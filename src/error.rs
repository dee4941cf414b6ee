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

//! Unified error handling for the MAX6639 driver
//!
//! A single error type is shared by the transport, the driver and the
//! configuration loader. Any error returned from a multi-step sequence means
//! the chip may be partially configured; re-run detection and initialization
//! before trusting further reads.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias using Max6639Error
pub type Result<T> = std::result::Result<T, Max6639Error>;

/// Direction of a failed register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Read,
    Write,
}

impl fmt::Display for BusOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusOp::Read => f.write_str("read"),
            BusOp::Write => f.write_str("write"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Max6639Error {
    // ============================================================================
    // Bus and Device Errors
    // ============================================================================
    #[error("Bus {op} of register 0x{register:02x} failed: {source}")]
    Bus {
        op: BusOp,
        register: u8,
        source: io::Error,
    },

    #[error("MAX6639 not found (device id 0x{dev_id:02x}, manufacturer id 0x{manu_id:02x})")]
    IdentityMismatch {
        dev_id: u8,
        manu_id: u8,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to open I2C bus {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to select I2C address 0x{address:02x}: {source}")]
    SetAddress {
        address: u16,
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

impl Max6639Error {
    /// Wrap a failed register read
    pub fn bus_read(register: u8, source: io::Error) -> Self {
        Self::Bus { op: BusOp::Read, register, source }
    }

    /// Wrap a failed register write
    pub fn bus_write(register: u8, source: io::Error) -> Self {
        Self::Bus { op: BusOp::Write, register, source }
    }

    /// Create an invalid argument error from a string
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for transport failures, as opposed to identity or argument problems
    pub fn is_bus_error(&self) -> bool {
        matches!(self, Self::Bus { .. })
    }

    /// Register involved in a failed bus access, if any
    pub fn register(&self) -> Option<u8> {
        match self {
            Self::Bus { register, .. } => Some(*register),
            _ => None,
        }
    }
}
