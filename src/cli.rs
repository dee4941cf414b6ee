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

//! Command Line Interface
//!
//! Every command opens the bus, runs one driver operation and exits.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use crate::bus::I2cDevice;
use crate::config::{config_path, load_config, save_config, SavedConfig};
use crate::data::{Channel, DeviceSnapshot};
use crate::driver::{Max6639, TempLimit};
use crate::registers::address;

#[derive(Parser, Debug)]
#[command(name = "max6639ctl")]
#[command(version)]
#[command(about = "Control a MAX6639 fan controller over Linux i2c-dev")]
#[command(long_about = "Control a MAX6639 fan controller over Linux i2c-dev

EXAMPLES:
    max6639ctl scan                      Find the chip on the configured bus
    max6639ctl --bus 1 scan --save       Remember where the chip was found
    max6639ctl --bus 0 --addr 0x2c init  Reset and program the chip
    max6639ctl status                    Show temperatures, fans and limits
    max6639ctl set-pwm 0 128             Half duty on channel 0
    max6639ctl set-max 1 75000           THERM limit of channel 1 to 75 degC
    max6639ctl monitor 30                Sample once a second for 30 s

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Enable debug logging

FILES:
    ~/.config/max6639/config.json        Bus, address and init settings")]
#[command(propagate_version = true)]
pub struct Cli {
    /// I2C bus number (/dev/i2c-N)
    #[arg(long, global = true)]
    pub bus: Option<u32>,

    /// 7-bit slave address, decimal or 0x-prefixed hex
    #[arg(long = "addr", global = true, value_parser = parse_address)]
    pub address: Option<u16>,

    /// Configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the address even if a kernel driver has claimed it
    #[arg(long, global = true)]
    pub force: bool,

    /// Append JSON events to the event log
    #[arg(long, global = true)]
    pub logging: bool,

    /// Log filter (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Check the device and manufacturer IDs
    Detect,
    /// Try each address the chip can be strapped to
    Scan {
        /// Store the bus and found address in the configuration file
        #[arg(long)]
        save: bool,
    },
    /// Reset the chip and program it from the configuration
    Init,
    /// Show one sample of every channel
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print all registers
    Dump {
        /// Only the hex grid
        #[arg(long)]
        raw: bool,
    },
    /// Sample once a second
    Monitor {
        /// Stop after this many seconds; runs until interrupted when omitted
        secs: Option<u64>,
    },
    /// Set the THERM limit (milli-degrees)
    SetMax { channel: usize, millidegrees: i32 },
    /// Set the ALERT limit (milli-degrees)
    SetCrit { channel: usize, millidegrees: i32 },
    /// Set the OT limit (milli-degrees)
    SetEmergency { channel: usize, millidegrees: i32 },
    /// Set the target duty (0-255)
    SetPwm { channel: usize, value: i32 },
    /// Put the chip in standby
    Suspend,
    /// Wake the chip from standby
    Resume,
}

/// Accept `47`, `0x2f` or `0X2F`
pub fn parse_address(s: &str) -> std::result::Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// Bus location after merging flags over the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub bus: u32,
    pub address: u16,
    pub force: bool,
}

impl Target {
    pub fn resolve(cli: &Cli, cfg: &SavedConfig) -> Self {
        Self {
            bus: cli.bus.unwrap_or(cfg.bus),
            address: cli.address.unwrap_or(cfg.address),
            force: cli.force || cfg.force,
        }
    }

    fn open(&self) -> Result<Max6639<I2cDevice>> {
        let dev = I2cDevice::open(self.bus, self.address, self.force)
            .with_context(|| format!("opening bus {} address 0x{:02x}", self.bus, self.address))?;
        Ok(Max6639::new(dev))
    }

    /// Open and confirm the chip identity
    fn attach(&self) -> Result<Max6639<I2cDevice>> {
        let mut chip = self.open()?;
        chip.detect()
            .with_context(|| format!("no MAX6639 at bus {} address 0x{:02x}", self.bus, self.address))?;
        Ok(chip)
    }
}

pub fn run_cli(cli: &Cli) -> Result<()> {
    let config_file = cli.config.clone().unwrap_or_else(config_path);
    let cfg = load_config(Some(config_file.as_path())).context("loading configuration")?;
    let target = Target::resolve(cli, &cfg);
    debug!(?target, "Resolved target");
    execute_command(&cli.command, target, &cfg, &config_file)
}

fn execute_command(cmd: &Commands, target: Target, cfg: &SavedConfig, config_file: &Path) -> Result<()> {
    match cmd {
        Commands::Detect => cmd_detect(target),
        Commands::Scan { save } => {
            let found = cmd_scan(target)?;
            if *save {
                remember_target(config_file, cfg, found)?;
                println!("Saved to {}", config_file.display());
            }
            Ok(())
        }
        Commands::Init => cmd_init(target, cfg),
        Commands::Status { json } => cmd_status(target, *json),
        Commands::Dump { raw } => cmd_dump(target, *raw),
        Commands::Monitor { secs } => cmd_monitor(target, *secs),
        Commands::SetMax { channel, millidegrees } => {
            cmd_set_limit(target, *channel, TempLimit::Max, *millidegrees)
        }
        Commands::SetCrit { channel, millidegrees } => {
            cmd_set_limit(target, *channel, TempLimit::Crit, *millidegrees)
        }
        Commands::SetEmergency { channel, millidegrees } => {
            cmd_set_limit(target, *channel, TempLimit::Emergency, *millidegrees)
        }
        Commands::SetPwm { channel, value } => cmd_set_pwm(target, *channel, *value),
        Commands::Suspend => cmd_power(target, true),
        Commands::Resume => cmd_power(target, false),
    }
}

// ============================================================================
// Discovery Commands
// ============================================================================

fn cmd_detect(target: Target) -> Result<()> {
    let mut chip = target.open()?;
    let id = chip.detect()?;
    let rev = chip.read_revision()?;
    println!(
        "MAX6639 at bus {} address 0x{:02x} (device 0x{:02x}, manufacturer 0x{:02x}, revision 0x{:02x})",
        target.bus, target.address, id.dev_id, id.manu_id, rev
    );
    Ok(())
}

fn cmd_scan(target: Target) -> Result<Target> {
    for addr in address::CANDIDATES {
        let candidate = Target { address: addr, ..target };
        match candidate.attach() {
            Ok(_) => {
                println!("Found MAX6639 at bus {} address 0x{:02x}", target.bus, addr);
                return Ok(candidate);
            }
            Err(e) => debug!("0x{:02x}: {:#}", addr, e),
        }
    }
    bail!("no MAX6639 found on bus {}", target.bus)
}

/// Write `cfg` back to `path` with the location of `found`, keeping the init settings
pub fn remember_target(path: &Path, cfg: &SavedConfig, found: Target) -> Result<SavedConfig> {
    let updated = SavedConfig {
        bus: found.bus,
        address: found.address,
        force: found.force,
        ..cfg.clone()
    };
    save_config(path, &updated).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bus = updated.bus, address = updated.address, "Saved chip location");
    Ok(updated)
}

// ============================================================================
// Setup Commands
// ============================================================================

fn cmd_init(target: Target, cfg: &SavedConfig) -> Result<()> {
    let mut chip = target.attach()?;
    let mut snapshot = DeviceSnapshot::default();
    chip.init(&cfg.device_config(), &mut snapshot)
        .context("initialization failed, chip may be partially configured")?;
    println!(
        "Initialized: {} pulses/rev, {}, duty {}/{}",
        snapshot.ppr(),
        snapshot.rpm_range,
        snapshot.pwm(Channel::One),
        snapshot.pwm(Channel::Two)
    );
    Ok(())
}

// ============================================================================
// Telemetry Commands
// ============================================================================

fn sample(chip: &mut Max6639<I2cDevice>) -> Result<DeviceSnapshot> {
    let mut snapshot = DeviceSnapshot::default();
    chip.read_settings(&mut snapshot)?;
    chip.update(&mut snapshot)?;
    Ok(snapshot)
}

/// One line per channel, as printed by `status`
pub fn format_channel(snapshot: &DeviceSnapshot, ch: Channel) -> String {
    let r = snapshot.report(ch);
    let temp = if r.temp_fault {
        "  fault".to_string()
    } else {
        format!("{:7.3}", r.temp_millidegrees as f64 / 1000.0)
    };
    format!(
        "ch{}  temp {} C  fan {:5} RPM  pwm {:3}  max {:3} crit {:3} emerg {:3}{}",
        r.channel,
        temp,
        r.fan_rpm,
        r.pwm,
        r.temp_max / 1000,
        r.temp_crit / 1000,
        r.temp_emergency / 1000,
        if r.alarm { "  ALARM" } else { "" }
    )
}

fn cmd_status(target: Target, json: bool) -> Result<()> {
    let mut chip = target.attach()?;
    let snapshot = sample(&mut chip)?;
    if json {
        let reports = Channel::ALL.map(|ch| snapshot.report(ch));
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }
    println!("MAX6639 bus {} address 0x{:02x}", target.bus, target.address);
    println!("Tach range {}, {} pulses/rev", snapshot.rpm_range, snapshot.ppr());
    for ch in Channel::ALL {
        println!("{}", format_channel(&snapshot, ch));
    }
    Ok(())
}

fn cmd_dump(target: Target, raw: bool) -> Result<()> {
    let mut chip = target.open()?;
    let dump = chip.dump_registers();
    if raw {
        print!("{}", dump.hex_grid());
    } else {
        print!("{}", dump);
    }
    if dump.failed_reads() > 0 {
        eprintln!("{} registers could not be read", dump.failed_reads());
    }
    Ok(())
}

fn cmd_monitor(target: Target, secs: Option<u64>) -> Result<()> {
    let mut chip = target.attach()?;
    let mut snapshot = DeviceSnapshot::default();
    chip.read_settings(&mut snapshot)?;

    let start = Instant::now();
    let limit = secs.map(Duration::from_secs);
    info!(?limit, "Monitoring");
    loop {
        let tick = Instant::now();
        chip.update(&mut snapshot)?;
        for ch in Channel::ALL {
            println!("[{:6.1}s] {}", start.elapsed().as_secs_f64(), format_channel(&snapshot, ch));
        }

        if limit.is_some_and(|l| start.elapsed() >= l) {
            break;
        }
        let elapsed = tick.elapsed();
        if elapsed < Duration::from_secs(1) {
            thread::sleep(Duration::from_secs(1) - elapsed);
        }
    }
    Ok(())
}

// ============================================================================
// Control Commands
// ============================================================================

fn cmd_set_limit(target: Target, channel: usize, limit: TempLimit, millidegrees: i32) -> Result<()> {
    let ch = Channel::try_from(channel)?;
    let mut chip = target.attach()?;
    let mut snapshot = DeviceSnapshot::default();
    chip.set_temp_limit(&mut snapshot, ch, limit, millidegrees)?;
    let written = match limit {
        TempLimit::Max => snapshot.temp_max(ch),
        TempLimit::Crit => snapshot.temp_crit(ch),
        TempLimit::Emergency => snapshot.temp_emergency(ch),
    };
    println!("ch{} {} = {} mC", ch, limit.name(), written);
    Ok(())
}

fn cmd_set_pwm(target: Target, channel: usize, value: i32) -> Result<()> {
    let ch = Channel::try_from(channel)?;
    let mut chip = target.attach()?;
    let mut snapshot = DeviceSnapshot::default();
    chip.set_pwm(&mut snapshot, ch, value)?;
    println!("ch{} pwm = {} (duty {}/120)", ch, snapshot.pwm(ch), snapshot.duty[ch.index()]);
    Ok(())
}

fn cmd_power(target: Target, standby: bool) -> Result<()> {
    let mut chip = target.attach()?;
    if standby {
        chip.suspend()?;
        println!("Standby");
    } else {
        chip.resume()?;
        println!("Running");
    }
    Ok(())
}
