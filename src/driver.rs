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

//! MAX6639 driver state machine
//!
//! Detection, initialization, telemetry refresh, limit/duty setters and power
//! state transitions. Every sequence stops at the first failed register
//! access and returns that error; nothing is retried or rolled back.
//!
//! # Example
//!
//! ```no_run
//! use max6639::{DeviceConfig, DeviceSnapshot, I2cDevice, Max6639, Channel};
//!
//! let bus = I2cDevice::open(1, 0x2f, false)?;
//! let mut chip = Max6639::new(bus);
//! chip.detect()?;
//!
//! let mut snapshot = DeviceSnapshot::default();
//! chip.init(&DeviceConfig::default(), &mut snapshot)?;
//! chip.update(&mut snapshot)?;
//! println!("{} mdegC", snapshot.temp_input(Channel::One));
//! # Ok::<(), max6639::Max6639Error>(())
//! ```

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::bus::RegisterBus;
use crate::convert;
use crate::data::{Channel, DeviceConfig, DeviceSnapshot, RpmRange};
use crate::dump::RegisterDump;
use crate::error::{Max6639Error, Result};
use crate::logger;
use crate::registers::{
    fan_config1, fan_config2a, fan_config3, fan_ppr, gconfig, identity, regs, REGISTER_SPACE,
    RESET_SETTLE_MS,
};

/// `DelayNs` provider that sleeps the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }
}

/// Identity registers of a detected chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipIdentity {
    pub dev_id: u8,
    pub manu_id: u8,
}

/// Which of the three temperature limits a setter targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempLimit {
    /// THERM limit (hwmon temp_max)
    Max,
    /// ALERT limit (hwmon temp_crit)
    Crit,
    /// OT limit (hwmon temp_emergency)
    Emergency,
}

impl TempLimit {
    pub const fn register(self, ch: Channel) -> u8 {
        match self {
            TempLimit::Max => regs::therm_limit(ch.index()),
            TempLimit::Crit => regs::alert_limit(ch.index()),
            TempLimit::Emergency => regs::ot_limit(ch.index()),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            TempLimit::Max => "temp_max",
            TempLimit::Crit => "temp_crit",
            TempLimit::Emergency => "temp_emergency",
        }
    }

    fn cache(self, snapshot: &mut DeviceSnapshot) -> &mut [u8; 2] {
        match self {
            TempLimit::Max => &mut snapshot.therm_limit,
            TempLimit::Crit => &mut snapshot.alert_limit,
            TempLimit::Emergency => &mut snapshot.ot_limit,
        }
    }
}

/// A MAX6639 reached through `bus`
#[derive(Debug)]
pub struct Max6639<B, D = StdDelay> {
    bus: B,
    delay: D,
}

impl<B: RegisterBus> Max6639<B> {
    pub fn new(bus: B) -> Self {
        Self { bus, delay: StdDelay }
    }
}

impl<B: RegisterBus, D: DelayNs> Max6639<B, D> {
    pub fn with_delay(bus: B, delay: D) -> Self {
        Self { bus, delay }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Give back the bus handle
    pub fn release(self) -> B {
        self.bus
    }

    fn read(&mut self, register: u8) -> Result<u8> {
        self.bus
            .read_byte_data(register)
            .map_err(|e| Max6639Error::bus_read(register, e))
    }

    fn write(&mut self, register: u8, value: u8) -> Result<()> {
        self.bus
            .write_byte_data(register, value)
            .map_err(|e| Max6639Error::bus_write(register, e))
    }

    /// Confirm the device and manufacturer IDs
    pub fn detect(&mut self) -> Result<ChipIdentity> {
        let dev_id = self.read(regs::DEVID)?;
        let manu_id = self.read(regs::MANUID)?;
        debug!(dev_id = %format!("0x{:02x}", dev_id), manu_id = %format!("0x{:02x}", manu_id), "Identity registers");

        if dev_id != identity::DEVICE_ID || manu_id != identity::MANUFACTURER_ID {
            return Err(Max6639Error::IdentityMismatch { dev_id, manu_id });
        }
        logger::log_event("detect", json!({ "dev_id": dev_id, "manu_id": manu_id }));
        Ok(ChipIdentity { dev_id, manu_id })
    }

    pub fn read_revision(&mut self) -> Result<u8> {
        self.read(regs::DEVREV)
    }

    /// Reset the chip and program `config`, seeding `snapshot` with what was written.
    ///
    /// Blocks for the reset settle interval. On error the chip is left
    /// partially configured.
    pub fn init(&mut self, config: &DeviceConfig, snapshot: &mut DeviceSnapshot) -> Result<()> {
        config.validate()?;

        // Reset chip to default values, GCONFIG is set up last
        self.write(regs::GCONFIG, gconfig::POR)?;
        // Temperature reads fail until the reset has finished
        self.delay.delay_ms(RESET_SETTLE_MS);

        let ppr = convert::normalize_ppr(config.ppr);
        if ppr != config.ppr {
            warn!(requested = config.ppr, using = ppr, "Unsupported pulses per revolution");
        }
        snapshot.ppr_reg = ppr - 1;

        let polarity = if config.pwm_polarity_high {
            fan_config2a::POLARITY_HIGH
        } else {
            fan_config2a::POLARITY_LOW
        };

        for ch in Channel::ALL {
            let i = ch.index();
            let settings = config.channel(ch);

            self.write(regs::fan_ppr(i), snapshot.ppr_reg << fan_ppr::SHIFT)?;

            self.write(regs::fan_config1(i), fan_config1::PWM | config.rpm_range.index())?;
            snapshot.rpm_range = config.rpm_range;

            self.write(regs::fan_config2a(i), polarity)?;

            // THERM forces full speed; 25kHz together with PWM_FREQ_HI
            self.write(
                regs::fan_config3(i),
                fan_config3::THERM_FULL_SPEED | fan_config3::FREQ_SELECT,
            )?;

            self.write(regs::therm_limit(i), settings.therm_limit)?;
            snapshot.therm_limit[i] = settings.therm_limit;
            self.write(regs::alert_limit(i), settings.alert_limit)?;
            snapshot.alert_limit[i] = settings.alert_limit;
            self.write(regs::ot_limit(i), settings.ot_limit)?;
            snapshot.ot_limit[i] = settings.ot_limit;

            self.write(regs::targtduty(i), settings.target_duty)?;
            snapshot.duty[i] = settings.target_duty;
        }

        // Start monitoring
        self.write(regs::GCONFIG, gconfig::MONITOR)?;

        info!(
            ppr,
            rpm_range = config.rpm_range.full_scale(),
            polarity_high = config.pwm_polarity_high,
            "MAX6639 initialized"
        );
        logger::log_event(
            "init",
            json!({
                "ppr": ppr,
                "rpm_range": config.rpm_range.full_scale(),
                "pwm_polarity_high": config.pwm_polarity_high,
                "duty": snapshot.duty,
            }),
        );
        Ok(())
    }

    /// Refresh status, tach counts and temperatures into `snapshot`.
    ///
    /// Values read before a failure stay in `snapshot`.
    pub fn update(&mut self, snapshot: &mut DeviceSnapshot) -> Result<()> {
        snapshot.status = self.read(regs::STATUS)?;

        for ch in Channel::ALL {
            let i = ch.index();
            snapshot.fan_count[i] = self.read(regs::fan_cnt(i))?;

            // TEMP_EXT first; its fault bit stands even if TEMP fails
            let ext = self.read(regs::temp_ext(i))?;
            let partial = convert::decode_temp_ext(ext);
            snapshot.temp_raw[i] = partial.raw;
            snapshot.temp_fault[i] = partial.fault;

            let temp = self.read(regs::temp(i))?;
            snapshot.temp_raw[i] = convert::decode_temperature(temp, ext).raw;

            let reading = snapshot.temp_reading(ch);
            if reading.fault {
                warn!(channel = i, "Temperature diode fault");
            }
            debug!(
                channel = i,
                temp_mc = reading.millidegrees(),
                fan_rpm = snapshot.fan_input(ch),
                pwm = snapshot.pwm(ch),
                alarm = snapshot.alarm(ch),
                "Channel sample"
            );
        }

        logger::log_event(
            "update",
            json!({
                "status": snapshot.status,
                "channels": Channel::ALL.map(|ch| snapshot.report(ch)),
            }),
        );
        Ok(())
    }

    /// Reload the written-only values (limits, duty, tach setup) from the chip.
    ///
    /// For attaching to a chip that was initialized by another process.
    /// Channel 1's tach setup is taken as representative for both channels.
    pub fn read_settings(&mut self, snapshot: &mut DeviceSnapshot) -> Result<()> {
        for ch in Channel::ALL {
            let i = ch.index();
            snapshot.therm_limit[i] = self.read(regs::therm_limit(i))?;
            snapshot.alert_limit[i] = self.read(regs::alert_limit(i))?;
            snapshot.ot_limit[i] = self.read(regs::ot_limit(i))?;
            snapshot.duty[i] = self.read(regs::targtduty(i))?;
        }

        let cfg1 = self.read(regs::fan_config1(0))?;
        snapshot.rpm_range = RpmRange::from_index(cfg1 & fan_config1::RANGE_MASK).unwrap_or_default();
        snapshot.ppr_reg = self.read(regs::fan_ppr(0))? >> fan_ppr::SHIFT;
        Ok(())
    }

    /// Write one temperature limit, given in milli-degrees
    pub fn set_temp_limit(
        &mut self,
        snapshot: &mut DeviceSnapshot,
        ch: Channel,
        limit: TempLimit,
        millidegrees: i32,
    ) -> Result<()> {
        let value = convert::temp_limit_to_reg(millidegrees);
        self.write(limit.register(ch), value)?;
        limit.cache(snapshot)[ch.index()] = value;

        debug!(channel = ch.index(), limit = limit.name(), degrees = value, "Temperature limit written");
        logger::log_event(
            "limit_write",
            json!({
                "channel": ch.index(),
                "limit": limit.name(),
                "requested_mc": millidegrees,
                "written": value,
            }),
        );
        Ok(())
    }

    pub fn set_temp_max(&mut self, snapshot: &mut DeviceSnapshot, ch: Channel, millidegrees: i32) -> Result<()> {
        self.set_temp_limit(snapshot, ch, TempLimit::Max, millidegrees)
    }

    pub fn set_temp_crit(&mut self, snapshot: &mut DeviceSnapshot, ch: Channel, millidegrees: i32) -> Result<()> {
        self.set_temp_limit(snapshot, ch, TempLimit::Crit, millidegrees)
    }

    pub fn set_temp_emergency(&mut self, snapshot: &mut DeviceSnapshot, ch: Channel, millidegrees: i32) -> Result<()> {
        self.set_temp_limit(snapshot, ch, TempLimit::Emergency, millidegrees)
    }

    /// Set the target duty from a 0-255 value
    pub fn set_pwm(&mut self, snapshot: &mut DeviceSnapshot, ch: Channel, value: i32) -> Result<()> {
        let duty = convert::pwm_to_duty(value);
        self.write(regs::targtduty(ch.index()), duty)?;
        snapshot.duty[ch.index()] = duty;

        debug!(channel = ch.index(), requested = value, duty, "Target duty written");
        logger::log_event(
            "pwm_write",
            json!({
                "channel": ch.index(),
                "requested_raw": value,
                "written": duty,
            }),
        );
        Ok(())
    }

    /// Enter standby; other GCONFIG bits are preserved
    pub fn suspend(&mut self) -> Result<()> {
        let cfg = self.read(regs::GCONFIG)?;
        self.write(regs::GCONFIG, cfg | gconfig::STANDBY)?;
        info!("MAX6639 in standby");
        logger::log_event("suspend", json!({ "gconfig": cfg }));
        Ok(())
    }

    /// Leave standby; other GCONFIG bits are preserved
    pub fn resume(&mut self) -> Result<()> {
        let cfg = self.read(regs::GCONFIG)?;
        self.write(regs::GCONFIG, cfg & !gconfig::STANDBY)?;
        info!("MAX6639 resumed");
        logger::log_event("resume", json!({ "gconfig": cfg }));
        Ok(())
    }

    /// Read every register; failed reads are recorded as missing
    pub fn dump_registers(&mut self) -> RegisterDump {
        let mut dump = RegisterDump::default();
        for offset in 0..REGISTER_SPACE as u8 {
            match self.read(offset) {
                Ok(v) => dump.set(offset, Some(v)),
                Err(e) => debug!("{}", e),
            }
        }
        if dump.failed_reads() > 0 {
            warn!(failed = dump.failed_reads(), "Register dump incomplete");
        }
        dump
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockRegisterBus;
    use crate::data::ChannelSettings;
    use crate::test_utils::test_utils::{FakeBus, RecordingDelay};
    use mockall::Sequence;
    use std::io;

    mockall::mock! {
        pub Delay {}
        impl DelayNs for Delay {
            fn delay_ns(&mut self, ns: u32);
            fn delay_ms(&mut self, ms: u32);
        }
    }

    fn eio() -> io::Error {
        io::Error::from_raw_os_error(libc::EIO)
    }

    fn chip(bus: FakeBus) -> Max6639<FakeBus, RecordingDelay> {
        Max6639::with_delay(bus, RecordingDelay::default())
    }

    #[test]
    fn test_detect_accepts_max6639() {
        let mut drv = chip(FakeBus::max6639());
        let id = drv.detect().unwrap();
        assert_eq!(id, ChipIdentity { dev_id: 0x58, manu_id: 0x4D });
        // Only the two identity registers are touched
        assert_eq!(drv.bus().reads(), vec![regs::DEVID, regs::MANUID]);
        assert!(drv.bus().writes().is_empty());
    }

    #[test]
    fn test_detect_rejects_other_identities() {
        for (dev, manu) in [(0x58, 0x00), (0x00, 0x4D), (0x59, 0x4D), (0xFF, 0xFF)] {
            let mut bus = FakeBus::default();
            bus.set(regs::DEVID, dev);
            bus.set(regs::MANUID, manu);
            let err = chip(bus).detect().unwrap_err();
            match err {
                Max6639Error::IdentityMismatch { dev_id, manu_id } => {
                    assert_eq!((dev_id, manu_id), (dev, manu));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_detect_bus_error_is_not_mismatch() {
        let mut bus = FakeBus::max6639();
        bus.fail_read(regs::MANUID);
        let err = chip(bus).detect().unwrap_err();
        assert!(err.is_bus_error());
        assert_eq!(err.register(), Some(regs::MANUID));
    }

    #[test]
    fn test_read_revision() {
        let mut bus = FakeBus::max6639();
        bus.set(regs::DEVREV, 0x02);
        assert_eq!(chip(bus).read_revision().unwrap(), 0x02);
    }

    #[test]
    fn test_init_write_sequence() {
        let config = DeviceConfig::default();
        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(FakeBus::max6639());
        drv.init(&config, &mut snapshot).unwrap();

        let mut expected = vec![(regs::GCONFIG, gconfig::POR)];
        for i in 0..2 {
            expected.extend([
                (regs::fan_ppr(i), 0x40),
                (regs::fan_config1(i), 0x81),
                (regs::fan_config2a(i), 0x02),
                (regs::fan_config3(i), 0x43),
                (regs::therm_limit(i), 80),
                (regs::alert_limit(i), 90),
                (regs::ot_limit(i), 100),
                (regs::targtduty(i), 30),
            ]);
        }
        expected.push((regs::GCONFIG, 0x38));
        assert_eq!(drv.bus().writes(), expected);

        assert_eq!(snapshot.duty, [30, 30]);
        assert_eq!(snapshot.ppr_reg, 1);
        assert_eq!(snapshot.rpm_range, RpmRange::Rpm4000);
        assert_eq!(snapshot.ot_limit, [100, 100]);
    }

    #[test]
    fn test_init_waits_after_reset_before_next_access() {
        let mut seq = Sequence::new();
        let mut mock = MockRegisterBus::new();
        let mut delay = MockDelay::new();
        mock.expect_write_byte_data()
            .withf(|r, v| *r == regs::GCONFIG && *v == gconfig::POR)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        delay
            .expect_delay_ms()
            .withf(|ms| *ms == 1000)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        mock.expect_write_byte_data()
            .withf(|r, _| *r == regs::fan_ppr(0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(eio()));

        let mut drv = Max6639::with_delay(mock, delay);
        let err = drv.init(&DeviceConfig::default(), &mut DeviceSnapshot::default()).unwrap_err();
        assert_eq!(err.register(), Some(regs::fan_ppr(0)));
    }

    #[test]
    fn test_init_delays_once() {
        let mut drv = chip(FakeBus::max6639());
        drv.init(&DeviceConfig::default(), &mut DeviceSnapshot::default()).unwrap();
        assert_eq!(drv.delay.calls, vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_init_normalizes_ppr_and_polarity() {
        let mut config = DeviceConfig {
            ppr: 0,
            rpm_range: RpmRange::Rpm16000,
            pwm_polarity_high: false,
            ..DeviceConfig::default()
        };
        config.channels[1] = ChannelSettings {
            therm_limit: 70,
            alert_limit: 75,
            ot_limit: 85,
            target_duty: 120,
        };
        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(FakeBus::max6639());
        drv.init(&config, &mut snapshot).unwrap();

        let bus = drv.bus();
        assert_eq!(bus.get(regs::fan_ppr(0)), 0x40);
        assert_eq!(bus.get(regs::fan_config1(1)), 0x83);
        assert_eq!(bus.get(regs::fan_config2a(0)), 0x00);
        assert_eq!(bus.get(regs::therm_limit(1)), 70);
        assert_eq!(bus.get(regs::targtduty(1)), 120);
        assert_eq!(snapshot.ppr(), 2);
        assert_eq!(snapshot.duty, [30, 120]);

        let mut config = DeviceConfig::default();
        config.ppr = 4;
        let mut drv = chip(FakeBus::max6639());
        drv.init(&config, &mut DeviceSnapshot::default()).unwrap();
        assert_eq!(drv.bus().get(regs::fan_ppr(1)), 0xC0);
    }

    #[test]
    fn test_init_invalid_config_touches_nothing() {
        let mut config = DeviceConfig::default();
        config.channels[0].target_duty = 200;
        let mut drv = chip(FakeBus::max6639());
        let err = drv.init(&config, &mut DeviceSnapshot::default()).unwrap_err();
        assert!(matches!(err, Max6639Error::InvalidArgument(_)));
        assert!(drv.bus().writes().is_empty());
        assert!(drv.bus().reads().is_empty());
        assert!(drv.delay.calls.is_empty());
    }

    #[test]
    fn test_init_aborts_on_channel_write_failure() {
        let mut bus = FakeBus::max6639();
        bus.fail_write(regs::fan_config2a(1));
        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(bus);

        let err = drv.init(&DeviceConfig::default(), &mut snapshot).unwrap_err();
        assert_eq!(err.register(), Some(regs::fan_config2a(1)));

        let writes = drv.bus().writes();
        let (last_reg, _) = *writes.last().unwrap();
        assert_eq!(last_reg, regs::fan_config2a(1));
        assert!(!writes.contains(&(regs::GCONFIG, gconfig::MONITOR)));
        // The failed write never reached the register file
        assert_eq!(drv.bus().get(regs::fan_config2a(1)), 0);
        // Channel 0 completed, channel 1 duty never cached
        assert_eq!(snapshot.duty, [30, 0]);
    }

    #[test]
    fn test_init_reset_failure_skips_delay() {
        let mut bus = FakeBus::max6639();
        bus.fail_write(regs::GCONFIG);
        let mut drv = chip(bus);
        let err = drv.init(&DeviceConfig::default(), &mut DeviceSnapshot::default()).unwrap_err();
        assert!(err.is_bus_error());
        assert!(drv.delay.calls.is_empty());
        assert_eq!(drv.bus().writes(), vec![(regs::GCONFIG, gconfig::POR)]);
    }

    #[test]
    fn test_init_ordering_with_mock() {
        let mut seq = Sequence::new();
        let mut mock = MockRegisterBus::new();
        mock.expect_write_byte_data()
            .withf(|r, v| *r == regs::GCONFIG && *v == gconfig::POR)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_write_byte_data()
            .withf(|r, v| *r == regs::fan_ppr(0) && *v == 0x40)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_write_byte_data()
            .withf(|r, _| *r == regs::fan_config1(0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(io::Error::from_raw_os_error(libc::ENXIO)));

        let mut drv = Max6639::with_delay(mock, RecordingDelay::default());
        let err = drv.init(&DeviceConfig::default(), &mut DeviceSnapshot::default()).unwrap_err();
        match err {
            Max6639Error::Bus { register, source, .. } => {
                assert_eq!(register, regs::fan_config1(0));
                assert_eq!(source.raw_os_error(), Some(libc::ENXIO));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_update_decodes_channels() {
        let mut bus = FakeBus::max6639();
        bus.set(regs::STATUS, 0x02);
        bus.set(regs::fan_cnt(0), 30);
        bus.set(regs::temp_ext(0), 0b0110_0000);
        bus.set(regs::temp(0), 45);
        bus.set(regs::fan_cnt(1), 0xFF);
        bus.set(regs::temp_ext(1), 0x01);
        bus.set(regs::temp(1), 0);

        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(bus);
        drv.update(&mut snapshot).unwrap();

        assert_eq!(
            drv.bus().reads(),
            vec![
                regs::STATUS,
                regs::fan_cnt(0),
                regs::temp_ext(0),
                regs::temp(0),
                regs::fan_cnt(1),
                regs::temp_ext(1),
                regs::temp(1),
            ]
        );
        assert_eq!(snapshot.temp_input(Channel::One), 45_375);
        assert!(!snapshot.temp_fault(Channel::One));
        assert_eq!(snapshot.fan_input(Channel::One), 4000);
        assert!(snapshot.temp_fault(Channel::Two));
        assert_eq!(snapshot.fan_input(Channel::Two), 0);
        assert!(!snapshot.alarm(Channel::One));
        assert!(snapshot.alarm(Channel::Two));
    }

    #[test]
    fn test_update_status_failure_reads_nothing_else() {
        let mut bus = FakeBus::max6639();
        bus.fail_read(regs::STATUS);
        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(bus);
        assert!(drv.update(&mut snapshot).is_err());
        assert_eq!(drv.bus().reads(), vec![regs::STATUS]);
        assert_eq!(snapshot, DeviceSnapshot::default());
    }

    #[test]
    fn test_update_keeps_values_read_before_failure() {
        let mut bus = FakeBus::max6639();
        bus.set(regs::STATUS, 0x01);
        bus.set(regs::fan_cnt(0), 60);
        bus.set(regs::temp(0), 30);
        bus.set(regs::fan_cnt(1), 120);
        bus.fail_read(regs::temp(1));

        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(bus);
        let err = drv.update(&mut snapshot).unwrap_err();
        assert_eq!(err.register(), Some(regs::temp(1)));

        assert_eq!(snapshot.status, 0x01);
        assert_eq!(snapshot.temp_input(Channel::One), 30_000);
        assert_eq!(snapshot.fan_count, [60, 120]);
        assert_eq!(snapshot.temp_raw[1], 0);
    }

    #[test]
    fn test_update_keeps_fault_when_temp_read_fails() {
        let mut bus = FakeBus::max6639();
        bus.set(regs::temp_ext(1), 0b1010_0001);
        bus.fail_read(regs::temp(1));

        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(bus);
        assert!(drv.update(&mut snapshot).is_err());

        assert!(snapshot.temp_fault[1]);
        assert_eq!(snapshot.temp_raw[1], 5);
        assert!(snapshot.temp_reading(Channel::Two).fault);
    }

    #[test]
    fn test_read_settings_reloads_caches() {
        let config = DeviceConfig {
            ppr: 3,
            rpm_range: RpmRange::Rpm8000,
            ..DeviceConfig::default()
        };
        let mut written = DeviceSnapshot::default();
        let mut drv = chip(FakeBus::max6639());
        drv.init(&config, &mut written).unwrap();
        drv.set_pwm(&mut written, Channel::Two, 255).unwrap();

        // A second handle on the same register file starts with empty caches
        let mut drv = chip(drv.release());
        let mut fresh = DeviceSnapshot::default();
        drv.read_settings(&mut fresh).unwrap();
        assert_eq!(fresh, written);
        assert_eq!(fresh.ppr(), 3);
    }

    #[test]
    fn test_limit_setters_write_and_cache() {
        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(FakeBus::max6639());

        drv.set_temp_max(&mut snapshot, Channel::One, 75_500).unwrap();
        drv.set_temp_crit(&mut snapshot, Channel::Two, 95_000).unwrap();
        drv.set_temp_emergency(&mut snapshot, Channel::Two, 400_000).unwrap();

        assert_eq!(
            drv.bus().writes(),
            vec![
                (regs::therm_limit(0), 75),
                (regs::alert_limit(1), 95),
                (regs::ot_limit(1), 255),
            ]
        );
        assert_eq!(snapshot.temp_max(Channel::One), 75_000);
        assert_eq!(snapshot.temp_crit(Channel::Two), 95_000);
        assert_eq!(snapshot.temp_emergency(Channel::Two), 255_000);
    }

    #[test]
    fn test_limit_setter_negative_clamps_to_zero() {
        let mut snapshot = DeviceSnapshot::default();
        snapshot.therm_limit = [80, 80];
        let mut drv = chip(FakeBus::max6639());
        drv.set_temp_max(&mut snapshot, Channel::Two, -20_000).unwrap();
        assert_eq!(snapshot.therm_limit, [80, 0]);
    }

    #[test]
    fn test_limit_setter_failure_keeps_cache() {
        let mut bus = FakeBus::max6639();
        bus.fail_write(regs::alert_limit(0));
        let mut snapshot = DeviceSnapshot::default();
        snapshot.alert_limit = [90, 90];
        let mut drv = chip(bus);

        assert!(drv.set_temp_crit(&mut snapshot, Channel::One, 60_000).is_err());
        assert_eq!(snapshot.alert_limit, [90, 90]);
    }

    #[test]
    fn test_set_pwm_scales_to_duty() {
        let mut snapshot = DeviceSnapshot::default();
        let mut drv = chip(FakeBus::max6639());

        drv.set_pwm(&mut snapshot, Channel::One, 255).unwrap();
        assert_eq!(snapshot.duty[0], 120);
        assert_eq!(snapshot.pwm(Channel::One), 255);

        drv.set_pwm(&mut snapshot, Channel::One, 0).unwrap();
        assert_eq!(snapshot.duty[0], 0);

        drv.set_pwm(&mut snapshot, Channel::Two, 128).unwrap();
        assert_eq!(snapshot.duty[1], 60);
        assert_eq!(drv.bus().get(regs::targtduty(1)), 60);
        assert_eq!(snapshot.pwm(Channel::Two), 127);

        drv.set_pwm(&mut snapshot, Channel::Two, 999).unwrap();
        assert_eq!(snapshot.duty[1], 120);
    }

    #[test]
    fn test_set_pwm_failure_keeps_cache() {
        let mut seq = Sequence::new();
        let mut mock = MockRegisterBus::new();
        mock.expect_write_byte_data()
            .withf(|r, v| *r == regs::targtduty(0) && *v == 60)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(eio()));

        let mut snapshot = DeviceSnapshot::default();
        snapshot.duty = [30, 30];
        let mut drv = Max6639::with_delay(mock, RecordingDelay::default());
        assert!(drv.set_pwm(&mut snapshot, Channel::One, 128).is_err());
        assert_eq!(snapshot.duty, [30, 30]);
    }

    #[test]
    fn test_suspend_resume_only_touch_standby() {
        let mut bus = FakeBus::max6639();
        bus.set(regs::GCONFIG, gconfig::MONITOR);
        let mut drv = chip(bus);

        drv.suspend().unwrap();
        assert_eq!(drv.bus().get(regs::GCONFIG), gconfig::MONITOR | gconfig::STANDBY);
        drv.resume().unwrap();
        assert_eq!(drv.bus().get(regs::GCONFIG), gconfig::MONITOR);
    }

    #[test]
    fn test_suspend_resume_idempotent() {
        let mut bus = FakeBus::max6639();
        bus.set(regs::GCONFIG, 0x18 | gconfig::STANDBY);
        let mut drv = chip(bus);

        drv.suspend().unwrap();
        assert_eq!(drv.bus().get(regs::GCONFIG), 0x98);
        drv.resume().unwrap();
        drv.resume().unwrap();
        assert_eq!(drv.bus().get(regs::GCONFIG), 0x18);
    }

    #[test]
    fn test_suspend_read_failure_does_not_write() {
        let mut mock = MockRegisterBus::new();
        mock.expect_read_byte_data()
            .withf(|r| *r == regs::GCONFIG)
            .times(1)
            .returning(|_| Err(eio()));
        mock.expect_write_byte_data().never();

        let mut drv = Max6639::with_delay(mock, RecordingDelay::default());
        let err = drv.suspend().unwrap_err();
        assert!(err.is_bus_error());
    }

    #[test]
    fn test_dump_registers_marks_failed_reads() {
        let mut bus = FakeBus::max6639();
        bus.fail_read(0x30);
        let mut drv = chip(bus);
        let dump = drv.dump_registers();
        assert_eq!(dump.get(regs::DEVID), Some(0x58));
        assert_eq!(dump.get(0x30), None);
        assert_eq!(dump.failed_reads(), 1);
        assert_eq!(drv.bus().reads().len(), REGISTER_SPACE);
    }

    #[test]
    fn test_temp_limit_registers() {
        assert_eq!(TempLimit::Max.register(Channel::Two), 0x0D);
        assert_eq!(TempLimit::Crit.register(Channel::One), 0x08);
        assert_eq!(TempLimit::Emergency.register(Channel::Two), 0x0B);
    }
}
