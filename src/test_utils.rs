/*
 * Test utilities and fake hardware for max6639-tools
 *
 * An in-memory register file standing in for the chip, a delay that records
 * instead of sleeping, and a few file helpers shared by the unit tests.
 */

#[cfg(test)]
pub mod test_utils {
    use crate::bus::RegisterBus;
    use crate::registers::{identity, regs, REGISTER_SPACE};
    use embedded_hal::delay::DelayNs;
    use std::collections::HashSet;
    use std::io::{self, Write};
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// 64-byte register file with per-register fault injection.
    ///
    /// Every attempted access is recorded, including ones that fail. Failed
    /// writes do not change the register file.
    #[derive(Debug, Clone)]
    pub struct FakeBus {
        regs: [u8; REGISTER_SPACE],
        fail_reads: HashSet<u8>,
        fail_writes: HashSet<u8>,
        reads: Vec<u8>,
        writes: Vec<(u8, u8)>,
    }

    impl Default for FakeBus {
        fn default() -> Self {
            Self {
                regs: [0; REGISTER_SPACE],
                fail_reads: HashSet::new(),
                fail_writes: HashSet::new(),
                reads: Vec::new(),
                writes: Vec::new(),
            }
        }
    }

    impl FakeBus {
        /// A register file answering with the MAX6639 identity
        pub fn max6639() -> Self {
            let mut bus = Self::default();
            bus.set(regs::DEVID, identity::DEVICE_ID);
            bus.set(regs::MANUID, identity::MANUFACTURER_ID);
            bus
        }

        pub fn set(&mut self, register: u8, value: u8) {
            self.regs[register as usize] = value;
        }

        pub fn get(&self, register: u8) -> u8 {
            self.regs[register as usize]
        }

        pub fn fail_read(&mut self, register: u8) {
            self.fail_reads.insert(register);
        }

        pub fn fail_write(&mut self, register: u8) {
            self.fail_writes.insert(register);
        }

        pub fn reads(&self) -> Vec<u8> {
            self.reads.clone()
        }

        pub fn writes(&self) -> Vec<(u8, u8)> {
            self.writes.clone()
        }
    }

    impl RegisterBus for FakeBus {
        fn read_byte_data(&mut self, register: u8) -> io::Result<u8> {
            self.reads.push(register);
            if self.fail_reads.contains(&register) || register as usize >= REGISTER_SPACE {
                return Err(io::Error::from_raw_os_error(libc::EIO));
            }
            Ok(self.regs[register as usize])
        }

        fn write_byte_data(&mut self, register: u8, value: u8) -> io::Result<()> {
            self.writes.push((register, value));
            if self.fail_writes.contains(&register) || register as usize >= REGISTER_SPACE {
                return Err(io::Error::from_raw_os_error(libc::EIO));
            }
            self.regs[register as usize] = value;
            Ok(())
        }
    }

    /// Records requested delays without sleeping
    #[derive(Debug, Default, Clone)]
    pub struct RecordingDelay {
        pub calls: Vec<Duration>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.calls.push(Duration::from_nanos(ns.into()));
        }

        fn delay_ms(&mut self, ms: u32) {
            self.calls.push(Duration::from_millis(ms.into()));
        }
    }

    /// Write `content` to a temporary file that lives as long as the handle
    pub fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes()).expect("Failed to write temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    pub fn assert_contains<T: PartialEq + std::fmt::Debug>(slice: &[T], item: &T) {
        assert!(
            slice.contains(item),
            "Expected slice {:?} to contain {:?}",
            slice,
            item
        );
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_fake_bus_identity() {
            let mut bus = FakeBus::max6639();
            assert_eq!(bus.read_byte_data(regs::DEVID).unwrap(), 0x58);
            assert_eq!(bus.read_byte_data(regs::MANUID).unwrap(), 0x4D);
            assert_eq!(bus.reads(), vec![regs::DEVID, regs::MANUID]);
        }

        #[test]
        fn test_fake_bus_fault_injection() {
            let mut bus = FakeBus::default();
            bus.fail_write(regs::GCONFIG);
            assert!(bus.write_byte_data(regs::GCONFIG, 0x40).is_err());
            assert_eq!(bus.get(regs::GCONFIG), 0);
            assert_contains(&bus.writes(), &(regs::GCONFIG, 0x40));

            assert!(bus.read_byte_data(0x40).is_err());
        }

        #[test]
        fn test_recording_delay() {
            let mut delay = RecordingDelay::default();
            delay.delay_ms(5);
            delay.delay_ns(250);
            assert_eq!(delay.calls, vec![Duration::from_millis(5), Duration::from_nanos(250)]);
        }
    }
}
