// iRobot Create Open Interface serial protocol implementation
//
// Commands are a single opcode byte followed by data bytes; 16-bit
// values are big-endian two's complement. There is no checksum and no
// acknowledgement except for sensor queries.
//
//   Drive:        [137, vel_hi, vel_lo, radius_hi, radius_lo]
//   Drive Direct: [145, right_hi, right_lo, left_hi, left_lo]

use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::motion::Direction;
use crate::robot::Hardware;

/// Default serial configuration for a Create base
pub const DEFAULT_BAUDRATE: u32 = 57_600;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Opcode set (subset used for driving)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    Start = 128,
    Safe = 131,
    Drive = 137,
    Sensors = 142,
    DriveDirect = 145,
    Stop = 173,
}

/// Sensor packet ids used by the driver
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum SensorPacket {
    OiMode = 35,
}

/// Open Interface operating modes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OiMode {
    Off = 0,
    Passive = 1,
    Safe = 2,
    Full = 3,
}

impl TryFrom<u8> for OiMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(OiMode::Off),
            1 => Ok(OiMode::Passive),
            2 => Ok(OiMode::Safe),
            3 => Ok(OiMode::Full),
            other => Err(Error::Hardware(format!("unknown OI mode {other}"))),
        }
    }
}

/// Byte stream to the base (a serial port, or a buffer in tests)
pub trait Port: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Port for T {}

/// Create base driven over the Open Interface
pub struct CreateBase {
    port: Box<dyn Port>,
}

impl CreateBase {
    /// Open a new connection to the base
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening Create base on {} at {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self::from_port(Box::new(port)))
    }

    pub fn from_port(port: Box<dyn Port>) -> Self {
        Self { port }
    }

    /// Enter Safe mode and confirm the base answers
    ///
    /// This must be called before sending drive commands.
    pub fn initialize(&mut self) -> Result<()> {
        self.send(&[Opcode::Start as u8])?;
        self.send(&[Opcode::Safe as u8])?;
        let mode = self.oi_mode()?;
        if mode != OiMode::Safe && mode != OiMode::Full {
            return Err(Error::Hardware(format!("base stayed in {mode:?} mode")));
        }
        info!("Create base ready in {:?} mode", mode);
        Ok(())
    }

    /// Query the current Open Interface mode
    pub fn oi_mode(&mut self) -> Result<OiMode> {
        self.send(&[Opcode::Sensors as u8, SensorPacket::OiMode as u8])?;
        let mut byte = [0u8; 1];
        self.port.read_exact(&mut byte).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                Error::Hardware("timeout waiting for Create sensor reply".to_string())
            } else {
                Error::Io(e)
            }
        })?;
        OiMode::try_from(byte[0])
    }

    /// Build a Drive packet (speed along a radius)
    fn drive_packet(speed: i16, radius: i16) -> [u8; 5] {
        let [v_hi, v_lo] = speed.to_be_bytes();
        let [r_hi, r_lo] = radius.to_be_bytes();
        [Opcode::Drive as u8, v_hi, v_lo, r_hi, r_lo]
    }

    /// Build a Drive Direct packet; the right wheel comes first on the wire
    fn drive_direct_packet(left: i16, right: i16) -> [u8; 5] {
        let [r_hi, r_lo] = right.to_be_bytes();
        let [l_hi, l_lo] = left.to_be_bytes();
        [Opcode::DriveDirect as u8, r_hi, r_lo, l_hi, l_lo]
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }
}

impl Hardware for CreateBase {
    fn set_velocities(&mut self, left: i16, right: i16) -> Result<()> {
        debug!("Drive direct: left={}, right={}", left, right);
        self.send(&Self::drive_direct_packet(left, right))
    }

    fn drive_curve(&mut self, speed: i16, radius: i16) -> Result<()> {
        debug!("Drive: speed={}, radius={}", speed, radius);
        self.send(&Self::drive_packet(speed, radius))
    }

    fn stop(&mut self) -> Result<()> {
        self.send(&Self::drive_direct_packet(0, 0))
    }

    fn read_distance(&mut self, direction: Direction) -> Result<f32> {
        // The base has no sonars; see `hardware::sonar`
        Err(Error::SensorUnavailable { direction })
    }

    /// Re-enter Safe mode with the wheels stopped
    fn reset(&mut self) -> Result<()> {
        self.send(&Self::drive_direct_packet(0, 0))?;
        self.send(&[Opcode::Start as u8])?;
        self.send(&[Opcode::Safe as u8])
    }

    /// Leave the Open Interface; the base returns to Off mode
    fn close(&mut self) -> Result<()> {
        info!("Closing Create base connection");
        self.send(&[Opcode::Stop as u8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Loopback port: scripted replies in, written bytes captured
    #[derive(Clone, Default)]
    struct FakePort {
        written: Arc<Mutex<Vec<u8>>>,
        replies: Arc<Mutex<Cursor<Vec<u8>>>>,
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.replies.lock().unwrap().read(buf)
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn base_with_replies(replies: &[u8]) -> (CreateBase, FakePort) {
        let port = FakePort::default();
        *port.replies.lock().unwrap() = Cursor::new(replies.to_vec());
        (CreateBase::from_port(Box::new(port.clone())), port)
    }

    #[test]
    fn test_drive_direct_packet_is_right_then_left() {
        let packet = CreateBase::drive_direct_packet(-400, 400);
        // right = 400 = 0x0190, left = -400 = 0xFE70
        assert_eq!(packet, [145, 0x01, 0x90, 0xFE, 0x70]);
    }

    #[test]
    fn test_drive_packet_encodes_radius() {
        let packet = CreateBase::drive_packet(500, -417);
        // 500 = 0x01F4, -417 = 0xFE5F
        assert_eq!(packet, [137, 0x01, 0xF4, 0xFE, 0x5F]);
    }

    #[test]
    fn test_initialize_enters_safe_mode() {
        let (mut base, port) = base_with_replies(&[OiMode::Safe as u8]);
        base.initialize().unwrap();
        assert_eq!(*port.written.lock().unwrap(), vec![128, 131, 142, 35]);
    }

    #[test]
    fn test_initialize_rejects_passive_base() {
        let (mut base, _port) = base_with_replies(&[OiMode::Passive as u8]);
        assert!(matches!(base.initialize(), Err(Error::Hardware(_))));
    }

    #[test]
    fn test_silent_base_is_an_error() {
        let (mut base, _port) = base_with_replies(&[]);
        assert!(base.initialize().is_err());
    }

    #[test]
    fn test_stop_reset_close_bytes() {
        let (mut base, port) = base_with_replies(&[]);
        base.stop().unwrap();
        base.reset().unwrap();
        base.close().unwrap();
        assert_eq!(
            *port.written.lock().unwrap(),
            vec![145, 0, 0, 0, 0, 145, 0, 0, 0, 0, 128, 131, 173]
        );
    }

    #[test]
    fn test_base_has_no_sonar() {
        let (mut base, _port) = base_with_replies(&[]);
        assert!(matches!(
            base.read_distance(Direction::Forward),
            Err(Error::SensorUnavailable { .. })
        ));
    }
}
