use std::fmt;
use std::time::SystemTime;

use crate::time;

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch
pub const EPOCH_DELTA: u64 = 0x83aa_7e80;

/// 16.16 fixed-point seconds, used for root delay and root dispersion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NtpShort(pub u32);

impl NtpShort {
    /// Builds a value from its integer and fractional halves
    pub fn from_parts(seconds: u16, fraction: u16) -> Self {
        NtpShort((seconds as u32) << 16 | fraction as u32)
    }

    /// Integer half
    pub fn seconds(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Fractional half, in units of 1/65536 s
    pub fn fraction(&self) -> u16 {
        self.0 as u16
    }

    /// Converts to seconds
    pub fn to_secs(&self) -> f64 {
        self.seconds() as f64 + self.fraction() as f64 / 65536.0
    }

    /// Converts from seconds, rounding to the nearest 1/65536 s.
    ///
    /// Values outside `[0, 65536)` saturate.
    pub fn from_secs(secs: f64) -> Self {
        let units = (secs * 65536.0).round();
        NtpShort(units.clamp(0.0, u32::MAX as f64) as u32)
    }
}

/// 32.32 fixed-point timestamp with the NTP epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NtpTimestamp(pub u64);

impl NtpTimestamp {
    /// The "not set" timestamp
    pub const ZERO: NtpTimestamp = NtpTimestamp(0);

    /// Builds a timestamp from seconds since 1900 and a 2^-32 fraction
    pub fn from_parts(seconds: u32, fraction: u32) -> Self {
        NtpTimestamp((seconds as u64) << 32 | fraction as u64)
    }

    /// Seconds since 1900
    pub fn seconds(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Fractional half, in units of 2^-32 s
    pub fn fraction(&self) -> u32 {
        self.0 as u32
    }

    /// Whether the timestamp is unset
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Converts to seconds since the Unix epoch. An unset timestamp is 0.0.
    pub fn to_unix_secs(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        (self.seconds() as f64 - EPOCH_DELTA as f64) + self.fraction() as f64 / 4_294_967_296.0
    }

    /// Converts from seconds since the Unix epoch, rounding the fraction to
    /// the nearest 2^-32 s. 0.0 maps to the unset timestamp.
    pub fn from_unix_secs(secs: f64) -> Self {
        if secs == 0.0 {
            return NtpTimestamp::ZERO;
        }
        let whole = secs.floor();
        let mut seconds = (whole as i64 + EPOCH_DELTA as i64) as u64;
        let mut fraction = ((secs - whole) * 4_294_967_296.0).round() as u64;
        if fraction > u32::MAX as u64 {
            seconds += 1;
            fraction = 0;
        }
        NtpTimestamp::from_parts(seconds as u32, fraction as u32)
    }

    /// Converts a wall-clock reading
    pub fn from_system_time(time: SystemTime) -> Self {
        NtpTimestamp::from_unix_secs(time::system_time_to_secs(time))
    }
}

impl fmt::Display for NtpTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.to_unix_secs();
        match time::secs_to_datetime(secs) {
            Some(dt) if !self.is_zero() => write!(f, "{:.6} ({})", secs, dt.to_rfc3339()),
            _ => write!(f, "{:.6}", secs),
        }
    }
}

/// Leap indicator, the top two bits of the flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeapIndicator {
    /// No warning
    NoWarning,
    /// Last minute of the day has 61 seconds
    InsertSecond,
    /// Last minute of the day has 59 seconds
    DeleteSecond,
    /// Clock not synchronized
    Alarm,
}

impl LeapIndicator {
    /// Decodes the two-bit field
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => LeapIndicator::NoWarning,
            1 => LeapIndicator::InsertSecond,
            2 => LeapIndicator::DeleteSecond,
            _ => LeapIndicator::Alarm,
        }
    }

    /// Encodes the two-bit field
    pub fn bits(&self) -> u8 {
        match self {
            LeapIndicator::NoWarning => 0,
            LeapIndicator::InsertSecond => 1,
            LeapIndicator::DeleteSecond => 2,
            LeapIndicator::Alarm => 3,
        }
    }
}

/// Association mode, the low three bits of the flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Reserved,
    SymmetricActive,
    SymmetricPassive,
    Client,
    Server,
    Broadcast,
    Control,
    Private,
}

impl Mode {
    /// Decodes the three-bit field
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Mode::Reserved,
            1 => Mode::SymmetricActive,
            2 => Mode::SymmetricPassive,
            3 => Mode::Client,
            4 => Mode::Server,
            5 => Mode::Broadcast,
            6 => Mode::Control,
            _ => Mode::Private,
        }
    }

    /// Encodes the three-bit field
    pub fn bits(&self) -> u8 {
        match self {
            Mode::Reserved => 0,
            Mode::SymmetricActive => 1,
            Mode::SymmetricPassive => 2,
            Mode::Client => 3,
            Mode::Server => 4,
            Mode::Broadcast => 5,
            Mode::Control => 6,
            Mode::Private => 7,
        }
    }
}

/// Packs leap indicator, version and mode into the flags byte
pub fn pack_flags(leap: LeapIndicator, version: u8, mode: Mode) -> u8 {
    leap.bits() << 6 | (version & 0x07) << 3 | mode.bits()
}

/// Leap indicator stored in a flags byte
pub fn leap_of(flags: u8) -> LeapIndicator {
    LeapIndicator::from_bits(flags >> 6)
}

/// NTP packet header, 48 bytes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NtpPacket {
    /// Leap indicator, version and mode
    pub flags: u8,
    /// Distance from the reference clock; 0 is unspecified
    pub stratum: u8,
    /// Poll interval exponent (log2 seconds)
    pub poll: i8,
    /// Clock precision exponent (log2 seconds)
    pub precision: i8,
    /// Round-trip delay to the reference source
    pub root_delay: NtpShort,
    /// Maximum error relative to the reference source
    pub root_dispersion: NtpShort,
    /// Reference source identifier
    pub reference_id: u32,
    /// Time the server clock was last set
    pub reference: NtpTimestamp,
    /// Client transmit time echoed by the server
    pub origin: NtpTimestamp,
    /// Time the request arrived at the server
    pub receive: NtpTimestamp,
    /// Time the reply left the server
    pub transmit: NtpTimestamp,
}

impl NtpPacket {
    /// Builds a client request stamped with `now`.
    ///
    /// The request advertises an unsynchronized clock, poll 2^4 s, precision
    /// 2^-6 s and one second of root delay and dispersion.
    pub fn client_request(now: SystemTime) -> Self {
        NtpPacket {
            flags: pack_flags(LeapIndicator::Alarm, crate::core::NTP_VERSION, Mode::Client),
            poll: 4,
            precision: -6,
            root_delay: NtpShort::from_parts(1, 0),
            root_dispersion: NtpShort::from_parts(1, 0),
            transmit: NtpTimestamp::from_system_time(now),
            ..Default::default()
        }
    }

    /// Leap indicator carried in the flags byte
    pub fn leap(&self) -> LeapIndicator {
        leap_of(self.flags)
    }

    /// Protocol version carried in the flags byte
    pub fn version(&self) -> u8 {
        (self.flags >> 3) & 0x07
    }

    /// Association mode carried in the flags byte
    pub fn mode(&self) -> Mode {
        Mode::from_bits(self.flags)
    }
}

impl fmt::Display for NtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "packet contents:")?;
        writeln!(f, "\tflags: 0x{:02x}", self.flags)?;
        writeln!(f, "\t  li={} (0x{:02x})", self.leap().bits(), self.flags & 0xc0)?;
        writeln!(f, "\t  vn={} (0x{:02x})", self.version(), self.flags & 0x38)?;
        writeln!(f, "\t  mode={} (0x{:02x})", self.mode().bits(), self.flags & 0x07)?;
        writeln!(f, "\tstratum = {}", self.stratum)?;
        writeln!(f, "\tpoll = {}", 2f64.powi(self.poll as i32))?;
        writeln!(f, "\tprecision = {}", 2f64.powi(self.precision as i32))?;
        writeln!(f, "\trtdelay = {}", self.root_delay.to_secs())?;
        writeln!(f, "\trtdisp = {}", self.root_dispersion.to_secs())?;
        writeln!(f, "\trefid = {:x}", self.reference_id)?;
        writeln!(f, "\trefts = {}", self.reference)?;
        writeln!(f, "\torigts = {}", self.origin)?;
        writeln!(f, "\trxts = {}", self.receive)?;
        write!(f, "\ttxts = {}", self.transmit)
    }
}

/// Offset of the local clock against the server that sent `reply`.
///
/// `local_receive` is the local arrival time in Unix seconds. Positive means
/// the local clock is behind the server.
pub fn clock_offset(reply: &NtpPacket, local_receive: f64) -> f64 {
    let client_tx = reply.origin.to_unix_secs();
    let peer_rx = reply.receive.to_unix_secs();
    let peer_tx = reply.transmit.to_unix_secs();
    ((peer_tx - local_receive) + (peer_rx - client_tx)) / 2.0
}
