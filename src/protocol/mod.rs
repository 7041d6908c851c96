//! NTP wire protocol
//!
//! The 48-byte client/server header, its fixed-point fields, and the
//! symmetric offset formula applied to a reply.

pub mod codec;
pub mod message;

pub use self::codec::NtpCodec;
pub use self::message::{
    clock_offset, leap_of, pack_flags, LeapIndicator, Mode, NtpPacket, NtpShort, NtpTimestamp,
};

/// Size of an NTP header without extension fields
pub const PACKET_SIZE: usize = 48;

/// Receive buffer size; room for a header plus extension fields we ignore
pub const MAX_DATAGRAM_SIZE: usize = 1024;
