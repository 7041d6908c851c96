use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::{NtpPacket, NtpShort, NtpTimestamp};
use super::PACKET_SIZE;
use crate::core::Error;

/// Codec for the fixed 48-byte NTP header
#[derive(Clone, Copy, Debug, Default)]
pub struct NtpCodec;

impl NtpCodec {
    /// Creates a new packet codec
    pub fn new() -> Self {
        NtpCodec
    }

    /// Decodes one datagram. Returns `None` for a truncated datagram.
    pub fn decode_datagram(&mut self, datagram: &[u8]) -> Option<NtpPacket> {
        let mut buf = BytesMut::from(datagram);
        // Decoding a header cannot fail once the length check passed
        self.decode(&mut buf).ok().flatten()
    }

    /// Encodes a packet into a fresh 48-byte buffer
    pub fn encode_packet(&mut self, packet: NtpPacket) -> BytesMut {
        let mut buf = BytesMut::with_capacity(PACKET_SIZE);
        put_packet(&packet, &mut buf);
        buf
    }
}

fn put_packet(packet: &NtpPacket, dst: &mut BytesMut) {
    dst.reserve(PACKET_SIZE);
    dst.put_u8(packet.flags);
    dst.put_u8(packet.stratum);
    dst.put_i8(packet.poll);
    dst.put_i8(packet.precision);
    dst.put_u32(packet.root_delay.0);
    dst.put_u32(packet.root_dispersion.0);
    dst.put_u32(packet.reference_id);
    dst.put_u64(packet.reference.0);
    dst.put_u64(packet.origin.0);
    dst.put_u64(packet.receive.0);
    dst.put_u64(packet.transmit.0);
}

impl Decoder for NtpCodec {
    type Item = NtpPacket;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PACKET_SIZE {
            // Short datagram, never a valid header
            return Ok(None);
        }

        let packet = NtpPacket {
            flags: src.get_u8(),
            stratum: src.get_u8(),
            poll: src.get_i8(),
            precision: src.get_i8(),
            root_delay: NtpShort(src.get_u32()),
            root_dispersion: NtpShort(src.get_u32()),
            reference_id: src.get_u32(),
            reference: NtpTimestamp(src.get_u64()),
            origin: NtpTimestamp(src.get_u64()),
            receive: NtpTimestamp(src.get_u64()),
            transmit: NtpTimestamp(src.get_u64()),
        };

        // Extension fields and MACs are not interpreted
        src.clear();

        Ok(Some(packet))
    }
}

impl Encoder<NtpPacket> for NtpCodec {
    type Error = Error;

    fn encode(&mut self, item: NtpPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_packet(&item, dst);
        Ok(())
    }
}
