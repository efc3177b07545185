//! Outbound wire protocol.
//!
//! Two packed little-endian frames, no framing header:
//!
//! ```text
//! Quality:   'Q' | from: u64 | to: u64 | quality: f32    (21 bytes)
//! Heartbeat: 'H'                                          (1 byte)
//! ```
//!
//! `quality` is the square root of the path quality, which spreads the
//! multiplicative scale back out for display.

use thiserror::Error;

pub const QUALITY_TAG: u8 = b'Q';
pub const HEARTBEAT_TAG: u8 = b'H';
pub const QUALITY_PACKET_LEN: usize = 21;
pub const HEARTBEAT_PACKET_LEN: usize = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty frame")]
    Empty,
    
    #[error("Unknown packet tag 0x{0:02x}")]
    UnknownTag(u8),
    
    #[error("Truncated packet: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// One frame on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    /// Link quality from `from` (agent or marker) as heard by agent `to`
    Quality { from: u64, to: u64, quality: f32 },
    /// Liveness ping
    Heartbeat,
}

impl Packet {
    /// Quality packet for a raw path quality in [0, 1].
    pub fn quality(from: u64, to: u64, path_quality: f64) -> Self {
        Packet::Quality {
            from,
            to,
            quality: path_quality.max(0.0).sqrt() as f32,
        }
    }
    
    pub fn encoded_len(&self) -> usize {
        match self {
            Packet::Quality { .. } => QUALITY_PACKET_LEN,
            Packet::Heartbeat => HEARTBEAT_PACKET_LEN,
        }
    }
    
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        match self {
            Packet::Quality { from, to, quality } => {
                buf.push(QUALITY_TAG);
                buf.extend_from_slice(&from.to_le_bytes());
                buf.extend_from_slice(&to.to_le_bytes());
                buf.extend_from_slice(&quality.to_le_bytes());
            }
            Packet::Heartbeat => buf.push(HEARTBEAT_TAG),
        }
        buf
    }
    
    /// Decodes the packet at the start of `bytes`.
    ///
    /// Returns the packet and the number of bytes it used.
    pub fn decode(bytes: &[u8]) -> Result<(Packet, usize), ProtocolError> {
        let tag = *bytes.first().ok_or(ProtocolError::Empty)?;
        match tag {
            HEARTBEAT_TAG => Ok((Packet::Heartbeat, HEARTBEAT_PACKET_LEN)),
            QUALITY_TAG => {
                if bytes.len() < QUALITY_PACKET_LEN {
                    return Err(ProtocolError::Truncated {
                        expected: QUALITY_PACKET_LEN,
                        actual: bytes.len(),
                    });
                }
                let mut u64_buf = [0u8; 8];
                u64_buf.copy_from_slice(&bytes[1..9]);
                let from = u64::from_le_bytes(u64_buf);
                u64_buf.copy_from_slice(&bytes[9..17]);
                let to = u64::from_le_bytes(u64_buf);
                let mut f32_buf = [0u8; 4];
                f32_buf.copy_from_slice(&bytes[17..21]);
                let quality = f32::from_le_bytes(f32_buf);
                Ok((Packet::Quality { from, to, quality }, QUALITY_PACKET_LEN))
            }
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
    
    /// Decodes back-to-back packets, as read from a listener socket.
    pub fn decode_stream(mut bytes: &[u8]) -> Result<Vec<Packet>, ProtocolError> {
        let mut packets = Vec::new();
        while !bytes.is_empty() {
            let (packet, used) = Packet::decode(bytes)?;
            packets.push(packet);
            bytes = &bytes[used..];
        }
        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_quality_packet_layout() {
        let frame = Packet::Quality { from: 0x0102, to: 7, quality: 0.5 }.encode();
        
        assert_eq!(frame.len(), QUALITY_PACKET_LEN);
        assert_eq!(frame[0], b'Q');
        assert_eq!(&frame[1..9], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&frame[9..17], &[7, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&frame[17..21], &0.5f32.to_le_bytes());
    }
    
    #[test]
    fn test_heartbeat_is_single_byte() {
        assert_eq!(Packet::Heartbeat.encode(), vec![b'H']);
    }
    
    #[test]
    fn test_quality_constructor_takes_square_root() {
        match Packet::quality(1, 2, 0.81) {
            Packet::Quality { quality, .. } => assert!((quality - 0.9).abs() < 1e-6),
            Packet::Heartbeat => panic!("expected quality packet"),
        }
        match Packet::quality(1, 2, 0.0) {
            Packet::Quality { quality, .. } => assert_eq!(quality, 0.0),
            Packet::Heartbeat => panic!("expected quality packet"),
        }
    }
    
    #[test]
    fn test_decode_stream_of_mixed_packets() {
        let mut bytes = Packet::Heartbeat.encode();
        bytes.extend(Packet::quality(u64::MAX, 3, 0.25).encode());
        bytes.extend(Packet::Heartbeat.encode());
        
        let packets = Packet::decode_stream(&bytes).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[1], Packet::Quality { from: u64::MAX, to: 3, quality: 0.5 });
    }
    
    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert_eq!(Packet::decode(&[]), Err(ProtocolError::Empty));
        assert_eq!(Packet::decode(&[b'X']), Err(ProtocolError::UnknownTag(b'X')));
        
        let frame = Packet::quality(1, 2, 1.0).encode();
        assert_eq!(
            Packet::decode(&frame[..10]),
            Err(ProtocolError::Truncated { expected: 21, actual: 10 })
        );
    }
}
