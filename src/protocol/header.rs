//! The fixed request/reply header.
//!
//! Requests and replies share one 56-byte layout; they differ only in which
//! fields are meaningful. Multi-byte fields are big-endian on the wire.

use crate::error::{Error, Result};
use crate::protocol::constants::*;

/// The fixed-size frame header.
///
/// `packet_size` counts the bytes that follow the header, inclusive of the
/// 16-byte IV when the payload is encrypted. `rows`, `cols` and `index` are
/// only meaningful on cursor replies; `error_code` only on replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub signature: u32,
    pub packet_size: u32,
    pub command: u8,
    pub selector: u8,
    pub flag1: u8,
    pub flag2: u8,
    pub flag3: u8,
    pub encrypted: u8,
    pub num_fields: u32,
    pub error_code: u16,
    pub reserved1: u16,
    pub reserved2: u16,
    pub expanded_size: u32,
    pub timeout: u32,
    pub rows: u32,
    pub cols: u32,
    pub index: u32,
    pub protocol_version: u8,
}

impl Header {
    /// Serialize into the fixed wire representation.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.signature.to_be_bytes());
        buf[4..8].copy_from_slice(&self.packet_size.to_be_bytes());
        buf[8] = self.command;
        buf[9] = self.selector;
        buf[10] = self.flag1;
        buf[11] = self.flag2;
        buf[12] = self.flag3;
        buf[13] = self.encrypted;
        buf[14..18].copy_from_slice(&self.num_fields.to_be_bytes());
        buf[18..20].copy_from_slice(&self.error_code.to_be_bytes());
        buf[20..22].copy_from_slice(&self.reserved1.to_be_bytes());
        buf[22..24].copy_from_slice(&self.reserved2.to_be_bytes());
        buf[24..28].copy_from_slice(&self.expanded_size.to_be_bytes());
        buf[28..32].copy_from_slice(&self.timeout.to_be_bytes());
        buf[32..36].copy_from_slice(&self.rows.to_be_bytes());
        buf[36..40].copy_from_slice(&self.cols.to_be_bytes());
        buf[40..44].copy_from_slice(&self.index.to_be_bytes());
        buf[44] = self.protocol_version;
        buf
    }

    /// Parse a header from its wire representation, checking the magic.
    pub fn parse(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        let signature = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if signature != PROTOCOL_SIGNATURE {
            return Err(Error::WrongSignature);
        }
        Ok(Self {
            signature,
            packet_size: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            command: buf[8],
            selector: buf[9],
            flag1: buf[10],
            flag2: buf[11],
            flag3: buf[12],
            encrypted: buf[13],
            num_fields: u32::from_be_bytes([buf[14], buf[15], buf[16], buf[17]]),
            error_code: u16::from_be_bytes([buf[18], buf[19]]),
            reserved1: u16::from_be_bytes([buf[20], buf[21]]),
            reserved2: u16::from_be_bytes([buf[22], buf[23]]),
            expanded_size: u32::from_be_bytes([buf[24], buf[25], buf[26], buf[27]]),
            timeout: u32::from_be_bytes([buf[28], buf[29], buf[30], buf[31]]),
            rows: u32::from_be_bytes([buf[32], buf[33], buf[34], buf[35]]),
            cols: u32::from_be_bytes([buf[36], buf[37], buf[38], buf[39]]),
            index: u32::from_be_bytes([buf[40], buf[41], buf[42], buf[43]]),
            protocol_version: buf[44],
        })
    }

    /// Test a `flag1` bit.
    pub fn has_flag1(&self, bit: u8) -> bool {
        self.flag1 & bit != 0
    }

    /// Set a `flag1` bit.
    pub fn set_flag1(&mut self, bit: u8) {
        self.flag1 |= bit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(command: u8) -> Header {
        Header {
            signature: PROTOCOL_SIGNATURE,
            packet_size: 0x0102_0304,
            command,
            selector: BIND_STEP,
            flag1: CLIENT_SUPPORT_COMPRESSION | CLIENT_PARTIAL_PACKET,
            flag2: 0,
            flag3: BIND_TEXT,
            encrypted: ENCRYPTION_AES192,
            num_fields: 3,
            error_code: 0xBEEF,
            reserved1: 0x1234,
            reserved2: 0x5678,
            expanded_size: 0xAABB_CCDD,
            timeout: 12,
            rows: 100,
            cols: 4,
            index: 7,
            protocol_version: PROTOCOL_2011,
        }
    }

    #[test]
    fn round_trip_every_command() {
        for command in ALL_COMMANDS {
            let header = sample(command);
            let wire = header.to_bytes();
            let back = Header::parse(&wire).unwrap();
            assert_eq!(header, back, "command {command}");
        }
    }

    #[test]
    fn multibyte_fields_are_big_endian() {
        let wire = sample(COMMAND_EXECUTE).to_bytes();
        assert_eq!(&wire[0..4], &[0x43, 0x55, 0x42, 0x45]);
        assert_eq!(&wire[4..8], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&wire[18..20], &[0xBE, 0xEF]);
        assert_eq!(&wire[24..28], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&wire[32..36], &[0x00, 0x00, 0x00, 0x64]);
    }

    #[test]
    fn padding_is_zero() {
        let wire = sample(COMMAND_SELECT).to_bytes();
        assert!(wire[45..].iter().all(|&b| b == 0));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut wire = sample(COMMAND_EXECUTE).to_bytes();
        wire[0] ^= 0xFF;
        assert!(matches!(Header::parse(&wire), Err(Error::WrongSignature)));
    }
}
