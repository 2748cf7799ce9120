// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framings for the two representative hardware protocols.
//!
//! `CanAsciiCodec`: CAN frames over ASCII, `:S<sid>N<data>;`. The standard
//! id packs major/minor priority and a 7-bit CAN id. The reader tolerates
//! garbage before the start marker and counts dropped bytes.
//!
//! `ChecksumCodec`: length-prefixed binary frames with a header byte (data
//! size, jumbo extension for 8..39 byte payloads, hold/fault/toggle flags)
//! and a trailing checksum `0x80 | (~sum + 1) & 0x7F`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub const CAN_DATA_MAX: usize = 8;
/// `:SXXXXNXXXXXXXXXXXXXXXX;`
pub const CAN_FRAME_MAX: usize = 24;

/// Opcodes of the ASCII protocol, first data byte of each frame.
pub mod opcode {
    pub const TRACK_OFF: u8 = 0x08;
    pub const TRACK_ON: u8 = 0x09;
    pub const EMERGENCY_STOP: u8 = 0x0A;
    pub const REQUEST_VERSION: u8 = 0x0C;
    pub const VERSION_REPLY: u8 = 0xE2;
    pub const LOCO_SPEED: u8 = 0x47;
    pub const ACCESSORY: u8 = 0x90;
    pub const SENSOR: u8 = 0x98;
    pub const DCC_PACKET: u8 = 0xA0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MajorPriority {
    High = 0,
    AboveNormal = 1,
    Normal = 2,
    #[default]
    Lowest = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MinorPriority {
    High = 0,
    AboveNormal = 1,
    #[default]
    Normal = 2,
    Low = 3,
}

/// One CAN frame: a 7-bit sender id plus up to eight data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub can_id: u8,
    pub data: Vec<u8>,
}

impl CanFrame {
    pub fn new(can_id: u8, data: &[u8]) -> Self {
        Self { can_id: can_id & 0x7F, data: data[..data.len().min(CAN_DATA_MAX)].to_vec() }
    }

    pub fn opcode(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Standard id field: `major(2) | minor(2) | can_id(7) | 5 zero bits`.
    pub fn sid(&self, major: MajorPriority, minor: MinorPriority) -> u16 {
        (u16::from(major as u8) << 14) | (u16::from(minor as u8) << 12) | (u16::from(self.can_id) << 5)
    }

    pub fn can_id_from_sid(sid: u16) -> u8 {
        ((sid >> 5) & 0x7F) as u8
    }
}

/// Errors surfaced by [`CanAsciiCodec`].
#[derive(Debug)]
pub enum CanCodecError {
    Io(std::io::Error),
}

impl std::fmt::Display for CanCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for CanCodecError {}

impl From<std::io::Error> for CanCodecError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

fn parse_hex_u16(bytes: &[u8]) -> Option<u16> {
    let mut value = 0u16;
    for &b in bytes {
        value = (value << 4) | u16::from(hex_value(b)?);
    }
    Some(value)
}

fn push_hex(dst: &mut BytesMut, byte: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    dst.put_u8(HEX[usize::from(byte >> 4)]);
    dst.put_u8(HEX[usize::from(byte & 0x0F)]);
}

/// ASCII CAN framing. Malformed bytes are skipped, not fatal; the count of
/// discarded bytes accumulates until [`CanAsciiCodec::take_dropped`].
#[derive(Debug, Default)]
pub struct CanAsciiCodec {
    dropped: usize,
}

impl CanAsciiCodec {
    /// Dropped byte count since the last call. The kernel logs it as W2001.
    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }
}

impl Decoder for CanAsciiCodec {
    type Item = CanFrame;
    type Error = CanCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<CanFrame>, CanCodecError> {
        loop {
            // Skip to the start marker.
            match src.iter().position(|&b| b == b':') {
                Some(0) => {}
                Some(n) => {
                    self.dropped += n;
                    src.advance(n);
                }
                None => {
                    self.dropped += src.len();
                    src.clear();
                    return Ok(None);
                }
            }

            let Some(end) = src.iter().position(|&b| b == b';') else {
                // No end marker yet. An over-long prefix can never become a
                // valid frame; flush it.
                if src.len() > CAN_FRAME_MAX {
                    self.dropped += src.len();
                    src.clear();
                }
                return Ok(None);
            };

            let frame_len = end + 1;
            let frame = src.split_to(frame_len);
            if frame_len > CAN_FRAME_MAX {
                self.dropped += frame_len;
                continue;
            }
            // :S<4 hex>N<data>;  — standard frames only.
            if frame_len < 8 || frame[1] != b'S' || frame[6] != b'N' {
                self.dropped += frame_len;
                continue;
            }
            let Some(sid) = parse_hex_u16(&frame[2..6]) else {
                self.dropped += frame_len;
                continue;
            };
            let data_hex = &frame[7..frame_len - 1];
            if data_hex.len() % 2 != 0 {
                self.dropped += frame_len;
                continue;
            }
            let mut data = Vec::with_capacity(data_hex.len() / 2);
            let mut ok = true;
            for pair in data_hex.chunks(2) {
                match (hex_value(pair[0]), hex_value(pair[1])) {
                    (Some(hi), Some(lo)) => data.push((hi << 4) | lo),
                    _ => {
                        ok = false;
                        break;
                    }
                }
            }
            if !ok {
                self.dropped += frame_len;
                continue;
            }
            return Ok(Some(CanFrame { can_id: CanFrame::can_id_from_sid(sid), data }));
        }
    }
}

impl Encoder<CanFrame> for CanAsciiCodec {
    type Error = CanCodecError;

    fn encode(&mut self, item: CanFrame, dst: &mut BytesMut) -> Result<(), CanCodecError> {
        let sid = item.sid(MajorPriority::Lowest, MinorPriority::Normal);
        dst.put_u8(b':');
        dst.put_u8(b'S');
        push_hex(dst, (sid >> 8) as u8);
        push_hex(dst, (sid & 0xFF) as u8);
        dst.put_u8(b'N');
        for byte in &item.data {
            push_hex(dst, *byte);
        }
        dst.put_u8(b';');
        Ok(())
    }
}

// -- checksum framing ---------------------------------------------------------

pub const JUMBO_DATA_MAX: u8 = 39;

const DATA_SIZE_MASK: u8 = 0x07;
const JUMBO_BIT: u8 = 0x08;
const HOLD_BIT: u8 = 0x10;
const FAULT_BIT: u8 = 0x20;
const TOGGLE_BIT: u8 = 0x40;

/// Header byte of a checksum-framed message. Note the inverted jumbo flag:
/// a SET bit means a standard frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader(pub u8);

impl FrameHeader {
    pub fn data_size(self) -> u8 {
        if self.is_jumbo() {
            8 + ((self.0 & DATA_SIZE_MASK) | ((self.0 >> 1) & 0x18))
        } else {
            self.0 & DATA_SIZE_MASK
        }
    }

    pub fn with_data_size(mut self, size: u8) -> Self {
        let size = size.min(JUMBO_DATA_MAX);
        if size >= 8 {
            // Jumbo: bit 3 cleared, size - 8 split over bits 0..2 and 4..5.
            let v = size - 8;
            self.0 &= 0xC0;
            self.0 |= v & DATA_SIZE_MASK;
            self.0 |= (v << 1) & 0x30;
        } else {
            self.0 |= JUMBO_BIT;
            self.0 = (self.0 & !DATA_SIZE_MASK) | size;
        }
        self
    }

    pub fn is_jumbo(self) -> bool {
        self.0 & JUMBO_BIT == 0
    }

    pub fn is_hold(self) -> bool {
        !self.is_jumbo() && self.0 & HOLD_BIT != 0
    }

    pub fn is_fault(self) -> bool {
        !self.is_jumbo() && self.0 & FAULT_BIT != 0
    }

    pub fn toggle(self) -> bool {
        self.0 & TOGGLE_BIT != 0
    }

    pub fn with_toggle(mut self, value: bool) -> Self {
        if value {
            self.0 |= TOGGLE_BIT;
        } else {
            self.0 &= !TOGGLE_BIT;
        }
        self
    }
}

/// Whole-message checksum: sum every byte, then `0x80 | (~sum + 1) & 0x7F`.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0x80 | ((!sum).wrapping_add(1) & 0x7F)
}

/// A decoded checksum-framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumFrame {
    pub header: FrameHeader,
    pub data: Vec<u8>,
}

impl ChecksumFrame {
    pub fn new(data: Vec<u8>) -> Self {
        let header = FrameHeader::default().with_data_size(data.len() as u8);
        Self { header, data }
    }
}

#[derive(Debug)]
pub enum ChecksumCodecError {
    Io(std::io::Error),
}

impl std::fmt::Display for ChecksumCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for ChecksumCodecError {}

impl From<std::io::Error> for ChecksumCodecError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Length-prefixed checksum framing. Frames with a bad checksum are dropped
/// whole; the dropped count accumulates.
#[derive(Debug, Default)]
pub struct ChecksumCodec {
    dropped: usize,
}

impl ChecksumCodec {
    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }
}

impl Decoder for ChecksumCodec {
    type Item = ChecksumFrame;
    type Error = ChecksumCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ChecksumFrame>, ChecksumCodecError> {
        loop {
            if src.is_empty() {
                return Ok(None);
            }
            let header = FrameHeader(src[0]);
            let total = 1 + usize::from(header.data_size()) + 1;
            if src.len() < total {
                return Ok(None);
            }
            let frame = src.split_to(total);
            if checksum(&frame[..total - 1]) != frame[total - 1] {
                // Bad checksum: discard the whole frame and resync on the
                // next header byte.
                self.dropped += total;
                continue;
            }
            return Ok(Some(ChecksumFrame {
                header,
                data: frame[1..total - 1].to_vec(),
            }));
        }
    }
}

impl Encoder<ChecksumFrame> for ChecksumCodec {
    type Error = ChecksumCodecError;

    fn encode(&mut self, item: ChecksumFrame, dst: &mut BytesMut) -> Result<(), ChecksumCodecError> {
        let header = item.header.with_data_size(item.data.len() as u8);
        let start = dst.len();
        dst.put_u8(header.0);
        dst.put_slice(&item.data);
        let sum = checksum(&dst[start..]);
        dst.put_u8(sum);
        Ok(())
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
