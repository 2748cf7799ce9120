// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol shared between the simulator and the simulation IO handler.
//!
//! Records are little-endian packed: a two byte `(opcode, size)` header
//! followed by the payload. `size` counts the whole record including the
//! header.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

/// UDP discovery port.
pub const DISCOVERY_PORT: u16 = 5741;
/// Discovery request payload.
pub const DISCOVERY_REQUEST: &[u8; 4] = b"sim?";
/// Discovery response magic (first four bytes of the six byte reply).
pub const DISCOVERY_RESPONSE: &[u8; 4] = b"sim!";

/// Locomotive travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
    Unknown,
}

impl Direction {
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Forward => 0,
            Self::Reverse => 1,
            Self::Unknown => 255,
        }
    }

    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::Forward,
            1 => Self::Reverse,
            _ => Self::Unknown,
        }
    }
}

/// Decoder protocol of a simulated locomotive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderProtocol {
    #[default]
    None,
    DccShort,
    Motorola,
    Mfx,
    Selectrix,
    DccLong,
}

impl DecoderProtocol {
    pub fn to_wire(self) -> u8 {
        match self {
            Self::None => 0,
            Self::DccShort => 1,
            Self::Motorola => 2,
            Self::Mfx => 3,
            Self::Selectrix => 4,
            Self::DccLong => 6,
        }
    }

    pub fn from_wire(value: u8) -> Self {
        match value {
            1 => Self::DccShort,
            2 => Self::Motorola,
            3 => Self::Mfx,
            4 => Self::Selectrix,
            6 => Self::DccLong,
            _ => Self::None,
        }
    }
}

const OP_POWER: u8 = 1;
const OP_LOCOMOTIVE_SPEED_DIRECTION: u8 = 2;
const OP_SENSOR_CHANGED: u8 = 3;

const SIZE_POWER: u8 = 3;
const SIZE_LOCOMOTIVE_SPEED_DIRECTION: u8 = 8;
const SIZE_SENSOR_CHANGED: u8 = 7;

/// A protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Power {
        on: bool,
    },
    LocomotiveSpeedDirection {
        address: u16,
        protocol: DecoderProtocol,
        emergency_stop: bool,
        direction: Direction,
        speed: u8,
    },
    SensorChanged {
        channel: u16,
        address: u16,
        value: bool,
    },
}

impl Message {
    pub fn wire_size(&self) -> u8 {
        match self {
            Self::Power { .. } => SIZE_POWER,
            Self::LocomotiveSpeedDirection { .. } => SIZE_LOCOMOTIVE_SPEED_DIRECTION,
            Self::SensorChanged { .. } => SIZE_SENSOR_CHANGED,
        }
    }

    pub fn encode_to(&self, buf: &mut BytesMut) {
        match *self {
            Self::Power { on } => {
                buf.put_u8(OP_POWER);
                buf.put_u8(SIZE_POWER);
                buf.put_u8(u8::from(on));
            }
            Self::LocomotiveSpeedDirection {
                address,
                protocol,
                emergency_stop,
                direction,
                speed,
            } => {
                buf.put_u8(OP_LOCOMOTIVE_SPEED_DIRECTION);
                buf.put_u8(SIZE_LOCOMOTIVE_SPEED_DIRECTION);
                buf.put_u16_le(address);
                buf.put_u8(protocol.to_wire());
                buf.put_u8(u8::from(emergency_stop));
                buf.put_u8(direction.to_wire());
                buf.put_u8(speed);
            }
            Self::SensorChanged { channel, address, value } => {
                buf.put_u8(OP_SENSOR_CHANGED);
                buf.put_u8(SIZE_SENSOR_CHANGED);
                buf.put_u16_le(channel);
                buf.put_u16_le(address);
                buf.put_u8(u8::from(value));
            }
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size() as usize);
        self.encode_to(&mut buf);
        buf.freeze()
    }
}

/// Framing error raised by [`SimCodec`].
#[derive(Debug)]
pub enum FrameError {
    /// Declared record size does not match the opcode.
    BadSize { opcode: u8, size: u8 },
    /// Unknown opcode.
    UnknownOpCode(u8),
    Io(std::io::Error),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadSize { opcode, size } => {
                write!(f, "bad record size {size} for opcode {opcode}")
            }
            Self::UnknownOpCode(op) => write!(f, "unknown opcode {op}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Tokio codec for the simulator stream.
#[derive(Debug, Default)]
pub struct SimCodec;

impl Decoder for SimCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, FrameError> {
        if src.len() < 2 {
            return Ok(None);
        }
        let opcode = src[0];
        let size = src[1];
        let expected = match opcode {
            OP_POWER => SIZE_POWER,
            OP_LOCOMOTIVE_SPEED_DIRECTION => SIZE_LOCOMOTIVE_SPEED_DIRECTION,
            OP_SENSOR_CHANGED => SIZE_SENSOR_CHANGED,
            other => return Err(FrameError::UnknownOpCode(other)),
        };
        if size != expected {
            return Err(FrameError::BadSize { opcode, size });
        }
        if src.len() < size as usize {
            return Ok(None);
        }
        let mut record = src.split_to(size as usize);
        record.advance(2);
        let message = match opcode {
            OP_POWER => Message::Power { on: record.get_u8() != 0 },
            OP_LOCOMOTIVE_SPEED_DIRECTION => Message::LocomotiveSpeedDirection {
                address: record.get_u16_le(),
                protocol: DecoderProtocol::from_wire(record.get_u8()),
                emergency_stop: record.get_u8() != 0,
                direction: Direction::from_wire(record.get_u8()),
                speed: record.get_u8(),
            },
            _ => Message::SensorChanged {
                channel: record.get_u16_le(),
                address: record.get_u16_le(),
                value: record.get_u8() != 0,
            },
        };
        Ok(Some(message))
    }
}

impl Encoder<Message> for SimCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), FrameError> {
        item.encode_to(dst);
        Ok(())
    }
}

/// Build the six byte discovery reply: `sim!` followed by the TCP port in
/// big-endian.
pub fn discovery_reply(tcp_port: u16) -> [u8; 6] {
    let mut reply = [0u8; 6];
    reply[..4].copy_from_slice(DISCOVERY_RESPONSE);
    reply[4..].copy_from_slice(&tcp_port.to_be_bytes());
    reply
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
