// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::{
    checksum, opcode, CanAsciiCodec, CanFrame, ChecksumCodec, ChecksumFrame, FrameHeader,
    MajorPriority, MinorPriority,
};

fn encode(frame: CanFrame) -> BytesMut {
    let mut codec = CanAsciiCodec::default();
    let mut out = BytesMut::new();
    let _ = codec.encode(frame, &mut out);
    out
}

#[test]
fn ascii_frame_shape() {
    let out = encode(CanFrame::new(0x01, &[opcode::TRACK_ON]));
    let text = String::from_utf8_lossy(&out).into_owned();
    assert!(text.starts_with(":S"));
    assert!(text.ends_with(";"));
    assert_eq!(text.as_bytes()[6], b'N');
}

#[test]
fn sid_packs_priorities_and_can_id() {
    let frame = CanFrame::new(0x55, &[0x00]);
    let sid = frame.sid(MajorPriority::Lowest, MinorPriority::Normal);
    assert_eq!(sid >> 14, 3);
    assert_eq!((sid >> 12) & 0x3, 2);
    assert_eq!(CanFrame::can_id_from_sid(sid), 0x55);
}

#[test]
fn ascii_round_trip() {
    let frame = CanFrame::new(0x12, &[opcode::ACCESSORY, 0xAB, 0xCD, 0x00, 0x01]);
    let mut wire = encode(frame.clone());
    let mut codec = CanAsciiCodec::default();
    let decoded = codec.decode(&mut wire);
    assert!(matches!(&decoded, Ok(Some(f)) if *f == frame), "{decoded:?}");
    assert_eq!(codec.take_dropped(), 0);
}

#[test]
fn garbage_before_start_marker_is_counted_and_skipped() {
    let frame = encode(CanFrame::new(0x01, &[opcode::TRACK_OFF]));
    let mut wire = BytesMut::from(&b"noise"[..]);
    wire.extend_from_slice(&frame);

    let mut codec = CanAsciiCodec::default();
    let decoded = codec.decode(&mut wire);
    assert!(matches!(decoded, Ok(Some(_))));
    assert_eq!(codec.take_dropped(), 5);
}

#[test]
fn partial_frame_waits() {
    let frame = encode(CanFrame::new(0x01, &[opcode::REQUEST_VERSION]));
    let mut wire = BytesMut::from(&frame[..5]);
    let mut codec = CanAsciiCodec::default();
    assert!(matches!(codec.decode(&mut wire), Ok(None)));
    wire.extend_from_slice(&frame[5..]);
    assert!(matches!(codec.decode(&mut wire), Ok(Some(_))));
}

#[test]
fn oversized_frame_is_dropped() {
    let mut wire = BytesMut::from(&b":S0000N0011223344556677889900112233445566;"[..]);
    let dropped_len = wire.len();
    let mut codec = CanAsciiCodec::default();
    assert!(matches!(codec.decode(&mut wire), Ok(None)));
    assert_eq!(codec.take_dropped(), dropped_len);
}

#[test]
fn bad_hex_is_dropped_not_fatal() {
    let good = encode(CanFrame::new(0x01, &[opcode::TRACK_ON]));
    let mut wire = BytesMut::from(&b":SZZZZN00;"[..]);
    wire.extend_from_slice(&good);
    let mut codec = CanAsciiCodec::default();
    let decoded = codec.decode(&mut wire);
    assert!(matches!(decoded, Ok(Some(_))), "skips the bad frame, yields the good one");
    assert!(codec.take_dropped() > 0);
}

// -- checksum framing ---------------------------------------------------------

#[test]
fn checksum_formula() {
    // 0x80 | (~sum + 1) & 0x7F
    let bytes = [0x02, 0x81, 0x80];
    let sum = 0x02u8.wrapping_add(0x81).wrapping_add(0x80);
    assert_eq!(checksum(&bytes), 0x80 | ((!sum).wrapping_add(1) & 0x7F));
}

#[test]
fn header_standard_sizes() {
    for size in 0u8..8 {
        let header = FrameHeader::default().with_data_size(size);
        assert!(!header.is_jumbo(), "size {size} must be standard");
        assert_eq!(header.data_size(), size);
    }
}

#[test]
fn header_jumbo_sizes() {
    for size in 8u8..=39 {
        let header = FrameHeader::default().with_data_size(size);
        assert!(header.is_jumbo(), "size {size} must be jumbo");
        assert_eq!(header.data_size(), size, "size {size} round-trip");
    }
}

#[test]
fn header_toggle_survives_size_changes() {
    let header = FrameHeader::default().with_toggle(true).with_data_size(3);
    assert!(header.toggle());
    let header = header.with_data_size(20);
    assert!(header.toggle());
}

#[test]
fn checksum_round_trip_standard_and_jumbo() {
    let mut codec = ChecksumCodec::default();
    let mut wire = BytesMut::new();
    let small = ChecksumFrame::new(vec![1, 2, 3]);
    let jumbo = ChecksumFrame::new((0..20).collect());
    let _ = codec.encode(small.clone(), &mut wire);
    let _ = codec.encode(jumbo.clone(), &mut wire);

    let first = codec.decode(&mut wire);
    assert!(matches!(&first, Ok(Some(f)) if f.data == small.data), "{first:?}");
    let second = codec.decode(&mut wire);
    assert!(matches!(&second, Ok(Some(f)) if f.data == jumbo.data), "{second:?}");
}

#[test]
fn corrupt_checksum_resynchronises() {
    let mut codec = ChecksumCodec::default();
    let mut wire = BytesMut::new();
    let frame = ChecksumFrame::new(vec![7, 7]);
    let _ = codec.encode(frame.clone(), &mut wire);
    // Flip a payload byte: checksum mismatch.
    wire[1] ^= 0xFF;
    let good = ChecksumFrame::new(vec![9]);
    let _ = codec.encode(good.clone(), &mut wire);

    let decoded = codec.decode(&mut wire);
    assert!(matches!(&decoded, Ok(Some(f)) if f.data == good.data), "{decoded:?}");
    assert!(codec.take_dropped() > 0);
}
