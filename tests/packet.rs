//! Binary frame codec: literal decodes, short-packet skipping, malformed
//! frame rejection, and encode∘decode identity.

use hmt_engine::feed::packet::{PacketTick, decode_frame, encode_frame};

/// Hand-build a frame: count prefix, then (length, payload) per packet.
fn frame(packets: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(packets.len() as u16).to_be_bytes());
    for p in packets {
        buf.extend_from_slice(&(p.len() as u16).to_be_bytes());
        buf.extend_from_slice(p);
    }
    buf
}

fn tick_packet(token: u32, paise: u32) -> Vec<u8> {
    let mut p = Vec::with_capacity(8);
    p.extend_from_slice(&token.to_be_bytes());
    p.extend_from_slice(&paise.to_be_bytes());
    p
}

#[test]
fn decodes_token_and_paise_price() {
    let f = frame(&[&tick_packet(256265, 10_050)]);
    let ticks = decode_frame(&f).unwrap();
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].instrument_token, 256265);
    assert_eq!(ticks[0].last_price, 100.50);
}

#[test]
fn decodes_multiple_packets_in_order() {
    let f = frame(&[&tick_packet(1, 100), &tick_packet(2, 250), &tick_packet(3, 99_999)]);
    let ticks = decode_frame(&f).unwrap();
    assert_eq!(
        ticks.iter().map(|t| t.instrument_token).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(ticks[2].last_price, 999.99);
}

#[test]
fn short_packets_are_skipped_not_fatal() {
    // A 4-byte index pulse sits between two real ticks.
    let f = frame(&[&tick_packet(1, 100), &[0u8, 1, 2, 3], &tick_packet(2, 200)]);
    let ticks = decode_frame(&f).unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[1].instrument_token, 2);
}

#[test]
fn oversized_packets_keep_only_the_leading_fields() {
    // Fuller feed modes append depth after byte 8; it must be ignored.
    let mut p = tick_packet(42, 1_234);
    p.extend_from_slice(&[0xAB; 36]);
    let ticks = decode_frame(&frame(&[&p])).unwrap();
    assert_eq!(ticks[0].instrument_token, 42);
    assert_eq!(ticks[0].last_price, 12.34);
}

#[test]
fn empty_frame_decodes_to_nothing() {
    let f = frame(&[]);
    assert!(decode_frame(&f).unwrap().is_empty());
}

#[test]
fn truncated_frame_is_an_error() {
    // Declares one packet of 8 bytes but carries only 4.
    let mut f = Vec::new();
    f.extend_from_slice(&1u16.to_be_bytes());
    f.extend_from_slice(&8u16.to_be_bytes());
    f.extend_from_slice(&[0u8; 4]);
    assert!(decode_frame(&f).is_err());
}

#[test]
fn missing_length_prefix_is_an_error() {
    // Declares two packets, provides one.
    let mut f = frame(&[&tick_packet(1, 100)]);
    f[0..2].copy_from_slice(&2u16.to_be_bytes());
    assert!(decode_frame(&f).is_err());
}

#[test]
fn frame_shorter_than_count_prefix_is_an_error() {
    assert!(decode_frame(&[]).is_err());
    assert!(decode_frame(&[0u8]).is_err());
}

#[test]
fn encode_decode_round_trip() {
    let ticks = vec![
        PacketTick { instrument_token: 256265, last_price: 100.50 },
        PacketTick { instrument_token: 408065, last_price: 0.05 },
        PacketTick { instrument_token: 53_179_141, last_price: 24_500.00 },
    ];
    let decoded = decode_frame(&encode_frame(&ticks)).unwrap();
    assert_eq!(decoded, ticks);
}

#[test]
fn decode_encode_round_trip_preserves_tick_frames() {
    let original = frame(&[&tick_packet(7, 777), &tick_packet(8, 8_888)]);
    let reencoded = encode_frame(&decode_frame(&original).unwrap());
    assert_eq!(reencoded, original);
}
