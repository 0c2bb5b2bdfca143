//! Binary tick frame codec.
//!
//! The feed delivers price updates as length-prefixed binary frames:
//!
//! ```text
//! [u16 BE packet count]
//!   [u16 BE packet length][packet bytes] × count
//! ```
//!
//! Any packet of length ≥ 8 carries a `u32` BE instrument token in bytes
//! `[0..4)` and a `u32` BE price in paise in bytes `[4..8)`; dividing by 100
//! yields rupees. Shorter packets (index pulses, heartbeats) are skipped.
//! Trailing packet fields beyond byte 8 (depth, OHLC in fuller modes) are
//! ignored by this engine.

use crate::error::{EngineError, Result};

/// Paise per rupee; feed prices arrive as integer paise.
const PAISE_PER_RUPEE: f64 = 100.0;

/// A token/price pair decoded from one packet of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketTick {
    pub instrument_token: u32,
    /// Last-traded price in rupees.
    pub last_price: f64,
}

/// Read a big-endian `u16` from `data` at `offset`. Advances `offset` by 2.
#[inline(always)]
fn read_u16_be(data: &[u8], offset: &mut usize) -> u16 {
    let v = u16::from_be_bytes([data[*offset], data[*offset + 1]]);
    *offset += 2;
    v
}

/// Read a big-endian `u32` from `data` at `offset`. Advances `offset` by 4.
#[inline(always)]
fn read_u32_be(data: &[u8], offset: &mut usize) -> u32 {
    let v = u32::from_be_bytes(data[*offset..*offset + 4].try_into().unwrap());
    *offset += 4;
    v
}

/// Decode one binary frame into its tick packets.
///
/// Packets shorter than 8 bytes are skipped. A frame whose length prefixes
/// disagree with its actual size is malformed: the error is returned so the
/// caller can log it, and the decoder resynchronizes on the next frame
/// boundary (frames are self-contained websocket messages, so no state
/// carries over).
pub fn decode_frame(frame: &[u8]) -> Result<Vec<PacketTick>> {
    if frame.len() < 2 {
        return Err(EngineError::InvalidArgument(format!(
            "frame too short for packet count: {} bytes",
            frame.len()
        )));
    }

    let mut off = 0usize;
    let count = read_u16_be(frame, &mut off) as usize;
    let mut ticks = Vec::with_capacity(count);

    for i in 0..count {
        if frame.len() - off < 2 {
            return Err(EngineError::InvalidArgument(format!(
                "frame truncated before packet {i} length prefix"
            )));
        }
        let len = read_u16_be(frame, &mut off) as usize;
        if frame.len() - off < len {
            return Err(EngineError::InvalidArgument(format!(
                "packet {i} declares {len} bytes but only {} remain",
                frame.len() - off
            )));
        }

        let packet = &frame[off..off + len];
        off += len;

        if len < crate::constants::feed_limits::MIN_TICK_PACKET_LEN {
            continue;
        }

        let mut p = 0usize;
        let instrument_token = read_u32_be(packet, &mut p);
        let paise = read_u32_be(packet, &mut p);
        ticks.push(PacketTick {
            instrument_token,
            last_price: paise as f64 / PAISE_PER_RUPEE,
        });
    }

    Ok(ticks)
}

/// Encode tick packets into a frame the decoder accepts.
///
/// Each packet is exactly 8 bytes (token + paise). Prices are rounded to the
/// nearest paisa. Used by tests and by the replay tooling.
pub fn encode_frame(ticks: &[PacketTick]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + ticks.len() * 10);
    frame.extend_from_slice(&(ticks.len() as u16).to_be_bytes());
    for tick in ticks {
        frame.extend_from_slice(&8u16.to_be_bytes());
        frame.extend_from_slice(&tick.instrument_token.to_be_bytes());
        let paise = (tick.last_price * PAISE_PER_RUPEE).round() as u32;
        frame.extend_from_slice(&paise.to_be_bytes());
    }
    frame
}
