//! Version 6 header codec.
//!
//! # Layout (big-endian)
//! ```text
//! offset  field                      type
//! ──────  ─────────────────────────  ──────
//!      0  version                    i16
//!      2  timestamp (s since 1904)   u32
//!      6  v1 extent                  i32     ── end v1 @ 10
//!     10  cskind                     i16
//!     12  v2 extent                  i32     ── end v2 @ 16
//!     16  site code                  4 chars
//!     20  v3 extent                  i32     ── end v3 @ 24
//!     24  cover minutes              i32
//!     28  deleted source             i32 (bool)
//!     32  override source            i32 (bool)
//!     36  start freq MHz             f32
//!     40  rep freq MHz               f32
//!     44  bandwidth kHz              f32
//!     48  sweep up                   i32 (bool)
//!     52  doppler cells              i32
//!     56  range cells                i32
//!     60  first range cell           i32
//!     64  range cell dist km         f32
//!     68  v4 extent                  i32     ── end v4 @ 72
//!     72  output interval            i32
//!     76  create type code           4 chars
//!     80  creator version            4 chars
//!     84  active channel count       i32
//!     88  spectra channel count      i32
//!     92  active channel mask        u32
//!     96  v5 extent                  i32     ── end v5 @ 100
//!    100  block section size         u32
//!    104  tagged blocks …
//! ```
//!
//! Every extent equals `header_len - section_end`.  Stored extents are never
//! trusted: the encoder derives them from the serialized block section, and
//! the decoder only compares them for diagnostics.

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::block::{section_len, BlockRegistry, BlockMap, BLOCK_PREFIX_LEN};
use crate::csfile::ReadOptions;
use crate::error::{DecodeError, EncodeError};
use crate::header::{timestamp_from_raw, timestamp_to_raw, Header};
use crate::primitive::{BinaryReader, BinaryWriter};

/// Header revision handled by this module.
pub const VERSION: i16 = 6;

pub const V1_END: u64 = 10;
pub const V2_END: u64 = 16;
pub const V3_END: u64 = 24;
pub const V4_END: u64 = 72;
pub const V5_END: u64 = 100;
/// First tagged block, right after the u32 section size.
pub const BLOCKS_START: u64 = V5_END + 4;

const SECTION_ENDS: [u64; 5] = [V1_END, V2_END, V3_END, V4_END, V5_END];

/// Total header length for a block section of `section_len` bytes.
pub fn header_len(section_len: u64) -> u64 {
    BLOCKS_START + section_len
}

/// Forward-compatibility skip distance stored at the end of a section.
pub fn extent(header_len: u64, section_end: u64) -> Result<i32, EncodeError> {
    i32::try_from(header_len - section_end).map_err(|_| EncodeError::HeaderTooLarge(header_len))
}

fn read_flag<R: Read>(reader: &mut BinaryReader<R>) -> Result<bool, DecodeError> {
    Ok(reader.read_i32()? != 0)
}

// ── Decode ───────────────────────────────────────────────────────────────────

/// Decode everything after the version tag, which the caller has already
/// consumed and dispatched on.
pub fn read_header<R: Read>(
    reader:   &mut BinaryReader<R>,
    version:  i16,
    registry: &BlockRegistry,
    options:  &ReadOptions,
) -> Result<Header, DecodeError> {
    let mut stored = [0i32; 5];

    let timestamp = timestamp_from_raw(reader.read_u32()?);
    stored[0] = reader.read_i32()?;
    // end v1

    let cskind = reader.read_i16()?;
    stored[1] = reader.read_i32()?;
    // end v2

    let site_code = reader.read_fourcc()?;
    stored[2] = reader.read_i32()?;
    // end v3

    let cover_minutes      = reader.read_i32()?;
    let deleted_source     = read_flag(reader)?;
    let override_source    = read_flag(reader)?;
    let start_freq_mhz     = reader.read_f32()?;
    let rep_freq_mhz       = reader.read_f32()?;
    let bandwidth_khz      = reader.read_f32()?;
    let sweep_up           = read_flag(reader)?;
    let num_doppler_cells  = reader.read_i32()?;
    let num_range_cells    = reader.read_i32()?;
    let first_range_cell   = reader.read_i32()?;
    let range_cell_dist_km = reader.read_f32()?;
    stored[3] = reader.read_i32()?;
    // end v4

    let output_interval      = reader.read_i32()?;
    let create_type_code     = reader.read_fourcc()?;
    let creator_version      = reader.read_fourcc()?;
    let num_active_channels  = reader.read_i32()?;
    let num_spectra_channels = reader.read_i32()?;
    let active_channels      = reader.read_u32()?;
    stored[4] = reader.read_i32()?;
    // end v5

    let section_size = reader.read_u32()?;
    let blocks = read_blocks(reader, section_size, registry, options)?;
    // end v6

    let total = header_len(u64::from(section_size));
    for (i, (&found, &end)) in stored.iter().zip(SECTION_ENDS.iter()).enumerate() {
        let canonical = total - end;
        if i64::from(found) != canonical as i64 {
            debug!(section = i + 1, found, canonical, "non-canonical header extent");
        }
    }

    debug!(
        site = %site_code,
        cskind,
        range_cells = num_range_cells,
        doppler_cells = num_doppler_cells,
        blocks = blocks.len(),
        header_len = total,
        "decoded v6 header"
    );

    Ok(Header {
        version,
        timestamp,
        cskind,
        site_code,
        cover_minutes,
        deleted_source,
        override_source,
        start_freq_mhz,
        rep_freq_mhz,
        bandwidth_khz,
        sweep_up,
        num_doppler_cells,
        num_range_cells,
        first_range_cell,
        range_cell_dist_km,
        output_interval,
        create_type_code,
        creator_version,
        num_active_channels,
        num_spectra_channels,
        active_channels,
        blocks,
    })
}

/// Consume `section_size` bytes of tagged blocks.  The counter must land on
/// exactly zero; any block that would overshoot it is fatal.
fn read_blocks<R: Read>(
    reader:       &mut BinaryReader<R>,
    section_size: u32,
    registry:     &BlockRegistry,
    options:      &ReadOptions,
) -> Result<BlockMap, DecodeError> {
    let mut blocks = BlockMap::new();
    let mut remaining = section_size;

    while remaining > 0 {
        let offset = reader.position();
        if u64::from(remaining) < BLOCK_PREFIX_LEN {
            return Err(DecodeError::MalformedBlockSection {
                offset,
                remaining,
                declared: BLOCK_PREFIX_LEN,
            });
        }

        let key = reader.read_fourcc()?;
        let len = reader.read_u32()?;
        let consumed = BLOCK_PREFIX_LEN + u64::from(len);
        if consumed > u64::from(remaining) {
            return Err(DecodeError::MalformedBlockSection { offset, remaining, declared: consumed });
        }
        if len > options.max_block_len {
            return Err(DecodeError::LimitExceeded {
                what: "tagged block",
                size: u64::from(len),
                max:  u64::from(options.max_block_len),
            });
        }

        let raw = reader.read_bytes(len as usize)?;
        trace!(%key, len, offset, "tagged block");
        let payload = registry.codec_for(key).decode(key, raw)?;
        blocks.insert(key, payload);

        // consumed <= remaining, checked above
        remaining -= consumed as u32;
    }

    Ok(blocks)
}

// ── Encode ───────────────────────────────────────────────────────────────────

/// Encode the full header, version tag included.  Returns the header length.
///
/// Blocks are serialized through the registry first; the section size and all
/// five extents come from those bytes, never from the stored header.
pub fn write_header<W: Write>(
    writer:   &mut BinaryWriter<W>,
    header:   &Header,
    registry: &BlockRegistry,
) -> Result<u64, EncodeError> {
    let blocks = registry.encode_all(&header.blocks)?;
    let section = section_len(&blocks);
    let section_size = u32::try_from(section).map_err(|_| EncodeError::HeaderTooLarge(section))?;
    let total = header_len(section);

    writer.write_i16(header.version)?;
    writer.write_u32(timestamp_to_raw(header.timestamp)?)?;
    writer.write_i32(extent(total, V1_END)?)?;
    // end v1

    writer.write_i16(header.cskind)?;
    writer.write_i32(extent(total, V2_END)?)?;
    // end v2

    writer.write_fourcc(header.site_code)?;
    writer.write_i32(extent(total, V3_END)?)?;
    // end v3

    writer.write_i32(header.cover_minutes)?;
    writer.write_i32(i32::from(header.deleted_source))?;
    writer.write_i32(i32::from(header.override_source))?;
    writer.write_f32(header.start_freq_mhz)?;
    writer.write_f32(header.rep_freq_mhz)?;
    writer.write_f32(header.bandwidth_khz)?;
    writer.write_i32(i32::from(header.sweep_up))?;
    writer.write_i32(header.num_doppler_cells)?;
    writer.write_i32(header.num_range_cells)?;
    writer.write_i32(header.first_range_cell)?;
    writer.write_f32(header.range_cell_dist_km)?;
    writer.write_i32(extent(total, V4_END)?)?;
    // end v4

    writer.write_i32(header.output_interval)?;
    writer.write_fourcc(header.create_type_code)?;
    writer.write_fourcc(header.creator_version)?;
    writer.write_i32(header.num_active_channels)?;
    writer.write_i32(header.num_spectra_channels)?;
    writer.write_u32(header.active_channels)?;
    writer.write_i32(extent(total, V5_END)?)?;
    // end v5

    writer.write_u32(section_size)?;
    for (key, raw) in &blocks {
        let len = u32::try_from(raw.len()).map_err(|_| EncodeError::HeaderTooLarge(section))?;
        writer.write_fourcc(*key)?;
        writer.write_u32(len)?;
        writer.write_bytes(raw)?;
    }
    // end v6

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Endianness, FourCc};

    fn sample() -> Header {
        Header {
            version:              VERSION,
            timestamp:            timestamp_from_raw(3_707_575_200),
            cskind:               2,
            site_code:            "ASSA".parse().unwrap(),
            cover_minutes:        60,
            deleted_source:       false,
            override_source:      true,
            start_freq_mhz:       4.55,
            rep_freq_mhz:         2.0,
            bandwidth_khz:        25.7,
            sweep_up:             true,
            num_doppler_cells:    512,
            num_range_cells:      32,
            first_range_cell:     1,
            range_cell_dist_km:   5.83,
            output_interval:      60,
            create_type_code:     "CSSW".parse().unwrap(),
            creator_version:      "1.0 ".parse().unwrap(),
            num_active_channels:  3,
            num_spectra_channels: 3,
            active_channels:      0b111,
            blocks:               [("TIME".parse::<FourCc>().unwrap(), vec![1, 2, 3])]
                .into_iter()
                .collect(),
        }
    }

    fn encode(header: &Header) -> Vec<u8> {
        let mut out = Vec::new();
        let mut w = BinaryWriter::new(&mut out, Endianness::Big);
        let len = write_header(&mut w, header, &BlockRegistry::default()).unwrap();
        assert_eq!(len, w.position());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Header, DecodeError> {
        let mut r = BinaryReader::new(bytes, Endianness::Big);
        let version = r.read_i16()?;
        read_header(&mut r, version, &BlockRegistry::default(), &ReadOptions::default())
    }

    fn i32_at(bytes: &[u8], at: usize) -> i32 {
        i32::from_be_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn extents_follow_header_length() {
        let bytes = encode(&sample());
        // 104 fixed + (8 + 3) for one block
        assert_eq!(bytes.len(), 115);
        assert_eq!(i32_at(&bytes, 6), 105);
        assert_eq!(i32_at(&bytes, 12), 99);
        assert_eq!(i32_at(&bytes, 20), 91);
        assert_eq!(i32_at(&bytes, 68), 43);
        assert_eq!(i32_at(&bytes, 96), 15);
        assert_eq!(u32::from_be_bytes(bytes[100..104].try_into().unwrap()), 11);
        assert_eq!(&bytes[104..108], b"TIME");
    }

    #[test]
    fn header_round_trip() {
        let header = sample();
        assert_eq!(decode(&encode(&header)).unwrap(), header);
    }

    #[test]
    fn empty_block_section() {
        let mut header = sample();
        header.blocks = BlockMap::new();
        let bytes = encode(&header);
        assert_eq!(bytes.len() as u64, BLOCKS_START);
        assert_eq!(i32_at(&bytes, 96), 4);
        assert!(decode(&bytes).unwrap().blocks.is_empty());
    }

    #[test]
    fn overshooting_block_is_malformed() {
        let mut bytes = encode(&sample());
        // declare 10 bytes of blocks; the single block needs 11
        bytes[100..104].copy_from_slice(&10u32.to_be_bytes());
        match decode(&bytes) {
            Err(DecodeError::MalformedBlockSection { offset, remaining, declared }) => {
                assert_eq!(offset, 104);
                assert_eq!(remaining, 10);
                assert_eq!(declared, 11);
            }
            other => panic!("expected MalformedBlockSection, got {other:?}"),
        }
    }

    #[test]
    fn leftover_smaller_than_prefix_is_malformed() {
        let mut bytes = encode(&sample());
        bytes[100..104].copy_from_slice(&15u32.to_be_bytes());
        bytes.extend_from_slice(&[0; 8]);
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::MalformedBlockSection { remaining: 4, .. })
        ));
    }

    #[test]
    fn oversized_block_hits_limit() {
        let bytes = encode(&sample());
        let mut r = BinaryReader::new(&bytes[..], Endianness::Big);
        let version = r.read_i16().unwrap();
        let options = ReadOptions { max_block_len: 2, ..ReadOptions::default() };
        let err = read_header(&mut r, version, &BlockRegistry::default(), &options).unwrap_err();
        assert!(matches!(err, DecodeError::LimitExceeded { size: 3, max: 2, .. }));
    }

    #[test]
    fn flags_decode_any_nonzero() {
        let mut bytes = encode(&sample());
        bytes[28..32].copy_from_slice(&7i32.to_be_bytes());
        let header = decode(&bytes).unwrap();
        assert!(header.deleted_source);
    }
}
