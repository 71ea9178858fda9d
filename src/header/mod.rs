//! Cross-Spectrum file header.
//!
//! The header grew over six revisions.  Each revision appended fields and
//! closed its section with an "extent": the distance from the end of that
//! section to the end of the whole header.  A reader that only knows the
//! first three sections can use the v3 extent to skip straight to the data.
//!
//! Only version 6 is decoded here; see [`v6`] for the field layout.

pub mod v6;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::block::BlockMap;
use crate::error::EncodeError;
use crate::primitive::FourCc;

/// Seconds between 1904-01-01T00:00:00 and the Unix epoch.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// All file-level metadata of one Cross-Spectrum file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub version:              i16,
    /// Capture time, naive UTC.
    pub timestamp:            NaiveDateTime,
    /// Payload variant; `>= 2` adds a quality channel to every row.
    pub cskind:               i16,
    pub site_code:            FourCc,
    pub cover_minutes:        i32,
    pub deleted_source:       bool,
    pub override_source:      bool,
    pub start_freq_mhz:       f32,
    pub rep_freq_mhz:         f32,
    pub bandwidth_khz:        f32,
    pub sweep_up:             bool,
    pub num_doppler_cells:    i32,
    pub num_range_cells:      i32,
    pub first_range_cell:     i32,
    pub range_cell_dist_km:   f32,
    pub output_interval:      i32,
    pub create_type_code:     FourCc,
    pub creator_version:      FourCc,
    pub num_active_channels:  i32,
    pub num_spectra_channels: i32,
    /// Bitmask of active antenna channels.
    pub active_channels:      u32,
    pub blocks:               BlockMap,
}

impl Header {
    /// `true` when every payload row carries a quality channel.
    pub fn has_quality(&self) -> bool {
        self.cskind >= 2
    }

    /// Pretty JSON rendering for inspection; block payloads are hex strings.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ── Timestamps ───────────────────────────────────────────────────────────────

/// 1904-01-01T00:00:00, the zero point of every stored timestamp.
pub fn mac_epoch() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc() - TimeDelta::seconds(MAC_EPOCH_OFFSET)
}

/// Convert stored seconds into a calendar time.
pub fn timestamp_from_raw(seconds: u32) -> NaiveDateTime {
    mac_epoch() + TimeDelta::seconds(i64::from(seconds))
}

/// Convert a calendar time back into stored seconds, truncating fractions.
pub fn timestamp_to_raw(timestamp: NaiveDateTime) -> Result<u32, EncodeError> {
    let epoch = mac_epoch();
    if timestamp < epoch {
        return Err(EncodeError::TimestampOutOfRange(timestamp));
    }
    let seconds = (timestamp - epoch).num_seconds();
    u32::try_from(seconds).map_err(|_| EncodeError::TimestampOutOfRange(timestamp))
}
