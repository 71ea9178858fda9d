//! High-level [`CsFile`] API, the primary embedding surface.
//!
//! ```no_run
//! use codarcs::csfile::CsFile;
//!
//! // Read
//! let cs = CsFile::open("CSS_ASSA_21_06_26_1400.cs")?;
//! println!("{}", cs.header().to_json()?);
//! let monopole = cs.antenna3();
//! # let _ = monopole;
//!
//! // Write
//! cs.save("copy.cs")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Version dispatch
//! The first two bytes of a file are its version tag.  [`CsReader::load`]
//! reads the tag and dispatches to the matching header/spectrum pair before
//! touching anything else; [`CsWriter::dump`] dispatches on
//! `header.version`.  Only version 6 is supported.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex32;
use serde::Deserialize;
use tracing::debug;

use crate::block::BlockRegistry;
use crate::error::{DecodeError, EncodeError};
use crate::header::{v6, Header};
use crate::primitive::{BinaryReader, BinaryWriter, Endianness};
use crate::spectrum::transform::{Identity, Transform};
use crate::spectrum::{read_spectrum, write_spectrum, Shape, Spectrum};

/// Largest tagged block accepted by default: 16 MiB.
pub const DEFAULT_MAX_BLOCK_LEN:     u32 = 16 * 1024 * 1024;
/// Largest spectrum payload accepted by default: 1 GiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 1024 * 1024 * 1024;

// ── ReadOptions ──────────────────────────────────────────────────────────────

/// Decode limits guarding against corrupt size fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Maximum payload length of a single tagged block.
    pub max_block_len:     u32,
    /// Maximum byte length of the spectrum payload implied by the header.
    pub max_payload_bytes: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_block_len:     DEFAULT_MAX_BLOCK_LEN,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

// ── CsFile ───────────────────────────────────────────────────────────────────

/// One Cross-Spectrum file: its header and its spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct CsFile {
    header:   Header,
    spectrum: Spectrum,
}

impl CsFile {
    pub fn new(header: Header, spectrum: Spectrum) -> Self {
        Self { header, spectrum }
    }

    /// Decode a file from disk with default options and no transform.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        load(BufReader::new(File::open(path)?))
    }

    /// Encode to disk, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EncodeError> {
        let mut out = BufWriter::new(File::create(path)?);
        dump(self, &mut out)?;
        out.flush()?;
        Ok(())
    }

    /// All file metadata.
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// Spectrum from the first loop antenna.
    pub fn antenna1(&self) -> &Array2<f32> {
        &self.spectrum.antenna1
    }

    /// Spectrum from the second loop antenna.
    pub fn antenna2(&self) -> &Array2<f32> {
        &self.spectrum.antenna2
    }

    /// Spectrum from the monopole antenna.
    pub fn antenna3(&self) -> &Array2<f32> {
        &self.spectrum.antenna3
    }

    /// Cross-spectrum of antennas 1 and 2.
    pub fn cross12(&self) -> &Array2<Complex32> {
        &self.spectrum.cross12
    }

    /// Cross-spectrum of antennas 1 and 3.
    pub fn cross13(&self) -> &Array2<Complex32> {
        &self.spectrum.cross13
    }

    /// Cross-spectrum of antennas 2 and 3.
    pub fn cross23(&self) -> &Array2<Complex32> {
        &self.spectrum.cross23
    }

    pub fn quality(&self) -> Option<&Array2<f32>> {
        self.spectrum.quality.as_ref()
    }

    pub fn into_parts(self) -> (Header, Spectrum) {
        (self.header, self.spectrum)
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Configurable decoder.  Cheap to clone and safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct CsReader {
    pub options: ReadOptions,
    registry:    Arc<BlockRegistry>,
}

impl CsReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_registry(mut self, registry: Arc<BlockRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Decode one file, passing every decoded row through `transform`.
    pub fn load<R: Read, T: Transform + ?Sized>(
        &self,
        source:    R,
        transform: &T,
    ) -> Result<CsFile, DecodeError> {
        let mut reader = BinaryReader::new(source, Endianness::Big);
        let version = reader.read_i16()?;
        debug!(version, "loading cross-spectrum file");

        match version {
            v6::VERSION => self.load_v6(&mut reader, version, transform),
            other => Err(DecodeError::UnsupportedVersion(other)),
        }
    }

    fn load_v6<R: Read, T: Transform + ?Sized>(
        &self,
        reader:    &mut BinaryReader<R>,
        version:   i16,
        transform: &T,
    ) -> Result<CsFile, DecodeError> {
        let header = v6::read_header(reader, version, &self.registry, &self.options)?;

        let shape = Shape::of(&header)?;
        let payload_len = shape.payload_len()?;
        if payload_len > self.options.max_payload_bytes {
            return Err(DecodeError::LimitExceeded {
                what: "spectrum payload",
                size: payload_len,
                max:  self.options.max_payload_bytes,
            });
        }

        let spectrum = read_spectrum(reader, shape, transform)?;
        Ok(CsFile::new(header, spectrum))
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Configurable encoder.
#[derive(Debug, Clone, Default)]
pub struct CsWriter {
    registry: Arc<BlockRegistry>,
}

impl CsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: Arc<BlockRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Encode one file.  All size and extent fields are recomputed.
    pub fn dump<W: Write>(&self, file: &CsFile, sink: W) -> Result<(), EncodeError> {
        let mut writer = BinaryWriter::new(sink, Endianness::Big);
        match file.header.version {
            v6::VERSION => {
                let header_len = v6::write_header(&mut writer, &file.header, &self.registry)?;
                write_spectrum(&mut writer, &file.header, &file.spectrum)?;
                debug!(header_len, total = writer.position(), "dumped cross-spectrum file");
                Ok(())
            }
            other => Err(EncodeError::UnsupportedVersion(other)),
        }
    }
}

// ── Free functions ───────────────────────────────────────────────────────────

/// Decode with default options and the identity transform.
pub fn load<R: Read>(source: R) -> Result<CsFile, DecodeError> {
    CsReader::default().load(source, &Identity)
}

/// Decode with default options, applying `transform` to every row.
pub fn load_with<R: Read, T: Transform + ?Sized>(source: R, transform: &T) -> Result<CsFile, DecodeError> {
    CsReader::default().load(source, transform)
}

/// Encode with the default block registry.
pub fn dump<W: Write>(file: &CsFile, sink: W) -> Result<(), EncodeError> {
    CsWriter::default().dump(file, sink)
}
