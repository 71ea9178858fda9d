//! Reader and writer for CODAR SeaSonde Cross-Spectrum (`.cs`) files.
//!
//! A Cross-Spectrum file is a big-endian binary container: a versioned
//! header followed by per-range-cell rows of antenna self-spectra,
//! cross-spectra and, for `cskind >= 2`, a quality channel.
//!
//! ```no_run
//! let cs = codarcs::CsFile::open("CSS_ASSA_21_06_26_1400.cs")?;
//! assert_eq!(cs.antenna1().nrows() as i32, cs.header().num_range_cells);
//! # Ok::<(), codarcs::DecodeError>(())
//! ```

pub mod error;
pub mod primitive;
pub mod block;
pub mod header;
pub mod spectrum;
pub mod csfile;
pub mod parallel;

pub use error::{DecodeError, EncodeError, ShapeError, TransformError};
pub use primitive::{BinaryReader, BinaryWriter, Endianness, FourCc};
pub use block::{BlockCodec, BlockMap, BlockRegistry, RawBlockCodec};
pub use header::Header;
pub use spectrum::{Channel, Shape, Spectrum};
pub use spectrum::transform::{Identity, Transform};
pub use csfile::{dump, load, load_with, CsFile, CsReader, CsWriter, ReadOptions};
pub use parallel::{load_many, open_many};
