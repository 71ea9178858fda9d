//! Batch decoding of many independent files.
//!
//! Each file is decoded on its own, so results are returned one per input in
//! input order and a corrupt file never affects its neighbours.  With the
//! `parallel` feature the batch is spread over Rayon's global pool; without
//! it the same calls run sequentially.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::csfile::{CsFile, CsReader};
use crate::error::DecodeError;
use crate::spectrum::transform::Transform;

/// Decode every buffer in `sources` with the same reader and transform.
pub fn load_many<T: Transform + Sync + ?Sized>(
    reader:    &CsReader,
    sources:   &[&[u8]],
    transform: &T,
) -> Vec<Result<CsFile, DecodeError>> {
    debug!(files = sources.len(), "batch decode");

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        sources
            .par_iter()
            .map(|bytes| reader.load(*bytes, transform))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        sources
            .iter()
            .map(|bytes| reader.load(*bytes, transform))
            .collect()
    }
}

/// Open and decode every file in `paths`.
pub fn open_many<P, T>(
    reader:    &CsReader,
    paths:     &[P],
    transform: &T,
) -> Vec<Result<CsFile, DecodeError>>
where
    P: AsRef<Path> + Sync,
    T: Transform + Sync + ?Sized,
{
    let open_one = |path: &P| -> Result<CsFile, DecodeError> {
        let file = File::open(path)?;
        reader.load(BufReader::new(file), transform)
    };

    debug!(files = paths.len(), "batch open");

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        paths.par_iter().map(open_one).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        paths.iter().map(open_one).collect()
    }
}
