//! Spectrum payload: antenna self-spectra, cross-spectra and quality.
//!
//! The payload follows the header immediately and is stored row-major, one
//! range cell at a time.  Each row holds, in order:
//!
//! | Channel   | Kind    | f32 values        |
//! |-----------|---------|-------------------|
//! | antenna1  | real    | `doppler`         |
//! | antenna2  | real    | `doppler`         |
//! | antenna3  | real    | `doppler`         |
//! | cross12   | complex | `2 × doppler`     |
//! | cross13   | complex | `2 × doppler`     |
//! | cross23   | complex | `2 × doppler`     |
//! | quality   | real    | `doppler`, only when `cskind >= 2` |
//!
//! Complex values are interleaved `re, im, re, im, …`.

pub mod transform;

use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Write};

use ndarray::{Array2, ArrayView1};
use num_complex::Complex32;
use tracing::debug;

use crate::error::{DecodeError, EncodeError, ShapeError};
use crate::header::Header;
use crate::primitive::{BinaryReader, BinaryWriter};
use transform::Transform;

// ── Channel ──────────────────────────────────────────────────────────────────

/// One named measurement matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Antenna1,
    Antenna2,
    Antenna3,
    Cross12,
    Cross13,
    Cross23,
    Quality,
}

impl Channel {
    /// On-disk order within a row.
    pub const ALL: [Channel; 7] = [
        Channel::Antenna1,
        Channel::Antenna2,
        Channel::Antenna3,
        Channel::Cross12,
        Channel::Cross13,
        Channel::Cross23,
        Channel::Quality,
    ];

    /// Channels present in every row for a given quality setting.
    pub fn row_order(has_quality: bool) -> &'static [Channel] {
        if has_quality { &Self::ALL } else { &Self::ALL[..6] }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Antenna1 => "antenna1",
            Channel::Antenna2 => "antenna2",
            Channel::Antenna3 => "antenna3",
            Channel::Cross12  => "cross12",
            Channel::Cross13  => "cross13",
            Channel::Cross23  => "cross23",
            Channel::Quality  => "quality",
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Channel::Cross12 | Channel::Cross13 | Channel::Cross23)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Borrowed view of one channel matrix.
#[derive(Debug, Clone, Copy)]
pub enum ChannelRef<'a> {
    Real(&'a Array2<f32>),
    Complex(&'a Array2<Complex32>),
}

impl ChannelRef<'_> {
    /// `(rows, columns)`; columns count complex elements, not floats.
    pub fn dim(&self) -> (usize, usize) {
        match self {
            ChannelRef::Real(m) => m.dim(),
            ChannelRef::Complex(m) => m.dim(),
        }
    }
}

// ── Shape ────────────────────────────────────────────────────────────────────

/// Validated payload dimensions derived from a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub range_cells:   usize,
    pub doppler_cells: usize,
    pub has_quality:   bool,
}

impl Shape {
    /// Fails when either cell count is negative.
    pub fn of(header: &Header) -> Result<Self, ShapeError> {
        let cells = |axis, count: i32| {
            usize::try_from(count).map_err(|_| ShapeError::NegativeCells { axis, count })
        };
        Ok(Self {
            range_cells:   cells("range", header.num_range_cells)?,
            doppler_cells: cells("doppler", header.num_doppler_cells)?,
            has_quality:   header.has_quality(),
        })
    }

    /// f32 values per range row: 3 real + 3 complex (+ quality).
    pub fn row_floats(&self) -> Option<usize> {
        let real_channels = if self.has_quality { 4 } else { 3 };
        self.doppler_cells.checked_mul(real_channels + 3 * 2)
    }

    /// Total payload byte length.
    pub fn payload_len(&self) -> Result<u64, ShapeError> {
        let overflow = ShapeError::Overflow { rows: self.range_cells, columns: self.doppler_cells };
        self.row_floats()
            .and_then(|row| u64::try_from(row).ok())
            .and_then(|row| row.checked_mul(4))
            .and_then(|row| row.checked_mul(self.range_cells as u64))
            .ok_or(overflow)
    }
}

// ── Spectrum ─────────────────────────────────────────────────────────────────

/// Decoded measurement payload of one file.
///
/// Every matrix has `num_range_cells` rows and `num_doppler_cells` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// First loop antenna.
    pub antenna1: Array2<f32>,
    /// Second loop antenna.
    pub antenna2: Array2<f32>,
    /// Monopole.
    pub antenna3: Array2<f32>,
    pub cross12:  Array2<Complex32>,
    pub cross13:  Array2<Complex32>,
    pub cross23:  Array2<Complex32>,
    /// Present only for `cskind >= 2`.
    pub quality:  Option<Array2<f32>>,
}

impl Spectrum {
    /// All-zero spectrum of the given shape.
    pub fn zeros(shape: Shape) -> Self {
        let dim = (shape.range_cells, shape.doppler_cells);
        let complex = || Array2::from_elem(dim, Complex32::new(0.0, 0.0));
        Self {
            antenna1: Array2::zeros(dim),
            antenna2: Array2::zeros(dim),
            antenna3: Array2::zeros(dim),
            cross12:  complex(),
            cross13:  complex(),
            cross23:  complex(),
            quality:  shape.has_quality.then(|| Array2::zeros(dim)),
        }
    }

    pub fn channel(&self, channel: Channel) -> Option<ChannelRef<'_>> {
        Some(match channel {
            Channel::Antenna1 => ChannelRef::Real(&self.antenna1),
            Channel::Antenna2 => ChannelRef::Real(&self.antenna2),
            Channel::Antenna3 => ChannelRef::Real(&self.antenna3),
            Channel::Cross12  => ChannelRef::Complex(&self.cross12),
            Channel::Cross13  => ChannelRef::Complex(&self.cross13),
            Channel::Cross23  => ChannelRef::Complex(&self.cross23),
            Channel::Quality  => ChannelRef::Real(self.quality.as_ref()?),
        })
    }
}

// ── Decode ───────────────────────────────────────────────────────────────────

/// Upper bound on cells reserved per channel before any row is read; larger
/// payloads grow as rows arrive.
const PREALLOC_CELLS: usize = 64 * 1024;

/// Row accumulator; turned into fixed-shape matrices once every row is in.
struct SpectrumBuilder {
    shape:   Shape,
    real:    [Vec<f32>; 4],
    complex: [Vec<Complex32>; 3],
}

impl SpectrumBuilder {
    fn new(shape: Shape) -> Self {
        let cells = shape.range_cells.saturating_mul(shape.doppler_cells).min(PREALLOC_CELLS);
        let real = || Vec::with_capacity(cells);
        let complex = || Vec::with_capacity(cells);
        Self {
            shape,
            real:    [real(), real(), real(), if shape.has_quality { real() } else { Vec::new() }],
            complex: [complex(), complex(), complex()],
        }
    }

    fn push_real(&mut self, channel: Channel, row: Vec<f32>) -> Result<(), ShapeError> {
        let slot = match channel {
            Channel::Antenna1 => 0,
            Channel::Antenna2 => 1,
            Channel::Antenna3 => 2,
            Channel::Quality  => 3,
            Channel::Cross12 | Channel::Cross13 | Channel::Cross23 => {
                return Err(ShapeError::ChannelKind { channel, expected: "real" });
            }
        };
        self.real[slot].extend(row);
        Ok(())
    }

    fn push_complex(&mut self, channel: Channel, re: Vec<f32>, im: Vec<f32>) -> Result<(), ShapeError> {
        let slot = match channel {
            Channel::Cross12 => 0,
            Channel::Cross13 => 1,
            Channel::Cross23 => 2,
            Channel::Antenna1 | Channel::Antenna2 | Channel::Antenna3 | Channel::Quality => {
                return Err(ShapeError::ChannelKind { channel, expected: "complex" });
            }
        };
        self.complex[slot].extend(re.into_iter().zip(im).map(|(re, im)| Complex32::new(re, im)));
        Ok(())
    }

    fn finish(self) -> Result<Spectrum, ShapeError> {
        let dim = (self.shape.range_cells, self.shape.doppler_cells);
        let [a1, a2, a3, q] = self.real;
        let [c12, c13, c23] = self.complex;
        Ok(Spectrum {
            antenna1: Array2::from_shape_vec(dim, a1)?,
            antenna2: Array2::from_shape_vec(dim, a2)?,
            antenna3: Array2::from_shape_vec(dim, a3)?,
            cross12:  Array2::from_shape_vec(dim, c12)?,
            cross13:  Array2::from_shape_vec(dim, c13)?,
            cross23:  Array2::from_shape_vec(dim, c23)?,
            quality:  if self.shape.has_quality {
                Some(Array2::from_shape_vec(dim, q)?)
            } else {
                None
            },
        })
    }
}

/// Split interleaved `re, im` pairs into separate rows.
pub fn deinterleave(values: &[f32]) -> (Vec<f32>, Vec<f32>) {
    values.chunks_exact(2).map(|pair| (pair[0], pair[1])).unzip()
}

fn transform_row<T: Transform + ?Sized>(
    transform: &T,
    channel:   Channel,
    row:       usize,
    values:    Vec<f32>,
) -> Result<Vec<f32>, DecodeError> {
    let expected = values.len();
    let out = transform
        .apply(channel, values)
        .map_err(|source| DecodeError::Transform { channel, row, source })?;
    if out.len() != expected {
        return Err(ShapeError::RowLength { channel, row, expected, found: out.len() }.into());
    }
    Ok(out)
}

/// Decode `shape.range_cells` rows, passing each row of each channel through
/// `transform` before it is stored.
pub fn read_spectrum<R: Read, T: Transform + ?Sized>(
    reader:    &mut BinaryReader<R>,
    shape:     Shape,
    transform: &T,
) -> Result<Spectrum, DecodeError> {
    let doppler = shape.doppler_cells;
    let mut builder = SpectrumBuilder::new(shape);

    for row in 0..shape.range_cells {
        for &channel in Channel::row_order(shape.has_quality) {
            if channel.is_complex() {
                let interleaved = reader.read_f32_vec(2 * doppler)?;
                let (re, im) = deinterleave(&interleaved);
                let re = transform_row(transform, channel, row, re)?;
                let im = transform_row(transform, channel, row, im)?;
                builder.push_complex(channel, re, im)?;
            } else {
                let values = reader.read_f32_vec(doppler)?;
                builder.push_real(channel, transform_row(transform, channel, row, values)?)?;
            }
        }
    }

    let spectrum = builder.finish()?;
    debug!(rows = shape.range_cells, doppler, quality = shape.has_quality, "decoded spectrum");
    Ok(spectrum)
}

// ── Encode ───────────────────────────────────────────────────────────────────

fn check_shapes(spectrum: &Spectrum, shape: Shape, cskind: i16) -> Result<(), EncodeError> {
    let expected = (shape.range_cells, shape.doppler_cells);
    for &channel in Channel::row_order(shape.has_quality) {
        let found = spectrum
            .channel(channel)
            .ok_or(EncodeError::MissingQuality(cskind))?
            .dim();
        if found != expected {
            return Err(EncodeError::ShapeMismatch { channel, expected, found });
        }
    }
    Ok(())
}

fn real_row(row: ArrayView1<'_, f32>) -> Cow<'_, [f32]> {
    match row.to_slice() {
        Some(values) => Cow::Borrowed(values),
        None => Cow::Owned(row.to_vec()),
    }
}

/// Encode the payload rows in on-disk order.  Values are written exactly as
/// stored; no transform is applied on the way out.
pub fn write_spectrum<W: Write>(
    writer:   &mut BinaryWriter<W>,
    header:   &Header,
    spectrum: &Spectrum,
) -> Result<(), EncodeError> {
    let shape = Shape::of(header)?;
    check_shapes(spectrum, shape, header.cskind)?;

    let mut interleaved = Vec::with_capacity(2 * shape.doppler_cells);
    for row in 0..shape.range_cells {
        for &channel in Channel::row_order(shape.has_quality) {
            match spectrum.channel(channel) {
                Some(ChannelRef::Real(m)) => writer.write_f32_slice(&real_row(m.row(row)))?,
                Some(ChannelRef::Complex(m)) => {
                    interleaved.clear();
                    for c in m.row(row) {
                        interleaved.push(c.re);
                        interleaved.push(c.im);
                    }
                    writer.write_f32_slice(&interleaved)?;
                }
                None => return Err(EncodeError::MissingQuality(header.cskind)),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Endianness;
    use crate::spectrum::transform::{from_fn, Identity};

    fn shape(range: usize, doppler: usize, quality: bool) -> Shape {
        Shape { range_cells: range, doppler_cells: doppler, has_quality: quality }
    }

    fn payload(shape: Shape) -> Vec<u8> {
        let floats = shape.row_floats().unwrap() * shape.range_cells;
        (0..floats).flat_map(|i| (i as f32).to_be_bytes()).collect()
    }

    #[test]
    fn complex_rows_are_interleaved_pairs() {
        // one row, doppler 2: a1 a2 a3 = 6 floats, then cross12
        let mut floats = vec![0.0f32; 6];
        floats.extend([1.0, 2.0, 3.0, 4.0]);
        floats.extend([0.0; 8]);
        let bytes: Vec<u8> = floats.iter().flat_map(|v| v.to_be_bytes()).collect();

        let mut r = BinaryReader::new(&bytes[..], Endianness::Big);
        let s = read_spectrum(&mut r, shape(1, 2, false), &Identity).unwrap();
        assert_eq!(s.cross12.row(0).to_vec(), vec![Complex32::new(1.0, 2.0), Complex32::new(3.0, 4.0)]);
        assert!(s.quality.is_none());
    }

    #[test]
    fn row_order_and_quality() {
        let sh = shape(2, 3, true);
        let bytes = payload(sh);
        let mut r = BinaryReader::new(&bytes[..], Endianness::Big);
        let s = read_spectrum(&mut r, sh, &Identity).unwrap();
        // row = 3*3 real + 3*6 complex + 3 quality = 30 floats
        assert_eq!(sh.row_floats(), Some(30));
        assert_eq!(s.antenna1.row(0).to_vec(), vec![0.0, 1.0, 2.0]);
        assert_eq!(s.antenna3.row(1).to_vec(), vec![36.0, 37.0, 38.0]);
        assert_eq!(s.cross23[[0, 0]], Complex32::new(21.0, 22.0));
        assert_eq!(s.quality.as_ref().unwrap().row(1).to_vec(), vec![57.0, 58.0, 59.0]);
        assert_eq!(r.position(), bytes.len() as u64);
    }

    #[test]
    fn transform_sees_every_row_channel() {
        let sh = shape(1, 2, false);
        let bytes = payload(sh);
        let mut r = BinaryReader::new(&bytes[..], Endianness::Big);
        let negate = from_fn(|_: Channel, row: Vec<f32>| Ok(row.into_iter().map(|v| -v).collect()));
        let s = read_spectrum(&mut r, sh, &negate).unwrap();
        assert_eq!(s.antenna2.row(0).to_vec(), vec![-2.0, -3.0]);
        assert_eq!(s.cross12[[0, 1]], Complex32::new(-8.0, -9.0));
    }

    #[test]
    fn transform_errors_propagate() {
        let sh = shape(2, 2, false);
        let bytes = payload(sh);
        let mut r = BinaryReader::new(&bytes[..], Endianness::Big);
        let picky = from_fn(|channel: Channel, row: Vec<f32>| {
            if channel == Channel::Cross13 {
                Err("no cross13".into())
            } else {
                Ok(row)
            }
        });
        match read_spectrum(&mut r, sh, &picky) {
            Err(DecodeError::Transform { channel, row, .. }) => {
                assert_eq!(channel, Channel::Cross13);
                assert_eq!(row, 0);
            }
            other => panic!("expected Transform error, got {other:?}"),
        }
    }

    #[test]
    fn transform_must_keep_length() {
        let sh = shape(1, 2, false);
        let bytes = payload(sh);
        let mut r = BinaryReader::new(&bytes[..], Endianness::Big);
        let shrink = from_fn(|_: Channel, mut row: Vec<f32>| {
            row.pop();
            Ok(row)
        });
        assert!(matches!(
            read_spectrum(&mut r, sh, &shrink),
            Err(DecodeError::InvalidShape(ShapeError::RowLength { expected: 2, found: 1, .. }))
        ));
    }

    #[test]
    fn empty_shapes_decode_to_empty_matrices() {
        let mut r = BinaryReader::new(&[][..], Endianness::Big);
        let s = read_spectrum(&mut r, shape(0, 16, true), &Identity).unwrap();
        assert_eq!(s.antenna1.dim(), (0, 16));
        assert_eq!(s.quality.unwrap().dim(), (0, 16));
    }

    #[test]
    fn payload_len_overflow_is_an_error() {
        assert!(matches!(
            shape(usize::MAX, usize::MAX, true).payload_len(),
            Err(ShapeError::Overflow { .. })
        ));
        assert_eq!(shape(32, 512, false).payload_len().unwrap(), 32 * 512 * 9 * 4);
    }

    #[test]
    fn builder_reservation_is_bounded() {
        let builder = SpectrumBuilder::new(shape(29_000, 1_000, true));
        assert!(builder.real.iter().all(|v| v.capacity() <= PREALLOC_CELLS));
        assert!(builder.complex.iter().all(|v| v.capacity() <= PREALLOC_CELLS));
    }

    #[test]
    fn rows_of_the_wrong_kind_are_rejected() {
        let mut builder = SpectrumBuilder::new(shape(1, 1, false));
        assert!(matches!(
            builder.push_real(Channel::Cross12, vec![0.0]),
            Err(ShapeError::ChannelKind { channel: Channel::Cross12, expected: "real" })
        ));
        assert!(matches!(
            builder.push_complex(Channel::Quality, vec![0.0], vec![0.0]),
            Err(ShapeError::ChannelKind { channel: Channel::Quality, expected: "complex" })
        ));
        assert!(builder.push_real(Channel::Antenna1, vec![1.0]).is_ok());
    }

    #[test]
    fn deinterleave_splits_even_and_odd() {
        let (re, im) = deinterleave(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(re, vec![1.0, 3.0]);
        assert_eq!(im, vec![2.0, 4.0]);
    }

    #[test]
    fn channel_names() {
        let names: Vec<&str> = Channel::row_order(false).iter().map(|c| c.name()).collect();
        assert_eq!(names, ["antenna1", "antenna2", "antenna3", "cross12", "cross13", "cross23"]);
        assert!(Channel::Cross13.is_complex());
        assert!(!Channel::Quality.is_complex());
    }
}
