//! Per-row channel transforms applied while decoding.
//!
//! Preprocessing (gain conversion, normalization, clipping …) lives outside
//! the codec.  The codec only offers this seam: every decoded row of every
//! channel is handed to a [`Transform`] before it is stored.  Complex rows are
//! passed as two real rows, real parts first.
//!
//! Rows arrive one at a time in file order, so a transform must either be
//! stateless or manage its own state across calls.

use crate::error::TransformError;
use crate::spectrum::Channel;

pub trait Transform {
    fn apply(&self, channel: Channel, row: Vec<f32>) -> Result<Vec<f32>, TransformError>;
}

impl<T: Transform + ?Sized> Transform for &T {
    fn apply(&self, channel: Channel, row: Vec<f32>) -> Result<Vec<f32>, TransformError> {
        (**self).apply(channel, row)
    }
}

/// Returns every row untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, _: Channel, row: Vec<f32>) -> Result<Vec<f32>, TransformError> {
        Ok(row)
    }
}

/// A [`Transform`] backed by a closure.  Build one with [`from_fn`].
#[derive(Clone, Copy)]
pub struct FnTransform<F>(F);

/// Wrap a closure as a [`Transform`].
///
/// ```
/// use codarcs::spectrum::{transform, Channel};
///
/// let clip = transform::from_fn(|_: Channel, row: Vec<f32>| {
///     Ok(row.into_iter().map(|v| v.max(0.0)).collect())
/// });
/// # let _ = clip;
/// ```
pub fn from_fn<F>(f: F) -> FnTransform<F>
where
    F: Fn(Channel, Vec<f32>) -> Result<Vec<f32>, TransformError>,
{
    FnTransform(f)
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(Channel, Vec<f32>) -> Result<Vec<f32>, TransformError>,
{
    fn apply(&self, channel: Channel, row: Vec<f32>) -> Result<Vec<f32>, TransformError> {
        (self.0)(channel, row)
    }
}
