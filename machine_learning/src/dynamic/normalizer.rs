use ndarray::prelude::*;

use crate::{MlErr, Result};

/// Added to every provided offset and scale so that a zero scale never divides.
pub const EPSILON: f32 = 1e-16;

/// A per channel affine normalization of `(batch, channel, time)` signals.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer1D {
    scale: Array1<f32>,
    offset: Array1<f32>,
}

impl Normalizer1D {
    /// Creates a new `Normalizer1D`.
    ///
    /// # Arguments
    /// * `channels` - The amount of channels of the signals to normalize.
    /// * `scale` - The scale of each channel, all ones if `None`.
    /// * `offset` - The offset of each channel, all zeros if `None`.
    ///
    /// # Returns
    /// An error if a provided vector doesn't have one value per channel.
    pub fn new(channels: usize, scale: Option<&[f32]>, offset: Option<&[f32]>) -> Result<Self> {
        let scale = match scale {
            Some(scale) => Self::provided(channels, "normalizer scale", scale)?,
            None => Array1::ones(channels),
        };

        let offset = match offset {
            Some(offset) => Self::provided(channels, "normalizer offset", offset)?,
            None => Array1::zeros(channels),
        };

        Ok(Self { scale, offset })
    }

    /// Creates the identity `Normalizer1D` over `channels` channels.
    pub fn identity(channels: usize) -> Self {
        Self {
            scale: Array1::ones(channels),
            offset: Array1::zeros(channels),
        }
    }

    fn provided(channels: usize, what: &'static str, values: &[f32]) -> Result<Array1<f32>> {
        if values.len() != channels {
            return Err(MlErr::SizeMismatch {
                what,
                got: values.len(),
                expected: channels,
            });
        }

        Ok(Array1::from_iter(values.iter().map(|v| v + EPSILON)))
    }

    pub fn channels(&self) -> usize {
        self.scale.len()
    }

    pub fn scale(&self) -> ArrayView1<'_, f32> {
        self.scale.view()
    }

    pub fn offset(&self) -> ArrayView1<'_, f32> {
        self.offset.view()
    }

    /// Returns `(x - offset) / scale`.
    pub fn normalize(&self, x: ArrayView3<f32>) -> Result<Array3<f32>> {
        self.check_channels(&x)?;
        Ok((&x - &per_channel(&self.offset)) / &per_channel(&self.scale))
    }

    /// Returns `x * scale + offset`.
    pub fn unnormalize(&self, x: ArrayView3<f32>) -> Result<Array3<f32>> {
        self.check_channels(&x)?;
        Ok(&x * &per_channel(&self.scale) + &per_channel(&self.offset))
    }

    /// Scales the *deltas* of an unnormalized signal back into the normalized space.
    pub fn scale_deltas(&self, d: Array3<f32>) -> Result<Array3<f32>> {
        self.check_channels(&d.view())?;
        Ok(d * &per_channel(&self.scale))
    }

    fn check_channels(&self, x: &ArrayView3<f32>) -> Result<()> {
        let channels = x.len_of(Axis(1));
        if channels != self.channels() {
            return Err(MlErr::SizeMismatch {
                what: "normalizer channels",
                got: channels,
                expected: self.channels(),
            });
        }

        Ok(())
    }
}

fn per_channel(v: &Array1<f32>) -> ArrayView3<'_, f32> {
    v.view().insert_axis(Axis(0)).insert_axis(Axis(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnormalize_undoes_normalize() {
        let norm = Normalizer1D::new(2, Some(&[0.5, 3.][..]), Some(&[-1., 2.][..])).unwrap();
        let x = Array3::from_shape_fn((2, 2, 7), |(b, c, t)| (b * 7 + t) as f32 * (c as f32 - 0.3));

        let normalized = norm.normalize(x.view()).unwrap();
        let back = norm.unnormalize(normalized.view()).unwrap();

        assert!(back.iter().zip(x.iter()).all(|(a, b)| (a - b).abs() < 1e-4));
    }

    #[test]
    fn zero_scale_does_not_divide_by_zero() {
        let norm = Normalizer1D::new(1, Some(&[0.][..]), None).unwrap();
        let y = norm.normalize(Array3::zeros((1, 1, 3)).view()).unwrap();
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn stats_must_match_the_channels() {
        assert!(Normalizer1D::new(2, Some(&[1.][..]), None).is_err());
        assert!(Normalizer1D::identity(2).normalize(Array3::zeros((1, 3, 1)).view()).is_err());
    }
}
