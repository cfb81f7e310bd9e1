use ndarray::Array3;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{MlErr, Result};

/// Zeroes each element with probability `p` while training, scaling the survivors by
/// `1 / (1 - p)`. It's the identity otherwise.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,
    training: bool,
    rng: StdRng,
    mask: Option<Array3<f32>>,
}

impl Dropout {
    /// Creates a new `Dropout`.
    ///
    /// # Arguments
    /// * `p` - The probability of zeroing an element, in `[0, 1)`.
    /// * `seed` - The seed for the mask generator.
    ///
    /// # Returns
    /// An error if `p` is out of range.
    pub fn new(p: f32, seed: u64) -> Result<Self> {
        if !(0. ..1.).contains(&p) {
            return Err(MlErr::InvalidOption(format!(
                "dropout must be in [0, 1), got {p}"
            )));
        }

        Ok(Self {
            p,
            training: true,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        })
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn forward(&mut self, x: Array3<f32>) -> Array3<f32> {
        if !self.training || self.p == 0. {
            self.mask = None;
            return x;
        }

        let p = self.p;
        let keep = 1. / (1. - p);
        let rng = &mut self.rng;
        let mask = Array3::from_shape_fn(x.raw_dim(), |_| {
            if rng.random::<f32>() < p { 0. } else { keep }
        });

        let y = x * &mask;
        self.mask = Some(mask);
        y
    }

    pub fn backward(&mut self, d: Array3<f32>) -> Array3<f32> {
        match self.mask.take() {
            Some(mask) => d * &mask,
            None => d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropout_is_identity_when_evaluating() {
        let mut dropout = Dropout::new(0.5, 7).unwrap();
        dropout.set_training(false);

        let x = Array3::from_elem((2, 3, 4), 1.5);
        assert_eq!(dropout.forward(x.clone()), x);
    }

    #[test]
    fn dropout_masks_and_rescales() {
        let mut dropout = Dropout::new(0.5, 7).unwrap();
        let x = Array3::from_elem((4, 4, 16), 1.);

        let y = dropout.forward(x);
        assert!(y.iter().all(|&v| v == 0. || v == 2.));
        assert!(y.iter().any(|&v| v == 0.));

        let d = dropout.backward(Array3::ones((4, 4, 16)));
        assert_eq!(d, y);
    }

    #[test]
    fn dropout_rejects_invalid_probability() {
        assert!(Dropout::new(1., 0).is_err());
        assert!(Dropout::new(-0.1, 0).is_err());
    }
}
