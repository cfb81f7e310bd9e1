use ndarray::{Array3, ArrayView3};

use super::LossFn;

/// Mean squared error loss function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView3<f32>, y: ArrayView3<f32>) -> f32 {
        (&y_pred - &y)
            .mapv(|x| x.powi(2))
            .mean()
            .unwrap_or_default()
    }

    fn loss_prime(&self, y_pred: ArrayView3<f32>, y: ArrayView3<f32>) -> Array3<f32> {
        (&y_pred - &y) * (2.0 / y_pred.len().max(1) as f32)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;

    #[test]
    fn mse_of_a_constant_offset() {
        let y = Array3::<f32>::zeros((2, 1, 3));
        let y_pred = Array3::from_elem((2, 1, 3), 2.);

        assert_eq!(Mse.loss(y_pred.view(), y.view()), 4.);
        assert!(Mse.loss_prime(y_pred.view(), y.view()).iter().all(|&d| (d - 2. / 3.).abs() < 1e-6));
    }
}
