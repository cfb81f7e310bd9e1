use ndarray::{Array3, ArrayView3};

pub trait LossFn {
    fn loss(&self, y_pred: ArrayView3<f32>, y: ArrayView3<f32>) -> f32;
    fn loss_prime(&self, y_pred: ArrayView3<f32>, y: ArrayView3<f32>) -> Array3<f32>;
}
