use std::mem;

use crate::{MlErr, Result};

/// A model's layer parameter iterator.
///
/// This iterator walks a flat parameter slice from the front, yielding one
/// layer's parameters at a time.
pub struct FrontIter<'p> {
    params: &'p [f32],
}

impl<'p> FrontIter<'p> {
    /// Creates a new `FrontIter`.
    ///
    /// # Arguments
    /// * `params` - The flat parameters of the whole model.
    pub fn new(params: &'p [f32]) -> Self {
        Self { params }
    }

    /// Tries to yield the next layer's parameters.
    ///
    /// # Arguments
    /// * `size` - The amount of parameters the next layer holds.
    ///
    /// # Returns
    /// The parameters or an error if there aren't enough of them left.
    pub fn next(&mut self, size: usize) -> Result<&'p [f32]> {
        if size > self.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "layer params",
                got: self.params.len(),
                expected: size,
            });
        }

        let (head, tail) = self.params.split_at(size);
        self.params = tail;
        Ok(head)
    }
}

/// A model's layer parameter and gradient iterator.
///
/// This iterator walks the flat parameters and gradient from the back, which is the order
/// in which layers are visited when propagating the *deltas*.
pub struct BackIter<'p> {
    params: &'p [f32],
    grad: &'p mut [f32],
}

impl<'p> BackIter<'p> {
    /// Creates a new `BackIter`.
    ///
    /// # Arguments
    /// * `params` - The flat parameters of the whole model.
    /// * `grad` - The gradient buffer, same length as `params`.
    pub fn new(params: &'p [f32], grad: &'p mut [f32]) -> Result<Self> {
        if params.len() != grad.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        Ok(Self { params, grad })
    }

    /// Tries to yield the previous layer's parameters and gradient.
    ///
    /// # Arguments
    /// * `size` - The amount of parameters the layer holds.
    ///
    /// # Returns
    /// A tuple with the parameters and the gradient or an error if there aren't enough of
    /// them left.
    pub fn next(&mut self, size: usize) -> Result<(&'p [f32], &'p mut [f32])> {
        let len = self.params.len();
        if size > len {
            return Err(MlErr::SizeMismatch {
                what: "layer params",
                got: len,
                expected: size,
            });
        }

        let (rest, params) = self.params.split_at(len - size);
        let grad = mem::take(&mut self.grad);
        let (rest_grad, grad) = grad.split_at_mut(len - size);

        self.params = rest;
        self.grad = rest_grad;
        Ok((params, grad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_iter_yields_layers_in_order() {
        let params = [1., 2., 3., 4., 5.];
        let mut front = FrontIter::new(&params);

        assert_eq!(front.next(2).unwrap(), &[1., 2.]);
        assert_eq!(front.next(3).unwrap(), &[3., 4., 5.]);
        assert!(front.next(1).is_err());
    }

    #[test]
    fn back_iter_yields_layers_in_reverse() {
        let params = [1., 2., 3., 4., 5.];
        let mut grad = [0.; 5];
        let mut back = BackIter::new(&params, &mut grad).unwrap();

        let (p, g) = back.next(3).unwrap();
        assert_eq!(p, &[3., 4., 5.]);
        g.fill(1.);

        let (p, g) = back.next(2).unwrap();
        assert_eq!(p, &[1., 2.]);
        g.fill(2.);

        assert_eq!(grad, [2., 2., 1., 1., 1.]);
    }
}
