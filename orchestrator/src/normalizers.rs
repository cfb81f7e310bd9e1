use machine_learning::{MlErr, dataset::DataLoader, dynamic::Normalizer1D};
use ndarray::{Array1, Array3, Axis};

use crate::Result;

/// Per channel statistics accumulated over batches.
struct Moments {
    mean: Array1<f32>,
    var: Array1<f32>,
}

impl Moments {
    fn new(channels: usize) -> Self {
        Self {
            mean: Array1::zeros(channels),
            var: Array1::zeros(channels),
        }
    }

    /// Adds the mean over `(batch, time)` and the batch mean of the variance over time.
    fn add(&mut self, x: &Array3<f32>) -> Result<()> {
        let empty = || MlErr::EmptyDataset("normalization");

        let per_seq = x.mean_axis(Axis(2)).ok_or_else(empty)?;
        self.mean += &per_seq.mean_axis(Axis(0)).ok_or_else(empty)?;

        let var = x.var_axis(Axis(2), 0.);
        self.var += &var.mean_axis(Axis(0)).ok_or_else(empty)?;
        Ok(())
    }

    fn into_normalizer(self, count: f32, variance_scaler: f32) -> Result<Normalizer1D> {
        let scale = (self.var / count).mapv(|v| v.sqrt() * variance_scaler).to_vec();
        let offset = (self.mean / count).to_vec();

        let normalizer =
            Normalizer1D::new(scale.len(), Some(scale.as_slice()), Some(offset.as_slice()))?;
        Ok(normalizer)
    }
}

/// Computes the input and output normalizers from one pass over the training data.
///
/// The batch statistics are summed and divided by the amount of sequences, so they're only
/// exact averages for a batch size of one.
///
/// # Arguments
/// * `loader` - The training data.
/// * `variance_scaler` - The amount of standard deviations mapped to one.
pub fn compute_normalizers(
    loader: &mut DataLoader,
    variance_scaler: f32,
) -> Result<(Normalizer1D, Normalizer1D)> {
    let mut u_moments = Moments::new(loader.nu());
    let mut y_moments = Moments::new(loader.ny());
    let mut count = 0;

    for batch in loader.epoch() {
        count += batch.u.len_of(Axis(0));
        u_moments.add(&batch.u)?;
        y_moments.add(&batch.y)?;
    }

    if count == 0 {
        return Err(MlErr::EmptyDataset("normalization").into());
    }

    Ok((
        u_moments.into_normalizer(count as f32, variance_scaler)?,
        y_moments.into_normalizer(count as f32, variance_scaler)?,
    ))
}

#[cfg(test)]
mod tests {
    use machine_learning::dataset::IoDataset;
    use ndarray::array;

    use super::*;

    #[test]
    fn single_sequence_batches_give_the_mean_and_deviation() {
        // two sequences, each with one input and one output channel
        let u = array![[[1., 3.]], [[5., 7.]]];
        let y = array![[[0., 0.]], [[2., 2.]]];
        let mut loader = DataLoader::new(IoDataset::new(u, y).unwrap(), 1, None).unwrap();

        let (u_norm, y_norm) = compute_normalizers(&mut loader, 2.).unwrap();

        assert!((u_norm.offset()[0] - 4.).abs() < 1e-6);
        // the variance within each sequence is 1
        assert!((u_norm.scale()[0] - 2.).abs() < 1e-6);
        assert!((y_norm.offset()[0] - 1.).abs() < 1e-6);
        assert!(y_norm.scale()[0].abs() < 1e-6);
    }

    #[test]
    fn batch_means_are_divided_by_the_sequence_count() {
        let u = array![[[1., 3.]], [[5., 7.]]];
        let y = array![[[0., 0.]], [[2., 2.]]];
        let mut loader = DataLoader::new(IoDataset::new(u, y).unwrap(), 2, None).unwrap();

        let (u_norm, _) = compute_normalizers(&mut loader, 1.).unwrap();
        assert!((u_norm.offset()[0] - 2.).abs() < 1e-6);
    }
}
