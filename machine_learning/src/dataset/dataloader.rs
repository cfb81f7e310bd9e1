use ndarray::Array3;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::IoDataset;
use crate::{MlErr, Result};

/// A batch of input/output sequences.
#[derive(Debug, Clone)]
pub struct Batch {
    pub u: Array3<f32>,
    pub y: Array3<f32>,
}

/// Yields the sequences of an `IoDataset` in batches, optionally reshuffling them on every
/// epoch.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: IoDataset,
    batch_size: usize,
    order: Vec<usize>,
    rng: Option<StdRng>,
}

impl DataLoader {
    /// Creates a new `DataLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The sequences to iterate.
    /// * `batch_size` - The maximum amount of sequences per batch.
    /// * `shuffle_seed` - The seed of the per epoch shuffle, sequences keep their order if `None`.
    pub fn new(dataset: IoDataset, batch_size: usize, shuffle_seed: Option<u64>) -> Result<Self> {
        if batch_size == 0 {
            return Err(MlErr::InvalidOption("batch_size must be greater than 0".into()));
        }

        Ok(Self {
            order: (0..dataset.len()).collect(),
            dataset,
            batch_size,
            rng: shuffle_seed.map(StdRng::seed_from_u64),
        })
    }

    pub fn dataset(&self) -> &IoDataset {
        &self.dataset
    }

    pub fn nu(&self) -> usize {
        self.dataset.nu()
    }

    pub fn ny(&self) -> usize {
        self.dataset.ny()
    }

    /// Returns the amount of batches of an epoch.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Starts a new epoch, shuffling the sequences if the loader was given a seed.
    pub fn epoch(&mut self) -> Epoch<'_> {
        if let Some(rng) = &mut self.rng {
            self.order.shuffle(rng);
        }

        Epoch {
            loader: self,
            cursor: 0,
        }
    }
}

/// The batches of a single pass over a `DataLoader`.
pub struct Epoch<'a> {
    loader: &'a DataLoader,
    cursor: usize,
}

impl Iterator for Epoch<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        let order = &self.loader.order;
        if self.cursor >= order.len() {
            return None;
        }

        let end = (self.cursor + self.loader.batch_size).min(order.len());
        let (u, y) = self.loader.dataset.select(&order[self.cursor..end]);

        self.cursor = end;
        Some(Batch { u, y })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;

    fn dataset(n: usize) -> IoDataset {
        let u = Array3::from_shape_fn((n, 1, 2), |(i, _, _)| i as f32);
        let y = Array3::from_shape_fn((n, 1, 2), |(i, _, _)| i as f32 + 100.);
        IoDataset::new(u, y).unwrap()
    }

    #[test]
    fn batches_respect_the_batch_size() {
        let mut dl = DataLoader::new(dataset(5), 2, None).unwrap();
        assert_eq!(dl.num_batches(), 3);

        let firsts: Vec<Vec<f32>> = dl
            .epoch()
            .map(|b| b.u.outer_iter().map(|s| s[[0, 0]]).collect())
            .collect();
        assert_eq!(firsts, vec![vec![0., 1.], vec![2., 3.], vec![4.]]);
    }

    #[test]
    fn shuffled_epochs_visit_every_sequence_once() {
        let mut dl = DataLoader::new(dataset(6), 4, Some(3)).unwrap();

        for _ in 0..3 {
            let mut seen: Vec<f32> = dl
                .epoch()
                .flat_map(|b| {
                    assert_eq!(b.u.mapv(|v| v + 100.), b.y);
                    b.u.outer_iter().map(|s| s[[0, 0]]).collect::<Vec<_>>()
                })
                .collect();
            seen.sort_by(f32::total_cmp);
            assert_eq!(seen, vec![0., 1., 2., 3., 4., 5.]);
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(DataLoader::new(dataset(1), 0, None).is_err());
    }
}
