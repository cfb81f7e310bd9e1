use std::path::Path;

use log::debug;
use ndarray::{Array2, Axis, s};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{IoDataset, Splits, csv};
use crate::{MlErr, Result};

pub const FILE: &str = "SNLS80mV.csv";
/// The samples at the start of the record held out for testing.
pub const TEST_SAMPLES: usize = 40_000;
/// The first sample of the estimation data, past the transient that follows the test data.
pub const ESTIMATION_START: usize = 40_650;
pub const DEFAULT_TRAIN_SPLIT: f32 = 0.8;

/// How the Silverbox record is cut into sequences.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SilverboxSplits {
    pub seq_len_train: Option<usize>,
    pub seq_len_val: Option<usize>,
    pub seq_len_test: Option<usize>,
    /// The fraction of the estimation data used for training, the rest is for validation.
    pub train_split: Option<f32>,
    /// Shuffles the training sequences when given.
    pub shuffle_seed: Option<u64>,
}

/// Loads the Silverbox electronic circuit benchmark from `data_dir`.
///
/// The input is the voltage `V1` and the output the voltage `V2`.
pub fn load(data_dir: &Path, splits: &SilverboxSplits) -> Result<Splits> {
    let record = csv::read_columns(&data_dir.join(FILE), &["V1", "V2"])?;
    split_record(record, splits)
}

fn split_record(record: Array2<f32>, splits: &SilverboxSplits) -> Result<Splits> {
    let len = record.len_of(Axis(1));
    if len <= ESTIMATION_START {
        return Err(MlErr::SizeMismatch {
            what: "silverbox samples",
            got: len,
            expected: ESTIMATION_START + 1,
        });
    }

    let train_split = splits.train_split.unwrap_or(DEFAULT_TRAIN_SPLIT);
    if !(0. ..=1.).contains(&train_split) {
        return Err(MlErr::InvalidOption(format!(
            "silverbox train_split must be in [0, 1], got {train_split}"
        )));
    }

    let (u, y) = (record.slice(s![0..1, ..]), record.slice(s![1..2, ..]));
    let estimation = len - ESTIMATION_START;
    let train_end = ESTIMATION_START + (estimation as f32 * train_split) as usize;

    let test = IoDataset::from_record(
        u.slice(s![.., ..TEST_SAMPLES]),
        y.slice(s![.., ..TEST_SAMPLES]),
        splits.seq_len_test,
    )?;
    let train = IoDataset::from_record(
        u.slice(s![.., ESTIMATION_START..train_end]),
        y.slice(s![.., ESTIMATION_START..train_end]),
        splits.seq_len_train,
    )?;
    let valid = IoDataset::from_record(
        u.slice(s![.., train_end..]),
        y.slice(s![.., train_end..]),
        splits.seq_len_val,
    )?;

    let train = match splits.shuffle_seed {
        Some(seed) => {
            let mut order: Vec<usize> = (0..train.len()).collect();
            order.shuffle(&mut StdRng::seed_from_u64(seed));
            let (u, y) = train.select(&order);
            IoDataset::new(u, y)?
        }
        None => train,
    };

    debug!(
        train = train.len(), valid = valid.len(), test = test.len();
        "silverbox sequences loaded"
    );
    Ok(Splits { train, valid, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Array2<f32> {
        Array2::from_shape_fn((2, 50_650), |(c, t)| if c == 0 { t as f32 } else { -(t as f32) })
    }

    #[test]
    fn record_is_split_into_test_and_estimation_data() {
        let splits = SilverboxSplits {
            seq_len_train: Some(1000),
            seq_len_val: Some(500),
            ..Default::default()
        };
        let Splits { train, valid, test } = split_record(record(), &splits).unwrap();

        // 10 000 estimation samples, 8 000 for training
        assert_eq!((train.len(), train.seq_len()), (8, 1000));
        assert_eq!((valid.len(), valid.seq_len()), (4, 500));
        assert_eq!((test.len(), test.seq_len()), (1, TEST_SAMPLES));
        assert_eq!(train.u()[[0, 0, 0]], ESTIMATION_START as f32);
        assert_eq!(valid.y()[[0, 0, 0]], -48_650.);
    }

    #[test]
    fn shuffling_keeps_the_pairs_together() {
        let splits = SilverboxSplits {
            seq_len_train: Some(1000),
            shuffle_seed: Some(1),
            ..Default::default()
        };
        let Splits { train, .. } = split_record(record(), &splits).unwrap();
        assert_eq!(train.u().mapv(|v| -v), train.y());
    }

    #[test]
    fn short_records_are_rejected() {
        let record = Array2::zeros((2, 100));
        assert!(split_record(record, &SilverboxSplits::default()).is_err());
    }
}
