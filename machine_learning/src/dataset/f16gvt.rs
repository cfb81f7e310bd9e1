use std::path::Path;

use log::debug;
use ndarray::{Array2, ArrayView2, Axis, s};

use super::{IoDataset, Splits, csv};
use crate::Result;

pub const TRAIN_FILE: &str = "F16Data_SineSw_Level3.csv";
pub const TEST_FILE: &str = "F16Data_SineSw_Level4_Validation.csv";
/// The fraction of the training record kept for training, the rest is for validation.
pub const TRAIN_SPLIT: f32 = 0.8;

const COLUMNS: [&str; 4] = ["Force", "Acceleration1", "Acceleration2", "Acceleration3"];

/// How the F-16 ground vibration test records are cut into sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct F16gvtSplits {
    pub seq_len_train: Option<usize>,
    pub seq_len_val: Option<usize>,
    pub seq_len_test: Option<usize>,
}

/// Loads the F-16 ground vibration test benchmark from `data_dir`.
///
/// The input is the shaker force and the outputs the three measured accelerations.
pub fn load(data_dir: &Path, splits: &F16gvtSplits) -> Result<Splits> {
    let estimation = csv::read_columns(&data_dir.join(TRAIN_FILE), &COLUMNS)?;
    let validation = csv::read_columns(&data_dir.join(TEST_FILE), &COLUMNS)?;
    split_records(estimation, validation, splits)
}

fn split_records(
    estimation: Array2<f32>,
    validation: Array2<f32>,
    splits: &F16gvtSplits,
) -> Result<Splits> {
    let len = estimation.len_of(Axis(1));
    let train_end = (len as f32 * TRAIN_SPLIT) as usize;

    let (u, y) = io(&estimation, 0, train_end);
    let train = IoDataset::from_record(u, y, splits.seq_len_train)?;

    let (u, y) = io(&estimation, train_end, len);
    let valid = IoDataset::from_record(u, y, splits.seq_len_val)?;

    let (u, y) = io(&validation, 0, validation.len_of(Axis(1)));
    let test = IoDataset::from_record(u, y, splits.seq_len_test)?;

    debug!(
        train = train.len(), valid = valid.len(), test = test.len();
        "f16gvt sequences loaded"
    );
    Ok(Splits { train, valid, test })
}

/// Splits the samples `from..to` of a record into the force and the accelerations.
fn io(record: &Array2<f32>, from: usize, to: usize) -> (ArrayView2<'_, f32>, ArrayView2<'_, f32>) {
    (
        record.slice(s![0..1, from..to]),
        record.slice(s![1.., from..to]),
    )
}
