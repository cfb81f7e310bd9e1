use log::info;
use machine_learning::dataset::{DataLoader, Splits, chen, f16gvt, silverbox};

use crate::{Result, configs::DatasetConfig};

/// The data loaders of a run.
#[derive(Debug, Clone)]
pub struct Loaders {
    pub train: DataLoader,
    pub valid: DataLoader,
    pub test: DataLoader,
}

/// Loads the dataset described by `config`.
///
/// # Arguments
/// * `config` - The dataset and its options.
/// * `train_batch_size` - The batch size of the training and validation loaders.
/// * `test_batch_size` - The batch size of the test loader.
/// * `seed` - The seed of the per epoch shuffle of the training loader.
pub fn load_dataset(
    config: &DatasetConfig,
    train_batch_size: usize,
    test_batch_size: usize,
    seed: u64,
) -> Result<Loaders> {
    let splits = match config {
        DatasetConfig::Chen(o) => Splits {
            train: chen::generate(o.seq_len, &o.train.into())?,
            valid: chen::generate(o.seq_len, &o.valid.into())?,
            test: chen::generate(o.seq_len, &o.test.into())?,
        },
        DatasetConfig::Silverbox(o) => silverbox::load(&o.data_dir, &o.into())?,
        DatasetConfig::F16gvt(o) => f16gvt::load(&o.data_dir, &o.into())?,
    };

    info!(
        dataset = config.name(),
        train = splits.train.len(),
        valid = splits.valid.len(),
        test = splits.test.len();
        "dataset loaded"
    );

    Ok(Loaders {
        train: DataLoader::new(splits.train, train_batch_size, Some(seed))?,
        valid: DataLoader::new(splits.valid, train_batch_size, None)?,
        test: DataLoader::new(splits.test, test_batch_size, None)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::ChenOptions;

    #[test]
    fn chen_splits_have_the_configured_sizes() {
        let mut options = ChenOptions::default();
        options.seq_len = 20;
        options.train.ntotbatch = 6;

        let loaders = load_dataset(&DatasetConfig::Chen(options), 4, 10, 0).unwrap();

        assert_eq!(loaders.train.dataset().len(), 6);
        assert_eq!(loaders.train.num_batches(), 2);
        assert_eq!(loaders.valid.dataset().len(), 5);
        assert_eq!(loaders.test.num_batches(), 1);
        assert_eq!((loaders.train.nu(), loaders.train.ny()), (1, 1));
        assert_eq!(loaders.test.dataset().seq_len(), 20);
    }

    #[test]
    fn missing_data_files_are_errors() {
        let mut options = crate::configs::F16gvtOptions::default();
        options.data_dir = std::env::temp_dir().join("sysid-no-such-dir");

        assert!(load_dataset(&DatasetConfig::F16gvt(options), 1, 1, 0).is_err());
    }
}
