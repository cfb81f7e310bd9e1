pub mod chen;
mod csv;
mod dataloader;
pub mod f16gvt;
mod io_dataset;
pub mod silverbox;

pub use chen::ChenSplit;
pub use dataloader::{Batch, DataLoader, Epoch};
pub use f16gvt::F16gvtSplits;
pub use io_dataset::IoDataset;
pub use silverbox::SilverboxSplits;

/// The sequences of a benchmark, split for training, validation and testing.
#[derive(Debug, Clone)]
pub struct Splits {
    pub train: IoDataset,
    pub valid: IoDataset,
    pub test: IoDataset,
}
