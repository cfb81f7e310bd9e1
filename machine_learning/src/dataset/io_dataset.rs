use ndarray::prelude::*;

use crate::{MlErr, Result};

/// A set of input/output sequences, both shaped `(sequence, channel, time)`.
#[derive(Debug, Clone, PartialEq)]
pub struct IoDataset {
    u: Array3<f32>,
    y: Array3<f32>,
}

impl IoDataset {
    /// Creates a new `IoDataset`.
    ///
    /// # Returns
    /// An error if the inputs and outputs don't have the same amount of sequences and time steps.
    pub fn new(u: Array3<f32>, y: Array3<f32>) -> Result<Self> {
        let (un, _, ut) = u.dim();
        let (yn, _, yt) = y.dim();

        if un != yn {
            return Err(MlErr::SizeMismatch {
                what: "output sequences",
                got: yn,
                expected: un,
            });
        }

        if ut != yt {
            return Err(MlErr::SizeMismatch {
                what: "output sequence length",
                got: yt,
                expected: ut,
            });
        }

        Ok(Self { u, y })
    }

    /// Cuts a single long record, shaped `(channel, time)`, into consecutive sequences of
    /// `seq_len` steps. The trailing steps that don't fill a sequence are dropped, a `seq_len` of
    /// `None` keeps the whole record as one sequence.
    pub fn from_record(
        u: ArrayView2<f32>,
        y: ArrayView2<f32>,
        seq_len: Option<usize>,
    ) -> Result<Self> {
        let len = u.len_of(Axis(1));
        if y.len_of(Axis(1)) != len {
            return Err(MlErr::SizeMismatch {
                what: "output record length",
                got: y.len_of(Axis(1)),
                expected: len,
            });
        }

        let seq_len = match seq_len {
            Some(0) => return Err(MlErr::InvalidOption("seq_len must be greater than 0".into())),
            Some(seq_len) => seq_len.min(len),
            None => len,
        };

        let nseq = if seq_len == 0 { 0 } else { len / seq_len };
        let cut = |x: ArrayView2<f32>| {
            Array3::from_shape_fn((nseq, x.nrows(), seq_len), |(n, c, t)| x[[c, n * seq_len + t]])
        };

        Self::new(cut(u), cut(y))
    }

    pub fn u(&self) -> ArrayView3<'_, f32> {
        self.u.view()
    }

    pub fn y(&self) -> ArrayView3<'_, f32> {
        self.y.view()
    }

    pub fn nu(&self) -> usize {
        self.u.len_of(Axis(1))
    }

    pub fn ny(&self) -> usize {
        self.y.len_of(Axis(1))
    }

    /// Returns the amount of sequences.
    pub fn len(&self) -> usize {
        self.u.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seq_len(&self) -> usize {
        self.u.len_of(Axis(2))
    }

    /// Returns the sequences at `indices`.
    pub fn select(&self, indices: &[usize]) -> (Array3<f32>, Array3<f32>) {
        (self.u.select(Axis(0), indices), self.y.select(Axis(0), indices))
    }
}
