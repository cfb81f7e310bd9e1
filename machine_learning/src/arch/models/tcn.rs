use ndarray::Array3;
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::{
        FrontIter, Model, Sequential,
        activations::ActFn,
        layers::{Conv1d, Layer},
    },
};

/// The normalization applied after each convolution of a temporal block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcnNormalization {
    BatchNorm,
    None,
}

/// A residual block of two dilated causal convolutions.
///
/// `relu(net(x) + res(x))` where `res` is the identity, or a pointwise convolution when the
/// amount of channels changes.
#[derive(Debug, Clone)]
pub struct TemporalBlock {
    net: Sequential,
    downsample: Option<Conv1d>,

    // Forward metadata
    z: Array3<f32>,
}

impl TemporalBlock {
    /// Creates a new `TemporalBlock`.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of input channels.
    /// * `out_channels` - The amount of output channels.
    /// * `ksize` - The kernel size of both convolutions.
    /// * `dilation` - The dilation of both convolutions.
    /// * `dropout` - The dropout probability after each convolution.
    /// * `normalization` - The normalization after each convolution.
    /// * `seed` - The seed for the dropout masks.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        ksize: usize,
        dilation: usize,
        dropout: f32,
        normalization: TcnNormalization,
        seed: u64,
    ) -> Result<Self> {
        let mut layers = Vec::with_capacity(8);

        for (i, channels) in [in_channels, out_channels].into_iter().enumerate() {
            layers.push(Layer::conv(channels, out_channels, ksize, dilation));
            if normalization == TcnNormalization::BatchNorm {
                layers.push(Layer::batch_norm(out_channels));
            }
            layers.push(Layer::activation(ActFn::relu()));
            layers.push(Layer::dropout(dropout, seed.wrapping_add(i as u64))?);
        }

        let downsample =
            (in_channels != out_channels).then(|| Conv1d::new(in_channels, out_channels, 1, 1));

        Ok(Self {
            net: Sequential::new(layers),
            downsample,
            z: Array3::zeros((0, 0, 0)),
        })
    }

    pub fn size(&self) -> usize {
        self.net.size() + self.downsample.as_ref().map_or(0, Conv1d::size)
    }

    pub fn receptive_field(&self) -> usize {
        self.net.receptive_field()
    }

    pub fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let (net, down) = params.split_at_mut(self.net.size());
        self.net.init_params(net, rng)?;

        match &self.downsample {
            Some(conv) => conv.init_params(down, rng),
            None => Ok(()),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: Array3<f32>) -> Result<Array3<f32>> {
        let (net, down) = params.split_at(self.net.size());

        let res = match &mut self.downsample {
            Some(conv) => conv.forward(down, x.clone())?,
            None => x.clone(),
        };

        let z = self.net.forward(net, x)? + &res;
        let y = z.mapv(|v| v.max(0.));
        self.z = z;
        Ok(y)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array3<f32>,
    ) -> Result<Array3<f32>> {
        d.zip_mut_with(&self.z, |d, &z| {
            if z <= 0. {
                *d = 0.;
            }
        });

        let (net, down) = params.split_at(self.net.size());
        let (net_grad, down_grad) = grad.split_at_mut(self.net.size());

        let mut dx = self.net.backward(net, net_grad, d.clone())?;
        match &mut self.downsample {
            Some(conv) => dx += &conv.backward(down, down_grad, d.view())?,
            None => dx += &d,
        }

        Ok(dx)
    }
}

/// A temporal convolutional network: a stack of temporal blocks with growing dilation
/// followed by a pointwise output layer.
#[derive(Debug, Clone)]
pub struct Tcn {
    blocks: Vec<TemporalBlock>,
    head: Sequential,
}

impl Tcn {
    /// Creates a new `Tcn`.
    ///
    /// # Arguments
    /// * `input_size` - The amount of input channels.
    /// * `output_size` - The amount of output channels.
    /// * `n_channels` - The amount of channels of each block.
    /// * `ksize` - The kernel size of every convolution.
    /// * `dilation_sizes` - The dilation of each block, `2^i` for the i-th block if `None`.
    /// * `dropout` - The dropout probability.
    /// * `normalization` - The normalization after each convolution.
    /// * `seed` - The seed for the dropout masks.
    ///
    /// # Returns
    /// An error if the block description is inconsistent.
    pub fn new(
        input_size: usize,
        output_size: usize,
        n_channels: &[usize],
        ksize: usize,
        dilation_sizes: Option<&[usize]>,
        dropout: f32,
        normalization: TcnNormalization,
        seed: u64,
    ) -> Result<Self> {
        if n_channels.is_empty() || n_channels.contains(&0) {
            return Err(MlErr::InvalidOption(
                "tcn n_channels must be a non empty list of positive sizes".into(),
            ));
        }

        if ksize == 0 {
            return Err(MlErr::InvalidOption("tcn ksize must be greater than 0".into()));
        }

        let dilations: Vec<usize> = match dilation_sizes {
            Some(dilations) if dilations.len() != n_channels.len() => {
                return Err(MlErr::SizeMismatch {
                    what: "tcn dilation_sizes",
                    got: dilations.len(),
                    expected: n_channels.len(),
                });
            }
            Some(dilations) if dilations.contains(&0) => {
                return Err(MlErr::InvalidOption(
                    "tcn dilation_sizes must be greater than 0".into(),
                ));
            }
            Some(dilations) => dilations.to_vec(),
            None => (0..n_channels.len()).map(|i| 1 << i).collect(),
        };

        let mut in_channels = input_size;
        let mut blocks = Vec::with_capacity(n_channels.len());

        for (i, (&out_channels, &dilation)) in n_channels.iter().zip(&dilations).enumerate() {
            let block_seed = seed.wrapping_add(2 * i as u64);
            blocks.push(TemporalBlock::new(
                in_channels,
                out_channels,
                ksize,
                dilation,
                dropout,
                normalization,
                block_seed,
            )?);
            in_channels = out_channels;
        }

        let head = Sequential::new([Layer::conv(in_channels, output_size, 1, 1)]);
        Ok(Self { blocks, head })
    }

    fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks
            .iter()
            .map(TemporalBlock::size)
            .chain([self.head.size()])
    }
}

impl Model for Tcn {
    fn size(&self) -> usize {
        self.sizes().sum()
    }

    fn receptive_field(&self) -> usize {
        1 + self
            .blocks
            .iter()
            .map(|block| block.receptive_field() - 1)
            .sum::<usize>()
    }

    fn init_params<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let (blocks, head) = params.split_at_mut(self.size() - self.head.size());

        let mut rest = blocks;
        for block in &self.blocks {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(block.size());
            block.init_params(head, rng)?;
            rest = tail;
        }

        self.head.init_params(head, rng)
    }

    fn forward(&mut self, params: &[f32], mut x: Array3<f32>) -> Result<Array3<f32>> {
        let mut front = FrontIter::new(params);

        for block in self.blocks.iter_mut() {
            let params = front.next(block.size())?;
            x = block.forward(params, x)?;
        }

        let params = front.next(self.head.size())?;
        self.head.forward(params, x)
    }

    fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array3<f32>,
    ) -> Result<Array3<f32>> {
        let expected = self.size();
        if params.len() != expected || grad.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "tcn params",
                got: params.len(),
                expected,
            });
        }

        let split = expected - self.head.size();
        let (block_params, head_params) = params.split_at(split);
        let (block_grad, head_grad) = grad.split_at_mut(split);

        let mut d = self.head.backward(head_params, head_grad, d)?;

        let mut back = crate::arch::BackIter::new(block_params, block_grad)?;
        for block in self.blocks.iter_mut().rev() {
            let (params, grad) = back.next(block.size())?;
            d = block.backward(params, grad, d)?;
        }

        Ok(d)
    }

    fn set_training(&mut self, training: bool) {
        self.blocks
            .iter_mut()
            .for_each(|block| block.net.set_training(training));
    }

    fn buffers(&self) -> Vec<f32> {
        let mut out = Vec::new();
        self.blocks
            .iter()
            .for_each(|block| block.net.buffers(&mut out));
        out
    }

    fn load_buffers(&mut self, buffers: &[f32]) -> Result<()> {
        let expected: usize = self.blocks.iter().map(|b| b.net.buffer_size()).sum();
        if buffers.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "tcn buffers",
                got: buffers.len(),
                expected,
            });
        }

        let mut front = FrontIter::new(buffers);
        for block in self.blocks.iter_mut() {
            let size = block.net.buffer_size();
            block.net.load_buffers(front.next(size)?)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn tcn(normalization: TcnNormalization) -> Tcn {
        Tcn::new(2, 1, &[4, 4, 3], 3, None, 0., normalization, 0).unwrap()
    }

    #[test]
    fn receptive_field_grows_with_dilation() {
        // 1 + 2 * (3 - 1) * (1 + 2 + 4)
        assert_eq!(tcn(TcnNormalization::None).receptive_field(), 29);
    }

    #[test]
    fn dilation_sizes_must_match_blocks() {
        let res = Tcn::new(2, 1, &[4, 4], 3, Some(&[1]), 0., TcnNormalization::None, 0);
        assert!(res.is_err());
    }

    #[test]
    fn zero_dilations_are_rejected() {
        let res = Tcn::new(2, 1, &[4, 4], 3, Some(&[1, 0]), 0., TcnNormalization::None, 0);
        assert!(matches!(res, Err(MlErr::InvalidOption(_))));
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut tcn = tcn(TcnNormalization::None);
        let mut params = vec![0.; tcn.size()];
        tcn.init_params(&mut params, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let x = Array3::from_shape_fn((2, 2, 12), |(b, c, t)| ((b * 3 + c + t) as f32 * 0.4).cos());

        let y = tcn.forward(&params, x.clone()).unwrap();
        let mut grad = vec![0.; tcn.size()];
        tcn.backward(&params, &mut grad, Array3::ones(y.raw_dim()))
            .unwrap();

        let h = 1e-3;
        for k in (0..params.len()).step_by(7) {
            let mut plus = params.clone();
            plus[k] += h;
            let mut minus = params.clone();
            minus[k] -= h;

            let f_plus = tcn.forward(&plus, x.clone()).unwrap().sum();
            let f_minus = tcn.forward(&minus, x.clone()).unwrap().sum();
            let numeric = (f_plus - f_minus) / (2. * h);
            assert!((numeric - grad[k]).abs() < 5e-2, "param {k}: {numeric} vs {}", grad[k]);
        }
    }

    #[test]
    fn batch_norm_buffers_are_exported() {
        let tcn = tcn(TcnNormalization::BatchNorm);
        // two batch norms per block, mean and variance per channel
        assert_eq!(tcn.buffers().len(), 2 * 2 * (4 + 4 + 3));
    }
}
