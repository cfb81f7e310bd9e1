use ndarray::Array3;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use super::IoDataset;
use crate::{MlErr, Result};

/// The parameters of one split of the Chen benchmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChenSplit {
    /// The amount of sequences.
    pub ntotbatch: usize,
    pub seed: u64,
    /// The standard deviation of the process noise.
    pub sd_v: f32,
    /// The standard deviation of the measurement noise.
    pub sd_w: f32,
}

/// Simulates the nonlinear system described by Chen et al.,
///
/// `y*[k] = (0.8 - 0.5 exp(-y*[k-1]^2)) y*[k-1] - (0.3 + 0.9 exp(-y*[k-1]^2)) y*[k-2]
///          + u[k-1] + 0.2 u[k-2] + 0.1 u[k-1] u[k-2] + v[k]`
///
/// measured as `y = y* + w`, driven by a white gaussian input.
///
/// # Arguments
/// * `seq_len` - The length of every sequence.
/// * `split` - The amount of sequences, the seed and the noise levels.
pub fn generate(seq_len: usize, split: &ChenSplit) -> Result<IoDataset> {
    let normal = |sd: f32| {
        Normal::new(0., sd).map_err(|e| MlErr::InvalidOption(format!("chen noise: {e}")))
    };
    let (input, v, w) = (normal(1.)?, normal(split.sd_v)?, normal(split.sd_w)?);

    let mut rng = StdRng::seed_from_u64(split.seed);
    let mut u = Array3::zeros((split.ntotbatch, 1, seq_len));
    let mut y = Array3::zeros((split.ntotbatch, 1, seq_len));

    for n in 0..split.ntotbatch {
        let us: Vec<f32> = (0..seq_len).map(|_| input.sample(&mut rng)).collect();
        let mut ys = vec![0f32; seq_len];

        for k in 2..seq_len {
            let (y1, y2) = (ys[k - 1], ys[k - 2]);
            let (u1, u2) = (us[k - 1], us[k - 2]);
            let decay = (-y1 * y1).exp();

            ys[k] = (0.8 - 0.5 * decay) * y1 - (0.3 + 0.9 * decay) * y2
                + u1
                + 0.2 * u2
                + 0.1 * u1 * u2
                + v.sample(&mut rng);
        }

        for k in 0..seq_len {
            u[[n, 0, k]] = us[k];
            y[[n, 0, k]] = ys[k] + w.sample(&mut rng);
        }
    }

    IoDataset::new(u, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noiseless_sequences_follow_the_recurrence() {
        let split = ChenSplit {
            ntotbatch: 2,
            seed: 3,
            sd_v: 0.,
            sd_w: 0.,
        };
        let ds = generate(20, &split).unwrap();
        assert_eq!((ds.len(), ds.nu(), ds.ny(), ds.seq_len()), (2, 1, 1, 20));

        let (u, y) = (ds.u(), ds.y());
        for k in 2..20 {
            let (y1, y2) = (y[[1, 0, k - 1]], y[[1, 0, k - 2]]);
            let (u1, u2) = (u[[1, 0, k - 1]], u[[1, 0, k - 2]]);
            let decay = (-y1 * y1).exp();
            let expected = (0.8 - 0.5 * decay) * y1 - (0.3 + 0.9 * decay) * y2
                + u1
                + 0.2 * u2
                + 0.1 * u1 * u2;
            assert!((y[[1, 0, k]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn same_seed_same_data() {
        let split = ChenSplit {
            ntotbatch: 1,
            seed: 7,
            sd_v: 0.3,
            sd_w: 0.3,
        };
        assert_eq!(generate(10, &split).unwrap(), generate(10, &split).unwrap());
    }
}
