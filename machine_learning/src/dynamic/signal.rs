use ndarray::prelude::*;

/// Shifts a `(batch, channel, time)` signal along the time axis.
///
/// A positive `d` pads `d` zeros at the start and drops the last `d` steps, a negative one drops
/// the first `|d|` steps and pads `|d|` zeros at the end. If `|d|` reaches the length of the
/// signal the result is all zeros.
pub fn delay(x: ArrayView3<f32>, d: i64) -> Array3<f32> {
    let len = x.len_of(Axis(2));
    let shift = d.unsigned_abs() as usize;

    if d == 0 {
        return x.to_owned();
    }

    let mut out = Array3::zeros(x.raw_dim());
    if shift >= len {
        return out;
    }

    if d > 0 {
        out.slice_mut(s![.., .., shift..])
            .assign(&x.slice(s![.., .., ..len - shift]));
    } else {
        out.slice_mut(s![.., .., ..len - shift])
            .assign(&x.slice(s![.., .., shift..]));
    }

    out
}

/// Copies the `width` steps of `x` ending right before `end` into a new array, reading the
/// steps before the start of the signal as zeros.
pub fn window(x: ArrayView3<f32>, end: usize, width: usize) -> Array3<f32> {
    let (nbatch, channels, _) = x.dim();
    let start = end.saturating_sub(width);
    let count = end - start;

    let mut out = Array3::zeros((nbatch, channels, width));
    out.slice_mut(s![.., .., width - count..])
        .assign(&x.slice(s![.., .., start..end]));
    out
}
