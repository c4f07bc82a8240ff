use std::borrow::Cow;

/// Linear-interpolation resampler for mono float audio.
///
/// Equal rates borrow the input untouched. Positions past the last input sample
/// repeat that sample instead of extrapolating. All arithmetic runs in `f64`
/// and is rounded to `f32` once per output sample, so the result is identical
/// on every platform.
pub fn resample(input: &[f32], source_rate: u32, target_rate: u32) -> Cow<'_, [f32]> {
    if source_rate == target_rate {
        return Cow::Borrowed(input);
    }

    let output_len = output_len(input.len(), source_rate, target_rate);
    if output_len == 0 {
        return Cow::Owned(Vec::new());
    }

    let last = input.len() - 1;
    let step_num = source_rate as f64;
    let step_den = target_rate as f64;

    let mut output = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let position = i as f64 * step_num / step_den;
        let index = position.floor() as usize;
        let fraction = position - index as f64;

        let sample = if index >= last {
            input[last]
        } else {
            (input[index] as f64 * (1.0 - fraction) + input[index + 1] as f64 * fraction) as f32
        };
        output.push(sample);
    }

    Cow::Owned(output)
}

/// `round(input_len * target / source)`; zero for empty input or a zero rate.
pub fn output_len(input_len: usize, source_rate: u32, target_rate: u32) -> usize {
    if input_len == 0 || source_rate == 0 || target_rate == 0 {
        return 0;
    }
    if source_rate == target_rate {
        return input_len;
    }
    (input_len as f64 * target_rate as f64 / source_rate as f64).round() as usize
}
