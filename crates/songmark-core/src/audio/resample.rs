//! Band-limited sample rate conversion

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{Error, Result};

/// Input frames handed to the resampler per call
const CHUNK_SIZE: usize = 4096;

fn sinc_parameters() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        oversampling_factor: 256,
        interpolation: SincInterpolationType::Cubic,
        window: WindowFunction::BlackmanHarris2,
    }
}

fn resample_error(e: impl std::fmt::Display) -> Error {
    Error::Resample(e.to_string())
}

/// Resample mono audio from `from_rate` to `to_rate`
///
/// Content above the new Nyquist frequency is filtered out before
/// decimation. The output is aligned with the input (the filter delay is
/// removed) and holds `round(len * to_rate / from_rate)` samples.
pub fn resample_to_target(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(Error::InvalidSampleRate(from_rate.min(to_rate)));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_parameters(), CHUNK_SIZE, 1)
        .map_err(resample_error)?;

    let delay = resampler.output_delay();
    let expected_len = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected_len + delay + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let input = [chunk];
        let out = resampler.process(&input[..], None).map_err(resample_error)?;
        output.extend_from_slice(&out[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let input = [rest];
        let out = resampler
            .process_partial(Some(&input[..]), None)
            .map_err(resample_error)?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the samples still held back by the filter
    while output.len() < delay + expected_len {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(resample_error)?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected_len, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f64, amplitude: f64, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f64 / rate as f64;
                (amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()) as f32
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f64 {
        let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum / samples.len() as f64).sqrt()
    }

    #[test]
    fn test_output_length_follows_ratio() {
        let input = sine(440.0, 0.5, 44100, 44100);
        assert_eq!(resample_to_target(&input, 44100, 22050).unwrap().len(), 22050);

        let input = sine(440.0, 0.5, 48000, 10_001);
        assert_eq!(resample_to_target(&input, 48000, 22050).unwrap().len(), 4594);

        let input = sine(440.0, 0.5, 16000, 1600);
        assert_eq!(resample_to_target(&input, 16000, 22050).unwrap().len(), 2205);
    }

    #[test]
    fn test_passband_tone_keeps_its_level() {
        let input = sine(1000.0, 0.5, 44100, 2 * 44100);
        let output = resample_to_target(&input, 44100, 22050).unwrap();
        let middle = &output[2000..output.len() - 2000];
        assert_abs_diff_eq!(rms(middle), 0.5 / 2f64.sqrt(), epsilon = 0.01);
    }

    #[test]
    fn test_tone_above_new_nyquist_is_removed() {
        let input = sine(15000.0, 0.5, 44100, 2 * 44100);
        let output = resample_to_target(&input, 44100, 22050).unwrap();
        let middle = &output[2000..output.len() - 2000];
        assert!(rms(middle) < 1e-3, "rms {}", rms(middle));
    }

    #[test]
    fn test_same_rate_and_invalid_rates() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_to_target(&input, 22050, 22050).unwrap(), input);
        assert!(resample_to_target(&[], 44100, 22050).unwrap().is_empty());
        assert!(matches!(
            resample_to_target(&input, 0, 22050),
            Err(Error::InvalidSampleRate(0))
        ));
    }
}
