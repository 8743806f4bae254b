use textplots::{Chart, Plot, Shape};

use crate::types::{SParameter, Sample, TraceSet};

const DEFAULT_WIDTH: u32 = 120;
const DEFAULT_HEIGHT: u32 = 40;

/// (MHz, dB) pairs for a magnitude-over-frequency chart
pub fn magnitude_points(samples: &[Sample]) -> Vec<(f32, f32)> {
    samples
        .iter()
        .map(|s| (s.frequency_mhz() as f32, s.magnitude_db() as f32))
        .collect()
}

/// (real, imaginary) pairs for a chart on the reflection-coefficient plane
pub fn reflection_points(samples: &[Sample]) -> Vec<(f32, f32)> {
    samples
        .iter()
        .map(|s| (s.value.re as f32, s.value.im as f32))
        .collect()
}

/// x-axis bounds, widened when every point shares one x value
fn x_range(points: &[(f32, f32)]) -> (f32, f32) {
    let min = points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let max = points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    if max > min { (min, max) } else { (min - 0.5, max + 0.5) }
}

/// Draw one trace in the terminal.
///
/// Reflection parameters (S11, S22) are drawn as imaginary over real part
/// within the unit circle; transmission parameters (S12, S21) as log magnitude
/// over frequency.
///
/// # Examples
/// ```
/// use rusty_vna::plotting::plot_trace;
/// use rusty_vna::{SParameter, Sample};
///
/// let trace = vec![Sample::new(1_000_000, 0.5, 0.1), Sample::new(2_000_000, 0.3, -0.2)];
/// plot_trace(SParameter::S21, &trace, None, None).unwrap();
/// ```
pub fn plot_trace(
    parameter: SParameter,
    samples: &[Sample],
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    if samples.is_empty() {
        return Err(format!("No data for {parameter}").into());
    }

    let width = width.unwrap_or(DEFAULT_WIDTH).max(32);
    let height = height.unwrap_or(DEFAULT_HEIGHT).max(3);

    if parameter.is_reflection() {
        let points = reflection_points(samples);
        println!("{parameter} (real → / imaginary ↑), {} points", samples.len());
        Chart::new(width, height, -1.1, 1.1)
            .lineplot(&Shape::Points(&points))
            .nice();
    } else {
        let points = magnitude_points(samples);
        let (xmin, xmax) = x_range(&points);
        let (lo, hi) = points
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.1), hi.max(p.1))
            });
        println!(
            "{parameter} (MHz → / dB ↑), {} points, {:.2} to {:.2} dB",
            samples.len(),
            lo,
            hi
        );
        Chart::new(width, height, xmin, xmax)
            .lineplot(&Shape::Lines(&points))
            .nice();
    }
    Ok(())
}

/// Draw every non-empty trace of `traces`, S11 to S22.
pub fn plot_trace_set(
    traces: &TraceSet,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    for (parameter, samples) in traces.iter() {
        if !samples.is_empty() {
            plot_trace(parameter, samples, width, height)?;
        }
    }
    Ok(())
}
