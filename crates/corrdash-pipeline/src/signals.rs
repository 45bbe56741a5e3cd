//! Multi-signal time series.
//!
//! Pairs selected columns with a time axis derived from the sampling
//! frequency, ready for a line plot.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use serde::Serialize;

/// Sampling frequency assumed when none is given (Hz).
pub const DEFAULT_SAMPLING_FREQUENCY: f64 = 100.0;

/// One plotted signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalTrace {
    pub signal: String,
    /// Y-axis label, e.g. `"speed (Derivative)"`.
    pub label: String,
    /// Seconds since the first sample.
    pub time: Vec<f64>,
    pub values: Vec<f64>,
}

/// `i / fs` for `i` in `0..n`.
pub fn time_axis(n: usize, sampling_frequency_hz: f64) -> Result<Vec<f64>> {
    if !(sampling_frequency_hz >= 1.0 && sampling_frequency_hz.is_finite()) {
        return Err(PipelineError::Configuration(format!(
            "sampling frequency {} Hz must be at least 1",
            sampling_frequency_hz
        )));
    }
    Ok((0..n).map(|i| i as f64 / sampling_frequency_hz).collect())
}

/// Y-axis label for `signal` after a transform. The identity transform
/// (`"None"`) leaves the bare name.
pub fn axis_label(signal: &str, transform_label: &str) -> String {
    if transform_label.is_empty() || transform_label == "None" {
        signal.to_string()
    } else {
        format!("{} ({})", signal, transform_label)
    }
}

/// One trace per requested signal, in request order.
pub fn signal_traces(
    dataset: &Dataset,
    signals: &[&str],
    sampling_frequency_hz: f64,
    transform_label: &str,
) -> Result<Vec<SignalTrace>> {
    let time = time_axis(dataset.height(), sampling_frequency_hz)?;
    signals
        .iter()
        .map(|signal| {
            Ok(SignalTrace {
                signal: signal.to_string(),
                label: axis_label(signal, transform_label),
                time: time.clone(),
                values: dataset.values(signal)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_time_axis() {
        assert_eq!(time_axis(4, 2.0).unwrap(), vec![0.0, 0.5, 1.0, 1.5]);
        assert!(time_axis(0, 100.0).unwrap().is_empty());
    }

    #[test]
    fn test_time_axis_rejects_low_frequency() {
        for fs in [0.0, 0.5, -10.0, f64::NAN] {
            assert!(matches!(
                time_axis(3, fs),
                Err(PipelineError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_axis_label() {
        assert_eq!(axis_label("speed", "None"), "speed");
        assert_eq!(axis_label("speed", "Derivative"), "speed (Derivative)");
    }

    #[test]
    fn test_signal_traces() {
        let dataset = Dataset::from_columns([
            ("speed", vec![1.0, 2.0]),
            ("wheel_angle", vec![0.0, 3.0]),
        ])
        .unwrap();
        let traces =
            signal_traces(&dataset, &["wheel_angle", "speed"], 10.0, "Z-Score").unwrap();

        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].signal, "wheel_angle");
        assert_eq!(traces[0].label, "wheel_angle (Z-Score)");
        assert_eq!(traces[1].time, vec![0.0, 0.1]);
        assert_eq!(traces[1].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_signal_traces_unknown_signal() {
        let dataset = Dataset::from_columns([("speed", vec![1.0])]).unwrap();
        assert!(matches!(
            signal_traces(&dataset, &["rpm"], 100.0, "None"),
            Err(PipelineError::ColumnNotFound(_))
        ));
    }
}
