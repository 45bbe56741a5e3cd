//! Vehicle path reconstruction with a kinematic bicycle model.

use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::signals::time_axis;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_WHEEL_BASE: f64 = 2.5;
pub const DEFAULT_CONVERSION_RATIO: f64 = 1.0;
pub const MIN_CONVERSION_RATIO: f64 = 0.1;
pub const MAX_CONVERSION_RATIO: f64 = 10.0;
pub const DEFAULT_ANGLE_COLUMN: &str = "wheel_angle";
pub const DEFAULT_SPEED_COLUMN: &str = "speed";

/// Planar trajectory, starting at the origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehiclePath {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl VehiclePath {
    /// Number of points (samples + 1).
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn end(&self) -> (f64, f64) {
        (
            self.x.last().copied().unwrap_or(0.0),
            self.y.last().copied().unwrap_or(0.0),
        )
    }
}

/// Integrates heading and position from steering angle and speed.
///
/// Steering angles are read in degrees and multiplied by the conversion
/// ratio (steering-wheel to road-wheel angle) before use.
#[derive(Debug, Clone)]
pub struct PathReconstructor {
    wheel_base: f64,
    conversion_ratio: f64,
    angle_column: String,
    speed_column: String,
}

impl Default for PathReconstructor {
    fn default() -> Self {
        Self {
            wheel_base: DEFAULT_WHEEL_BASE,
            conversion_ratio: DEFAULT_CONVERSION_RATIO,
            angle_column: DEFAULT_ANGLE_COLUMN.to_string(),
            speed_column: DEFAULT_SPEED_COLUMN.to_string(),
        }
    }
}

impl PathReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wheel_base(mut self, wheel_base: f64) -> Result<Self> {
        if !(wheel_base > 0.0 && wheel_base.is_finite()) {
            return Err(PipelineError::Configuration(format!(
                "wheel base {} must be a positive length",
                wheel_base
            )));
        }
        self.wheel_base = wheel_base;
        Ok(self)
    }

    pub fn with_conversion_ratio(mut self, ratio: f64) -> Result<Self> {
        if !(MIN_CONVERSION_RATIO..=MAX_CONVERSION_RATIO).contains(&ratio) {
            return Err(PipelineError::Configuration(format!(
                "conversion ratio {} must be between {} and {}",
                ratio, MIN_CONVERSION_RATIO, MAX_CONVERSION_RATIO
            )));
        }
        self.conversion_ratio = ratio;
        Ok(self)
    }

    /// Read angle and speed from differently named columns.
    pub fn with_columns(mut self, angle: impl Into<String>, speed: impl Into<String>) -> Self {
        self.angle_column = angle.into();
        self.speed_column = speed.into();
        self
    }

    /// Whether `dataset` has the columns this reconstructor reads.
    pub fn supports(&self, dataset: &Dataset) -> bool {
        dataset.has_column(&self.angle_column) && dataset.has_column(&self.speed_column)
    }

    pub fn reconstruct(&self, dataset: &Dataset, sampling_frequency_hz: f64) -> Result<VehiclePath> {
        let angles = dataset.values(&self.angle_column)?;
        let speeds = dataset.values(&self.speed_column)?;
        self.calculate(&angles, &speeds, sampling_frequency_hz)
    }

    /// Path for paired angle (degrees) and speed (m/s) samples.
    pub fn calculate(
        &self,
        wheel_angles_deg: &[f64],
        speeds: &[f64],
        sampling_frequency_hz: f64,
    ) -> Result<VehiclePath> {
        if wheel_angles_deg.len() != speeds.len() {
            return Err(PipelineError::InvalidDataset(format!(
                "{} angle samples but {} speed samples",
                wheel_angles_deg.len(),
                speeds.len()
            )));
        }
        // validates the frequency
        time_axis(0, sampling_frequency_hz)?;
        let dt = 1.0 / sampling_frequency_hz;

        let (mut x, mut y, mut theta) = (0.0_f64, 0.0_f64, 0.0_f64);
        let mut path = VehiclePath {
            x: Vec::with_capacity(speeds.len() + 1),
            y: Vec::with_capacity(speeds.len() + 1),
        };
        path.x.push(x);
        path.y.push(y);

        for (&angle, &speed) in wheel_angles_deg.iter().zip(speeds) {
            if speed != 0.0 {
                let steer = (angle * self.conversion_ratio).to_radians();
                // curvature 1/R = tan(steer) / wheel_base; straight when steer is 0
                theta += speed * dt * steer.tan() / self.wheel_base;
                x += speed * theta.cos() * dt;
                y += speed * theta.sin() * dt;
            }
            path.x.push(x);
            path.y.push(y);
        }

        debug!(
            "Reconstructed {} points, end at ({:.2}, {:.2})",
            path.len(),
            x,
            y
        );
        Ok(path)
    }
}

/// Path from the default `wheel_angle` and `speed` columns.
pub fn reconstruct_path(
    dataset: &Dataset,
    sampling_frequency_hz: f64,
    conversion_ratio: f64,
) -> Result<VehiclePath> {
    PathReconstructor::new()
        .with_conversion_ratio(conversion_ratio)?
        .reconstruct(dataset, sampling_frequency_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line() {
        let path = PathReconstructor::new()
            .calculate(&[0.0; 4], &[10.0; 4], 10.0)
            .unwrap();
        assert_eq!(path.len(), 5);
        let (x, y) = path.end();
        assert!((x - 4.0).abs() < 1e-12);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn test_zero_speed_repeats_position() {
        let path = PathReconstructor::new()
            .calculate(&[0.0, 30.0, 0.0], &[5.0, 0.0, 5.0], 1.0)
            .unwrap();
        assert_eq!(path.x, vec![0.0, 5.0, 5.0, 10.0]);
        assert_eq!(path.y, vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_left_turn_bends_positive_y() {
        let path = PathReconstructor::new()
            .calculate(&[10.0; 20], &[5.0; 20], 10.0)
            .unwrap();
        let (_, y) = path.end();
        assert!(y > 0.0);
    }

    #[test]
    fn test_conversion_ratio_scales_angle() {
        let half = PathReconstructor::new()
            .with_conversion_ratio(0.5)
            .unwrap()
            .calculate(&[20.0; 10], &[5.0; 10], 10.0)
            .unwrap();
        let plain = PathReconstructor::new()
            .calculate(&[10.0; 10], &[5.0; 10], 10.0)
            .unwrap();
        assert_eq!(half, plain);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(PathReconstructor::new().with_conversion_ratio(0.05).is_err());
        assert!(PathReconstructor::new().with_conversion_ratio(10.5).is_err());
        assert!(PathReconstructor::new().with_wheel_base(0.0).is_err());
        assert!(matches!(
            PathReconstructor::new().calculate(&[0.0], &[1.0], 0.0),
            Err(PipelineError::Configuration(_))
        ));
        assert!(matches!(
            PathReconstructor::new().calculate(&[0.0], &[1.0, 2.0], 10.0),
            Err(PipelineError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_reconstruct_requires_columns() {
        let dataset = Dataset::from_columns([("speed", vec![1.0, 2.0])]).unwrap();
        let reconstructor = PathReconstructor::new();
        assert!(!reconstructor.supports(&dataset));
        assert!(matches!(
            reconstructor.reconstruct(&dataset, 100.0),
            Err(PipelineError::ColumnNotFound(name)) if name == "wheel_angle"
        ));
    }

    #[test]
    fn test_custom_columns() {
        let dataset = Dataset::from_columns([
            ("steer", vec![0.0, 0.0]),
            ("v", vec![1.0, 1.0]),
        ])
        .unwrap();
        let path = PathReconstructor::new()
            .with_columns("steer", "v")
            .reconstruct(&dataset, 1.0)
            .unwrap();
        assert_eq!(path.x, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_reconstruct_path_defaults() {
        let dataset = Dataset::from_columns([
            ("wheel_angle", vec![0.0; 3]),
            ("speed", vec![2.0; 3]),
        ])
        .unwrap();
        let path = reconstruct_path(&dataset, 2.0, 1.0).unwrap();
        assert_eq!(path.len(), 4);
        assert!((path.end().0 - 3.0).abs() < 1e-12);
    }
}
