//! Timed orientation samples.
//!
//! Motion logs are stored as JSONL: an optional `# {header}` comment line
//! followed by one sample object per line.

use nalgebra::{Matrix3, Rotation3, Unit, Vector3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Seconds on the monotonic capture clock.
pub type TimeSecs = f64;

/// A value recorded at an instant. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedSample<T> {
    /// Capture-clock time of the reading.
    #[serde(rename = "t")]
    pub time: TimeSecs,

    /// The recorded value.
    pub value: T,
}

impl<T> TimedSample<T> {
    pub fn new(time: TimeSecs, value: T) -> Self {
        Self { time, value }
    }
}

/// 3×3 rotation matrix stored row-major (`m11, m12, m13, m21, …, m33`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RotationMatrix(pub [f64; 9]);

impl RotationMatrix {
    pub const fn identity() -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self::from_matrix(&Matrix3::from_fn(|r, c| rows[r][c]))
    }

    /// Copy a `Matrix3` into row-major cells.
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        let mut cells = [0.0; 9];
        cells.copy_from_slice(m.transpose().as_slice());
        Self(cells)
    }

    /// The cells as a `Matrix3`.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_row_slice(&self.0)
    }

    fn about_axis(axis: &Unit<Vector3<f64>>, angle: f64) -> Self {
        Self::from_matrix(Rotation3::from_axis_angle(axis, angle).matrix())
    }

    /// Rotation of `angle` radians about the Z axis.
    pub fn about_z(angle: f64) -> Self {
        Self::about_axis(&Vector3::z_axis(), angle)
    }

    /// Rotation of `angle` radians about the X axis.
    pub fn about_x(angle: f64) -> Self {
        Self::about_axis(&Vector3::x_axis(), angle)
    }

    /// Rotation of `angle` radians about the Y axis.
    pub fn about_y(angle: f64) -> Self {
        Self::about_axis(&Vector3::y_axis(), angle)
    }

    /// Row-major cells.
    pub fn cells(&self) -> &[f64; 9] {
        &self.0
    }

    /// Cell at zero-based `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[row * 3 + col]
    }

    pub fn transpose(&self) -> Self {
        Self::from_matrix(&self.to_matrix().transpose())
    }

    /// Matrix product `self * rhs`.
    pub fn multiply(&self, rhs: &Self) -> Self {
        Self::from_matrix(&(self.to_matrix() * rhs.to_matrix()))
    }

    /// Rotation taking this orientation to `other`: `selfᵀ · other`.
    pub fn relative_to(&self, other: &Self) -> Self {
        Self::from_matrix(&(self.to_matrix().transpose() * other.to_matrix()))
    }

    /// Frobenius norm of `RᵀR − I`. Zero for an exact rotation.
    ///
    /// Interpolated matrices are not re-orthonormalized, so this measures
    /// how far an estimate has drifted from a proper rotation.
    pub fn orthogonality_error(&self) -> f64 {
        let m = self.to_matrix();
        (m.transpose() * m - Matrix3::identity()).norm()
    }

    /// Largest absolute cell difference to `other`.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        (self.to_matrix() - other.to_matrix()).amax()
    }
}

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Device attitude as Euler angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attitude {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

impl Attitude {
    pub fn new(pitch: f64, roll: f64, yaw: f64) -> Self {
        Self { pitch, roll, yaw }
    }

    /// Rotation matrix for this attitude, composed as `Rz(yaw) · Rx(pitch) · Ry(roll)`.
    pub fn to_rotation_matrix(&self) -> RotationMatrix {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), self.yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), self.roll);
        RotationMatrix::from_matrix(rotation.matrix())
    }
}

/// Metadata written as the first line of a motion log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionLogHeader {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Wall-clock time at the capture clock epoch (RFC 3339).
    pub epoch_wall: String,

    /// Nominal sampling interval in milliseconds.
    pub sample_interval_ms: u64,
}

impl MotionLogHeader {
    /// Header for samples stamped on a clock whose epoch fell at wall time
    /// `epoch_wall`.
    pub fn new(sample_interval_ms: u64, epoch_wall: impl Into<String>) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            epoch_wall: epoch_wall.into(),
            sample_interval_ms,
        }
    }
}

/// Parse samples from JSONL content, skipping blank and `#` comment lines.
pub fn parse_samples<T: DeserializeOwned>(
    jsonl: &str,
) -> Result<Vec<TimedSample<T>>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Extract the `# {header}` line of a motion log, if present.
pub fn parse_header(jsonl: &str) -> Result<Option<MotionLogHeader>, serde_json::Error> {
    match jsonl
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.strip_prefix('#'))
    {
        Some(rest) => serde_json::from_str(rest.trim()).map(Some),
        None => Ok(None),
    }
}

/// Serialize a header and samples to motion-log JSONL.
pub fn serialize_samples<T: Serialize>(
    header: &MotionLogHeader,
    samples: &[TimedSample<T>],
) -> Result<String, serde_json::Error> {
    let mut output = format!("# {}\n", serde_json::to_string(header)?);
    for sample in samples {
        output.push_str(&serde_json::to_string(sample)?);
        output.push('\n');
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_orthogonal() {
        assert!(RotationMatrix::identity().orthogonality_error() < 1e-12);
    }

    #[test]
    fn test_axis_rotations_are_orthogonal() {
        for angle in [0.1, 0.7, -1.3, 3.0] {
            assert!(RotationMatrix::about_x(angle).orthogonality_error() < 1e-12);
            assert!(RotationMatrix::about_y(angle).orthogonality_error() < 1e-12);
            assert!(RotationMatrix::about_z(angle).orthogonality_error() < 1e-12);
        }
    }

    #[test]
    fn test_relative_rotation_recovers_step() {
        let a = RotationMatrix::about_z(0.2);
        let b = RotationMatrix::about_z(0.5);
        let rel = a.relative_to(&b);
        assert!(rel.max_abs_diff(&RotationMatrix::about_z(0.3)) < 1e-12);
    }

    #[test]
    fn test_attitude_yaw_only_matches_z_rotation() {
        let attitude = Attitude::new(0.0, 0.0, 0.4);
        assert!(
            attitude
                .to_rotation_matrix()
                .max_abs_diff(&RotationMatrix::about_z(0.4))
                < 1e-12
        );
    }

    #[test]
    fn test_row_major_layout() {
        let m = RotationMatrix::from_rows([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert_eq!(m.get(0, 2), 3.0);
        assert_eq!(m.get(2, 0), 7.0);
        assert_eq!(m.transpose().get(0, 2), 7.0);
        assert_eq!(m.to_matrix()[(0, 2)], 3.0);
        assert_eq!(RotationMatrix::from_matrix(&m.to_matrix()), m);
    }

    #[test]
    fn test_product_matches_composed_rotation() {
        let product = RotationMatrix::about_z(0.2).multiply(&RotationMatrix::about_z(0.3));
        assert!(product.max_abs_diff(&RotationMatrix::about_z(0.5)) < 1e-12);
    }

    #[test]
    fn test_orthogonality_error_detects_scaling() {
        let scaled = RotationMatrix::from_rows([[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!((scaled.orthogonality_error() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_json_format() {
        let sample = TimedSample::new(1.5, RotationMatrix::identity());
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"t":1.5,"value":[1.0,0.0,0.0,0.0,1.0,0.0,0.0,0.0,1.0]}"#);
    }

    #[test]
    fn test_motion_log_with_header() {
        let header = MotionLogHeader::new(10, "2026-01-01T00:00:00+00:00");
        let samples = vec![
            TimedSample::new(0.0, RotationMatrix::identity()),
            TimedSample::new(0.01, RotationMatrix::about_z(0.01)),
        ];
        let jsonl = serialize_samples(&header, &samples).unwrap();
        assert!(jsonl.starts_with("# "));

        let parsed_header = parse_header(&jsonl).unwrap().unwrap();
        assert_eq!(parsed_header.sample_interval_ms, 10);
        assert_eq!(parsed_header.epoch_wall, "2026-01-01T00:00:00+00:00");

        let parsed: Vec<TimedSample<RotationMatrix>> = parse_samples(&jsonl).unwrap();
        assert_eq!(parsed, samples);
    }

    #[test]
    fn test_parse_header_absent() {
        let jsonl = r#"{"t":0.0,"value":{"pitch":0.0,"roll":0.0,"yaw":0.1}}"#;
        assert!(parse_header(jsonl).unwrap().is_none());
        let parsed: Vec<TimedSample<Attitude>> = parse_samples(jsonl).unwrap();
        assert_eq!(parsed[0].value.yaw, 0.1);
    }
}
