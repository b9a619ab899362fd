use std::path::PathBuf;

use crate::error::{Error, Result};

/// Tunables for the estimator and the pipeline it drives.
///
/// `detection_confidence` gates tracked-ROI invalidation in the estimator;
/// everything else is forwarded to the pipeline and its two models.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Width the per-face crop is resized to before mesh regression.
    pub mesh_width: usize,
    /// Height the per-face crop is resized to before mesh regression.
    pub mesh_height: usize,
    /// How many consecutive predict calls may reuse tracked ROIs before the
    /// detector is forced to run again.
    pub max_continuous_checks: usize,
    /// Faces scoring below this clear the whole tracked-ROI state.
    pub detection_confidence: f32,
    /// Upper bound on faces returned by the detector.
    pub max_faces: usize,
    /// Non-maximum-suppression overlap threshold for detector boxes.
    pub iou_threshold: f32,
    /// Minimum detector score for a box to be kept.
    pub score_threshold: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            mesh_width: 128,
            mesh_height: 128,
            max_continuous_checks: 5,
            detection_confidence: 0.9,
            max_faces: 10,
            iou_threshold: 0.3,
            score_threshold: 0.75,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mesh_width == 0 || self.mesh_height == 0 {
            return Err(Error::InvalidConfig(format!(
                "mesh size must be nonzero, got {}x{}",
                self.mesh_width, self.mesh_height
            )));
        }
        if self.max_faces == 0 {
            return Err(Error::InvalidConfig("max_faces must be at least 1".into()));
        }
        for (name, value) in [
            ("detection_confidence", self.detection_confidence),
            ("iou_threshold", self.iou_threshold),
            ("score_threshold", self.score_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Where the model files live on disk.
///
/// The detector expects an `.npy` sidecar holding its SSD anchor grid as a
/// `[num_anchors, 4]` array of normalized `(x_center, y_center, w, h)` rows.
#[derive(Debug, Clone)]
pub struct ModelLocations {
    pub detector_model: PathBuf,
    pub detector_anchors: PathBuf,
    pub mesh_model: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_tunables() {
        let config = EstimatorConfig::default();
        assert_eq!(config.mesh_width, 128);
        assert_eq!(config.mesh_height, 128);
        assert_eq!(config.max_continuous_checks, 5);
        assert_eq!(config.detection_confidence, 0.9);
        assert_eq!(config.max_faces, 10);
        assert_eq!(config.iou_threshold, 0.3);
        assert_eq!(config.score_threshold, 0.75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_mesh_size() {
        let config = EstimatorConfig {
            mesh_width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let config = EstimatorConfig {
            detection_confidence: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EstimatorConfig {
            iou_threshold: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_faces() {
        let config = EstimatorConfig {
            max_faces: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
