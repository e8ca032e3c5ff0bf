use crate::error::{KMeansError, Result};
use serde::{Deserialize, Serialize};

/// Explicit initialization data, both as input to a fit and as the description of how a
/// finished fit was initialized.
///
/// Feeding the output form of one fit into another fit with the same configuration reproduces
/// its first iteration, which allows stepping through a clustering one iteration at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitParams {
    /// Sample indices whose rows become the initial centers, one per cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_cluster_samples: Option<Vec<usize>>,
    /// Initial cluster of every sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Vec<usize>>,
}

impl InitParams {
    pub fn from_samples(samples: Vec<usize>) -> Self {
        Self { initial_cluster_samples: Some(samples), assignments: None }
    }

    pub fn from_assignments(assignments: Vec<usize>) -> Self {
        Self { initial_cluster_samples: None, assignments: Some(assignments) }
    }

    pub fn is_empty(&self) -> bool {
        self.initial_cluster_samples.is_none() && self.assignments.is_none()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check the parameters against a dataset of `no_samples` rows clustered into `k` clusters.
    pub(crate) fn validate(&self, no_samples: usize, k: usize) -> Result<()> {
        if let Some(samples) = &self.initial_cluster_samples {
            if samples.len() != k {
                return Err(KMeansError::init_params(format!(
                    "{} initial cluster samples given for {} clusters", samples.len(), k)));
            }
            if let Some((pos, &s)) = samples.iter().enumerate().find(|&(_, &s)| s >= no_samples) {
                return Err(KMeansError::init_params(format!(
                    "initial cluster sample #{} is {}, but there are only {} samples", pos, s, no_samples)));
            }
        }
        if let Some(assignments) = &self.assignments {
            if assignments.len() != no_samples {
                return Err(KMeansError::init_params(format!(
                    "{} assignments given for {} samples", assignments.len(), no_samples)));
            }
            if let Some((pos, &a)) = assignments.iter().enumerate().find(|&(_, &a)| a >= k) {
                return Err(KMeansError::init_params(format!(
                    "sample {} is assigned to cluster {}, but k is {}", pos, a, k)));
            }
        }
        Ok(())
    }
}

/// Numeric side-channel parameters read by the algorithm variants.
///
/// Every key is optional. When a variant reads one that was not given, the default is written
/// into the `additional_params` section of the run metrics.
pub mod additional {
    /// Block vector non-zeros, relative to the average sample non-zeros.
    pub const BV_ANNZ: (&str, f64) = ("bv_annz", 0.3);
    /// Iterations between Yinyang group rebuilds; 0 keeps the initial groups.
    pub const YINYANG_REGROUP_INTERVAL: (&str, f64) = ("yinyang_regroup_interval", 20.0);
    /// Yinyang only screens with block vectors in iterations before this one.
    pub const BV_YINYANG_ITERATION_LIMIT: (&str, f64) = ("bv_yinyang_iteration_limit", 15.0);
    /// Non-zero share above which a center is stored dense.
    pub const DENSE_CENTER_RATIO: (&str, f64) = ("dense_center_ratio", 0.1);
    /// Samples per parallel work package; 0 derives it from the sample and core count.
    pub const PARTITION_SIZE: (&str, f64) = ("partition_size", 0.0);

    pub(crate) fn validate(key: &str, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("additional parameter '{}' is not a finite number", key));
        }
        let ok = match key {
            k if k == BV_ANNZ.0 => value > 0.0,
            k if k == DENSE_CENTER_RATIO.0 => value >= 0.0,
            k if k == YINYANG_REGROUP_INTERVAL.0 || k == BV_YINYANG_ITERATION_LIMIT.0 || k == PARTITION_SIZE.0 =>
                value >= 0.0 && value.fract() == 0.0,
            _ => true,
        };
        if ok { Ok(()) } else { Err(format!("additional parameter '{}' has invalid value {}", key, value)) }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let params = InitParams { initial_cluster_samples: Some(vec![0, 2]), assignments: Some(vec![0, 1, 0, 1]) };
        let json = params.to_json().unwrap();
        assert_eq!(json, r#"{"initial_cluster_samples":[0,2],"assignments":[0,1,0,1]}"#);
        assert_eq!(InitParams::from_json(&json).unwrap(), params);

        let partial = InitParams::from_json(r#"{"assignments":[1,0]}"#).unwrap();
        assert_eq!(partial, InitParams::from_assignments(vec![1, 0]));
        assert_eq!(partial.to_json().unwrap(), r#"{"assignments":[1,0]}"#);
        assert!(InitParams::from_json("{").is_err());
        assert!(InitParams::default().is_empty());
    }

    #[test]
    fn validation() {
        assert!(InitParams::from_samples(vec![0, 3]).validate(4, 2).is_ok());
        assert!(InitParams::from_samples(vec![0, 4]).validate(4, 2).is_err());
        assert!(InitParams::from_samples(vec![0]).validate(4, 2).is_err());
        assert!(InitParams::from_assignments(vec![0, 1, 1, 0]).validate(4, 2).is_ok());
        assert!(InitParams::from_assignments(vec![0, 1, 2, 0]).validate(4, 2).is_err());
        assert!(InitParams::from_assignments(vec![0, 1]).validate(4, 2).is_err());
    }

    #[test]
    fn additional_parameter_ranges() {
        assert!(additional::validate("bv_annz", 0.3).is_ok());
        assert!(additional::validate("bv_annz", 0.0).is_err());
        assert!(additional::validate("yinyang_regroup_interval", 2.5).is_err());
        assert!(additional::validate("partition_size", 128.0).is_ok());
        assert!(additional::validate("some_user_key", -4.0).is_ok());
        assert!(additional::validate("some_user_key", f64::NAN).is_err());
    }
}
