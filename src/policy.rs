use std::path::Path;

use serde::Deserialize;

use crate::{
    error::{LibraryError, LibraryResult},
    ledger::LoanRules,
    recommend::ScoreWeights,
};

/// Prefix for environment overrides, e.g. `LIBRARY__GRACE_DAYS=2`
const ENV_PREFIX: &str = "LIBRARY";
/// Separator between the prefix and nested keys
const ENV_SEPARATOR: &str = "__";

/// Circulation policy knobs, loadable from layered configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LibraryPolicy {
    /// Leave weekends out of loan periods
    #[serde(default)]
    pub skip_weekends: bool,
    /// Fee per overdue day
    #[serde(default = "LibraryPolicy::default_daily_fee")]
    pub daily_fee: f64,
    /// Overdue days forgiven before fees start
    #[serde(default)]
    pub grace_days: u32,
    /// Members owing more than this cannot borrow
    #[serde(default)]
    pub balance_limit: Option<f64>,
    /// Events kept in the journal
    #[serde(default = "LibraryPolicy::default_max_events")]
    pub max_events: usize,
    /// Recommendation weights
    #[serde(default)]
    pub weights: ScoreWeights,
}

impl LibraryPolicy {
    fn default_daily_fee() -> f64 {
        0.25
    }

    fn default_max_events() -> usize {
        100
    }

    /// Load policy from an optional TOML file overlaid with `LIBRARY__*`
    /// environment variables
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Config` if a source cannot be read, a value has
    /// the wrong type, or a setting is out of range
    pub fn load(path: Option<&Path>) -> LibraryResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR).try_parsing(true),
        );

        let policy: Self = builder.build()?.try_deserialize()?;
        policy.validate()?;
        tracing::debug!(?policy, "library policy loaded");
        Ok(policy)
    }

    /// Check values that deserialize fine but make no sense
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Config` naming the offending setting
    pub fn validate(&self) -> LibraryResult<()> {
        let invalid = |msg: String| LibraryError::Config(config::ConfigError::Message(msg));

        if !self.daily_fee.is_finite() || self.daily_fee < 0.0 {
            return Err(invalid(format!("daily_fee = {} must be non-negative", self.daily_fee)));
        }
        if let Some(limit) = self.balance_limit.filter(|l| !l.is_finite() || *l < 0.0) {
            return Err(invalid(format!("balance_limit = {limit} must be non-negative")));
        }
        self.weights.validate().map_err(invalid)
    }

    /// Rules the ledger applies to new loans
    #[must_use]
    pub fn loan_rules(&self) -> LoanRules {
        LoanRules { skip_weekends: self.skip_weekends, balance_limit: self.balance_limit }
    }
}

impl Default for LibraryPolicy {
    fn default() -> Self {
        Self {
            skip_weekends: false,
            daily_fee: Self::default_daily_fee(),
            grace_days: 0,
            balance_limit: None,
            max_events: Self::default_max_events(),
            weights: ScoreWeights::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[allow(clippy::panic)]
    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap_or_else(|e| panic!("temp file: {e}"));
        file.write_all(contents.as_bytes()).unwrap_or_else(|e| panic!("write config: {e}"));
        file
    }

    #[test]
    fn default_policy_matches_documented_values() {
        let policy = LibraryPolicy::default();
        assert!(!policy.skip_weekends);
        assert!((policy.daily_fee - 0.25).abs() < f64::EPSILON);
        assert_eq!(policy.grace_days, 0);
        assert_eq!(policy.balance_limit, None);
        assert_eq!(policy.weights, ScoreWeights::default());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn file_values_override_defaults() {
        let file = write_config(
            "skip_weekends = true\ngrace_days = 2\nbalance_limit = 10.0\n\n[weights]\ntags = 0.4\n",
        );

        let policy = LibraryPolicy::load(Some(file.path()));
        assert!(matches!(
            policy,
            Ok(ref p) if p.skip_weekends && p.grace_days == 2 && p.balance_limit == Some(10.0)
        ));
        if let Ok(policy) = policy {
            assert!((policy.weights.tags - 0.4).abs() < f64::EPSILON);
            assert!((policy.weights.author - 0.25).abs() < f64::EPSILON);
            assert!((policy.daily_fee - 0.25).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn negative_fee_is_rejected() {
        let file = write_config("daily_fee = -1.0\n");
        assert!(matches!(LibraryPolicy::load(Some(file.path())), Err(LibraryError::Config(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = LibraryPolicy::load(Some(Path::new("/nonexistent/library-policy.toml")));
        assert!(matches!(result, Err(LibraryError::Config(_))));
    }

    #[test]
    fn loan_rules_mirror_policy() {
        let policy = LibraryPolicy {
            skip_weekends: true,
            balance_limit: Some(5.0),
            ..LibraryPolicy::default()
        };
        assert_eq!(
            policy.loan_rules(),
            LoanRules {
                skip_weekends: true,
                balance_limit: Some(5.0)
            }
        );
    }
}
