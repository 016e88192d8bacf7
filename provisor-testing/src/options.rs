/// Environment variable consulted by [`TestOptions::from_env`].
pub const ACC_ENV_VAR: &str = "PROVISOR_ACC";

/// What to do when the pre-check reports a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreCheckPolicy {
    /// Run the steps anyway; the failure stays on record.
    #[default]
    Continue,
    /// Don't touch any provider.
    Abort,
}

/// Settings of an orchestration run.
///
/// The default is disabled: steps may create real, billable infrastructure,
/// so running them has to be asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestOptions {
    pub enabled: bool,
    pub pre_check: PreCheckPolicy,
}

impl TestOptions {
    /// Options with the gate open.
    pub fn enabled() -> Self {
        TestOptions {
            enabled: true,
            ..Default::default()
        }
    }

    /// Open the gate if [`ACC_ENV_VAR`] holds a truthy value.
    pub fn from_env() -> Self {
        TestOptions {
            enabled: std::env::var(ACC_ENV_VAR).is_ok_and(|v| is_truthy(&v)),
            ..Default::default()
        }
    }

    pub fn with_pre_check(mut self, policy: PreCheckPolicy) -> Self {
        self.pre_check = policy;
        self
    }
}

/// `1`, `true`, `yes` and `on`, in any case.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
