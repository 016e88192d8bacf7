//! A recording provider for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    Config, Error, ResourceDiff, ResourceProvider, ResourceState, ResourceType, Warnings,
};

/// An operation observed by [`MockResourceProvider`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Configure,
    Validate,
    Diff,
    Apply,
    Resources,
}

/// What the mock has seen, and what it will answer.
///
/// The `*_return` fields are handed out on every call; the `*_error` fields
/// take precedence over them.
#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub calls: Vec<Call>,

    pub configure_called: bool,
    pub configure_config: Option<Config>,
    pub configure_warnings: Warnings,
    pub configure_return_error: Option<Error>,

    pub validate_called: bool,
    pub validate_type: Option<String>,
    pub validate_config: Option<Config>,
    pub validate_warnings: Warnings,
    pub validate_return_error: Option<Error>,

    pub diff_called: bool,
    pub diff_state: Option<ResourceState>,
    pub diff_desired: Option<Config>,
    pub diff_return: Option<ResourceDiff>,
    pub diff_return_error: Option<Error>,

    pub apply_called: bool,
    pub apply_state: Option<ResourceState>,
    pub apply_diff: Option<ResourceDiff>,
    pub apply_return: Option<ResourceState>,
    pub apply_return_error: Option<Error>,

    pub resources_called: bool,
    pub resources_return: Vec<ResourceType>,

    pub reentrant: bool,
}

/// A [`ResourceProvider`] that records its calls and answers with canned
/// values.
///
/// `diff` returns `diff_return`, or an empty diff; an empty desired
/// configuration yields a destroy diff. `apply` of a destroy diff returns the
/// state without id; otherwise it returns `apply_return`, or the input state.
#[derive(Debug, Default)]
pub struct MockResourceProvider {
    state: Mutex<MockState>,
}

impl MockResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the canned answers.
    pub fn set(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.lock());
    }

    /// A copy of everything recorded so far.
    pub fn snapshot(&self) -> MockState {
        self.lock().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide what was recorded.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ResourceProvider for MockResourceProvider {
    async fn configure(&self, config: &Config) -> Result<Warnings, Error> {
        let mut st = self.lock();
        st.calls.push(Call::Configure);
        st.configure_called = true;
        st.configure_config = Some(config.clone());
        match &st.configure_return_error {
            Some(e) => Err(e.clone()),
            None => Ok(st.configure_warnings.clone()),
        }
    }

    async fn validate(&self, type_: &str, config: &Config) -> Result<Warnings, Error> {
        let mut st = self.lock();
        st.calls.push(Call::Validate);
        st.validate_called = true;
        st.validate_type = Some(type_.to_string());
        st.validate_config = Some(config.clone());
        match &st.validate_return_error {
            Some(e) => Err(e.clone()),
            None => Ok(st.validate_warnings.clone()),
        }
    }

    async fn diff(&self, state: &ResourceState, config: &Config) -> Result<ResourceDiff, Error> {
        let mut st = self.lock();
        st.calls.push(Call::Diff);
        st.diff_called = true;
        st.diff_state = Some(state.clone());
        st.diff_desired = Some(config.clone());
        if let Some(e) = &st.diff_return_error {
            return Err(e.clone());
        }
        if config.is_empty() && state.is_present() {
            return Ok(ResourceDiff {
                destroy: true,
                ..Default::default()
            });
        }
        Ok(st.diff_return.clone().unwrap_or_default())
    }

    async fn apply(
        &self,
        state: &ResourceState,
        diff: &ResourceDiff,
    ) -> Result<ResourceState, Error> {
        let mut st = self.lock();
        st.calls.push(Call::Apply);
        st.apply_called = true;
        st.apply_state = Some(state.clone());
        st.apply_diff = Some(diff.clone());
        if let Some(e) = &st.apply_return_error {
            return Err(e.clone());
        }
        if diff.destroy {
            return Ok(ResourceState::absent(state.type_.clone()));
        }
        Ok(st.apply_return.clone().unwrap_or_else(|| state.clone()))
    }

    async fn resources(&self) -> Result<Vec<ResourceType>, Error> {
        let mut st = self.lock();
        st.calls.push(Call::Resources);
        st.resources_called = true;
        Ok(st.resources_return.clone())
    }

    fn reentrant(&self) -> bool {
        self.lock().reentrant
    }
}
