use std::{collections::BTreeMap, sync::Arc};

use provisor_core::{Config, ResourceAddress, ResourceProvider, State};

use crate::reporter::TestReporter;

/// Runs once before any step; may report failures to the reporter.
pub type PreCheckFn<'a> = Box<dyn FnOnce(&mut dyn TestReporter) + Send + 'a>;

/// Inspects the accumulated state; an `Err` fails the test.
pub type CheckFn<'a> = Box<dyn FnMut(&State) -> anyhow::Result<()> + Send + 'a>;

/// A complete acceptance test: the providers it talks to, the steps to run
/// in order, and the hooks around them.
///
/// The lifetime lets hooks borrow from the enclosing test function.
#[derive(Default)]
pub struct TestCase<'a> {
    pub pre_check: Option<PreCheckFn<'a>>,
    /// Providers by name. A step uses the provider named by the prefix of its
    /// resource type unless it names one explicitly.
    pub providers: BTreeMap<String, Arc<dyn ResourceProvider>>,
    pub steps: Vec<TestStep<'a>>,
    /// Runs after teardown, on the final state.
    pub check_destroy: Option<CheckFn<'a>>,
}

impl<'a> TestCase<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_check(mut self, f: impl FnOnce(&mut dyn TestReporter) + Send + 'a) -> Self {
        self.pre_check = Some(Box::new(f));
        self
    }

    pub fn provider(mut self, name: impl Into<String>, p: Arc<dyn ResourceProvider>) -> Self {
        self.providers.insert(name.into(), p);
        self
    }

    pub fn step(mut self, step: TestStep<'a>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn check_destroy(
        mut self,
        f: impl FnMut(&State) -> anyhow::Result<()> + Send + 'a,
    ) -> Self {
        self.check_destroy = Some(Box::new(f));
        self
    }
}

/// Bring one resource to a desired configuration, then check the outcome.
pub struct TestStep<'a> {
    pub resource: ResourceAddress,
    /// Overrides the provider derived from the resource type.
    pub provider: Option<String>,
    /// Passed to `configure` before the resource is touched.
    pub provider_config: Config,
    pub config: Config,
    pub check: Option<CheckFn<'a>>,
}

impl<'a> TestStep<'a> {
    pub fn new(resource: ResourceAddress, config: Config) -> Self {
        TestStep {
            resource,
            provider: None,
            provider_config: Config::new(),
            config,
            check: None,
        }
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    pub fn provider_config(mut self, config: Config) -> Self {
        self.provider_config = config;
        self
    }

    pub fn check(mut self, f: impl FnMut(&State) -> anyhow::Result<()> + Send + 'a) -> Self {
        self.check = Some(Box::new(f));
        self
    }

    /// Name of the provider this step talks to.
    pub fn provider_name(&self) -> &str {
        self.provider
            .as_deref()
            .unwrap_or_else(|| self.resource.provider())
    }
}
