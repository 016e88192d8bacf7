//! The lifecycle test loop.
//!
//! ```text
//! Idle -> Gated -> PreCheck -> Stepping(0..n) -> TearingDown -> Done
//!           |                      |
//!           +-> Done (skipped)     +-> TearingDown (on the first failure)
//! ```

use std::{collections::BTreeMap, sync::Arc};

use provisor_core::{
    Config, ResourceAddress, ResourceDiff, ResourceProvider, ResourceState, State, Warnings,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    case::{CheckFn, TestCase, TestStep},
    options::{PreCheckPolicy, TestOptions, ACC_ENV_VAR},
    reporter::{TestReporter, Tracked},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Gated,
    PreCheck,
    Stepping(usize),
    TearingDown,
    Done,
}

/// What a run did, for inspection after the fact. Pass or fail is on the
/// reporter.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub state: State,
    pub steps_run: usize,
    /// Every phase entered, in order.
    pub phases: Vec<Phase>,
}

impl Outcome {
    /// The gate was closed.
    pub fn skipped(&self) -> bool {
        self.phases
            .windows(2)
            .any(|w| w == [Phase::Gated, Phase::Done])
    }
}

/// How to reach a resource again at teardown.
#[derive(Debug, Clone)]
struct Binding {
    provider: String,
    provider_config: Config,
}

struct Orchestrator<'r> {
    t: Tracked<'r>,
    providers: BTreeMap<String, Arc<dyn ResourceProvider>>,
    state: State,
    /// Addresses in the order they came into existence.
    created: Vec<(ResourceAddress, Binding)>,
    phases: Vec<Phase>,
    steps_run: usize,
}

/// Run `case` against its providers, reporting to `t`.
///
/// Steps run in order until one fails; a failure is reported with
/// [`TestReporter::fatal`]. If any step ran, every resource that still exists
/// is then destroyed in reverse order of creation and `check_destroy` is
/// called with the final state. Teardown failures are reported with
/// [`TestReporter::error`] and don't stop the remaining teardown.
///
/// Unless `options.enabled` is set, nothing happens besides a single
/// [`TestReporter::skip`].
pub async fn test(
    t: &mut dyn TestReporter,
    case: TestCase<'_>,
    options: &TestOptions,
) -> Outcome {
    let TestCase {
        pre_check,
        providers,
        steps,
        check_destroy,
    } = case;
    let mut o = Orchestrator {
        t: Tracked::new(t),
        providers,
        state: State::new(),
        created: Vec::new(),
        phases: vec![Phase::Idle],
        steps_run: 0,
    };

    o.enter(Phase::Gated);
    if !options.enabled {
        o.t.skip(&format!(
            "acceptance tests are disabled; set {}=1 to run them",
            ACC_ENV_VAR
        ));
        return o.finish();
    }

    if let Some(pre_check) = pre_check {
        o.enter(Phase::PreCheck);
        let before = o.t.failures();
        pre_check(&mut o.t);
        if o.t.failures() > before && options.pre_check == PreCheckPolicy::Abort {
            o.t.fatal("pre-check failed; no steps were run");
            return o.finish();
        }
    }

    for (i, step) in steps.into_iter().enumerate() {
        o.enter(Phase::Stepping(i));
        o.steps_run += 1;
        let span = info_span!("step", index = i, resource = %step.resource);
        if let Err(msg) = o.run_step(i, step).instrument(span).await {
            o.t.fatal(&msg);
            break;
        }
    }

    if o.steps_run > 0 {
        o.enter(Phase::TearingDown);
        o.tear_down(check_destroy)
            .instrument(info_span!("teardown"))
            .await;
    }

    o.finish()
}

impl Orchestrator<'_> {
    fn enter(&mut self, phase: Phase) {
        debug!(?phase, "entering phase");
        self.phases.push(phase);
    }

    fn finish(mut self) -> Outcome {
        self.enter(Phase::Done);
        Outcome {
            state: self.state,
            steps_run: self.steps_run,
            phases: self.phases,
        }
    }

    fn provider(&self, name: &str) -> Result<Arc<dyn ResourceProvider>, String> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| format!("no provider named {:?}", name))
    }

    async fn run_step(&mut self, i: usize, step: TestStep<'_>) -> Result<(), String> {
        let address = step.resource.clone();
        let ctx = |what: &str, e: &dyn std::fmt::Display| {
            format!("Step {} ({}): {}: {}", i, address, what, e)
        };

        let name = step.provider_name().to_string();
        let provider = self.provider(&name).map_err(|e| ctx("provider", &e))?;

        let warnings = provider
            .configure(&step.provider_config)
            .await
            .map_err(|e| ctx("configure", &e))?;
        log_warnings("configure", &warnings);

        let warnings = provider
            .validate(address.type_(), &step.config)
            .await
            .map_err(|e| ctx("validate", &e))?;
        log_warnings("validate", &warnings);

        let current = self
            .state
            .get(&address)
            .cloned()
            .unwrap_or_else(|| ResourceState::absent(address.type_()));
        let diff = provider
            .diff(&current, &step.config)
            .await
            .map_err(|e| ctx("diff", &e))?;
        if diff.requires_new() {
            info!("replacing resource");
        }

        let new_state = provider
            .apply(&current, &diff)
            .await
            .map_err(|e| ctx("apply", &e))?;
        debug!(id = %new_state.id, "applied");

        self.record(
            address.clone(),
            new_state,
            Binding {
                provider: name,
                provider_config: step.provider_config,
            },
        );

        if let Some(mut check) = step.check {
            check(&self.state)
                .map_err(|e| format!("Step {} ({}): check failed: {:#}", i, address, e))?;
        }
        Ok(())
    }

    fn record(&mut self, address: ResourceAddress, new_state: ResourceState, binding: Binding) {
        if new_state.is_present() {
            match self.created.iter_mut().find(|(a, _)| *a == address) {
                Some((_, b)) => *b = binding,
                None => self.created.push((address.clone(), binding)),
            }
        }
        self.state.set(address, new_state);
    }

    async fn tear_down(&mut self, check_destroy: Option<CheckFn<'_>>) {
        let created = std::mem::take(&mut self.created);
        for (address, binding) in created.into_iter().rev() {
            if !self.state.is_present(&address) {
                continue;
            }
            if let Err(msg) = self.destroy(&address, &binding).await {
                self.t.error(&format!("Destroy of {}: {}", address, msg));
            }
        }

        if let Some(mut check) = check_destroy {
            if let Err(e) = check(&self.state) {
                self.t.error(&format!("Check failed after destroy: {:#}", e));
            }
        }
    }

    async fn destroy(
        &mut self,
        address: &ResourceAddress,
        binding: &Binding,
    ) -> Result<(), String> {
        let provider = self.provider(&binding.provider)?;
        provider
            .configure(&binding.provider_config)
            .await
            .map_err(|e| format!("configure: {}", e))?;

        let current = self
            .state
            .get(address)
            .cloned()
            .unwrap_or_else(|| ResourceState::absent(address.type_()));
        let diff = provider
            .diff(&current, &Config::new())
            .await
            .map_err(|e| format!("diff: {}", e))?;
        let diff = ResourceDiff {
            destroy: true,
            ..diff
        };
        let new_state = provider
            .apply(&current, &diff)
            .await
            .map_err(|e| format!("apply: {}", e))?;

        let leftover = new_state.id.clone();
        self.state.set(address.clone(), new_state);
        if !leftover.is_empty() {
            return Err(format!("resource still exists with id {:?}", leftover));
        }
        info!(resource = %address, "destroyed");
        Ok(())
    }
}

fn log_warnings(operation: &str, warnings: &Warnings) {
    for w in warnings {
        warn!(operation, "{}", w);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use anyhow::bail;
    use provisor_core::{
        mock::{Call, MockResourceProvider},
        Error,
    };
    use serde_json::json;

    use super::*;
    use crate::reporter::Recorder;

    fn address() -> ResourceAddress {
        ResourceAddress::new("test_instance", "foo")
    }

    fn config(v: serde_json::Value) -> Config {
        Config::from_value(v).unwrap()
    }

    fn mock() -> Arc<MockResourceProvider> {
        let m = Arc::new(MockResourceProvider::new());
        m.set(|s| {
            s.apply_return = Some(ResourceState {
                type_: "test_instance".to_string(),
                id: "foo".to_string(),
                ..Default::default()
            })
        });
        m
    }

    fn simple_case<'a>(m: &Arc<MockResourceProvider>) -> TestCase<'a> {
        TestCase::new()
            .provider("test", m.clone())
            .step(TestStep::new(address(), config(json!({"foo": "bar"}))))
    }

    #[tokio::test]
    async fn runs_create_and_destroy() {
        let m = mock();
        let mut check_destroy_called = false;
        let mut check_step_called = false;
        let case = TestCase::new()
            .provider("test", m.clone())
            .step(
                TestStep::new(address(), config(json!({"foo": "bar"}))).check(|s| {
                    check_step_called = true;
                    assert!(s.is_present(&address()));
                    Ok(())
                }),
            )
            .check_destroy(|s| {
                check_destroy_called = true;
                assert!(!s.is_present(&address()));
                Ok(())
            });

        let mut r = Recorder::new();
        let outcome = test(&mut r, case, &TestOptions::enabled()).await;
        r.assert_ok();

        assert!(check_step_called);
        assert!(check_destroy_called);
        assert_eq!(outcome.steps_run, 1);
        assert_eq!(
            m.calls(),
            vec![
                Call::Configure,
                Call::Validate,
                Call::Diff,
                Call::Apply,
                Call::Configure,
                Call::Diff,
                Call::Apply,
            ]
        );
        let snap = m.snapshot();
        // Last apply was the destroy.
        assert!(snap.apply_diff.unwrap().destroy);
        assert_eq!(snap.apply_state.unwrap().id, "foo");
        assert_eq!(snap.diff_desired, Some(Config::new()));
        assert_eq!(snap.validate_type.as_deref(), Some("test_instance"));
        assert_eq!(
            outcome.phases,
            vec![
                Phase::Idle,
                Phase::Gated,
                Phase::Stepping(0),
                Phase::TearingDown,
                Phase::Done,
            ]
        );
    }

    #[tokio::test]
    async fn empty_case_touches_nothing() {
        let m = mock();
        let mut check_destroy_called = false;
        let case = TestCase::new()
            .provider("test", m.clone())
            .check_destroy(|_| {
                check_destroy_called = true;
                Ok(())
            });

        let mut r = Recorder::new();
        let outcome = test(&mut r, case, &TestOptions::enabled()).await;
        r.assert_ok();
        assert!(m.calls().is_empty());
        assert!(!check_destroy_called);
        assert!(!outcome.phases.contains(&Phase::TearingDown));
    }

    #[tokio::test]
    async fn disabled_skips_once() {
        let m = mock();
        let mut pre_check_called = false;
        let case = simple_case(&m).pre_check(|_| pre_check_called = true);

        let mut r = Recorder::new();
        let outcome = test(&mut r, case, &TestOptions::default()).await;

        assert_eq!(r.skips.len(), 1);
        assert!(r.skips[0].contains(ACC_ENV_VAR));
        assert!(!r.failed());
        assert!(!pre_check_called);
        assert!(m.calls().is_empty());
        assert!(outcome.skipped());
        assert_eq!(
            outcome.phases,
            vec![Phase::Idle, Phase::Gated, Phase::Done]
        );
    }

    #[tokio::test]
    async fn pre_check_runs_before_steps() {
        let m = mock();
        let order = Mutex::new(Vec::new());
        let case = TestCase::new()
            .provider("test", m.clone())
            .pre_check(|_| {
                // No configure, nor anything else, has reached the provider.
                assert_eq!(m.calls(), vec![]);
                order.lock().unwrap().push("pre_check");
            })
            .step(
                TestStep::new(address(), config(json!({"foo": "bar"}))).check(|_| {
                    order.lock().unwrap().push("check");
                    Ok(())
                }),
            );

        let mut r = Recorder::new();
        test(&mut r, case, &TestOptions::enabled()).await;
        r.assert_ok();
        assert_eq!(*order.lock().unwrap(), vec!["pre_check", "check"]);
        assert_eq!(m.calls().first(), Some(&Call::Configure));
    }

    #[tokio::test]
    async fn pre_check_failure_continues_by_default() {
        let m = mock();
        let case = simple_case(&m).pre_check(|t| t.error("missing credentials"));

        let mut r = Recorder::new();
        let outcome = test(&mut r, case, &TestOptions::enabled()).await;
        assert_eq!(r.errors, vec!["missing credentials"]);
        assert_eq!(outcome.steps_run, 1);
        assert!(m.snapshot().apply_called);
    }

    #[tokio::test]
    async fn pre_check_failure_aborts_when_asked() {
        let m = mock();
        let case = simple_case(&m).pre_check(|t| t.error("missing credentials"));

        let mut r = Recorder::new();
        let options = TestOptions::enabled().with_pre_check(PreCheckPolicy::Abort);
        let outcome = test(&mut r, case, &options).await;
        assert_eq!(r.errors, vec!["missing credentials"]);
        assert_eq!(r.fatals.len(), 1);
        assert_eq!(outcome.steps_run, 0);
        assert!(m.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_check_still_tears_down() {
        let m = mock();
        let mut check_destroy_called = false;
        let case = TestCase::new()
            .provider("test", m.clone())
            .step(
                TestStep::new(address(), config(json!({"foo": "bar"})))
                    .check(|_| bail!("error")),
            )
            .check_destroy(|_| {
                check_destroy_called = true;
                Ok(())
            });

        let mut r = Recorder::new();
        test(&mut r, case, &TestOptions::enabled()).await;

        assert!(check_destroy_called);
        assert_eq!(r.fatals.len(), 1);
        assert!(r.fatals[0].contains("Step 0"), "{}", r.fatals[0]);
        assert!(r.fatals[0].contains("test_instance.foo"), "{}", r.fatals[0]);
        assert!(r.fatals[0].contains("error"), "{}", r.fatals[0]);
        assert!(r.errors.is_empty());
        assert!(m.snapshot().apply_diff.unwrap().destroy);
    }

    #[tokio::test]
    async fn first_failure_stops_remaining_steps() {
        let m = mock();
        let mut second_check_called = false;
        let case = TestCase::new()
            .provider("test", m.clone())
            .step(
                TestStep::new(address(), config(json!({"foo": "bar"})))
                    .check(|_| bail!("first")),
            )
            .step(
                TestStep::new(
                    ResourceAddress::new("test_instance", "bar"),
                    config(json!({"foo": "baz"})),
                )
                .check(|_| {
                    second_check_called = true;
                    Ok(())
                }),
            );

        let mut r = Recorder::new();
        let outcome = test(&mut r, case, &TestOptions::enabled()).await;
        assert!(!second_check_called);
        assert_eq!(outcome.steps_run, 1);
        assert!(!outcome.phases.contains(&Phase::Stepping(1)));
        assert_eq!(r.fatals.len(), 1);
    }

    #[tokio::test]
    async fn configure_error_is_fatal() {
        let m = mock();
        m.set(|s| s.configure_return_error = Some(Error::provider("bad credentials")));

        let mut r = Recorder::new();
        test(&mut r, simple_case(&m), &TestOptions::enabled()).await;
        assert_eq!(r.fatals.len(), 1);
        assert!(r.fatals[0].contains("configure"));
        assert!(r.fatals[0].contains("bad credentials"));
        // Nothing was created, so nothing is destroyed.
        assert!(!m.snapshot().apply_called);
    }

    #[tokio::test]
    async fn diff_error_is_fatal() {
        let m = mock();
        m.set(|s| s.diff_return_error = Some(Error::provider("cannot diff")));

        let mut r = Recorder::new();
        test(&mut r, simple_case(&m), &TestOptions::enabled()).await;
        assert_eq!(r.fatals.len(), 1);
        assert!(r.fatals[0].contains("cannot diff"));
        assert!(!m.snapshot().apply_called);
    }

    #[tokio::test]
    async fn apply_error_is_fatal() {
        let m = mock();
        m.set(|s| s.apply_return_error = Some(Error::provider("quota exceeded")));

        let mut r = Recorder::new();
        let outcome = test(&mut r, simple_case(&m), &TestOptions::enabled()).await;
        assert_eq!(r.fatals.len(), 1);
        assert!(r.fatals[0].contains("apply"));
        assert!(r.fatals[0].contains("quota exceeded"));
        assert!(outcome.state.present().next().is_none());
    }

    #[tokio::test]
    async fn validation_error_keeps_warnings_in_message() {
        let m = mock();
        m.set(|s| {
            s.validate_return_error = Some(Error::Validation(provisor_core::ValidationError {
                warnings: vec!["deprecated field".to_string()],
                error: "missing field".to_string(),
            }))
        });

        let mut r = Recorder::new();
        test(&mut r, simple_case(&m), &TestOptions::enabled()).await;
        assert_eq!(r.fatals.len(), 1);
        assert!(r.fatals[0].contains("missing field"), "{}", r.fatals[0]);
        assert!(r.fatals[0].contains("deprecated field"), "{}", r.fatals[0]);
    }

    #[tokio::test]
    async fn unknown_provider_is_fatal() {
        let case = TestCase::new().step(TestStep::new(address(), config(json!({"foo": "bar"}))));
        let mut r = Recorder::new();
        test(&mut r, case, &TestOptions::enabled()).await;
        assert_eq!(r.fatals.len(), 1);
        assert!(r.fatals[0].contains("no provider named \"test\""));
    }

    #[tokio::test]
    async fn destroy_error_is_reported_and_teardown_continues() {
        let m = mock();
        let mut check_destroy_called = false;
        let case = simple_case(&m).check_destroy(|s| {
            check_destroy_called = true;
            assert!(s.is_present(&address()));
            Ok(())
        });

        // Fail only the destroy apply.
        struct FailDestroy(Arc<MockResourceProvider>);
        #[async_trait::async_trait]
        impl ResourceProvider for FailDestroy {
            async fn configure(&self, c: &Config) -> Result<Warnings, Error> {
                self.0.configure(c).await
            }
            async fn validate(&self, t: &str, c: &Config) -> Result<Warnings, Error> {
                self.0.validate(t, c).await
            }
            async fn diff(&self, s: &ResourceState, c: &Config) -> Result<ResourceDiff, Error> {
                self.0.diff(s, c).await
            }
            async fn apply(
                &self,
                s: &ResourceState,
                d: &ResourceDiff,
            ) -> Result<ResourceState, Error> {
                if d.destroy {
                    return Err(Error::provider("still in use"));
                }
                self.0.apply(s, d).await
            }
            async fn resources(&self) -> Result<Vec<provisor_core::ResourceType>, Error> {
                self.0.resources().await
            }
        }
        let case = {
            let base = case;
            TestCase {
                providers: [(
                    "test".to_string(),
                    Arc::new(FailDestroy(m.clone())) as Arc<dyn ResourceProvider>,
                )]
                .into(),
                ..base
            }
        };

        let mut r = Recorder::new();
        test(&mut r, case, &TestOptions::enabled()).await;
        assert!(check_destroy_called);
        assert!(r.fatals.is_empty());
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].contains("still in use"), "{}", r.errors[0]);
        assert!(r.errors[0].contains("test_instance.foo"), "{}", r.errors[0]);
    }

    #[tokio::test]
    async fn destroy_that_leaves_an_id_is_an_error() {
        let m = mock();
        // Ignores the destroy flag.
        struct Stubborn(Arc<MockResourceProvider>);
        #[async_trait::async_trait]
        impl ResourceProvider for Stubborn {
            async fn configure(&self, c: &Config) -> Result<Warnings, Error> {
                self.0.configure(c).await
            }
            async fn validate(&self, t: &str, c: &Config) -> Result<Warnings, Error> {
                self.0.validate(t, c).await
            }
            async fn diff(&self, s: &ResourceState, c: &Config) -> Result<ResourceDiff, Error> {
                self.0.diff(s, c).await
            }
            async fn apply(
                &self,
                s: &ResourceState,
                d: &ResourceDiff,
            ) -> Result<ResourceState, Error> {
                let d = ResourceDiff {
                    destroy: false,
                    ..d.clone()
                };
                self.0.apply(s, &d).await
            }
            async fn resources(&self) -> Result<Vec<provisor_core::ResourceType>, Error> {
                self.0.resources().await
            }
        }
        let case = TestCase::new()
            .provider("test", Arc::new(Stubborn(m.clone())))
            .step(TestStep::new(address(), config(json!({"foo": "bar"}))));

        let mut r = Recorder::new();
        let outcome = test(&mut r, case, &TestOptions::enabled()).await;
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].contains("still exists"), "{}", r.errors[0]);
        assert!(outcome.state.is_present(&address()));
    }

    #[tokio::test]
    async fn teardown_runs_in_reverse_creation_order() {
        let destroyed = Arc::new(Mutex::new(Vec::new()));

        struct Named {
            destroyed: Arc<Mutex<Vec<String>>>,
        }
        #[async_trait::async_trait]
        impl ResourceProvider for Named {
            async fn configure(&self, _: &Config) -> Result<Warnings, Error> {
                Ok(vec![])
            }
            async fn validate(&self, _: &str, _: &Config) -> Result<Warnings, Error> {
                Ok(vec![])
            }
            async fn diff(&self, _: &ResourceState, _: &Config) -> Result<ResourceDiff, Error> {
                Ok(ResourceDiff::default())
            }
            async fn apply(
                &self,
                s: &ResourceState,
                d: &ResourceDiff,
            ) -> Result<ResourceState, Error> {
                if d.destroy {
                    self.destroyed.lock().unwrap().push(s.id.clone());
                    return Ok(ResourceState::absent(s.type_.clone()));
                }
                Ok(s.clone())
            }
            async fn resources(&self) -> Result<Vec<provisor_core::ResourceType>, Error> {
                Ok(vec![])
            }
        }

        // Each step's config carries the id the resource gets.
        struct Creating(Named);
        #[async_trait::async_trait]
        impl ResourceProvider for Creating {
            async fn configure(&self, c: &Config) -> Result<Warnings, Error> {
                self.0.configure(c).await
            }
            async fn validate(&self, t: &str, c: &Config) -> Result<Warnings, Error> {
                self.0.validate(t, c).await
            }
            async fn diff(&self, _: &ResourceState, c: &Config) -> Result<ResourceDiff, Error> {
                let mut d = ResourceDiff::default();
                if let Some(id) = c.get("id").and_then(|v| v.as_str()) {
                    d.attributes.insert(
                        "id".to_string(),
                        provisor_core::ResourceAttrDiff {
                            new: id.to_string(),
                            ..Default::default()
                        },
                    );
                }
                Ok(d)
            }
            async fn apply(
                &self,
                s: &ResourceState,
                d: &ResourceDiff,
            ) -> Result<ResourceState, Error> {
                match d.attributes.get("id") {
                    Some(a) if !d.destroy => Ok(ResourceState {
                        type_: s.type_.clone(),
                        id: a.new.clone(),
                        ..Default::default()
                    }),
                    _ => self.0.apply(s, d).await,
                }
            }
            async fn resources(&self) -> Result<Vec<provisor_core::ResourceType>, Error> {
                self.0.resources().await
            }
        }

        let p: Arc<dyn ResourceProvider> = Arc::new(Creating(Named {
            destroyed: destroyed.clone(),
        }));
        let mut case = TestCase::new().provider("test", p);
        for name in ["a", "b", "c"] {
            case = case.step(TestStep::new(
                ResourceAddress::new("test_instance", name),
                config(json!({ "id": name })),
            ));
        }

        let mut r = Recorder::new();
        let outcome = test(&mut r, case, &TestOptions::enabled()).await;
        r.assert_ok();
        assert_eq!(*destroyed.lock().unwrap(), vec!["c", "b", "a"]);
        assert_eq!(outcome.state.present().count(), 0);
    }

    #[tokio::test]
    async fn steps_see_previous_state() {
        let m = mock();
        let case = TestCase::new()
            .provider("test", m.clone())
            .step(TestStep::new(address(), config(json!({"foo": "bar"}))))
            .step(TestStep::new(address(), config(json!({"foo": "baz"}))));

        let mut r = Recorder::new();
        test(&mut r, case, &TestOptions::enabled()).await;
        r.assert_ok();

        // The second diff ran against what the first apply produced; the
        // teardown diff is the last one recorded.
        let snap = m.snapshot();
        assert_eq!(snap.diff_state.unwrap().id, "foo");
        assert_eq!(
            snap.calls.iter().filter(|c| **c == Call::Apply).count(),
            3
        );
    }

    #[tokio::test]
    async fn step_provider_config_reaches_configure() {
        let m = mock();
        let configured = AtomicUsize::new(0);
        let case = TestCase::new().provider("cloud", m.clone()).step(
            TestStep::new(address(), config(json!({"foo": "bar"})))
                .provider("cloud")
                .provider_config(config(json!({"region": "eu"})))
                .check(|_| {
                    configured.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        );

        let mut r = Recorder::new();
        test(&mut r, case, &TestOptions::enabled()).await;
        r.assert_ok();
        assert_eq!(configured.load(Ordering::SeqCst), 1);
        // Teardown configures again with the same settings.
        assert_eq!(
            m.snapshot().configure_config,
            Some(config(json!({"region": "eu"})))
        );
    }
}
