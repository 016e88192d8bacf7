//! Acceptance testing for resource providers.
//!
//! A [`TestCase`] lists steps, each bringing one resource to a desired
//! configuration. [`test`] runs them against real providers, checks the
//! accumulated state after each step, and destroys whatever was created
//! before returning, failed steps or not.
//!
//! Because that may create real infrastructure, runs are opt-in: see
//! [`TestOptions`].

pub mod case;
pub mod options;
pub mod orchestrator;
pub mod reporter;

pub use case::{TestCase, TestStep};
pub use options::{PreCheckPolicy, TestOptions, ACC_ENV_VAR};
pub use orchestrator::{test, Outcome, Phase};
pub use reporter::{Recorder, TestReporter};
