//! Named workloads and the plans that drive them
use crate::context::StepContext;
use bomber_core::{ConfigError, LoadProfile, Phase, Response, RunOptions};
use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Duration};

pub type BoxedFut = Pin<Box<dyn Future<Output = Response> + Send>>;
pub(crate) type StepFn = Arc<dyn Fn(StepContext) -> BoxedFut + Send + Sync>;

/// A named workload step.
///
/// The step is invoked back-to-back by every virtual user. Protocol clients it needs are
/// captured by the closure; the engine never constructs or looks them up. Usually created
/// with the [`#[scenario]`](bomber_macros::scenario) macro.
///
/// # Example
/// ```no_run
/// use bomber::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let client = std::sync::Arc::new(MyClient);
///     let scenario = Scenario::new("scenario_rpc", move |_ctx| {
///         let client = client.clone();
///         async move { Response::from(client.get_bars().await) }
///     });
///
///     let stats = Coordinator::new()
///         .run(scenario.with_profile(LoadProfile::keep_constant(50, Duration::from_secs(120))))
///         .await
///         .unwrap();
///     println!("{stats}");
/// }
///
/// struct MyClient;
/// impl MyClient {
///     async fn get_bars(&self) -> Result<(), std::io::Error> {
///         Ok(())
///     }
/// }
/// ```
#[derive(Clone)]
pub struct Scenario {
    name: Arc<str>,
    step: StepFn,
}

impl Scenario {
    pub fn new<T, F>(name: &str, step: T) -> Self
    where
        T: Fn(StepContext) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        Self {
            name: Arc::from(name),
            step: Arc::new(move |ctx| Box::pin(step(ctx)) as BoxedFut),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub(crate) fn step(&self) -> StepFn {
        self.step.clone()
    }

    /// Pair the scenario with a load profile, using default [`RunOptions`].
    pub fn with_profile(self, profile: LoadProfile) -> RunSpec {
        RunSpec::new(self, profile)
    }

    /// Build the profile from `phases` and pair it with the scenario.
    pub fn with_phases(self, phases: Vec<Phase>) -> Result<RunSpec, ConfigError> {
        let profile = LoadProfile::new(phases)?;
        Ok(RunSpec::new(self, profile))
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish()
    }
}

/// One entry of an experiment plan: a scenario, the profile driving it, and its options.
#[derive(Clone, Debug)]
pub struct RunSpec {
    pub(crate) scenario: Scenario,
    pub(crate) profile: Arc<LoadProfile>,
    pub(crate) options: RunOptions,
}

impl RunSpec {
    pub fn new(scenario: Scenario, profile: LoadProfile) -> Self {
        Self {
            scenario,
            profile: Arc::new(profile),
            options: RunOptions::default(),
        }
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Abandon invocations running longer than `timeout`, recording them as timeouts.
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.options.invocation_timeout = timeout;
        self
    }

    pub fn reconciliation_interval(mut self, interval: Duration) -> Self {
        self.options.reconciliation_interval = interval;
        self
    }

    pub fn max_virtual_users(mut self, max_virtual_users: usize) -> Self {
        self.options.max_virtual_users = max_virtual_users;
        self
    }

    /// Pause after this run before the next one in a sequence starts.
    pub fn cool_down(mut self, cool_down: Duration) -> Self {
        self.options.cool_down = cool_down;
        self
    }

    pub fn scenario_name(&self) -> &str {
        self.scenario.name()
    }

    pub fn profile(&self) -> &LoadProfile {
        &self.profile
    }

    pub fn run_options(&self) -> &RunOptions {
        &self.options
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate(&self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_options() {
        let spec = Scenario::new("noop", |_ctx| async { Response::ok() })
            .with_profile(LoadProfile::keep_constant(2, Duration::from_secs(1)))
            .invocation_timeout(Duration::from_millis(250))
            .reconciliation_interval(Duration::from_millis(50))
            .max_virtual_users(4)
            .cool_down(Duration::from_secs(1));

        assert_eq!(spec.scenario_name(), "noop");
        assert_eq!(spec.run_options().invocation_timeout, Duration::from_millis(250));
        assert_eq!(spec.run_options().reconciliation_interval, Duration::from_millis(50));
        assert_eq!(spec.run_options().max_virtual_users, 4);
        assert_eq!(spec.run_options().cool_down, Duration::from_secs(1));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn with_phases_reports_profile_errors() {
        let scenario = Scenario::new("noop", |_ctx| async { Response::ok() });
        assert_eq!(
            scenario.clone().with_phases(vec![]).unwrap_err(),
            ConfigError::Profile(bomber_core::ProfileError::Empty)
        );
        assert_eq!(
            scenario
                .clone()
                .with_phases(vec![
                    Phase::keep_constant(1, Duration::MAX),
                    Phase::pause(Duration::from_secs(1)),
                ])
                .unwrap_err(),
            ConfigError::Profile(bomber_core::ProfileError::DurationOverflow)
        );

        let spec = scenario
            .with_phases(vec![
                Phase::ramping_constant(4, Duration::from_secs(2)),
                Phase::keep_constant(4, Duration::from_secs(2)),
            ])
            .unwrap();
        assert_eq!(spec.profile().peak(), 4);
        assert_eq!(spec.profile().total_duration(), Duration::from_secs(4));
    }

    #[test]
    fn validate_checks_ceiling() {
        let spec = Scenario::new("noop", |_ctx| async { Response::ok() })
            .with_profile(LoadProfile::keep_constant(8, Duration::from_secs(1)))
            .max_virtual_users(4);

        assert_eq!(
            spec.validate(),
            Err(ConfigError::CeilingExceeded {
                peak: 8,
                ceiling: 4
            })
        );
    }
}
