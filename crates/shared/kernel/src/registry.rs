use crate::binding::Bindings;
use crate::context::{FeatureContext, Phase};
use crate::error::{FeatureError, RegistryError};
use crate::feature::{ConfigRequirement, Feature};
use crate::lifecycle::{LifecycleState, LifecycleWatch, StopHandle};
use crate::runner::{Runner, RunnerConfig};
use fhub_domain::config::ConfigDocument;
use fxhash::FxHashMap;
use std::any::Any;
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A registered feature with the background tasks it spawned.
pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) feature: Box<dyn Feature>,
    pub(crate) tasks: JoinSet<()>,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("name", &self.name).field("tasks", &self.tasks.len()).finish()
    }
}

/// Ordered, configured and initialized features.
///
/// Produced once by [`Registry::build`]; features cannot be added or removed
/// afterwards. Turn it into a [`Runner`] to drive startup and shutdown.
#[derive(Debug)]
pub struct Registry {
    pub(crate) slots: Vec<Slot>,
    pub(crate) bindings: Bindings,
    pub(crate) stop: StopHandle,
    pub(crate) state: watch::Sender<LifecycleState>,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Validates names, binds every configuration section and runs `init`,
    /// all in registration order.
    ///
    /// # Errors
    /// * [`RegistryError::DuplicateFeatureName`] listing each repeated name once; no hook runs.
    /// * [`RegistryError::MultipleServers`] when more than one feature has a server loop.
    /// * [`RegistryError::ConfigValidation`] when a section is missing or rejected.
    /// * [`RegistryError::Init`] when an `init` fails. Features initialized before it
    ///   are dropped without any shutdown call.
    pub fn build(features: Vec<Box<dyn Feature>>, document: &ConfigDocument) -> Result<Self, RegistryError> {
        check_unique_names(&features)?;
        check_single_server(&features)?;

        let mut slots: Vec<Slot> = features
            .into_iter()
            .map(|feature| Slot { name: feature.name().to_owned(), feature, tasks: JoinSet::new() })
            .collect();

        for Slot { name, feature, .. } in &mut slots {
            let section = document.section(name);
            if feature.config_requirement() == ConfigRequirement::Required && !section.is_present() {
                return Err(RegistryError::ConfigValidation {
                    feature: name.clone(),
                    source: FeatureError::config("section is required but absent"),
                    context: None,
                });
            }

            debug!(feature = %name, present = section.is_present(), "Binding configuration");
            feature.bind_config(section).map_err(|source| RegistryError::ConfigValidation {
                feature: name.clone(),
                source,
                context: None,
            })?;
        }

        let mut bindings = Bindings::default();
        let stop = StopHandle::new();
        let state = watch::Sender::new(LifecycleState::NotStarted);

        for Slot { name, feature, .. } in &mut slots {
            let mut ctx = FeatureContext::new(
                name,
                Phase::Init,
                &mut bindings,
                None,
                &stop,
                LifecycleWatch::new(state.subscribe()),
            );
            feature.init(&mut ctx).map_err(|source| RegistryError::Init {
                feature: name.clone(),
                source,
                context: None,
            })?;
            debug!(feature = %name, "Feature initialized");
        }

        for unknown in document.names().filter(|section| !slots.iter().any(|s| s.name == *section)) {
            warn!(section = unknown, "Configuration section matches no registered feature");
        }

        info!(features = slots.len(), bindings = bindings.len(), "Registry built");
        Ok(Self { slots, bindings, stop, state })
    }

    /// Feature names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Typed access to a registered feature.
    #[must_use]
    pub fn feature<T: Feature>(&self, name: &str) -> Option<&T> {
        self.slots.iter().find(|slot| slot.name == name).and_then(|slot| {
            let any: &dyn Any = &*slot.feature;
            any.downcast_ref::<T>()
        })
    }

    #[must_use]
    pub const fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Handle that can stop the runner produced from this registry, at any point.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleWatch {
        LifecycleWatch::new(self.state.subscribe())
    }

    #[must_use]
    pub fn into_runner(self, config: RunnerConfig) -> Runner {
        Runner::new(self, config)
    }
}

fn check_unique_names(features: &[Box<dyn Feature>]) -> Result<(), RegistryError> {
    let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
    let mut duplicates = Vec::new();

    for feature in features {
        let count = seen.entry(feature.name()).or_default();
        *count += 1;
        if *count == 2 {
            duplicates.push(feature.name().to_owned());
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        // Keep first-appearance order of the names, not of the second occurrence.
        duplicates.sort_by_key(|dup| features.iter().position(|f| f.name() == dup));
        Err(RegistryError::DuplicateFeatureName { names: duplicates, context: None })
    }
}

fn check_single_server(features: &[Box<dyn Feature>]) -> Result<(), RegistryError> {
    let servers: Vec<String> =
        features.iter().filter(|f| f.is_server()).map(|f| f.name().to_owned()).collect();

    if servers.len() > 1 {
        return Err(RegistryError::MultipleServers { names: servers, context: None });
    }
    Ok(())
}

/// Fluent construction of a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    features: Vec<Box<dyn Feature>>,
    document: ConfigDocument,
}

impl RegistryBuilder {
    #[must_use]
    pub fn feature<F: Feature>(mut self, feature: F) -> Self {
        self.features.push(Box::new(feature));
        self
    }

    #[must_use]
    pub fn boxed(mut self, feature: Box<dyn Feature>) -> Self {
        self.features.push(feature);
        self
    }

    /// Appends several features, keeping their order.
    #[must_use]
    pub fn features<I>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Feature>>,
    {
        self.features.extend(features);
        self
    }

    #[must_use]
    pub fn config(mut self, document: ConfigDocument) -> Self {
        self.document = document;
        self
    }

    /// # Errors
    /// See [`Registry::build`].
    pub fn build(self) -> Result<Registry, RegistryError> {
        Registry::build(self.features, &self.document)
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("features", &self.features.iter().map(|f| f.name()).collect::<Vec<_>>())
            .field("document", &self.document)
            .finish()
    }
}
