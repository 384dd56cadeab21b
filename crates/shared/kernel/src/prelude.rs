//! Everything a feature crate usually needs.

pub use crate::async_trait;
pub use crate::binding::{BindingKey, Bindings};
pub use crate::context::{FeatureContext, Phase};
pub use crate::error::{
    FeatureError, FeatureErrorExt, LifecycleError, RegistryError, ShutdownCause, ShutdownFailure,
};
pub use crate::feature::{ConfigRequirement, Feature};
pub use crate::lifecycle::{LifecycleState, LifecycleWatch, StopHandle, StopReason, StopSignal};
pub use crate::registry::{Registry, RegistryBuilder};
pub use crate::runner::{RunReport, Runner, RunnerConfig};
pub use fhub_domain::config::{ConfigDocument, ConfigSection};
