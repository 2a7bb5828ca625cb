//! FleetStack cloud
//!
//! Apply-time side of FleetStack. A composed [`fleetstack_core::EnvironmentPlan`]
//! still carries symbolic accessors; the [`Applier`] walks it layer by layer and
//! turns them into concrete values as the nodes they point at come up.
//!
//! ```text
//! EnvironmentPlan ─→ Applier ─→ ImageBuilder      (build)
//!                      │    ─→ CloudProvisioner  (cloud)
//!                      │    ─→ ClusterApplier    (cluster)
//!                      ▼
//!                 RuntimeState (accessor → value)
//! ```
//!
//! Real registries, clouds and clusters live behind the provider traits.
//! [`DryRunBackend`] implements all of them without side effects.

pub mod action;
pub mod apply;
pub mod dry_run;
pub mod error;
pub mod provider;
pub mod runtime;

pub use action::{ActionResult, ActionType, ApplyResult, ApplySummary};
pub use apply::Applier;
pub use dry_run::DryRunBackend;
pub use error::{CloudError, Result};
pub use provider::{
    CloudProvisioner, ClusterApplier, FileSecretsProvider, ImageBuilder, ImageRef, ResolvedNode,
    RuntimeAttributes, SecretsProvider,
};
pub use runtime::RuntimeState;
