//! Lifecycle Component
//!
//! Contracts that predicate and effect plugins implement.
//!
//! A [`Predicate`] narrows the subject population with a [`SelectionClause`].
//! An [`Effect`] acts on the subject of a process when it enters a step.
//! Both describe their configuration with [`SettingDescriptor`]s and receive
//! it at call time as resolved [`InstanceSettings`].
//!
//! Implementations are registered by name (see `lifecycle-resolver`) and
//! wrapped in a [`Component`] so a registry can hand out either capability.

mod builtin;
mod capability;
mod clause;
mod descriptor;
mod error;
mod settings;

pub use builtin::NoopEffect;
pub use capability::{Component, Effect, Predicate};
pub use clause::SelectionClause;
pub use descriptor::{SettingDescriptor, SettingType};
pub use error::{ClauseError, EffectError, SettingError};
pub use settings::{InstanceSettings, validate_settings};
