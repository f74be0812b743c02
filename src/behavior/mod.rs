//! Behavior decorators
//!
//! Each behavior is an adapter holding exactly one delegate and adding one
//! cross-cutting effect around it. A chain is built outermost first, in the
//! order the behaviors were requested.

mod automated;
mod cached;
mod decorated;
mod guarded;
mod hidden;
mod locked;

pub use automated::Automating;
pub use cached::{Caching, ThreadCaching};
pub use decorated::{Decorating, Decorator};
pub use guarded::Guarding;
pub use hidden::{Facade, HidingImplementation};
pub use locked::{Locking, Synchronizing};

use crate::adapter::ComponentAdapter;
use crate::{Key, Result};
use std::fmt;

/// A behavior requested at registration
#[derive(Clone)]
pub enum Behavior {
    /// Keep the first produced instance and return it from then on
    Caching,
    /// Keep one instance per calling thread
    ThreadCaching,
    /// Serialize production with a lightweight reentrant lock
    Locking,
    /// Serialize production with a reentrant monitor
    Synchronizing,
    /// Expose only the declared interfaces through a [`Facade`]
    HidingImplementation,
    /// Resolve the given component before producing
    Guarding(Key),
    /// Pass every produced instance through a [`Decorator`]
    Decorating(Decorator),
    /// Sequence the component in container lifecycles
    Automating,
}

impl Behavior {
    /// Wrap `delegate` in this behavior
    pub(crate) fn wrap(self, delegate: Box<dyn ComponentAdapter>) -> Result<Box<dyn ComponentAdapter>> {
        Ok(match self {
            Behavior::Caching => Box::new(Caching::new(delegate)),
            Behavior::ThreadCaching => Box::new(ThreadCaching::new(delegate)),
            Behavior::Locking => Box::new(Locking::new(delegate)),
            Behavior::Synchronizing => Box::new(Synchronizing::new(delegate)),
            Behavior::HidingImplementation => Box::new(HidingImplementation::new(delegate)?),
            Behavior::Guarding(guard) => Box::new(Guarding::new(delegate, guard)),
            Behavior::Decorating(decorator) => Box::new(Decorating::new(delegate, decorator)),
            Behavior::Automating => Box::new(Automating::new(delegate)),
        })
    }

    /// Whether the behavior keeps instances, and with them a lifecycle
    pub fn is_caching(&self) -> bool {
        matches!(self, Behavior::Caching | Behavior::ThreadCaching)
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Caching => f.write_str("Caching"),
            Behavior::ThreadCaching => f.write_str("ThreadCaching"),
            Behavior::Locking => f.write_str("Locking"),
            Behavior::Synchronizing => f.write_str("Synchronizing"),
            Behavior::HidingImplementation => f.write_str("HidingImplementation"),
            Behavior::Guarding(key) => write!(f, "Guarding({key})"),
            Behavior::Decorating(decorator) => write!(f, "Decorating({decorator:?})"),
            Behavior::Automating => f.write_str("Automating"),
        }
    }
}

/// Wrap `leaf` in `behaviors`, the first one outermost
pub(crate) fn compose(
    behaviors: Vec<Behavior>,
    leaf: Box<dyn ComponentAdapter>,
) -> Result<Box<dyn ComponentAdapter>> {
    behaviors
        .into_iter()
        .rev()
        .try_fold(leaf, |delegate, behavior| behavior.wrap(delegate))
}
