//! Registration properties
//!
//! Properties are an ordered set of flags consumed when a component is
//! registered. They select the behaviors wrapped around the component (in the
//! order the flags appear, outermost first), the injection strategy, and a few
//! resolution options. A flag whose value is `false` is off.
//!
//! # Examples
//!
//! ```rust
//! use wiring_injector::{flags, Properties};
//!
//! let props: Properties = "cache, lock, guard=license, lazy=false".parse().unwrap();
//! assert!(props.is_on(flags::CACHE));
//! assert!(!props.is_on(flags::LAZY));
//! assert_eq!(props.get(flags::GUARD), Some("license"));
//! ```

use crate::behavior::Behavior;
use crate::injector::{Discovery, Injection};
use crate::{DiError, Key, Result};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Flag vocabulary
pub mod flags {
    /// Wrap in [`Caching`](crate::Caching)
    pub const CACHE: &str = "cache";
    /// Wrap in [`ThreadCaching`](crate::ThreadCaching)
    pub const THREAD_CACHE: &str = "thread-cache";
    /// Wrap in [`Locking`](crate::Locking)
    pub const LOCK: &str = "lock";
    /// Wrap in [`Synchronizing`](crate::Synchronizing)
    pub const SYNCHRONIZE: &str = "synchronize";
    /// Wrap in [`HidingImplementation`](crate::HidingImplementation)
    pub const HIDE_IMPL: &str = "hide-impl";
    /// `guard=<name>`: wrap in [`Guarding`](crate::Guarding) on the named component
    pub const GUARD: &str = "guard";
    /// Wrap in [`Automating`](crate::Automating); implies not lazy
    pub const AUTOMATIC: &str = "automatic";
    /// Start the component on first resolution instead of on container start
    pub const LAZY: &str = "lazy";
    /// Prefer a component registered under the injection point's name
    pub const USE_NAMES: &str = "use-names";
    /// Skip member injection points that cannot be satisfied
    pub const OPTIONAL: &str = "optional";
    /// `injection=<constructor|setter|method|marked-fields|marked-methods|composite|adaptive>`
    pub const INJECTION: &str = "injection";
    /// `setter-prefix=<prefix>`: prefix of setter injection points, `set_` by default
    pub const SETTER_PREFIX: &str = "setter-prefix";
    /// `method-name=<name>`: name of the method injection point, `inject` by default
    pub const METHOD_NAME: &str = "method-name";
}

pub(crate) const DEFAULT_SETTER_PREFIX: &str = "set_";
pub(crate) const DEFAULT_METHOD_NAME: &str = "inject";

/// Ordered flag set
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(Cow<'static, str>, Cow<'static, str>)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn `flag` on
    pub fn with(self, flag: impl Into<Cow<'static, str>>) -> Self {
        self.set(flag, "true")
    }

    /// Set `name` to `value`, keeping the position of an existing entry
    pub fn set(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_ref())
    }

    /// Whether `name` is present and not `false`
    pub fn is_on(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.eq_ignore_ascii_case("false"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_ref(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// These properties on top of `defaults`: defaults not overridden come first
    pub fn merged_over(&self, defaults: &Properties) -> Properties {
        let mut entries: Vec<_> = defaults
            .entries
            .iter()
            .filter(|(name, _)| self.get(name).is_none())
            .cloned()
            .collect();
        entries.extend(self.entries.iter().cloned());
        Properties { entries }
    }

    /// Interpret the flags
    pub(crate) fn plan(&self) -> Result<Plan> {
        let mut plan = Plan {
            behaviors: Vec::new(),
            injection: None,
            lazy: false,
            use_names: false,
            optional: false,
        };
        let setter_prefix = self.get(flags::SETTER_PREFIX).unwrap_or(DEFAULT_SETTER_PREFIX);
        let method_name = self.get(flags::METHOD_NAME).unwrap_or(DEFAULT_METHOD_NAME);

        for (name, value) in self.iter() {
            if value.eq_ignore_ascii_case("false") {
                if !is_known(name) {
                    return Err(unprocessed(name));
                }
                continue;
            }
            match name {
                flags::CACHE => plan.behaviors.push(Behavior::Caching),
                flags::THREAD_CACHE => plan.behaviors.push(Behavior::ThreadCaching),
                flags::LOCK => plan.behaviors.push(Behavior::Locking),
                flags::SYNCHRONIZE => plan.behaviors.push(Behavior::Synchronizing),
                flags::HIDE_IMPL => plan.behaviors.push(Behavior::HidingImplementation),
                flags::AUTOMATIC => plan.behaviors.push(Behavior::Automating),
                flags::GUARD => {
                    if value.is_empty() || value == "true" {
                        return Err(DiError::composition("guard needs the name of the guard component"));
                    }
                    plan.behaviors.push(Behavior::Guarding(Key::named(value.to_string())));
                }
                flags::LAZY => plan.lazy = true,
                flags::USE_NAMES => plan.use_names = true,
                flags::OPTIONAL => plan.optional = true,
                flags::INJECTION => {
                    plan.injection = Some(match value {
                        "constructor" => Injection::Constructor,
                        "setter" => Injection::Members(Discovery::Setters {
                            prefix: Cow::Owned(setter_prefix.to_string()),
                        }),
                        "method" => Injection::Members(Discovery::NamedMethod(Cow::Owned(method_name.to_string()))),
                        "marked-fields" => Injection::Members(Discovery::MarkedFields),
                        "marked-methods" => Injection::Members(Discovery::MarkedMethods),
                        "composite" => Injection::Composite(vec![Discovery::MarkedFields, Discovery::MarkedMethods]),
                        "adaptive" => Injection::Adaptive,
                        other => {
                            return Err(DiError::composition(format!("unknown injection strategy `{other}`")));
                        }
                    })
                }
                flags::SETTER_PREFIX | flags::METHOD_NAME => {}
                other => return Err(unprocessed(other)),
            }
        }
        if plan.behaviors.iter().any(|b| matches!(b, Behavior::Automating)) {
            plan.lazy = false;
        }
        Ok(plan)
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        flags::CACHE
            | flags::THREAD_CACHE
            | flags::LOCK
            | flags::SYNCHRONIZE
            | flags::HIDE_IMPL
            | flags::GUARD
            | flags::AUTOMATIC
            | flags::LAZY
            | flags::USE_NAMES
            | flags::OPTIONAL
            | flags::INJECTION
            | flags::SETTER_PREFIX
            | flags::METHOD_NAME
    )
}

fn unprocessed(name: &str) -> DiError {
    DiError::composition(format!("unprocessed property `{name}`"))
}

impl FromStr for Properties {
    type Err = DiError;

    /// Parse `flag, name=value, ...`
    fn from_str(s: &str) -> Result<Self> {
        let mut props = Properties::new();
        for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let (name, value) = match item.split_once('=') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => (item, "true"),
            };
            if name.is_empty() {
                return Err(DiError::composition(format!("property without a name in `{s}`")));
            }
            props.insert(name.to_string(), value.to_string());
        }
        Ok(props)
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<N, V> FromIterator<(N, V)> for Properties
where
    N: Into<Cow<'static, str>>,
    V: Into<Cow<'static, str>>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (name, value) in iter {
            props.insert(name, value);
        }
        props
    }
}

/// Registration decisions derived from properties
#[derive(Debug)]
pub(crate) struct Plan {
    pub behaviors: Vec<Behavior>,
    pub injection: Option<Injection>,
    pub lazy: bool,
    pub use_names: bool,
    pub optional: bool,
}
