//! Automatic lifecycle

use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::{AnyArc, Key, Provision, Result, TypeKey};
use std::any::Any;

/// Marks the component lifecycle-bearing, so container start always instantiates it
pub struct Automating {
    delegate: Box<dyn ComponentAdapter>,
}

impl Automating {
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        Self { delegate }
    }
}

impl ComponentAdapter for Automating {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn implementation(&self) -> TypeKey {
        self.delegate.implementation()
    }

    fn provisions(&self) -> &[Provision] {
        self.delegate.provisions()
    }

    fn produce(&self, resolver: &Resolver<'_>) -> Result<AnyArc> {
        self.delegate.produce(resolver)
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        self.delegate.verify(resolver)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.delegate)
    }

    fn describe(&self) -> String {
        "Automating".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn has_lifecycle(&self) -> bool {
        true
    }
}
