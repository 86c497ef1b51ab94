//! The symbol-at-a-time remapping facade.
//!
//! A [`ClassRemapper`] is what a bytecode rewriter holds while walking a
//! class file: it answers "what is this symbol called now?" one query at
//! a time, lazily resolving class structures through its scanner so that
//! inherited and access-restricted members map correctly. Unknown
//! symbols map to themselves.

use failure::Error;
use parking_lot::Mutex;

use crate::descriptor::MethodDescriptor;
use crate::env::RemapEnvironment;
use crate::ident::{ClassIdentifier, FieldIdentifier, MethodIdentifier};
use crate::mappings::Mappings;
use crate::scanner::ClassScanner;

pub struct ClassRemapper<S: ClassScanner> {
    env: RemapEnvironment,
    scanner: S,
    mappings: Mappings,
}
impl<S: ClassScanner> ClassRemapper<S> {
    pub fn new(scanner: S, mappings: Mappings) -> ClassRemapper<S> {
        ClassRemapper { env: RemapEnvironment::new(), scanner, mappings }
    }
    pub fn environment(&self) -> &RemapEnvironment {
        &self.env
    }

    /// The renamed form of a class. An unmapped nested class follows a
    /// rename of its enclosing class, and an unmapped top-level class
    /// follows its package's move.
    pub fn map_class(&self, id: &ClassIdentifier) -> ClassIdentifier {
        if let Some(target) = self.mappings.classes.get(id) {
            return target.clone();
        }
        if let Some(parent) = id.parent() {
            let mapped = self.map_class(parent);
            if mapped != *parent {
                if let Ok(rebuilt) =
                    ClassIdentifier::new(mapped.package().clone(), Some(mapped), id.name())
                {
                    return rebuilt;
                }
            }
        }
        self.mappings.map_class(id)
    }
    /// Rewrites a method descriptor, leaving it untouched if it doesn't
    /// parse.
    pub fn map_descriptor(&self, descriptor: &str) -> String {
        match MethodDescriptor::parse(descriptor) {
            Ok(parsed) => parsed
                .map_classes(|id| {
                    let target = self.map_class(id);
                    if target == *id {
                        None
                    } else {
                        Some(target)
                    }
                })
                .to_string(),
            Err(_) => descriptor.to_string(),
        }
    }
    /// The renamed form of a field reference, resolved against `owner`'s
    /// hierarchy as `owner` sees it. Unknown fields keep their name.
    pub fn map_field(
        &mut self,
        owner: &ClassIdentifier,
        field: &FieldIdentifier,
    ) -> Result<FieldIdentifier, Error> {
        self.ensure(owner)?;
        Ok(self
            .env
            .find_field(owner, field, owner)
            .map(|found| found.rename.target().clone())
            .unwrap_or_else(|| field.clone()))
    }
    /// The renamed form of a method reference. The descriptor is always
    /// rewritten through the class table, even when the name is unknown.
    pub fn map_method(
        &mut self,
        owner: &ClassIdentifier,
        method: &MethodIdentifier,
    ) -> Result<MethodIdentifier, Error> {
        self.ensure(owner)?;
        let name = self
            .env
            .find_method(owner, method, owner)
            .map(|found| found.rename.target().name().to_string())
            .unwrap_or_else(|| method.name().to_string());
        let descriptor = self.map_descriptor(method.descriptor());
        Ok(MethodIdentifier::from_parts(name, descriptor))
    }

    /// Resolves `owner` (and its ancestors) and seeds the rename tables
    /// into the lazily-grown environment.
    fn ensure(&mut self, owner: &ClassIdentifier) -> Result<(), Error> {
        let already_full = self.env.get(owner).map(|s| s.is_full) == Some(true);
        if already_full {
            return Ok(());
        }
        self.env.provide_full(&self.scanner, owner)?;
        // Re-seeding is idempotent: targets only conflict if the tables do
        self.env.apply(&self.mappings);
        Ok(())
    }
}

/// A [`ClassRemapper`] behind a mutex, for rewriters that fan class files
/// out across worker threads.
pub struct SharedClassRemapper<S: ClassScanner + Send> {
    inner: Mutex<ClassRemapper<S>>,
}
impl<S: ClassScanner + Send> SharedClassRemapper<S> {
    pub fn new(scanner: S, mappings: Mappings) -> SharedClassRemapper<S> {
        SharedClassRemapper { inner: Mutex::new(ClassRemapper::new(scanner, mappings)) }
    }
    pub fn map_class(&self, id: &ClassIdentifier) -> ClassIdentifier {
        self.inner.lock().map_class(id)
    }
    pub fn map_descriptor(&self, descriptor: &str) -> String {
        self.inner.lock().map_descriptor(descriptor)
    }
    pub fn map_field(
        &self,
        owner: &ClassIdentifier,
        field: &FieldIdentifier,
    ) -> Result<FieldIdentifier, Error> {
        self.inner.lock().map_field(owner, field)
    }
    pub fn map_method(
        &self,
        owner: &ClassIdentifier,
        method: &MethodIdentifier,
    ) -> Result<MethodIdentifier, Error> {
        self.inner.lock().map_method(owner, method)
    }
}
