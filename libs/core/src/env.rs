//! The remapping environment.
//!
//! A [`RemapEnvironment`] owns every known [`ClassStructure`], keyed by
//! the class's original identity. Hierarchy links between structures are
//! plain identifiers resolved through the environment on each lookup, so
//! there is a single authoritative record per class and no shared
//! interior mutability.
//!
//! Structures are built lazily: [`RemapEnvironment::provide`] resolves a
//! class's shape (and, transitively, the shapes of everything it
//! references) through a [`ClassScanner`], while
//! [`RemapEnvironment::provide_full`] additionally pulls in members for
//! the class and its ancestors. Classes the scanner can't see are kept
//! as placeholders so renames can still attach to them.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use failure::Error;
use failure_derive::Fail;
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::{debug, warn};

use crate::change::{Change, Move, PackageMove};
use crate::format::SrgMappingsFormat;
use crate::ident::{ClassIdentifier, FieldIdentifier, MethodIdentifier, PackageIdentifier};
use crate::mappings::Mappings;
use crate::scanner::ClassScanner;
use crate::structure::{AccessLevel, ClassStructure, FieldStructure, MethodStructure};

/// The class hierarchy loops back on itself.
#[derive(Debug, Fail)]
#[fail(display = "Cyclic class hierarchy: {}", path)]
pub struct CyclicHierarchy {
    path: String,
}
impl CyclicHierarchy {
    fn new(loading: &[ClassIdentifier], repeated: &ClassIdentifier) -> CyclicHierarchy {
        let mut path = loading.iter().map(ClassIdentifier::full_name).join(" -> ");
        path.push_str(" -> ");
        path.push_str(&repeated.full_name());
        CyclicHierarchy { path }
    }
}

/// A class the environment was asked about but has no record of.
#[derive(Debug, Fail)]
#[fail(display = "Unresolved class {}", _0)]
pub struct ClassNotResolved(pub ClassIdentifier);

/// Tracks the classes whose shapes are mid-resolution, so a hierarchy
/// that loops back on itself fails instead of recursing forever.
#[derive(Debug, Default)]
struct ScanSession {
    loading: Vec<ClassIdentifier>,
}

#[derive(Debug, Default)]
pub struct RemapEnvironment {
    parent: Option<Arc<RemapEnvironment>>,
    classes: IndexMap<ClassIdentifier, ClassStructure>,
    /// Package moves keyed by the package's original name.
    packages: IndexMap<PackageIdentifier, PackageMove>,
}
impl RemapEnvironment {
    #[inline]
    pub fn new() -> RemapEnvironment {
        RemapEnvironment::default()
    }
    /// An environment layered on top of `parent`: lookups read through,
    /// writes copy the parent's record into this layer first.
    pub fn with_parent(parent: Arc<RemapEnvironment>) -> RemapEnvironment {
        RemapEnvironment { parent: Some(parent), ..RemapEnvironment::default() }
    }
    pub fn get(&self, id: &ClassIdentifier) -> Option<&ClassStructure> {
        self.classes
            .get(id)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get(id)))
    }
    /// Mutable access, copying the record out of the parent layer if this
    /// layer doesn't hold it yet.
    pub fn get_mut(&mut self, id: &ClassIdentifier) -> Option<&mut ClassStructure> {
        if !self.classes.contains_key(id) {
            let inherited = self
                .parent
                .as_ref()
                .and_then(|parent| parent.get(id))
                .cloned()?;
            self.classes.insert(id.clone(), inherited);
        }
        self.classes.get_mut(id)
    }
    pub fn insert(&mut self, structure: ClassStructure) {
        self.classes.insert(structure.id().clone(), structure);
    }
    /// Every known structure, local layer first, parent layers after
    /// (shadowed records skipped).
    pub fn classes<'a>(&'a self) -> Box<dyn Iterator<Item = &'a ClassStructure> + 'a> {
        match self.parent {
            Some(ref parent) => Box::new(self.classes.values().chain(
                parent
                    .classes()
                    .filter(move |s| !self.classes.contains_key(s.id())),
            )),
            None => Box::new(self.classes.values()),
        }
    }
    pub fn packages<'a>(&'a self) -> Box<dyn Iterator<Item = &'a PackageMove> + 'a> {
        match self.parent {
            Some(ref parent) => Box::new(self.packages.values().chain(
                parent
                    .packages()
                    .filter(move |mv| !self.packages.contains_key(mv.original())),
            )),
            None => Box::new(self.packages.values()),
        }
    }
    pub fn package_move(&self, package: &PackageIdentifier) -> Option<&PackageMove> {
        self.packages
            .get(package)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.package_move(package)))
    }
    pub fn move_package(&mut self, from: PackageIdentifier, to: PackageIdentifier) {
        self.packages.insert(from.clone(), Move::new(from, to));
    }
    /// The effective output name of a class: its explicit rename, or its
    /// original name relocated by a package move, or `None` if nothing
    /// touches it.
    pub fn class_target(&self, id: &ClassIdentifier) -> Option<ClassIdentifier> {
        if let Some(structure) = self.get(id) {
            if structure.rename.is_renamed() {
                return Some(structure.rename.target().clone());
            }
        }
        if let Some(mv) = self.package_move(id.package()) {
            if mv.target() != id.package() {
                return Some(id.in_package(mv.target()));
            }
        }
        None
    }

    /// The classes reachable from `start` through hierarchy links,
    /// superclass chain before interfaces. Classes without a record are
    /// skipped.
    pub(crate) fn hierarchy<'a>(&'a self, start: &ClassIdentifier) -> Vec<&'a ClassStructure> {
        let mut result = Vec::new();
        let mut visited = IndexSet::new();
        let mut stack = vec![start.clone()];
        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(structure) = self.get(&id) {
                let parents: Vec<ClassIdentifier> = structure.parents().cloned().collect();
                for parent in parents.into_iter().rev() {
                    stack.push(parent);
                }
                result.push(structure);
            }
        }
        result
    }
    /// Resolves a field named `field` starting at `owner`, walking the
    /// hierarchy and skipping candidates `viewer` can't see.
    pub fn find_field(
        &self,
        owner: &ClassIdentifier,
        field: &FieldIdentifier,
        viewer: &ClassIdentifier,
    ) -> Option<&FieldStructure> {
        for structure in self.hierarchy(owner) {
            if let Some(found) = structure.fields.get(field) {
                if found.access.visible_to(&found.owner, viewer) {
                    return Some(found);
                }
            }
        }
        None
    }
    pub fn find_method(
        &self,
        owner: &ClassIdentifier,
        method: &MethodIdentifier,
        viewer: &ClassIdentifier,
    ) -> Option<&MethodStructure> {
        for structure in self.hierarchy(owner) {
            if let Some(found) = structure.methods.get(method) {
                if found.access.visible_to(&found.owner, viewer) {
                    return Some(found);
                }
            }
        }
        None
    }
    /// Like [`RemapEnvironment::find_field`], but matches the *renamed*
    /// name instead of the original.
    pub fn find_field_reverse(
        &self,
        owner: &ClassIdentifier,
        renamed: &FieldIdentifier,
        viewer: &ClassIdentifier,
    ) -> Option<&FieldStructure> {
        for structure in self.hierarchy(owner) {
            let found = structure
                .fields
                .values()
                .find(|f| f.rename.target() == renamed);
            if let Some(found) = found {
                if found.access.visible_to(&found.owner, viewer) {
                    return Some(found);
                }
            }
        }
        None
    }
    /// Matches by renamed identifier, falling back to renamed name alone
    /// when the caller can't reconstruct the renamed descriptor.
    pub fn find_method_reverse(
        &self,
        owner: &ClassIdentifier,
        renamed: &MethodIdentifier,
        viewer: &ClassIdentifier,
    ) -> Option<&MethodStructure> {
        for structure in self.hierarchy(owner) {
            let found = structure
                .methods
                .values()
                .find(|m| m.rename.target() == renamed)
                .or_else(|| {
                    structure
                        .methods
                        .values()
                        .find(|m| m.rename.target().name() == renamed.name())
                });
            if let Some(found) = found {
                if found.access.visible_to(&found.owner, viewer) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Ensures a shaped structure exists for `id`, scanning it (and the
    /// shapes of everything it references) on demand. Returns the record,
    /// or `None` if the scanner can't see the class and nothing else
    /// registered it.
    pub fn provide<'a>(
        &'a mut self,
        scanner: &dyn ClassScanner,
        id: &ClassIdentifier,
    ) -> Result<Option<&'a ClassStructure>, Error> {
        let mut session = ScanSession::default();
        let resolved = self.resolve_shape(scanner, id, &mut session)?;
        Ok(if resolved { self.get(id) } else { None })
    }
    /// Like [`RemapEnvironment::provide`], but also scans members for the
    /// class and all of its ancestors. Idempotent once a class is full.
    pub fn provide_full<'a>(
        &'a mut self,
        scanner: &dyn ClassScanner,
        id: &ClassIdentifier,
    ) -> Result<Option<&'a ClassStructure>, Error> {
        let mut session = ScanSession::default();
        let resolved = self.promote_full(scanner, id, &mut session)?;
        Ok(if resolved { self.get(id) } else { None })
    }
    fn resolve_shape(
        &mut self,
        scanner: &dyn ClassScanner,
        id: &ClassIdentifier,
        session: &mut ScanSession,
    ) -> Result<bool, Error> {
        if let Some(existing) = self.get(id) {
            // Placeholders (no shape yet) still get a scan attempt.
            if existing.is_interface.is_some() {
                return Ok(true);
            }
        }
        if session.loading.contains(id) {
            return Err(CyclicHierarchy::new(&session.loading, id).into());
        }
        let shape = match scanner.scan_shape(id)? {
            Some(shape) => shape,
            None => {
                debug!("No structure data for {}", id);
                return Ok(self.get(id).is_some());
            }
        };
        session.loading.push(id.clone());
        for parent in shape.super_class.iter().chain(shape.interfaces.iter()) {
            if !self.resolve_shape(scanner, parent, session)? {
                debug!("Unscannable reference {}, keeping placeholder", parent);
                self.classes
                    .entry(parent.clone())
                    .or_insert_with(|| ClassStructure::placeholder(parent.clone()));
            }
        }
        session.loading.pop();
        if self.get(id).is_none() {
            self.classes
                .insert(id.clone(), ClassStructure::placeholder(id.clone()));
        }
        if let Some(structure) = self.get_mut(id) {
            structure.super_class = shape.super_class;
            structure.interfaces = shape.interfaces;
            structure.is_interface = Some(shape.is_interface);
        }
        Ok(true)
    }
    fn promote_full(
        &mut self,
        scanner: &dyn ClassScanner,
        id: &ClassIdentifier,
        session: &mut ScanSession,
    ) -> Result<bool, Error> {
        let resolved = self.resolve_shape(scanner, id, session)?;
        if !resolved {
            return Ok(false);
        }
        if self.get(id).map(|s| s.is_full) == Some(true) {
            return Ok(true);
        }
        if session.loading.contains(id) {
            return Err(CyclicHierarchy::new(&session.loading, id).into());
        }
        // Ancestors first, so member lookups through a full class always
        // terminate in full (or placeholder) records.
        session.loading.push(id.clone());
        let parents: Vec<ClassIdentifier> = self
            .get(id)
            .map(|s| s.parents().cloned().collect())
            .unwrap_or_default();
        for parent in &parents {
            self.promote_full(scanner, parent, session)?;
        }
        session.loading.pop();

        let contents = match scanner.scan_contents(id)? {
            Some(contents) => contents,
            None => {
                let shaped = self.get(id).map(|s| s.is_interface.is_some()) == Some(true);
                if shaped {
                    warn!("Unable to scan members of {}, leaving it partial", id);
                } else {
                    debug!("No member data for placeholder {}", id);
                }
                return Ok(true);
            }
        };
        if let Some(structure) = self.get_mut(id) {
            if structure.is_interface.is_none() {
                structure.super_class = contents.shape.super_class.clone();
                structure.interfaces = contents.shape.interfaces.clone();
                structure.is_interface = Some(contents.shape.is_interface);
            }
            for data in contents.fields {
                match structure.fields.entry(data.id.clone()) {
                    Entry::Occupied(mut entry) => {
                        let field = entry.get_mut();
                        if field.access != AccessLevel::Unknown && field.access != data.access {
                            warn!(
                                "Access mismatch for {}.{}: {:?} vs scanned {:?}",
                                id, data.id, field.access, data.access
                            );
                        }
                        field.access = data.access;
                        field.is_static = Some(data.is_static);
                        if field.descriptor.is_none() {
                            field.descriptor = data.descriptor;
                        }
                        field.owner = id.clone();
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(FieldStructure {
                            rename: Change::new(data.id),
                            owner: id.clone(),
                            access: data.access,
                            is_static: Some(data.is_static),
                            descriptor: data.descriptor,
                        });
                    }
                }
            }
            for data in contents.methods {
                let descriptor = match crate::descriptor::MethodDescriptor::parse(data.id.descriptor()) {
                    Ok(descriptor) => descriptor,
                    Err(cause) => {
                        warn!("Skipping method {}.{}: {}", id, data.id, cause);
                        continue;
                    }
                };
                match structure.methods.entry(data.id.clone()) {
                    Entry::Occupied(mut entry) => {
                        let method = entry.get_mut();
                        if method.access != AccessLevel::Unknown && method.access != data.access {
                            warn!(
                                "Access mismatch for {}.{}: {:?} vs scanned {:?}",
                                id, data.id, method.access, data.access
                            );
                        }
                        method.access = data.access;
                        method.is_static = Some(data.is_static);
                        method.owner = id.clone();
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(MethodStructure {
                            rename: Change::new(data.id),
                            descriptor,
                            owner: id.clone(),
                            access: data.access,
                            is_static: Some(data.is_static),
                        });
                    }
                }
            }
            structure.is_full = true;
        }
        Ok(true)
    }

    /// Seeds renames from a flat mapping table. Member renames attach to
    /// the declaring class when it can be resolved, so a rename recorded
    /// against a subclass still lands on the declaration. Targets are
    /// write-once: a conflicting second rename is dropped with a warning.
    pub fn apply(&mut self, mappings: &Mappings) {
        for (from, to) in &mappings.packages {
            match self.package_move(from) {
                Some(existing) if existing.target() != to => warn!(
                    "Conflicting move for package {}: {} (keeping {})",
                    from,
                    to,
                    existing.target()
                ),
                Some(_) => {}
                None => self.move_package(from.clone(), to.clone()),
            }
        }
        for (from, to) in &mappings.classes {
            if self.get(from).is_none() {
                self.insert(ClassStructure::placeholder(from.clone()));
            }
            if let Some(structure) = self.get_mut(from) {
                if !structure.rename.set_target(to.clone()) {
                    warn!(
                        "Conflicting rename for {}: {} (keeping {})",
                        from,
                        to,
                        structure.rename.target()
                    );
                }
            }
        }
        for ((owner, field), to) in &mappings.fields {
            let declarer = self
                .find_field(owner, field, owner)
                .map(|f| f.owner.clone())
                .unwrap_or_else(|| owner.clone());
            if self.get(&declarer).is_none() {
                self.insert(ClassStructure::placeholder(declarer.clone()));
            }
            if let Some(structure) = self.get_mut(&declarer) {
                let entry = structure
                    .fields
                    .entry(field.clone())
                    .or_insert_with(|| FieldStructure::named(field.clone(), declarer.clone()));
                if !entry.rename.set_target(to.clone()) {
                    warn!(
                        "Conflicting rename for {}.{}: {} (keeping {})",
                        declarer,
                        field,
                        to,
                        entry.rename.target()
                    );
                }
            }
        }
        for ((owner, method), to) in &mappings.methods {
            let declarer = self
                .find_method(owner, method, owner)
                .map(|m| m.owner.clone())
                .unwrap_or_else(|| owner.clone());
            let descriptor = match crate::descriptor::MethodDescriptor::parse(method.descriptor()) {
                Ok(descriptor) => descriptor,
                Err(cause) => {
                    warn!("Skipping mapping for {}.{}: {}", owner, method, cause);
                    continue;
                }
            };
            if self.get(&declarer).is_none() {
                self.insert(ClassStructure::placeholder(declarer.clone()));
            }
            if let Some(structure) = self.get_mut(&declarer) {
                let entry = structure
                    .methods
                    .entry(method.clone())
                    .or_insert_with(|| MethodStructure {
                        rename: Change::new(method.clone()),
                        descriptor,
                        owner: declarer.clone(),
                        access: AccessLevel::Unknown,
                        is_static: None,
                    });
                if !entry.rename.set_target(to.clone()) {
                    warn!(
                        "Conflicting rename for {}.{}: {} (keeping {})",
                        declarer,
                        method,
                        to,
                        entry.rename.target()
                    );
                }
            }
        }
    }

    /// Rewrites the environment's *output* namespace through another
    /// mapping layer: a class currently renamed to `b` with `b -> c` in
    /// `mappings` ends up renamed to `c`. Member lookups key on the
    /// current output names, with method descriptors rendered in the
    /// current output namespace.
    pub fn apply_to_foreign(&mut self, mappings: &Mappings) {
        let mut targets: IndexMap<ClassIdentifier, ClassIdentifier> = IndexMap::new();
        for structure in self.classes() {
            let id = structure.id();
            let target = self.class_target(id).unwrap_or_else(|| id.clone());
            targets.insert(id.clone(), target);
        }
        let ids: Vec<ClassIdentifier> = targets.keys().cloned().collect();
        for id in ids {
            let foreign_class = match targets.get(&id) {
                Some(target) => target.clone(),
                None => continue,
            };
            if let Some(structure) = self.get_mut(&id) {
                if let Some(next) = mappings.classes.get(&foreign_class) {
                    structure.rename.retarget(next.clone());
                }
                for field in structure.fields.values_mut() {
                    let key = (foreign_class.clone(), field.rename.target().clone());
                    if let Some(next) = mappings.fields.get(&key) {
                        field.rename.retarget(next.clone());
                    }
                }
                for method in structure.methods.values_mut() {
                    let foreign_descriptor = method
                        .descriptor
                        .map_classes(|cid| targets.get(cid).cloned())
                        .to_string();
                    let foreign_id = MethodIdentifier::from_parts(
                        method.rename.target().name().to_string(),
                        foreign_descriptor,
                    );
                    let key = (foreign_class.clone(), foreign_id);
                    if let Some(next) = mappings.methods.get(&key) {
                        method.rename.retarget(next.clone());
                    }
                }
            }
        }
        let packages: Vec<(PackageIdentifier, PackageIdentifier)> = self
            .packages()
            .map(|mv| (mv.original().clone(), mv.target().clone()))
            .collect();
        for (original, current) in packages {
            if let Some(next) = mappings.packages.get(&current) {
                self.packages.insert(original.clone(), Move::new(original, next.clone()));
            }
        }
    }

    /// An environment keyed by this one's output names, with every rename
    /// pointing back at the original. Hierarchy links, owners and
    /// descriptors are rewritten into the output namespace.
    pub fn inverse(&self) -> RemapEnvironment {
        let mut result = RemapEnvironment::new();
        for mv in self.packages() {
            let inverted = mv.inverse();
            result.packages.insert(inverted.original().clone(), inverted);
        }
        let rename_class =
            |id: &ClassIdentifier| self.class_target(id).unwrap_or_else(|| id.clone());
        for structure in self.classes() {
            let new_id = rename_class(structure.id());
            let mut inverted = ClassStructure::placeholder(new_id.clone());
            inverted.rename = Change::renamed(new_id.clone(), structure.id().clone());
            inverted.super_class = structure.super_class.as_ref().map(&rename_class);
            inverted.interfaces = structure.interfaces.iter().map(&rename_class).collect();
            inverted.is_interface = structure.is_interface;
            inverted.is_full = structure.is_full;
            for field in structure.fields.values() {
                let new_field = field.rename.target().clone();
                inverted.fields.insert(
                    new_field,
                    FieldStructure {
                        rename: field.rename.inverse(),
                        owner: rename_class(&field.owner),
                        access: field.access,
                        is_static: field.is_static,
                        descriptor: field
                            .descriptor
                            .as_ref()
                            .map(|d| d.map_class(&|cid| self.class_target(cid))),
                    },
                );
            }
            for method in structure.methods.values() {
                let foreign_descriptor = method
                    .descriptor
                    .map_classes(|cid| self.class_target(cid));
                let foreign_id = MethodIdentifier::from_parts(
                    method.rename.target().name().to_string(),
                    foreign_descriptor.to_string(),
                );
                inverted.methods.insert(
                    foreign_id.clone(),
                    MethodStructure {
                        rename: Change::renamed(foreign_id, method.id().clone()),
                        descriptor: foreign_descriptor,
                        owner: rename_class(&method.owner),
                        access: method.access,
                        is_static: method.is_static,
                    },
                );
            }
            result.classes.insert(new_id, inverted);
        }
        result
    }

    /// Flattens the environment into mapping tables. Package-derived
    /// class moves are materialized, member entries are emitted against
    /// their declaring class, and renamed method targets carry
    /// descriptors rendered in the output namespace.
    pub fn to_mappings(&self) -> Mappings {
        let mut result = Mappings::default();
        for mv in self.packages() {
            if mv.original() != mv.target() {
                result
                    .packages
                    .insert(mv.original().clone(), mv.target().clone());
            }
        }
        for structure in self.classes() {
            let id = structure.id();
            if let Some(target) = self.class_target(id) {
                if target != *id {
                    result.classes.insert(id.clone(), target);
                }
            }
            for field in structure.fields.values() {
                if field.rename.is_renamed() && field.owner == *id {
                    result.fields.insert(
                        (id.clone(), field.id().clone()),
                        field.rename.target().clone(),
                    );
                }
            }
            for method in structure.methods.values() {
                if method.rename.target().name() != method.id().name() && method.owner == *id {
                    let foreign_descriptor = method
                        .descriptor
                        .map_classes(|cid| self.class_target(cid));
                    let value = MethodIdentifier::from_parts(
                        method.rename.target().name().to_string(),
                        foreign_descriptor.to_string(),
                    );
                    result
                        .methods
                        .insert((id.clone(), method.id().clone()), value);
                }
            }
        }
        result
    }

    /// Dumps the environment into `dir`: `mappings.srg` with the flat
    /// tables, and `structures.txt` with a readable structure listing.
    pub fn export(&self, dir: &Path) -> Result<(), Error> {
        fs::create_dir_all(dir)?;
        let mappings = self.to_mappings();
        let mut srg = BufWriter::new(File::create(dir.join("mappings.srg"))?);
        SrgMappingsFormat::write(&mappings, &mut srg)?;
        let mut out = BufWriter::new(File::create(dir.join("structures.txt"))?);
        let sorted = self
            .classes()
            .sorted_by(|a, b| a.id().full_name().cmp(&b.id().full_name()));
        for structure in sorted {
            writeln!(out, "{}", structure)?;
            for field in structure.fields.values() {
                writeln!(out, "    field {}", field.rename)?;
            }
            for method in structure.methods.values() {
                writeln!(out, "    method {}", method.rename)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scanner::{ClassContents, ClassShape, FieldData, IndexScanner, MethodData};

    fn class(s: &str) -> ClassIdentifier {
        ClassIdentifier::parse(s).unwrap()
    }
    fn field(s: &str) -> FieldIdentifier {
        FieldIdentifier::new(s).unwrap()
    }
    fn method(name: &str, descriptor: &str) -> MethodIdentifier {
        MethodIdentifier::new(name, descriptor).unwrap()
    }
    fn shape(super_class: Option<&str>, interfaces: &[&str]) -> ClassShape {
        ClassShape {
            super_class: super_class.map(class),
            interfaces: interfaces.iter().cloned().map(class).collect(),
            is_interface: false,
        }
    }
    fn field_data(name: &str, access: AccessLevel) -> FieldData {
        FieldData { id: field(name), access, is_static: false, descriptor: None }
    }

    fn game_scanner() -> IndexScanner {
        let mut scanner = IndexScanner::new();
        scanner.insert(
            class("game/Entity"),
            ClassContents {
                shape: shape(None, &[]),
                fields: vec![
                    field_data("secret", AccessLevel::Private),
                    field_data("health", AccessLevel::Protected),
                    field_data("tick", AccessLevel::Internal),
                ],
                methods: vec![MethodData {
                    id: method("getHandle", "()Lgame/Entity;"),
                    access: AccessLevel::Public,
                    is_static: false,
                }],
            },
        );
        scanner.insert(
            class("game/Player"),
            ClassContents {
                shape: shape(Some("game/Entity"), &[]),
                fields: vec![field_data("name", AccessLevel::Public)],
                methods: vec![],
            },
        );
        scanner.insert(
            class("mod/FakePlayer"),
            ClassContents {
                shape: shape(Some("game/Player"), &[]),
                ..ClassContents::default()
            },
        );
        scanner
    }

    #[test]
    fn lazy_full_resolution() {
        let scanner = game_scanner();
        let mut env = RemapEnvironment::new();
        let player = class("game/Player");
        let structure = env.provide_full(&scanner, &player).unwrap().unwrap();
        assert!(structure.is_full);
        // The superclass was promoted too
        assert!(env.get(&class("game/Entity")).unwrap().is_full);
        // Idempotent
        env.provide_full(&scanner, &player).unwrap().unwrap();
        assert_eq!(env.get(&player).unwrap().fields.len(), 1);
    }

    #[test]
    fn member_lookup_respects_visibility() {
        let scanner = game_scanner();
        let mut env = RemapEnvironment::new();
        let entity = class("game/Entity");
        let player = class("game/Player");
        let fake = class("mod/FakePlayer");
        env.provide_full(&scanner, &fake).unwrap().unwrap();

        // Private member: only visible from the declarer itself
        assert!(env.find_field(&entity, &field("secret"), &entity).is_some());
        assert!(env.find_field(&player, &field("secret"), &player).is_none());
        // Package-private: visible in-package, invisible across packages
        assert!(env.find_field(&player, &field("tick"), &player).is_some());
        assert!(env.find_field(&fake, &field("tick"), &fake).is_none());
        // Protected/public: inherited everywhere
        assert!(env.find_field(&fake, &field("health"), &fake).is_some());
        let handle = env
            .find_method(&fake, &method("getHandle", "()Lgame/Entity;"), &fake)
            .unwrap();
        assert_eq!(handle.owner, entity);
    }

    #[test]
    fn unresolvable_reference_becomes_placeholder() {
        let mut scanner = IndexScanner::new();
        scanner.insert(
            class("a/Impl"),
            ClassContents { shape: shape(Some("lib/Missing"), &[]), ..ClassContents::default() },
        );
        let mut env = RemapEnvironment::new();
        env.provide_full(&scanner, &class("a/Impl")).unwrap().unwrap();
        let placeholder = env.get(&class("lib/Missing")).unwrap();
        assert!(placeholder.is_interface.is_none());
        assert!(!placeholder.is_full);
        // Asking for an unknown class directly yields None, not a record
        assert!(env.provide(&scanner, &class("lib/Other")).unwrap().is_none());
    }

    #[test]
    fn cyclic_hierarchy_is_an_error() {
        let mut scanner = IndexScanner::new();
        scanner.insert(
            class("a/A"),
            ClassContents { shape: shape(Some("a/B"), &[]), ..ClassContents::default() },
        );
        scanner.insert(
            class("a/B"),
            ClassContents { shape: shape(Some("a/A"), &[]), ..ClassContents::default() },
        );
        let mut env = RemapEnvironment::new();
        let error = env.provide(&scanner, &class("a/A")).unwrap_err();
        let cycle = error.downcast_ref::<CyclicHierarchy>().unwrap();
        assert!(cycle.path.contains("a/A"));
        assert!(cycle.path.contains("a/B"));
    }

    #[test]
    fn apply_attributes_to_declarer() {
        let scanner = game_scanner();
        let mut env = RemapEnvironment::new();
        env.provide_full(&scanner, &class("game/Player")).unwrap().unwrap();

        let mut mappings = Mappings::default();
        // Recorded against the subclass, declared in the superclass
        mappings.fields.insert(
            (class("game/Player"), field("health")),
            field("currentHealth"),
        );
        env.apply(&mappings);

        let entity = env.get(&class("game/Entity")).unwrap();
        assert_eq!(
            entity.fields[&field("health")].rename.target(),
            &field("currentHealth")
        );
        assert!(!env.get(&class("game/Player")).unwrap().fields.contains_key(&field("health")));
    }

    #[test]
    fn rename_targets_are_write_once() {
        let mut env = RemapEnvironment::new();
        let mut first = Mappings::default();
        first.classes.insert(class("a/Foo"), class("b/Bar"));
        let mut second = Mappings::default();
        second.classes.insert(class("a/Foo"), class("c/Baz"));
        env.apply(&first);
        env.apply(&second);
        assert_eq!(env.class_target(&class("a/Foo")).unwrap(), class("b/Bar"));
    }

    #[test]
    fn foreign_application_chains_renames() {
        let mut env = RemapEnvironment::new();
        let mut first = Mappings::default();
        first.classes.insert(class("a/Foo"), class("b/Bar"));
        env.apply(&first);
        let mut second = Mappings::default();
        second.classes.insert(class("b/Bar"), class("c/Baz"));
        env.apply_to_foreign(&second);
        assert_eq!(env.class_target(&class("a/Foo")).unwrap(), class("c/Baz"));
    }

    #[test]
    fn inverse_swaps_namespaces() {
        let scanner = game_scanner();
        let mut env = RemapEnvironment::new();
        env.provide_full(&scanner, &class("game/Player")).unwrap().unwrap();
        let mut mappings = Mappings::default();
        mappings.classes.insert(class("game/Entity"), class("net/Creature"));
        mappings.fields.insert(
            (class("game/Entity"), field("health")),
            field("currentHealth"),
        );
        mappings.methods.insert(
            (class("game/Entity"), method("getHandle", "()Lgame/Entity;")),
            MethodIdentifier::new("handle", "()Lnet/Creature;").unwrap(),
        );
        env.apply(&mappings);

        let inverse = env.inverse();
        let creature = inverse.get(&class("net/Creature")).unwrap();
        assert_eq!(creature.rename.target(), &class("game/Entity"));
        assert_eq!(
            creature.fields[&field("currentHealth")].rename.target(),
            &field("health")
        );
        let handle = &creature.methods[&method("handle", "()Lnet/Creature;")];
        assert_eq!(handle.rename.target().name(), "getHandle");
        // Round-trip restores the original tables
        assert_eq!(inverse.inverse().to_mappings(), env.to_mappings());
    }

    #[test]
    fn package_moves_relocate_unmapped_classes() {
        let mut env = RemapEnvironment::new();
        env.move_package(
            PackageIdentifier::parse("game").unwrap(),
            PackageIdentifier::parse("net/server").unwrap(),
        );
        assert_eq!(
            env.class_target(&class("game/Entity")).unwrap(),
            class("net/server/Entity")
        );
        // Explicit class renames win over the package move
        let mut mappings = Mappings::default();
        mappings.classes.insert(class("game/Special"), class("other/Thing"));
        env.apply(&mappings);
        assert_eq!(env.class_target(&class("game/Special")).unwrap(), class("other/Thing"));
    }

    #[test]
    fn layered_environment_copies_on_write() {
        let scanner = game_scanner();
        let mut base = RemapEnvironment::new();
        base.provide_full(&scanner, &class("game/Player")).unwrap().unwrap();
        let base = Arc::new(base);

        let mut layered = RemapEnvironment::with_parent(base.clone());
        let mut mappings = Mappings::default();
        mappings.classes.insert(class("game/Player"), class("net/Player"));
        layered.apply(&mappings);

        assert!(layered.get(&class("game/Entity")).is_some());
        assert_eq!(layered.class_target(&class("game/Player")).unwrap(), class("net/Player"));
        // The parent layer is untouched
        assert!(base.class_target(&class("game/Player")).is_none());
    }
}
