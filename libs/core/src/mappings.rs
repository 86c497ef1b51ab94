//! Flat mapping tables and their composition algebra.
//!
//! A [`Mappings`] is the portable form of a rename set: four tables from
//! original identifiers to renamed ones, with member entries keyed by
//! the owning class. Unlike a [`RemapEnvironment`] it knows nothing
//! about hierarchies, which makes it cheap to invert, compose and
//! serialize.
//!
//! Method table invariant: the key descriptor is rendered in the
//! original namespace, the value descriptor in the renamed namespace
//! (i.e. the key descriptor passed through the class table).

use bitflags::bitflags;
use failure::Error;
use indexmap::{IndexMap, IndexSet};

use crate::descriptor::MethodDescriptor;
use crate::env::{ClassNotResolved, RemapEnvironment};
use crate::ident::{ClassIdentifier, FieldIdentifier, MethodIdentifier, PackageIdentifier};
use crate::scanner::ClassScanner;

/// A field reference: owning class plus field name.
pub type FieldToken = (ClassIdentifier, FieldIdentifier);
/// A method reference: owning class plus name and descriptor.
pub type MethodToken = (ClassIdentifier, MethodIdentifier);

bitflags! {
    /// Controls what happens to entries the second mapping set doesn't
    /// cover when bridging: by default they keep their intermediate
    /// names, reverted kinds fall back to their original names instead.
    pub struct BridgeFlags: u32 {
        const REVERT_CLASSES = 0b001;
        const REVERT_FIELDS = 0b010;
        const REVERT_METHODS = 0b100;
    }
}

/// Records which entries of the second mapping set a bridge consumed,
/// so a merge can tell which of them still need their own entries.
#[derive(Debug, Default)]
struct ConsumedKeys {
    packages: IndexSet<PackageIdentifier>,
    classes: IndexSet<ClassIdentifier>,
    fields: IndexSet<FieldToken>,
    methods: IndexSet<MethodToken>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Mappings {
    pub packages: IndexMap<PackageIdentifier, PackageIdentifier>,
    pub classes: IndexMap<ClassIdentifier, ClassIdentifier>,
    pub fields: IndexMap<FieldToken, FieldIdentifier>,
    pub methods: IndexMap<MethodToken, MethodIdentifier>,
}
impl Mappings {
    #[inline]
    pub fn new() -> Mappings {
        Mappings::default()
    }
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.classes.is_empty()
            && self.fields.is_empty()
            && self.methods.is_empty()
    }
    /// The renamed form of a class: its explicit entry, its original
    /// name relocated by a package entry, or itself.
    pub fn map_class(&self, id: &ClassIdentifier) -> ClassIdentifier {
        if let Some(target) = self.classes.get(id) {
            return target.clone();
        }
        if let Some(target) = self.packages.get(id.package()) {
            return id.in_package(target);
        }
        id.clone()
    }
    /// Rewrites every class reference in a descriptor through the class
    /// table.
    pub fn map_descriptor(&self, descriptor: &MethodDescriptor) -> MethodDescriptor {
        descriptor.map_classes(|id| {
            let target = self.map_class(id);
            if target == *id {
                None
            } else {
                Some(target)
            }
        })
    }

    /// The reverse mapping set: renamed names become originals. Member
    /// keys are re-owned by the renamed class names.
    pub fn inverse(&self) -> Mappings {
        let mut result = Mappings::default();
        for (from, to) in &self.packages {
            result.packages.insert(to.clone(), from.clone());
        }
        for (from, to) in &self.classes {
            result.classes.insert(to.clone(), from.clone());
        }
        for ((owner, from), to) in &self.fields {
            result
                .fields
                .insert((self.map_class(owner), to.clone()), from.clone());
        }
        for ((owner, from), to) in &self.methods {
            result
                .methods
                .insert((self.map_class(owner), to.clone()), from.clone());
        }
        result
    }

    /// Composes `self` (original -> intermediate) with `other`
    /// (intermediate -> final) using the tables alone. Entries `other`
    /// doesn't cover keep their intermediate names unless the matching
    /// [`BridgeFlags`] revert bit asks for the original instead.
    pub fn bridge(&self, other: &Mappings, flags: BridgeFlags) -> Mappings {
        self.bridge_with(other, flags, None, &mut ConsumedKeys::default())
    }
    /// The common revert policy: unmatched classes (and packages) fall
    /// back to their original names, unmatched members keep their
    /// intermediate names.
    pub fn bridge_reverting(&self, other: &Mappings) -> Mappings {
        self.bridge(other, BridgeFlags::REVERT_CLASSES)
    }
    /// Like [`Mappings::bridge`], but when a member lookup misses, walks
    /// the class hierarchy (resolved through `scanner` in the original
    /// namespace) and retries against each ancestor. This catches
    /// renames `other` records against a declaring superclass.
    pub fn bridge_via(
        &self,
        scanner: &dyn ClassScanner,
        other: &Mappings,
        flags: BridgeFlags,
    ) -> Result<Mappings, Error> {
        let env = self.resolve_hierarchy(scanner)?;
        Ok(self.bridge_with(other, flags, Some(&env), &mut ConsumedKeys::default()))
    }
    /// Composes `self` with `other` and additionally carries over every
    /// `other` entry the bridge didn't consume, re-keyed into the
    /// original namespace. The result applies both rename sets at once.
    pub fn merge_sequential(
        &self,
        scanner: &dyn ClassScanner,
        other: &Mappings,
    ) -> Result<Mappings, Error> {
        let env = self.resolve_hierarchy(scanner)?;
        let mut consumed = ConsumedKeys::default();
        let mut result = self.bridge_with(other, BridgeFlags::empty(), Some(&env), &mut consumed);

        let mut back: IndexMap<ClassIdentifier, ClassIdentifier> = IndexMap::new();
        for (from, to) in &self.classes {
            back.insert(to.clone(), from.clone());
        }
        let back_class = |id: &ClassIdentifier| back.get(id).cloned().unwrap_or_else(|| id.clone());

        for (mid, to) in &other.packages {
            if consumed.packages.contains(mid) {
                continue;
            }
            let from = self
                .packages
                .iter()
                .find(|(_, target)| *target == mid)
                .map(|(original, _)| original.clone())
                .unwrap_or_else(|| mid.clone());
            result.packages.entry(from).or_insert_with(|| to.clone());
        }
        for (mid, to) in &other.classes {
            if consumed.classes.contains(mid) {
                continue;
            }
            let from = back_class(mid);
            if from != *to {
                result.classes.entry(from).or_insert_with(|| to.clone());
            }
        }
        for ((owner, mid), to) in &other.fields {
            if consumed.fields.contains(&(owner.clone(), mid.clone())) {
                continue;
            }
            // Untouched by the first set, so the original name is the
            // intermediate one
            let key = (back_class(owner), mid.clone());
            result.fields.entry(key).or_insert_with(|| to.clone());
        }
        for ((owner, mid), to) in &other.methods {
            if consumed.methods.contains(&(owner.clone(), mid.clone())) {
                continue;
            }
            let descriptor = match MethodDescriptor::parse(mid.descriptor()) {
                Ok(descriptor) => descriptor
                    .map_classes(|id| back.get(id).cloned())
                    .to_string(),
                Err(_) => mid.descriptor().to_string(),
            };
            let key = (
                back_class(owner),
                MethodIdentifier::from_parts(mid.name().to_string(), descriptor),
            );
            result.methods.entry(key).or_insert_with(|| to.clone());
        }
        Ok(result)
    }

    fn resolve_hierarchy(&self, scanner: &dyn ClassScanner) -> Result<RemapEnvironment, Error> {
        let mut env = RemapEnvironment::new();
        let owners = self
            .classes
            .keys()
            .chain(self.fields.keys().map(|(owner, _)| owner))
            .chain(self.methods.keys().map(|(owner, _)| owner));
        for owner in owners {
            env.provide(scanner, owner)?;
        }
        Ok(env)
    }
    fn bridge_with(
        &self,
        other: &Mappings,
        flags: BridgeFlags,
        env: Option<&RemapEnvironment>,
        consumed: &mut ConsumedKeys,
    ) -> Mappings {
        let mut result = Mappings::default();
        for (from, mid) in &self.packages {
            let to = match other.packages.get(mid) {
                Some(to) => {
                    consumed.packages.insert(mid.clone());
                    to.clone()
                }
                None if flags.contains(BridgeFlags::REVERT_CLASSES) => from.clone(),
                None => mid.clone(),
            };
            if to != *from {
                result.packages.insert(from.clone(), to);
            }
        }
        for (from, mid) in &self.classes {
            let to = match other.classes.get(mid) {
                Some(to) => {
                    consumed.classes.insert(mid.clone());
                    to.clone()
                }
                None => {
                    let derived = other.map_class(mid);
                    if derived != *mid {
                        derived
                    } else if flags.contains(BridgeFlags::REVERT_CLASSES) {
                        from.clone()
                    } else {
                        mid.clone()
                    }
                }
            };
            if to != *from {
                result.classes.insert(from.clone(), to);
            }
        }
        for ((owner, from), mid) in &self.fields {
            let to = match self.chained_field(other, env, owner, mid, consumed) {
                Some(to) => to,
                None if flags.contains(BridgeFlags::REVERT_FIELDS) => from.clone(),
                None => mid.clone(),
            };
            if to != *from {
                result.fields.insert((owner.clone(), from.clone()), to);
            }
        }
        // The class table must be complete before value descriptors can
        // be rendered in the final namespace
        let mut methods = Vec::new();
        for ((owner, from), mid) in &self.methods {
            let to_name = match self.chained_method(other, env, owner, mid, consumed) {
                Some(to) => to.name().to_string(),
                None if flags.contains(BridgeFlags::REVERT_METHODS) => from.name().to_string(),
                None => mid.name().to_string(),
            };
            if to_name == from.name() {
                continue;
            }
            let descriptor = match MethodDescriptor::parse(from.descriptor()) {
                Ok(descriptor) => result.map_descriptor(&descriptor).to_string(),
                Err(_) => from.descriptor().to_string(),
            };
            methods.push((
                (owner.clone(), from.clone()),
                MethodIdentifier::from_parts(to_name, descriptor),
            ));
        }
        result.methods.extend(methods);
        result
    }
    fn chained_field(
        &self,
        other: &Mappings,
        env: Option<&RemapEnvironment>,
        owner: &ClassIdentifier,
        mid: &FieldIdentifier,
        consumed: &mut ConsumedKeys,
    ) -> Option<FieldIdentifier> {
        let direct_key = (self.map_class(owner), mid.clone());
        if let Some(to) = other.fields.get(&direct_key) {
            consumed.fields.insert(direct_key);
            return Some(to.clone());
        }
        for structure in env?.hierarchy(owner).into_iter().skip(1) {
            let key = (self.map_class(structure.id()), mid.clone());
            if let Some(to) = other.fields.get(&key) {
                consumed.fields.insert(key);
                return Some(to.clone());
            }
        }
        None
    }
    fn chained_method(
        &self,
        other: &Mappings,
        env: Option<&RemapEnvironment>,
        owner: &ClassIdentifier,
        mid: &MethodIdentifier,
        consumed: &mut ConsumedKeys,
    ) -> Option<MethodIdentifier> {
        let direct_key = (self.map_class(owner), mid.clone());
        if let Some(to) = other.methods.get(&direct_key) {
            consumed.methods.insert(direct_key);
            return Some(to.clone());
        }
        for structure in env?.hierarchy(owner).into_iter().skip(1) {
            let key = (self.map_class(structure.id()), mid.clone());
            if let Some(to) = other.methods.get(&key) {
                consumed.methods.insert(key);
                return Some(to.clone());
            }
        }
        None
    }

    /// Drops entries that don't rename anything: identity members first,
    /// then identity classes that no surviving member entry still needs,
    /// then identity packages.
    pub fn remove_useless_entries(&mut self) {
        let fields = ::std::mem::replace(&mut self.fields, IndexMap::new());
        self.fields = fields
            .into_iter()
            .filter(|((_, from), to)| from != to)
            .collect();
        let methods = ::std::mem::replace(&mut self.methods, IndexMap::new());
        self.methods = methods
            .into_iter()
            .filter(|((_, from), to)| from.name() != to.name())
            .collect();

        let mut referenced: IndexSet<ClassIdentifier> = IndexSet::new();
        for (owner, _) in self.fields.keys() {
            referenced.insert(owner.clone());
        }
        for (owner, _) in self.methods.keys() {
            referenced.insert(owner.clone());
        }
        let classes = ::std::mem::replace(&mut self.classes, IndexMap::new());
        self.classes = classes
            .into_iter()
            .filter(|(from, to)| from != to || referenced.contains(from))
            .collect();
        let packages = ::std::mem::replace(&mut self.packages, IndexMap::new());
        self.packages = packages
            .into_iter()
            .filter(|(from, to)| from != to)
            .collect();
    }
    /// Drops every entry whose *original* owner lives in `namespace` or
    /// a subpackage of it. Matching is package-boundary aware: `net`
    /// doesn't cover `network`.
    pub fn remove_namespace(&mut self, namespace: &str) {
        fn covered(package: &PackageIdentifier, namespace: &str) -> bool {
            let name = package.full_name();
            name == namespace
                || (name.len() > namespace.len()
                    && name.starts_with(namespace)
                    && name.as_bytes()[namespace.len()] == b'/')
        }
        let namespace = namespace.trim_end_matches('/');
        let classes = ::std::mem::replace(&mut self.classes, IndexMap::new());
        self.classes = classes
            .into_iter()
            .filter(|(from, _)| !covered(from.package(), namespace))
            .collect();
        let fields = ::std::mem::replace(&mut self.fields, IndexMap::new());
        self.fields = fields
            .into_iter()
            .filter(|((owner, _), _)| !covered(owner.package(), namespace))
            .collect();
        let methods = ::std::mem::replace(&mut self.methods, IndexMap::new());
        self.methods = methods
            .into_iter()
            .filter(|((owner, _), _)| !covered(owner.package(), namespace))
            .collect();
        let packages = ::std::mem::replace(&mut self.packages, IndexMap::new());
        self.packages = packages
            .into_iter()
            .filter(|(from, _)| !covered(from, namespace))
            .collect();
    }

    /// Resolves every mentioned class through `scanner` and seeds the
    /// renames into a fresh environment, yielding hierarchy-aware
    /// lookups for these tables.
    ///
    /// Unlike plain scanning, a member entry whose owning class can't be
    /// found by any scanner fails with [`ClassNotResolved`]: silently
    /// dropping it would lose a rename the tables promised.
    pub fn to_structure(&self, scanner: &dyn ClassScanner) -> Result<RemapEnvironment, Error> {
        let mut env = RemapEnvironment::new();
        for (owner, _) in self.classes.iter() {
            env.provide_full(scanner, owner)?;
        }
        let members: Vec<&ClassIdentifier> = self
            .fields
            .keys()
            .map(|(owner, _)| owner)
            .chain(self.methods.keys().map(|(owner, _)| owner))
            .collect();
        for owner in members {
            if env.provide_full(scanner, owner)?.is_none() {
                return Err(ClassNotResolved(owner.clone()).into());
            }
        }
        env.apply(self);
        Ok(env)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scanner::{ClassContents, ClassShape, EmptyScanner, IndexScanner};

    fn class(s: &str) -> ClassIdentifier {
        ClassIdentifier::parse(s).unwrap()
    }
    fn field(s: &str) -> FieldIdentifier {
        FieldIdentifier::new(s).unwrap()
    }
    fn method(name: &str, descriptor: &str) -> MethodIdentifier {
        MethodIdentifier::new(name, descriptor).unwrap()
    }

    fn obf2inter() -> Mappings {
        let mut m = Mappings::default();
        m.classes.insert(class("a/Foo"), class("b/Bar"));
        m.fields.insert((class("a/Foo"), field("x")), field("counter"));
        m.methods.insert(
            (class("a/Foo"), method("a", "(La/Foo;)V")),
            method("update", "(Lb/Bar;)V"),
        );
        m
    }
    fn inter2pub() -> Mappings {
        let mut m = Mappings::default();
        m.classes.insert(class("b/Bar"), class("c/Baz"));
        m.fields
            .insert((class("b/Bar"), field("counter")), field("tickCount"));
        m.methods.insert(
            (class("b/Bar"), method("update", "(Lb/Bar;)V")),
            method("tick", "(Lc/Baz;)V"),
        );
        m
    }

    #[test]
    fn bridge_chains_tables() {
        let bridged = obf2inter().bridge(&inter2pub(), BridgeFlags::empty());
        assert_eq!(bridged.classes[&class("a/Foo")], class("c/Baz"));
        assert_eq!(bridged.fields[&(class("a/Foo"), field("x"))], field("tickCount"));
        let to = &bridged.methods[&(class("a/Foo"), method("a", "(La/Foo;)V"))];
        assert_eq!(to.name(), "tick");
        // Value descriptor rendered in the final namespace
        assert_eq!(to.descriptor(), "(Lc/Baz;)V");
    }

    #[test]
    fn bridge_revert_policy() {
        let mut first = Mappings::default();
        first.classes.insert(class("a/Foo"), class("b/Bar"));
        first.classes.insert(class("a/Skip"), class("b/Skip"));
        first.fields.insert((class("a/Skip"), field("s")), field("kept"));
        let mut second = Mappings::default();
        second.classes.insert(class("b/Bar"), class("c/Baz"));

        let default = first.bridge(&second, BridgeFlags::empty());
        assert_eq!(default.classes[&class("a/Skip")], class("b/Skip"));

        let reverted = first.bridge_reverting(&second);
        // Unmatched class falls back to its original name (an identity
        // entry, so it disappears)
        assert!(!reverted.classes.contains_key(&class("a/Skip")));
        assert_eq!(reverted.classes[&class("a/Foo")], class("c/Baz"));
        // Members aren't reverted by the class bit
        assert_eq!(reverted.fields[&(class("a/Skip"), field("s"))], field("kept"));

        let fully = first.bridge(&second, BridgeFlags::REVERT_CLASSES | BridgeFlags::REVERT_FIELDS);
        assert!(!fully.fields.contains_key(&(class("a/Skip"), field("s"))));
    }

    #[test]
    fn bridge_via_walks_hierarchy() {
        let mut first = Mappings::default();
        first.classes.insert(class("a/Sub"), class("b/SubB"));
        first.classes.insert(class("a/Anc"), class("b/AncB"));
        first.fields.insert((class("a/Sub"), field("f")), field("g"));
        let mut second = Mappings::default();
        // Recorded against the declaring ancestor in the intermediate
        // namespace
        second.fields.insert((class("b/AncB"), field("g")), field("h"));

        let mut scanner = IndexScanner::new();
        scanner.insert(
            class("a/Sub"),
            ClassContents {
                shape: ClassShape {
                    super_class: Some(class("a/Anc")),
                    ..ClassShape::default()
                },
                ..ClassContents::default()
            },
        );
        scanner.insert(class("a/Anc"), ClassContents::default());

        let blind = first.bridge(&second, BridgeFlags::empty());
        assert_eq!(blind.fields[&(class("a/Sub"), field("f"))], field("g"));

        let aware = first.bridge_via(&scanner, &second, BridgeFlags::empty()).unwrap();
        assert_eq!(aware.fields[&(class("a/Sub"), field("f"))], field("h"));
    }

    #[test]
    fn inverse_reowns_members() {
        let inverse = obf2inter().inverse();
        assert_eq!(inverse.classes[&class("b/Bar")], class("a/Foo"));
        assert_eq!(
            inverse.fields[&(class("b/Bar"), field("counter"))],
            field("x")
        );
        assert_eq!(
            inverse.methods[&(class("b/Bar"), method("update", "(Lb/Bar;)V"))],
            method("a", "(La/Foo;)V")
        );
        // Double inversion is the identity
        assert_eq!(inverse.inverse(), obf2inter());
    }

    #[test]
    fn merge_carries_unconsumed_entries() {
        let first = obf2inter();
        let mut second = inter2pub();
        // Only known to the second set
        second.classes.insert(class("lib/Util"), class("pub/Util"));
        second
            .fields
            .insert((class("lib/Util"), field("instance")), field("INSTANCE"));

        let merged = first.merge_sequential(&EmptyScanner, &second).unwrap();
        assert_eq!(merged.classes[&class("a/Foo")], class("c/Baz"));
        assert_eq!(merged.classes[&class("lib/Util")], class("pub/Util"));
        assert_eq!(
            merged.fields[&(class("lib/Util"), field("instance"))],
            field("INSTANCE")
        );
        // Consumed entries don't reappear under their intermediate names
        assert!(!merged.fields.contains_key(&(class("a/Foo"), field("counter"))));
        assert!(!merged.classes.contains_key(&class("b/Bar")));
    }

    #[test]
    fn useless_entries_are_pruned() {
        let mut m = Mappings::default();
        m.classes.insert(class("a/Same"), class("a/Same"));
        m.classes.insert(class("a/Holder"), class("a/Holder"));
        m.classes.insert(class("a/Moved"), class("b/Moved"));
        m.fields.insert((class("a/Holder"), field("f")), field("renamed"));
        m.fields.insert((class("a/Same"), field("g")), field("g"));
        m.methods.insert(
            (class("a/Same"), method("m", "()V")),
            method("m", "()V"),
        );
        m.packages.insert(
            PackageIdentifier::parse("a").unwrap(),
            PackageIdentifier::parse("a").unwrap(),
        );
        m.remove_useless_entries();
        // Identity class with a surviving member entry stays
        assert!(m.classes.contains_key(&class("a/Holder")));
        assert!(m.classes.contains_key(&class("a/Moved")));
        assert!(!m.classes.contains_key(&class("a/Same")));
        assert!(m.fields.len() == 1);
        assert!(m.methods.is_empty());
        assert!(m.packages.is_empty());
    }

    #[test]
    fn namespace_removal_is_boundary_aware() {
        let mut m = Mappings::default();
        m.classes.insert(class("net/Foo"), class("x/Foo"));
        m.classes.insert(class("net/sub/Bar"), class("x/Bar"));
        m.classes.insert(class("network/Baz"), class("x/Baz"));
        m.fields.insert((class("net/Foo"), field("f")), field("g"));
        m.remove_namespace("net");
        assert!(m.classes.contains_key(&class("network/Baz")));
        assert!(!m.classes.contains_key(&class("net/Foo")));
        assert!(!m.classes.contains_key(&class("net/sub/Bar")));
        assert!(m.fields.is_empty());
    }

    #[test]
    fn structure_seeding() {
        let mut scanner = IndexScanner::new();
        scanner.insert(class("a/Foo"), ClassContents::default());
        let env = obf2inter().to_structure(&scanner).unwrap();
        assert_eq!(env.class_target(&class("a/Foo")).unwrap(), class("b/Bar"));
        let found = env.find_field(&class("a/Foo"), &field("x"), &class("a/Foo")).unwrap();
        assert_eq!(found.rename.target(), &field("counter"));
    }

    #[test]
    fn structure_seeding_demands_member_owners() {
        use crate::env::ClassNotResolved;
        let error = obf2inter().to_structure(&EmptyScanner).unwrap_err();
        assert!(error.downcast_ref::<ClassNotResolved>().is_some());
    }

    #[test]
    fn bridging_identity_changes_nothing() {
        let original = obf2inter();
        let mut identity = Mappings::default();
        for to in original.classes.values() {
            identity.classes.insert(to.clone(), to.clone());
        }
        for ((owner, _), to) in &original.fields {
            identity
                .fields
                .insert((original.map_class(owner), to.clone()), to.clone());
        }
        for ((owner, _), to) in &original.methods {
            identity
                .methods
                .insert((original.map_class(owner), to.clone()), to.clone());
        }
        assert_eq!(original.bridge(&identity, BridgeFlags::empty()), original);
    }
}
