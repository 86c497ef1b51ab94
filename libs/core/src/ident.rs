//! Immutable identifiers for packages, classes, fields and methods.
//!
//! Identifiers are pure value types: equality, hashing and rendering are
//! total functions of their fields, and every constructor validates its
//! input, failing with [`MalformedIdentifier`] instead of coercing.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use failure_derive::Fail;

use crate::descriptor::MethodDescriptor;

#[derive(Debug, Fail)]
pub enum MalformedIdentifier {
    #[fail(display = "Invalid package name {:?}", _0)]
    Package(String),
    #[fail(display = "Invalid class name {:?}", _0)]
    Class(String),
    #[fail(display = "Nested class {:?} doesn't share its parent's package", _0)]
    NestedPackage(String),
    #[fail(display = "Invalid field name {:?}", _0)]
    Field(String),
    #[fail(display = "Invalid descriptor {:?} for method {:?}", descriptor, name)]
    Method { name: String, descriptor: String },
    #[fail(display = "Invalid type descriptor {:?}", _0)]
    TypeDescriptor(String),
}

/// A slash-separated package path.
///
/// The root package is the empty path: it has an empty name, no parent
/// and an empty prefix. Every other package renders without a leading or
/// trailing separator (`net/minecraft/server`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PackageIdentifier {
    full: String,
}
impl PackageIdentifier {
    #[inline]
    pub fn root() -> PackageIdentifier {
        PackageIdentifier { full: String::new() }
    }
    pub fn parse(full: &str) -> Result<PackageIdentifier, MalformedIdentifier> {
        if full.is_empty() {
            return Ok(PackageIdentifier::root());
        }
        let invalid = || MalformedIdentifier::Package(full.into());
        for segment in full.split('/') {
            if segment.is_empty() || segment.contains('.') {
                return Err(invalid());
            }
        }
        Ok(PackageIdentifier { full: full.into() })
    }
    #[inline]
    pub fn is_root(&self) -> bool {
        self.full.is_empty()
    }
    /// The leaf segment, empty for the root package.
    #[inline]
    pub fn name(&self) -> &str {
        match self.full.rfind('/') {
            Some(index) => &self.full[(index + 1)..],
            None => &self.full,
        }
    }
    /// The enclosing package, or `None` for the root package and for
    /// single-segment packages.
    pub fn parent(&self) -> Option<PackageIdentifier> {
        let index = self.full.rfind('/')?;
        Some(PackageIdentifier { full: self.full[..index].into() })
    }
    #[inline]
    pub fn full_name(&self) -> &str {
        &self.full
    }
    /// The full name followed by a trailing `/`, used when prefixing class
    /// names. Empty for the root package.
    pub fn prefix(&self) -> String {
        if self.full.is_empty() {
            String::new()
        } else {
            format!("{}/", self.full)
        }
    }
}
impl Display for PackageIdentifier {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.full)
    }
}
impl FromStr for PackageIdentifier {
    type Err = MalformedIdentifier;

    #[inline]
    fn from_str(s: &str) -> Result<PackageIdentifier, MalformedIdentifier> {
        PackageIdentifier::parse(s)
    }
}

/// A class name, disassembled into package, nesting parent chain and leaf
/// name.
///
/// Composite names split on `$`: the segment before the first `$` is the
/// outermost name and every later segment keeps its `$`. A bare trailing
/// `$` is a nested segment of its own, while a *leading* `$` belongs to
/// the outermost name:
///
/// | Full name               | Parent                | Leaf name |
/// | ----------------------- | --------------------- | --------- |
/// | `com/example/CoolClass` | -                     | `CoolClass` |
/// | `a/Nested$Class`        | `a/Nested`            | `$Class`  |
/// | `a/Class$with$lambda$3` | `a/Class$with$lambda` | `$3`      |
/// | `scala/Nothing$`        | `scala/Nothing`       | `$`       |
/// | `scary/$Scala$$`        | `scary/$Scala$`       | `$`       |
/// | `scary/$Scala`          | -                     | `$Scala`  |
///
/// The parent chain is purely lexical: an intermediate parent may not
/// exist as a real class, but it is still tracked so a rename of the
/// enclosing class propagates to everything nested below it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClassIdentifier {
    package: PackageIdentifier,
    parent: Option<Box<ClassIdentifier>>,
    name: String,
}
impl ClassIdentifier {
    pub fn new(
        package: PackageIdentifier,
        parent: Option<ClassIdentifier>,
        name: &str,
    ) -> Result<ClassIdentifier, MalformedIdentifier> {
        if name.is_empty() || name.contains('.') || name.contains('/') {
            return Err(MalformedIdentifier::Class(name.into()));
        }
        if let Some(ref parent) = parent {
            if *parent.package() != package {
                return Err(MalformedIdentifier::NestedPackage(format!(
                    "{}{}",
                    package.prefix(),
                    name
                )));
            }
        }
        Ok(ClassIdentifier { package, parent: parent.map(Box::new), name: name.into() })
    }
    /// Disassembles a composite class name (`Outer$Inner$1`) into a
    /// nesting chain within `package`.
    pub fn from_composite(
        package: PackageIdentifier,
        composite: &str,
    ) -> Result<ClassIdentifier, MalformedIdentifier> {
        if composite.is_empty() {
            return Err(MalformedIdentifier::Class(composite.into()));
        }
        let mut segments: Vec<String> = Vec::new();
        for (index, part) in composite.split('$').enumerate() {
            if index == 0 {
                segments.push(part.into());
            } else {
                segments.push(format!("${}", part));
            }
        }
        // A leading '$' produces an empty first segment which belongs to
        // the outermost name, not to a parent of its own.
        if segments.first().map(String::is_empty) == Some(true) {
            segments.remove(0);
        }
        let mut current: Option<ClassIdentifier> = None;
        for segment in &segments {
            current = Some(ClassIdentifier::new(package.clone(), current, segment)?);
        }
        match current {
            Some(id) => Ok(id),
            None => Err(MalformedIdentifier::Class(composite.into())),
        }
    }
    pub fn parse(full_name: &str) -> Result<ClassIdentifier, MalformedIdentifier> {
        if full_name.is_empty() || full_name.ends_with('/') {
            return Err(MalformedIdentifier::Class(full_name.into()));
        }
        let (package, composite) = match full_name.rfind('/') {
            Some(index) => (
                PackageIdentifier::parse(&full_name[..index])?,
                &full_name[(index + 1)..],
            ),
            None => (PackageIdentifier::root(), full_name),
        };
        ClassIdentifier::from_composite(package, composite)
    }
    #[inline]
    pub fn package(&self) -> &PackageIdentifier {
        &self.package
    }
    #[inline]
    pub fn parent(&self) -> Option<&ClassIdentifier> {
        self.parent.as_ref().map(Box::as_ref)
    }
    /// The leaf name, including its leading `$` for nested segments.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The composite name without the package prefix.
    pub fn full_simple_name(&self) -> String {
        match self.parent {
            Some(ref parent) => format!("{}{}", parent.full_simple_name(), self.name),
            None => self.name.clone(),
        }
    }
    pub fn full_name(&self) -> String {
        format!("{}{}", self.package.prefix(), self.full_simple_name())
    }
    /// Rebuilds this identifier (and its whole parent chain) inside
    /// another package.
    pub fn in_package(&self, package: &PackageIdentifier) -> ClassIdentifier {
        ClassIdentifier {
            package: package.clone(),
            parent: self
                .parent
                .as_ref()
                .map(|parent| Box::new(parent.in_package(package))),
            name: self.name.clone(),
        }
    }
}
impl Display for ClassIdentifier {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
impl FromStr for ClassIdentifier {
    type Err = MalformedIdentifier;

    #[inline]
    fn from_str(s: &str) -> Result<ClassIdentifier, MalformedIdentifier> {
        ClassIdentifier::parse(s)
    }
}

/// A field name. Descriptors are not part of field identity: a field is
/// unique by name within its owner, and its type is tracked separately so
/// it can be renamed alongside the classes it references.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FieldIdentifier {
    name: String,
}
impl FieldIdentifier {
    pub fn new(name: &str) -> Result<FieldIdentifier, MalformedIdentifier> {
        if name.is_empty() || name.contains('/') || name.contains('.') || name.contains(';') {
            return Err(MalformedIdentifier::Field(name.into()));
        }
        Ok(FieldIdentifier { name: name.into() })
    }
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}
impl Display for FieldIdentifier {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A method name plus its descriptor. Overloads are distinct identities,
/// so the descriptor participates in equality and hashing.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct MethodIdentifier {
    name: String,
    descriptor: String,
}
impl MethodIdentifier {
    pub fn new(name: &str, descriptor: &str) -> Result<MethodIdentifier, MalformedIdentifier> {
        if name.is_empty() || name.contains('/') || name.contains('.') {
            return Err(MalformedIdentifier::Method {
                name: name.into(),
                descriptor: descriptor.into(),
            });
        }
        MethodDescriptor::parse(descriptor).map_err(|_| MalformedIdentifier::Method {
            name: name.into(),
            descriptor: descriptor.into(),
        })?;
        Ok(MethodIdentifier { name: name.into(), descriptor: descriptor.into() })
    }
    /// Bypasses descriptor validation for descriptors rendered from an
    /// already-parsed [`MethodDescriptor`].
    pub(crate) fn from_parts(name: String, descriptor: String) -> MethodIdentifier {
        MethodIdentifier { name, descriptor }
    }
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[inline]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}
impl Display for MethodIdentifier {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {}", self.name, self.descriptor)
    }
}
