//! Per-class structure records.
//!
//! A [`ClassStructure`] holds everything the environment knows about a
//! single class: its rename, its hierarchy links and its members. A
//! structure starts as a placeholder (nothing but an identity), gains its
//! shape when the class header is scanned, and becomes *full* once its
//! members and those of its ancestors are known.

use std::fmt::{self, Display, Formatter};

use indexmap::{IndexMap, IndexSet};

use crate::change::{ClassChange, FieldChange, MethodChange};
use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::ident::{ClassIdentifier, FieldIdentifier, MethodIdentifier};

/// The access level of a class member.
///
/// `Unknown` is used for members only known through a mapping file, which
/// records names but not flags. Unknown members are treated as visible
/// everywhere so a missing flag never hides a rename.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AccessLevel {
    Private,
    /// Package-private ("default" access).
    Internal,
    Protected,
    Public,
    Unknown,
}
impl AccessLevel {
    /// Decodes the access bits of a member flag word.
    pub fn from_flags(flags: u16) -> AccessLevel {
        if flags & 0x0001 != 0 {
            AccessLevel::Public
        } else if flags & 0x0002 != 0 {
            AccessLevel::Private
        } else if flags & 0x0004 != 0 {
            AccessLevel::Protected
        } else {
            AccessLevel::Internal
        }
    }
    /// Whether a member of `declarer` with this access is visible from
    /// `viewer`.
    ///
    /// Protected access is approximated as visible: the viewer reached
    /// the declarer by walking its own superclass chain, so it is always
    /// a subclass.
    pub fn visible_to(self, declarer: &ClassIdentifier, viewer: &ClassIdentifier) -> bool {
        match self {
            AccessLevel::Private => declarer == viewer,
            AccessLevel::Internal => declarer.package() == viewer.package(),
            AccessLevel::Protected | AccessLevel::Public | AccessLevel::Unknown => true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldStructure {
    pub rename: FieldChange,
    /// The class that declares this field.
    pub owner: ClassIdentifier,
    pub access: AccessLevel,
    pub is_static: Option<bool>,
    pub descriptor: Option<TypeDescriptor>,
}
impl FieldStructure {
    pub fn named(id: FieldIdentifier, owner: ClassIdentifier) -> FieldStructure {
        FieldStructure {
            rename: FieldChange::new(id),
            owner,
            access: AccessLevel::Unknown,
            is_static: None,
            descriptor: None,
        }
    }
    #[inline]
    pub fn id(&self) -> &FieldIdentifier {
        self.rename.original()
    }
}

#[derive(Clone, Debug)]
pub struct MethodStructure {
    pub rename: MethodChange,
    pub descriptor: MethodDescriptor,
    pub owner: ClassIdentifier,
    pub access: AccessLevel,
    pub is_static: Option<bool>,
}
impl MethodStructure {
    #[inline]
    pub fn id(&self) -> &MethodIdentifier {
        self.rename.original()
    }
}

#[derive(Clone, Debug)]
pub struct ClassStructure {
    pub rename: ClassChange,
    pub super_class: Option<ClassIdentifier>,
    pub interfaces: IndexSet<ClassIdentifier>,
    /// Members keyed by original identifier. Only declared (or seeded)
    /// members live here; inherited ones are found by walking the
    /// hierarchy.
    pub fields: IndexMap<FieldIdentifier, FieldStructure>,
    pub methods: IndexMap<MethodIdentifier, MethodStructure>,
    pub is_interface: Option<bool>,
    /// Set once the class and all of its ancestors have had their
    /// members scanned and merged.
    pub is_full: bool,
}
impl ClassStructure {
    /// A structure known only by name, before any scan.
    pub fn placeholder(id: ClassIdentifier) -> ClassStructure {
        ClassStructure {
            rename: ClassChange::new(id),
            super_class: None,
            interfaces: IndexSet::new(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
            is_interface: None,
            is_full: false,
        }
    }
    #[inline]
    pub fn id(&self) -> &ClassIdentifier {
        self.rename.original()
    }
    /// Superclass followed by interfaces, in declaration order.
    pub fn parents(&self) -> impl Iterator<Item = &ClassIdentifier> {
        self.super_class.iter().chain(self.interfaces.iter())
    }
}
impl Display for ClassStructure {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let kind = match self.is_interface {
            Some(true) => "interface",
            Some(false) => "class",
            None => "type",
        };
        write!(f, "{} {}", kind, self.rename)?;
        if self.is_full {
            write!(f, " (full)")?;
        }
        Ok(())
    }
}
