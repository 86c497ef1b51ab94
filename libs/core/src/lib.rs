//! The symbol remapping engine.
//!
//! Compiled classes refer to each other through three kinds of symbols:
//! type names, field names and method names (plus their descriptors).
//! This crate models those symbols as immutable identifiers, pairs them
//! with mutable renames, and resolves the inheritance graph needed to
//! attribute every member rename to the class that actually declares it.
//!
//! The pieces fit together like this:
//! - [`ident`] and [`descriptor`] are the pure value types.
//! - [`change`] pairs an identifier with its write-once rename target.
//! - [`structure`] records a single class (members, hierarchy links, flags).
//! - [`env`] owns every known class structure by identity and performs the
//!   lazy, cycle-checked graph construction through a [`scanner::ClassScanner`].
//! - [`mappings`] is the flat-table algebra (invert, bridge, merge, prune)
//!   with [`format`] as its line-oriented text form.
//! - [`remapper`] is the facade a bytecode rewriter queries one symbol at
//!   a time.
extern crate indexmap;
extern crate failure;
extern crate failure_derive;
extern crate itertools;
extern crate bitflags;
extern crate log;
extern crate parking_lot;

pub mod ident;
pub mod descriptor;
pub mod change;
pub mod structure;
pub mod scanner;
pub mod env;
pub mod mappings;
pub mod format;
pub mod remapper;

pub mod prelude {
    pub use crate::ident::{ClassIdentifier, FieldIdentifier, MethodIdentifier, PackageIdentifier};
    pub use crate::descriptor::{BaseType, MethodDescriptor, TypeDescriptor};
    pub use crate::change::{Change, ClassChange, FieldChange, MethodChange, Move, PackageChange, PackageMove};
    pub use crate::structure::{AccessLevel, ClassStructure, FieldStructure, MethodStructure};
    pub use crate::scanner::{
        ClassContents, ClassScanner, ClassShape, EmptyScanner, FieldData, IndexScanner,
        MethodData, ScannerChain,
    };
    pub use crate::env::{ClassNotResolved, CyclicHierarchy, RemapEnvironment};
    pub use crate::mappings::{BridgeFlags, FieldToken, Mappings, MethodToken};
    pub use crate::format::{SrgMappingsFormat, SrgParseError};
    pub use crate::remapper::{ClassRemapper, SharedClassRemapper};
}

pub use crate::env::RemapEnvironment;
pub use crate::ident::MalformedIdentifier;
pub use crate::mappings::Mappings;
