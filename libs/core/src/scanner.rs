//! Sources of class structure data.
//!
//! A [`ClassScanner`] answers two questions about a class it can see:
//! its *shape* (hierarchy links and kind) and its *contents* (members).
//! The split matters because shapes are cheap and needed eagerly while
//! resolving hierarchies, whereas contents are only pulled when a class
//! is promoted to full.

use failure::Error;
use indexmap::{IndexMap, IndexSet};

use crate::ident::{ClassIdentifier, FieldIdentifier, MethodIdentifier};
use crate::descriptor::TypeDescriptor;
use crate::structure::AccessLevel;

/// Hierarchy links and kind of a class, without its members.
#[derive(Clone, Debug, Default)]
pub struct ClassShape {
    pub super_class: Option<ClassIdentifier>,
    pub interfaces: IndexSet<ClassIdentifier>,
    pub is_interface: bool,
}

#[derive(Clone, Debug)]
pub struct FieldData {
    pub id: FieldIdentifier,
    pub access: AccessLevel,
    pub is_static: bool,
    pub descriptor: Option<TypeDescriptor>,
}

#[derive(Clone, Debug)]
pub struct MethodData {
    pub id: MethodIdentifier,
    pub access: AccessLevel,
    pub is_static: bool,
}

/// A class shape together with its declared members.
#[derive(Clone, Debug, Default)]
pub struct ClassContents {
    pub shape: ClassShape,
    pub fields: Vec<FieldData>,
    pub methods: Vec<MethodData>,
}

/// Provides structure data for classes it knows about.
///
/// Returning `Ok(None)` means the scanner cannot see the class at all,
/// which is an ordinary outcome (the class may live in a library outside
/// the scanned set). `Err` is reserved for actual failures reading an
/// otherwise visible class.
pub trait ClassScanner {
    fn scan_shape(&self, id: &ClassIdentifier) -> Result<Option<ClassShape>, Error>;
    fn scan_contents(&self, id: &ClassIdentifier) -> Result<Option<ClassContents>, Error>;
}

/// A scanner that can't see anything.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmptyScanner;
impl ClassScanner for EmptyScanner {
    fn scan_shape(&self, _id: &ClassIdentifier) -> Result<Option<ClassShape>, Error> {
        Ok(None)
    }
    fn scan_contents(&self, _id: &ClassIdentifier) -> Result<Option<ClassContents>, Error> {
        Ok(None)
    }
}

/// An in-memory scanner backed by pre-registered class contents.
#[derive(Debug, Default)]
pub struct IndexScanner {
    classes: IndexMap<ClassIdentifier, ClassContents>,
}
impl IndexScanner {
    pub fn new() -> IndexScanner {
        IndexScanner::default()
    }
    pub fn insert(&mut self, id: ClassIdentifier, contents: ClassContents) {
        self.classes.insert(id, contents);
    }
}
impl ClassScanner for IndexScanner {
    fn scan_shape(&self, id: &ClassIdentifier) -> Result<Option<ClassShape>, Error> {
        Ok(self.classes.get(id).map(|contents| contents.shape.clone()))
    }
    fn scan_contents(&self, id: &ClassIdentifier) -> Result<Option<ClassContents>, Error> {
        Ok(self.classes.get(id).cloned())
    }
}

/// Consults a list of scanners in order, taking the first answer.
pub struct ScannerChain {
    scanners: Vec<Box<dyn ClassScanner>>,
}
impl ScannerChain {
    pub fn new(scanners: Vec<Box<dyn ClassScanner>>) -> ScannerChain {
        ScannerChain { scanners }
    }
}
impl ClassScanner for ScannerChain {
    fn scan_shape(&self, id: &ClassIdentifier) -> Result<Option<ClassShape>, Error> {
        for scanner in &self.scanners {
            if let Some(shape) = scanner.scan_shape(id)? {
                return Ok(Some(shape));
            }
        }
        Ok(None)
    }
    fn scan_contents(&self, id: &ClassIdentifier) -> Result<Option<ClassContents>, Error> {
        for scanner in &self.scanners {
            if let Some(contents) = scanner.scan_contents(id)? {
                return Ok(Some(contents));
            }
        }
        Ok(None)
    }
}

impl<'a, S: ClassScanner + ?Sized> ClassScanner for &'a S {
    fn scan_shape(&self, id: &ClassIdentifier) -> Result<Option<ClassShape>, Error> {
        (**self).scan_shape(id)
    }
    fn scan_contents(&self, id: &ClassIdentifier) -> Result<Option<ClassContents>, Error> {
        (**self).scan_contents(id)
    }
}
