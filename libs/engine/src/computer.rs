use std::cell::RefCell;
use std::mem;
use std::sync::Arc;

use failure::{format_err, Error};
use failure_derive::Fail;
use indexmap::IndexMap;
use log::debug;
use mappings::prelude::*;

use super::target::{NamingScheme, TargetFilter, TargetMapping};

// These are the 'basic' mappings that we use as the basis for computing all others
const OBF2INTER: TargetMapping = TargetMapping::new(NamingScheme::Obf, NamingScheme::Inter);
const INTER2PUB: TargetMapping = TargetMapping::new(NamingScheme::Inter, NamingScheme::Pub);
// Here are some other mapping targets, which indirectly derive from the basic mappings
const OBF2PUB: TargetMapping = TargetMapping::new(NamingScheme::Obf, NamingScheme::Pub);

/// Loads the two base mapping sets everything else derives from.
pub trait MappingsSource {
    fn load_obf2inter(&self) -> Result<Arc<Mappings>, Error>;
    fn load_inter2pub(&self) -> Result<Arc<Mappings>, Error>;
}

pub struct MappingsTargetComputer<'a> {
    source: &'a dyn MappingsSource,
    scanner: &'a dyn ClassScanner,
    computed_targets: RefCell<IndexMap<TargetMapping, Arc<Mappings>>>,
}
impl<'a> MappingsTargetComputer<'a> {
    pub fn new(
        source: &'a dyn MappingsSource,
        scanner: &'a dyn ClassScanner,
    ) -> MappingsTargetComputer<'a> {
        MappingsTargetComputer { source, scanner, computed_targets: Default::default() }
    }
    pub fn compute_target(&self, target: TargetMapping) -> Result<Arc<Mappings>, Error> {
        {
            let computed_targets = self.computed_targets.borrow();
            if let Some(mappings) = computed_targets.get(&target) {
                return Ok(mappings.clone());
            }
        }
        // TODO: Protection against cycles
        debug!("Computing {}", target);
        let mappings = self
            .fallback_compute_target(target)
            .map_err(|cause| TargetComputeError { target, cause })?;
        let mappings = Arc::new(mappings);
        self.computed_targets.borrow_mut().insert(target, mappings.clone());
        Ok(mappings)
    }
    fn fallback_compute_target(&self, target: TargetMapping) -> Result<Mappings, Error> {
        if target.is_redundant() {
            return Err(format_err!("Redundant target {}", target));
        }
        // NOTE: These relationships are currently hardcoded
        let mut mappings = match (target.original, target.renamed) {
            (NamingScheme::Obf, NamingScheme::Inter) => {
                (*self.source.load_obf2inter()?).clone()
            }
            (NamingScheme::Inter, NamingScheme::Pub) => {
                (*self.source.load_inter2pub()?).clone()
            }
            (NamingScheme::Obf, NamingScheme::Pub) => {
                let obf2inter = self.compute_target(OBF2INTER)?;
                let inter2pub = self.compute_target(INTER2PUB)?;
                obf2inter.merge_sequential(self.scanner, &inter2pub)?
            }
            (NamingScheme::Inter, NamingScheme::Obf) => {
                self.compute_target(OBF2INTER)?.inverse()
            }
            (NamingScheme::Pub, NamingScheme::Inter) => {
                self.compute_target(INTER2PUB)?.inverse()
            }
            (NamingScheme::Pub, NamingScheme::Obf) => {
                self.compute_target(OBF2PUB)?.inverse()
            }
            (NamingScheme::Obf, NamingScheme::Obf)
            | (NamingScheme::Inter, NamingScheme::Inter)
            | (NamingScheme::Pub, NamingScheme::Pub) => unreachable!(),
        };
        self.apply_flags(target, &mut mappings)?;
        Ok(mappings)
    }
    fn apply_flags(&self, target: TargetMapping, mappings: &mut Mappings) -> Result<(), Error> {
        if target.flags.is_default() {
            return Ok(());
        }
        if target.flags.only_obf() && target.original != NamingScheme::Obf {
            // When the original scheme *is* obf the modifier is redundant
            let original2obf = self
                .compute_target(target.original.create_target(NamingScheme::Obf))?;
            retain_still_obfuscated(mappings, &original2obf);
        }
        match target.flags.filter() {
            None => {}
            Some(TargetFilter::Classes) => {
                mappings.fields = IndexMap::new();
                mappings.methods = IndexMap::new();
            }
            Some(TargetFilter::Members) => {
                mappings.classes = IndexMap::new();
                mappings.packages = IndexMap::new();
            }
        }
        Ok(())
    }
}

/// Keeps only the entries whose original name is still the obfuscated
/// one, so names another scheme already made readable stay untouched.
fn retain_still_obfuscated(mappings: &mut Mappings, original2obf: &Mappings) {
    let classes = mem::replace(&mut mappings.classes, IndexMap::new());
    mappings.classes = classes
        .into_iter()
        .filter(|(from, _)| original2obf.map_class(from) == *from)
        .collect();
    let fields = mem::replace(&mut mappings.fields, IndexMap::new());
    mappings.fields = fields
        .into_iter()
        .filter(|(key, _)| match original2obf.fields.get(key) {
            // Only names are checked, so a member of a readable class
            // still counts as obfuscated if its own name is
            Some(obf) => *obf == key.1,
            None => true,
        })
        .collect();
    let methods = mem::replace(&mut mappings.methods, IndexMap::new());
    mappings.methods = methods
        .into_iter()
        .filter(|(key, _)| match original2obf.methods.get(key) {
            Some(obf) => obf.name() == key.1.name(),
            None => true,
        })
        .collect();
}

#[derive(Debug, Fail)]
#[fail(display = "Unable to compute {}: {}", target, cause)]
pub struct TargetComputeError {
    target: TargetMapping,
    cause: Error,
}
