//! Computes mapping sets between the three naming schemes a deployment
//! juggles:
//! - `obf` - the obfuscated vendor names, used internally to unify the
//!   other schemes.
//! - `inter` - the stable intermediate names. These change rarely, since
//!   downstream code links against them directly.
//! - `pub` - the human-readable public names layered on top of the
//!   intermediate ones.
//!
//! Mapping targets have a string representation of the form
//! `{original}2{renamed}-{flags}`. For example, `obf2pub` maps the
//! obfuscated names into the public ones. Three modifiers are supported:
//! - `classes` - Restricts the mappings to just class names.
//! - `members` - Restricts the mappings to just member names.
//! - `onlyobf` - Restricts the mappings to names that are still
//!   obfuscated, taking advantage of another scheme's names without
//!   changing ones that are already readable.
extern crate indexmap;
extern crate failure;
extern crate failure_derive;
extern crate log;
extern crate serde;
extern crate mappings;

mod target;
mod computer;

pub use self::computer::{MappingsSource, MappingsTargetComputer, TargetComputeError};
pub use self::target::{InvalidTarget, NamingScheme, TargetFilter, TargetFlags, TargetMapping};
