#[macro_use]
extern crate clap;
extern crate env_logger;
extern crate failure;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use failure::{format_err, Error};
use log::info;
use serde_derive::Deserialize;

use engine::{MappingsSource, MappingsTargetComputer, TargetMapping};
use mappings::prelude::*;

/// Names the base mapping files (and optionally the default targets), so
/// a deployment can be described once instead of repeated on every run.
#[derive(Deserialize)]
struct Manifest {
    obf2inter: PathBuf,
    inter2pub: PathBuf,
    #[serde(default)]
    targets: Vec<TargetMapping>,
}

struct FileMappingsSource {
    obf2inter: PathBuf,
    inter2pub: PathBuf,
}
impl FileMappingsSource {
    fn load(path: &Path) -> Result<Arc<Mappings>, Error> {
        let reader = BufReader::new(File::open(path)?);
        Ok(Arc::new(SrgMappingsFormat::parse_stream(reader)?))
    }
}
impl MappingsSource for FileMappingsSource {
    fn load_obf2inter(&self) -> Result<Arc<Mappings>, Error> {
        FileMappingsSource::load(&self.obf2inter)
    }
    fn load_inter2pub(&self) -> Result<Arc<Mappings>, Error> {
        FileMappingsSource::load(&self.inter2pub)
    }
}

fn app() -> clap::App<'static, 'static> {
    clap_app!(platemap =>
        (version: crate_version!())
        (about: crate_description!())
        (@arg manifest: --manifest +takes_value "A JSON manifest naming the base mapping files")
        (@arg obf2inter: --obf2inter +takes_value "The obf -> inter base mappings (SRG text)")
        (@arg inter2pub: --inter2pub +takes_value "The inter -> pub base mappings (SRG text)")
        (@arg output_dir: --out +takes_value "The output directory to place mappings")
        (@arg prune: --prune "Drop entries that don't rename anything")
        (@arg targets: +multiple "The target mappings to generate")
    )
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let matches = app().get_matches();
    let mut targets: Vec<TargetMapping> = if matches.is_present("targets") {
        values_t!(matches, "targets", TargetMapping).unwrap_or_else(|e| e.exit())
    } else {
        Vec::new()
    };
    let source = match matches.value_of("manifest") {
        Some(path) => {
            let manifest: Manifest = serde_json::from_reader(BufReader::new(File::open(path)?))?;
            if targets.is_empty() {
                targets = manifest.targets;
            }
            FileMappingsSource {
                obf2inter: manifest.obf2inter,
                inter2pub: manifest.inter2pub,
            }
        }
        None => {
            let obf2inter = matches
                .value_of("obf2inter")
                .ok_or_else(|| format_err!("Either --manifest or --obf2inter is needed"))?;
            let inter2pub = matches
                .value_of("inter2pub")
                .ok_or_else(|| format_err!("Either --manifest or --inter2pub is needed"))?;
            FileMappingsSource {
                obf2inter: PathBuf::from(obf2inter),
                inter2pub: PathBuf::from(inter2pub),
            }
        }
    };
    if targets.is_empty() {
        return Err(format_err!("No targets to generate"));
    }
    let out = PathBuf::from(matches.value_of("output_dir").unwrap_or("."));
    fs::create_dir_all(&out)?;
    // No class data on the command line, so composition falls back to
    // the pure table algebra
    let scanner = EmptyScanner;
    let computer = MappingsTargetComputer::new(&source, &scanner);
    for &target in &targets {
        let mappings = computer.compute_target(target)?;
        let out_location = out.join(format!("{}.srg", target));
        info!("Writing {}", out_location.display());
        let mut writer = BufWriter::new(File::create(out_location)?);
        if matches.is_present("prune") {
            let mut pruned = (*mappings).clone();
            pruned.remove_useless_entries();
            SrgMappingsFormat::write(&pruned, &mut writer)?;
        } else {
            SrgMappingsFormat::write(&mappings, &mut writer)?;
        }
    }
    Ok(())
}
