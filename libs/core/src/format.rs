//! The line-oriented SRG mapping text format.
//!
//! One entry per line, keyed by a four-letter tag:
//!
//! ```text
//! PK: net/minecraft net/minecraft/server
//! CL: a/Foo net/minecraft/Foo
//! FD: a/Foo/x net/minecraft/Foo/counter
//! MD: a/Foo/a (La/Foo;)V net/minecraft/Foo/update (Lnet/minecraft/Foo;)V
//! ```
//!
//! The root package is spelled `.`. Blank lines and lines starting with
//! `#` are ignored. Output is fully deterministic: entries are sorted by
//! their original names, and package lines are derived from a majority
//! vote over the class moves (explicit package entries override the
//! vote).

use std::fmt::Write as FmtWrite;
use std::io::{BufRead, Write};

use failure::Error;
use failure_derive::Fail;
use indexmap::IndexMap;
use itertools::Itertools;

use crate::ident::{
    ClassIdentifier, FieldIdentifier, MalformedIdentifier, MethodIdentifier, PackageIdentifier,
};
use crate::mappings::Mappings;

#[derive(Debug, Fail)]
pub enum SrgParseError {
    #[fail(display = "Invalid line {}: {:?}", line, text)]
    InvalidLine { line: usize, text: String },
    #[fail(display = "Invalid name on line {}: {}", line, cause)]
    InvalidName { line: usize, cause: MalformedIdentifier },
}

pub struct SrgMappingsFormat;
impl SrgMappingsFormat {
    pub fn parse_text(text: &str) -> Result<Mappings, Error> {
        let mut result = Mappings::default();
        for (index, line) in text.lines().enumerate() {
            parse_line(index + 1, line, &mut result)?;
        }
        Ok(result)
    }
    pub fn parse_stream<R: BufRead>(reader: R) -> Result<Mappings, Error> {
        let mut result = Mappings::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            parse_line(index + 1, &line, &mut result)?;
        }
        Ok(result)
    }
    pub fn write_text(mappings: &Mappings) -> String {
        let mut out = String::new();
        let packages = voted_packages(mappings);
        for (from, to) in packages
            .iter()
            .sorted_by(|(a, _), (b, _)| a.full_name().cmp(b.full_name()))
        {
            // Infallible: writing to a String can't fail
            let _ = writeln!(out, "PK: {} {}", package_name(from), package_name(to));
        }
        for (from, to) in mappings
            .classes
            .iter()
            .sorted_by(|(a, _), (b, _)| a.full_name().cmp(&b.full_name()))
        {
            let _ = writeln!(out, "CL: {} {}", from, to);
        }
        for ((owner, from), to) in mappings
            .fields
            .iter()
            .sorted_by(|((ao, af), _), ((bo, bf), _)| {
                (ao.full_name(), af.name()).cmp(&(bo.full_name(), bf.name()))
            })
        {
            let _ = writeln!(
                out,
                "FD: {}/{} {}/{}",
                owner,
                from,
                mappings.map_class(owner),
                to
            );
        }
        for ((owner, from), to) in mappings
            .methods
            .iter()
            .sorted_by(|((ao, am), _), ((bo, bm), _)| {
                (ao.full_name(), am.name(), am.descriptor())
                    .cmp(&(bo.full_name(), bm.name(), bm.descriptor()))
            })
        {
            let _ = writeln!(
                out,
                "MD: {}/{} {} {}/{} {}",
                owner,
                from.name(),
                from.descriptor(),
                mappings.map_class(owner),
                to.name(),
                to.descriptor()
            );
        }
        out
    }
    pub fn write<W: Write>(mappings: &Mappings, out: &mut W) -> Result<(), Error> {
        out.write_all(SrgMappingsFormat::write_text(mappings).as_bytes())?;
        Ok(())
    }
}

fn package_name(package: &PackageIdentifier) -> &str {
    if package.is_root() {
        "."
    } else {
        package.full_name()
    }
}
fn parse_package(text: &str) -> Result<PackageIdentifier, MalformedIdentifier> {
    if text == "." {
        Ok(PackageIdentifier::root())
    } else {
        PackageIdentifier::parse(text)
    }
}
/// Splits `a/b/Class/member` into owner and member name.
fn split_member(text: &str) -> Option<(&str, &str)> {
    let index = text.rfind('/')?;
    Some((&text[..index], &text[(index + 1)..]))
}

fn parse_line(line_no: usize, line: &str, result: &mut Mappings) -> Result<(), Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(());
    }
    let invalid = || SrgParseError::InvalidLine { line: line_no, text: line.to_string() };
    let named = |cause| SrgParseError::InvalidName { line: line_no, cause };
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    match (parts.first().cloned(), parts.len()) {
        (Some("PK:"), 3) => {
            let from = parse_package(parts[1]).map_err(named)?;
            let to = parse_package(parts[2]).map_err(named)?;
            result.packages.insert(from, to);
        }
        (Some("CL:"), 3) => {
            let from = ClassIdentifier::parse(parts[1]).map_err(named)?;
            let to = ClassIdentifier::parse(parts[2]).map_err(named)?;
            result.classes.insert(from, to);
        }
        (Some("FD:"), 3) => {
            let (from_owner, from_name) = split_member(parts[1]).ok_or_else(invalid)?;
            let (_, to_name) = split_member(parts[2]).ok_or_else(invalid)?;
            let owner = ClassIdentifier::parse(from_owner).map_err(named)?;
            let from = FieldIdentifier::new(from_name).map_err(named)?;
            let to = FieldIdentifier::new(to_name).map_err(named)?;
            result.fields.insert((owner, from), to);
        }
        (Some("MD:"), 5) => {
            let (from_owner, from_name) = split_member(parts[1]).ok_or_else(invalid)?;
            let (_, to_name) = split_member(parts[3]).ok_or_else(invalid)?;
            let owner = ClassIdentifier::parse(from_owner).map_err(named)?;
            let from = MethodIdentifier::new(from_name, parts[2]).map_err(named)?;
            let to = MethodIdentifier::new(to_name, parts[4]).map_err(named)?;
            result.methods.insert((owner, from), to);
        }
        _ => return Err(invalid().into()),
    }
    Ok(())
}

/// Derives package moves from the class table: each original package is
/// mapped to the target package most of its classes moved to, ties going
/// to the lexicographically smallest target. Explicit package entries
/// override the vote, and identity moves are dropped.
fn voted_packages(mappings: &Mappings) -> IndexMap<PackageIdentifier, PackageIdentifier> {
    let mut votes: IndexMap<PackageIdentifier, IndexMap<PackageIdentifier, usize>> =
        IndexMap::new();
    for (from, to) in &mappings.classes {
        *votes
            .entry(from.package().clone())
            .or_insert_with(IndexMap::new)
            .entry(to.package().clone())
            .or_insert(0) += 1;
    }
    let mut result = IndexMap::new();
    for (from, tally) in votes {
        let winner = tally.into_iter().max_by(|(a_pkg, a_count), (b_pkg, b_count)| {
            a_count
                .cmp(b_count)
                .then_with(|| b_pkg.full_name().cmp(a_pkg.full_name()))
        });
        if let Some((to, _)) = winner {
            result.insert(from, to);
        }
    }
    for (from, to) in &mappings.packages {
        result.insert(from.clone(), to.clone());
    }
    result.into_iter().filter(|(from, to)| from != to).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn class(s: &str) -> ClassIdentifier {
        ClassIdentifier::parse(s).unwrap()
    }
    fn field(s: &str) -> FieldIdentifier {
        FieldIdentifier::new(s).unwrap()
    }
    fn method(name: &str, descriptor: &str) -> MethodIdentifier {
        MethodIdentifier::new(name, descriptor).unwrap()
    }

    const SAMPLE: &str = "\
# comment, then a blank line

PK: spell net/magic
CL: a/Foo net/minecraft/Foo
FD: a/Foo/x net/minecraft/Foo/counter
MD: a/Foo/a (La/Foo;)V net/minecraft/Foo/update (Lnet/minecraft/Foo;)V
";

    #[test]
    fn parses_every_kind() {
        let mappings = SrgMappingsFormat::parse_text(SAMPLE).unwrap();
        assert_eq!(
            mappings.packages[&PackageIdentifier::parse("spell").unwrap()],
            PackageIdentifier::parse("net/magic").unwrap()
        );
        assert_eq!(mappings.classes[&class("a/Foo")], class("net/minecraft/Foo"));
        assert_eq!(
            mappings.fields[&(class("a/Foo"), field("x"))],
            field("counter")
        );
        assert_eq!(
            mappings.methods[&(class("a/Foo"), method("a", "(La/Foo;)V"))],
            method("update", "(Lnet/minecraft/Foo;)V")
        );
    }

    #[test]
    fn root_package_is_a_dot() {
        let mappings = SrgMappingsFormat::parse_text("PK: . net/minecraft\n").unwrap();
        assert_eq!(
            mappings.packages[&PackageIdentifier::root()],
            PackageIdentifier::parse("net/minecraft").unwrap()
        );
        assert!(SrgMappingsFormat::write_text(&mappings).contains("PK: . net/minecraft"));
    }

    #[test]
    fn rejects_malformed_lines() {
        let error = SrgMappingsFormat::parse_text("CL: only/One\n").unwrap_err();
        let parse = error.downcast_ref::<SrgParseError>().unwrap();
        match parse {
            SrgParseError::InvalidLine { line, .. } => assert_eq!(*line, 1),
            other => panic!("unexpected error: {}", other),
        }
        assert!(SrgMappingsFormat::parse_text("MD: a/Foo/m (X)V b/Bar/m (X)V\n").is_err());
        assert!(SrgMappingsFormat::parse_text("XX: what ever\n").is_err());
    }

    #[test]
    fn roundtrip_preserves_tables() {
        let parsed = SrgMappingsFormat::parse_text(SAMPLE).unwrap();
        let written = SrgMappingsFormat::write_text(&parsed);
        let reparsed = SrgMappingsFormat::parse_text(&written).unwrap();
        assert_eq!(reparsed.classes, parsed.classes);
        assert_eq!(reparsed.fields, parsed.fields);
        assert_eq!(reparsed.methods, parsed.methods);
        // The explicit package entry survives, and the class move votes
        // its own package line in
        assert_eq!(
            reparsed.packages[&PackageIdentifier::parse("spell").unwrap()],
            PackageIdentifier::parse("net/magic").unwrap()
        );
        assert_eq!(
            reparsed.packages[&PackageIdentifier::parse("a").unwrap()],
            PackageIdentifier::parse("net/minecraft").unwrap()
        );
        // Writing is deterministic and stable after one round
        assert_eq!(written, SrgMappingsFormat::write_text(&parsed));
        assert_eq!(written, SrgMappingsFormat::write_text(&reparsed));
    }

    #[test]
    fn export_sorts_by_original_name() {
        let mut mappings = Mappings::default();
        mappings.classes.insert(class("z/Last"), class("x/A"));
        mappings.classes.insert(class("a/First"), class("x/B"));
        let text = SrgMappingsFormat::write_text(&mappings);
        let first = text.lines().position(|l| l.contains("a/First")).unwrap();
        let last = text.lines().position(|l| l.contains("z/Last")).unwrap();
        assert!(first < last);
    }

    #[test]
    fn package_lines_use_majority_vote() {
        let mut mappings = Mappings::default();
        mappings.classes.insert(class("a/One"), class("x/One"));
        mappings.classes.insert(class("a/Two"), class("x/Two"));
        mappings.classes.insert(class("a/Odd"), class("y/Odd"));
        let text = SrgMappingsFormat::write_text(&mappings);
        assert!(text.contains("PK: a x"));
        assert!(!text.contains("PK: a y"));

        // Ties pick the lexicographically smallest target
        let mut tied = Mappings::default();
        tied.classes.insert(class("a/One"), class("y/One"));
        tied.classes.insert(class("a/Two"), class("x/Two"));
        assert!(SrgMappingsFormat::write_text(&tied).contains("PK: a x"));

        // An explicit entry overrides the vote
        mappings.packages.insert(
            PackageIdentifier::parse("a").unwrap(),
            PackageIdentifier::parse("z").unwrap(),
        );
        assert!(SrgMappingsFormat::write_text(&mappings).contains("PK: a z"));
    }
}
