use std::fmt::{self, Display, Formatter, Write};
use std::str::FromStr;

use failure_derive::Fail;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NamingScheme {
    Obf,
    Inter,
    Pub,
}
impl NamingScheme {
    #[inline]
    fn id(self) -> &'static str {
        match self {
            NamingScheme::Obf => "obf",
            NamingScheme::Inter => "inter",
            NamingScheme::Pub => "pub",
        }
    }
    fn from_id(id: &str) -> Option<NamingScheme> {
        Some(match id {
            "obf" => NamingScheme::Obf,
            "inter" => NamingScheme::Inter,
            "pub" => NamingScheme::Pub,
            _ => return None,
        })
    }
    #[inline]
    pub(crate) fn create_target(self, renamed: NamingScheme) -> TargetMapping {
        TargetMapping { original: self, renamed, flags: TargetFlags::default() }
    }
}
impl Display for NamingScheme {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TargetMapping {
    pub original: NamingScheme,
    pub renamed: NamingScheme,
    pub flags: TargetFlags,
}
impl TargetMapping {
    #[inline]
    pub const fn new(original: NamingScheme, renamed: NamingScheme) -> TargetMapping {
        TargetMapping { original, renamed, flags: TargetFlags::default() }
    }
    #[inline]
    pub const fn reversed(self) -> TargetMapping {
        // NOTE: Swap isn't const
        TargetMapping { original: self.renamed, renamed: self.original, flags: self.flags }
    }
    #[inline]
    pub fn with_default_flags(mut self) -> TargetMapping {
        self.flags = TargetFlags::default();
        self
    }
    #[inline]
    pub fn is_redundant(&self) -> bool {
        self.original == self.renamed
    }
}
impl FromStr for TargetMapping {
    type Err = InvalidTarget;

    fn from_str(s: &str) -> Result<Self, InvalidTarget> {
        let invalid_target = || InvalidTarget::Target(s.into());
        let first_dash = s.find('-');
        let first = first_dash.map_or(s, |index| &s[..index]);
        let scheme_separator = first.find('2').ok_or_else(invalid_target)?;
        let original = NamingScheme::from_id(&first[..scheme_separator])
            .ok_or_else(invalid_target)?;
        let renamed = NamingScheme::from_id(&first[(scheme_separator + 1)..])
            .ok_or_else(invalid_target)?;
        let flags = match first_dash {
            Some(dash) => TargetFlags::from_str(&s[(dash + 1)..])?,
            None => TargetFlags::default(),
        };
        Ok(TargetMapping { original, renamed, flags })
    }
}
impl Display for TargetMapping {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}2{}", self.original.id(), self.renamed.id())?;
        if !self.flags.is_default() {
            write!(f, "-{}", self.flags)?;
        }
        Ok(())
    }
}
impl Serialize for TargetMapping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}", self))
    }
}
impl<'de> Deserialize<'de> for TargetMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TargetMappingVisitor;
        impl<'de> de::Visitor<'de> for TargetMappingVisitor {
            type Value = TargetMapping;

            fn expecting(&self, formatter: &mut Formatter) -> fmt::Result {
                formatter.write_str("a mapping target like \"obf2pub-classes\"")
            }

            #[inline]
            fn visit_str<E>(self, s: &str) -> Result<TargetMapping, E>
            where
                E: de::Error,
            {
                TargetMapping::from_str(s).map_err(E::custom)
            }
        }
        deserializer.deserialize_str(TargetMappingVisitor)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TargetFlags {
    filter: Option<TargetFilter>,
    only_obf: bool,
}
impl TargetFlags {
    #[inline]
    pub const fn default() -> TargetFlags {
        TargetFlags { filter: None, only_obf: false }
    }
    #[inline]
    pub fn new(classes: bool, members: bool, only_obf: bool) -> TargetFlags {
        let filter = match (classes, members) {
            (false, false) => None,
            (false, true) => Some(TargetFilter::Members),
            (true, false) => Some(TargetFilter::Classes),
            (true, true) => panic!("Can't filter both classes and members"),
        };
        TargetFlags { filter, only_obf }
    }
    #[inline]
    pub fn filter(&self) -> Option<TargetFilter> {
        self.filter
    }
    #[inline]
    pub fn only_obf(&self) -> bool {
        self.only_obf
    }
    #[inline]
    pub fn is_default(&self) -> bool {
        *self == TargetFlags::default()
    }
}
impl Default for TargetFlags {
    #[inline]
    fn default() -> Self {
        TargetFlags::default()
    }
}
impl FromStr for TargetFlags {
    type Err = InvalidTarget;

    fn from_str(s: &str) -> Result<TargetFlags, InvalidTarget> {
        let mut result = TargetFlags::default();
        if s.is_empty() {
            return Ok(result);
        }
        let invalid_target = || InvalidTarget::Flags(s.into());
        for flag in s.split('-') {
            match flag {
                "classes" => {
                    if result.filter.is_some() {
                        return Err(invalid_target());
                    }
                    result.filter = Some(TargetFilter::Classes);
                }
                "members" => {
                    if result.filter.is_some() {
                        return Err(invalid_target());
                    }
                    result.filter = Some(TargetFilter::Members);
                }
                "onlyobf" => {
                    if result.only_obf {
                        return Err(invalid_target());
                    }
                    result.only_obf = true;
                }
                _ => return Err(invalid_target()),
            }
        }
        Ok(result)
    }
}
impl Display for TargetFlags {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.filter {
            None => {}
            Some(TargetFilter::Classes) => f.write_str("classes")?,
            Some(TargetFilter::Members) => f.write_str("members")?,
        }
        if self.only_obf {
            if self.filter.is_some() {
                f.write_char('-')?;
            }
            f.write_str("onlyobf")?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TargetFilter {
    Classes,
    Members,
}

#[derive(Debug, Fail)]
pub enum InvalidTarget {
    #[fail(display = "Invalid target {:?}", _0)]
    Target(String),
    #[fail(display = "Invalid flags {:?}", _0)]
    Flags(String),
}
