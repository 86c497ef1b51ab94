//! Write-once renames.
//!
//! A [`Change`] pairs an original identifier with an optional rename
//! target. The target is set at most once through [`Change::set_target`]:
//! once a composition pass has committed a rename, later passes may only
//! agree with it. Passes that rewrite their *own* previous output (such
//! as applying a second mapping layer on top of the first) use
//! [`Change::retarget`] instead, which is unconditional.

use std::fmt::{self, Display, Formatter};

use crate::ident::{ClassIdentifier, FieldIdentifier, MethodIdentifier, PackageIdentifier};

pub type PackageChange = Change<PackageIdentifier>;
pub type ClassChange = Change<ClassIdentifier>;
pub type FieldChange = Change<FieldIdentifier>;
pub type MethodChange = Change<MethodIdentifier>;
pub type PackageMove = Move<PackageIdentifier>;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Change<T: Clone + Eq> {
    from: T,
    to: Option<T>,
}
impl<T: Clone + Eq> Change<T> {
    #[inline]
    pub fn new(from: T) -> Change<T> {
        Change { from, to: None }
    }
    #[inline]
    pub fn renamed(from: T, to: T) -> Change<T> {
        Change { from, to: Some(to) }
    }
    #[inline]
    pub fn original(&self) -> &T {
        &self.from
    }
    /// The effective name: the target if set, the original otherwise.
    #[inline]
    pub fn target(&self) -> &T {
        self.to.as_ref().unwrap_or(&self.from)
    }
    #[inline]
    pub fn is_renamed(&self) -> bool {
        match self.to {
            Some(ref to) => *to != self.from,
            None => false,
        }
    }
    /// Commits a rename target. Returns `false` if a *different* target
    /// was already committed; committing the same target again succeeds.
    pub fn set_target(&mut self, to: T) -> bool {
        match self.to {
            Some(ref existing) => *existing == to,
            None => {
                self.to = Some(to);
                true
            }
        }
    }
    /// Overwrites the target unconditionally. Reserved for passes that
    /// rewrite their own output namespace.
    #[inline]
    pub fn retarget(&mut self, to: T) {
        self.to = Some(to);
    }
    /// Swaps original and effective name.
    pub fn inverse(&self) -> Change<T> {
        Change { from: self.target().clone(), to: Some(self.from.clone()) }
    }
}
impl<T: Clone + Eq + Display> Display for Change<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_renamed() {
            write!(f, "{} -> {}", self.from, self.target())
        } else {
            write!(f, "{}", self.from)
        }
    }
}

impl Change<ClassIdentifier> {
    /// The package-level component of this rename, if the class moved
    /// packages.
    pub fn package_move(&self) -> Option<PackageChange> {
        let from = self.from.package();
        let to = self.target().package();
        if from == to {
            None
        } else {
            Some(Change::renamed(from.clone(), to.clone()))
        }
    }
    /// The nesting parents on either side of the rename.
    pub fn parent_move(&self) -> (Option<&ClassIdentifier>, Option<&ClassIdentifier>) {
        (self.from.parent(), self.target().parent())
    }
}

/// A rename tracked under both of its names: `old` is keyed by the name
/// before the move and `new` by the name after it, so the move can be
/// looked up from either side.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Move<T: Clone + Eq> {
    old: Change<T>,
    new: Change<T>,
}
impl<T: Clone + Eq> Move<T> {
    pub fn new(from: T, to: T) -> Move<T> {
        Move {
            old: Change::renamed(from.clone(), to.clone()),
            new: Change::renamed(to, from),
        }
    }
    pub fn identity(value: T) -> Move<T> {
        Move { old: Change::new(value.clone()), new: Change::new(value) }
    }
    #[inline]
    pub fn original(&self) -> &T {
        self.old.original()
    }
    #[inline]
    pub fn target(&self) -> &T {
        self.old.target()
    }
    pub fn inverse(&self) -> Move<T> {
        Move { old: self.new.clone(), new: self.old.clone() }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn target_falls_back_to_original() {
        let change: Change<u32> = Change::new(4);
        assert_eq!(*change.target(), 4);
        assert!(!change.is_renamed());
    }

    #[test]
    fn set_target_is_write_once() {
        let mut change = Change::new("a".to_string());
        assert!(change.set_target("b".to_string()));
        assert!(change.set_target("b".to_string()));
        assert!(!change.set_target("c".to_string()));
        assert_eq!(change.target(), "b");
    }

    #[test]
    fn retarget_overwrites() {
        let mut change = Change::renamed(1, 2);
        change.retarget(3);
        assert_eq!(*change.target(), 3);
        assert_eq!(*change.original(), 1);
    }

    #[test]
    fn inverse_swaps() {
        let change = Change::renamed("a", "b");
        let inverse = change.inverse();
        assert_eq!(*inverse.original(), "b");
        assert_eq!(*inverse.target(), "a");

        let unchanged = Change::new("a");
        let inverse = unchanged.inverse();
        assert_eq!(*inverse.original(), "a");
        assert_eq!(*inverse.target(), "a");
    }

    #[test]
    fn class_package_move() {
        let change = Change::renamed(
            ClassIdentifier::parse("a/Foo").unwrap(),
            ClassIdentifier::parse("b/Bar").unwrap(),
        );
        let pkg = change.package_move().unwrap();
        assert_eq!(pkg.original().full_name(), "a");
        assert_eq!(pkg.target().full_name(), "b");

        let same = Change::renamed(
            ClassIdentifier::parse("a/Foo").unwrap(),
            ClassIdentifier::parse("a/Bar").unwrap(),
        );
        assert!(same.package_move().is_none());
    }

    #[test]
    fn move_lookup_from_both_sides() {
        let mv = Move::new("old", "new");
        assert_eq!(*mv.original(), "old");
        assert_eq!(*mv.target(), "new");
        let inv = mv.inverse();
        assert_eq!(*inv.original(), "new");
        assert_eq!(*inv.target(), "old");
    }
}
