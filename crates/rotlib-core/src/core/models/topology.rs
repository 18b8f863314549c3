use std::collections::HashSet;
use std::fmt;

/// An unordered bond between two atoms, stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
}

impl Bond {
    pub fn new(i: usize, j: usize) -> Self {
        if i <= j {
            Self { a: i, b: j }
        } else {
            Self { a: j, b: i }
        }
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.a == atom || self.b == atom
    }

    /// The endpoint opposite to `atom`, if `atom` is an endpoint.
    pub fn partner(&self, atom: usize) -> Option<usize> {
        if self.a == atom {
            Some(self.b)
        } else if self.b == atom {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn shares_atom_with(&self, other: &Bond) -> bool {
        self.contains(other.a) || self.contains(other.b)
    }
}

impl From<(usize, usize)> for Bond {
    fn from((i, j): (usize, usize)) -> Self {
        Self::new(i, j)
    }
}

impl fmt::Display for Bond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

/// A rotatable bond sampled by the docking engine.
///
/// Before a tree exists `parent`/`child` simply mirror the bond's storage order; once the
/// tree is built, torsions are re-oriented so that `parent` is the endpoint closer to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Torsion {
    pub parent: usize,
    pub child: usize,
    /// 0 when the bond is not part of a sampled ring, otherwise the merged ring id.
    pub ring_id: usize,
    /// Set for bonds whose child carries a single terminal atom (O-H, S-H, ...).
    pub is_hydroxyl: bool,
}

impl Torsion {
    pub fn from_bond(bond: Bond) -> Self {
        Self {
            parent: bond.a,
            child: bond.b,
            ring_id: 0,
            is_hydroxyl: false,
        }
    }

    pub fn bond(&self) -> Bond {
        Bond::new(self.parent, self.child)
    }

    pub fn is_ring(&self) -> bool {
        self.ring_id > 0
    }
}

/// Ordered list of bonds with set-style edits that keep the original order.
///
/// Library output depends on torsion order, so these edits never re-sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BondList(Vec<Bond>);

impl BondList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[Bond] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, bond: &Bond) -> bool {
        self.0.contains(bond)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bond> {
        self.0.iter()
    }

    /// Appends `bond` unless it is already present.
    pub fn push(&mut self, bond: Bond) {
        if !self.0.contains(&bond) {
            self.0.push(bond);
        }
    }

    pub fn remove(&mut self, bond: &Bond) -> bool {
        let before = self.0.len();
        self.0.retain(|b| b != bond);
        self.0.len() != before
    }

    pub fn without(&self, other: &[Bond]) -> Self {
        let excluded: HashSet<&Bond> = other.iter().collect();
        Self(self.0.iter().filter(|b| !excluded.contains(b)).copied().collect())
    }

    pub fn union(&self, other: &[Bond]) -> Self {
        let mut merged = self.clone();
        for bond in other {
            merged.push(*bond);
        }
        merged
    }

    pub fn intersection(&self, other: &[Bond]) -> Self {
        let kept: HashSet<&Bond> = other.iter().collect();
        Self(self.0.iter().filter(|b| kept.contains(b)).copied().collect())
    }

    pub fn touches(&self, atom: usize) -> bool {
        self.0.iter().any(|b| b.contains(atom))
    }
}

impl FromIterator<Bond> for BondList {
    fn from_iter<I: IntoIterator<Item = Bond>>(iter: I) -> Self {
        let mut list = Self::new();
        for bond in iter {
            list.push(bond);
        }
        list
    }
}

impl<'a> IntoIterator for &'a BondList {
    type Item = &'a Bond;
    type IntoIter = std::slice::Iter<'a, Bond>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
