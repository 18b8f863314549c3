use crate::core::models::molecule::{MoleculeGraph, Ring};
use crate::core::models::topology::{Bond, BondList};

/// Ring bonds promoted to jointly sampled torsions, each tagged with its merged ring id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingTorsions {
    bonds: BondList,
    ring_ids: Vec<usize>,
}

impl RingTorsions {
    pub fn bonds(&self) -> &BondList {
        &self.bonds
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    /// Number of merged ring systems; ids run from 1 to this value.
    pub fn ring_count(&self) -> usize {
        self.ring_ids.iter().copied().max().unwrap_or(0)
    }

    /// Ring id of `bond`, or 0 when it is not a ring torsion.
    pub fn ring_of(&self, bond: &Bond) -> usize {
        self.bonds
            .iter()
            .position(|b| b == bond)
            .map_or(0, |i| self.ring_ids[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bond, usize)> + '_ {
        self.bonds.iter().copied().zip(self.ring_ids.iter().copied())
    }

    /// Drops `removed` bonds and renumbers the surviving ring systems densely.
    pub fn without(&self, removed: &[Bond]) -> Self {
        let mut relabel = vec![0; self.ring_count() + 1];
        let mut next_id = 0;
        let mut kept = Self::default();
        for (bond, id) in self.iter().filter(|(bond, _)| !removed.contains(bond)) {
            if relabel[id] == 0 {
                next_id += 1;
                relabel[id] = next_id;
            }
            kept.bonds.push(bond);
            kept.ring_ids.push(relabel[id]);
        }
        kept
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // The lower index stays the representative so merged ids follow ring order.
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Promotes every bond of each ring that holds a rotatable torsion.
///
/// Rings sharing an atom are merged into one ring system; ids are dense from 1 in the order
/// the rings are first seen. A bond shared by fused rings is listed once.
pub fn find_ring_torsions(molecule: &MoleculeGraph, rotatable: &BondList) -> RingTorsions {
    let flexible: Vec<&Ring> = molecule
        .rings()
        .iter()
        .filter(|ring| rotatable.iter().any(|bond| ring.contains_bond(bond)))
        .collect();

    let mut sets = DisjointSet::new(flexible.len());
    for i in 0..flexible.len() {
        for j in (i + 1)..flexible.len() {
            if flexible[i].atoms.iter().any(|&atom| flexible[j].contains(atom)) {
                sets.union(i, j);
            }
        }
    }

    let mut dense_id = vec![0; flexible.len()];
    let mut next_id = 0;
    let mut torsions = RingTorsions::default();
    for (i, ring) in flexible.iter().enumerate() {
        let representative = sets.find(i);
        if dense_id[representative] == 0 {
            next_id += 1;
            dense_id[representative] = next_id;
        }
        for bond in molecule.bonds().iter().filter(|b| ring.contains_bond(b)) {
            if !torsions.bonds.contains(bond) {
                torsions.bonds.push(*bond);
                torsions.ring_ids.push(dense_id[representative]);
            }
        }
    }
    torsions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};

    fn molecule(atom_count: usize, pairs: &[(usize, usize)]) -> MoleculeGraph {
        let atoms = (0..atom_count)
            .map(|i| Atom::new(i, Element::C, &format!("C{}", i + 1), "LIG"))
            .collect();
        MoleculeGraph::new(atoms, pairs.iter().map(|&p| Bond::from(p))).unwrap()
    }

    fn list(pairs: &[(usize, usize)]) -> BondList {
        pairs.iter().map(|&p| Bond::from(p)).collect()
    }

    #[test]
    fn rigid_rings_produce_no_ring_torsions() {
        // Cyclopropane with a tail; only the tail bond rotates.
        let mol = molecule(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        let rings = find_ring_torsions(&mol, &list(&[(2, 3)]));
        assert!(rings.is_empty());
        assert_eq!(rings.ring_count(), 0);
    }

    #[test]
    fn every_bond_of_a_flexible_ring_is_promoted() {
        // Cyclopentane, one rotatable ring bond.
        let mol = molecule(5, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 0)]);
        let rings = find_ring_torsions(&mol, &list(&[(1, 2)]));
        assert_eq!(rings.len(), 5);
        assert_eq!(rings.ring_count(), 1);
        assert!(rings.iter().all(|(_, id)| id == 1));
        assert_eq!(rings.ring_of(&Bond::new(4, 0)), 1);
        assert_eq!(rings.ring_of(&Bond::new(9, 8)), 0);
    }

    #[test]
    fn spiro_rings_sharing_one_atom_merge() {
        // Two cyclobutanes joined at atom 0, each with its own rotatable bond.
        let mol = molecule(
            7,
            &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 4), (4, 5), (5, 6), (6, 0)],
        );
        let rings = find_ring_torsions(&mol, &list(&[(1, 2), (4, 5)]));
        assert_eq!(rings.ring_count(), 1);
        assert_eq!(rings.len(), 8);
        assert!(rings.iter().all(|(_, id)| id == 1));
    }

    #[test]
    fn separate_rings_get_dense_ids_and_fused_bond_is_listed_once() {
        // Fused bicycle 0..5 sharing bond 0-3, plus an isolated ring 6-7-8 on a linker.
        let mol = molecule(
            9,
            &[
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 0),
                (3, 4),
                (4, 5),
                (5, 0),
                (5, 6),
                (6, 7),
                (7, 8),
                (8, 6),
            ],
        );
        let rings = find_ring_torsions(&mol, &list(&[(1, 2), (4, 5), (7, 8)]));
        assert_eq!(rings.ring_count(), 2);
        let first: Vec<Bond> = rings.iter().filter(|(_, id)| *id == 1).map(|(b, _)| b).collect();
        assert_eq!(first.len(), 7);
        assert_eq!(first.iter().filter(|b| **b == Bond::new(0, 3)).count(), 1);
        assert_eq!(rings.ring_of(&Bond::new(6, 8)), 2);
    }

    #[test]
    fn removing_a_whole_ring_renumbers_the_rest() {
        let mol = molecule(
            7,
            &[(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 5), (5, 6), (6, 4)],
        );
        let rings = find_ring_torsions(&mol, &list(&[(0, 1), (4, 5)]));
        assert_eq!(rings.ring_count(), 2);
        let fixed = list(&[(0, 1), (1, 2), (0, 2), (5, 6)]);
        let kept = rings.without(fixed.as_slice());
        assert_eq!(kept.ring_count(), 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.ring_of(&Bond::new(4, 6)), 1);
        assert_eq!(kept.ring_of(&Bond::new(0, 2)), 0);
    }
}
