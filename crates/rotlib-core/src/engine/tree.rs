use super::core_selector::{BackboneAtoms, CORE_GROUP, CoreSelection};
use super::error::EngineError;
use crate::core::models::molecule::MoleculeGraph;
use crate::core::models::topology::Torsion;
use tracing::trace;

/// Atoms laid out as a z-matrix tree.
///
/// All vectors are indexed by tree position. `parent[p]` is always a position before `p`,
/// and only the first position has no parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// Atom index placed at each position.
    pub ordering: Vec<usize>,
    pub parent: Vec<Option<usize>>,
    pub rank: Vec<usize>,
    pub group: Vec<isize>,
}

impl Tree {
    pub fn len(&self) -> usize {
        self.ordering.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordering.is_empty()
    }

    /// Tree position of every atom.
    pub fn positions(&self) -> Vec<usize> {
        let mut positions = vec![0; self.ordering.len()];
        for (position, &atom) in self.ordering.iter().enumerate() {
            positions[atom] = position;
        }
        positions
    }

    fn grandparent(&self, position: usize) -> Option<(usize, usize)> {
        let parent = self.parent[position]?;
        Some((parent, self.parent[parent]?))
    }
}

/// A sampled torsion located in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchoredTorsion {
    /// Oriented so that `parent` is the endpoint nearer the root.
    pub torsion: Torsion,
    /// Position whose dihedral samples the torsion.
    pub position: usize,
}

struct Placement {
    ordering: Vec<usize>,
    parent: Vec<Option<usize>>,
    position: Vec<Option<usize>>,
}

impl Placement {
    fn new(atom_count: usize) -> Self {
        Self {
            ordering: Vec::with_capacity(atom_count),
            parent: Vec::with_capacity(atom_count),
            position: vec![None; atom_count],
        }
    }

    fn is_placed(&self, atom: usize) -> bool {
        self.position[atom].is_some()
    }

    fn place(&mut self, atom: usize, parent_atom: Option<usize>) {
        trace!("Placing atom {} under {:?}", atom, parent_atom);
        self.position[atom] = Some(self.ordering.len());
        self.ordering.push(atom);
        self.parent.push(parent_atom.and_then(|p| self.position[p]));
    }

    fn first_unplaced(&self) -> Option<usize> {
        self.position.iter().position(Option::is_none)
    }

    fn into_tree(self, selection: &CoreSelection) -> Tree {
        let rank = self.ordering.iter().map(|&a| selection.rank[a]).collect();
        let group = self.ordering.iter().map(|&a| selection.group[a]).collect();
        Tree {
            ordering: self.ordering,
            parent: self.parent,
            rank,
            group,
        }
    }
}

/// Orders a ligand into a tree rooted at the selection's start atom.
///
/// The rigid core is laid out first by walking its internal bonds. Every group, core group
/// first, is then grown one rank at a time: each scan of the bond list adds the first atom of
/// the next rank hanging off a placed atom of the current rank.
///
/// # Errors
///
/// Returns [`EngineError::DisconnectedTree`] if a group still has unplaced atoms once every
/// rank has been scanned.
pub fn build_tree(molecule: &MoleculeGraph, selection: &CoreSelection) -> Result<Tree, EngineError> {
    let bonds = molecule.bonds();
    let rank = &selection.rank;
    let group = &selection.group;
    let mut placement = Placement::new(molecule.atom_count());

    placement.place(selection.start_atom, None);
    loop {
        let next = bonds.iter().find_map(|bond| {
            [(bond.a, bond.b), (bond.b, bond.a)].into_iter().find(|&(from, to)| {
                rank[from] == 0 && rank[to] == 0 && placement.is_placed(from) && !placement.is_placed(to)
            })
        });
        match next {
            Some((from, to)) => placement.place(to, Some(from)),
            None => break,
        }
    }

    let max_rank = selection.max_rank();
    let max_group = group.iter().copied().max().unwrap_or(CORE_GROUP);
    for target in CORE_GROUP..=max_group {
        let mut current = 0;
        while current <= max_rank {
            let next = bonds.iter().find_map(|bond| {
                [(bond.a, bond.b), (bond.b, bond.a)].into_iter().find(|&(low, high)| {
                    rank[low] == current
                        && rank[high] == current + 1
                        && group[high] == target
                        && placement.is_placed(low)
                        && !placement.is_placed(high)
                })
            });
            match next {
                Some((low, high)) => placement.place(high, Some(low)),
                None => current += 1,
            }
        }

        let unplaced = (0..rank.len())
            .filter(|&atom| group[atom] == target && !placement.is_placed(atom))
            .count();
        if unplaced > 0 {
            return Err(EngineError::DisconnectedTree {
                group: target,
                unplaced,
            });
        }
    }

    Ok(placement.into_tree(selection))
}

/// Orders an amino acid along its N, CA and C atoms.
///
/// After each backbone atom a depth-first walk adds its side atoms: single-bonded
/// neighbours first, then branches, never stepping onto another backbone atom.
///
/// # Errors
///
/// Returns [`EngineError::DisconnectedTree`] if the walk leaves atoms unplaced.
pub fn build_backbone_tree(
    molecule: &MoleculeGraph,
    atoms: &BackboneAtoms,
    selection: &CoreSelection,
) -> Result<Tree, EngineError> {
    let mut placement = Placement::new(molecule.atom_count());
    let mut previous = None;
    for anchor in atoms.chain() {
        if !placement.is_placed(anchor) {
            placement.place(anchor, previous);
        }
        walk_side_atoms(molecule, atoms, anchor, &mut placement);
        previous = Some(anchor);
    }

    if let Some(atom) = placement.first_unplaced() {
        let group = selection.group[atom];
        let unplaced = (0..molecule.atom_count())
            .filter(|&a| !placement.is_placed(a))
            .count();
        return Err(EngineError::DisconnectedTree { group, unplaced });
    }
    Ok(placement.into_tree(selection))
}

fn walk_side_atoms(
    molecule: &MoleculeGraph,
    atoms: &BackboneAtoms,
    anchor: usize,
    placement: &mut Placement,
) {
    attach_terminal_atoms(molecule, atoms, anchor, placement);
    let mut stack = vec![(anchor, 0usize)];
    while let Some(frame) = stack.last_mut() {
        let (atom, cursor) = *frame;
        let next = molecule
            .neighbors(atom)
            .iter()
            .enumerate()
            .skip(cursor)
            .find(|&(_, &n)| !placement.is_placed(n) && !atoms.is_chain_atom(n))
            .map(|(i, &n)| (i, n));
        match next {
            Some((i, child)) => {
                frame.1 = i + 1;
                placement.place(child, Some(atom));
                attach_terminal_atoms(molecule, atoms, child, placement);
                stack.push((child, 0));
            }
            None => {
                stack.pop();
            }
        }
    }
}

fn attach_terminal_atoms(
    molecule: &MoleculeGraph,
    atoms: &BackboneAtoms,
    parent: usize,
    placement: &mut Placement,
) {
    for &neighbor in molecule.neighbors(parent) {
        if !placement.is_placed(neighbor)
            && !atoms.is_chain_atom(neighbor)
            && molecule.neighbors(neighbor) == [parent]
        {
            placement.place(neighbor, Some(parent));
        }
    }
}

/// Finds the tree position that samples each torsion.
///
/// A torsion is carried by the first position whose parent and grandparent are its two atoms.
/// Torsions without such a position (ring closures, terminal bonds) are dropped. The result is
/// oriented parent to child and sorted by the tree positions of the two atoms.
pub fn locate_torsions(tree: &Tree, torsions: &[Torsion]) -> Vec<AnchoredTorsion> {
    let positions = tree.positions();
    let mut by_position: Vec<((usize, usize), Torsion)> = torsions
        .iter()
        .map(|t| {
            let (p, c) = (positions[t.parent], positions[t.child]);
            ((p.min(c), p.max(c)), *t)
        })
        .collect();
    by_position.sort_by_key(|(pair, _)| *pair);

    by_position
        .into_iter()
        .filter_map(|((outer, inner), torsion)| {
            let Some(position) = (0..tree.len()).find(|&z| {
                tree.grandparent(z).is_some_and(|(p, g)| {
                    (p == inner && g == outer) || (p == outer && g == inner)
                })
            }) else {
                trace!("Torsion {} moves no atom of the tree", torsion.bond());
                return None;
            };
            let (parent, grandparent) = tree.grandparent(position)?;
            Some(AnchoredTorsion {
                torsion: Torsion {
                    parent: tree.ordering[grandparent],
                    child: tree.ordering[parent],
                    ..torsion
                },
                position,
            })
        })
        .collect()
}

/// Like [`locate_torsions`], but also drops torsions carried at rank 0 or 1, which only
/// move atoms of the rigid core.
pub fn anchor_torsions(tree: &Tree, torsions: &[Torsion]) -> Vec<AnchoredTorsion> {
    locate_torsions(tree, torsions)
        .into_iter()
        .filter(|anchored| {
            let outside_core = tree.rank[anchored.position] > 1;
            if !outside_core {
                trace!("Dropping torsion {} anchored in the core", anchored.torsion.bond());
            }
            outside_core
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::topology::{Bond, BondList};
    use crate::engine::core_selector::CoreSelector;

    fn molecule(names: &[&str], pairs: &[(usize, usize)]) -> MoleculeGraph {
        let atoms = names
            .iter()
            .enumerate()
            .map(|(i, name)| Atom::new(i, Element::from_atom_name(name), name, "LIG"))
            .collect();
        MoleculeGraph::new(atoms, pairs.iter().map(|&p| Bond::from(p))).unwrap()
    }

    fn list(pairs: &[(usize, usize)]) -> BondList {
        pairs.iter().map(|&p| Bond::from(p)).collect()
    }

    fn torsions(pairs: &[(usize, usize)]) -> Vec<Torsion> {
        pairs.iter().map(|&p| Torsion::from_bond(Bond::from(p))).collect()
    }

    fn assert_well_formed(tree: &Tree) {
        assert_eq!(tree.parent[0], None);
        for (position, parent) in tree.parent.iter().enumerate().skip(1) {
            let parent = parent.expect("only the first position may lack a parent");
            assert!(parent < position);
        }
        let mut atoms = tree.ordering.clone();
        atoms.sort_unstable();
        assert_eq!(atoms, (0..tree.len()).collect::<Vec<_>>());
    }

    #[test]
    fn chain_is_ordered_core_first_then_by_rank() {
        let mol = molecule(&["C1", "C2", "C3", "C4"], &[(0, 1), (1, 2), (2, 3)]);
        let selection = CoreSelector::new(&mol)
            .select(list(&[(1, 2), (2, 3)]), BondList::new())
            .unwrap();
        let tree = build_tree(&mol, &selection).unwrap();
        assert_eq!(tree.ordering, vec![0, 1, 2, 3]);
        assert_eq!(tree.parent, vec![None, Some(0), Some(1), Some(2)]);
        assert_eq!(tree.rank, vec![0, 0, 1, 2]);
        assert_eq!(tree.group, vec![-1, -1, 0, 0]);
    }

    #[test]
    fn branched_ligand_places_groups_in_turn() {
        // Core C1-C2 (+ H1 on C1), branch C3-O1-H2 off C2 and branch C4-C5 off C1.
        let mol = molecule(
            &["C1", "C2", "H1", "C3", "O1", "H2", "C4", "C5"],
            &[(0, 1), (0, 2), (1, 3), (3, 4), (4, 5), (0, 6), (6, 7)],
        );
        let selection = CoreSelector::new(&mol)
            .root(Some(0))
            .select(list(&[(1, 3), (3, 4), (0, 6)]), BondList::new())
            .unwrap();
        let tree = build_tree(&mol, &selection).unwrap();
        assert_well_formed(&tree);
        // C1 and C2 both carry torsions, so the tree starts from H1.
        assert_eq!(selection.start_atom, 2);
        assert_eq!(tree.ordering, vec![2, 0, 1, 3, 4, 5, 6, 7]);
        assert_eq!(tree.group, vec![-1, -1, -1, 0, 0, 0, 1, 1]);
        assert_eq!(
            tree.parent,
            vec![None, Some(0), Some(1), Some(2), Some(3), Some(4), Some(1), Some(6)]
        );
    }

    #[test]
    fn ring_core_keeps_every_parent_before_its_child() {
        // Benzene-like ring with a two-atom tail and a ring hydrogen.
        let mol = molecule(
            &["C1", "C2", "C3", "C4", "C5", "C6", "C7", "O1", "H1"],
            &[
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 4),
                (4, 5),
                (5, 0),
                (3, 6),
                (6, 7),
                (5, 8),
            ],
        );
        let selection = CoreSelector::new(&mol)
            .select(list(&[(3, 6), (6, 7)]), BondList::new())
            .unwrap();
        let tree = build_tree(&mol, &selection).unwrap();
        assert_well_formed(&tree);
        for (position, parent) in tree.parent.iter().enumerate().skip(1) {
            let parent = parent.unwrap();
            assert!(mol.has_bond(tree.ordering[position], tree.ordering[parent]));
            assert!(tree.rank[position] == tree.rank[parent] || tree.rank[position] == tree.rank[parent] + 1);
        }
    }

    #[test]
    fn inconsistent_ranks_are_reported_as_disconnected() {
        let mol = molecule(&["C1", "C2", "C3", "C4"], &[(0, 1), (2, 3)]);
        let selection = CoreSelection {
            root: 0,
            start_atom: 0,
            components: vec![0, 0, 1, 2],
            rank: vec![0, 0, 1, 2],
            group: vec![-1, -1, 0, 0],
            sampled: BondList::new(),
            backbone: BondList::new(),
        };
        let err = build_tree(&mol, &selection).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DisconnectedTree {
                group: 0,
                unplaced: 2
            }
        ));
    }

    fn amino_acid() -> MoleculeGraph {
        molecule(
            &["N", "H", "CA", "HA", "CB", "HB1", "HB2", "C", "O"],
            &[(0, 1), (0, 2), (2, 3), (2, 4), (4, 5), (4, 6), (2, 7), (7, 8)],
        )
    }

    #[test]
    fn backbone_tree_walks_n_ca_c_with_side_atoms() {
        let mol = amino_acid();
        let atoms = BackboneAtoms::locate(&mol).unwrap();
        let selection = CoreSelector::new(&mol)
            .backbone_atoms(Some(atoms))
            .select(list(&[(2, 4)]), BondList::new())
            .unwrap();
        let tree = build_backbone_tree(&mol, &atoms, &selection).unwrap();
        assert_well_formed(&tree);
        assert_eq!(tree.ordering, vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            tree.parent,
            vec![None, Some(0), Some(0), Some(2), Some(2), Some(4), Some(4), Some(2), Some(7)]
        );
        assert_eq!(tree.rank, vec![0, 0, 0, 0, 1, 2, 2, 0, 0]);
    }

    #[test]
    fn side_chain_torsion_is_anchored_on_its_first_dependent_atom() {
        let mol = amino_acid();
        let atoms = BackboneAtoms::locate(&mol).unwrap();
        let selection = CoreSelector::new(&mol)
            .backbone_atoms(Some(atoms))
            .select(list(&[(2, 4)]), BondList::new())
            .unwrap();
        let tree = build_backbone_tree(&mol, &atoms, &selection).unwrap();
        let anchored = anchor_torsions(&tree, &torsions(&[(4, 2)]));
        assert_eq!(anchored.len(), 1);
        assert_eq!(anchored[0].position, 5);
        assert_eq!((anchored[0].torsion.parent, anchored[0].torsion.child), (2, 4));
    }

    #[test]
    fn anchoring_drops_terminal_and_core_torsions_and_sorts_by_position() {
        // C1-C2-C3-C4-C5 with a C1-C2 core; tree order equals atom order.
        let tree = Tree {
            ordering: vec![0, 1, 2, 3, 4],
            parent: vec![None, Some(0), Some(1), Some(2), Some(3)],
            rank: vec![0, 0, 1, 2, 3],
            group: vec![-1, -1, 0, 0, 0],
        };
        let anchored = anchor_torsions(&tree, &torsions(&[(2, 3), (0, 1), (1, 2), (3, 4)]));
        let positions: Vec<usize> = anchored.iter().map(|a| a.position).collect();
        // 0-1 anchors at rank 1 and 3-4 has no dependent atom.
        assert_eq!(positions, vec![3, 4]);
        assert_eq!(anchored[0].torsion.bond(), Bond::new(1, 2));
        assert_eq!(anchored[1].torsion.bond(), Bond::new(2, 3));

        let located = locate_torsions(&tree, &torsions(&[(0, 1)]));
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].position, 2);
    }

    #[test]
    fn anchoring_keeps_ring_metadata() {
        let tree = Tree {
            ordering: vec![0, 1, 2, 3],
            parent: vec![None, Some(0), Some(1), Some(2)],
            rank: vec![0, 0, 1, 2],
            group: vec![-1, -1, 0, 0],
        };
        let mut torsion = Torsion::from_bond(Bond::new(2, 1));
        torsion.ring_id = 3;
        torsion.is_hydroxyl = true;
        let anchored = anchor_torsions(&tree, &[torsion]);
        assert_eq!(anchored[0].torsion.ring_id, 3);
        assert!(anchored[0].torsion.is_hydroxyl);
        assert_eq!(anchored[0].position, 3);
    }
}
