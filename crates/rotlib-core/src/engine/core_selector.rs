use super::error::EngineError;
use crate::core::models::molecule::MoleculeGraph;
use crate::core::models::topology::{Bond, BondList};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Group id shared by the rigid core and by folded single-atom branches.
pub const CORE_GROUP: isize = -1;

/// Amino-acid backbone atoms of an unnatural residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackboneAtoms {
    pub n: usize,
    pub ca: usize,
    pub c: usize,
    pub o: usize,
    pub ha: Option<usize>,
}

impl BackboneAtoms {
    /// Finds the backbone atoms by their PDB names.
    pub fn locate(molecule: &MoleculeGraph) -> Result<Self, EngineError> {
        let find = |name: &'static str| {
            molecule
                .find_atom(name)
                .ok_or(EngineError::MissingBackboneAtom(name))
        };
        Ok(Self {
            n: find("N")?,
            ca: find("CA")?,
            c: find("C")?,
            o: find("O")?,
            ha: molecule.find_atom("HA"),
        })
    }

    /// The N, CA and C chain walked by the backbone tree.
    pub fn chain(&self) -> [usize; 3] {
        [self.n, self.ca, self.c]
    }

    pub fn is_chain_atom(&self, atom: usize) -> bool {
        self.chain().contains(&atom)
    }

    fn forced_core(&self) -> impl Iterator<Item = usize> {
        [self.ca, self.c, self.o].into_iter().chain(self.ha)
    }
}

/// Result of core selection: where the tree is rooted and how atoms are layered and grouped.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreSelection {
    pub root: usize,
    /// First atom placed in the tree; a core atom that no torsion touches.
    pub start_atom: usize,
    /// Rigid component of every atom once the sampled torsions are cut.
    pub components: Vec<usize>,
    pub rank: Vec<usize>,
    pub group: Vec<isize>,
    /// Torsions sampled by the side libraries.
    pub sampled: BondList,
    /// Torsions sampled by the backbone library; rigid for core selection.
    pub backbone: BondList,
}

impl CoreSelection {
    /// A torsion belongs to the group of its outer endpoint.
    pub fn torsion_group(&self, bond: &Bond) -> isize {
        self.group[bond.a].max(self.group[bond.b])
    }

    pub fn group_count(&self) -> usize {
        self.group
            .iter()
            .copied()
            .max()
            .map_or(0, |max| (max + 1).max(0) as usize)
    }

    pub fn max_rank(&self) -> usize {
        self.rank.iter().copied().max().unwrap_or(0)
    }

    pub fn core_atoms(&self) -> impl Iterator<Item = usize> + '_ {
        self.rank
            .iter()
            .enumerate()
            .filter(|(_, r)| **r == 0)
            .map(|(atom, _)| atom)
    }

    /// The group holding the most sampled torsions, with that count.
    ///
    /// On a tie the lowest group id wins.
    fn largest_group(&self) -> Option<(isize, usize)> {
        let mut counts = vec![0usize; self.group_count()];
        for bond in &self.sampled {
            let group = self.torsion_group(bond);
            if group >= 0 {
                counts[group as usize] += 1;
            }
        }
        let mut best: Option<(isize, usize)> = None;
        for (group, &count) in counts.iter().enumerate() {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((group as isize, count));
            }
        }
        best
    }
}

/// Picks the tree root, ranks and branch groups for a molecule.
pub struct CoreSelector<'a> {
    molecule: &'a MoleculeGraph,
    root: Option<usize>,
    r_group_root: Option<usize>,
    multiple_libraries: bool,
    max_torsions: Option<usize>,
    backbone_atoms: Option<BackboneAtoms>,
}

impl<'a> CoreSelector<'a> {
    pub fn new(molecule: &'a MoleculeGraph) -> Self {
        Self {
            molecule,
            root: None,
            r_group_root: None,
            multiple_libraries: true,
            max_torsions: None,
            backbone_atoms: None,
        }
    }

    pub fn root(mut self, root: Option<usize>) -> Self {
        self.root = root;
        self
    }

    /// Roots a ligand at the atom farthest from `atom`, the attachment point of the R-group
    /// to be sampled. An explicit root takes precedence.
    pub fn r_group_root(mut self, atom: Option<usize>) -> Self {
        self.r_group_root = atom;
        self
    }

    pub fn multiple_libraries(mut self, enabled: bool) -> Self {
        self.multiple_libraries = enabled;
        self
    }

    pub fn max_torsions(mut self, limit: Option<usize>) -> Self {
        self.max_torsions = limit;
        self
    }

    /// Switches to amino-acid mode: the backbone joins the root's core and N is the default root.
    pub fn backbone_atoms(mut self, atoms: Option<BackboneAtoms>) -> Self {
        self.backbone_atoms = atoms;
        self
    }

    /// Selects the core, then moves torsions into the backbone set until every group
    /// fits under the torsion ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoValidRoot`] or [`EngineError::InvalidRoot`] when no core can
    /// start a tree, [`EngineError::UnreachableAtom`] for disconnected molecules and
    /// [`EngineError::CannotSatisfyTorsionLimit`] when the ceiling cannot be met.
    pub fn select(&self, sampled: BondList, backbone: BondList) -> Result<CoreSelection, EngineError> {
        let mut selection = self.select_once(sampled, backbone)?;
        let Some(limit) = self.max_torsions else {
            return Ok(selection);
        };

        while let Some((big, count)) = selection.largest_group() {
            if count <= limit {
                break;
            }
            let rank = &selection.rank;
            let victim = selection
                .sampled
                .iter()
                .filter(|bond| selection.torsion_group(bond) == big)
                .min_by_key(|bond| rank[bond.a].max(rank[bond.b]))
                .copied()
                .ok_or(EngineError::CannotSatisfyTorsionLimit {
                    limit,
                    remaining: count,
                })?;
            debug!(
                "Group {} holds {} torsions (limit {}); moving {} to the backbone set",
                big, count, limit, victim
            );

            let mut sampled = selection.sampled.clone();
            sampled.remove(&victim);
            let mut backbone = selection.backbone.clone();
            backbone.push(victim);
            selection = self.select_once(sampled, backbone).map_err(|e| match e {
                EngineError::NoValidRoot | EngineError::InvalidRoot { .. } => {
                    EngineError::CannotSatisfyTorsionLimit {
                        limit,
                        remaining: count,
                    }
                }
                other => other,
            })?;
        }
        Ok(selection)
    }

    fn select_once(&self, sampled: BondList, backbone: BondList) -> Result<CoreSelection, EngineError> {
        let bonds = self.molecule.bonds();
        let atom_count = self.molecule.atom_count();
        let mut components = partition_by_cut(sampled.as_slice(), bonds, atom_count);
        let excluded = sampled.union(backbone.as_slice());

        for atom in [self.root, self.r_group_root].into_iter().flatten() {
            if atom >= atom_count {
                return Err(EngineError::InvalidRoot { atom });
            }
        }

        let user_root = match (self.root, self.r_group_root, self.backbone_atoms) {
            (None, Some(r_group), None) => {
                Some(farthest_from(r_group, &components, bonds, excluded.as_slice())?)
            }
            (root, _, _) => root,
        };

        let (root, start_atom, rank) = match (self.backbone_atoms, user_root) {
            (Some(atoms), root) => {
                let root = root.unwrap_or(atoms.n);
                let core = components[root];
                for atom in atoms.forced_core() {
                    components[atom] = core;
                }
                let rank = rank_from(root, &components, bonds)?;
                (root, atoms.n, rank)
            }
            (None, Some(root)) => {
                let start = start_atom(components[root], &components, excluded.as_slice())
                    .ok_or(EngineError::InvalidRoot { atom: root })?;
                let rank = rank_from(root, &components, bonds)?;
                (root, start, rank)
            }
            (None, None) => choose_root(&components, bonds, excluded.as_slice())?,
        };

        let group = if self.multiple_libraries {
            assign_branch_groups(bonds, &rank)
        } else {
            single_group(&rank)
        };
        trace!("Ranks {:?}, groups {:?}", rank, group);

        Ok(CoreSelection {
            root,
            start_atom,
            components,
            rank,
            group,
            sampled,
            backbone,
        })
    }
}

/// Rigid component of every atom after removing the `cut` bonds.
///
/// Components are numbered from 0 in the order of their lowest atom index.
pub fn partition_by_cut(cut: &[Bond], bonds: &[Bond], atom_count: usize) -> Vec<usize> {
    let cut: HashSet<&Bond> = cut.iter().collect();
    let mut adjacency = vec![Vec::new(); atom_count];
    for bond in bonds.iter().filter(|b| !cut.contains(b)) {
        adjacency[bond.a].push(bond.b);
        adjacency[bond.b].push(bond.a);
    }

    let mut component = vec![usize::MAX; atom_count];
    let mut next_id = 0;
    let mut stack = Vec::new();
    for seed in 0..atom_count {
        if component[seed] != usize::MAX {
            continue;
        }
        component[seed] = next_id;
        stack.push(seed);
        while let Some(atom) = stack.pop() {
            for &neighbor in &adjacency[atom] {
                if component[neighbor] == usize::MAX {
                    component[neighbor] = next_id;
                    stack.push(neighbor);
                }
            }
        }
        next_id += 1;
    }
    component
}

/// Bond-hop distance of every atom from the rigid component containing `root`.
///
/// Every atom sharing the root's component has rank 0; each sweep over the bond list
/// raises the frontier by one.
///
/// # Errors
///
/// Returns [`EngineError::UnreachableAtom`] for the first atom the sweeps never reach.
pub fn rank_from(root: usize, components: &[usize], bonds: &[Bond]) -> Result<Vec<usize>, EngineError> {
    let core = components[root];
    let mut rank: Vec<Option<usize>> = components
        .iter()
        .map(|&c| (c == core).then_some(0))
        .collect();

    let mut frontier = 0;
    loop {
        let mut advanced = false;
        for bond in bonds {
            for (from, to) in [(bond.a, bond.b), (bond.b, bond.a)] {
                if rank[from] == Some(frontier) && rank[to].is_none() {
                    rank[to] = Some(frontier + 1);
                    advanced = true;
                }
            }
        }
        if !advanced {
            break;
        }
        frontier += 1;
    }

    rank.into_iter()
        .enumerate()
        .map(|(atom, r)| r.ok_or(EngineError::UnreachableAtom { atom, root }))
        .collect()
}

/// First atom of `component` that is not an endpoint of any of `torsions`.
pub fn start_atom(component: usize, components: &[usize], torsions: &[Bond]) -> Option<usize> {
    components
        .iter()
        .enumerate()
        .find(|&(atom, &c)| c == component && !torsions.iter().any(|t| t.contains(atom)))
        .map(|(atom, _)| atom)
}

/// Root with the shallowest tree among the cores that can start one.
///
/// Returns the root, its start atom and its ranks. Ties keep the first candidate.
pub fn choose_root(
    components: &[usize],
    bonds: &[Bond],
    torsions: &[Bond],
) -> Result<(usize, usize, Vec<usize>), EngineError> {
    let mut seen = HashSet::new();
    let mut best: Option<(usize, usize, usize, Vec<usize>)> = None;

    for (candidate, &component) in components.iter().enumerate() {
        // Every atom of a component yields the same ranks.
        if !seen.insert(component) {
            continue;
        }
        let Some(start) = start_atom(component, components, torsions) else {
            continue;
        };
        let rank = rank_from(candidate, components, bonds)?;
        let depth = rank.iter().copied().max().unwrap_or(0);
        trace!("Root candidate {} reaches depth {}", candidate, depth);
        if best.as_ref().is_none_or(|(_, _, best_depth, _)| depth < *best_depth) {
            best = Some((candidate, start, depth, rank));
        }
    }

    best.map(|(root, start, _, rank)| (root, start, rank))
        .ok_or(EngineError::NoValidRoot)
}

/// Atom whose rigid component lies farthest from the component of `origin`.
///
/// Only components that can start a tree are considered; ties keep the lowest atom index.
pub fn farthest_from(
    origin: usize,
    components: &[usize],
    bonds: &[Bond],
    torsions: &[Bond],
) -> Result<usize, EngineError> {
    let rank = rank_from(origin, components, bonds)?;
    let mut best: Option<(usize, usize)> = None;
    for (atom, &distance) in rank.iter().enumerate() {
        if best.is_some_and(|(_, best_distance)| distance <= best_distance) {
            continue;
        }
        if start_atom(components[atom], components, torsions).is_some() {
            best = Some((atom, distance));
        }
    }
    trace!("Farthest valid atom from R-group root {}: {:?}", origin, best);
    best.map(|(atom, _)| atom).ok_or(EngineError::NoValidRoot)
}

/// Splits non-core atoms into connected branches.
///
/// Branches are opened from the lowest-ranked ungrouped atom (first by index) and flood-filled
/// across any bond to ungrouped non-core atoms. Single-atom branches join the core group and
/// their id is reused, so ids stay dense.
pub fn assign_branch_groups(bonds: &[Bond], rank: &[usize]) -> Vec<isize> {
    let atom_count = rank.len();
    let mut adjacency = vec![Vec::new(); atom_count];
    for bond in bonds {
        adjacency[bond.a].push(bond.b);
        adjacency[bond.b].push(bond.a);
    }

    let mut group: Vec<Option<isize>> = rank.iter().map(|&r| (r == 0).then_some(CORE_GROUP)).collect();
    let mut next_id: isize = 0;
    let mut stack = Vec::new();
    loop {
        let Some(seed) = (0..atom_count)
            .filter(|&atom| group[atom].is_none())
            .min_by_key(|&atom| rank[atom])
        else {
            break;
        };

        group[seed] = Some(next_id);
        stack.push(seed);
        let mut members = 1;
        while let Some(atom) = stack.pop() {
            for &neighbor in &adjacency[atom] {
                if group[neighbor].is_none() {
                    group[neighbor] = Some(next_id);
                    stack.push(neighbor);
                    members += 1;
                }
            }
        }

        if members == 1 {
            group[seed] = Some(CORE_GROUP);
        } else {
            next_id += 1;
        }
    }

    group.into_iter().map(|g| g.unwrap_or(CORE_GROUP)).collect()
}

/// Every non-core atom in group 0.
pub fn single_group(rank: &[usize]) -> Vec<isize> {
    rank.iter()
        .map(|&r| if r == 0 { CORE_GROUP } else { 0 })
        .collect()
}
