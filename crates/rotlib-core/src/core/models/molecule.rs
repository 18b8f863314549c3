use super::atom::Atom;
use super::topology::Bond;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Atom at position {position} carries index {index}")]
    IndexMismatch { position: usize, index: usize },
    #[error("Bond {bond} references atom {atom}, but the molecule has {atom_count} atoms")]
    InvalidBondEndpoint {
        bond: Bond,
        atom: usize,
        atom_count: usize,
    },
    #[error("Atom {0} is bonded to itself")]
    SelfBond(usize),
    #[error("Atom name '{name}' is used by atoms {first} and {second}")]
    DuplicateAtomName {
        name: String,
        first: usize,
        second: usize,
    },
}

/// A closed cycle of atoms, listed in walking order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    pub atoms: Vec<usize>,
}

impl Ring {
    pub fn contains(&self, atom: usize) -> bool {
        self.atoms.contains(&atom)
    }

    pub fn contains_bond(&self, bond: &Bond) -> bool {
        self.contains(bond.a) && self.contains(bond.b)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// The bonded topology of one molecule.
///
/// Built once from parsed atoms and bonds; every query afterwards is read-only. Neighbour
/// lists keep the order in which bonds were declared, which the backbone tree walk relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeGraph {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<usize>>,
    rings: Vec<Ring>,
}

impl MoleculeGraph {
    /// Validates atoms and bonds and derives adjacency and rings.
    ///
    /// Repeated bonds are accepted and stored once.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] when atom indices are not `0..n` in order, when a bond points
    /// outside the atom list or at its own origin, or when two atoms share a name.
    pub fn new(atoms: Vec<Atom>, bonds: impl IntoIterator<Item = Bond>) -> Result<Self, GraphError> {
        let mut seen_names: HashMap<&str, usize> = HashMap::new();
        for (position, atom) in atoms.iter().enumerate() {
            if atom.index != position {
                return Err(GraphError::IndexMismatch {
                    position,
                    index: atom.index,
                });
            }
            if let Some(&first) = seen_names.get(atom.trimmed_name()) {
                return Err(GraphError::DuplicateAtomName {
                    name: atom.trimmed_name().to_string(),
                    first,
                    second: position,
                });
            }
            seen_names.insert(atom.trimmed_name(), position);
        }

        let atom_count = atoms.len();
        let mut unique = HashSet::new();
        let mut bond_list = Vec::new();
        let mut adjacency = vec![Vec::new(); atom_count];
        for bond in bonds {
            for atom in [bond.a, bond.b] {
                if atom >= atom_count {
                    return Err(GraphError::InvalidBondEndpoint {
                        bond,
                        atom,
                        atom_count,
                    });
                }
            }
            if bond.a == bond.b {
                return Err(GraphError::SelfBond(bond.a));
            }
            if unique.insert(bond) {
                bond_list.push(bond);
                adjacency[bond.a].push(bond.b);
                adjacency[bond.b].push(bond.a);
            }
        }

        let rings = find_rings(&bond_list, &adjacency);

        Ok(Self {
            atoms,
            bonds: bond_list,
            adjacency,
            rings,
        })
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn neighbors(&self, atom: usize) -> &[usize] {
        self.adjacency.get(atom).map_or(&[], Vec::as_slice)
    }

    pub fn has_bond(&self, i: usize, j: usize) -> bool {
        self.neighbors(i).contains(&j)
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Looks an atom up by name, ignoring column padding.
    pub fn find_atom(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.atoms
            .iter()
            .position(|atom| atom.trimmed_name() == wanted)
    }

    /// Looks an atom up by its 4-column template label (`"_C1_"`).
    pub fn find_by_template_name(&self, label: &str) -> Option<usize> {
        self.atoms
            .iter()
            .position(|atom| atom.template_name() == label)
    }

    /// Residue name of the molecule, taken from its first atom.
    pub fn residue_name(&self) -> &str {
        self.atoms
            .first()
            .map_or("UNK", |atom| atom.residue_name.trim())
    }

    pub fn total_mass(&self) -> f64 {
        self.atoms.iter().map(Atom::mass).sum()
    }

    /// Whether rotating about `parent`-`child` only moves one terminal atom on `child`.
    ///
    /// This is the hydroxyl pattern (C-O-H), and also catches thiols and similar caps.
    pub fn is_hydroxyl_like(&self, parent: usize, child: usize) -> bool {
        let mut substituents = self.neighbors(child).iter().filter(|&&n| n != parent);
        match (substituents.next(), substituents.next()) {
            (Some(&terminal), None) => self.neighbors(terminal).iter().all(|&n| n == child),
            _ => false,
        }
    }
}

/// Smallest cycle through every bond that closes one, deduplicated by atom set.
fn find_rings(bonds: &[Bond], adjacency: &[Vec<usize>]) -> Vec<Ring> {
    let mut rings = Vec::new();
    let mut seen: HashSet<Vec<usize>> = HashSet::new();

    for bond in bonds {
        let Some(path) = shortest_path_avoiding(adjacency, bond.a, bond.b) else {
            continue;
        };
        let mut key = path.clone();
        key.sort_unstable();
        if seen.insert(key) {
            rings.push(Ring { atoms: path });
        }
    }
    rings
}

/// Breadth-first path from `start` to `goal` that does not use the direct `start`-`goal` bond.
fn shortest_path_avoiding(adjacency: &[Vec<usize>], start: usize, goal: usize) -> Option<Vec<usize>> {
    let mut previous: Vec<Option<usize>> = vec![None; adjacency.len()];
    let mut visited = vec![false; adjacency.len()];
    let mut queue = VecDeque::from([start]);
    visited[start] = true;

    while let Some(current) = queue.pop_front() {
        for &next in &adjacency[current] {
            if current == start && next == goal {
                continue;
            }
            if visited[next] {
                continue;
            }
            visited[next] = true;
            previous[next] = Some(current);
            if next == goal {
                let mut path = vec![goal];
                let mut cursor = goal;
                while let Some(p) = previous[cursor] {
                    path.push(p);
                    cursor = p;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }
    None
}
