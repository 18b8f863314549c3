use nalgebra::{Matrix3, Point3, Vector3};
use std::f64::consts::PI;
use thiserror::Error;
use tracing::warn;

/// Fixed anchors that precede every tree, so the root already has three placed ancestors.
pub const DUMMY_ANCHORS: [[f64; 3]; 3] = [[0.8, 0.7, 0.9], [0.6, 0.5, 0.4], [0.1, 0.2, 0.3]];

const ANCHOR_COUNT: usize = 3;
const EPSILON: f64 = 1e-9;
const COS_ONE_TOLERANCE: f64 = 1e-10;
const COS_MINUS_ONE_TOLERANCE: f64 = 1e-11;

/// Internal coordinates of one atom relative to its parent, grandparent and great-grandparent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InternalCoord {
    /// Distance to the parent in Angstroms.
    pub bond_length: f64,
    /// Angle atom-parent-grandparent in degrees.
    pub bond_angle: f64,
    /// Dihedral atom-parent-grandparent-great-grandparent in degrees.
    pub torsion: f64,
}

impl InternalCoord {
    pub fn new(bond_length: f64, bond_angle: f64, torsion: f64) -> Self {
        Self {
            bond_length,
            bond_angle,
            torsion,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Tree describes {expected} positions but {found} entries were supplied")]
    LengthMismatch { expected: usize, found: usize },
    #[error("Parent {parent} of position {position} is outside the tree")]
    ParentOutOfRange { position: usize, parent: usize },
    #[error("Position {position} maps to atom {atom}, but only {atom_count} coordinates exist")]
    OrderingOutOfRange {
        position: usize,
        atom: usize,
        atom_count: usize,
    },
    #[error("Position {position} cannot be placed because its ancestors never resolve")]
    UnresolvableParent { position: usize },
}

/// Parent lookup over the tree extended with the three dummy anchors.
///
/// Extended index `i >= 3` is tree position `i - 3`; a root points at the last anchor.
struct AnchoredTree<'a> {
    parent: &'a [Option<usize>],
}

impl AnchoredTree<'_> {
    fn parent_of(&self, extended: usize) -> usize {
        match extended {
            0 | 1 => 0,
            2 => 1,
            _ => self.parent[extended - ANCHOR_COUNT].map_or(ANCHOR_COUNT - 1, |p| p + ANCHOR_COUNT),
        }
    }

    /// Parent, grandparent and great-grandparent of an extended index.
    fn ancestors(&self, extended: usize) -> (usize, usize, usize) {
        let j = self.parent_of(extended);
        let k = self.parent_of(j);
        let l = self.parent_of(k);
        (j, k, l)
    }
}

fn anchor(index: usize) -> Point3<f64> {
    let [x, y, z] = DUMMY_ANCHORS[index];
    Point3::new(x, y, z)
}

fn validate_parents(parent: &[Option<usize>]) -> Result<(), ConversionError> {
    for (position, p) in parent.iter().enumerate() {
        if let Some(p) = *p {
            if p >= parent.len() {
                return Err(ConversionError::ParentOutOfRange {
                    position,
                    parent: p,
                });
            }
        }
    }
    Ok(())
}

/// Maps a cosine onto [0, π], snapping values within tolerance of ±1 to exactly 0 or π.
fn clamped_acos(cos: f64) -> f64 {
    if cos - 1.0 > -COS_ONE_TOLERANCE {
        0.0
    } else if cos + 1.0 < COS_MINUS_ONE_TOLERANCE {
        PI
    } else {
        cos.acos()
    }
}

/// Angle `a`-`vertex`-`c` in radians.
pub fn bond_angle(a: &Point3<f64>, vertex: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let u = a - vertex;
    let v = c - vertex;
    let norms = u.norm() * v.norm();
    if norms < EPSILON {
        warn!("Degenerate geometry: zero-length arm in bond angle, using 0");
        return 0.0;
    }
    clamped_acos(u.dot(&v) / norms)
}

/// Signed dihedral `i`-`j`-`k`-`l` in radians, measured as atom `i` around the `j`-`k` axis.
///
/// The sign follows the scalar triple product, so the result matches the IUPAC convention
/// for the sequence `l`-`k`-`j`-`i`.
pub fn dihedral_angle(
    i: &Point3<f64>,
    j: &Point3<f64>,
    k: &Point3<f64>,
    l: &Point3<f64>,
) -> f64 {
    let dij = i - j;
    let dkj = k - j;
    let dkl = k - l;
    let a = dij.cross(&dkj);
    let c = dkj.cross(&dkl);
    let denom = (a.norm_squared() * c.norm_squared()).sqrt();
    if denom < EPSILON {
        warn!("Degenerate geometry: collinear atoms in dihedral, using 0");
        return 0.0;
    }
    let angle = clamped_acos(a.dot(&c) / denom);
    if dij.dot(&c) < 0.0 { -angle } else { angle }
}

fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let seed = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    (seed - v * v.dot(&seed)).normalize()
}

/// Places atom D from C (parent), B (grandparent) and A (great-grandparent).
fn place_atom(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    coord: &InternalCoord,
    position: usize,
) -> Point3<f64> {
    let bc = c - b;
    let bc_len = bc.norm();
    let bc_hat = if bc_len < EPSILON {
        warn!(position, "Degenerate geometry: parent and grandparent coincide");
        Vector3::x()
    } else {
        bc / bc_len
    };

    let normal = (b - a).cross(&bc_hat);
    let normal = if normal.norm() < EPSILON {
        warn!(position, "Degenerate geometry: reference atoms are collinear");
        any_perpendicular(&bc_hat)
    } else {
        normal.normalize()
    };
    let in_plane = normal.cross(&bc_hat);

    let theta = coord.bond_angle.to_radians();
    let phi = coord.torsion.to_radians();
    let r = coord.bond_length;
    let local = Vector3::new(
        -r * theta.cos(),
        r * theta.sin() * phi.cos(),
        r * theta.sin() * phi.sin(),
    );

    c + Matrix3::from_columns(&[bc_hat, in_plane, normal]) * local
}

/// Rebuilds Cartesian coordinates from internal coordinates over an arbitrary tree.
///
/// `zmat[p]` and `parent[p]` describe tree position `p`; parents may appear later in the
/// array than their children. Positions are placed in passes until every ancestor chain
/// resolves. The returned coordinates are indexed by tree position.
///
/// # Errors
///
/// Returns [`ConversionError`] when the arrays disagree in length, a parent is out of range,
/// or a cycle leaves some position permanently unplaced.
pub fn internal_to_cartesian(
    zmat: &[InternalCoord],
    parent: &[Option<usize>],
) -> Result<Vec<Point3<f64>>, ConversionError> {
    if zmat.len() != parent.len() {
        return Err(ConversionError::LengthMismatch {
            expected: parent.len(),
            found: zmat.len(),
        });
    }
    validate_parents(parent)?;

    let tree = AnchoredTree { parent };
    let total = zmat.len() + ANCHOR_COUNT;
    let mut placed: Vec<Option<Point3<f64>>> = vec![None; total];
    for (i, slot) in placed.iter_mut().take(ANCHOR_COUNT).enumerate() {
        *slot = Some(anchor(i));
    }

    let mut remaining = zmat.len();
    while remaining > 0 {
        let mut progressed = false;
        for extended in ANCHOR_COUNT..total {
            if placed[extended].is_some() {
                continue;
            }
            let (j, k, l) = tree.ancestors(extended);
            if let (Some(pj), Some(pk), Some(pl)) = (placed[j], placed[k], placed[l]) {
                let position = extended - ANCHOR_COUNT;
                placed[extended] = Some(place_atom(&pl, &pk, &pj, &zmat[position], position));
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            let position = placed[ANCHOR_COUNT..]
                .iter()
                .position(Option::is_none)
                .unwrap_or(0);
            return Err(ConversionError::UnresolvableParent { position });
        }
    }

    Ok(placed.into_iter().skip(ANCHOR_COUNT).flatten().collect())
}

/// Expresses Cartesian coordinates as internal coordinates over a tree.
///
/// `ordering[p]` is the index into `cart` of the atom at tree position `p`, and `parent[p]` is
/// the tree position of its parent. The result is indexed by tree position.
///
/// # Errors
///
/// Returns [`ConversionError`] when the arrays disagree in length or refer outside `cart`.
pub fn cartesian_to_internal(
    cart: &[Point3<f64>],
    ordering: &[usize],
    parent: &[Option<usize>],
) -> Result<Vec<InternalCoord>, ConversionError> {
    if ordering.len() != parent.len() {
        return Err(ConversionError::LengthMismatch {
            expected: parent.len(),
            found: ordering.len(),
        });
    }
    validate_parents(parent)?;
    for (position, &atom) in ordering.iter().enumerate() {
        if atom >= cart.len() {
            return Err(ConversionError::OrderingOutOfRange {
                position,
                atom,
                atom_count: cart.len(),
            });
        }
    }

    let tree = AnchoredTree { parent };
    let point = |extended: usize| {
        if extended < ANCHOR_COUNT {
            anchor(extended)
        } else {
            cart[ordering[extended - ANCHOR_COUNT]]
        }
    };

    Ok((0..ordering.len())
        .map(|position| {
            let extended = position + ANCHOR_COUNT;
            let (j, k, l) = tree.ancestors(extended);
            let (pi, pj, pk, pl) = (point(extended), point(j), point(k), point(l));
            InternalCoord {
                bond_length: (pi - pj).norm(),
                bond_angle: bond_angle(&pi, &pj, &pk).to_degrees(),
                torsion: dihedral_angle(&pi, &pj, &pk, &pl).to_degrees(),
            }
        })
        .collect())
}
