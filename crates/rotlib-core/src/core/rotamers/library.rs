use super::grid::{self, GridRow, QuantizeOptions};
use crate::core::geometry::zmatrix::{self, ConversionError};
use crate::core::io::traits::TextArtifact;
use crate::core::models::conformer::ConformerSet;
use rayon::prelude::*;
use std::fmt;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    /// Side-chain or ligand group library (`.side`).
    Side,
    /// Backbone library of an unnatural residue (`.back`).
    Back,
}

impl LibraryKind {
    pub fn extension(&self) -> &'static str {
        match self {
            LibraryKind::Side => "side",
            LibraryKind::Back => "back",
        }
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How library rows are stored on disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LibraryGrid {
    /// Storage step in degrees.
    pub resolution: f64,
    /// Whether the engine may coarsen the library at load time.
    pub allow_downsample: bool,
    /// Conformers closer than this are merged before quantization.
    pub sampling_resolution: f64,
}

impl LibraryGrid {
    /// Grid used for group and backbone libraries.
    pub fn sampled(resolution: f64) -> Self {
        Self {
            resolution,
            allow_downsample: true,
            sampling_resolution: resolution,
        }
    }

    /// Ring libraries keep every distinct pucker at one degree.
    pub fn ring(sampling_resolution: f64) -> Self {
        Self {
            resolution: 1.0,
            allow_downsample: false,
            sampling_resolution,
        }
    }

    fn quantize_options(&self) -> QuantizeOptions {
        let options = QuantizeOptions::new(self.resolution);
        if self.sampling_resolution != self.resolution {
            options.with_min_separation(self.sampling_resolution)
        } else {
            options
        }
    }

    /// Resolution as written in the header; negative forbids downsampling.
    fn header_resolution(&self) -> f64 {
        if self.allow_downsample {
            self.resolution
        } else {
            -self.resolution
        }
    }
}

/// A quantized rotamer library for one group, ring system or backbone.
#[derive(Debug, Clone, PartialEq)]
pub struct RotamerLibrary {
    pub name: String,
    pub kind: LibraryKind,
    /// Template label of the atom whose dihedral each column samples.
    pub atom_labels: Vec<String>,
    pub grid: LibraryGrid,
    pub rows: Vec<GridRow>,
}

impl RotamerLibrary {
    /// Quantizes per-conformer torsion values into a library.
    pub fn from_series(
        name: String,
        kind: LibraryKind,
        atom_labels: Vec<String>,
        grid: LibraryGrid,
        series: &[Vec<f64>],
    ) -> Self {
        let rows = grid::quantize(series, &grid.quantize_options());
        Self {
            name,
            kind,
            atom_labels,
            grid,
            rows,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.kind.extension())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl TextArtifact for RotamerLibrary {
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(
            writer,
            "* {:>6} {:>2} {:>7} {:>4.1} 0",
            self.name,
            self.atom_labels.len(),
            self.rows.len(),
            self.grid.header_resolution()
        )?;
        for label in &self.atom_labels {
            writeln!(writer, "{:>4}", label)?;
        }
        for row in &self.rows {
            for index in row {
                write!(writer, " {:>5}", index)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

/// Name of the side library for a 0-based branch group.
pub fn group_library_name(residue: &str, group: usize) -> String {
    let number = group + 1;
    if number < 10 {
        format!("{:>3}__{}", residue, number)
    } else {
        format!("{:>3}_{:>2}", residue, number)
    }
}

pub fn ring_library_name(residue: &str, ring_id: usize) -> String {
    format!("{}_R{}", residue, ring_id)
}

pub fn backbone_library_name(residue: &str) -> String {
    format!("{}__B", residue)
}

/// Samples the dihedrals at `positions` of a tree in every conformer.
///
/// Conformers are converted in parallel; the result keeps conformer order.
///
/// # Errors
///
/// Returns [`ConversionError`] if the tree does not fit the conformer coordinates.
pub fn torsion_series(
    conformers: &ConformerSet,
    ordering: &[usize],
    parent: &[Option<usize>],
    positions: &[usize],
) -> Result<Vec<Vec<f64>>, ConversionError> {
    conformers
        .frames()
        .par_iter()
        .map(|frame| -> Result<Vec<f64>, ConversionError> {
            let zmat = zmatrix::cartesian_to_internal(frame, ordering, parent)?;
            positions
                .iter()
                .map(|&p| {
                    zmat.get(p)
                        .map(|coord| coord.torsion)
                        .ok_or(ConversionError::LengthMismatch {
                            expected: p + 1,
                            found: zmat.len(),
                        })
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn library(rows: Vec<GridRow>, grid: LibraryGrid) -> RotamerLibrary {
        RotamerLibrary {
            name: "LIG__1".to_string(),
            kind: LibraryKind::Side,
            atom_labels: vec!["_C3_".to_string(), "_O1_".to_string()],
            grid,
            rows,
        }
    }

    #[test]
    fn writes_header_labels_and_rows_in_fixed_columns() {
        let text = library(vec![vec![-6, 18], vec![6, -6]], LibraryGrid::sampled(10.0)).render();
        assert_eq!(
            text,
            "* LIG__1  2       2 10.0 0\n_C3_\n_O1_\n    -6    18\n     6    -6\n"
        );
    }

    #[test]
    fn negative_header_resolution_forbids_downsampling() {
        let text = library(vec![vec![120, -3]], LibraryGrid::ring(10.0)).render();
        assert!(text.starts_with("* LIG__1  2       1 -1.0 0\n"));
    }

    #[test]
    fn short_labels_are_right_justified() {
        let mut lib = library(vec![], LibraryGrid::sampled(15.0));
        lib.atom_labels = vec!["C1".to_string()];
        assert_eq!(lib.render(), "* LIG__1  1       0 15.0 0\n  C1\n");
    }

    #[test]
    fn from_series_quantizes_and_sorts_rows() {
        let series = vec![vec![10.0], vec![12.0], vec![190.0]];
        let lib = RotamerLibrary::from_series(
            "LIG__1".to_string(),
            LibraryKind::Side,
            vec!["_C2_".to_string()],
            LibraryGrid::sampled(15.0),
            &series,
        );
        assert_eq!(lib.rows, vec![vec![-11], vec![1]]);
    }

    #[test]
    fn ring_grid_merges_conformers_closer_than_sampling_resolution() {
        let series = vec![vec![30.0], vec![33.0], vec![-30.0]];
        let lib = RotamerLibrary::from_series(
            "LIG_R1".to_string(),
            LibraryKind::Side,
            vec!["_C4_".to_string()],
            LibraryGrid::ring(10.0),
            &series,
        );
        assert_eq!(lib.rows, vec![vec![-30], vec![30]]);
    }

    #[test]
    fn library_names_follow_legacy_patterns() {
        assert_eq!(group_library_name("LIG", 0), "LIG__1");
        assert_eq!(group_library_name("LIG", 11), "LIG_12");
        assert_eq!(group_library_name("AB", 2), " AB__3");
        assert_eq!(ring_library_name("LIG", 2), "LIG_R2");
        assert_eq!(backbone_library_name("XAA"), "XAA__B");
    }

    #[test]
    fn file_name_uses_kind_extension() {
        let mut lib = library(vec![], LibraryGrid::sampled(10.0));
        assert_eq!(lib.file_name(), "LIG__1.side");
        lib.name = "XAA__B".to_string();
        lib.kind = LibraryKind::Back;
        assert_eq!(lib.file_name(), "XAA__B.back");
    }

    #[test]
    fn torsion_series_reads_dihedral_of_each_conformer() {
        let frame = |z: f64| {
            vec![
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, z),
            ]
        };
        let conformers = ConformerSet::from_frames(vec![frame(0.0), frame(1e6)]).unwrap();
        let ordering = [0, 1, 2, 3];
        let parent = [None, Some(0), Some(1), Some(2)];
        let series = torsion_series(&conformers, &ordering, &parent, &[3]).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series[0][0].abs() < 1e-9);
        assert!((series[1][0] + 90.0).abs() < 1e-3);
    }
}
