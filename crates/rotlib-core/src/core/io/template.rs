use crate::core::geometry::zmatrix::{self, ConversionError, InternalCoord};
use crate::core::io::traits::{InputFile, TextArtifact};
use crate::core::models::molecule::MoleculeGraph;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const ATOM_FIELDS: usize = 9;
const COUNTS_FIRST_LINE: usize = 16;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: TemplateParseErrorKind,
    },
    #[error("Template ended before the '{0}' section was complete")]
    MissingSection(&'static str),
    #[error("Template has {template} atoms but the molecule has {molecule}")]
    AtomCountMismatch { template: usize, molecule: usize },
    #[error("Atom '{0}' has no counterpart of the same name")]
    UnmatchedAtom(String),
    #[error("Tree ordering is not a permutation of the {atom_count} template atoms")]
    InvalidOrdering { atom_count: usize },
    #[error("Tree describes {found} positions but the template has {expected} atoms")]
    TreeSizeMismatch { expected: usize, found: usize },
    #[error("Coordinate conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}

#[derive(Debug, Error, PartialEq)]
pub enum TemplateParseErrorKind {
    #[error("Expected '<name> <atoms> <bonds> <angles>' counts line")]
    MalformedCounts,
    #[error("Atom line has {found} fields, expected at least 9")]
    AtomFieldCount { found: usize },
    #[error("Invalid integer '{0}'")]
    InvalidInt(String),
    #[error("Invalid float '{0}'")]
    InvalidFloat(String),
    #[error("Atom index {index} is out of range for {atom_count} atoms")]
    IndexOutOfRange { index: i64, atom_count: usize },
    #[error("Expected the '{expected}' section header, found '{found}'")]
    UnexpectedSection {
        expected: &'static str,
        found: String,
    },
    #[error("Record has fewer than {0} atom indices")]
    MissingIndices(usize),
}

/// One atom line of a z-matrix template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateAtom {
    /// Parent atom (0-based); `None` for the root.
    pub parent: Option<usize>,
    pub atom_type: String,
    /// 4-column label as written in the template (`"_C1_"`).
    pub name: String,
    /// Force-field class column, copied through untouched.
    pub mat: String,
    pub coord: InternalCoord,
}

/// A record whose leading atom indices get renumbered; the rest of the line is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
struct IndexedRecord {
    indices: Vec<i64>,
    rest: String,
}

#[derive(Debug, Clone, PartialEq)]
enum DihedralLine {
    Record(IndexedRecord),
    Verbatim(String),
}

/// A residue template in the docking engine's z-matrix format.
#[derive(Debug, Clone, PartialEq)]
pub struct ZmatTemplate {
    /// Comment lines followed by the counts line, verbatim.
    header: Vec<String>,
    pub residue: String,
    pub atoms: Vec<TemplateAtom>,
    /// Excluded partners of each atom, 1-based, zero padding removed.
    exclusions: Vec<Vec<usize>>,
    nonbonded_header: String,
    nonbonded: Vec<IndexedRecord>,
    bond_header: String,
    bonds: Vec<IndexedRecord>,
    angle_header: String,
    angles: Vec<IndexedRecord>,
    dihedral_header: String,
    dihedrals: Vec<DihedralLine>,
    end: Option<String>,
}

/// A template rewritten for a new tree, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderedTemplate {
    lines: Vec<String>,
}

impl TextArtifact for ReorderedTemplate {
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        for line in &self.lines {
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    }
}

pub struct ZmatTemplateFile;

struct LineCursor<I> {
    lines: I,
    line: usize,
}

impl<I: Iterator<Item = io::Result<String>>> LineCursor<I> {
    fn try_next(&mut self) -> Result<Option<String>, TemplateError> {
        match self.lines.next() {
            Some(line) => {
                self.line += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    fn next(&mut self, section: &'static str) -> Result<String, TemplateError> {
        self.try_next()?.ok_or(TemplateError::MissingSection(section))
    }

    fn error(&self, kind: TemplateParseErrorKind) -> TemplateError {
        TemplateError::Parse {
            line: self.line,
            kind,
        }
    }

    fn section_header(&mut self, expected: &'static str) -> Result<String, TemplateError> {
        let line = self.next(expected)?;
        let found = if expected == "PHI" {
            line.starts_with(expected)
        } else {
            line.contains(expected)
        };
        if !found {
            return Err(self.error(TemplateParseErrorKind::UnexpectedSection {
                expected,
                found: line,
            }));
        }
        Ok(line)
    }

    fn record(
        &mut self,
        section: &'static str,
        count: usize,
        atom_count: usize,
        allow_negative: bool,
    ) -> Result<IndexedRecord, TemplateError> {
        let line = self.next(section)?;
        self.parse_record(&line, count, atom_count, allow_negative)
    }

    fn parse_record(
        &self,
        line: &str,
        count: usize,
        atom_count: usize,
        allow_negative: bool,
    ) -> Result<IndexedRecord, TemplateError> {
        let mut rest = line;
        let mut indices = Vec::with_capacity(count);
        for _ in 0..count {
            let trimmed = rest.trim_start();
            let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
            if end == 0 {
                return Err(self.error(TemplateParseErrorKind::MissingIndices(count)));
            }
            let token = &trimmed[..end];
            let index: i64 = token
                .parse()
                .map_err(|_| self.error(TemplateParseErrorKind::InvalidInt(token.to_string())))?;
            let in_range = index != 0
                && index.unsigned_abs() as usize <= atom_count
                && (allow_negative || index > 0);
            if !in_range {
                return Err(self.error(TemplateParseErrorKind::IndexOutOfRange {
                    index,
                    atom_count,
                }));
            }
            indices.push(index);
            rest = &trimmed[end..];
        }
        Ok(IndexedRecord {
            indices,
            rest: rest.to_string(),
        })
    }

    fn int(&self, token: &str) -> Result<usize, TemplateError> {
        token
            .parse()
            .map_err(|_| self.error(TemplateParseErrorKind::InvalidInt(token.to_string())))
    }

    fn float(&self, token: &str) -> Result<f64, TemplateError> {
        token
            .parse()
            .map_err(|_| self.error(TemplateParseErrorKind::InvalidFloat(token.to_string())))
    }
}

impl InputFile for ZmatTemplateFile {
    type Output = ZmatTemplate;
    type Error = TemplateError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut cursor = LineCursor {
            lines: reader.lines(),
            line: 0,
        };

        let mut header = Vec::new();
        let counts_line = loop {
            let line = cursor.next("header")?;
            header.push(line.clone());
            if !line.starts_with('*') {
                break line;
            }
        };
        let counts: Vec<&str> = counts_line.split_whitespace().collect();
        if counts.len() < 4 {
            return Err(cursor.error(TemplateParseErrorKind::MalformedCounts));
        }
        let parse_count = |token: &str| {
            token
                .parse::<usize>()
                .map_err(|_| cursor.error(TemplateParseErrorKind::MalformedCounts))
        };
        let residue = counts[0].to_string();
        let atom_count = parse_count(counts[1])?;
        let bond_count = parse_count(counts[2])?;
        let angle_count = parse_count(counts[3])?;

        let mut atoms = Vec::with_capacity(atom_count);
        for _ in 0..atom_count {
            let line = cursor.next("atoms")?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < ATOM_FIELDS {
                return Err(cursor.error(TemplateParseErrorKind::AtomFieldCount {
                    found: fields.len(),
                }));
            }
            let parent = cursor.int(fields[1])?;
            if parent > atom_count {
                return Err(cursor.error(TemplateParseErrorKind::IndexOutOfRange {
                    index: parent as i64,
                    atom_count,
                }));
            }
            atoms.push(TemplateAtom {
                parent: parent.checked_sub(1),
                atom_type: fields[3].to_string(),
                name: fields[4].to_string(),
                mat: fields[5].to_string(),
                coord: InternalCoord::new(
                    cursor.float(fields[6])?,
                    cursor.float(fields[7])?,
                    cursor.float(fields[8])?,
                ),
            });
        }

        let mut seen_counts = 0;
        while seen_counts < atom_count {
            let line = cursor.next("exclusion counts")?;
            for token in line.split_whitespace() {
                cursor.int(token)?;
                seen_counts += 1;
            }
        }

        let mut exclusions = Vec::with_capacity(atom_count);
        for _ in 0..atom_count {
            let line = cursor.next("exclusions")?;
            let mut partners = Vec::new();
            for token in line.split_whitespace() {
                let partner = cursor.int(token)?;
                if partner > atom_count {
                    return Err(cursor.error(TemplateParseErrorKind::IndexOutOfRange {
                        index: partner as i64,
                        atom_count,
                    }));
                }
                if partner != 0 {
                    partners.push(partner);
                }
            }
            exclusions.push(partners);
        }

        let nonbonded_header = cursor.section_header("NBON")?;
        let nonbonded = (0..atom_count)
            .map(|_| cursor.record("NBON", 1, atom_count, false))
            .collect::<Result<Vec<_>, _>>()?;

        let bond_header = cursor.section_header("BOND")?;
        let bonds = (0..bond_count)
            .map(|_| cursor.record("BOND", 2, atom_count, false))
            .collect::<Result<Vec<_>, _>>()?;

        let angle_header = cursor.section_header("THET")?;
        let angles = (0..angle_count)
            .map(|_| cursor.record("THET", 3, atom_count, false))
            .collect::<Result<Vec<_>, _>>()?;

        let dihedral_header = cursor.section_header("PHI")?;
        let mut dihedrals = Vec::new();
        let mut end = None;
        while let Some(line) = cursor.try_next()? {
            if line.contains("END") {
                end = Some(line);
                break;
            }
            if line.contains("IPHI") || line.trim().is_empty() {
                dihedrals.push(DihedralLine::Verbatim(line));
            } else {
                let record = cursor.parse_record(&line, 4, atom_count, true)?;
                dihedrals.push(DihedralLine::Record(record));
            }
        }

        Ok(ZmatTemplate {
            header,
            residue,
            atoms,
            exclusions,
            nonbonded_header,
            nonbonded,
            bond_header,
            bonds,
            angle_header,
            angles,
            dihedral_header,
            dihedrals,
            end,
        })
    }
}

impl ZmatTemplate {
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Template index of every molecule atom, matched by name.
    ///
    /// # Errors
    ///
    /// Fails when the atom counts differ or any atom on either side has no partner.
    pub fn match_molecule(&self, molecule: &MoleculeGraph) -> Result<Vec<usize>, TemplateError> {
        if self.atoms.len() != molecule.atom_count() {
            return Err(TemplateError::AtomCountMismatch {
                template: self.atoms.len(),
                molecule: molecule.atom_count(),
            });
        }

        let mut molecule_to_template = vec![None; self.atoms.len()];
        for (t, atom) in self.atoms.iter().enumerate() {
            let m = molecule
                .find_by_template_name(&atom.name)
                .or_else(|| molecule.find_atom(&atom.name.replace('_', " ")))
                .ok_or_else(|| TemplateError::UnmatchedAtom(atom.name.clone()))?;
            molecule_to_template[m] = Some(t);
        }

        molecule_to_template
            .into_iter()
            .zip(molecule.atoms())
            .map(|(t, atom)| t.ok_or_else(|| TemplateError::UnmatchedAtom(atom.template_name())))
            .collect()
    }

    /// Rewrites the template in a new tree order.
    ///
    /// `ordering[p]` is the template atom placed at position `p`, `parent[p]` its parent
    /// position and `rank[p]` its rank; rank-0 atoms are written as main chain (`M`).
    /// With an `r_group_root` (a template atom index), atoms placed before that root are also
    /// kept on the main chain so only the R-group is sampled.
    /// Internal coordinates are rebuilt for the new parents and every atom reference in the
    /// exclusion, bond, angle and dihedral sections is renumbered.
    ///
    /// # Errors
    ///
    /// Fails when the tree does not describe a permutation of the template atoms.
    pub fn reorder(
        &self,
        ordering: &[usize],
        parent: &[Option<usize>],
        rank: &[usize],
        r_group_root: Option<usize>,
    ) -> Result<ReorderedTemplate, TemplateError> {
        let n = self.atoms.len();
        for found in [ordering.len(), parent.len(), rank.len()] {
            if found != n {
                return Err(TemplateError::TreeSizeMismatch { expected: n, found });
            }
        }
        let mut new_position = vec![usize::MAX; n];
        for (position, &old) in ordering.iter().enumerate() {
            if old >= n || new_position[old] != usize::MAX {
                return Err(TemplateError::InvalidOrdering { atom_count: n });
            }
            new_position[old] = position;
        }
        let renumber = |index: i64| -> i64 {
            let moved = new_position[index.unsigned_abs() as usize - 1] as i64 + 1;
            if index < 0 { -moved } else { moved }
        };

        let old_parent: Vec<Option<usize>> = self.atoms.iter().map(|a| a.parent).collect();
        let old_zmat: Vec<InternalCoord> = self.atoms.iter().map(|a| a.coord).collect();
        let cart = zmatrix::internal_to_cartesian(&old_zmat, &old_parent)?;
        let zmat = zmatrix::cartesian_to_internal(&cart, ordering, parent)?;

        let mut lines = self.header.clone();
        let mut main_chain = r_group_root.is_some();
        for (i, &old) in ordering.iter().enumerate() {
            let atom = &self.atoms[old];
            if Some(old) == r_group_root {
                main_chain = false;
            }
            let flag = if rank[i] == 0 || main_chain { " M" } else { " S" };
            lines.push(format!(
                "{:>5}{:>6}{}   {:<5}{:<4}{:>6}{:12.6}{:12.6}{:12.6}",
                i + 1,
                parent[i].map_or(0, |p| p + 1),
                flag,
                atom.atom_type,
                atom.name,
                atom.mat,
                zmat[i].bond_length,
                zmat[i].bond_angle,
                zmat[i].torsion
            ));
        }

        let mut exclude: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (old, partners) in self.exclusions.iter().enumerate() {
            let i_atom = new_position[old] + 1;
            for &partner in partners {
                let j_atom = new_position[partner - 1] + 1;
                if i_atom < j_atom {
                    exclude[i_atom - 1].push(j_atom);
                } else {
                    exclude[j_atom - 1].push(i_atom);
                }
            }
        }
        for partners in exclude.iter_mut().filter(|p| p.is_empty()) {
            partners.push(0);
        }

        let mut counts = String::new();
        for (i, partners) in exclude.iter().enumerate() {
            counts.push_str(&format!("{:>4}", partners.len()));
            if i != 0 && i % COUNTS_FIRST_LINE == 0 {
                lines.push(std::mem::take(&mut counts));
            }
        }
        if !counts.is_empty() {
            lines.push(counts);
        }
        for partners in &exclude {
            lines.push(partners.iter().map(|p| format!("{:>6}", p)).collect());
        }

        lines.push(self.nonbonded_header.clone());
        for (i, &old) in ordering.iter().enumerate() {
            lines.push(format!("{:>6}{}", i + 1, self.nonbonded[old].rest));
        }

        lines.push(self.bond_header.clone());
        lines.extend(self.bonds.iter().map(|r| renumbered(r, renumber)));
        lines.push(self.angle_header.clone());
        lines.extend(self.angles.iter().map(|r| renumbered(r, renumber)));
        lines.push(self.dihedral_header.clone());
        for line in &self.dihedrals {
            lines.push(match line {
                DihedralLine::Record(record) => renumbered(record, renumber),
                DihedralLine::Verbatim(text) => text.clone(),
            });
        }
        if let Some(end) = &self.end {
            lines.push(end.clone());
        }

        Ok(ReorderedTemplate { lines })
    }
}

fn renumbered(record: &IndexedRecord, renumber: impl Fn(i64) -> i64) -> String {
    let mut line: String = record
        .indices
        .iter()
        .map(|&i| format!("{:>6}", renumber(i)))
        .collect();
    line.push_str(&record.rest);
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::topology::Bond;
    use std::io::BufReader;

    const BUTANE: &str = "\
* butane test template
* generated by hand
BUT     4    3    2    1    0
    1    0 M   C    _C1_    1    1.530000  109.500000   60.000000
    2    1 M   C    _C2_    1    1.530000  109.500000  180.000000
    3    2 S   C    _C3_    1    1.530000  109.500000   60.000000
    4    3 S   C    _C4_    1    1.530000  109.500000  -60.000000
   3   2   1   1
     2     3     4
     3     4
     4
     0
NBON
    1   0.1000   3.5000   0.0000
    2   0.2000   3.5000   0.0000
    3   0.3000   3.5000   0.0000
    4   0.4000   3.5000   0.0000
BOND
    1    2   1.5300
    2    3   1.5300
    3    4   1.5300
THET
    1    2    3  109.5000
    2    3    4  109.5000
PHI
    1    2    3    4   0.7000  1  3
   -1    2    3    4   0.2000  2  0
IPHI
END
";

    fn parse(text: &str) -> Result<ZmatTemplate, TemplateError> {
        ZmatTemplateFile::read_from(&mut BufReader::new(text.as_bytes()))
    }

    fn reversed() -> ReorderedTemplate {
        parse(BUTANE)
            .unwrap()
            .reorder(&[3, 2, 1, 0], &[None, Some(0), Some(1), Some(2)], &[0, 0, 1, 1], None)
            .unwrap()
    }

    fn cartesian(template: &ZmatTemplate) -> Vec<nalgebra::Point3<f64>> {
        let parent: Vec<_> = template.atoms.iter().map(|a| a.parent).collect();
        let zmat: Vec<_> = template.atoms.iter().map(|a| a.coord).collect();
        zmatrix::internal_to_cartesian(&zmat, &parent).unwrap()
    }

    #[test]
    fn reads_atoms_and_parents() {
        let template = parse(BUTANE).unwrap();
        assert_eq!(template.residue, "BUT");
        assert_eq!(template.atom_count(), 4);
        assert_eq!(template.atoms[0].parent, None);
        assert_eq!(template.atoms[3].parent, Some(2));
        assert_eq!(template.atoms[2].name, "_C3_");
        assert_eq!(template.atoms[3].coord.torsion, -60.0);
    }

    #[test]
    fn reorder_writes_atom_lines_in_fixed_columns() {
        let text = reversed().render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "* butane test template");
        assert_eq!(lines[2], "BUT     4    3    2    1    0");
        assert!(lines[3].starts_with("    1     0 M   C    _C4_     1"));
        assert!(lines[5].starts_with("    3     2 S   C    _C2_     1"));
        assert_eq!(&lines[4][31..43], "    1.530000");
    }

    #[test]
    fn reorder_keeps_atoms_before_r_group_root_on_main_chain() {
        let text = parse(BUTANE)
            .unwrap()
            .reorder(&[0, 1, 2, 3], &[None, Some(0), Some(1), Some(2)], &[0, 1, 2, 3], Some(2))
            .unwrap()
            .render();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[3].starts_with("    1     0 M   C    _C1_"));
        assert!(lines[4].starts_with("    2     1 M   C    _C2_"));
        assert!(lines[5].starts_with("    3     2 S   C    _C3_"));
        assert!(lines[6].starts_with("    4     3 S   C    _C4_"));
    }

    #[test]
    fn reorder_renumbers_exclusions_into_lower_partner() {
        let text = reversed().render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[7], "   3   2   1   1");
        assert_eq!(lines[8], "     4     3     2");
        assert_eq!(lines[9], "     4     3");
        assert_eq!(lines[10], "     4");
        assert_eq!(lines[11], "     0");
    }

    #[test]
    fn reorder_renumbers_bonded_sections() {
        let text = reversed().render();
        assert!(text.contains("NBON\n     1   0.4000   3.5000   0.0000\n"));
        assert!(text.contains("BOND\n     4     3   1.5300\n     3     2   1.5300\n     2     1   1.5300\nTHET"));
        assert!(text.contains("THET\n     4     3     2  109.5000\n"));
        assert!(text.contains("PHI\n     4     3     2     1   0.7000  1  3\n"));
        assert!(text.contains("    -4     3     2     1   0.2000  2  0\nIPHI\nEND\n"));
    }

    #[test]
    fn reorder_preserves_geometry() {
        let original = parse(BUTANE).unwrap();
        let rewritten = parse(&reversed().render()).unwrap();
        let before = cartesian(&original);
        let after = cartesian(&rewritten);
        for i in 0..4 {
            for j in 0..4 {
                let d_before = (before[i] - before[j]).norm();
                let d_after = (after[3 - i] - after[3 - j]).norm();
                assert!((d_before - d_after).abs() < 1e-4, "pair {} {}", i, j);
            }
        }
    }

    #[test]
    fn exclusion_counts_wrap_after_first_seventeen() {
        let n = 18;
        let mut text = String::from("LIN    18    0    0\n");
        for i in 1..=n {
            text.push_str(&format!(
                "{:>5}{:>5} M   C    C{:<3}    1    1.500000  110.000000  180.000000\n",
                i,
                i - 1,
                i
            ));
        }
        text.push_str(&"   1".repeat(n));
        text.push('\n');
        for _ in 0..n {
            text.push_str("     0\n");
        }
        text.push_str("NBON\n");
        for i in 1..=n {
            text.push_str(&format!("{:>5}   0.1000\n", i));
        }
        text.push_str("BOND\nTHET\nPHI\nEND\n");

        let template = parse(&text).unwrap();
        let ordering: Vec<usize> = (0..n).collect();
        let parent: Vec<Option<usize>> = (0..n).map(|i| i.checked_sub(1)).collect();
        let reordered = template.reorder(&ordering, &parent, &vec![0; n], None).unwrap().render();
        let lines: Vec<&str> = reordered.lines().collect();
        assert_eq!(lines[1 + n], "   1".repeat(17));
        assert_eq!(lines[2 + n], "   1");
        assert_eq!(lines[3 + n], "     0");
    }

    #[test]
    fn rejects_missing_section_header() {
        let broken = BUTANE.replace("NBON", "NONB");
        assert!(matches!(
            parse(&broken),
            Err(TemplateError::Parse {
                kind: TemplateParseErrorKind::UnexpectedSection { expected: "NBON", .. },
                ..
            })
        ));
    }

    #[test]
    fn rejects_truncated_template() {
        let truncated: String = BUTANE.lines().take(9).map(|l| format!("{}\n", l)).collect();
        assert!(matches!(
            parse(&truncated),
            Err(TemplateError::MissingSection(_))
        ));
    }

    #[test]
    fn rejects_malformed_counts_line() {
        assert!(matches!(
            parse("* only comments\nBUT four\n"),
            Err(TemplateError::Parse {
                line: 2,
                kind: TemplateParseErrorKind::MalformedCounts
            })
        ));
    }

    #[test]
    fn rejects_bond_to_missing_atom() {
        let broken = BUTANE.replace("    3    4   1.5300", "    3    9   1.5300");
        assert!(matches!(
            parse(&broken),
            Err(TemplateError::Parse {
                kind: TemplateParseErrorKind::IndexOutOfRange { index: 9, .. },
                ..
            })
        ));
    }

    #[test]
    fn reorder_rejects_non_permutation() {
        let template = parse(BUTANE).unwrap();
        assert!(matches!(
            template.reorder(&[0, 0, 1, 2], &[None, Some(0), Some(1), Some(2)], &[0; 4], None),
            Err(TemplateError::InvalidOrdering { atom_count: 4 })
        ));
    }

    #[test]
    fn matches_molecule_atoms_by_name() {
        let atoms = ["C3", "C1", "C4", "C2"]
            .iter()
            .enumerate()
            .map(|(i, name)| Atom::new(i, Element::C, name, "BUT"))
            .collect();
        let molecule =
            MoleculeGraph::new(atoms, [(1, 3), (3, 0), (0, 2)].map(Bond::from)).unwrap();
        let template = parse(BUTANE).unwrap();
        assert_eq!(template.match_molecule(&molecule).unwrap(), vec![2, 0, 3, 1]);
    }

    #[test]
    fn match_reports_unknown_atom() {
        let atoms = ["C1", "C2", "C3", "CX"]
            .iter()
            .enumerate()
            .map(|(i, name)| Atom::new(i, Element::C, name, "BUT"))
            .collect();
        let molecule =
            MoleculeGraph::new(atoms, [(0, 1), (1, 2), (2, 3)].map(Bond::from)).unwrap();
        assert!(matches!(
            parse(BUTANE).unwrap().match_molecule(&molecule),
            Err(TemplateError::UnmatchedAtom(name)) if name == "_C4_"
        ));
    }
}
