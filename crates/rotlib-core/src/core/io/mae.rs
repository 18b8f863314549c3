use crate::core::io::traits::InputFile;
use crate::core::models::atom::{Atom, Element};
use crate::core::models::conformer::{ConformerSet, ConformerSizeError};
use crate::core::models::molecule::{GraphError, MoleculeGraph};
use crate::core::models::topology::Bond;
use nalgebra::Point3;
use phf::{Set, phf_set};
use std::io::{self, BufRead};
use std::str::FromStr;
use thiserror::Error;

/// Residues that cap a peptide fragment and never belong to the library.
static CAPPING_RESIDUES: Set<&'static str> = phf_set! { "ACE", "NMA" };

#[derive(Debug, Error)]
pub enum MaeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: MaeParseErrorKind },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error("Invalid molecule topology: {0}")]
    Graph(#[from] GraphError),
    #[error("Invalid conformer: {0}")]
    Conformer(#[from] ConformerSizeError),
}

#[derive(Debug, Error)]
pub enum MaeParseErrorKind {
    #[error("Invalid integer in column '{column}' (value: '{value}')")]
    InvalidInt { column: String, value: String },
    #[error("Invalid float in column '{column}' (value: '{value}')")]
    InvalidFloat { column: String, value: String },
    #[error("Row has {found} fields, expected {expected}")]
    FieldCount { expected: usize, found: usize },
    #[error("Unterminated quoted value")]
    UnterminatedQuote,
    #[error("Malformed table header '{0}'")]
    MalformedHeader(String),
    #[error("File ended inside the '{0}' table")]
    UnexpectedEnd(String),
}

/// The molecule and every geometry stored in a structure file.
///
/// The first connection table defines the topology; each connection table (the first
/// included) contributes one conformer.
#[derive(Debug, Clone, PartialEq)]
pub struct MaeStructure {
    pub molecule: MoleculeGraph,
    pub conformers: ConformerSet,
}

pub struct MaeFile;

#[derive(Debug, Default)]
struct Table {
    keys: Vec<String>,
    rows: Vec<(usize, Vec<String>)>,
}

impl Table {
    fn column(&self, matches: impl Fn(&str) -> bool) -> Option<usize> {
        self.keys.iter().position(|k| matches(&k.to_lowercase()))
    }
}

#[derive(Debug, Default)]
struct ConnectionTable {
    atoms: Option<Table>,
    bonds: Option<Table>,
}

#[derive(Debug)]
struct RawAtom {
    name: String,
    residue_name: String,
    element: Element,
    position: Point3<f64>,
}

type NumberedLines<'a, R> = std::iter::Enumerate<io::Lines<&'a mut R>>;

impl InputFile for MaeFile {
    type Output = MaeStructure;
    type Error = MaeError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut tables: Vec<ConnectionTable> = Vec::new();
        let mut lines = reader.lines().enumerate();

        while let Some((line_num, line_res)) = lines.next() {
            let line = line_res?;
            let line_num = line_num + 1;
            let trimmed = line.trim();

            if trimmed.starts_with("f_m_ct") && trimmed.ends_with('{') {
                tables.push(ConnectionTable::default());
            } else if let Some(declared) = table_header(trimmed, "m_atom", line_num)? {
                let table = read_table(&mut lines, declared, "m_atom")?;
                current(&mut tables).atoms = Some(table);
            } else if let Some(declared) = table_header(trimmed, "m_bond", line_num)? {
                let table = read_table(&mut lines, declared, "m_bond")?;
                current(&mut tables).bonds = Some(table);
            }
        }

        let tables: Vec<ConnectionTable> = tables.into_iter().filter(|t| t.atoms.is_some()).collect();
        let Some(first) = tables.first() else {
            return Err(MaeError::MissingRecord("m_atom table".into()));
        };

        let raw_atoms = parse_atoms(first)?;
        let keep: Vec<bool> = raw_atoms
            .iter()
            .map(|a| !CAPPING_RESIDUES.contains(a.residue_name.trim()))
            .collect();
        let mut new_index = vec![None; raw_atoms.len()];
        let mut atoms = Vec::new();
        for (old, raw) in raw_atoms.iter().enumerate() {
            if keep[old] {
                new_index[old] = Some(atoms.len());
                atoms.push(Atom::new(atoms.len(), raw.element, &raw.name, &raw.residue_name));
            }
        }
        if atoms.is_empty() {
            return Err(MaeError::Inconsistency(
                "no atoms remain after removing capping residues".into(),
            ));
        }

        let bonds = match &first.bonds {
            Some(table) => parse_bonds(table, &new_index)?,
            None => Vec::new(),
        };
        let molecule = MoleculeGraph::new(atoms, bonds)?;

        let mut conformers = ConformerSet::new(molecule.atom_count());
        for (ct_index, ct) in tables.iter().enumerate() {
            let frame_atoms = if ct_index == 0 {
                None
            } else {
                Some(parse_atoms(ct)?)
            };
            let source = frame_atoms.as_ref().unwrap_or(&raw_atoms);
            if source.len() != raw_atoms.len() {
                return Err(MaeError::Inconsistency(format!(
                    "connection table {} has {} atoms, the first has {}",
                    ct_index + 1,
                    source.len(),
                    raw_atoms.len()
                )));
            }
            let frame = source
                .iter()
                .zip(&keep)
                .filter(|(_, kept)| **kept)
                .map(|(atom, _)| atom.position)
                .collect();
            conformers.push(frame)?;
        }

        Ok(MaeStructure {
            molecule,
            conformers,
        })
    }
}

fn current(tables: &mut Vec<ConnectionTable>) -> &mut ConnectionTable {
    if tables.is_empty() {
        tables.push(ConnectionTable::default());
    }
    let last = tables.len() - 1;
    &mut tables[last]
}

/// Recognizes `name[N] {` and returns the declared row count.
fn table_header(trimmed: &str, name: &str, line: usize) -> Result<Option<usize>, MaeError> {
    let Some(rest) = trimmed.strip_prefix(name) else {
        return Ok(None);
    };
    let Some(rest) = rest.strip_prefix('[') else {
        return Ok(None);
    };
    let malformed = || MaeError::Parse {
        line,
        kind: MaeParseErrorKind::MalformedHeader(trimmed.to_string()),
    };
    let (count, tail) = rest.split_once(']').ok_or_else(malformed)?;
    if tail.trim() != "{" {
        return Err(malformed());
    }
    count.trim().parse().map(Some).map_err(|_| malformed())
}

fn read_table<R: BufRead>(
    lines: &mut NumberedLines<'_, R>,
    declared: usize,
    name: &str,
) -> Result<Table, MaeError> {
    let mut table = Table::default();
    let mut last_line = 0;

    let mut in_rows = false;
    loop {
        let Some((line_num, line_res)) = lines.next() else {
            return Err(MaeError::Parse {
                line: last_line + 1,
                kind: MaeParseErrorKind::UnexpectedEnd(name.to_string()),
            });
        };
        let line = line_res?;
        let line_num = line_num + 1;
        last_line = line_num;
        let trimmed = line.trim();

        if trimmed == ":::" {
            if in_rows {
                break;
            }
            in_rows = true;
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        if !in_rows {
            if !trimmed.starts_with('#') {
                table.keys.push(trimmed.to_string());
            }
            continue;
        }

        let tokens = tokenize(trimmed).map_err(|kind| MaeError::Parse {
            line: line_num,
            kind,
        })?;
        // The leading token of every row is the 1-based row index.
        if tokens.len() != table.keys.len() + 1 {
            return Err(MaeError::Parse {
                line: line_num,
                kind: MaeParseErrorKind::FieldCount {
                    expected: table.keys.len() + 1,
                    found: tokens.len(),
                },
            });
        }
        table.rows.push((line_num, tokens[1..].to_vec()));
    }

    if table.rows.len() != declared {
        return Err(MaeError::Inconsistency(format!(
            "{} table declares {} rows but contains {}",
            name,
            declared,
            table.rows.len()
        )));
    }
    Ok(table)
}

fn tokenize(line: &str) -> Result<Vec<String>, MaeParseErrorKind> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            token.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => token.push(c),
                }
            }
            if !closed {
                return Err(MaeParseErrorKind::UnterminatedQuote);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }
    Ok(tokens)
}

fn parse_atoms(ct: &ConnectionTable) -> Result<Vec<RawAtom>, MaeError> {
    let Some(table) = &ct.atoms else {
        return Err(MaeError::MissingRecord("m_atom table".into()));
    };
    let required = |key: &str| {
        table
            .column(|k| k == key)
            .ok_or_else(|| MaeError::MissingRecord(format!("m_atom column '{}'", key)))
    };
    let x_col = required("r_m_x_coord")?;
    let y_col = required("r_m_y_coord")?;
    let z_col = required("r_m_z_coord")?;
    let residue_col = table
        .column(|k| k.contains("pdb") && k.contains("res") && k.contains("name"))
        .ok_or_else(|| MaeError::MissingRecord("m_atom PDB residue name column".into()))?;
    let name_col = table
        .column(|k| k.contains("pdb") && k.contains("atom") && k.contains("name"))
        .ok_or_else(|| MaeError::MissingRecord("m_atom PDB atom name column".into()))?;
    let element_col = table.column(|k| k == "i_m_atomic_number");

    table
        .rows
        .iter()
        .map(|(line, values)| -> Result<RawAtom, MaeError> {
            let name = values[name_col].clone();
            let element = match element_col {
                // Dummy atoms carry a non-positive atomic number.
                Some(col) => {
                    let number: i32 = parse_int(&values[col], &table.keys[col], *line)?;
                    u32::try_from(number).map_or(Element::Unknown, Element::from_atomic_number)
                }
                None => Element::from_atom_name(&name),
            };
            Ok(RawAtom {
                position: Point3::new(
                    parse_float(&values[x_col], &table.keys[x_col], *line)?,
                    parse_float(&values[y_col], &table.keys[y_col], *line)?,
                    parse_float(&values[z_col], &table.keys[z_col], *line)?,
                ),
                residue_name: values[residue_col].clone(),
                name,
                element,
            })
        })
        .collect()
}

fn parse_bonds(table: &Table, new_index: &[Option<usize>]) -> Result<Vec<Bond>, MaeError> {
    let from_col = table
        .column(|k| k == "i_m_from")
        .ok_or_else(|| MaeError::MissingRecord("m_bond 'from' column".into()))?;
    let to_col = table
        .column(|k| k == "i_m_to")
        .ok_or_else(|| MaeError::MissingRecord("m_bond 'to' column".into()))?;

    let mut bonds = Vec::new();
    for (line, values) in &table.rows {
        let from: u32 = parse_int(&values[from_col], &table.keys[from_col], *line)?;
        let to: u32 = parse_int(&values[to_col], &table.keys[to_col], *line)?;
        let lookup = |serial: u32| -> Result<Option<usize>, MaeError> {
            let slot = (serial as usize)
                .checked_sub(1)
                .and_then(|i| new_index.get(i))
                .ok_or_else(|| {
                    MaeError::Inconsistency(format!(
                        "bond on line {} references atom {} of {}",
                        line,
                        serial,
                        new_index.len()
                    ))
                })?;
            Ok(*slot)
        };
        if let (Some(a), Some(b)) = (lookup(from)?, lookup(to)?) {
            bonds.push(Bond::new(a, b));
        }
    }
    Ok(bonds)
}

fn parse_int<T: FromStr>(value: &str, column: &str, line: usize) -> Result<T, MaeError> {
    value.parse().map_err(|_| MaeError::Parse {
        line,
        kind: MaeParseErrorKind::InvalidInt {
            column: column.to_string(),
            value: value.to_string(),
        },
    })
}

fn parse_float(value: &str, column: &str, line: usize) -> Result<f64, MaeError> {
    value.parse().map_err(|_| MaeError::Parse {
        line,
        kind: MaeParseErrorKind::InvalidFloat {
            column: column.to_string(),
            value: value.to_string(),
        },
    })
}
