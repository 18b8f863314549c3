use crate::core::io::traits::TextArtifact;
use phf::{Map, phf_map};
use std::io::{self, Write};

/// Free grid libraries shipped with the docking engine, keyed by step in degrees.
static FREE_LIBRARIES: Map<u32, &'static str> = phf_map! {
    5u32 => "FREE_5",
    10u32 => "FREE10",
    15u32 => "FREE15",
    20u32 => "FREE20",
    30u32 => "FREE30",
    40u32 => "FREE40",
    45u32 => "FREE45",
    60u32 => "FREE60",
    90u32 => "FREE90",
    180u32 => "FRE180",
};

/// Name of the engine's free grid library for a resolution, if one exists.
pub fn free_library_label(resolution: f64) -> Option<&'static str> {
    if resolution <= 0.0 || resolution.fract() != 0.0 || resolution > u32::MAX as f64 {
        return None;
    }
    FREE_LIBRARIES.get(&(resolution as u32)).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentStyle {
    /// Every torsion is sampled on a free grid library.
    #[default]
    Combinatorial,
    /// One prebuilt library per group.
    Conformer,
}

/// One `sidelib` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEntry {
    /// Library applied to the bond between two atoms, by template label.
    Bond {
        library: String,
        atom_a: String,
        atom_b: String,
    },
    /// Library applied with its own atom list.
    Default { library: String },
}

/// The `<RES>.rot.assign` script that tells the engine which library drives which torsion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentScript {
    pub residue: String,
    pub style: AssignmentStyle,
    pub backbone_library: Option<String>,
    /// Entries per group, in group order; groups are separated by `newgrp`.
    pub groups: Vec<Vec<SideEntry>>,
}

impl AssignmentScript {
    pub fn new(residue: &str, style: AssignmentStyle) -> Self {
        Self {
            residue: residue.to_uppercase(),
            style,
            backbone_library: None,
            groups: Vec::new(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.rot.assign", self.residue)
    }

    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    fn write_combinatorial(&self, writer: &mut impl Write) -> io::Result<()> {
        if let Some(backbone) = &self.backbone_library {
            writeln!(writer, " backlib {} &", backbone)?;
        }
        let last = self.groups.len().saturating_sub(1);
        for (i, entries) in self.groups.iter().enumerate() {
            for entry in entries {
                match entry {
                    SideEntry::Bond {
                        library,
                        atom_a,
                        atom_b,
                    } => writeln!(writer, "   sidelib {} {} {} &", library, atom_a, atom_b)?,
                    SideEntry::Default { library } => {
                        writeln!(writer, "   sidelib {}  default &", library)?
                    }
                }
            }
            if i != last {
                writeln!(writer, "     newgrp &")?;
            }
        }
        Ok(())
    }

    fn write_conformer(&self, writer: &mut impl Write) -> io::Result<()> {
        if let Some(backbone) = &self.backbone_library {
            writeln!(writer, " backlib {} &", backbone)?;
        }
        for (i, entries) in self.groups.iter().enumerate() {
            if i != 0 {
                writeln!(writer, "  newgrp &")?;
            }
            for entry in entries {
                match entry {
                    SideEntry::Bond {
                        library,
                        atom_a,
                        atom_b,
                    } => writeln!(writer, "  sidelib {} {} {} &", library, atom_a, atom_b)?,
                    SideEntry::Default { library } => {
                        writeln!(writer, "  sidelib {} default &", library)?
                    }
                }
            }
        }
        Ok(())
    }
}

impl TextArtifact for AssignmentScript {
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "rot assign res {} &", self.residue)?;
        match self.style {
            AssignmentStyle::Combinatorial => self.write_combinatorial(writer),
            AssignmentStyle::Conformer => self.write_conformer(writer),
        }
    }
}
