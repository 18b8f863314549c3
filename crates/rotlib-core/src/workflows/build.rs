use crate::core::io::template::{ReorderedTemplate, ZmatTemplate};
use crate::core::io::traits::TextArtifact;
use crate::core::models::conformer::ConformerSet;
use crate::core::models::molecule::MoleculeGraph;
use crate::core::models::topology::{Bond, BondList, Torsion};
use crate::core::rotamers::assignment::{
    AssignmentScript, AssignmentStyle, SideEntry, free_library_label,
};
use crate::core::rotamers::library::{
    self, LibraryGrid, LibraryKind, RotamerLibrary, backbone_library_name, group_library_name,
    ring_library_name,
};
use crate::engine::config::{AtomPair, AtomSelector, BuildConfig, LibraryMode, ResidueMode, RingMode};
use crate::engine::core_selector::{BackboneAtoms, CoreSelection, CoreSelector};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::rings::{self, RingTorsions};
use crate::engine::tree::{self, AnchoredTorsion, Tree};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Parsed inputs of one build.
#[derive(Debug, Clone)]
pub struct BuildInput {
    pub molecule: MoleculeGraph,
    /// Rotatable bonds reported by the discovery step.
    pub rotatable: BondList,
    /// Sampled geometries; required for conformer libraries, ring libraries and the
    /// backbone library.
    pub conformers: Option<ConformerSet>,
    /// Residue template to rewrite in tree order.
    pub template: Option<ZmatTemplate>,
}

/// Everything a build produces.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub residue: String,
    pub selection: CoreSelection,
    pub tree: Tree,
    /// Sampled torsions in tree order.
    pub torsions: Vec<AnchoredTorsion>,
    pub libraries: Vec<RotamerLibrary>,
    pub assignment: AssignmentScript,
    pub template: Option<ReorderedTemplate>,
}

impl BuildOutput {
    /// Name of the rewritten template file: the residue name in lower case.
    pub fn template_file_name(&self) -> String {
        self.residue.to_lowercase()
    }

    /// Writes every artifact into `dir`, creating it if needed, and returns the written paths.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] naming the first path that could not be written.
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
        fs::create_dir_all(dir).map_err(|source| EngineError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::new();
        for lib in &self.libraries {
            written.push(write_artifact(dir, lib.file_name(), lib)?);
        }
        written.push(write_artifact(
            dir,
            self.assignment.file_name(),
            &self.assignment,
        )?);
        if let Some(template) = &self.template {
            written.push(write_artifact(dir, self.template_file_name(), template)?);
        }
        Ok(written)
    }
}

fn write_artifact(
    dir: &Path,
    name: String,
    artifact: &impl TextArtifact,
) -> Result<PathBuf, EngineError> {
    let path = dir.join(name);
    artifact
        .write_to_path(&path)
        .map_err(|source| EngineError::Io {
            path: path.clone(),
            source,
        })?;
    debug!("Wrote {}", path.display());
    Ok(path)
}

/// Builds the rotamer libraries, assignment script and reordered template for one residue.
///
/// # Errors
///
/// Fails with an [`EngineError`] when an atom selection does not resolve, no tree can be built,
/// conformers are required but missing, or the template does not match the molecule.
#[instrument(skip_all, name = "build_workflow")]
pub fn run(
    input: &BuildInput,
    config: &BuildConfig,
    reporter: &ProgressReporter,
) -> Result<BuildOutput, EngineError> {
    let molecule = &input.molecule;
    let residue = config
        .residue_name
        .as_deref()
        .unwrap_or_else(|| molecule.residue_name())
        .to_uppercase();
    info!(
        "Building rotamer libraries for {} ({} atoms, {} bonds).",
        residue,
        molecule.atom_count(),
        molecule.bonds().len()
    );
    if let Some(conformers) = &input.conformers {
        if conformers.atom_count() != molecule.atom_count() {
            return Err(EngineError::ConformerMismatch {
                expected: molecule.atom_count(),
                found: conformers.atom_count(),
            });
        }
    }

    // === Phase 1: Torsion discovery ===
    let discovery = reporter.phase("Torsion Discovery", || discover_torsions(input, config))?;

    // === Phase 2: Core selection ===
    let backbone_atoms = match config.residue_mode {
        ResidueMode::Ligand => None,
        ResidueMode::UnnaturalAminoAcid => Some(BackboneAtoms::locate(molecule)?),
    };
    let root = config
        .root
        .as_ref()
        .map(|selector| resolve_atom(molecule, selector))
        .transpose()?;
    let r_group_root = config
        .r_group_root
        .as_ref()
        .map(|selector| resolve_atom(molecule, selector))
        .transpose()?;
    let selection = reporter.phase("Core Selection", || {
        CoreSelector::new(molecule)
            .root(root)
            .r_group_root(r_group_root)
            .multiple_libraries(config.multiple_libraries)
            .max_torsions(config.max_torsions)
            .backbone_atoms(backbone_atoms)
            .select(discovery.sampled.clone(), discovery.backbone.clone())
    })?;
    info!(
        "Core of {} atom(s) rooted at atom {}; {} group(s), {} sampled torsion(s), {} backbone torsion(s).",
        selection.core_atoms().count(),
        selection.root,
        selection.group_count(),
        selection.sampled.len(),
        selection.backbone.len()
    );

    // === Phase 3: Tree construction ===
    let tree = reporter.phase("Tree Construction", || match &backbone_atoms {
        Some(atoms) => tree::build_backbone_tree(molecule, atoms, &selection),
        None => tree::build_tree(molecule, &selection),
    })?;
    debug!("Tree ordering {:?}", tree.ordering);

    // === Phase 4: Torsion anchoring ===
    let torsions = anchor_sampled_torsions(molecule, &tree, &selection, &discovery, config);
    // Amino acid backbones are sampled by the engine itself.
    let backbone_torsions = match backbone_atoms {
        None => tree::locate_torsions(&tree, &to_torsions(&selection.backbone, None)),
        Some(_) => Vec::new(),
    };
    info!(
        "{} torsion(s) move atoms outside the core.",
        torsions.len()
    );

    // === Phase 5: Library generation ===
    let generator = LibraryGenerator {
        molecule,
        conformers: input.conformers.as_ref(),
        tree: &tree,
        selection: &selection,
        residue: &residue,
        config,
        use_rings: discovery.use_rings,
    };
    let (libraries, assignment) = reporter.phase("Library Generation", || {
        match config.library_mode {
            LibraryMode::Conformer => generator.conformer_libraries(&torsions, reporter),
            LibraryMode::Combinatorial => {
                generator.combinatorial_libraries(&torsions, &backbone_torsions, reporter)
            }
        }
    })?;

    // === Phase 6: Template reordering ===
    let template = match &input.template {
        Some(template) => Some(reporter.phase("Template Reordering", || {
            reorder_template(template, molecule, &tree, r_group_root)
        })?),
        None => None,
    };

    info!(
        "Build complete: {} library file(s), {} assignment entries.",
        libraries.len(),
        assignment.entry_count()
    );
    Ok(BuildOutput {
        residue,
        selection,
        tree,
        torsions,
        libraries,
        assignment,
        template,
    })
}

struct Discovery {
    sampled: BondList,
    backbone: BondList,
    rings: RingTorsions,
    use_rings: bool,
}

fn discover_torsions(input: &BuildInput, config: &BuildConfig) -> Result<Discovery, EngineError> {
    let molecule = &input.molecule;
    let fixed = resolve_bonds(molecule, &config.fixed_bonds)?;
    let backbone = resolve_bonds(molecule, &config.backbone_torsions)?;

    if let Some(user) = &config.torsions {
        let sampled = resolve_bonds(molecule, user)?.without(backbone.as_slice());
        info!("Using {} user-supplied torsion(s).", sampled.len());
        return Ok(Discovery {
            sampled,
            backbone,
            rings: RingTorsions::default(),
            use_rings: false,
        });
    }

    let rings = rings::find_ring_torsions(molecule, &input.rotatable).without(fixed.as_slice());
    let mut sampled = input
        .rotatable
        .without(fixed.as_slice())
        .without(backbone.as_slice());
    let mut use_rings = config.ring_mode != RingMode::Off && !rings.is_empty();
    if config.ring_mode != RingMode::Off && rings.is_empty() {
        info!("No flexible rings found; ring sampling is disabled.");
    }
    if use_rings && config.residue_mode == ResidueMode::UnnaturalAminoAcid {
        warn!("Ring libraries are not built for amino acids; ring bonds are sampled as free torsions.");
    }

    sampled = if use_rings {
        sampled.union(rings.bonds().as_slice())
    } else {
        sampled.without(rings.bonds().as_slice())
    };
    if config.residue_mode == ResidueMode::UnnaturalAminoAcid {
        use_rings = false;
    }
    if use_rings && config.max_torsions.is_some() {
        warn!("A torsion ceiling may freeze ring torsions with unpredictable results.");
    }
    debug!(
        "{} rotatable bond(s), {} ring torsion(s) in {} ring system(s); sampling {}.",
        input.rotatable.len(),
        rings.len(),
        rings.ring_count(),
        sampled.len()
    );

    Ok(Discovery {
        sampled,
        backbone,
        rings,
        use_rings,
    })
}

fn resolve_atom(molecule: &MoleculeGraph, selector: &AtomSelector) -> Result<usize, EngineError> {
    selector
        .resolve(molecule)
        .ok_or_else(|| EngineError::AtomNotFound(selector.to_string()))
}

fn resolve_bonds(molecule: &MoleculeGraph, pairs: &[AtomPair]) -> Result<BondList, EngineError> {
    pairs
        .iter()
        .map(|(a, b)| {
            let (a, b) = (resolve_atom(molecule, a)?, resolve_atom(molecule, b)?);
            if molecule.has_bond(a, b) {
                Ok(Bond::new(a, b))
            } else {
                Err(EngineError::NotBonded { a, b })
            }
        })
        .collect()
}

fn to_torsions(bonds: &BondList, rings: Option<&RingTorsions>) -> Vec<Torsion> {
    bonds
        .iter()
        .map(|&bond| Torsion {
            ring_id: rings.map_or(0, |r| r.ring_of(&bond)),
            ..Torsion::from_bond(bond)
        })
        .collect()
}

fn anchor_sampled_torsions(
    molecule: &MoleculeGraph,
    tree: &Tree,
    selection: &CoreSelection,
    discovery: &Discovery,
    config: &BuildConfig,
) -> Vec<AnchoredTorsion> {
    let rings = discovery.use_rings.then_some(&discovery.rings);
    let mut anchored = tree::anchor_torsions(tree, &to_torsions(&selection.sampled, rings));
    if discovery.use_rings && config.ring_mode == RingMode::Only {
        anchored.retain(|a| a.torsion.is_ring());
    }
    for a in &mut anchored {
        a.torsion.is_hydroxyl = molecule.is_hydroxyl_like(a.torsion.parent, a.torsion.child);
    }
    anchored
}

fn reorder_template(
    template: &ZmatTemplate,
    molecule: &MoleculeGraph,
    tree: &Tree,
    r_group_root: Option<usize>,
) -> Result<ReorderedTemplate, EngineError> {
    let to_template = template.match_molecule(molecule)?;
    let ordering: Vec<usize> = tree.ordering.iter().map(|&atom| to_template[atom]).collect();
    let r_group_root = r_group_root.map(|atom| to_template[atom]);
    Ok(template.reorder(&ordering, &tree.parent, &tree.rank, r_group_root)?)
}

struct LibraryGenerator<'a> {
    molecule: &'a MoleculeGraph,
    conformers: Option<&'a ConformerSet>,
    tree: &'a Tree,
    selection: &'a CoreSelection,
    residue: &'a str,
    config: &'a BuildConfig,
    use_rings: bool,
}

impl LibraryGenerator<'_> {
    fn label(&self, atom: usize) -> String {
        self.molecule
            .atom(atom)
            .map_or_else(|| format!("{:>4}", atom + 1), |a| a.template_name())
    }

    fn require_conformers(&self, purpose: &'static str) -> Result<&ConformerSet, EngineError> {
        self.conformers.ok_or(EngineError::MissingConformers(purpose))
    }

    fn in_group<'t>(&self, torsions: &'t [AnchoredTorsion], group: usize) -> Vec<&'t AnchoredTorsion> {
        torsions
            .iter()
            .filter(|t| self.selection.torsion_group(&t.torsion.bond()) == group as isize)
            .collect()
    }

    /// Quantizes the dihedrals of `torsions` across all conformers into one library.
    fn library(
        &self,
        name: String,
        kind: LibraryKind,
        grid: LibraryGrid,
        torsions: &[&AnchoredTorsion],
        conformers: &ConformerSet,
    ) -> Result<RotamerLibrary, EngineError> {
        let positions: Vec<usize> = torsions.iter().map(|t| t.position).collect();
        let labels = positions
            .iter()
            .map(|&p| self.label(self.tree.ordering[p]))
            .collect();
        let series = library::torsion_series(
            conformers,
            &self.tree.ordering,
            &self.tree.parent,
            &positions,
        )?;
        let library = RotamerLibrary::from_series(name, kind, labels, grid, &series);
        info!(
            "Library {}: {} torsion(s), {} of {} conformer(s) kept.",
            library.name,
            positions.len(),
            library.len(),
            conformers.len()
        );
        Ok(library)
    }

    /// One library per group, quantized from the conformers.
    fn conformer_libraries(
        &self,
        torsions: &[AnchoredTorsion],
        reporter: &ProgressReporter,
    ) -> Result<(Vec<RotamerLibrary>, AssignmentScript), EngineError> {
        let conformers = self.require_conformers("conformer libraries")?;
        let grid = if self.use_rings {
            LibraryGrid::ring(self.config.grid_resolution)
        } else {
            LibraryGrid::sampled(self.config.grid_resolution)
        };

        let group_count = self.selection.group_count();
        let mut libraries = Vec::with_capacity(group_count);
        let mut script = AssignmentScript::new(self.residue, AssignmentStyle::Conformer);
        reporter.report(Progress::TaskStart {
            total_steps: group_count as u64,
        });
        for group in 0..group_count {
            let members = self.in_group(torsions, group);
            let name = group_library_name(self.residue, group);
            let library = self.library(name, LibraryKind::Side, grid, &members, conformers)?;
            script.groups.push(vec![SideEntry::Default {
                library: library.name.clone(),
            }]);
            libraries.push(library);
            reporter.report(Progress::TaskIncrement);
        }
        reporter.report(Progress::TaskFinish);
        Ok((libraries, script))
    }

    /// Free grid libraries per torsion, plus ring and backbone libraries from conformers.
    fn combinatorial_libraries(
        &self,
        torsions: &[AnchoredTorsion],
        backbone_torsions: &[AnchoredTorsion],
        reporter: &ProgressReporter,
    ) -> Result<(Vec<RotamerLibrary>, AssignmentScript), EngineError> {
        let mut libraries = Vec::new();
        let mut script = AssignmentScript::new(self.residue, AssignmentStyle::Combinatorial);

        if !backbone_torsions.is_empty() {
            match self.conformers {
                Some(conformers) => {
                    let members: Vec<&AnchoredTorsion> = backbone_torsions.iter().collect();
                    let library = self.library(
                        backbone_library_name(self.residue),
                        LibraryKind::Back,
                        LibraryGrid::sampled(self.config.grid_resolution),
                        &members,
                        conformers,
                    )?;
                    script.backbone_library = Some(library.name.clone());
                    libraries.push(library);
                }
                None => warn!(
                    "{} backbone torsion(s) stay rigid: no conformers to build a backbone library from.",
                    backbone_torsions.len()
                ),
            }
        }

        let ring_count = torsions.iter().map(|t| t.torsion.ring_id).max().unwrap_or(0);
        let mut ring_libraries: Vec<Option<String>> = vec![None; ring_count + 1];
        reporter.report(Progress::TaskStart {
            total_steps: ring_count as u64,
        });
        for ring_id in 1..=ring_count {
            let members: Vec<&AnchoredTorsion> = torsions
                .iter()
                .filter(|t| {
                    t.torsion.ring_id == ring_id
                        && (self.selection.rank[t.torsion.parent] > 0
                            || self.selection.rank[t.torsion.child] > 0)
                })
                .collect();
            if !members.is_empty() {
                let conformers = self.require_conformers("ring libraries")?;
                let library = self.library(
                    ring_library_name(self.residue, ring_id),
                    LibraryKind::Side,
                    LibraryGrid::ring(self.config.grid_resolution),
                    &members,
                    conformers,
                )?;
                ring_libraries[ring_id] = Some(library.name.clone());
                libraries.push(library);
            }
            reporter.report(Progress::TaskIncrement);
        }
        reporter.report(Progress::TaskFinish);

        let grid_label = self.free_label(self.config.grid_resolution)?;
        let hydroxyl_label = self.free_label(self.config.hydroxyl_grid())?;
        let mut written = vec![false; ring_count + 1];
        for group in 0..self.selection.group_count() {
            let mut entries = Vec::new();
            for anchored in self.in_group(torsions, group) {
                let t = &anchored.torsion;
                if t.is_ring() {
                    if let Some(library) = &ring_libraries[t.ring_id] {
                        if !written[t.ring_id] {
                            entries.push(SideEntry::Default {
                                library: library.clone(),
                            });
                            written[t.ring_id] = true;
                        }
                    }
                } else {
                    let library = if t.is_hydroxyl { hydroxyl_label } else { grid_label };
                    entries.push(SideEntry::Bond {
                        library: library.to_string(),
                        atom_a: self.label(t.parent),
                        atom_b: self.label(t.child),
                    });
                }
            }
            script.groups.push(entries);
        }
        Ok((libraries, script))
    }

    fn free_label(&self, resolution: f64) -> Result<&'static str, EngineError> {
        free_library_label(resolution).ok_or(EngineError::UnsupportedGridResolution(resolution))
    }
}
