use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use rotlib::engine::config::{
    AtomPair, AtomSelector, BuildConfig, BuildConfigBuilder, LibraryMode, ResidueMode, RingMode,
};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSamplingConfig {
    grid_resolution: Option<f64>,
    hydroxyl_resolution: Option<f64>,
    ring_mode: Option<RingMode>,
    library_mode: Option<LibraryMode>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialTreeConfig {
    root: Option<String>,
    r_group_root: Option<String>,
    max_torsions: Option<usize>,
    multiple_libraries: Option<bool>,
    residue_mode: Option<ResidueMode>,
    torsions: Option<Vec<[String; 2]>>,
    fixed_bonds: Option<Vec<[String; 2]>>,
    backbone_torsions: Option<Vec<[String; 2]>>,
}

/// Build settings read from a TOML file; every field may be overridden on the command line.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialBuildConfig {
    residue_name: Option<String>,
    sampling: Option<PartialSamplingConfig>,
    tree: Option<PartialTreeConfig>,
}

impl PartialBuildConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `--set` values, then command-line flags, over the file values.
    pub fn merge_with_cli(mut self, args: &BuildArgs) -> Result<BuildConfig> {
        self.apply_set_values(&args.set_values)?;

        let sampling = self.sampling.take().unwrap_or_default();
        let tree = self.tree.take().unwrap_or_default();

        let mut builder = BuildConfigBuilder::new()
            .hydroxyl_resolution(args.hydroxyl_grid.or(sampling.hydroxyl_resolution))
            .ring_mode(args.rings.or(sampling.ring_mode).unwrap_or_default())
            .library_mode(args.library_mode.or(sampling.library_mode).unwrap_or_default())
            .max_torsions(args.max_torsions.or(tree.max_torsions))
            .residue_name(args.residue_name.clone().or(self.residue_name));
        if let Some(grid) = args.grid.or(sampling.grid_resolution) {
            builder = builder.grid_resolution(grid);
        }

        // A root given on the command line replaces both roots from the file.
        let (root, r_group_root) = if args.root.is_some() || args.r_group_root.is_some() {
            (args.root.clone(), args.r_group_root.clone())
        } else {
            (
                tree.root
                    .map(|name| parse_value::<AtomSelector>("tree.root", &name))
                    .transpose()?,
                tree.r_group_root
                    .map(|name| parse_value::<AtomSelector>("tree.r-group-root", &name))
                    .transpose()?,
            )
        };
        builder = builder.root(root).r_group_root(r_group_root);

        let multiple_libraries = if args.single_library {
            false
        } else {
            tree.multiple_libraries.unwrap_or(true)
        };
        builder = builder.multiple_libraries(multiple_libraries);

        let residue_mode = if args.unnatural_amino_acid {
            ResidueMode::UnnaturalAminoAcid
        } else {
            tree.residue_mode.unwrap_or_default()
        };
        builder = builder.residue_mode(residue_mode);

        let torsions = if args.torsions.is_empty() {
            tree.torsions
                .map(|pairs| to_atom_pairs("tree.torsions", pairs))
                .transpose()?
        } else {
            Some(args.torsions.clone())
        };
        builder = builder
            .torsions(torsions)
            .fixed_bonds(merge_pairs(
                &args.fixed_bonds,
                tree.fixed_bonds,
                "tree.fixed-bonds",
            )?)
            .backbone_torsions(merge_pairs(
                &args.backbone_torsions,
                tree.backbone_torsions,
                "tree.backbone-torsions",
            )?);

        Ok(builder.build()?)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;
            let sampling = || -> PartialSamplingConfig { Default::default() };
            let tree = || -> PartialTreeConfig { Default::default() };

            match key {
                "residue-name" => self.residue_name = Some(value.to_string()),
                "sampling.grid-resolution" => {
                    self.sampling.get_or_insert_with(sampling).grid_resolution =
                        Some(parse_value(key, value)?);
                }
                "sampling.hydroxyl-resolution" => {
                    self.sampling.get_or_insert_with(sampling).hydroxyl_resolution =
                        Some(parse_value(key, value)?);
                }
                "sampling.ring-mode" => {
                    self.sampling.get_or_insert_with(sampling).ring_mode =
                        Some(parse_value(key, value)?);
                }
                "sampling.library-mode" => {
                    self.sampling.get_or_insert_with(sampling).library_mode =
                        Some(parse_value(key, value)?);
                }
                "tree.root" => {
                    self.tree.get_or_insert_with(tree).root = Some(value.to_string());
                }
                "tree.r-group-root" => {
                    self.tree.get_or_insert_with(tree).r_group_root = Some(value.to_string());
                }
                "tree.max-torsions" => {
                    self.tree.get_or_insert_with(tree).max_torsions =
                        Some(parse_value(key, value)?);
                }
                "tree.multiple-libraries" => {
                    self.tree.get_or_insert_with(tree).multiple_libraries =
                        Some(parse_value(key, value)?);
                }
                "tree.residue-mode" => {
                    self.tree.get_or_insert_with(tree).residue_mode =
                        Some(parse_value(key, value)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn to_atom_pairs(key: &str, pairs: Vec<[String; 2]>) -> Result<Vec<AtomPair>> {
    pairs
        .iter()
        .map(|[a, b]| Ok((parse_value(key, a)?, parse_value(key, b)?)))
        .collect()
}

/// Command-line pairs replace the file's list when any are given.
fn merge_pairs(
    cli: &[AtomPair],
    file: Option<Vec<[String; 2]>>,
    key: &str,
) -> Result<Vec<AtomPair>> {
    if !cli.is_empty() {
        return Ok(cli.to_vec());
    }
    Ok(file
        .map(|pairs| to_atom_pairs(key, pairs))
        .transpose()?
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
residue-name = "lig"

[sampling]
grid-resolution = 15.0
hydroxyl-resolution = 30.0
ring-mode = "on"

[tree]
root = "C1"
max-torsions = 4
fixed-bonds = [["C3", "C4"], ["2", "5"]]
"#;

    fn build_args(extra: &[&str]) -> BuildArgs {
        let mut argv = vec!["rotlib", "build", "-i", "lig.mae", "-o", "out"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Build(args) => args,
        }
    }

    #[test]
    fn file_values_fill_the_config() {
        let partial = PartialBuildConfig::from_toml(CONFIG).unwrap();
        let config = partial.merge_with_cli(&build_args(&[])).unwrap();

        assert_eq!(config.grid_resolution, 15.0);
        assert_eq!(config.hydroxyl_resolution, Some(30.0));
        assert_eq!(config.ring_mode, RingMode::On);
        assert_eq!(config.library_mode, LibraryMode::Combinatorial);
        assert_eq!(config.root, Some(AtomSelector::Name("C1".into())));
        assert_eq!(config.max_torsions, Some(4));
        assert_eq!(
            config.fixed_bonds,
            vec![
                (AtomSelector::Name("C3".into()), AtomSelector::Name("C4".into())),
                (AtomSelector::Index(2), AtomSelector::Index(5)),
            ]
        );
        assert_eq!(config.residue_name.as_deref(), Some("lig"));
        assert!(config.multiple_libraries);
        assert!(config.torsions.is_none());
    }

    #[test]
    fn flags_override_file_values() {
        let partial = PartialBuildConfig::from_toml(CONFIG).unwrap();
        let args = build_args(&[
            "--grid",
            "30",
            "--rings",
            "only",
            "--root",
            "7",
            "--fix",
            "C1:C2",
            "--single-library",
            "--unnatural-amino-acid",
            "--residue-name",
            "XYZ",
        ]);
        let config = partial.merge_with_cli(&args).unwrap();

        assert_eq!(config.grid_resolution, 30.0);
        assert_eq!(config.ring_mode, RingMode::Only);
        assert_eq!(config.root, Some(AtomSelector::Index(7)));
        assert_eq!(
            config.fixed_bonds,
            vec![(AtomSelector::Name("C1".into()), AtomSelector::Name("C2".into()))]
        );
        assert!(!config.multiple_libraries);
        assert_eq!(config.residue_mode, ResidueMode::UnnaturalAminoAcid);
        assert_eq!(config.residue_name.as_deref(), Some("XYZ"));
    }

    #[test]
    fn r_group_root_flag_replaces_the_file_root() {
        let partial = PartialBuildConfig::from_toml(CONFIG).unwrap();
        let config = partial
            .merge_with_cli(&build_args(&["--r-group-root", "O1"]))
            .unwrap();
        assert_eq!(config.root, None);
        assert_eq!(config.r_group_root, Some(AtomSelector::Name("O1".into())));

        let partial = PartialBuildConfig::from_toml(CONFIG).unwrap();
        let err = partial
            .merge_with_cli(&build_args(&["-S", "tree.r-group-root=O1"]))
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn set_values_override_the_file_but_not_flags() {
        let partial = PartialBuildConfig::from_toml(CONFIG).unwrap();
        let args = build_args(&[
            "-S",
            "sampling.grid-resolution=20",
            "-S",
            "tree.max-torsions=2",
            "--max-torsions",
            "3",
        ]);
        let config = partial.merge_with_cli(&args).unwrap();
        assert_eq!(config.grid_resolution, 20.0);
        assert_eq!(config.max_torsions, Some(3));
    }

    #[test]
    fn defaults_apply_without_a_file() {
        let config = PartialBuildConfig::default()
            .merge_with_cli(&build_args(&[]))
            .unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PartialBuildConfig::from_toml("[sampling]\ngrid = 10.0\n").is_err());
        assert!(PartialBuildConfig::from_toml("[tree]\nring-mode = \"on\"\n").is_err());
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        let mut partial = PartialBuildConfig::default();
        assert!(matches!(
            partial.apply_set_values(&["sampling.grid-resolution".into()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            partial.apply_set_values(&["tree.max-torsions=many".into()]),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            partial.apply_set_values(&["optimization.num-solutions=5".into()]),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn unsupported_grid_is_a_config_error() {
        let err = PartialBuildConfig::default()
            .merge_with_cli(&build_args(&["--grid", "7"]))
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn from_file_reports_parse_errors_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rotlib.toml");
        fs::write(&path, "residue-name = [").unwrap();
        assert!(matches!(
            PartialBuildConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }
}
