use crate::cli::BuildArgs;
use crate::config::PartialBuildConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use rotlib::{
    core::io::{
        mae::MaeFile,
        template::ZmatTemplateFile,
        torsions::{self, TorsionListFile},
        traits::InputFile,
    },
    core::models::topology::BondList,
    engine::progress::ProgressReporter,
    workflows::build::{self, BuildInput},
};
use std::path::Path;
use tracing::{info, warn};

fn parse_error(path: &Path, source: impl Into<anyhow::Error>) -> CliError {
    CliError::FileParsing {
        path: path.to_path_buf(),
        source: source.into(),
    }
}

fn load_input(args: &BuildArgs, needs_rotatable: bool) -> Result<BuildInput> {
    info!("Loading input structure from {:?}", &args.input);
    let structure =
        MaeFile::read_from_path(&args.input).map_err(|e| parse_error(&args.input, e))?;
    let molecule = structure.molecule;

    let conformers = match &args.conformers {
        Some(path) => {
            info!("Loading conformers from {:?}", path);
            let sampled = MaeFile::read_from_path(path).map_err(|e| parse_error(path, e))?;
            sampled.conformers
        }
        None => structure.conformers,
    };
    info!("Read {} conformer(s).", conformers.len());

    let rotatable = match &args.rotatable {
        Some(path) => {
            let bonds =
                TorsionListFile::read_from_path(path).map_err(|e| parse_error(path, e))?;
            torsions::validate_against(&bonds, &molecule).map_err(|e| parse_error(path, e))?;
            bonds
        }
        None => {
            if needs_rotatable {
                warn!("No rotatable bond list given; every bond is treated as rigid.");
            }
            BondList::new()
        }
    };

    let template = args
        .template
        .as_ref()
        .map(|path| ZmatTemplateFile::read_from_path(path).map_err(|e| parse_error(path, e)))
        .transpose()?;

    Ok(BuildInput {
        molecule,
        rotatable,
        conformers: (!conformers.is_empty()).then_some(conformers),
        template,
    })
}

pub fn run(args: BuildArgs, show_progress: bool) -> Result<()> {
    let partial = match &args.config {
        Some(path) => PartialBuildConfig::from_file(path)?,
        None => PartialBuildConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial.merge_with_cli(&args)?;

    let input = load_input(&args, config.torsions.is_none())?;

    let progress_handler = if show_progress {
        CliProgressHandler::new()
    } else {
        CliProgressHandler::hidden()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Building rotamer libraries...");
    let output = build::run(&input, &config, &reporter)?;

    let written = output.write_to_dir(&args.output)?;
    println!(
        "✓ {}: {} torsion(s) in {} group(s), {} file(s) written to {}",
        output.residue,
        output.torsions.len(),
        output.selection.group_count(),
        written.len(),
        args.output.display()
    );
    for path in &written {
        println!("  {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    const BUTANOL: &str = r#"{
  s_m_m2io_version
  :::
  2.0.0
}

f_m_ct {
  s_m_title
  :::
  butanol
  m_atom[6] {
    # First column is atom index #
    i_m_mmod_type
    r_m_x_coord
    r_m_y_coord
    r_m_z_coord
    i_m_atomic_number
    s_m_pdb_atom_name
    s_m_pdb_residue_name
    :::
    1 3 0.000 0.000 0.000 6 " C1 " BUT
    2 3 1.530 0.000 0.000 6 " C2 " BUT
    3 3 2.040 1.440 0.000 6 " C3 " BUT
    4 3 3.570 1.440 0.000 6 " C4 " BUT
    5 16 4.040 2.790 0.000 8 " O1 " BUT
    6 42 5.000 2.790 0.000 1 " H1 " BUT
    :::
  }
  m_bond[5] {
    # First column is bond index #
    i_m_from
    i_m_to
    i_m_order
    :::
    1 1 2 1
    2 2 3 1
    3 3 4 1
    4 4 5 1
    5 5 6 1
    :::
  }
}
"#;

    fn build_args(dir: &Path, extra: &[&str]) -> BuildArgs {
        let input = dir.join("but.mae");
        let rotatable = dir.join("rotatable.csv");
        fs::write(&input, BUTANOL).unwrap();
        fs::write(&rotatable, "atom_i,atom_j\n1,2\n2,3\n3,4\n").unwrap();
        let out = dir.join("out");
        let mut argv = vec![
            "rotlib".to_string(),
            "build".into(),
            "-i".into(),
            input.display().to_string(),
            "-o".into(),
            out.display().to_string(),
            "-r".into(),
            rotatable.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(argv).command {
            Commands::Build(args) => args,
        }
    }

    #[test]
    fn build_writes_assignment_script() {
        let dir = tempdir().unwrap();
        let args = build_args(dir.path(), &["--hydroxyl-grid", "30"]);
        run(args, false).unwrap();

        let script = fs::read_to_string(dir.path().join("out/BUT.rot.assign")).unwrap();
        assert_eq!(
            script,
            "rot assign res BUT &\n\
             \x20  sidelib FREE10 _C2_ _C3_ &\n\
             \x20  sidelib FREE10 _C3_ _C4_ &\n\
             \x20  sidelib FREE30 _C4_ _O1_ &\n"
        );
    }

    #[test]
    fn conformer_mode_writes_one_library() {
        let dir = tempdir().unwrap();
        let args = build_args(dir.path(), &["-m", "conformer"]);
        run(args, false).unwrap();

        let library = fs::read_to_string(dir.path().join("out/BUT__1.side")).unwrap();
        assert!(library.starts_with("* BUT__1  3       1 10.0 0\n"));
    }

    #[test]
    fn rotatable_bonds_must_exist() {
        let dir = tempdir().unwrap();
        let args = build_args(dir.path(), &[]);
        fs::write(dir.path().join("rotatable.csv"), "atom_i,atom_j\n0,5\n").unwrap();
        assert!(matches!(run(args, false), Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = tempdir().unwrap();
        let mut args = build_args(dir.path(), &[]);
        args.input = dir.path().join("missing.mae");
        assert!(matches!(run(args, false), Err(CliError::FileParsing { .. })));
    }
}
