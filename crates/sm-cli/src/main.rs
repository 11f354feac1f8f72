//! Souls Merge CLI
//!
//! Command-line tool for merging modded text, animation, layout and texture
//! content into game containers, and for turning param edits into edit scripts.

use clap::{Args, Parser, Subcommand};
use sm_core::codec::{
    encode_animation_bank, encode_container, encode_param_bank, encode_texture_pack,
    load_container, load_param_bank, load_texture_pack, read_animation, read_layout,
    read_text_fragment, read_texture,
};
use sm_core::container::display_name;
use sm_core::history::{create_history_entry, record, HistoryEntry, HistoryFile};
use sm_core::inputs::{
    ANIMATION_EXTENSIONS, CSV_EXTENSIONS, LAYOUT_EXTENSIONS, SCRIPT_EXTENSIONS, TEXTURE_EXTENSIONS,
    TEXT_EXTENSIONS,
};
use sm_core::persist::write_artifact;
use sm_core::{
    apply_csv_file, apply_manual_entries, apply_script, collect_inputs, csv_to_script, diff_banks,
    export_csv, merge_animations, merge_layouts, merge_text_fragments, merge_textures,
    parse_manual_entries, persist, seed_missing_rows, ConflictPolicy, EditScript, MergeOutcome,
    RowDiff, RunConfig,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Extension given to generated edit scripts
const SCRIPT_EXTENSION: &str = "massedit";

#[derive(Parser)]
#[command(name = "sm-cli")]
#[command(
    about = "Merge modded content into game containers and generate param edit scripts",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every command that writes a merged file
#[derive(Args, Clone, Default)]
struct CommonArgs {
    /// Output file or directory (the input is overwritten with a .prev backup otherwise)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Leave conflicting entries untouched and only add new ones
    #[arg(short, long)]
    ignore_conflicts: bool,

    /// Print every change made
    #[arg(short, long)]
    verbose: bool,

    /// JSON run configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append persisted merges to this history file
    #[arg(long)]
    history: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge exported text fragments into a text container
    TextMerge {
        /// Text container to modify
        container: PathBuf,

        /// Fragment files or directories
        #[arg(required = true)]
        fragments: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Add individual text entries given as Name:Id:Text
    TextEntry {
        /// Text container to modify
        container: PathBuf,

        /// Entries, e.g. "AccessoryName: 6200: Amulet of Defenestration"
        #[arg(required = true)]
        entries: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Merge animation banks or partial banks into an animation container
    AnimMerge {
        /// Animation container to modify
        container: PathBuf,

        /// Animation files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Strip animation banks down to partial banks holding only clips the container lacks
    AnimDiff {
        /// Reference animation container
        container: PathBuf,

        /// Animation files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Merge atlas layouts into a layout container
    LayoutMerge {
        /// Layout container to modify
        container: PathBuf,

        /// Layout files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Merge DDS images into a texture pack
    TextureMerge {
        /// Texture pack to modify
        pack: PathBuf,

        /// Image files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Convert CSV row edits into edit scripts
    CsvToScript {
        /// Param bank the CSVs apply to
        bank: PathBuf,

        /// CSV files or directories
        #[arg(required = true)]
        csv: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Apply CSV row edits directly to a param bank
    CsvApply {
        /// Param bank to modify
        bank: PathBuf,

        /// CSV files or directories; each file stem names its param
        #[arg(required = true)]
        csv: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Export params as CSV files in the row-edit layout
    Export {
        /// Param bank to read
        bank: PathBuf,

        /// Params to export (all params when omitted)
        params: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Export the differences from a param bank to a reference bank as an edit script
    Diff {
        /// Param bank the script will be applied to
        bank: PathBuf,

        /// Param bank holding the desired values
        reference: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Apply edit scripts to a param bank
    ApplyScript {
        /// Param bank to modify
        bank: PathBuf,

        /// Script files or directories
        #[arg(required = true)]
        scripts: Vec<PathBuf>,

        /// Create default rows for ids the scripts reference but the bank lacks
        #[arg(long)]
        add_rows: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show recorded merges from a history file
    History {
        /// History file
        file: PathBuf,

        /// Only show merges of this target file name
        #[arg(short, long)]
        target: Option<String>,

        /// Only show the most recent merge
        #[arg(long)]
        last: bool,
    },

    /// Create a run configuration template
    InitConfig {
        /// Output path for the config file
        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Commands {
    fn common(&self) -> Option<&CommonArgs> {
        match self {
            Commands::TextMerge { common, .. }
            | Commands::TextEntry { common, .. }
            | Commands::AnimMerge { common, .. }
            | Commands::AnimDiff { common, .. }
            | Commands::LayoutMerge { common, .. }
            | Commands::TextureMerge { common, .. }
            | Commands::CsvToScript { common, .. }
            | Commands::CsvApply { common, .. }
            | Commands::Export { common, .. }
            | Commands::Diff { common, .. }
            | Commands::ApplyScript { common, .. } => Some(common),
            Commands::History { .. } | Commands::InitConfig { .. } => None,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> sm_core::Result<()> {
    let cli = Cli::parse();

    let config = match cli.command.common() {
        Some(common) => resolve_config(common)?,
        None => RunConfig::default(),
    };
    init_logging(config.verbose);

    match cli.command {
        Commands::TextMerge {
            container,
            fragments,
            ..
        } => cmd_text_merge(&container, &fragments, &config),
        Commands::TextEntry {
            container, entries, ..
        } => cmd_text_entry(&container, &entries, &config),
        Commands::AnimMerge {
            container, files, ..
        } => cmd_anim_merge(&container, &files, &config),
        Commands::AnimDiff {
            container, files, ..
        } => cmd_anim_diff(&container, &files, &config),
        Commands::LayoutMerge {
            container, files, ..
        } => cmd_layout_merge(&container, &files, &config),
        Commands::TextureMerge { pack, files, .. } => cmd_texture_merge(&pack, &files, &config),
        Commands::CsvToScript { bank, csv, .. } => cmd_csv_to_script(&bank, &csv, &config),
        Commands::CsvApply { bank, csv, .. } => cmd_csv_apply(&bank, &csv, &config),
        Commands::Export { bank, params, .. } => cmd_export(&bank, &params, &config),
        Commands::Diff {
            bank, reference, ..
        } => cmd_diff(&bank, &reference, &config),
        Commands::ApplyScript {
            bank,
            scripts,
            add_rows,
            ..
        } => cmd_apply_script(&bank, &scripts, add_rows, &config),
        Commands::History { file, target, last } => cmd_history(&file, target.as_deref(), last),
        Commands::InitConfig { output } => cmd_init_config(&output),
    }
}

/// Load the config file if given, then apply flag overrides
fn resolve_config(common: &CommonArgs) -> sm_core::Result<RunConfig> {
    let mut config = match &common.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    if common.ignore_conflicts {
        config.policy = ConflictPolicy::IgnoreConflicting;
    }
    if common.output.is_some() {
        config.output = common.output.clone();
    }
    if common.history.is_some() {
        config.history = common.history.clone();
    }
    config.verbose |= common.verbose;

    Ok(config)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Report a merge outcome and persist `bytes` when something changed
fn finish_merge(
    operation: &str,
    original: &Path,
    outcome: &MergeOutcome,
    config: &RunConfig,
    encode: impl FnOnce() -> sm_core::Result<Vec<u8>>,
) -> sm_core::Result<()> {
    let Some(log) = outcome.log() else {
        println!("No changes detected.");
        return Ok(());
    };

    let bytes = encode()?;
    let written = persist(&bytes, original, config.output.as_deref())?;
    println!("Success!");

    if config.verbose {
        for change in log.iter() {
            println!("{}", change);
        }
        println!("Saved {}", written.display());
    }

    if let Some(history) = &config.history {
        let entry = create_history_entry(operation, &display_name(original), written, log.clone());
        record(history, entry)?;
    }

    Ok(())
}

fn cmd_text_merge(
    container_path: &Path,
    paths: &[PathBuf],
    config: &RunConfig,
) -> sm_core::Result<()> {
    println!("Performing text merge for {}...", container_path.display());
    let mut container = load_container(container_path)?;

    let inputs = collect_inputs(paths, TEXT_EXTENSIONS)?;
    let incoming = inputs
        .files
        .iter()
        .map(read_text_fragment)
        .collect::<sm_core::Result<Vec<_>>>()?;

    let outcome = merge_text_fragments(&mut container, incoming, &config.merge_options(false))?;
    finish_merge("text-merge", container_path, &outcome, config, || {
        encode_container(&container)
    })
}

fn cmd_text_entry(
    container_path: &Path,
    entries: &[String],
    config: &RunConfig,
) -> sm_core::Result<()> {
    // Parse everything before loading so a bad entry never mutates anything
    let entries = parse_manual_entries(entries)?;

    println!("Adding text entries to {}...", container_path.display());
    let mut container = load_container(container_path)?;

    let outcome = apply_manual_entries(&mut container, &entries, &config.merge_options(false))?;
    finish_merge("text-entry", container_path, &outcome, config, || {
        encode_container(&container)
    })
}

fn cmd_anim_merge(
    container_path: &Path,
    paths: &[PathBuf],
    config: &RunConfig,
) -> sm_core::Result<()> {
    println!("Performing animation merge for {}...", container_path.display());
    let mut container = load_container(container_path)?;

    let inputs = collect_inputs(paths, ANIMATION_EXTENSIONS)?;
    let incoming = inputs
        .files
        .iter()
        .map(read_animation)
        .collect::<sm_core::Result<Vec<_>>>()?;

    let result = merge_animations(&mut container, incoming, &config.merge_options(false))?;
    finish_merge("anim-merge", container_path, &result.outcome, config, || {
        encode_container(&container)
    })
}

fn cmd_anim_diff(
    container_path: &Path,
    paths: &[PathBuf],
    config: &RunConfig,
) -> sm_core::Result<()> {
    println!(
        "Creating partial animations from diffs to {}...",
        container_path.display()
    );
    let mut container = load_container(container_path)?;

    let inputs = collect_inputs(paths, ANIMATION_EXTENSIONS)?;
    let mut source_dirs: HashMap<String, PathBuf> = HashMap::new();
    let mut incoming = Vec::new();
    for path in &inputs.files {
        let item = read_animation(path)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        source_dirs
            .entry(item.bank_name().to_lowercase())
            .or_insert(dir);
        incoming.push(item);
    }

    let result = merge_animations(&mut container, incoming, &config.merge_options(true))?;
    let Some(log) = result.outcome.log() else {
        println!("No changes detected.");
        return Ok(());
    };

    for partial in &result.partials {
        let default_dir = source_dirs
            .get(&partial.name.to_lowercase())
            .cloned()
            .unwrap_or_default();
        let dir = artifact_dir(config.output.as_deref(), &default_dir);
        let bytes = encode_animation_bank(&partial.bank)?;
        let written = write_artifact(&bytes, &dir, &partial.file_name())?;
        info!(path = %written.display(), clips = partial.bank.clips.len(), "wrote partial bank");
    }
    println!("Success!");

    if config.verbose {
        for change in log.iter() {
            println!("{}", change);
        }
    }
    Ok(())
}

fn cmd_layout_merge(
    container_path: &Path,
    paths: &[PathBuf],
    config: &RunConfig,
) -> sm_core::Result<()> {
    println!("Performing layout merge for {}...", container_path.display());
    let mut container = load_container(container_path)?;

    let inputs = collect_inputs(paths, LAYOUT_EXTENSIONS)?;
    let incoming = inputs
        .files
        .iter()
        .map(read_layout)
        .collect::<sm_core::Result<Vec<_>>>()?;

    let outcome = merge_layouts(&mut container, incoming, &config.merge_options(false))?;
    finish_merge("layout-merge", container_path, &outcome, config, || {
        encode_container(&container)
    })
}

fn cmd_texture_merge(
    pack_path: &Path,
    paths: &[PathBuf],
    config: &RunConfig,
) -> sm_core::Result<()> {
    println!("Performing texture merge for {}...", pack_path.display());
    let mut pack = load_texture_pack(pack_path)?;

    let inputs = collect_inputs(paths, TEXTURE_EXTENSIONS)?;
    let incoming = inputs
        .files
        .iter()
        .map(read_texture)
        .collect::<sm_core::Result<Vec<_>>>()?;

    let label = display_name(pack_path);
    let outcome = merge_textures(&mut pack, incoming, &config.merge_options(false), &label);
    finish_merge("texture-merge", pack_path, &outcome, config, || {
        encode_texture_pack(&pack)
    })
}

fn cmd_csv_to_script(
    bank_path: &Path,
    paths: &[PathBuf],
    config: &RunConfig,
) -> sm_core::Result<()> {
    println!("Converting CSV files to edit scripts...");
    let bank = load_param_bank(bank_path)?;

    let inputs = collect_inputs(paths, CSV_EXTENSIONS)?;
    for csv_path in &inputs.files {
        let stem = csv_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (param, diff) = csv_to_script(&bank, csv_path)?;
        let default_dir = csv_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let dir = artifact_dir(config.output.as_deref(), &default_dir);
        let file_name = format!("{}.{}", stem, SCRIPT_EXTENSION);
        let written = write_artifact(diff.script.to_string().as_bytes(), &dir, &file_name)?;

        println!("Converting {} ({}):\n\t{}", stem, param, written.display());
        print_script_notes(&diff);
    }

    Ok(())
}

fn cmd_csv_apply(bank_path: &Path, paths: &[PathBuf], config: &RunConfig) -> sm_core::Result<()> {
    println!("Applying CSV files to {}...", bank_path.display());
    let mut bank = load_param_bank(bank_path)?;
    let original = bank.clone();

    let inputs = collect_inputs(paths, CSV_EXTENSIONS)?;
    for csv_path in &inputs.files {
        let (param, applied) = apply_csv_file(&mut bank, csv_path)?;
        println!(
            "{}: {} rows added, {} rows updated",
            param, applied.added, applied.updated
        );
        if applied.added == 0 && applied.updated > 0 {
            println!("\tNote: Only existing rows changed, consider an edit script for these.");
        }
    }

    if bank == original {
        println!("No changes detected.");
        return Ok(());
    }

    let written = persist(&encode_param_bank(&bank)?, bank_path, config.output.as_deref())?;
    println!("Saved {}", written.display());
    Ok(())
}

fn cmd_export(bank_path: &Path, params: &[String], config: &RunConfig) -> sm_core::Result<()> {
    let bank = load_param_bank(bank_path)?;
    let selected = bank.select(params)?;

    let default_dir = bank_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let dir = artifact_dir(config.output.as_deref(), &default_dir);
    for param in selected {
        let bytes = export_csv(param)?;
        let written = write_artifact(&bytes, &dir, &format!("{}.csv", param.name))?;
        info!(param = %param.name, rows = param.rows.len(), "exported param");
        println!("Exported {}", written.display());
    }

    Ok(())
}

fn cmd_history(file: &Path, target: Option<&str>, last: bool) -> sm_core::Result<()> {
    let history = HistoryFile::load(file)?;
    let entries: Vec<&HistoryEntry> = match (last, target) {
        (true, Some(target)) => history.get_last_entry(target).into_iter().collect(),
        (true, None) => history.entries_for(None).pop().into_iter().collect(),
        (false, target) => history.entries_for(target),
    };

    if entries.is_empty() {
        println!("No history recorded.");
        return Ok(());
    }

    for entry in entries {
        print_history_entry(entry);
    }
    println!("{} merges recorded in total", history.total_entries());
    Ok(())
}

fn cmd_diff(bank_path: &Path, reference_path: &Path, config: &RunConfig) -> sm_core::Result<()> {
    println!("Converting changes to edit script...");
    let bank = load_param_bank(bank_path)?;
    let reference = load_param_bank(reference_path)?;

    let diff = diff_banks(&bank, &reference);
    if diff.is_empty() {
        println!("No changes detected.");
        return Ok(());
    }

    let stem = reference_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let default_dir = reference_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let dir = artifact_dir(config.output.as_deref(), &default_dir);
    let file_name = format!("{}_diff.{}", stem, SCRIPT_EXTENSION);
    let written = write_artifact(diff.script.to_string().as_bytes(), &dir, &file_name)?;

    println!("Exported {}", written.display());
    print_script_notes(&diff);
    if config.verbose {
        print!("{}", diff.script);
    }
    Ok(())
}

fn cmd_apply_script(
    bank_path: &Path,
    paths: &[PathBuf],
    add_rows: bool,
    config: &RunConfig,
) -> sm_core::Result<()> {
    let mut bank = load_param_bank(bank_path)?;

    // Parse every script before touching the bank
    let inputs = collect_inputs(paths, SCRIPT_EXTENSIONS)?;
    let mut scripts = Vec::new();
    for path in &inputs.files {
        let text = fs::read_to_string(path).map_err(|e| sm_core::Error::FileRead {
            path: path.clone(),
            source: e,
        })?;
        scripts.push((display_name(path), EditScript::parse(&text)?));
    }

    let mut changed = false;
    for (name, script) in &scripts {
        if add_rows {
            let added = seed_missing_rows(&mut bank, script);
            changed |= !added.is_empty();
            if config.verbose {
                for (param, id) in &added {
                    println!("Added row {} to {}", id, param);
                }
            }
        }

        let report = apply_script(&mut bank, script)?;
        changed |= report.applied > 0;
        println!(
            "{}: {} statements applied, {} skipped",
            name, report.applied, report.skipped
        );
    }

    if !changed {
        println!("No changes detected.");
        return Ok(());
    }

    let written = persist(&encode_param_bank(&bank)?, bank_path, config.output.as_deref())?;
    println!("Saved {}", written.display());
    Ok(())
}

fn cmd_init_config(output: &Path) -> sm_core::Result<()> {
    let config = RunConfig {
        history: Some(PathBuf::from("merge_history.json")),
        ..RunConfig::default()
    };

    config.save(output)?;
    println!("Created config file: {}", output.display());
    println!();
    println!("Edit the file to configure your runs, then pass it with:");
    println!("  sm-cli <command> ... --config {}", output.display());

    Ok(())
}

fn print_history_entry(entry: &HistoryEntry) {
    println!(
        "{} {} {} -> {} ({} changes)",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.operation,
        entry.target,
        entry.output.display(),
        entry.changes.len()
    );
    for change in entry.changes.iter() {
        println!("\t{}", change);
    }
}

fn print_script_notes(diff: &RowDiff) {
    if diff.had_additions {
        println!("\tNote: Row additions detected, use --add-rows when applying this script.");
    }
}

/// Directory for side artifacts: the output directory, the output file's
/// directory, or `default_dir` when no output was given
fn artifact_dir(output: Option<&Path>, default_dir: &Path) -> PathBuf {
    match output {
        Some(out) if out.is_dir() => out.to_path_buf(),
        Some(out) => out.parent().map(Path::to_path_buf).unwrap_or_default(),
        None => default_dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_core::{FieldDef, FieldType, FieldValue, Param, ParamBank, Row};

    fn write_bank(dir: &Path) -> PathBuf {
        let mut param = Param::new("Bullet", vec![FieldDef::new("life", FieldType::F32)]);
        param.rows.push(Row {
            id: 100,
            name: "Arrow".to_string(),
            values: vec![FieldValue::Float(2.0)],
        });
        let mut bank = ParamBank::new();
        bank.insert(param);

        let path = dir.join("regulation.json");
        fs::write(&path, encode_param_bank(&bank).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_csv_apply_persists_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let bank_path = write_bank(dir.path());
        let csv_path = dir.path().join("Bullet.csv");
        fs::write(&csv_path, "ID,Name,life\n100,Arrow,5\n7,Spark,1\n").unwrap();

        cmd_csv_apply(&bank_path, &[csv_path], &RunConfig::default()).unwrap();

        let bank = load_param_bank(&bank_path).unwrap();
        let param = bank.get("Bullet").unwrap();
        assert_eq!(param.row(100).unwrap().values[0], FieldValue::Float(5.0));
        assert_eq!(param.row(7).unwrap().name, "Spark");
        assert!(dir.path().join("regulation.json.prev").exists());
    }

    #[test]
    fn test_export_then_csv_apply_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let bank_path = write_bank(dir.path());
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let config = RunConfig {
            output: Some(out.clone()),
            ..RunConfig::default()
        };

        cmd_export(&bank_path, &["bullet".to_string()], &config).unwrap();
        let exported = out.join("Bullet.csv");
        assert_eq!(
            fs::read_to_string(&exported).unwrap(),
            "ID,Name,life\n100,Arrow,2\n"
        );

        let before = fs::read(&bank_path).unwrap();
        cmd_csv_apply(&bank_path, &[exported], &RunConfig::default()).unwrap();
        assert_eq!(fs::read(&bank_path).unwrap(), before);
        assert!(!dir.path().join("regulation.json.prev").exists());
    }

    #[test]
    fn test_export_unknown_param_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bank_path = write_bank(dir.path());

        let err = cmd_export(&bank_path, &["Missing".to_string()], &RunConfig::default());
        assert!(matches!(err, Err(sm_core::Error::ParamNotFound(_))));
    }
}
