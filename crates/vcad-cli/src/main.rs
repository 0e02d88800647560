//! vcad CLI - export vcad documents as USD-style scene graphs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use vcad_ir::{Document, ObjectKind};
use vcad_usd::{ExportOptions, ExportOutcome, Exporter, NameSource};

#[derive(Parser)]
#[command(name = "vcad")]
#[command(about = "Export vcad documents to USD-style scene graphs", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a document to a JSON prim tree
    Export {
        /// Input document (.json)
        input: PathBuf,
        /// Output stage file
        output: PathBuf,
        /// Options file (TOML); flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Chord-height tolerance in model units
        #[arg(short, long)]
        deflection: Option<f64>,
        /// Export only these objects (repeatable)
        #[arg(short, long = "select", value_name = "ID")]
        select: Vec<String>,
        /// Wrap everything under a prim of this name
        #[arg(long)]
        root_prim: Option<String>,
        /// Name prims by object id instead of label
        #[arg(long)]
        use_ids: bool,
        /// Leave out hidden objects
        #[arg(long)]
        skip_hidden: bool,
        /// Tessellate on a single thread
        #[arg(long)]
        sequential: bool,
        /// Also write the export report (warnings, per-object outcomes)
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },
    /// Display information about a document
    Info {
        /// Input document (.json)
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

/// Level implied by `-v` flags; `None` when `RUST_LOG` already decides.
fn verbosity_filter(verbose: u8, rust_log: Option<&OsStr>) -> Option<log::LevelFilter> {
    if rust_log.is_some() {
        return None;
    }
    Some(match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    })
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = verbosity_filter(verbose, std::env::var_os("RUST_LOG").as_deref()) {
        builder.filter_level(level);
    }

    builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .format(|buf, record| {
            use std::io::Write;
            let level_style = match record.level() {
                log::Level::Error => "\x1b[31mERROR\x1b[0m",
                log::Level::Warn => "\x1b[33mWARN\x1b[0m",
                log::Level::Info => "\x1b[32mINFO\x1b[0m",
                log::Level::Debug => "\x1b[36mDEBUG\x1b[0m",
                log::Level::Trace => "\x1b[35mTRACE\x1b[0m",
            };
            writeln!(buf, "[{}] {}", level_style, record.args())
        })
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Export {
            input,
            output,
            config,
            deflection,
            select,
            root_prim,
            use_ids,
            skip_hidden,
            sequential,
            report,
        } => {
            let mut options = match &config {
                Some(path) => {
                    let text = fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    ExportOptions::from_toml_str(&text)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => ExportOptions::default(),
            };
            if let Some(d) = deflection {
                options.deflection = d;
            }
            if root_prim.is_some() {
                options.root_prim = root_prim;
            }
            if use_ids {
                options.name_source = NameSource::Id;
            }
            options.skip_hidden |= skip_hidden;
            options.parallel &= !sequential;

            export_file(&input, &output, options, select, report.as_deref())
        }
        Commands::Info { file } => show_info(&file),
    }
}

fn load_document(path: &Path) -> Result<Document> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Document::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn export_file(
    input: &Path,
    output: &Path,
    options: ExportOptions,
    select: Vec<String>,
    report_path: Option<&Path>,
) -> Result<()> {
    let doc = load_document(input)?;

    let mut exporter = Exporter::new(&doc, options);
    if !select.is_empty() {
        exporter = exporter.with_selection(select);
    }
    let scene = match exporter.run()? {
        ExportOutcome::Finished(scene) => scene,
        ExportOutcome::Cancelled => bail!("export cancelled"),
    };

    fs::write(output, scene.stage.to_json()?)
        .with_context(|| format!("writing {}", output.display()))?;
    if let Some(path) = report_path {
        fs::write(path, serde_json::to_string_pretty(&scene.report)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    info!("wrote {}", output.display());
    println!(
        "Exported {} prim(s), {} mesh(es), {} triangle(s) to {}",
        scene.report.prims,
        scene.report.meshes,
        scene.report.triangles,
        output.display()
    );
    if !scene.report.warnings.is_empty() {
        println!("{} warning(s); rerun with -v for details", scene.report.warnings.len());
    }
    Ok(())
}

fn show_info(file: &Path) -> Result<()> {
    let doc = load_document(file)?;

    let mut kinds: HashMap<&str, usize> = HashMap::new();
    for obj in &doc.objects {
        let kind = match obj.kind {
            ObjectKind::Group { .. } => "groups",
            ObjectKind::Shape { .. } => "shapes",
            ObjectKind::Link { .. } => "links",
        };
        *kinds.entry(kind).or_default() += 1;
    }
    let faces: usize = doc
        .objects
        .iter()
        .filter_map(|o| o.shape_data())
        .map(|s| s.num_faces())
        .sum();

    println!("vcad document: {}", file.display());
    println!("  Version: {}", doc.version);
    println!("  Objects: {}", doc.objects.len());
    for kind in ["groups", "shapes", "links"] {
        println!("    {}: {}", kind, kinds.get(kind).copied().unwrap_or(0));
    }
    println!("  B-rep faces: {faces}");

    let index = doc.index();
    let roots = doc.root_ids();
    println!("\nRoots ({}):", roots.len());
    for id in &roots {
        let label = index
            .get(id.as_str())
            .map(|o| o.label.as_str())
            .filter(|l| !l.is_empty())
            .unwrap_or("unnamed");
        println!("  {id}: {label}");
    }
    Ok(())
}
