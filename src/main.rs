use log::{info, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use flate2::read::MultiGzDecoder;

use fragment_graph::{
    load_sequence_file, open_unitig_file, populate_catalogs, read_messages,
    write_fragment_end_file, write_overlap_file, BreakerCatalog, BreakerKind,
    EditDistanceAligner, GraphConfig, GraphRepairEngine, OverlapGraphStore, OverlapStoreFile,
    Realigner, RepairMode, Thresholds,
};

/// Build a fragment overlap graph and repair it with chimera and spur breakers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// FASTA/FASTQ file of fragments; record ids are fragment iids
    #[arg(short = 'F', long)]
    fragments: PathBuf,

    /// Text file of OVL overlap messages (repeatable)
    #[arg(long)]
    ovl: Vec<PathBuf>,

    /// Binary overlap-store file
    #[arg(long)]
    ovl_store: Option<PathBuf>,

    /// Chimera breaker patterns
    #[arg(short = 'H')]
    chimeras: Option<PathBuf>,

    /// Spur breaker patterns
    #[arg(short = 'S')]
    spurs: Option<PathBuf>,

    /// Repair mode: 1 mark all, 2 remove all, 3 add overlaps or mark, 4 add overlaps or remove
    #[arg(short = 'g', default_value_t = 1)]
    mode: u8,

    /// Output file for overlaps found by repair
    #[arg(short = 'O')]
    overlaps_out: Option<PathBuf>,

    /// Output file for fragment ends labelled by repair
    #[arg(short = 'r')]
    iids_out: Option<PathBuf>,

    /// Maximum dovetail edges kept per fragment end
    #[arg(short = 'x', default_value_t = 100)]
    dovetail_threshold: u32,

    /// Maximum containment edges kept per fragment end
    #[arg(short = 'z', default_value_t = 100)]
    containment_threshold: u32,

    /// Allow non-blessed edges into blessed fragment ends
    #[arg(long)]
    intrude: bool,

    /// Input already carries both directions of every dovetail
    #[arg(long)]
    assume_symmetric: bool,

    /// Keep breaker patterns that name the same unitig twice
    #[arg(long)]
    no_validate_breakers: bool,

    /// Unitig layout files (JSON lines, ascending iid)
    unitigs: Vec<PathBuf>,

    /// Verbose/info output (default: quiet)
    #[arg(long, short = 'v', alias = "info")]
    verbose: bool,

    /// Debug output
    #[arg(long)]
    debug: bool,

    /// Trace output
    #[arg(long)]
    trace: bool,
}

fn log_level(args: &Args) -> &'static str {
    if args.trace {
        "trace"
    } else if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "error"
    }
}

fn main() {
    let args = Args::parse();
    let log_level = log_level(&args);
    unsafe {
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    if let Err(error) = run_pipeline(&args) {
        eprintln!("Graph construction failed: {error:?}");
        std::process::exit(1);
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

fn open_text(path: &Path) -> Result<Box<dyn std::io::BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn run_pipeline(args: &Args) -> Result<()> {
    let mode = RepairMode::from_selector(args.mode)?;
    if mode.searches_overlaps() && args.overlaps_out.is_none() {
        warn!("Mode {} finds overlaps but no -O file was given", args.mode);
    }

    let config = GraphConfig {
        thresholds: Thresholds {
            dovetail: args.dovetail_threshold,
            containment: args.containment_threshold,
        },
        intrude_with_non_blessed: args.intrude,
        assume_symmetric_input: args.assume_symmetric,
        validate_breakers: !args.no_validate_breakers,
        ..Default::default()
    };
    config.validate()?;

    let fragments = load_sequence_file(&args.fragments)
        .with_context(|| format!("Failed to load fragments from {}", args.fragments.display()))?;
    let mut graph = OverlapGraphStore::from_store(&fragments, config)?;
    info!("Loaded {} fragments", graph.fragments().len());

    for path in &args.ovl {
        let messages = read_messages(open_text(path)?, &path.display().to_string())?;
        graph.ingest_messages(messages)?;
    }
    if let Some(path) = &args.ovl_store {
        let store = OverlapStoreFile::open(path)
            .with_context(|| format!("Failed to map overlap store {}", path.display()))?;
        graph.ingest_store_records(store.iter())?;
    }
    if !config.assume_symmetric_input {
        graph.check_symmetry();
    }
    info!("Graph holds {} edges", graph.num_edges());

    let load = |path: &Option<PathBuf>, kind: BreakerKind| -> Result<Option<BreakerCatalog>> {
        path.as_ref()
            .map(|p| {
                BreakerCatalog::from_file(p, kind, config.validate_breakers)
                    .with_context(|| format!("Failed to read {} file {}", kind.name(), p.display()))
            })
            .transpose()
    };
    let mut chimeras = load(&args.chimeras, BreakerKind::Chimera)?;
    let mut spurs = load(&args.spurs, BreakerKind::Spur)?;
    if chimeras.is_none() && spurs.is_none() {
        info!("No breaker files given, nothing to repair");
        return Ok(());
    }
    if args.unitigs.is_empty() {
        bail!("breaker patterns need unitig layout files");
    }

    {
        let mut catalogs: Vec<&mut BreakerCatalog> =
            chimeras.iter_mut().chain(spurs.iter_mut()).collect();
        let mut readers = Vec::with_capacity(args.unitigs.len());
        for path in &args.unitigs {
            readers.push(open_unitig_file(path)?);
        }
        populate_catalogs(&mut catalogs, readers.into_iter().flatten())?;
    }

    let aligner = EditDistanceAligner::default();
    let mut engine = GraphRepairEngine::new(mode);
    if mode.searches_overlaps() {
        engine = engine.with_realigner(Realigner::new(&fragments, &aligner));
    }
    let plan = engine.plan(chimeras.as_ref(), spurs.as_ref())?;

    if let Some(path) = &args.overlaps_out {
        let mut out = create_output(path)?;
        let (written, rejected) = write_overlap_file(&mut out, &plan.overlaps)?;
        out.flush()?;
        info!("Wrote {written} overlaps to {} ({rejected} rejected)", path.display());
    }
    if let Some(path) = &args.iids_out {
        let mut out = create_output(path)?;
        write_fragment_end_file(&mut out, &plan.fragment_ends)?;
        out.flush()?;
        info!(
            "Wrote {} fragment ends to {}",
            plan.fragment_ends.len(),
            path.display()
        );
    }

    let stats = engine.apply(&plan, &mut graph)?;
    info!(
        "Repair done: {} overlaps added, {} fragments labelled, graph holds {} edges",
        stats.overlaps_added,
        stats.fragments_labeled,
        graph.num_edges()
    );
    Ok(())
}
