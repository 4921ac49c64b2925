use std::{fs::File, io::BufWriter, path::PathBuf};

use clap::Parser;
use log::{error, info};

use depot_alloc::{
    allocate,
    config::{Backend, CapacityScope, LexMode},
    solver, AllocationConfig, RawTables,
};

/// Choose the project to fund and the depot transfers that go with it.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Transport costs: JSON object mapping "(origin, destination, material)" to a unit cost
    #[clap(long)]
    costs: PathBuf,
    /// Depot stock: JSON array of {COD_DEP, COD_MAT, ESTOQ}
    #[clap(long)]
    stock: PathBuf,
    /// Project demand: JSON array of {OBRA, COD_MAT, QTD_DEM, PRIOR}
    #[clap(long)]
    projects: PathBuf,
    /// JSON file with solver settings; flags below override it
    #[clap(long)]
    config: Option<PathBuf>,
    /// Which transport terms enter each capacity row
    #[clap(long, arg_enum)]
    scope: Option<CapacityScope>,
    /// Whether the cost phase optimum is locked before the priority phase
    #[clap(long, arg_enum)]
    mode: Option<LexMode>,
    /// Solver backend
    #[clap(long, arg_enum)]
    backend: Option<Backend>,
    /// Time limit per solve in seconds (gurobi only)
    #[clap(long)]
    time_limit: Option<f64>,
    /// Where to write the JSON report. Printed to stdout if omitted.
    #[clap(short, long)]
    output: Option<PathBuf>,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AllocationConfig::from_file(path)?,
        None => AllocationConfig::default(),
    };
    if let Some(scope) = args.scope {
        config.capacity_scope = scope;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if args.time_limit.is_some() {
        config.time_limit = args.time_limit;
    }
    info!("{:?}", config);

    let tables = RawTables::from_files(&args.costs, &args.stock, &args.projects)?;
    let solver = solver::from_config(&config)?;
    let result = allocate(&tables, &config, solver)?;
    let report = result.report(config.report_threshold);

    match &args.output {
        Some(path) => {
            let file = File::create(path)?;
            serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
            info!("report written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        error!("{}", e);
        std::process::exit(1);
    }
}
