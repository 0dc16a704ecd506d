use std::{error::Error, path::PathBuf, sync::Arc};

use clap::Parser;
use dropbath::{
    config::setup::SetupConfig,
    domain::store::DiskStore,
    dynamics::{RunOutcome, Simulation},
    output::RunWriter,
};
use log::{info, warn};

#[derive(Debug, clap::Parser)]
#[command(name = "dropbath_run", about = "Run a drop-on-bath impact simulation")]
pub struct RunCli {
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,

    #[arg(short = 'o', long = "output")]
    pub output_dir: Option<PathBuf>,

    #[arg(long = "operators", default_value = "operators")]
    pub operator_dir: PathBuf,

    #[arg(short = 'd', long = "dstep-view", default_value_t = 100)]
    pub dstep_view: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = RunCli::parse();

    let config = SetupConfig::parse(&args.config)?;
    config.print();

    let output_dir = match args.output_dir.or_else(|| config.output_dir.clone()) {
        Some(dir) => dir,
        None => {
            warn!("No output directory given, using ./run");
            PathBuf::from("run")
        }
    };

    let mut store = DiskStore::new(&args.operator_dir);
    let mut sim = Simulation::from_config(&config, &mut store, args.dstep_view)?;
    let mut writer = RunWriter::create(&output_dir, sim.constants(), Arc::clone(sim.operator()))?;

    let summary = sim.run(Some(&mut writer))?;
    let units = sim.constants().units;
    match summary.outcome {
        RunOutcome::Rebound => info!(
            "Rebound after {:.4} ms, restitution {:.3}",
            1e3 * summary.contact_time.unwrap_or(0.0) * units.time,
            summary.restitution.unwrap_or(0.0)
        ),
        RunOutcome::Contact => info!("Drop still in contact at t={:.4} T", summary.final_time),
        RunOutcome::NoContact => info!("Drop never reached the bath"),
    }
    info!("Done! Output in {}", writer.dir().display());
    Ok(())
}
