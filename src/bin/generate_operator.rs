use std::{error::Error, path::PathBuf};

use clap::Parser;
use dropbath::domain::{
    dtn,
    store::{DiskStore, OperatorStore},
    DomainKey,
};
use log::info;
use std::sync::Arc;

#[derive(Debug, clap::Parser)]
#[command(
    name = "dropbath_generate_operator",
    about = "Precompute the bath's Dirichlet-to-Neumann operator"
)]
pub struct GenerateCli {
    // Domain radius, in drop radii.
    #[arg(short = 'D', long = "domain-radius")]
    pub domain_radius: u32,

    #[arg(short = 'p', long = "points-per-radius")]
    pub points_per_radius: u32,

    // Fourier-Bessel modes kept; all of them by default.
    #[arg(short = 'm', long = "truncation")]
    pub truncation: Option<u32>,

    #[arg(long = "operators", default_value = "operators")]
    pub operator_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = GenerateCli::parse();

    let key = DomainKey::new(args.domain_radius, args.points_per_radius, args.truncation);
    info!("Generating operator for ({key})");
    let operator = dtn::generate(&key)?;

    let mut store = DiskStore::new(&args.operator_dir);
    store.store(&key, Arc::new(operator))?;
    info!("Done! Wrote {}", store.path_for(&key).display());
    Ok(())
}
