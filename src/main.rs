use anyhow::{bail, Result};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use busline_seeder::pipeline::{self, StageSummary};
use busline_seeder::Paths;

const USAGE: &str = "\
Usage: busline-seeder <stage> [data-dir]

Stages:
  geo        province/district/ward tables from provinces.json
  stations   resolve scraped addresses, emit address + station tables
  routes     resolve ticket endpoints, emit the route table
  trips      match tickets to routes, emit the trip table
  layout     seat_map/floor/seat tables from the vehicle fleet
  all        every stage in order

Inputs are read from [data-dir] (default: current directory); generated
tables land in [data-dir]/csv_output.";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(stage) = args.get(1) else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    let root = args.get(2).map(String::as_str).unwrap_or(".");
    let paths = Paths::from_root(Path::new(root));
    let mut rng = XorShiftRng::from_entropy();

    println!("Busline Seeder v{}", busline_seeder::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let summaries = match stage.as_str() {
        "geo" => vec![pipeline::geo::run(&paths)?],
        "stations" => vec![pipeline::stations::run(&paths, &mut rng)?],
        "routes" => vec![pipeline::routes::run(&paths, &mut rng)?],
        "trips" => vec![pipeline::trips::run(&paths, &mut rng)?],
        "layout" => vec![pipeline::layout::run(&paths)?],
        "all" => run_all(&paths, &mut rng)?,
        other => {
            eprintln!("{USAGE}");
            bail!("unknown stage: {other}");
        }
    };

    println!();
    for summary in &summaries {
        println!("✓ {summary}");
    }
    let appended: usize = summaries.iter().map(StageSummary::appended_total).sum();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if appended == 0 {
        println!("✓ Dataset already up to date, nothing appended");
    } else {
        println!("✓ Appended {appended} rows total");
    }

    Ok(())
}

fn run_all(paths: &Paths, rng: &mut XorShiftRng) -> Result<Vec<StageSummary>> {
    Ok(vec![
        pipeline::geo::run(paths)?,
        pipeline::stations::run(paths, rng)?,
        pipeline::routes::run(paths, rng)?,
        pipeline::trips::run(paths, rng)?,
        pipeline::layout::run(paths)?,
    ])
}
