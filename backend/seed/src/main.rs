use std::path::PathBuf;

use clap::Parser;
use garden::{
    config::{Backend, Config},
    store::{self, Seed},
};
use tracing::warn;

/// Seeds the configured store's plant catalog if it is empty.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Catalog JSON file, defaults to CATALOG_PATH or the bundled demo set
    catalog: Option<PathBuf>,

    /// Only load and report the catalog, do not connect
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    garden::init_tracing();

    let args = Args::parse();
    let mut config = Config::load()?;

    if let Some(path) = args.catalog {
        config.catalog_path = Some(path);
    }

    let plants = catalog::load_catalog(config.catalog_path.as_deref())?;
    println!("Loaded Plants: {}", plants.len());

    if args.dry_run {
        for plant in &plants {
            println!("{:>4}  {}", plant.id, plant.name_lat);
        }

        return Ok(());
    }

    if config.backend == Backend::Memory {
        warn!("STORE_BACKEND is memory, seeded plants will not outlive this process");
    }

    let store = store::connect(&config).await?;
    let seed = store.seed_plants(&plants).await;
    store.close().await;

    match seed? {
        Seed::Inserted(count) => println!("Inserted Plants: {count}"),
        Seed::AlreadySeeded(count) => {
            println!("Catalog already holds {count} plants. Exiting.")
        }
    }

    Ok(())
}
