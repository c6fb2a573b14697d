use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use catalogue_flattener::config::Settings;
use catalogue_flattener::store::{open_catalogue_store, open_user_data_store};
use catalogue_flattener::{
    catalogue_into_store, flatten_all, log, strip_preamble, user_data_into_store, CatalogueFetcher, USER_DATA_TABLE,
};

#[derive(Parser, Debug)]
#[command(name = "catalogue-flattener", about = "Fetch, flatten and store vocabulary catalogues")]
struct Cli {
    /// Config file (defaults to ./catalogue.toml when present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch catalogues from the export API and store their term tables.
    Fetch {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Flatten a local XML export and print it.
    Flatten {
        file: PathBuf,
        /// Print metadata, hierarchy, attribute and full term tables.
        #[arg(long)]
        all: bool,
    },
    /// Store a CSV or Excel upload as the data to be enriched.
    Ingest { file: PathBuf },
    /// Print a stored table.
    Show {
        table: String,
        /// Read from the user data store instead of the catalogue store.
        #[arg(long)]
        user_data: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let _guard = log::init(&settings);

    match cli.command {
        Command::Fetch { codes } => {
            let fetcher = CatalogueFetcher::from_settings(&settings)?;
            let mut store = open_catalogue_store(&settings)?;
            for code in &codes {
                // Stop at the first failure.
                match catalogue_into_store(&fetcher, store.as_mut(), code) {
                    Ok(terms) => info!(catalogue = %code, terms = terms.num_rows(), "Done"),
                    Err(e) => {
                        error!(catalogue = %code, error = %e, "Catalogue failed");
                        return Err(e).with_context(|| format!("Failed to store catalogue {}", code));
                    }
                }
            }
        }
        Command::Flatten { file, all } => {
            let body = fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let tables = flatten_all(&strip_preamble(&body))?;
            if all {
                println!("# metadata\n{}", tables.metadata);
                println!("# hierarchies\n{}", tables.hierarchies);
                println!("# attributes\n{}", tables.attributes);
                println!("# terms\n{}", tables.terms);
            } else {
                print!("{}", tables.term_projection());
            }
        }
        Command::Ingest { file } => {
            let mut store = open_user_data_store(&settings)?;
            let table = user_data_into_store(store.as_mut(), &file)?;
            println!("Stored {} rows as {}", table.num_rows(), USER_DATA_TABLE);
        }
        Command::Show { table, user_data } => {
            let store = if user_data {
                open_user_data_store(&settings)?
            } else {
                open_catalogue_store(&settings)?
            };
            print!("{}", store.read_table(&table)?);
        }
    }

    Ok(())
}
