use anyhow::{Context, Result};
use cadence_core::{generate_accounts, AccountStore, JsonFileStore};
use clap::Parser;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "keygen")]
#[command(about = "Generate deterministic secp256k1 test accounts")]
struct Args {
    /// Output file path
    #[arg(long, default_value = "accounts.json")]
    out: PathBuf,

    /// Number of accounts to generate
    #[arg(long, default_value = "100")]
    count: usize,

    /// Deterministic seed
    #[arg(long, default_value = "123")]
    seed: u64,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.out.exists() && !args.force {
        anyhow::bail!("{:?} already exists; pass --force to overwrite", args.out);
    }

    println!("Generating {} accounts with seed {}", args.count, args.seed);

    let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed);
    let accounts = generate_accounts(args.count, &mut rng);

    JsonFileStore::new(&args.out)
        .save(&accounts)
        .with_context(|| format!("Failed to write {:?}", args.out))?;

    if let Some(first) = accounts.first() {
        println!("First address: {}", first.address);
    }
    println!("Accounts written to: {:?}", args.out);
    println!();
    println!("WARNING: These keys are deterministic and for testing only.");
    println!("Fund them before a run (see `prefund` for the amount).");
    println!("DO NOT commit the key file to version control!");

    Ok(())
}
