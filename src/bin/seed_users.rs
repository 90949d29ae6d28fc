use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use deptqa::core::config::{discover_project_root, AppPaths, ConfigService};
use deptqa::core::logging;
use deptqa::users::{default_accounts, seed_users, MongoUserStore, SeedAccount};

/// Create user accounts in MongoDB
#[derive(Parser, Debug)]
#[command(name = "deptqa-seed-users")]
#[command(about = "Seed the users collection", long_about = None)]
struct Args {
    /// Account as username:password:department; repeat for several.
    /// Defaults to the sample accounts.
    #[arg(long = "user")]
    users: Vec<SeedAccount>,

    /// YAML settings file (defaults to ./config.yml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = ConfigService::new(discover_project_root()).with_config_path(args.config);
    let settings = config.load_settings().context("Failed to load settings")?;
    let paths = AppPaths::new(config.project_root().to_path_buf(), &settings.storage);
    logging::init(&paths.log_dir, "deptqa-seed-users.log");

    let store = MongoUserStore::connect(&settings.mongo)
        .await
        .context("Failed to connect to MongoDB")?;

    let accounts = if args.users.is_empty() {
        default_accounts()
    } else {
        args.users
    };

    let report = seed_users(&store, &accounts).await;
    println!(
        "created={} already_present={} errors={}",
        report.created,
        report.skipped,
        report.errors.len()
    );

    if !report.errors.is_empty() {
        for error in &report.errors {
            eprintln!("  {}", error);
        }
        anyhow::bail!("{} accounts could not be created", report.errors.len());
    }

    Ok(())
}
