use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::export::ExportFormat;

#[derive(Parser, Debug)]
#[command(name = "tsfleet", version, about = "Multi-tenant time-series fleet provisioning")]
struct Cli {
    /// Fleet configuration file.
    #[arg(long, global = true, default_value = "fleet.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the fleet and print a per-resource summary.
    Status,

    /// Destroy and recreate every tenant resource, then verify.
    Reset {
        /// Skip the interactive confirmation. Dangerous: nothing else
        /// stands between this flag and the drop calls.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Export one tenant's records to JSON and/or CSV.
    Export {
        /// Tenant id (e.g. team01).
        #[arg(long)]
        tenant: String,

        /// Only records from the last N hours.
        #[arg(long)]
        hours: Option<i64>,

        /// At most N records, newest first.
        #[arg(long)]
        limit: Option<u64>,

        #[arg(long, value_enum, default_value_t = ExportFormat::Both)]
        format: ExportFormat,

        /// Output base name (extension appended per format).
        #[arg(long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Status => commands::status::run(&cli.config).await?,
        Command::Reset { yes } => commands::reset::run(&cli.config, yes).await?,
        Command::Export {
            tenant,
            hours,
            limit,
            format,
            output,
        } => commands::export::run(&cli.config, &tenant, hours, limit, format, output).await?,
    }

    Ok(())
}
