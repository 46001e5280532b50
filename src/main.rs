//! One-shot tablespace reconciliation command.
//!
//! Inspects a PostgreSQL server and issues the minimal DDL to make one
//! tablespace match the requested state. Prints a JSON report on stdout:
//! `{"changed": ..., "name": ..., "state": ..., "queries": [...]}` on
//! success, `{"failed": true, "msg": ...}` on failure.

use clap::Parser;
use pgspace::*;

/// Converge a PostgreSQL tablespace toward a desired state.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tablespace identifier.
    name: String,
    /// Role used to log in.
    #[arg(long, default_value = "postgres")]
    login_user: String,
    /// Password for the login role; empty means none.
    #[arg(long)]
    login_password: Option<String>,
    /// Server host; omitted means the driver default.
    #[arg(long)]
    login_host: Option<String>,
    /// Server port.
    #[arg(long, default_value_t = 5432)]
    port: u16,
    /// Maintenance database to connect to.
    #[arg(long)]
    db: Option<String>,
    /// Role assumed with SET ROLE right after connecting.
    #[arg(long)]
    session_role: Option<String>,
    /// Desired owning role; omitted means ownership is never touched.
    #[arg(long)]
    owner: Option<String>,
    /// Desired filesystem path; fixed at creation time.
    #[arg(long)]
    location: Option<String>,
    /// Desired tablespace option; the value `reset` resets it.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_set)]
    set: Vec<(String, OptionValue)>,
    /// Desired state of the tablespace.
    #[arg(long, value_enum, default_value_t = DesiredState::Present)]
    state: DesiredState,
    /// Inspect and report without issuing any DDL.
    #[arg(long)]
    check: bool,
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn params(&self) -> ConnectionParams {
        ConnectionParams::new(
            self.login_host.clone(),
            Some(self.login_user.clone()),
            self.login_password.clone(),
            Some(self.port),
            self.db.clone(),
            self.session_role.clone(),
        )
    }

    fn spec(&self) -> TablespaceSpec {
        TablespaceSpec {
            name: self.name.clone(),
            owner: self.owner.clone().filter(|s| !s.is_empty()),
            location: self.location.clone().filter(|s| !s.is_empty()),
            options: self.set.iter().cloned().collect(),
            desired: self.state,
        }
    }
}

async fn run(args: &Args) -> Result<Report, TablespaceError> {
    let (client, capabilities) = connect(&args.params()).await?;
    let reconciler = Reconciler::new(client, capabilities);
    reconciler.reconcile(&args.spec(), args.check).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    log(match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    });
    match run(&args).await {
        Ok(report) => {
            println!(
                "{}",
                serde_json::to_string(&report).expect("report serialization")
            );
        }
        Err(error) => {
            log::error!("{}", error);
            println!(
                "{}",
                serde_json::json!({ "failed": true, "msg": error.to_string() })
            );
            std::process::exit(1);
        }
    }
}
