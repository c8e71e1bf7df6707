use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use jhub_store::{
    copy::{copy_file, CopyStatus, CopyTask},
    files::{create_dir, list_files},
    kubeclaim::Client,
    login::login,
    session::Session,
    Config, Context,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Operate on JupyterHub user volumes.
#[derive(Parser, Debug)]
#[command(name = "jhub-store")]
#[command(version)]
struct Cli {
    /// TOML configuration file. `JHUB_*` variables are used if omitted.
    #[arg(short, long, global = true, env = "JHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Keep polling until the user's volume is bound.
    #[arg(short, long, global = true)]
    wait: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve (and if needed provision) the user's volume
    Login { user: String },
    /// List a directory in the user's volume
    Ls {
        user: String,
        #[arg(default_value = "/")]
        dir: String,
    },
    /// Create a directory in the user's volume
    Mkdir {
        user: String,
        parent: String,
        name: String,
    },
    /// Copy a local file into the user's volume
    Cp {
        user: String,
        file: PathBuf,
        #[arg(default_value = "/")]
        target_dir: String,
    },
}

impl Command {
    fn user(&self) -> &str {
        match self {
            Command::Login { user }
            | Command::Ls { user, .. }
            | Command::Mkdir { user, .. }
            | Command::Cp { user, .. } => user,
        }
    }
}

async fn run(cli: Cli) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let config = match cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let ctx = Context::new(Client::from_env().await?, config);
    let session: Session = login(&ctx, Some(cli.command.user()), cli.wait).await?;

    let output = match cli.command {
        Command::Login { .. } => serde_json::to_value(&session)?,
        Command::Ls { dir, .. } => serde_json::to_value(list_files(&session, &dir).await?)?,
        Command::Mkdir { parent, name, .. } => {
            json!({ "created": create_dir(&session, &parent, &name).await })
        }
        Command::Cp {
            file, target_dir, ..
        } => {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or("source has no file name")?;
            let source = tokio::fs::File::open(&file).await?;

            let handle = copy_file(&ctx, &session, &target_dir, CopyTask::new(name, source)).await;
            let status = handle.wait().await;

            json!({
                "destination": handle.destination(),
                "status": status,
                "error": (status == CopyStatus::Error)
                    .then(|| handle.failure().map(|f| f.to_string()))
                    .flatten(),
            })
        }
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let disposition = e
                .downcast_ref::<jhub_store::errors::Error>()
                .map(|e| e.disposition().to_string());

            println!("{:#}", json!({ "error": e.to_string(), "disposition": disposition }));
            ExitCode::FAILURE
        }
    }
}
