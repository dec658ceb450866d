//! Command line definitions and the remote-caller commands.

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use colored::Colorize;
use rn_core::registry::RegistryClient;
use rn_core::rpc::{ScriptReply, WorkerClient};
use rn_core::script::Script;
use rn_protocol::{
    RunScriptRequest, StartRequest, WorkerConfig, WorkerState, WorkerStatus,
    DEFAULT_REGISTRY_PORT,
};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "runnode")]
#[command(version)]
#[command(about = "Run model scripts on named worker machines")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base URL of the name registry [default: http://localhost:9090]
    #[arg(long, global = true, env = "RUNNODE_REGISTRY_URL")]
    pub registry: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Registry given on the command line or in the environment, else the
    /// local default.
    pub fn registry_url(&self) -> String {
        self.registry
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{DEFAULT_REGISTRY_PORT}"))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a worker on this machine
    Serve(ServeArgs),

    /// Name registry commands
    #[command(subcommand)]
    Names(NamesCommand),

    /// Show a worker's status
    Status {
        /// Registered worker name
        name: String,

        /// Print the raw JSON status
        #[arg(long)]
        json: bool,
    },

    /// Check whether a worker is busy
    Busy { name: String },

    /// Launch a single command on a worker
    Start {
        name: String,

        /// Shell command line
        command: String,

        /// Working directory on the worker
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Wait for the command to exit
        #[arg(long)]
        wait: bool,

        /// Run ledger identifier to report completion to
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Run a script file on a worker
    Run {
        name: String,

        /// Script file, one command per line
        script: PathBuf,

        #[arg(long)]
        project: String,

        /// Series identifier, e.g. AB
        #[arg(long)]
        series: String,

        #[arg(long)]
        run_id: Option<String>,

        /// Wait for the script to end
        #[arg(long)]
        wait: bool,
    },

    /// Stop the job running on a worker
    Kill { name: String },

    /// Print the series identifier for a run count
    Series { count: u32 },
}

#[derive(Subcommand, Debug)]
pub enum NamesCommand {
    /// Run a name server
    Serve {
        #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_REGISTRY_PORT)))]
        listen: SocketAddr,
    },

    /// List registered workers
    List,
}

/// Worker flags; each one overrides the config file and environment.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Config file (default: runnode.toml when present)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Name to register under (default: host name)
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// URL callers use to reach this worker
    #[arg(long)]
    pub advertise_url: Option<String>,

    /// Base URL of the run ledger
    #[arg(long)]
    pub ledger: Option<String>,

    /// Directory job directories are created in
    #[arg(long)]
    pub work_root: Option<PathBuf>,

    /// Local log file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServeArgs {
    /// Layer the flags over `config`.
    ///
    /// `registry` is the global `--registry` value; it only overrides the
    /// config when it was given.
    pub fn apply(&self, mut config: WorkerConfig, registry: Option<&str>) -> WorkerConfig {
        if let Some(registry) = registry {
            config.registry_url = registry.to_string();
        }
        if let Some(name) = &self.name {
            config.name = Some(name.clone());
        }
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(url) = &self.advertise_url {
            config.advertise_url = Some(url.clone());
        }
        if let Some(ledger) = &self.ledger {
            config.ledger_url = ledger.clone();
        }
        if let Some(root) = &self.work_root {
            config.work_root = root.clone();
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
        config
    }
}

pub async fn list_names(registry_url: &str) -> Result<()> {
    let registry = RegistryClient::new(registry_url)?;
    let records = registry.list().await?;
    if records.is_empty() {
        println!("{}", "No workers registered".dimmed());
    }
    for record in records {
        println!("{:<20} {}", record.name.bold(), record.address);
    }
    Ok(())
}

/// Resolve the worker named by `command` and invoke the operation.
pub async fn call_worker(registry_url: &str, command: Command) -> Result<()> {
    tracing::debug!(registry = registry_url, "Resolving worker");
    let registry = RegistryClient::new(registry_url)?;

    match command {
        Command::Status { name, json } => {
            let status = connect(&registry, &name).await?.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Command::Busy { name } => {
            let busy = connect(&registry, &name).await?.is_busy().await?;
            println!("{}", if busy { "busy".yellow() } else { "available".green() });
        }
        Command::Start {
            name,
            command,
            cwd,
            wait,
            run_id,
        } => {
            let client = connect(&registry, &name).await?;
            let request = StartRequest {
                command,
                cwd,
                wait,
                run_id,
            };
            let response = client.start(&request).await?;
            match response.exit_code {
                Some(code) => report_exit(&response.job_id.to_string(), code)?,
                None => println!("{} job {}", "Started".green(), response.job_id),
            }
        }
        Command::Run {
            name,
            script,
            project,
            series,
            run_id,
            wait,
        } => {
            let lines = Script::load(&script)
                .wrap_err_with(|| format!("Failed to read script {}", script.display()))?
                .into_lines();
            let client = connect(&registry, &name).await?;
            let request = RunScriptRequest {
                lines,
                project,
                series,
                run_id,
                wait,
            };
            match client.run_script(&request).await? {
                ScriptReply::Accepted(ticket) => println!(
                    "{} job {} ({} steps in {})",
                    "Accepted".green(),
                    ticket.job_id,
                    ticket.steps,
                    ticket.cwd.display()
                ),
                ScriptReply::Finished(outcome) => {
                    println!("{}/{} steps run", outcome.steps_run, outcome.steps_total);
                    report_exit(&outcome.job_id.to_string(), outcome.exit_code)?;
                }
            }
        }
        Command::Kill { name } => {
            if connect(&registry, &name).await?.kill().await? {
                println!("{}", "Termination requested".yellow());
            } else {
                println!("{}", "Worker is idle, nothing to kill".dimmed());
            }
        }
        other => bail!("{other:?} is not a worker command"),
    }

    Ok(())
}

async fn connect(registry: &RegistryClient, name: &str) -> Result<WorkerClient> {
    WorkerClient::connect(registry, name)
        .await
        .wrap_err_with(|| format!("Failed to reach worker '{name}'"))
}

fn report_exit(job_id: &str, exit_code: i32) -> Result<()> {
    if exit_code == 0 {
        println!("{} job {}", "Succeeded".green(), job_id);
        Ok(())
    } else {
        bail!("Job {job_id} failed with exit code {exit_code}")
    }
}

fn print_status(status: &WorkerStatus) {
    let state = match status.state {
        WorkerState::Idle => status.state.to_string().green(),
        WorkerState::Running => status.state.to_string().yellow(),
        WorkerState::Terminating => status.state.to_string().red(),
    };
    println!("{} {}", status.name.bold(), state);
    println!("  exit code: {}", status.exit_code);
    if let Some(command) = &status.command {
        println!("  command:   {command}");
    }
    if let Some(cwd) = &status.cwd {
        println!("  cwd:       {}", cwd.display());
    }
    if let Some(run_id) = &status.run_id {
        println!("  run id:    {run_id}");
    }
    if let Some(started_at) = status.started_at {
        println!("  started:   {started_at}");
    }
    println!("  steps:     {}", status.steps_completed);
}
