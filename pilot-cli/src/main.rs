use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pilot_store::SqliteStore;
use pilot_sync::SyncTarget;

mod commands;
mod config;
mod scheduler;
mod state;
mod transport;

use commands::{AddOptions, App};
use config::Config;
use scheduler::LoopContext;
use transport::{ConsoleTransport, TelegramTransport, Transport};

#[derive(Parser, Debug)]
#[command(
    name = "pilot",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("PILOT_BUILD_SHA"), ")"),
    about = "Daily pilot: ranked tasks, a Frog/Stones/Sand plan and timely nudges"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Task(TaskCommand),

    /// Config file at ~/.pilot/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Run the background loops until Ctrl-C
    Run,
}

/// Commands of the interactive path; each opens the store once.
#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Add a task
    Add {
        /// Task title
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// When it is due: "2026-03-10 18:00", "10.03 18:00", "18:00", "завтра 10:00", "in 2 hours"
        #[arg(long)]
        due: Option<String>,

        /// work, home, health, family, finance, system, other, or any label
        #[arg(long)]
        context: Option<String>,

        /// text, voice, import or generated
        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Open tasks without a deadline
    Inbox,

    /// Today's Frog, Stones and Sand
    Plan,

    /// Open tasks due in the next 7 days
    Week,

    /// Mark a task done
    Done { id: i64 },

    /// Move a task's deadline
    Snooze {
        id: i64,
        #[arg(required = true, num_args = 1..)]
        when: Vec<String>,
    },

    /// Drop a task
    Drop { id: i64 },

    /// Write every task to a CSV file
    Export {
        #[arg(long, default_value = "tasks_export.csv")]
        out: PathBuf,
    },

    /// Counts, weekly productivity and top contexts
    Stats,

    /// Timezone, database, latest backup and transport
    Health,

    /// Weekly review now; the automatic one is skipped for today
    Review,

    /// Database snapshots
    Backup {
        #[command(subcommand)]
        command: BackupCommand,
    },

    /// Exchange the plan with the CSV sheet
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommand {
    Create,
    List {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum SyncCommand {
    /// Write today's plan and the week layout
    Push,
    /// Import Week_Tasks rows as tasks (already known rows are skipped)
    Pull,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Init,
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.general.log_level)),
        )
        .init();

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                println!("# {}", config::config_path()?.display());
                print!("{}", config::show_config(&cfg)?);
            }
        },

        Command::Run => run(&cfg).await?,

        Command::Task(command) => {
            cfg.validate()?;
            let app = App::open(&cfg)?;
            dispatch(&app, &cfg, command)?;
        }
    }

    Ok(())
}

fn dispatch(app: &App, cfg: &Config, command: TaskCommand) -> Result<()> {
    let now = Utc::now();
    match command {
        TaskCommand::Add {
            text,
            due,
            context,
            source,
            description,
        } => {
            let opts = AddOptions {
                due,
                context,
                source,
                description,
            };
            println!("{}", app.add(&text.join(" "), &opts, now)?);
        }
        TaskCommand::Inbox => println!("{}", app.inbox()?),
        TaskCommand::Plan => println!("{}", app.plan(now)?),
        TaskCommand::Week => println!("{}", app.week(now)?),
        TaskCommand::Done { id } => println!("{}", app.done(id)?),
        TaskCommand::Snooze { id, when } => println!("{}", app.snooze(id, &when.join(" "), now)?),
        TaskCommand::Drop { id } => println!("{}", app.drop_task(id)?),
        TaskCommand::Export { out } => {
            let n = app.export(&out)?;
            println!("Exported {n} task(s) to {}", out.display());
        }
        TaskCommand::Stats => println!("{}", app.stats(now)?),
        TaskCommand::Health => println!("{}", app.health(transport_name(cfg))?),
        TaskCommand::Review => println!("{}", app.review(now)?),
        TaskCommand::Backup { command } => match command {
            BackupCommand::Create => match app.backup_create(now)? {
                Some(p) => println!("Backup written: {}", p.display()),
                None => println!("No database yet; nothing to back up"),
            },
            BackupCommand::List { limit } => println!("{}", app.backup_list(limit)?),
        },
        TaskCommand::Sync { command } => match command {
            SyncCommand::Push => println!("{}", app.sync_push(now)?),
            SyncCommand::Pull => println!("{}", app.sync_pull(now)?),
        },
    }
    Ok(())
}

fn transport_name(cfg: &Config) -> &'static str {
    if cfg.bot_token().is_some() { "telegram" } else { "console" }
}

fn make_transport(cfg: &Config) -> Result<Arc<dyn Transport>> {
    Ok(match cfg.bot_token() {
        Some(token) => Arc::new(TelegramTransport::new(token)?),
        None => {
            tracing::warn!("no bot token configured; messages go to stdout");
            Arc::new(ConsoleTransport)
        }
    })
}

async fn run(cfg: &Config) -> Result<()> {
    cfg.validate()?;
    let db_path = cfg.db_path()?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("open database {}", db_path.display()))?;

    let ctx = LoopContext {
        store: Arc::new(store),
        transport: make_transport(cfg)?,
        chat_id: cfg.general.chat_id,
        tz: cfg.tz()?,
    };
    let sheet: Arc<dyn SyncTarget> = Arc::new(pilot_sync::CsvSheet::new(cfg.sheet_dir()?));

    tracing::info!(
        db = %db_path.display(),
        tz = %ctx.tz,
        chat_id = ctx.chat_id,
        transport = ctx.transport.name(),
        "pilot daemon starting"
    );
    let handles = scheduler::spawn_all(ctx, cfg, cfg.backups(&db_path), sheet)?;

    tokio::signal::ctrl_c().await.context("wait for Ctrl-C")?;
    tracing::info!("shutting down");
    for h in handles {
        h.abort();
    }
    Ok(())
}
