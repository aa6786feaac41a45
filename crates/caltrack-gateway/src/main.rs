use std::net::SocketAddr;
use std::sync::Arc;

use caltrack_core::config::CaltrackConfig;
use caltrack_core::{Clock, FixedClock, SystemClock};
use caltrack_gateway::{app, trigger};
use caltrack_registry::Registry;
use caltrack_reminders::Dispatcher;
use caltrack_scheduler::{SchedulerEngine, Trigger};
use caltrack_sessions::SessionManager;
use caltrack_users::UserManager;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

const SESSION_PURGE_INTERVAL_SECS: u64 = 3600;

#[derive(Parser, Debug)]
#[command(name = "caltrack-gateway", version, about = "Calibration tracking server")]
struct Cli {
    #[arg(long, global = true, help = "Config file (defaults to $CALTRACK_CONFIG, then ~/.caltrack/caltrack.toml)")]
    config: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Send due calibration reminders once and exit.
    SendReminders {
        #[arg(long, help = "Evaluate as of this date (YYYY-MM-DD) instead of today")]
        date: Option<NaiveDate>,
    },
    /// Create the database schema and seed defaults, then exit.
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caltrack_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    // explicit --config > CALTRACK_CONFIG env > ~/.caltrack/caltrack.toml
    let config_path = cli.config.or_else(|| std::env::var("CALTRACK_CONFIG").ok());
    let config = CaltrackConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CaltrackConfig::default()
    });

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");

    // each subsystem gets its own connection; every constructor runs its
    // idempotent schema migration
    let registry = Arc::new(Registry::new(open_db(&db_path)?)?);
    let users = UserManager::new(open_db(&db_path)?)?;
    let sessions = SessionManager::new(open_db(&db_path)?)?;
    info!("database migrations complete");

    let seeded = registry.seed_default_departments()?;
    if seeded > 0 {
        info!(count = seeded, "seeded default departments");
    }
    if let Some(admin) = users.ensure_bootstrap_admin(&config.auth.bootstrap_admin)? {
        warn!(username = %admin.username, "created bootstrap admin account, change its password");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => {
            info!("database initialised");
            Ok(())
        }
        Command::SendReminders { date } => {
            let clock: Arc<dyn Clock> = match date {
                Some(d) => Arc::new(FixedClock::on(d)),
                None => Arc::new(SystemClock),
            };
            let dispatcher = build_dispatcher(&config, &registry, clock)?;
            let summary = dispatcher.dispatch_due().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Serve => serve(config, registry, users, sessions).await,
    }
}

async fn serve(
    config: CaltrackConfig,
    registry: Arc<Registry>,
    users: UserManager,
    sessions: SessionManager,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let dispatcher = Arc::new(build_dispatcher(&config, &registry, clock.clone())?);

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let schedule = config.reminders.schedule.clone();

    let state = Arc::new(app::AppState::new(
        config,
        registry,
        users,
        sessions,
        Arc::clone(&dispatcher),
        clock,
    ));
    let router = app::build_router(state.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Scheduler engine → dispatch task. Capacity 1: the engine drops a
    // firing while one is already queued, and the consumer discards any
    // firing that queued during a run.
    if let Some(schedule) = schedule {
        let (fired_tx, fired_rx) = mpsc::channel::<Trigger>(1);
        let engine = SchedulerEngine::new(schedule, fired_tx)?;
        tokio::spawn(engine.run(shutdown_rx.clone()));
        tokio::spawn(trigger::consume_triggers(fired_rx, Arc::clone(&dispatcher)));
        info!("reminder schedule enabled");
    }

    let state_for_purge = Arc::clone(&state);
    let mut purge_shutdown = shutdown_rx;
    tokio::spawn(async move {
        let mut tick =
            tokio::time::interval(std::time::Duration::from_secs(SESSION_PURGE_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match state_for_purge.sessions.purge_expired(state_for_purge.clock.now()) {
                        Ok(0) => {}
                        Ok(n) => info!(count = n, "purged expired sessions"),
                        Err(e) => warn!(error = %e, "session purge failed"),
                    }
                }
                changed = purge_shutdown.changed() => {
                    if changed.is_err() || *purge_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Caltrack gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // stop the scheduler and purge loops
    let _ = shutdown_tx.send(true);
    Ok(())
}

fn build_dispatcher(
    config: &CaltrackConfig,
    registry: &Arc<Registry>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Dispatcher> {
    let notifier = caltrack_notify::from_config(&config.mail)?;
    info!(backend = notifier.name(), "email notifier ready");
    Ok(Dispatcher::new(registry.clone(), notifier, clock)
        .deduplicate_same_day(config.reminders.deduplicate_same_day))
}

fn open_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
