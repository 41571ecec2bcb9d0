mod commands;
mod render;

use std::{
    io::{self, BufRead},
    sync::Arc,
    thread,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    derive_view, Dashboard, DocumentStore, Intent, MemoryStore, MutationGateway, RemoteStore,
    SubscriptionUpdate, WriteCompletion,
};
use shared::domain::{Estado, EventFields, EventId, EventPatch, EventRecord, DEFAULT_COLLECTION};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    commands::{parse_line, Command as InputCommand, HELP},
    render::{write_table, TerminalRenderer},
};

#[derive(Parser, Debug)]
#[command(name = "board", about = "Live session status board")]
struct Cli {
    #[arg(long, env = "BOARD_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[arg(long, env = "BOARD_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,
    /// Use an in-process store seeded with demo sessions instead of a server.
    #[arg(long)]
    memory: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live table; reads commands from stdin.
    Watch {
        #[arg(long)]
        track: Option<String>,
    },
    /// Print the current table once.
    List {
        #[arg(long)]
        track: Option<String>,
    },
    SetStatus {
        id: String,
        estado: Estado,
    },
    Create {
        nombre: String,
        #[arg(long, default_value = "")]
        expo: String,
        #[arg(long, default_value = "")]
        hora: String,
        #[arg(long, default_value = "")]
        track: String,
        #[arg(long, default_value = "not_started")]
        estado: Estado,
    },
    /// Overwrite an event; unspecified fields keep their current value.
    Edit {
        id: String,
        #[arg(long)]
        nombre: Option<String>,
        #[arg(long)]
        expo: Option<String>,
        #[arg(long)]
        hora: Option<String>,
        #[arg(long)]
        track: Option<String>,
        #[arg(long)]
        estado: Option<Estado>,
    },
    Delete {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // The board owns stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store = open_store(&cli).await?;
    let collection = cli.collection;

    match cli.command {
        Command::Watch { track } => watch(store, collection, track).await,
        Command::List { track } => {
            let records = first_snapshot(store.as_ref(), &collection).await?;
            let rows = derive_view(&records, track.as_deref());
            write_table(&mut io::stdout().lock(), &rows)?;
            Ok(())
        }
        Command::SetStatus { id, estado } => {
            let id = EventId::new(id);
            run_write(store, &collection, |gateway| gateway.set_status(id, estado)).await?;
            println!("status updated");
            Ok(())
        }
        Command::Create {
            nombre,
            expo,
            hora,
            track,
            estado,
        } => {
            let fields = EventFields {
                nombre,
                expo,
                hora,
                track,
                estado,
            };
            let done = run_write(store, &collection, |gateway| gateway.create(fields)).await?;
            match done.id {
                Some(id) => println!("created {id}"),
                None => println!("created"),
            }
            Ok(())
        }
        Command::Edit {
            id,
            nombre,
            expo,
            hora,
            track,
            estado,
        } => {
            let id = EventId::new(id);
            let records = first_snapshot(store.as_ref(), &collection).await?;
            let mut fields = records
                .into_iter()
                .find(|record| record.id == id)
                .map(|record| record.fields)
                .ok_or_else(|| anyhow!("event '{id}' not found in '{collection}'"))?;
            let patch = EventPatch {
                nombre,
                expo,
                hora,
                track,
                estado,
            };
            if patch.is_empty() {
                bail!("nothing to change; pass --nombre, --expo, --hora, --track or --estado");
            }
            patch.apply_to(&mut fields);
            run_write(store, &collection, |gateway| gateway.update(id, fields)).await?;
            println!("event updated");
            Ok(())
        }
        Command::Delete { id } => {
            let id = EventId::new(id);
            run_write(store, &collection, |gateway| gateway.delete(id)).await?;
            println!("event deleted");
            Ok(())
        }
    }
}

async fn open_store(cli: &Cli) -> Result<Arc<dyn DocumentStore>> {
    if cli.memory {
        info!(collection = %cli.collection, "using in-process demo store");
        return Ok(Arc::new(
            MemoryStore::with_records(&cli.collection, demo_sessions()).await,
        ));
    }
    let store = RemoteStore::new(&cli.server_url)
        .with_context(|| format!("invalid --server-url '{}'", cli.server_url))?;
    Ok(Arc::new(store))
}

async fn watch(
    store: Arc<dyn DocumentStore>,
    collection: String,
    track: Option<String>,
) -> Result<()> {
    let (intent_tx, intent_rx) = mpsc::channel(32);
    if track.is_some() {
        intent_tx.send(Intent::SelectTrack(track)).await?;
    }
    eprintln!("{HELP}");
    // A plain thread: a pending stdin read must not hold up runtime shutdown.
    thread::spawn(move || read_commands(intent_tx));

    let mut dashboard = Dashboard::new(store, collection, TerminalRenderer::new(io::stdout()));
    tokio::select! {
        _ = dashboard.run(intent_rx) => {}
        _ = shutdown_signal() => info!("interrupted"),
    }
    dashboard.deactivate();
    Ok(())
}

fn read_commands(intents: mpsc::Sender<Intent>) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to read stdin");
                break;
            }
        };
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(InputCommand::Intent(intent))) => {
                if intents.blocking_send(intent).is_err() {
                    break;
                }
            }
            Ok(Some(InputCommand::Help)) => eprintln!("{HELP}"),
            Ok(Some(InputCommand::Quit)) => break,
            Err(err) => eprintln!("error: {err}"),
        }
    }
}

/// Waits for the store's first snapshot of `collection`, then cancels.
async fn first_snapshot(store: &dyn DocumentStore, collection: &str) -> Result<Vec<EventRecord>> {
    let mut subscription = store
        .subscribe(collection)
        .await
        .with_context(|| format!("failed to subscribe to '{collection}'"))?;
    match subscription.next().await {
        Some(SubscriptionUpdate::Snapshot(records)) => Ok(records),
        Some(SubscriptionUpdate::Failed(err)) => {
            Err(err).with_context(|| format!("subscription to '{collection}' failed"))
        }
        None => bail!("subscription to '{collection}' closed before the first snapshot"),
    }
}

/// Issues one write through the gateway and waits for its outcome.
async fn run_write(
    store: Arc<dyn DocumentStore>,
    collection: &str,
    write: impl FnOnce(&MutationGateway) -> u64,
) -> Result<WriteCompletion> {
    let (gateway, mut completions) = MutationGateway::new(store, collection);
    let ticket = write(&gateway);
    let mut done = completions
        .recv()
        .await
        .ok_or_else(|| anyhow!("write task ended without reporting"))?;
    debug_assert_eq!(done.ticket, ticket);
    let result = std::mem::replace(&mut done.result, Ok(()));
    result.with_context(|| format!("{} failed", done.kind))?;
    Ok(done)
}

fn demo_sessions() -> Vec<EventFields> {
    let session = |nombre: &str, expo: &str, hora: &str, track: &str, estado| EventFields {
        nombre: nombre.to_string(),
        expo: expo.to_string(),
        hora: hora.to_string(),
        track: track.to_string(),
        estado,
    };
    vec![
        session("Keynote", "Ana Torres", "09:00", "Main", Estado::Finished),
        session("Rust en producción", "Luis Pérez", "10:00", "Backend", Estado::InProgress),
        session("Diseño accesible", "Marta Gil", "10:00", "Web", Estado::InProgress),
        session("Kubernetes sin miedo", "Diego Ruiz", "11:30", "Cloud", Estado::NotStarted),
        session("Flutter a fondo", "Sofía León", "11:30", "Mobile", Estado::NotStarted),
        session("Cierre", "Organización", "18:00", "Main", Estado::NotStarted),
    ]
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
