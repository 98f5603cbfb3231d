// kl-timetable-sw command line.
// Drives the offline worker against a real origin with a persistent on-disk cache.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use url::Url;

use kl_timetable_sw::worker::{self, BACKGROUND_SYNC_TAG};
use kl_timetable_sw::{
    CacheStorage, Config, Destination, DiskStorage, Event, HttpNetwork, LogNotifier, Method,
    Network, Outcome, PushEvent, Request, Response, Result, ServiceWorker, SyncEvent,
};

#[derive(Debug, Parser)]
#[command(name = "kl-timetable-sw", version, about = "Offline caching worker for the KL timetable viewer")]
struct Cli {
    /// Origin the worker is registered on
    #[arg(long, env = "KLTT_ORIGIN", global = true)]
    origin: Option<Url>,

    /// Cache version suffix (bump to invalidate old partitions)
    #[arg(long, env = "KLTT_CACHE_VERSION", global = true)]
    cache_version: Option<String>,

    /// Cache directory (defaults to the platform cache dir)
    #[arg(long, env = "KLTT_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Cache the static manifest
    Install,
    /// Delete old partitions and start intercepting fetches
    Activate,
    /// Fetch a URL through the worker
    Fetch {
        /// Absolute URL or path on the origin
        url: String,
        /// Request destination (document, script, style, image, font, manifest, empty)
        #[arg(long, default_value = "empty")]
        dest: Destination,
        #[arg(long, default_value = "GET")]
        method: Method,
    },
    /// Deliver a push message
    Push {
        /// Text payload
        #[arg(long)]
        body: Option<String>,
    },
    /// Fire a background sync
    Sync {
        #[arg(long, default_value = BACKGROUND_SYNC_TAG)]
        tag: String,
    },
    /// List cache partitions and their entry counts
    Caches,
    /// Show worker state
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(origin) = cli.origin {
        config.origin = origin;
    }
    if let Some(version) = cli.cache_version {
        config.cache_version = version;
    }
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = Some(dir);
    }

    let root = config.resolved_cache_dir()?;
    let version = config.cache_version.clone();
    let storage = Arc::new(DiskStorage::new(&root));
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(&config.user_agent)?);

    let state = worker::load_state(&root, &version).await?;
    let worker = ServiceWorker::new(
        config,
        Arc::clone(&storage) as Arc<dyn CacheStorage>,
        Arc::clone(&network),
        Arc::new(LogNotifier),
    )?
    .with_state(state);

    let result = dispatch(&worker, network.as_ref(), cli.command).await;
    worker::save_state(&root, &version, worker.state().await).await?;
    result
}

async fn dispatch(worker: &ServiceWorker, network: &dyn Network, command: Command) -> Result<()> {
    match command {
        Command::Install => {
            if let Outcome::Installed { cached } = worker.handle(Event::Install).await? {
                println!("installed: {} static files cached", cached);
            }
        }
        Command::Activate => {
            if let Outcome::Activated { deleted } = worker.handle(Event::Activate).await? {
                for name in &deleted {
                    println!("deleted {}", name);
                }
                println!("activated");
            }
        }
        Command::Fetch { url, dest, method } => {
            let request = Request::from_url(worker.config().resolve(&url)?)
                .with_destination(dest)
                .with_method(method);

            match worker.handle(Event::Fetch(request.clone())).await? {
                Outcome::Responded { route, response } => {
                    eprintln!("route: {}", route.as_str());
                    print_response(response)?;
                }
                _ => {
                    eprintln!("route: passthrough");
                    print_response(network.fetch(&request).await?)?;
                }
            }
        }
        Command::Push { body } => {
            if let Outcome::Notified(notification) =
                worker.handle(Event::Push(PushEvent::new(body))).await?
            {
                println!("{}", serde_json::to_string_pretty(&notification)?);
            }
        }
        Command::Sync { tag } => match worker.handle(Event::Sync(SyncEvent::new(tag))).await? {
            Outcome::Synced { tag } => println!("synced: {}", tag),
            _ => println!("ignored"),
        },
        Command::Caches => {
            for name in worker.cache().keys().await? {
                let count = worker.cache().open(&name).await?.len().await?;
                println!("{}\t{} entries", name, count);
            }
        }
        Command::Status => {
            let version = worker.cache().version();
            println!("state: {}", worker.state().await.as_str());
            println!("origin: {}", worker.config().origin);
            println!("static: {}", version.static_name());
            println!("dynamic: {}", version.dynamic_name());
        }
    }
    Ok(())
}

fn print_response(mut response: Response) -> Result<()> {
    let source = if response.is_from_cache() { "cache" } else { "network" };
    eprintln!("{} {} ({})", response.status, response.status_text, source);
    println!("{}", response.text()?);
    Ok(())
}
