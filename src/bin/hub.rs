use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fleet_topology::{
    actors::{FileWatcher, RefreshCycle, SchedulerConfig, SchedulerHandle, change_channel},
    alerts::HealthAlertTracker,
    config::{Config, read_config_file},
    notify::{Dispatcher, transport_from_config},
    render::{DiagramSink, InteractiveSink},
    store::store_from_config,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON, or TOML with a `.toml` extension)
    #[arg(short, long)]
    file: String,

    /// Log level for the hub and the library
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("fleet_topology", level),
        ("hub", level),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = store_from_config(&config.store)?;
    info!("using entity store {}", store.describe());

    let dispatcher = Dispatcher::new(
        transport_from_config(config.alerts.notifier.as_ref()),
        config.alerts.dispatch_timeout(),
    )
    .with_recovery_notifications(config.alerts.notify_on_recovery);

    let mut cycle = RefreshCycle::new(store, dispatcher.clone())
        .with_timeouts(config.refresh.fetch_timeout(), config.refresh.render_timeout());
    if let Some(path) = &config.render.diagram_path {
        debug!("writing topology diagram to {}", path.display());
        cycle = cycle.with_sink(Arc::new(DiagramSink::new(path)));
    }
    if let Some(path) = &config.render.interactive_path {
        debug!("writing interactive topology to {}", path.display());
        cycle = cycle.with_sink(Arc::new(InteractiveSink::new(
            path,
            config.render.interactive_refresh_secs,
        )));
    }

    let cycle = Arc::new(cycle);
    let view = cycle.reader();

    let watcher_cancel = CancellationToken::new();
    let mut watcher_task = None;
    let changes = match &config.watch {
        Some(watch) => {
            let (notifier, receiver) = change_channel();
            let watcher = FileWatcher::new(&watch.path, watch.poll(), notifier);
            watcher_task = Some(watcher.spawn(watcher_cancel.clone()));
            Some(receiver)
        }
        None => None,
    };

    let scheduler = SchedulerHandle::spawn(
        cycle,
        HealthAlertTracker::new(config.alerts.absence_policy()),
        SchedulerConfig {
            interval: config.refresh.interval(),
            debounce: config.refresh.debounce(),
        },
        changes,
    );

    #[cfg(feature = "api")]
    {
        use fleet_topology::api::{ApiState, spawn_api_server};

        if let Some(api) = config.api.clone() {
            let state = ApiState::new(view.clone(), scheduler.clone(), dispatcher.clone());
            spawn_api_server(api, state).await?;
        }
    }

    #[cfg(not(feature = "api"))]
    {
        if config.api.is_some() {
            warn!("API configured, but the binary was built without the `api` feature");
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    watcher_cancel.cancel();
    if let Some(task) = watcher_task {
        if let Err(e) = task.await {
            warn!("file watcher task failed: {e}");
        }
    }

    scheduler.stop().await;
    dispatcher.drain().await;

    if let Some(latest) = view.latest() {
        info!(
            "last published topology: cycle {} with {} components",
            latest.cycle,
            latest.graph.node_count()
        );
    }

    Ok(())
}
