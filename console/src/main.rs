//! # fleet-console
//!
//! Operator console for a fleet of container hosts managed by a central API
//! server. Lists machines, containers and images, follows live container and
//! image state, runs container actions, and attaches the local terminal to
//! remote shells and log tails.
//!
//! ## Architecture
//!
//! ```text
//! main.rs       entry point, config + logging setup, subcommand dispatch
//! config.rs     CLI definition and TOML/env configuration
//! client.rs     HTTP client for one-shot backend routes
//! endpoint.rs   backend addressing for sessions and feeds
//! session.rs    WebSocket terminal sessions (exec / logs)
//! mirror.rs     live state mirrors (stream or poll)
//! dispatch.rs   container actions, one in flight per control
//! inventory.rs  machine list and reachability gate
//! terminal.rs   stdio terminal sink, raw mode, detach key
//! view.rs       plain-text tables and detail views
//! ```
//!
//! Logs go to stderr (filter from `RUST_LOG`, else `[logging] level`), so
//! stdout carries only the terminal surface.
//!
//! Interactive sessions put the local TTY into raw mode; press `Ctrl-]` to
//! detach.

use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use fleet_console::config::{Cli, Command, Config, ContainerArgs, WatchTarget};
use fleet_console::dispatch::{ContainerRef, CreateRequest};
use fleet_console::endpoint::SessionMode;
use fleet_console::inventory::{fetch_inventory, require_reachable};
use fleet_console::model::{ContainerSummary, Host, ImageSummary};
use fleet_console::notify::{self, CONNECTIVITY_MESSAGE};
use fleet_console::session::EndReason;
use fleet_console::terminal::RawModeGuard;
use fleet_console::{
    view, ActionControl, ActionDispatcher, ActionRequest, Backend, BackendClient, ClientError,
    Endpoint, FeedDescriptor, Notification, Notifier, Outcome, SessionChannel, StateMirror,
    StdioTerminal,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fleet-console: configuration error: {e}");
            std::process::exit(2);
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let backend = match config.backend(cli.url.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("fleet-console: {e}");
            std::process::exit(2);
        }
    };
    let client = match BackendClient::new(backend.clone(), config.timeouts()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fleet-console: {e}");
            std::process::exit(2);
        }
    };
    tracing::debug!(backend = %backend, "Starting");

    let (notifier, notifications) = notify::channel();
    let printer = tokio::spawn(print_notifications(notifications));

    let code = run(cli.command, &config, client, notifier).await;

    // All notifiers are gone once `run` returns; wait for the printer to drain.
    let _ = printer.await;
    // The stdin reader thread may still be parked in a blocking read.
    std::process::exit(code);
}

async fn print_notifications(mut rx: mpsc::UnboundedReceiver<Notification>) {
    while let Some(n) = rx.recv().await {
        eprint!("{n}\r\n");
    }
}

async fn run(command: Command, config: &Config, client: BackendClient, notifier: Notifier) -> i32 {
    match command {
        Command::Machines => {
            let hosts = fetch_inventory(&client, &notifier).await;
            print!("{}", view::host_table(&hosts));
            0
        }
        Command::Containers { ip } => match client.containers(&ip).await {
            Ok(rows) => {
                print!("{}", view::container_table(&rows));
                0
            }
            Err(e) => report(&notifier, &e),
        },
        Command::Images { ip } => match client.images(&ip).await {
            Ok(rows) => {
                print!("{}", view::image_table(&rows));
                0
            }
            Err(e) => report(&notifier, &e),
        },
        Command::Watch { target } => {
            let mirror = StateMirror::new(client, notifier, config.mirror_options());
            watch_target(&mirror, target).await
        }
        Command::Exec {
            ip,
            container,
            skip_check,
        } => {
            if !skip_check && !host_available(&client, &notifier, &ip).await {
                return 1;
            }
            let endpoint = match container {
                Some(container_id) => Endpoint::ContainerShell { ip, container_id },
                None => Endpoint::MachineShell { ip },
            };
            attach(client.backend().clone(), config, &notifier, endpoint).await
        }
        Command::Logs {
            ip,
            container,
            skip_check,
        } => {
            if !skip_check && !host_available(&client, &notifier, &ip).await {
                return 1;
            }
            let endpoint = Endpoint::ContainerLogs {
                ip,
                container_id: container,
            };
            attach(client.backend().clone(), config, &notifier, endpoint).await
        }
        Command::Start(args) => act(client, notifier, ActionRequest::Start(target(args))).await,
        Command::Stop(args) => act(client, notifier, ActionRequest::Stop(target(args))).await,
        Command::Restart(args) => {
            act(client, notifier, ActionRequest::Restart(target(args))).await
        }
        Command::Create { ip, image, args } => {
            act(
                client,
                notifier,
                ActionRequest::Create(CreateRequest { ip, image, args }),
            )
            .await
        }
    }
}

fn target(args: ContainerArgs) -> ContainerRef {
    ContainerRef {
        ip: args.ip,
        container_id: args.container,
    }
}

fn report(notifier: &Notifier, error: &ClientError) -> i32 {
    if error.is_transport() {
        tracing::warn!(error = %error, "Request failed");
        notifier.error(CONNECTIVITY_MESSAGE);
    } else {
        notifier.error(error.to_string());
    }
    1
}

async fn host_available(client: &BackendClient, notifier: &Notifier, ip: &str) -> bool {
    let hosts = fetch_inventory(client, notifier).await;
    match require_reachable(&hosts, ip) {
        Ok(_) => true,
        Err(e) => {
            notifier.error(e.to_string());
            false
        }
    }
}

async fn act(client: BackendClient, notifier: Notifier, request: ActionRequest) -> i32 {
    let dispatcher = ActionDispatcher::new(client, notifier);
    match dispatcher.dispatch(&ActionControl::new(), request).await {
        Ok(Outcome::Success { .. }) => 0,
        Ok(_) | Err(_) => 1,
    }
}

/// Bind the local terminal to `endpoint` until the session ends or the user
/// detaches.
async fn attach(backend: Backend, config: &Config, notifier: &Notifier, endpoint: Endpoint) -> i32 {
    let terminal = StdioTerminal::new();
    let detach = terminal.detach_signal();
    let raw_mode = if endpoint.mode() == SessionMode::Interactive {
        RawModeGuard::enable().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not switch terminal to raw mode");
            None
        })
    } else {
        None
    };
    if raw_mode.is_some() {
        eprint!("Connected to {endpoint}. Press Ctrl-] to detach.\r\n");
    }

    let channel = SessionChannel::new(backend, Box::new(terminal), config.session_options());
    let handle = channel.open(endpoint);
    let ended = tokio::select! {
        reason = handle.ended() => Some(reason),
        () = detach.notified() => None,
        _ = tokio::signal::ctrl_c() => None,
    };
    channel.close(&handle);
    drop(raw_mode);

    match ended {
        Some(EndReason::Failed(msg)) => {
            tracing::warn!(error = %msg, "Session failed");
            notifier.error(CONNECTIVITY_MESSAGE);
            1
        }
        Some(EndReason::RemoteClosed) => {
            eprint!("\r\nConnection closed.\r\n");
            0
        }
        Some(EndReason::Closed) | None => 0,
    }
}

async fn watch_target(mirror: &StateMirror, target: WatchTarget) -> i32 {
    match target {
        WatchTarget::Container { ip, container } => {
            let feed = FeedDescriptor::Container {
                ip,
                container_id: container,
            };
            follow(mirror, feed, view::container_view).await
        }
        WatchTarget::Image { ip, image } => {
            let feed = FeedDescriptor::Image {
                ip,
                image_id: image,
            };
            follow(mirror, feed, view::image_view).await
        }
        WatchTarget::Containers { ip } => {
            follow(mirror, FeedDescriptor::Containers { ip }, |rows: &Vec<ContainerSummary>| {
                view::container_table(rows)
            })
            .await
        }
        WatchTarget::Images { ip } => {
            follow(mirror, FeedDescriptor::Images { ip }, |rows: &Vec<ImageSummary>| {
                view::image_table(rows)
            })
            .await
        }
        WatchTarget::Machines => {
            follow(mirror, FeedDescriptor::Machines, |rows: &Vec<Host>| {
                view::host_table(rows)
            })
            .await
        }
    }
}

/// Redraw `render(snapshot)` on every snapshot and every liveness change
/// until Ctrl-C. A snapshot shown while the feed is down is marked stale.
async fn follow<T, F>(mirror: &StateMirror, feed: FeedDescriptor, render: F) -> i32
where
    T: DeserializeOwned + Send + Sync + 'static,
    F: Fn(&T) -> String,
{
    let redraw = std::io::stdout().is_terminal();
    eprintln!("Watching {feed} (Ctrl-C to stop)");
    let mut subscription = mirror.subscribe::<T>(feed, None);
    let mut live = subscription.watch_live();
    let mut shown: Option<Arc<T>> = None;
    loop {
        tokio::select! {
            snapshot = subscription.changed() => match snapshot {
                Some(snapshot) => shown = Some(snapshot),
                None => break,
            },
            changed = live.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        let Some(snapshot) = &shown else { continue };
        if redraw {
            print!("\x1b[2J\x1b[H");
        }
        println!("{}", render(snapshot.as_ref()));
        if !*live.borrow_and_update() {
            println!("(stale: connection to api server lost, showing last known state)");
        }
    }
    0
}
