//! pollcord-client - a terminal chat client that keeps DMs and guild
//! channels in sync by polling an HTTP relay
//!
//! Architecture:
//! - Main thread: owns the front-end state and prints output
//! - Input thread: reads stdin lines
//! - Backend thread: runs a Tokio runtime with the poll scheduler
//! - Communication via crossbeam channels (lock-free, sync-safe)

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{select, unbounded, Receiver};

use pollcord_client::backend::run_backend;
use pollcord_client::commands::handle_input;
use pollcord_client::config::load_effective_settings;
use pollcord_client::events::apply_event;
use pollcord_client::logging::init_tracing;
use pollcord_client::protocol::{BackendAction, GuiEvent};
use pollcord_client::relay::HttpRelay;
use pollcord_client::state::ClientState;

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("{}", e);
    }

    let settings = load_effective_settings();
    let relay = match HttpRelay::new(&settings.relay_url, settings.request_timeout()) {
        Ok(relay) => relay,
        Err(e) => {
            eprintln!("Cannot set up relay client: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(relay = %relay.base_url(), "starting pollcord-client");

    let (action_tx, action_rx) = unbounded::<BackendAction>();
    let (event_tx, event_rx) = unbounded::<GuiEvent>();

    let poll_config = settings.poll_config();
    let backend = thread::Builder::new()
        .name("backend".into())
        .spawn(move || run_backend(action_rx, event_tx, Arc::new(relay), poll_config));
    let backend = match backend {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start backend thread: {}", e);
            std::process::exit(1);
        }
    };

    let line_rx = spawn_stdin_reader();
    let mut state = ClientState::new();

    loop {
        select! {
            recv(event_rx) -> event => match event {
                Ok(event) => {
                    let fatal = matches!(event, GuiEvent::Fatal(_));
                    apply_event(&mut state, event);
                    flush_output(&mut state);
                    if fatal {
                        break;
                    }
                }
                // Backend thread exited
                Err(_) => break,
            },
            recv(line_rx) -> line => match line {
                Ok(line) => {
                    let keep_running = handle_input(&line, &mut state, &action_tx);
                    flush_output(&mut state);
                    if !keep_running {
                        break;
                    }
                }
                // stdin closed
                Err(_) => {
                    let _ = action_tx.send(BackendAction::Shutdown);
                    break;
                }
            },
        }
    }

    drop(action_tx);
    if backend.join().is_err() {
        eprintln!("Backend thread panicked");
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (line_tx, line_rx) = unbounded();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });
    line_rx
}

fn flush_output(state: &mut ClientState) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in state.drain_output() {
        let _ = writeln!(out, "{}", line);
    }
    let _ = out.flush();
}
