//! TCP accept loop and connection handler threads: one accept loop thread,
//! one handler thread per connection. Shutdown closes the accept socket,
//! force-closes every live connection's socket, stops every game's tick
//! driver, then joins every handler thread.

use std::io::{self, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use railcore::config::Config;
use railcore::error::ResultCode;
use railcore::mapfile::FsMapStore;
use railcore::net::{encode_response, FrameReader};
use railcore::registry::{GameRegistry, HandlerRegistry};
use railcore::session::{Session, SessionContext};
use railcore::store::SqliteStore;

/// Builds the process-wide collaborators and runs the accept loop until a
/// SIGINT/SIGTERM is observed. Returns once every handler thread has joined.
pub fn run(config: Config) -> io::Result<()> {
    let config = Arc::new(config);
    let store = Arc::new(SqliteStore::open(&config.db_uri).expect("opening action log database"));
    let map_store = Arc::new(FsMapStore::new(config.maps_discovery.clone()));
    let games = Arc::new(GameRegistry::new());
    let handlers = Arc::new(HandlerRegistry::new());
    let ctx = Arc::new(SessionContext {
        config: config.clone(),
        store,
        map_store,
        games: games.clone(),
    });

    let listener = TcpListener::bind((config.server_addr.as_str(), config.server_port))?;
    listener.set_nonblocking(true)?;
    tracing::info!(addr = %config.server_addr, port = config.server_port, "serving");

    let stop = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let stop_for_signals = stop.clone();
    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            tracing::warn!("shutdown signal received, stopping...");
            stop_for_signals.store(true, Ordering::SeqCst);
        }
    });

    let joins: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::info!(%addr, "new connection");
                let handler_id = handlers.register(&stream).ok();
                let ctx = ctx.clone();
                let handlers = handlers.clone();
                let join = std::thread::spawn(move || {
                    handle_connection(ctx, stream);
                    if let Some(id) = handler_id {
                        handlers.deregister(id);
                    }
                });
                joins.lock().unwrap().push(join);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(err) => tracing::error!(error = %err, "accept failed"),
        }
    }

    drop(listener);
    handlers.shutdown_all();
    games.stop_all(ctx.store.as_ref());
    for join in joins.lock().unwrap().drain(..) {
        let _ = join.join();
    }
    Ok(())
}

fn handle_connection(ctx: Arc<SessionContext>, mut stream: TcpStream) {
    let mut reader = FrameReader::new(ctx.config.action_header, ctx.config.msglen_header);
    let mut session = Session::new(ctx.clone());

    loop {
        match reader.next_request(&mut stream) {
            Ok(Some(Ok(request))) => {
                let (code, payload) = session.dispatch(request);
                if write_response(&mut stream, &ctx.config, code, &payload).is_err() {
                    break;
                }
            }
            Ok(Some(Err(err))) => {
                let payload = serde_json::json!({ "error": err.message() }).to_string();
                if write_response(&mut stream, &ctx.config, err.result_code(), &payload).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "connection read error");
                break;
            }
        }
        if session.closed {
            break;
        }
    }

    session.on_disconnect();
    tracing::info!("connection closed");
}

fn write_response(stream: &mut TcpStream, config: &Config, code: ResultCode, payload: &str) -> io::Result<()> {
    let bytes = encode_response(config.result_header, config.msglen_header, code as u32, payload);
    stream.write_all(&bytes)
}
