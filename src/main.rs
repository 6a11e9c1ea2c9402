// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, Result};
use clap::Parser;
use smithay::{
    reexports::{
        calloop::EventLoop,
        wayland_server::Display,
    },
    wayland::socket::ListeningSocketSource,
};
use tracing::{error, info};

mod backend;
mod environment;
mod input;
mod mousegrabber;
mod seat;
mod shell;
mod startup;
mod state;
mod utils;
mod wayland;
mod weak;
use state::State;

/// A minimal Wayland compositor exposing cursor-override and
/// keybinding-filter protocols to a privileged controller.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Spawn `/bin/sh -c CMD` once the display globals are up.
    #[arg(short = 'c', value_name = "CMD")]
    command: Option<String>,

    /// Enable debug rendering: yellow clear, full-output damage every frame.
    #[arg(short = 'd')]
    debug_render: bool,
}

fn main() {
    if let Err(err) = main_inner() {
        error!("Error occurred in main(): {}", err);
        std::process::exit(1);
    }
}

fn main_inner() -> Result<()> {
    let args = Args::parse();

    // setup logger
    init_logger()?;
    info!("woven starting up!");

    if args.debug_render {
        std::env::set_var("WOVEN_DEBUG_RENDER", "1");
    }

    // init event loop
    let mut event_loop = EventLoop::try_new()
        .context("Failed to initialize event loop")?;

    // init wayland display
    let (display, socket) = init_wayland_display(&mut event_loop)?;

    // init state
    let mut state = State::new(
        &display,
        socket.clone(),
        event_loop.handle(),
        event_loop.get_signal(),
    );

    // init backend
    backend::init_backend(&display.handle(), &mut event_loop, &mut state)?;

    // the display globals are up: set WAYLAND_DISPLAY for any child we fork,
    // update systemd/D-Bus activation environments, and run the `-c CMD`
    // startup command exactly once.
    std::env::set_var("WAYLAND_DISPLAY", &socket);
    environment::update_environment(&socket);
    if let Some(cmd) = args.command {
        startup::run_command(&cmd);
    } else {
        startup::run_startup_program();
    }

    info!("Starting event loop");

    // run the event loop
    event_loop.run(None, &mut state, |state| {
        // shall we shut down?
        if state.should_stop {
            info!("Shutting down");
            state.loop_signal.stop();
            state.loop_signal.wakeup();
            return;
        }

        // draw every output with outstanding damage, then send out whatever
        // that produced (new frame callbacks, new buffers, etc).
        state.render_pending_outputs();
        let _ = state.display_handle.flush_clients();
    })?;

    info!("Event loop exited");
    Ok(())
}

fn init_logger() -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};
    
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("woven=info"));
    
    fmt()
        .with_env_filter(filter)
        .init();
        
    Ok(())
}

fn init_wayland_display(
    event_loop: &mut EventLoop<'static, State>,
) -> Result<(Display<State>, String)> {
    // create the wayland display
    let display = Display::<State>::new()
        .context("Failed to create wayland display")?;
    
    // create a listening socket
    let listening_socket = ListeningSocketSource::new_auto()
        .context("Failed to create listening socket")?;
    
    let socket_name = listening_socket
        .socket_name()
        .to_string_lossy()
        .into_owned();
    
    info!("Listening on wayland socket: {}", socket_name);
    
    event_loop
        .handle()
        .insert_source(listening_socket, |client_stream, _, state| {
            // accept new wayland clients
            let _ = state
                .display_handle
                .insert_client(
                    client_stream, 
                    std::sync::Arc::new(crate::wayland::handlers::ClientState::new())
                );
        })
        .context("Failed to init wayland socket source")?;
    
    Ok((display, socket_name))
}