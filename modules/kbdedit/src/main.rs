use std::io::{self, BufReader};

use anyhow::Result;
use futures::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kbdedit::{command_source, editor, Config, KeyboardState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kbdedit=info".parse()?))
        .with_writer(io::stderr)
        .init();

    info!("kbdedit starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let keymap = config.initial_keymap()?;
    info!(values = keymap.len(), "Keymap loaded");

    let seed = KeyboardState::new(config.layout).with_keymap(keymap);
    let mut running = editor(seed, |line: String| println!("{line}"))
        .with_feedback(command_source(|| BufReader::new(io::stdin())))
        .with_config(config.loop_config())
        .start()?;

    let outcome: Result<()> = loop {
        tokio::select! {
            next = running.next() => match next {
                Some(Ok(state)) if state.done => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "Editor stopped");
                    break Err(e.into());
                }
                None => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break Ok(());
            }
        }
    };

    running.shutdown().await;
    info!("kbdedit stopped");
    outcome
}
