//! Feedback sources for the editor loop.
//!
//! - [`command_source`]: editor commands read on a background thread
//! - [`render_source`]: a text view of the selected key, redrawn on change
//! - [`selection_announcer`]: one line per newly selected key

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use feedback_loop::{
    bind, event_channel, events, on_release, react, Bindings, EventSender, EventStream,
    FeedbackContext, FeedbackSource,
};
use futures::stream;
use tracing::{debug, info, warn};

use crate::command::parse_command;
use crate::keyboard::Layer;
use crate::state::{KeyboardEvent, KeyboardState};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Read commands from the reader `open` returns, one per line, on a
/// dedicated thread. End of input quits the editor.
///
/// Releasing the source stops forwarding; a thread blocked in a read
/// exits after its next line.
pub fn command_source<R, F>(open: F) -> impl FeedbackSource<KeyboardState, KeyboardEvent>
where
    R: BufRead + Send + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    bind(move |_ctx: &FeedbackContext<KeyboardState>| {
        let (sender, inbox) = event_channel::<KeyboardEvent>();
        let stopped = Arc::new(AtomicBool::new(false));

        let reader = open();
        let worker_stopped = Arc::clone(&stopped);
        thread::Builder::new()
            .name("kbdedit-commands".to_string())
            .spawn(move || read_commands(reader, &sender, &worker_stopped))
            .context("Failed to spawn command reader")?;

        Ok(Bindings::new()
            .with_resource(on_release(move || {
                stopped.store(true, Ordering::SeqCst);
                Ok(())
            }))
            .with_events(inbox))
    })
}

fn read_commands<R: BufRead>(reader: R, sender: &EventSender<KeyboardEvent>, stopped: &AtomicBool) {
    for line in reader.lines() {
        if stopped.load(Ordering::SeqCst) {
            return;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                sender.fail(anyhow::Error::new(e).context("Failed to read command input"));
                return;
            }
        };
        match parse_command(&line) {
            Ok(Some(event)) => {
                if !sender.send(event) {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, line = %line.trim(), "Ignoring command"),
        }
    }

    if !stopped.load(Ordering::SeqCst) {
        debug!("Command input closed");
        sender.send(KeyboardEvent::Quit);
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Text view of the parts of the state the user edits.
pub fn render(state: &KeyboardState) -> String {
    match &state.selected_key {
        Some(code) => format!(
            "[{}] {}: default={:?} shifted={:?}",
            state.layer,
            code,
            state.keymap.get(Layer::Default, code),
            state.keymap.get(Layer::Shifted, code),
        ),
        None => format!("[{}] no key selected", state.layer),
    }
}

/// Pass every changed view of the state to `output`.
pub fn render_source<O>(output: O) -> impl FeedbackSource<KeyboardState, KeyboardEvent>
where
    O: Fn(String) + Send + Sync + 'static,
{
    let output = Arc::new(output);
    bind(move |ctx: &FeedbackContext<KeyboardState>| {
        let output = Arc::clone(&output);
        let mut last: Option<String> = None;
        let observation = ctx.observe(move |state: &KeyboardState| {
            let view = render(state);
            if last.as_ref() != Some(&view) {
                output(view.clone());
                last = Some(view);
            }
        });
        Ok(Bindings::<KeyboardEvent>::new().with_resource(observation))
    })
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Announce each newly selected key to `output`.
pub fn selection_announcer<O>(output: O) -> impl FeedbackSource<KeyboardState, KeyboardEvent>
where
    O: Fn(String) + Send + Sync + 'static,
{
    react(
        |state: &KeyboardState| state.selected_key.clone(),
        move |code: String| -> EventStream<KeyboardEvent> {
            info!(key = %code, "Key selected");
            output(format!("selected {code}"));
            events(stream::empty())
        },
    )
}
