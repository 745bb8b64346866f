//! Keyboard layout editor built on a feedback loop.
//!
//! The editor's state is a [`KeyboardState`]; every change flows through
//! [`reduce`] as a [`KeyboardEvent`]. Input, rendering and selection
//! announcements are feedback sources attached to the loop.

pub mod command;
pub mod config;
pub mod feedback;
pub mod keyboard;
pub mod keymap;
pub mod state;

use feedback_loop::{from_fn, System};

pub use command::{parse_command, CommandError};
pub use config::Config;
pub use feedback::{command_source, render, render_source, selection_announcer};
pub use keyboard::{Key, KeyKind, Layer, Layout};
pub use keymap::{load_keymap, parse_keymap, KeyMap};
pub use state::{reduce, KeyboardEvent, KeyboardState};

/// The editor loop with rendering and selection output attached. Input
/// sources are added by the caller.
pub fn editor<O>(seed: KeyboardState, output: O) -> System<KeyboardState, KeyboardEvent>
where
    O: Fn(String) + Clone + Send + Sync + 'static,
{
    System::new(seed, from_fn(reduce))
        .with_feedback(render_source(output.clone()))
        .with_feedback(selection_announcer(output))
}
