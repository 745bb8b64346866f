//! Scripted editor sessions: commands in, state and rendered output out.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use feedback_loop::RunningLoop;
use futures::StreamExt;
use kbdedit::{command_source, editor, parse_keymap, KeyboardState, Layer, Layout};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Output = Arc<Mutex<Vec<String>>>;

fn capture() -> (Output, impl Fn(String) + Clone + Send + Sync + 'static) {
    let lines: Output = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let lines = Arc::clone(&lines);
        move |line: String| lines.lock().unwrap().push(line)
    };
    (lines, sink)
}

fn script(input: &'static str) -> impl Fn() -> Cursor<Vec<u8>> + Send + Sync + 'static {
    move || Cursor::new(input.as_bytes().to_vec())
}

async fn until_done(running: &mut RunningLoop<KeyboardState>) -> KeyboardState {
    while let Some(item) = running.next().await {
        let state = item.unwrap();
        if state.done {
            return state;
        }
    }
    panic!("editor stopped before quitting");
}

async fn until_printed(output: &Output, line: &str) {
    while !output.lock().unwrap().iter().any(|l| l == line) {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn scripted_session_edits_the_selected_key() {
    let (output, sink) = capture();
    let mut running = editor(KeyboardState::new(Layout::Iso), sink)
        .with_feedback(command_source(script(
            "select e01\n\
             set default 1\n\
             set shifted !\n\
             shift\n\
             bogus command\n\
             select B99\n\
             layer alt\n\
             set alt ¡\n\
             quit\n",
        )))
        .start()
        .unwrap();

    let state = until_done(&mut running).await;
    assert_eq!(state.selected_key.as_deref(), Some("E01"));
    assert_eq!(state.layer, Layer::Alt);
    assert_eq!(state.keymap.get(Layer::Default, "E01"), "1");
    assert_eq!(state.keymap.get(Layer::Shifted, "E01"), "!");
    assert_eq!(state.keymap.get(Layer::Alt, "E01"), "¡");

    until_printed(&output, "[alt] E01: default=\"1\" shifted=\"!\"").await;
    running.shutdown().await;

    let output = output.lock().unwrap();
    assert!(output.contains(&"[default] no key selected".to_string()));
    assert_eq!(
        output.iter().filter(|l| l.starts_with("selected ")).count(),
        1
    );
    assert!(output.contains(&"selected E01".to_string()));
}

#[tokio::test]
async fn end_of_input_quits() {
    let (_output, sink) = capture();
    let mut running = editor(KeyboardState::new(Layout::Iso), sink)
        .with_feedback(command_source(script("shift\n")))
        .start()
        .unwrap();

    let state = until_done(&mut running).await;
    assert_eq!(state.layer, Layer::Shifted);
    running.shutdown().await;
}

#[tokio::test]
async fn preloaded_keymap_is_rendered_on_selection() {
    let keymap = parse_keymap("[default]\nC01 = \"a\"\n[shifted]\nC01 = \"A\"\n").unwrap();
    let (output, sink) = capture();
    let mut running = editor(KeyboardState::new(Layout::Ansi).with_keymap(keymap), sink)
        .with_feedback(command_source(script("select c01\n")))
        .start()
        .unwrap();

    until_done(&mut running).await;
    until_printed(&output, "[default] C01: default=\"a\" shifted=\"A\"").await;
    until_printed(&output, "selected C01").await;
    running.shutdown().await;
}

#[tokio::test]
async fn ansi_layout_refuses_iso_only_keys() {
    let (_output, sink) = capture();
    let mut running = editor(KeyboardState::new(Layout::Ansi), sink)
        .with_feedback(command_source(script("select b00\nset default x\nquit\n")))
        .start()
        .unwrap();

    let state = until_done(&mut running).await;
    assert_eq!(state.selected_key, None);
    assert!(state.keymap.is_empty());
    running.shutdown().await;
}
