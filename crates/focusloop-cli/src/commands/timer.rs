use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Subcommand;
use focusloop_core::{
    CompletionSink, Config, Database, Event, FocusEngine, FocusRuntime, HttpBackend, OfflineSink,
    SwitchDecision,
};
use serde_json::json;
use tracing::{debug, warn};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current session state as JSON
    Status,
    /// Start the current session
    Start,
    /// Pause a running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Move to the next session without crediting this one
    Skip,
    /// Back to an idle Work session at full length
    Reset,
    /// Finish the current Work session now and credit the elapsed time
    Complete,
    /// Attach a task/project to the Work session
    Switch {
        /// Task ID (omit to clear)
        #[arg(long)]
        task: Option<String>,
        /// Project ID
        #[arg(long)]
        project: Option<String>,
        /// Discard partial progress of a running or paused session
        #[arg(long)]
        confirm: bool,
    },
    /// Run the timer in the foreground until the session ends or Ctrl-C
    Run,
}

type Captured = Arc<Mutex<Vec<Event>>>;

fn open_engine(config: &Config, captured: &Captured) -> Result<(FocusEngine, Option<HttpBackend>), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    let http = match config.backend.base_url.as_deref() {
        Some(url) => Some(HttpBackend::new(
            url,
            config.backend.api_token.clone(),
            config.backend.timeout(),
        )?),
        None => None,
    };
    let sink: Arc<dyn CompletionSink> = match &http {
        Some(http) => Arc::new(http.clone()),
        None => Arc::new(OfflineSink),
    };

    let events = Arc::clone(captured);
    let engine = FocusEngine::builder(Box::new(db))
        .config(config.session.clone())
        .recovery(config.recovery_options())
        .backend(sink)
        .subscribe(move |event| {
            if !matches!(event, Event::SnapshotChanged { .. }) {
                if let Ok(mut events) = events.lock() {
                    events.push(event.clone());
                }
            }
        })
        .build();
    debug!(rule = ?engine.recovery_rule(), "engine ready");
    Ok((engine, http))
}

fn take_events(captured: &Captured) -> Vec<Event> {
    captured
        .lock()
        .map(|mut events| std::mem::take(&mut *events))
        .unwrap_or_default()
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    // Backend submissions are spawned on tokio, so every command runs inside
    // a runtime and drains them before exiting.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(action, config))
}

async fn run_async(action: TimerAction, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let captured: Captured = Arc::default();
    let (engine, http) = open_engine(&config, &captured)?;

    let output = match action {
        TimerAction::Run => {
            run_foreground(engine, &captured).await;
            None
        }
        action => Some(apply(engine, action, &captured)),
    };

    if let Some(http) = http {
        http.drain().await;
    }
    if let Some(output) = output {
        println!("{}", serde_json::to_string_pretty(&output?)?);
    }
    Ok(())
}

fn apply(
    mut engine: FocusEngine,
    action: TimerAction,
    captured: &Captured,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let mut extra = serde_json::Map::new();
    match action {
        TimerAction::Status | TimerAction::Run => {}
        TimerAction::Start => {
            extra.insert("changed".into(), json!(engine.start()));
        }
        TimerAction::Pause => {
            extra.insert("changed".into(), json!(engine.pause()));
        }
        TimerAction::Resume => {
            extra.insert("changed".into(), json!(engine.resume()));
        }
        TimerAction::Skip => {
            engine.skip();
        }
        TimerAction::Reset => engine.reset(),
        TimerAction::Complete => match engine.mark_complete() {
            Some(outcome) => {
                extra.insert("recorded".into(), serde_json::to_value(outcome)?);
            }
            None => return Err("only a Work session can be marked complete".into()),
        },
        TimerAction::Switch {
            task,
            project,
            confirm,
        } => {
            let decision = if confirm {
                engine.confirm_switch(task, project)
            } else {
                engine.request_switch(task, project)
            };
            if decision == SwitchDecision::RequiresConfirmation {
                warn!("session in progress; re-run with --confirm to discard it");
            }
            extra.insert("decision".into(), serde_json::to_value(decision)?);
        }
    }

    let mut output = serde_json::Map::new();
    output.insert("snapshot".into(), serde_json::to_value(engine.snapshot())?);
    output.extend(extra);
    let events = take_events(captured);
    if !events.is_empty() {
        output.insert("events".into(), serde_json::to_value(events)?);
    }
    Ok(serde_json::Value::Object(output))
}

/// Tick until the session ends without auto-start, or until Ctrl-C.
/// Every non-snapshot event is printed as one JSON line.
async fn run_foreground(engine: FocusEngine, captured: &Captured) {
    let mut runtime = FocusRuntime::launch(engine);
    runtime.with_engine(|e| {
        if e.snapshot().is_paused {
            e.resume();
        } else {
            e.start();
        }
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            _ = poll.tick() => {
                for event in take_events(captured) {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
                if !runtime.is_ticking() {
                    break;
                }
            }
        }
    }

    // Leave the session as it is; a later command resumes from the store.
    runtime.shutdown();
    for event in take_events(captured) {
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{line}");
        }
    }
    if let Ok(line) = serde_json::to_string(&runtime.snapshot()) {
        println!("{line}");
    }
}
