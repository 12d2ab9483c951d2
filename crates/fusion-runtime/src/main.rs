use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use fusion_core::events::EditorEvent;
use fusion_editor::cli::{self, CliArgs};
use fusion_editor::config;
use fusion_editor::editor::Editor;
use fusion_editor::input::InputState;
use fusion_editor::picking::PickResult;
use fusion_editor::render::RecordingBackend;
use fusion_editor::stepper::FrameClock;
use fusion_editor::ui::HeadlessUi;
use serde_json::json;

const VIEWPORT_WIDTH: f32 = 1280.0;
const VIEWPORT_HEIGHT: f32 = 720.0;
const RECENT_EVENTS: usize = 16;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    tracing::info!("Fusion runtime v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let mut config = config::resolve_config(args.config.as_deref().map(Path::new), &cwd)?;
    if let Some(seed) = args.seed {
        config.scene.seed = Some(seed);
    }

    let project_root = PathBuf::from(&args.project);
    let mut editor = Editor::new(&config, &project_root)?;

    let mut ui = HeadlessUi::new(VIEWPORT_WIDTH, VIEWPORT_HEIGHT);
    let mut input = InputState::new();
    let mut backend = RecordingBackend::new();
    let mut clock = FrameClock::new();
    let schedule = cli::schedule_clicks(&args.clicks);

    let mut physics_steps: u64 = 0;
    let mut draw_calls: u64 = 0;
    let mut event_count: u64 = 0;
    let mut picks = Vec::new();
    let mut sun_direction = editor.renderer.sun.direction();

    let selections = Rc::new(Cell::new(0u64));
    let counter = selections.clone();
    let listener = editor.state.events.listen(move |event| {
        if matches!(event, EditorEvent::Selected { .. }) {
            counter.set(counter.get() + 1);
        }
    });

    for frame in 1..=args.frames {
        for (_, position) in schedule.iter().filter(|(f, _)| *f == frame) {
            input.inject_click(*position);
        }
        input.begin_frame();
        backend.clear();

        let elapsed = if args.realtime {
            clock.tick()
        } else {
            editor.stepper.fixed_dt
        };
        let report = editor.frame(&input, &mut ui, &mut backend, elapsed);

        physics_steps += report.physics_steps as u64;
        draw_calls += backend.draw_count() as u64;
        event_count += report.events.len() as u64;
        sun_direction = report.render.sun_direction;
        if let Some(result) = report.picked {
            picks.push(describe_pick(frame, &result));
        }
    }

    editor.state.events.remove_listener(listener);

    let log = editor.state.events.get_log();
    let recent: Vec<serde_json::Value> = log
        .iter()
        .skip(log.len().saturating_sub(RECENT_EVENTS))
        .map(|logged| json!({ "frame": logged.frame, "event": format!("{:?}", logged.event) }))
        .collect();

    let summary = json!({
        "frames": args.frames,
        "physics_steps": physics_steps,
        "draw_calls": draw_calls,
        "events": event_count,
        "selections": selections.get(),
        "picks": picks,
        "recent_events": recent,
        "sun_direction": sun_direction.to_array(),
        "scene": serde_json::to_value(editor.snapshot())?,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    editor.shutdown();
    Ok(())
}

fn describe_pick(frame: u64, result: &PickResult) -> serde_json::Value {
    match result {
        PickResult::Miss => json!({ "frame": frame, "result": "miss" }),
        PickResult::Hit(hit) => json!({
            "frame": frame,
            "result": "hit",
            "entity": hit.entity.to_bits().get(),
            "point": hit.point.to_array(),
            "distance": hit.distance,
        }),
        PickResult::Unowned { point, .. } => json!({
            "frame": frame,
            "result": "unowned",
            "point": point.to_array(),
        }),
    }
}
