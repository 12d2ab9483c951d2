use clap::Parser;
use glam::Vec2;

#[derive(Parser, Debug)]
#[command(name = "fusion", version, about = "Fusion scene editor, headless driver")]
pub struct CliArgs {
    /// Path to editor.yaml (default: nearest one above the working directory)
    #[arg(long)]
    pub config: Option<String>,

    /// Project root that mesh paths are resolved against
    #[arg(long, default_value = ".")]
    pub project: String,

    /// Number of frames to run
    #[arg(long, default_value_t = 120)]
    pub frames: u64,

    /// Seed for the initial scatter, overrides the config
    #[arg(long)]
    pub seed: Option<u64>,

    /// Left click at viewport pixel X,Y, optionally on a given frame (X,Y@FRAME).
    /// Can be repeated.
    #[arg(long = "click", value_parser = parse_click)]
    pub clicks: Vec<ScriptedClick>,

    /// Advance physics by measured wall-clock time instead of one fixed step per frame
    #[arg(long)]
    pub realtime: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedClick {
    pub position: Vec2,
    /// Frame to click on. Unscheduled clicks go one per frame from frame 1.
    pub frame: Option<u64>,
}

pub fn parse_click(s: &str) -> Result<ScriptedClick, String> {
    let (coords, frame) = match s.split_once('@') {
        Some((coords, frame)) => {
            let frame = frame
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid frame '{}': {}", frame, e))?;
            (coords, Some(frame))
        }
        None => (s, None),
    };

    let (x, y) = coords
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", coords))?;
    let x = x.trim().parse::<f32>().map_err(|e| format!("invalid x '{}': {}", x, e))?;
    let y = y.trim().parse::<f32>().map_err(|e| format!("invalid y '{}': {}", y, e))?;

    Ok(ScriptedClick {
        position: Vec2::new(x, y),
        frame,
    })
}

/// Resolve each click to the frame it fires on.
pub fn schedule_clicks(clicks: &[ScriptedClick]) -> Vec<(u64, Vec2)> {
    let mut next_free = 1;
    let mut schedule: Vec<(u64, Vec2)> = clicks
        .iter()
        .map(|click| match click.frame {
            Some(frame) => (frame, click.position),
            None => {
                let frame = next_free;
                next_free += 1;
                (frame, click.position)
            }
        })
        .collect();
    schedule.sort_by_key(|(frame, _)| *frame);
    schedule
}
