mod analyzer;
mod buffer;
mod collage;
mod filter;
mod player;
mod shared;
mod source;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::event::{self, Event, KeyCode};
use opencv::core::Vector;
use opencv::imgcodecs;
use opencv::prelude::MatTraitConst;

use crate::buffer::PixelBuffer;
use crate::filter::FilterSelector;
use crate::player::{Command, PlaybackController, PlayerState, SleepPacer};
use crate::shared::constants;
use crate::shared::error::PipelineError;
use crate::source::{DeviceSource, FileSource, FrameSource};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a filter to a still image
    Filter {
        #[arg(short, long)]
        input: String,
        #[arg(short, long)]
        output: String,
        #[arg(short, long, value_enum, default_value_t = FilterArg::Identity)]
        filter: FilterArg,
        /// Scale constant for the log transform
        #[arg(long)]
        c: Option<f64>,
        /// Exponent for gamma correction (must be > 0)
        #[arg(long)]
        gamma: Option<f64>,
        /// Additionally write histogram plots for input and output
        #[arg(long, default_value_t = false)]
        histogram: bool,
    },
    /// Write the intensity histogram plot of a still image
    Histogram {
        #[arg(short, long)]
        input: String,
        #[arg(short, long)]
        output: String,
    },
    /// Tile a folder of images into a grid
    Collage {
        #[arg(short, long)]
        dir: String,
        #[arg(short, long)]
        rows: u32,
        #[arg(short, long)]
        cols: u32,
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 240)]
        height: u32,
        #[arg(short, long, default_value_t = 8)]
        border: u32,
        #[arg(short, long)]
        output: String,
    },
    /// Play a video file (space pause, arrows seek, +/- speed, g grayscale, q quit)
    Play {
        #[arg(short, long)]
        video: String,
        #[arg(short, long, value_enum, default_value_t = FilterArg::Identity)]
        filter: FilterArg,
        /// Scale constant for the log transform
        #[arg(long)]
        c: Option<f64>,
        /// Exponent for gamma correction (must be > 0)
        #[arg(long)]
        gamma: Option<f64>,
        #[arg(short, long, default_value_t = 1.0)]
        speed: f64,
    },
    /// Stream from a live camera (space pause, +/- speed, g grayscale, q quit)
    Camera {
        #[arg(short, long, default_value_t = 0)]
        index: u32,
        #[arg(short, long, value_enum, default_value_t = FilterArg::Identity)]
        filter: FilterArg,
        /// Scale constant for the log transform
        #[arg(long)]
        c: Option<f64>,
        /// Exponent for gamma correction (must be > 0)
        #[arg(long)]
        gamma: Option<f64>,
    },
    /// Probe camera indices and report which are live
    Devices {
        #[arg(short, long, default_value_t = constants::DEVICE_PROBE_LIMIT)]
        limit: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FilterArg {
    Identity,
    Grayscale,
    Edges,
    Negative,
    Log,
    Gamma,
}

impl FilterArg {
    /// A missing --c / --gamma is treated like a cancelled prompt: the filter
    /// engine passes the image through unchanged.
    fn selector(self, c: Option<f64>, gamma: Option<f64>) -> FilterSelector {
        match self {
            FilterArg::Identity => FilterSelector::Identity,
            FilterArg::Grayscale => FilterSelector::Grayscale,
            FilterArg::Edges => FilterSelector::EdgeDetection,
            FilterArg::Negative => FilterSelector::Negative,
            FilterArg::Log => FilterSelector::LogTransform { c },
            FilterArg::Gamma => FilterSelector::GammaCorrection { gamma },
        }
    }
}

fn main() -> Result<()> {
    utils::logger::init();

    // Reset terminal state left over from a previous crash mid-playback.
    let _ = crossterm::terminal::disable_raw_mode();

    let cli = Cli::parse();

    match cli.command {
        Commands::Filter {
            input,
            output,
            filter,
            c,
            gamma,
            histogram,
        } => {
            let image = load_image(&input)?;
            let selector = filter.selector(c, gamma);
            let filtered = filter::apply(&image, &selector)
                .with_context(|| format!("applying {} filter", selector.label()))?;
            save_image(&output, &filtered)?;
            println!("Wrote {}", output);

            if histogram {
                let in_plot = analyzer::render(&analyzer::histogram(&image));
                let out_plot = analyzer::render(&analyzer::histogram(&filtered));
                let in_path = derived_path(&output, "in-hist");
                let out_path = derived_path(&output, "out-hist");
                save_image(&in_path, &in_plot)?;
                save_image(&out_path, &out_plot)?;
                println!("Wrote {} and {}", in_path, out_path);
            }
        }
        Commands::Histogram { input, output } => {
            let image = load_image(&input)?;
            let plot = analyzer::render(&analyzer::histogram(&image));
            save_image(&output, &plot)?;
            println!("Wrote {}", output);
        }
        Commands::Collage {
            dir,
            rows,
            cols,
            width,
            height,
            border,
            output,
        } => {
            let tiles = collage::pick_images(
                Path::new(&dir),
                (rows * cols) as usize,
                width,
                height,
                border,
            )?;
            println!("Tiling {} images into a {}x{} grid", tiles.len(), rows, cols);
            let grid = collage::compose_grid(&tiles, rows, cols)?;
            save_image(&output, &grid)?;
            println!("Wrote {}", output);
        }
        Commands::Play {
            video,
            filter,
            c,
            gamma,
            speed,
        } => {
            let known_container = Path::new(&video)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| {
                    constants::VIDEO_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                })
                .unwrap_or(false);
            if !known_container {
                utils::logger::info(&format!("unrecognized container extension: {}", video));
            }
            let source = FileSource::open(&video)?;
            match source.duration_ms() {
                Some(ms) => println!(
                    "Playing {} ({:.2} fps, {:.1}s)",
                    video,
                    source.fps(),
                    ms / 1000.0
                ),
                None => println!("Playing {} ({:.2} fps)", video, source.fps()),
            }
            let selector = filter.selector(c, gamma);
            if let Some(note) = missing_param_note(&selector) {
                println!("{}", note);
                utils::logger::info(note);
            }
            run_interactive(source, selector, speed, true)?;
        }
        Commands::Camera {
            index,
            filter,
            c,
            gamma,
        } => {
            let source = DeviceSource::open(index)?;
            println!("Streaming from camera {}", source.index());
            let selector = filter.selector(c, gamma);
            if let Some(note) = missing_param_note(&selector) {
                println!("{}", note);
                utils::logger::info(note);
            }
            run_interactive(source, selector, 1.0, false)?;
        }
        Commands::Devices { limit } => {
            let report = source::probe_devices(limit);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Headless playback loop: frames are pulled, filtered, and counted; a key
/// thread feeds commands into the controller while it runs.
fn run_interactive<S: FrameSource>(
    source: S,
    initial_filter: FilterSelector,
    speed: f64,
    seekable: bool,
) -> Result<()> {
    // The sink is where a presentation layer would take over; headless
    // playback just drops the buffer after the controller counts it.
    let mut controller = PlaybackController::new(|_buf: PixelBuffer| {});
    controller.set_filter(initial_filter);
    controller.set_speed(speed);
    controller.start(source)?;

    let sender = controller.command_sender();
    let ctrlc_sender = sender.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_sender.send(Command::Stop);
    })?;

    crossterm::terminal::enable_raw_mode()?;

    let running = Arc::new(AtomicBool::new(true));
    let input_running = Arc::clone(&running);
    let input_sender = sender.clone();
    let input_handle = std::thread::spawn(move || {
        let mut paused = false;
        let mut speed = speed.clamp(constants::SPEED_MIN, constants::SPEED_MAX);
        let mut grayscale = false;
        while input_running.load(Ordering::SeqCst) {
            if !event::poll(Duration::from_millis(constants::PAUSE_POLL_MS)).unwrap_or(false) {
                continue;
            }
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            let command = match key.code {
                KeyCode::Char('q') | KeyCode::Esc => Some(Command::Stop),
                KeyCode::Char(' ') => {
                    paused = !paused;
                    Some(if paused { Command::Pause } else { Command::Resume })
                }
                KeyCode::Left if seekable => Some(Command::Seek(-constants::SEEK_STEP_MS)),
                KeyCode::Right if seekable => Some(Command::Seek(constants::SEEK_STEP_MS)),
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    speed = (speed + 0.25).min(constants::SPEED_MAX);
                    Some(Command::SetSpeed(speed))
                }
                KeyCode::Char('-') => {
                    speed = (speed - 0.25).max(constants::SPEED_MIN);
                    Some(Command::SetSpeed(speed))
                }
                KeyCode::Char('g') => {
                    grayscale = !grayscale;
                    Some(Command::SetFilter(if grayscale {
                        FilterSelector::Grayscale
                    } else {
                        FilterSelector::Identity
                    }))
                }
                _ => None,
            };
            if let Some(cmd) = command {
                let stopping = matches!(cmd, Command::Stop);
                if input_sender.send(cmd).is_err() || stopping {
                    break;
                }
            }
        }
    });

    let mut pacer = SleepPacer::new();
    let outcome = controller.run(&mut pacer);

    running.store(false, Ordering::SeqCst);
    input_handle.join().ok();
    crossterm::terminal::disable_raw_mode()?;
    outcome?;

    if controller.state() == PlayerState::Ended {
        println!("End of stream.");
    }
    println!(
        "Playback finished: {} frames delivered",
        controller.frames_delivered()
    );
    Ok(())
}

/// A parametrized filter without its number passes every frame through
/// unchanged; the playback commands say so up front instead of running an
/// invisible identity session.
fn missing_param_note(selector: &FilterSelector) -> Option<&'static str> {
    match selector {
        FilterSelector::LogTransform { c: None } => {
            Some("log filter without --c: frames pass through unchanged")
        }
        FilterSelector::GammaCorrection { gamma: None } => {
            Some("gamma filter without --gamma: frames pass through unchanged")
        }
        _ => None,
    }
}

/// Resolves still-image inputs, falling back to the user's Pictures directory
/// for bare names (where the original tool's open dialog started).
fn resolve_input(path: &str) -> PathBuf {
    let direct = PathBuf::from(path);
    if direct.exists() {
        return direct;
    }
    if direct.is_relative() {
        if let Some(pictures) = dirs::picture_dir() {
            let candidate = pictures.join(path);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    direct
}

fn load_image(path: &str) -> Result<PixelBuffer> {
    let resolved = resolve_input(path);
    let mat = imgcodecs::imread(&resolved.to_string_lossy(), imgcodecs::IMREAD_COLOR)
        .map_err(PipelineError::from)?;
    if mat.empty() {
        anyhow::bail!("unreadable image: {}", resolved.display());
    }
    Ok(source::mat_to_rgb(&mat)?)
}

fn save_image(path: &str, buffer: &PixelBuffer) -> Result<()> {
    let mat = source::buffer_to_mat(buffer)?;
    let ok = imgcodecs::imwrite(path, &mat, &Vector::new()).map_err(PipelineError::from)?;
    if !ok {
        anyhow::bail!("failed to encode {}", path);
    }
    Ok(())
}

/// `out.png` + tag `in-hist` -> `out.in-hist.png`
fn derived_path(output: &str, tag: &str) -> String {
    let path = Path::new(output);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("png");
    let name = format!("{}.{}.{}", stem, tag, ext);
    path.with_file_name(name).to_string_lossy().to_string()
}
