//! Plays a scripted two-finger gesture through a granular session and renders it into a wav file.

use std::{f32::consts::TAU, path::PathBuf, time::Duration};

use arg::{parse_args, Args};

use grainpad::{
    AudioSourceBuffer, Error, OutputDevice, PixelRaster, PointerEvent, RenderEngine, Session,
    SessionConfig, WavOutput,
};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

const SAMPLE_RATE: u32 = 44100;

/// Session update rate of the scripted gesture.
const STEP: Duration = Duration::from_millis(5);
/// Silence rendered after the gesture ended, so the last grains can fade out.
const TAIL: Duration = Duration::from_secs(1);

// -------------------------------------------------------------------------------------------------

/// Program arguments.
#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Write the rendered gesture into the given wav file. By default \"touch-gesture.wav\".
    output_path: Option<PathBuf>,
    #[arg(short = "s", long = "seed")]
    /// Random seed for grain offsets, pans and colors.
    seed: Option<u64>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

/// A four second source: a slowly rising tone with a few harmonics.
fn synthesize_source() -> Result<AudioSourceBuffer, Error> {
    let frame_count = SAMPLE_RATE as usize * 4;
    let samples = (0..frame_count)
        .map(|frame| {
            let time = frame as f32 / SAMPLE_RATE as f32;
            let frequency = 110.0 + 110.0 * time / 4.0;
            let phase = TAU * frequency * time;
            (phase.sin() + 0.5 * (2.0 * phase).sin() + 0.25 * (3.0 * phase).sin()) * 0.4
        })
        .collect::<Vec<_>>();
    AudioSourceBuffer::from_planar(vec![samples], SAMPLE_RATE)
}

/// Pointer events of the gesture at the given time step: finger 1 drags from left to right,
/// finger 2 holds still in the upper right for a while.
fn gesture_events(time: Duration) -> Vec<PointerEvent> {
    let millis = time.as_millis() as u64;
    let mut events = Vec::new();
    match millis {
        0 => events.push(PointerEvent::down(1, 100.0, 200.0)),
        1..=2500 => {
            let x = 100.0 + 600.0 * millis as f32 / 2500.0;
            events.push(PointerEvent::moved(1, x, 200.0));
        }
        _ => {}
    }
    match millis {
        800 => events.push(PointerEvent::down(2, 650.0, 80.0)),
        1800 => events.push(PointerEvent::up(2)),
        2600 => events.push(PointerEvent::up(1)),
        _ => {}
    }
    events
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    let args = parse_args::<Arguments>();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("touch-gesture.wav"));

    // Create the software engine and let the wav output drive its renderer
    let (engine, renderer) = RenderEngine::new(SAMPLE_RATE)?;
    let mut output = WavOutput::open_with_specs(&output_path, SAMPLE_RATE, 2)?;
    output.play(renderer)?;

    let mut config = SessionConfig::new().master_volume(0.5);
    if let Some(seed) = args.seed {
        config = config.random_seed(seed);
    }
    let mut session = Session::start(
        config,
        Ok(engine),
        PixelRaster::new(800, 400),
        PixelRaster::new(800, 400),
    )?;
    session.load_buffer(synthesize_source()?);
    session.parameters_mut().set_attack(0.08)?;
    session.parameters_mut().set_release(0.2)?;
    session.parameters_mut().set_spread(0.05)?;
    session.parameters_mut().set_pan(0.6)?;

    // Run the gesture in lock step with the wav renderer
    let gesture_end = Duration::from_millis(2600);
    let mut time = Duration::ZERO;
    while time <= gesture_end {
        for event in gesture_events(time) {
            session.handle_pointer(event, time);
        }
        session.advance(time);
        output.render_until(time + STEP)?;
        time += STEP;
    }
    println!(
        "gesture done: {} grains still playing",
        session.live_grain_count()
    );

    // Let the remaining grains fade out
    let end = time + TAIL;
    while time <= end {
        session.advance(time);
        output.render_until(time + STEP)?;
        time += STEP;
    }
    session.teardown();
    output.close()?;

    println!("wrote {:?} of audio to {}", output.position(), output_path.display());
    Ok(())
}
