use anyhow::Context;
use clap::Parser;
use opencv::highgui;
use pattern_detection::config::{init_logging, Args, Settings};
use pattern_detection::models::{resolve_cascade_dir, scan_models, select_model};
use pattern_detection::{
    convert_to_grayscale, draw_regions, read_or_skip, CameraSource, CascadeDetector, Detector,
};
use tracing::info;

const ESCAPE: i32 = 27;
/// How long to pump window events before retrying a failed read.
const READ_RETRY_DELAY_MS: i32 = 10;

fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();
    init_logging();
    let settings = Settings::from(args);

    let cascade_dir = resolve_cascade_dir(settings.cascade_dir.as_deref())?;
    let models = scan_models(&cascade_dir)?;
    let model = select_model(&models, settings.initial_model.as_deref())
        .with_context(|| format!("No cascades in {}", cascade_dir.display()))?;
    info!(model = %model.name, "Previewing");

    let window = "pattern preview";
    highgui::named_window_def(window)?;

    let mut camera_source = CameraSource::new(settings.camera_index)?;
    let mut detector = CascadeDetector::new(model, settings.detection)?;

    loop {
        let key = match read_or_skip(&mut camera_source) {
            Some(mut frame) => {
                let gray = convert_to_grayscale(&frame)?;
                let regions = detector.detect(&gray)?;
                draw_regions(&mut frame, &regions)?;

                highgui::imshow(window, &frame)?;
                highgui::poll_key()?
            }
            None => highgui::wait_key(READ_RETRY_DELAY_MS)?,
        };
        if key == ESCAPE {
            break;
        }
    }
    Ok(())
}
