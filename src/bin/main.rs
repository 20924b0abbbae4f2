use clap::Parser;
use pattern_detection::app::{PatternApp, WINDOW_TITLE};
use pattern_detection::config::{init_logging, Args, Settings};

fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();
    init_logging();
    let settings = Settings::from(args);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(|cc| Box::new(PatternApp::new(cc, settings))),
    )
    .map_err(|err| anyhow::anyhow!("Window failed: {err}"))?;
    Ok(())
}
