use std::path::PathBuf;

use anyhow::Context;
use vstage::{Color, ConfigManager, ElementFactory, ElementStyle, Point, ResourceCache};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// Usage: `vstage [settings.json] [out.png]`
fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let settings_path = PathBuf::from(args.next().unwrap_or_else(|| "vstage.json".to_string()));
    let out_path = PathBuf::from(args.next().unwrap_or_else(|| "vstage.png".to_string()));

    let config = ConfigManager::load(&settings_path)
        .with_context(|| format!("loading {}", settings_path.display()))?;
    vstage::logging::init(config.get().log_debug);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    runtime.block_on(async {
        let mut stage = vstage::open_stage(&config, WIDTH, HEIGHT)?
            .with_resources(ResourceCache::with_system_fonts());

        let backdrop = ElementFactory::create(
            "rectangle",
            vec![Point::new(40.0, 40.0), Point::new(600.0, 440.0)],
            ElementStyle::filled(Color::rgb(0.95, 0.95, 0.97)),
        )?;
        let disc = ElementFactory::create(
            "circle",
            vec![Point::new(220.0, 240.0), Point::new(300.0, 240.0)],
            ElementStyle::filled(Color::rgb(0.9, 0.3, 0.2)),
        )?;
        let mut card = ElementFactory::create(
            "rectangle",
            vec![Point::new(340.0, 160.0), Point::new(520.0, 300.0)],
            ElementStyle::filled(Color::ACCENT),
        )?;
        card.set_rotation(15.0);
        let caption = ElementFactory::text(Point::new(80.0, 380.0), "vstage", ElementStyle::default())?;

        stage.add_element(backdrop)?;
        stage.add_element(disc)?;
        let card = stage.add_element(card)?;
        stage.add_element(caption)?;
        stage.select(card)?;

        let frame = vstage::export_png(&mut stage, &out_path).await?;
        for report in &frame.reports {
            tracing::info!(
                layer = ?report.layer,
                executed = report.executed,
                failed = report.failed,
                "layer rendered"
            );
        }
        stage.close();
        anyhow::Ok(())
    })
}
