use facenet_export::{ExportConfig, export};
use log::info;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ExportConfig::default();
    info!("exporting with {}", serde_json::to_string(&config)?);

    let report = export(&config)?;
    info!(
        "model summary: {}",
        serde_json::to_string_pretty(&report.summary)?
    );

    println!(
        "✅ TFLite model successfully saved at: {}",
        report.path.display()
    );
    Ok(())
}
