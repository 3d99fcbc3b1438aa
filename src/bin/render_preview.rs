/// Offline preview of the mask and composite stages for one image
///
/// Reads a JSON array of words (the `words` of a processing_results.json
/// entry works as-is), then writes the inpainting mask and the text composite
/// drawn straight onto the source image. No network calls.
///
/// Usage: cargo run --bin render_preview -- input.png words.json [--output dir] [--padding 5]

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image_localizer::core::config::Config;
use image_localizer::core::types::RecognizedWord;
use image_localizer::phases::{build_mask_for_image, TextCompositor};
use image_localizer::services::CosmicTextRenderer;
use image_localizer::utils::output_format_for;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <image> <words.json> [--output dir] [--padding N]", args[0]);
        std::process::exit(1);
    }

    let input_path = PathBuf::from(&args[1]);
    let words_path = PathBuf::from(&args[2]);
    let config = Config::new().context("Failed to load config")?;

    let mut output_dir = PathBuf::from(".");
    let mut padding = config.mask_padding();

    let mut i = 3;
    while i < args.len() {
        match (args[i].as_str(), args.get(i + 1)) {
            ("--output" | "-o", Some(value)) => output_dir = PathBuf::from(value),
            ("--padding" | "-p", Some(value)) => {
                padding = value.parse().with_context(|| format!("Invalid padding '{value}'"))?
            }
            (flag, _) => bail!("Unknown or incomplete argument '{flag}'"),
        }
        i += 2;
    }

    std::fs::create_dir_all(&output_dir)?;

    println!("Loading: {}", input_path.display());
    let source = std::fs::read(&input_path).context("Failed to read image")?;
    let words: Vec<RecognizedWord> = serde_json::from_str(
        &std::fs::read_to_string(&words_path).context("Failed to read word list")?,
    )
    .context("Word list is not a JSON array of words")?;
    println!("{} regions", words.len());

    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("preview");

    let mask = build_mask_for_image(&source, &words, padding)?;
    let mask_path = output_dir.join(format!("{stem}_mask.png"));
    std::fs::write(&mask_path, mask)?;
    println!("Saved mask: {}", mask_path.display());

    println!("Loading fonts...");
    let renderer = CosmicTextRenderer::new(config.font_dir());
    let compositor = TextCompositor::new(Arc::new(renderer));

    let preview_path = output_dir.join(preview_name(&input_path, stem));
    let rendered = compositor.composite(&source, &words, output_format_for(&preview_path))?;
    std::fs::write(&preview_path, rendered)?;
    println!("Saved preview: {}", preview_path.display());

    Ok(())
}

fn preview_name(input_path: &Path, stem: &str) -> String {
    match input_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_preview.{ext}"),
        None => format!("{stem}_preview.png"),
    }
}
