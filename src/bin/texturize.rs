use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use image_to_texture_wasm::{TextureSettings, process_bytes};
use anyhow::Context;
use anyhow::Result;

/// Turn images into square, alpha-masked, four-color extrusion textures.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON file with pipeline settings; flags below override it
    #[arg(long)]
    settings: Option<PathBuf>,

    /// RGB distance below which a pixel matches the top-left reference color
    #[arg(long)]
    bg_tolerance: Option<f32>,

    /// Alpha below which a pixel is background when the top-left pixel is transparent
    #[arg(long)]
    alpha_cutoff: Option<u8>,

    /// Per-channel quantization step for color buckets
    #[arg(long)]
    bucket_step: Option<u8>,

    /// Maximum palette size
    #[arg(short = 'k', long)]
    max_colors: Option<usize>,

    /// Minimum RGB distance between palette colors
    #[arg(long)]
    min_distance: Option<f32>,

    /// Margin around the content, in percent of its larger side
    #[arg(short, long)]
    margin: Option<u32>,

    /// Largest canvas, in pixels, the pipeline may allocate
    #[arg(long)]
    max_surface_pixels: Option<u64>,

    /// Output directory
    #[arg(short = 'd', long)]
    out_dir: Option<PathBuf>,

    /// Output filename prefix (ignored when --out-dir supplied)
    #[arg(short = 'p', long, default_value = "texture_")]
    prefix: String,

    /// Print a JSON report for every input
    #[arg(long)]
    report: bool,
}

impl Args {
    fn texture_settings(&self) -> Result<TextureSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("reading settings {}", path.display()))?;
                TextureSettings::from_json(&json)?
            }
            None => TextureSettings::default(),
        };

        if let Some(v) = self.bg_tolerance {
            settings.bg_color_tolerance = v;
        }
        if let Some(v) = self.alpha_cutoff {
            settings.bg_alpha_cutoff = v;
        }
        if let Some(v) = self.bucket_step {
            settings.bucket_step = v;
        }
        if let Some(v) = self.max_colors {
            settings.max_colors = v;
        }
        if let Some(v) = self.min_distance {
            settings.min_color_distance = v;
        }
        if let Some(v) = self.margin {
            settings.margin_percent = v;
        }
        if let Some(v) = self.max_surface_pixels {
            settings.max_surface_pixels = v;
        }

        Ok(settings)
    }

    /// Pass-throughs keep the input's extension since their bytes are the original's.
    fn output_path(&self, input: &Path, processed: bool) -> Result<PathBuf> {
        let ext = if processed {
            "png".into()
        } else {
            input.extension().unwrap_or_default().to_string_lossy()
        };
        if let Some(dir) = &self.out_dir {
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            return Ok(dir.join(format!("{stem}.{ext}")));
        }
        let stem = input
            .file_stem()
            .with_context(|| format!("no file name in {}", input.display()))?
            .to_string_lossy();
        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        Ok(parent.join(format!("{}{}.{}", self.prefix, stem, ext)))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let settings = args.texture_settings()?;

    for input in &args.inputs {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let result = process_bytes(&bytes, &settings);

        if let Some(detail) = &result.report.detail {
            log::warn!("{}: kept original ({detail})", input.display());
        }

        let out_path = args.output_path(input, result.report.processed)?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, &result.bytes)
            .with_context(|| format!("writing {}", out_path.display()))?;

        if args.report {
            let report = serde_json::json!({
                "input": input.display().to_string(),
                "output": out_path.display().to_string(),
                "result": result.report,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("Saved → {}", out_path.display());
        }
    }

    Ok(())
}
