use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use image::{GrayImage, Luma};
use inpaintd::canvas::{self, Canvas, DecodeLimits, Mask, OutputFormat, DEFAULT_QUALITY};
use inpaintd::config::{Device, EngineConfig, ServerConfig};
use inpaintd::engine::{InpaintEngine, OutputRange};
use inpaintd::padding::{PaddingAdapter, PaddingConvention, BLOCK_SIZE};
use inpaintd::pipeline::{InpaintPipeline, InpaintRequest, PipelineSettings};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Object removal with a learned inpainting model", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve {
        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0", env = "INPAINTD_HOST")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8000, env = "INPAINTD_PORT")]
        port: u16,

        /// Largest accepted request body in megabytes
        #[arg(long, default_value_t = 32, env = "INPAINTD_MAX_UPLOAD_MB")]
        max_upload_mb: usize,
    },
    /// Inpaint a single image file
    Erase {
        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Image to clean up
        #[arg(long)]
        image: PathBuf,

        /// Mask file, white marks the region to remove
        #[arg(long, conflicts_with = "rect", required_unless_present = "rect")]
        mask: Option<PathBuf>,

        /// Region to remove as X,Y,W,H instead of a mask file
        #[arg(long)]
        rect: Option<Rect>,

        /// Destination file, defaults to <image>_inpainted.<ext>
        #[arg(short, long = "output")]
        output_path: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Path to the LaMa ONNX model
    #[arg(long, env = "INPAINTD_MODEL")]
    model: PathBuf,

    /// Device to run on (cpu, cuda, cuda:N)
    #[arg(long, default_value = "cpu", env = "INPAINTD_DEVICE")]
    device: Device,

    /// Number of model handles; concurrent inferences never exceed it
    #[arg(long, default_value_t = 1, env = "INPAINTD_POOL_SIZE")]
    pool_size: usize,

    /// Intra-op threads per model handle
    #[arg(long, default_value_t = 4, env = "INPAINTD_THREADS")]
    threads: usize,

    /// Mask samples above this value are removed
    #[arg(long, default_value_t = 0, env = "INPAINTD_MASK_THRESHOLD")]
    mask_threshold: u8,

    /// Value range of the model output tensor
    #[arg(long, value_enum, default_value_t = OutputRange::Unit)]
    output_range: OutputRange,

    /// Where padding is placed before inference and cropped after
    #[arg(long, value_enum, default_value_t = PaddingConvention::Trailing)]
    padding: PaddingConvention,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Result encoding
    #[arg(long, value_enum, default_value_t = OutputFormat::Jpeg, env = "INPAINTD_FORMAT")]
    format: OutputFormat,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(0..=100), env = "INPAINTD_QUALITY")]
    quality: u8,

    /// Largest accepted image in megapixels
    #[arg(long, default_value_t = 40, env = "INPAINTD_MAX_MEGAPIXELS")]
    max_megapixels: u64,
}

/// Rectangle given as X,Y,W,H
#[derive(Debug, Clone, Copy)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl FromStr for Rect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid rectangle {}: {}", s, e))?;
        match parts.as_slice() {
            &[x, y, width, height] if width > 0 && height > 0 => Ok(Rect { x, y, width, height }),
            _ => Err(format!("expected X,Y,W,H with positive W and H, got {}", s)),
        }
    }
}

impl EngineArgs {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            device: self.device,
            pool_size: self.pool_size.max(1),
            intra_threads: self.threads.max(1),
            mask_threshold: self.mask_threshold,
            output_range: self.output_range,
            padding: PaddingAdapter::new(BLOCK_SIZE, self.padding),
            ..EngineConfig::new(&self.model)
        }
    }
}

fn build_pipeline(engine: &EngineArgs, output: &OutputArgs) -> Result<InpaintPipeline> {
    let config = engine.engine_config();
    tracing::info!(
        "Model: {} on {}, pool size {}",
        config.model_path.display(),
        config.device,
        config.pool_size
    );

    let engine_pool = InpaintEngine::load(&config).context("Failed to load inpainting model")?;
    tracing::info!("Inpainting engine ready ({})", engine_pool.name());

    let settings = PipelineSettings {
        format: output.format,
        quality: output.quality,
        limits: DecodeLimits {
            max_pixels: output.max_megapixels.saturating_mul(1_000_000),
        },
        padding: config.padding,
    };

    Ok(InpaintPipeline::new(Arc::new(engine_pool), settings))
}

fn rect_mask(width: u32, height: u32, rect: Rect) -> Result<Mask> {
    if rect.x >= width || rect.y >= height {
        bail!(
            "rectangle origin ({}, {}) lies outside the {}x{} image",
            rect.x,
            rect.y,
            width,
            height
        );
    }
    let right = rect.x.saturating_add(rect.width).min(width);
    let bottom = rect.y.saturating_add(rect.height).min(height);

    let image = GrayImage::from_fn(width, height, |x, y| {
        if (rect.x..right).contains(&x) && (rect.y..bottom).contains(&y) {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    Ok(Mask::from_image(image)?)
}

fn default_output_path(image: &Path, format: OutputFormat) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string());
    image.with_file_name(format!("{}_inpainted.{}", stem, format.extension()))
}

fn erase(
    pipeline: &InpaintPipeline,
    image_path: &Path,
    mask_path: Option<&Path>,
    rect: Option<Rect>,
    output_path: &Path,
) -> Result<()> {
    let image_bytes = std::fs::read(image_path)
        .with_context(|| format!("Failed to read {}", image_path.display()))?;

    let result = match (mask_path, rect) {
        (Some(mask_path), _) => {
            let mask_bytes = std::fs::read(mask_path)
                .with_context(|| format!("Failed to read {}", mask_path.display()))?;
            pipeline.run(&image_bytes, &mask_bytes)?
        }
        (None, Some(rect)) => {
            let image: Canvas = canvas::decode(&image_bytes, &pipeline.settings().limits)?;
            let (width, height) = image.dimensions();
            tracing::info!(
                "Mask: ({},{}) size {}x{} on {}x{} image",
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                width,
                height
            );
            let mask = rect_mask(width, height, rect)?;
            pipeline.process(InpaintRequest { image, mask })?
        }
        (None, None) => bail!("either --mask or --rect is required"),
    };

    std::fs::write(output_path, &result.encoded)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    tracing::info!(
        "Saved {}x{} result to {}",
        result.canvas.width(),
        result.canvas.height(),
        output_path.display()
    );

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("inpaintd {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve {
            engine,
            output,
            host,
            port,
            max_upload_mb,
        } => {
            let pipeline = build_pipeline(&engine, &output)?;
            let config = ServerConfig {
                host,
                port,
                max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            };

            let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
            runtime.block_on(inpaintd::server::run_server(pipeline, config))
        }
        Command::Erase {
            engine,
            output,
            image,
            mask,
            rect,
            output_path,
        } => {
            let pipeline = build_pipeline(&engine, &output)?;
            let output_path = output_path.unwrap_or_else(|| default_output_path(&image, output.format));
            erase(&pipeline, &image, mask.as_deref(), rect, &output_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rect() {
        let rect: Rect = "10, 20,30,40".parse().unwrap();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (10, 20, 30, 40));
        assert!("1,2,3".parse::<Rect>().is_err());
        assert!("1,2,0,4".parse::<Rect>().is_err());
        assert!("a,b,c,d".parse::<Rect>().is_err());
    }

    #[test]
    fn test_rect_mask_clips_to_image() {
        let mask = rect_mask(10, 6, Rect { x: 8, y: 4, width: 50, height: 50 }).unwrap();
        assert_eq!(mask.dimensions(), (10, 6));
        assert_eq!(mask.selected_count(0), 2 * 2);
        assert_eq!(mask.as_image().get_pixel(9, 5)[0], 255);
        assert_eq!(mask.as_image().get_pixel(7, 5)[0], 0);

        assert!(rect_mask(10, 6, Rect { x: 10, y: 0, width: 1, height: 1 }).is_err());
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/tmp/photo.png"), OutputFormat::Jpeg);
        assert_eq!(path, PathBuf::from("/tmp/photo_inpainted.jpg"));
    }

    #[test]
    fn test_cli_parses_serve() {
        let cli = Cli::try_parse_from([
            "inpaintd", "serve", "--model", "lama.onnx", "--device", "cuda:1", "--pool-size", "2",
            "--quality", "80",
        ])
        .unwrap();
        match cli.command {
            Command::Serve { engine, output, port, .. } => {
                assert_eq!(engine.device, Device::Cuda(1));
                assert_eq!(engine.engine_config().pool_size, 2);
                assert_eq!(output.quality, 80);
                assert_eq!(port, 8000);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_quality_above_100() {
        let parsed = Cli::try_parse_from(["inpaintd", "serve", "--model", "m.onnx", "--quality", "101"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cli_erase_needs_mask_or_rect() {
        let parsed = Cli::try_parse_from(["inpaintd", "erase", "--model", "m.onnx", "--image", "a.png"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "inpaintd", "erase", "--model", "m.onnx", "--image", "a.png", "--rect", "0,0,4,4",
        ]);
        assert!(parsed.is_ok());
    }

    #[test]
    fn test_cli_padding_reaches_engine_config() {
        let cli = Cli::try_parse_from([
            "inpaintd", "serve", "--model", "m.onnx", "--padding", "symmetric",
        ])
        .unwrap();
        match cli.command {
            Command::Serve { engine, .. } => {
                let config = engine.engine_config();
                assert_eq!(config.padding.convention(), PaddingConvention::Symmetric);
                assert_eq!(config.padding.block_size(), BLOCK_SIZE);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_erase_output_flag() {
        let cli = Cli::try_parse_from([
            "inpaintd", "erase", "--model", "m.onnx", "--image", "a.png", "--rect", "0,0,4,4",
            "--output", "out.png",
        ])
        .unwrap();
        match cli.command {
            Command::Erase { output_path, .. } => {
                assert_eq!(output_path, Some(PathBuf::from("out.png")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
