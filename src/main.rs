use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use photo_compressor_rust::{
    default_crop, format_size, AspectRatio, CropBox, JpegSurfaceEncoder, Progress, Session,
    SourceImage, Strategy, DOWNLOAD_FILE_NAME,
};

/// Crop a photo and compress it to roughly a target size
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image file
    input: PathBuf,

    /// Output JPEG file
    #[arg(default_value = DOWNLOAD_FILE_NAME)]
    output: PathBuf,

    /// Target size in KB (10-500)
    #[arg(long, default_value_t = 100)]
    target_kb: i64,

    /// quality-decay or binary-search
    #[arg(long, default_value = "binary-search")]
    strategy: Strategy,

    /// free, 1:1, 4:3 or 16:9
    #[arg(long, default_value = "free")]
    aspect: AspectRatio,

    /// Explicit crop box as X,Y,WxH (refit to --aspect)
    #[arg(long)]
    crop: Option<CropBox>,

    /// Pause between attempts in milliseconds
    #[arg(long, default_value_t = 0)]
    attempt_delay_ms: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Loading image: {:?}", args.input);
    let start = Instant::now();
    let source = SourceImage::open(&args.input).context("Failed to load image")?;
    let (width, height) = source.dimensions();
    println!(
        "Loaded {}x{} {} in {:.2?}",
        width,
        height,
        source.mime(),
        start.elapsed()
    );
    println!("Original size: {}", format_size(source.original_size()));

    let mut session = Session::new(JpegSurfaceEncoder)
        .with_attempt_delay(Duration::from_millis(args.attempt_delay_ms));
    session.load(source);

    let crop_box = match args.crop {
        Some(b) if args.aspect != AspectRatio::Free => b.constrain(args.aspect, width, height),
        Some(b) => b,
        None => default_crop(width, height, args.aspect),
    };
    if crop_box != CropBox::full(width, height) {
        let preview = session.apply_crop(crop_box).context("Failed to crop image")?;
        println!(
            "Cropped to {} ({} at preview quality, {:.1}% smaller)",
            crop_box,
            format_size(preview.size()),
            preview.reduction_percent()
        );
    }

    let outcome = session
        .compress(args.target_kb, args.strategy, &mut |p| match &p {
            Progress::Attempt { .. } => log::info!("{:>3}% {}", p.percent(), p.status()),
            _ => println!("{:>3}% {}", p.percent(), p.status()),
        })
        .context("Compression failed")?;

    println!(
        "Final size:    {} after {} attempts at quality {:.2}",
        format_size(outcome.final_size()),
        outcome.attempts,
        outcome.quality
    );
    println!("Reduction:     {}", outcome.reduction_label());

    session.save(&args.output).context("Failed to save image")?;
    println!("Saved to {:?}", args.output);

    Ok(())
}
