use clap::{Parser, ValueEnum};
use scrollshot::cdp::CdpTarget;
use scrollshot::{
    CaptureConfig, CaptureTarget, Direction, FileSink, Pipeline, Region, ViewportSize,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capture a region of a web page, scrolling and stitching as needed
#[derive(Parser)]
#[command(name = "scrollshot", version)]
struct Args {
    /// Page to capture
    url: String,

    /// Region left edge in page coordinates
    #[arg(long, default_value_t = 0.0)]
    x: f64,

    /// Region top edge in page coordinates
    #[arg(long, default_value_t = 0.0)]
    y: f64,

    /// Region width in logical pixels
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Region height in logical pixels
    #[arg(long, default_value_t = 600.0)]
    height: f64,

    /// Capture once at the current scroll position instead of scrolling
    #[arg(long)]
    single: bool,

    /// Scroll direction for stitched captures
    #[arg(long, value_enum, default_value_t = ScrollDirection::Vertical)]
    direction: ScrollDirection,

    /// Directory the image is written into
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Browser viewport, WIDTHxHEIGHT
    #[arg(long, default_value = "1280x1000")]
    viewport: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScrollDirection {
    Vertical,
    Horizontal,
}

impl From<ScrollDirection> for Direction {
    fn from(d: ScrollDirection) -> Self {
        match d {
            ScrollDirection::Vertical => Direction::Vertical,
            ScrollDirection::Horizontal => Direction::Horizontal,
        }
    }
}

fn parse_viewport(spec: &str) -> anyhow::Result<ViewportSize> {
    let (w, h) = spec
        .split_once('x')
        .ok_or_else(|| anyhow::anyhow!("viewport must be WIDTHxHEIGHT, got '{}'", spec))?;
    Ok(ViewportSize {
        width: w.parse()?,
        height: h.parse()?,
    })
}

async fn run(args: Args) -> anyhow::Result<()> {
    let viewport = parse_viewport(&args.viewport)?;
    let mut target = CdpTarget::launch(viewport)?;
    target.navigate(&args.url)?;

    let dpr = target.device_pixel_ratio()?;
    let region = Region::new(args.x, args.y, args.width, args.height, dpr);
    let pipeline = Pipeline::new(CaptureConfig::default(), FileSink::new(&args.out));

    let outcome = if args.single {
        pipeline.capture_region(&mut target, region).await?
    } else {
        // Ctrl-C cancels at the driver's next suspension point
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.store(true, Ordering::Relaxed);
            }
        });
        pipeline
            .capture_scrolling(&mut target, region, args.direction.into(), Some(cancel))
            .await?
    };

    println!(
        "Wrote {} ({} frame(s), {}x{} px)",
        outcome.path.display(),
        outcome.frames,
        outcome.width,
        outcome.height
    );

    target.close()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}
