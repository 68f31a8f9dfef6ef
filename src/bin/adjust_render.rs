use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[path = "../loader.rs"]
mod loader;
#[path = "../processing/mod.rs"]
mod processing;
#[path = "../state.rs"]
mod state;
#[path = "../surface.rs"]
mod surface;

const USAGE: &str =
    "usage: adjust_render <image> [adjustments.json] [output.png] [--noise-seed=N]";

struct Args {
    input: PathBuf,
    adjustments: Option<PathBuf>,
    output: PathBuf,
    noise_seed: Option<u64>,
}

fn parse_args(raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut positional = Vec::new();
    let mut noise_seed = None;
    for arg in raw {
        if let Some(seed) = arg.strip_prefix("--noise-seed=") {
            noise_seed = Some(
                seed.parse::<u64>()
                    .with_context(|| format!("invalid noise seed {:?}", seed))?,
            );
        } else {
            positional.push(PathBuf::from(arg));
        }
    }
    let mut positional = positional.into_iter();
    let input = positional.next().context(USAGE)?;
    let adjustments = positional.next();
    let output = positional
        .next()
        .unwrap_or_else(|| PathBuf::from("edited_image.png"));
    Ok(Args {
        input,
        adjustments,
        output,
        noise_seed,
    })
}

fn read_adjustments(path: Option<&PathBuf>) -> Result<state::Adjustments> {
    let Some(path) = path else {
        return Ok(state::Adjustments::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read failed for {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid adjustments in {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let adjustments = read_adjustments(args.adjustments.as_ref())?;
    let image = loader::open(&args.input)?
        .with_context(|| format!("{} is not an image", args.input.display()))?;

    let t0 = Instant::now();
    let mut surface = surface::Surface::new(image.pixels.width(), image.pixels.height());
    processing::pipeline::render(&image.pixels, &adjustments, &mut surface);
    let render_ms = t0.elapsed().as_secs_f64() * 1000.0;

    if let Some(seed) = args.noise_seed {
        processing::noise::add(surface.pixels_mut(), &mut StdRng::seed_from_u64(seed));
    }

    let png = surface.encode_png()?;
    std::fs::write(&args.output, png)
        .with_context(|| format!("write failed for {}", args.output.display()))?;
    tracing::info!(output = %args.output.display(), key = %image.key, "rendered");

    println!("METRIC render_ms={:.2}", render_ms);
    println!("METRIC output={}", args.output.display());
    Ok(())
}
