use anyhow::{Context, Result};
use clap::Parser;
use diffusion_common::{dump_path, DumpFormat, LatticeDump, RenderPolicy};
use diffusion_visualizer::{
    compose_panels, render_scaled, AnimationAssembler, Annotator, GifAssembler, GlyphAnnotator,
    PngEncoder, RgbGrid,
};
use env_logger::Builder;
use image::RgbImage;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{debug, info, warn, LevelFilter};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about = "Turns recorded lattice dumps into an annotated GIF", long_about = None)]
struct Args {
    /// Run output directory containing `<population>_cells/` dump folders
    #[arg(short, long)]
    input: PathBuf,

    /// Populations to place side by side, left to right
    #[arg(short, long, value_delimiter = ',', default_value = "human,crop,lang")]
    populations: Vec<String>,

    /// Coloring policy: genotype or density
    #[arg(long, default_value = "genotype", value_parser = parse_policy)]
    policy: RenderPolicy,

    /// Dump format the run was recorded with
    #[arg(long, default_value = "json", value_parser = parse_format)]
    format: DumpFormat,

    /// Output GIF path (defaults to `<input>/<populations>_<policy>_anime.gif`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pixels per lattice cell
    #[arg(long, default_value_t = 1)]
    pixel_scale: u32,

    /// Extra white border around each panel, in pixels
    #[arg(long, default_value_t = 10)]
    padding: u32,

    /// Delay between frames in milliseconds
    #[arg(long, default_value_t = 50)]
    frame_delay_ms: u32,

    /// TrueType font for the generation and population labels (no labels without it)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Label size in pixels
    #[arg(long, default_value_t = 10.0)]
    font_size: f32,

    /// Keep the composed per-generation PNG frames next to the GIF
    #[arg(long, default_value_t = false)]
    keep_frames: bool,
}

fn parse_policy(value: &str) -> Result<RenderPolicy, String> {
    match value {
        "genotype" => Ok(RenderPolicy::Genotype),
        "density" => Ok(RenderPolicy::Density),
        other => Err(format!("unknown policy '{}' (expected genotype or density)", other)),
    }
}

fn parse_format(value: &str) -> Result<DumpFormat, String> {
    match value {
        "json" => Ok(DumpFormat::Json),
        "bincode" => Ok(DumpFormat::Bincode),
        "messagepack" => Ok(DumpFormat::MessagePack),
        other => Err(format!("unknown format '{}' (expected json, bincode or messagepack)", other)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    Builder::from_default_env().filter(None, LevelFilter::Info).init();
    run_with_args(args).map(|_| ())
}

/// Generations for which every requested population has a dump, ascending.
fn recorded_generations(input: &Path, populations: &[String], format: DumpFormat) -> Result<Vec<u32>> {
    let Some(first) = populations.first() else {
        anyhow::bail!("At least one population is required.");
    };
    let folder = input.join(format!("{}_cells", first));
    let prefix = format!("{}_cells_", first);
    let suffix = format!(".{}", format.extension());
    let mut generations: Vec<u32> = fs::read_dir(&folder)
        .with_context(|| format!("Failed to list dumps in '{}'", folder.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_prefix(&prefix)?.strip_suffix(&suffix)?.parse().ok()
        })
        .filter(|&generation| {
            populations[1..]
                .iter()
                .all(|population| dump_path(input, population, generation, format).exists())
        })
        .collect();
    generations.sort_unstable();
    Ok(generations)
}

fn load_panel(input: &Path, population: &str, generation: u32, args: &Args) -> Result<RgbImage> {
    let path = dump_path(input, population, generation, args.format);
    let bytes = fs::read(&path).with_context(|| format!("Failed to read dump '{}'", path.display()))?;
    let lattice = LatticeDump::from_bytes(args.format, &bytes)?
        .into_lattice()
        .with_context(|| format!("Malformed dump '{}'", path.display()))?;
    Ok(render_scaled(&lattice, args.policy, args.pixel_scale).to_image())
}

fn draw_frame(
    generation: u32,
    args: &Args,
    annotator: Option<&GlyphAnnotator>,
) -> Result<RgbImage> {
    let panels = args
        .populations
        .iter()
        .map(|population| load_panel(&args.input, population, generation, args))
        .collect::<Result<Vec<_>>>()?;
    let panel_size = panels.iter().map(|p| p.width().max(p.height())).max().unwrap_or(0) + 2 * args.padding;
    let mut frame = compose_panels(&panels, panel_size);

    if let Some(annotator) = annotator {
        frame = annotator.annotate(frame, &format!("generation: {:04}", generation), (2, 0))?;
        for (i, population) in args.populations.iter().enumerate() {
            let left = i as i32 * panel_size as i32 + 2;
            let top = panel_size as i32 - args.font_size.ceil() as i32 - 1;
            frame = annotator.annotate(frame, population, (left, top))?;
        }
    }
    Ok(frame)
}

fn run_with_args(args: Args) -> Result<PathBuf> {
    info!("Starting Diffusion Visualizer...");
    info!("Input directory: {}", args.input.display());
    info!("Populations: {} | Policy: {}", args.populations.join(", "), args.policy.label());

    let generations = recorded_generations(&args.input, &args.populations, args.format)?;
    if generations.is_empty() {
        anyhow::bail!("No complete set of dumps found in '{}'.", args.input.display());
    }
    info!(
        "Found {} generations ({}..={})",
        generations.len(),
        generations[0],
        generations[generations.len() - 1]
    );

    let annotator = match &args.font {
        Some(path) => Some(GlyphAnnotator::from_font_file(path, args.font_size)?),
        None => {
            warn!("No font given; frames will not be labelled.");
            None
        }
    };

    let stem = format!("{}_{}", args.populations.join("_"), args.policy.label());
    let progress_bar = ProgressBar::new(generations.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")?
            .progress_chars("#>-"),
    );

    let start_time = Instant::now();
    let encoder = PngEncoder::default();
    let frame_paths = generations
        .par_iter()
        .progress_with(progress_bar.clone())
        .map(|&generation| -> Result<PathBuf> {
            let frame = draw_frame(generation, &args, annotator.as_ref())?;
            let path = args.input.join(format!("{}_time_{:04}.png", stem, generation));
            encoder.write_file(&path, &RgbGrid::from_image(&frame))?;
            debug!("Wrote frame {}", path.display());
            Ok(path)
        })
        .collect::<Result<Vec<PathBuf>>>()?;
    progress_bar.finish_with_message("frames rendered");

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.join(format!("{}_anime.gif", stem)));
    let assembler = GifAssembler { frame_delay_ms: args.frame_delay_ms };
    let written = assembler.assemble_animation(&frame_paths, &output)?;

    if !args.keep_frames {
        for path in &frame_paths {
            if let Err(e) = fs::remove_file(path) {
                warn!("Could not remove frame '{}': {}", path.display(), e);
            }
        }
    }

    info!(
        "Animation of {} frames written to {} in {:.2?}",
        frame_paths.len(),
        written.display(),
        start_time.elapsed()
    );
    Ok(written)
}
