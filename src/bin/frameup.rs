use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use frameup::{
    CropPolicy, ExportVariant, FrameupResult, LayerRgba, MockupOptions, OutputFormat,
    SilhouetteCache, TemplateCatalog,
    cutout::{LumaThreshold, checked_cutout},
    export::write_layer,
    matting::MatFrameSpec,
    pipeline::render_mockup,
};

#[derive(Parser, Debug)]
#[command(name = "frameup", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite one artwork into one template.
    Mockup(MockupArgs),
    /// Composite every artwork in a folder into every catalog template.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct MockupArgs {
    /// Artwork image (PNG/JPEG/WebP; alpha is honored).
    #[arg(long)]
    artwork: PathBuf,

    /// Template id from the catalog.
    #[arg(long)]
    template: String,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Folder of artwork images.
    #[arg(long)]
    artwork_dir: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Template catalog JSON.
    #[arg(long)]
    catalog: PathBuf,

    /// Output sizes, e.g. --size 1600x1200 --size 800x800.
    #[arg(long = "size", value_parser = parse_size, required = true)]
    sizes: Vec<(u32, u32)>,

    /// Output encoding for all sizes.
    #[arg(long, value_enum, default_value_t = FormatChoice::Jpeg)]
    format: FormatChoice,

    /// Output directory.
    #[arg(long)]
    out: PathBuf,

    /// Add a white mat and dark frame around the artwork before placement.
    #[arg(long)]
    mat_frame: bool,

    /// Letterbox instead of cropping when aspect ratios differ.
    #[arg(long)]
    pad: bool,

    /// Background removal applied to the artwork before placement.
    #[arg(long, value_enum, default_value_t = CutoutChoice::None)]
    cutout: CutoutChoice,
}

#[derive(Clone, Copy, Debug, PartialEq, clap::ValueEnum)]
enum CutoutChoice {
    None,
    Luma,
}

fn apply_cutout(choice: CutoutChoice, artwork: LayerRgba) -> FrameupResult<LayerRgba> {
    match choice {
        CutoutChoice::None => Ok(artwork),
        CutoutChoice::Luma => checked_cutout(&LumaThreshold::default(), &artwork),
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum FormatChoice {
    Jpeg,
    Png,
}

impl From<FormatChoice> for OutputFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Jpeg => OutputFormat::Jpeg,
            FormatChoice::Png => OutputFormat::Png,
        }
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("bad width in '{s}'"))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("bad height in '{s}'"))?;
    if w == 0 || h == 0 {
        return Err(format!("size must be non-zero, got '{s}'"));
    }
    Ok((w, h))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Mockup(args) => cmd_mockup(args),
        Command::Batch(args) => cmd_batch(args),
    }
}

fn variants_for(common: &CommonArgs) -> Vec<ExportVariant> {
    let format = common.format.into();
    common
        .sizes
        .iter()
        .map(|&(width, height)| ExportVariant {
            width,
            height,
            format,
        })
        .collect()
}

fn options_for(common: &CommonArgs) -> MockupOptions {
    MockupOptions {
        mat_frame: common.mat_frame.then(MatFrameSpec::default),
        crop: if common.pad {
            CropPolicy::Pad
        } else {
            CropPolicy::CenterCrop
        },
    }
}

fn cmd_mockup(args: MockupArgs) -> anyhow::Result<()> {
    let catalog = TemplateCatalog::load(&args.common.catalog)?;
    let template = catalog.get(&args.template)?;
    let artwork = apply_cutout(
        args.common.cutout,
        frameup::decode::load_artwork(&args.artwork)?,
    )?;

    let variants = variants_for(&args.common);
    let options = options_for(&args.common);
    let outputs = render_mockup(&artwork, template, &variants, &options, None)?;

    std::fs::create_dir_all(&args.common.out)
        .with_context(|| format!("create output dir '{}'", args.common.out.display()))?;

    let stem = artwork_stem(&args.artwork);
    for output in &outputs {
        let path = output_path(&args.common.out, &stem, &args.template, &output.variant);
        write_layer(&path, &output.layer, output.variant.format)?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let catalog = TemplateCatalog::load(&args.common.catalog)?;
    if catalog.is_empty() {
        anyhow::bail!("catalog has no templates");
    }

    let variants = variants_for(&args.common);
    let options = options_for(&args.common);
    // Shadow layers are shared between artworks casting the same silhouette.
    let cache = SilhouetteCache::new(catalog.len() * 4);

    std::fs::create_dir_all(&args.common.out)
        .with_context(|| format!("create output dir '{}'", args.common.out.display()))?;

    let mut artworks: Vec<PathBuf> = std::fs::read_dir(&args.artwork_dir)
        .with_context(|| format!("read artwork dir '{}'", args.artwork_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    artworks.sort();

    let mut ok = 0usize;
    let mut failed = 0usize;

    for artwork_path in &artworks {
        let stem = artwork_stem(artwork_path);
        let artwork = match frameup::decode::load_artwork(artwork_path)
            .and_then(|artwork| apply_cutout(args.common.cutout, artwork))
        {
            Ok(artwork) => artwork,
            Err(err) => {
                // A bad artwork never aborts the batch.
                eprintln!("skip {}: {err}", artwork_path.display());
                failed += 1;
                continue;
            }
        };

        for template_id in catalog.ids().map(str::to_string).collect::<Vec<_>>() {
            let template = catalog.get(&template_id)?;
            match render_mockup(&artwork, template, &variants, &options, Some(&cache)) {
                Ok(outputs) => {
                    for output in &outputs {
                        let path =
                            output_path(&args.common.out, &stem, &template_id, &output.variant);
                        write_layer(&path, &output.layer, output.variant.format)?;
                    }
                    ok += 1;
                }
                Err(err) => {
                    eprintln!("failed {} x {template_id}: {err}", artwork_path.display());
                    failed += 1;
                }
            }
        }
    }

    eprintln!("batch done: {ok} succeeded, {failed} failed");
    if ok == 0 && failed > 0 {
        anyhow::bail!("every batch item failed");
    }
    Ok(())
}

fn artwork_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artwork".to_string())
}

fn output_path(out_dir: &Path, stem: &str, template: &str, variant: &ExportVariant) -> PathBuf {
    out_dir.join(format!(
        "{stem}_{template}_{}x{}.{}",
        variant.width,
        variant.height,
        variant.format.extension()
    ))
}
