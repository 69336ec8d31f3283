use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use wxpack::model::validate_assets;
use wxpack::{Asset, AssetType, Spec, SvgMapOptions};

#[derive(Parser, Debug)]
#[command(name = "wxpack", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Map an SVG icon to a canonical spec JSON document.
    Map(MapArgs),
    /// Pack spec documents (and their asset payloads) into a WXPK file.
    Pack(PackArgs),
    /// Extract one spec document from a WXPK file.
    Extract(ExtractArgs),
}

#[derive(Parser, Debug)]
struct MapArgs {
    /// Input SVG.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output spec JSON path.
    #[arg(long)]
    out: PathBuf,

    /// Icon name; defaults to the SVG's own hint, then the file stem.
    #[arg(long)]
    name: Option<String>,

    /// Raster size in pixels; defaults to the SVG's declared size.
    #[arg(long)]
    size: Option<u32>,
}

#[derive(Parser, Debug)]
struct PackArgs {
    /// Spec JSON path; repeat for multiple specs.
    #[arg(long = "spec", required = true)]
    specs: Vec<PathBuf>,

    /// Directory holding `<asset_key>_<size>.bin` payload files. Without
    /// it the pack carries spec documents only.
    #[arg(long)]
    assets_root: Option<PathBuf>,

    /// Raster size the payloads were produced at.
    #[arg(long, default_value_t = 96)]
    size: u32,

    /// Output WXPK path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Input WXPK path.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Spec to extract: an icon name or a numeric id (0x-prefixed hex ok).
    #[arg(long)]
    id: String,

    /// Output JSON path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Verify file and entry CRCs first.
    #[arg(long)]
    verify: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Map(args) => cmd_map(args),
        Command::Pack(args) => cmd_pack(args),
        Command::Extract(args) => cmd_extract(args),
    }
}

fn cmd_map(args: MapArgs) -> anyhow::Result<()> {
    let svg_text = fs::read_to_string(&args.in_path)
        .with_context(|| format!("read svg '{}'", args.in_path.display()))?;
    let stem = args.in_path.file_stem().and_then(|s| s.to_str());

    let opts = SvgMapOptions {
        name: args.name.as_deref(),
        size_px: args.size,
        source_stem: stem,
    };
    let mapped = wxpack::map_svg_to_spec(&svg_text, &opts)?;
    let json = mapped.spec.to_canonical_json()?;

    write_with_parents(&args.out, json.as_bytes())?;
    eprintln!(
        "wrote {} (spec_id {:#010x}, {} layers, {} px)",
        args.out.display(),
        mapped.spec.spec_id,
        mapped.spec.layers.len(),
        mapped.size_px
    );
    Ok(())
}

fn cmd_pack(args: PackArgs) -> anyhow::Result<()> {
    let mut specs = Vec::with_capacity(args.specs.len());
    for path in &args.specs {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read spec '{}'", path.display()))?;
        let spec = Spec::from_canonical_json(&text)
            .with_context(|| format!("parse spec '{}'", path.display()))?;
        specs.push(spec);
    }

    let mut assets = Vec::new();
    let mut payloads = BTreeMap::new();
    if let Some(root) = &args.assets_root {
        for spec in &specs {
            for layer in &spec.layers {
                if payloads.contains_key(&layer.asset) {
                    continue;
                }
                let file = root.join(format!("{}_{}.bin", layer.asset, args.size));
                let bytes = fs::read(&file)
                    .with_context(|| format!("read payload '{}'", file.display()))?;
                assets.push(Asset::new(
                    &layer.asset,
                    AssetType::Image,
                    args.size,
                    file.display().to_string(),
                )?);
                payloads.insert(layer.asset.clone(), bytes);
            }
        }
        validate_assets(&assets, args.size)?;
    }

    let data = wxpack::build_pack(&specs, &assets, &payloads)?;
    write_with_parents(&args.out, &data)?;
    eprintln!(
        "wrote {} ({} specs, {} assets, {} bytes)",
        args.out.display(),
        specs.len(),
        assets.len(),
        data.len()
    );
    Ok(())
}

fn cmd_extract(args: ExtractArgs) -> anyhow::Result<()> {
    let data = fs::read(&args.in_path)
        .with_context(|| format!("read pack '{}'", args.in_path.display()))?;
    if args.verify {
        wxpack::verify_pack_crc(&data)?;
    }

    let spec_id = parse_spec_id(&args.id)?;
    let value = wxpack::extract_spec_json(&data, spec_id)?;
    let json = serde_json::to_string_pretty(&value).context("serialize extracted spec")?;

    match &args.out {
        Some(out) => {
            write_with_parents(out, json.as_bytes())?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// A numeric id (decimal or 0x-hex) is used as-is; anything else is
/// treated as an icon name and hashed.
fn parse_spec_id(raw: &str) -> anyhow::Result<u32> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).with_context(|| format!("parse hex id '{raw}'"));
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse().with_context(|| format!("parse id '{raw}'"));
    }
    let name = wxpack::ident::normalize(raw)?;
    Ok(wxpack::hash::fnv1a32(&name))
}

fn write_with_parents(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))
}
