use clap::Parser;
use log::info;
use std::fs;
use std::path::PathBuf;
use tabula::{Page, RenderConfig, RenderSession, TabulaError, layout_page};

/// Lays out a JSON page headlessly and prints the resulting geometry as JSON.
#[derive(Parser, Debug)]
#[command(name = "tabula", version, about)]
struct Args {
    /// Page document (`{"sections": [...]}`)
    page: PathBuf,

    /// Content width in pixels
    #[arg(short, long, default_value_t = 640.0)]
    width: f32,

    /// Configuration file; defaults to ./tabula.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL for relative image paths
    #[arg(long)]
    base_url: Option<String>,

    /// Directory file:// images may be read from
    #[arg(long)]
    resource_root: Option<PathBuf>,

    /// Lay out with placeholders instead of waiting for images
    #[arg(long)]
    no_wait: bool,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), TabulaError> {
    env_logger::init();
    let args = Args::parse();

    let mut config = RenderConfig::load_from(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(root) = args.resource_root {
        config.resource_root = Some(root);
    }

    info!("Loading page from {}", args.page.display());
    let page: Page = serde_json::from_str(&fs::read_to_string(&args.page)?)?;

    let session = RenderSession::new(config)?;
    let report = layout_page(&session, &page, args.width, !args.no_wait).await;
    let json = serde_json::to_string_pretty(&report)?;

    match args.output {
        Some(path) => {
            fs::write(&path, json)?;
            info!("Wrote layout to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
