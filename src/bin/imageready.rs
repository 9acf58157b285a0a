//! CLI for ImageReady - one-click image generation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use imageready::draft::DRAFT_KEY;
use imageready::{
    AspectRatio, DraftStore, FileStore, GeminiClient, GeminiModel, GenerationSession,
    GenerationState, ImageStyle, KeyValueStore, DOWNLOAD_FILENAME,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "imageready")]
#[command(about = "Generate an image from a prompt, a style and an optional reference image")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// File the prompt draft is kept in
    #[arg(
        long,
        global = true,
        env = "IMAGEREADY_DRAFT_FILE",
        default_value = ".imageready-draft.json"
    )]
    draft_file: PathBuf,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image
    Generate(GenerateArgs),

    /// Show or clear the saved prompt draft
    Draft {
        /// Clear the draft instead of printing it
        #[arg(long)]
        clear: bool,
    },

    /// List styles and aspect ratios
    Styles,
}

#[derive(Args)]
struct GenerateArgs {
    /// The prompt; the saved draft is used when omitted
    prompt: Option<String>,

    /// Output file path
    #[arg(short, long, default_value = DOWNLOAD_FILENAME)]
    output: PathBuf,

    /// Visual style prefixed onto the prompt
    #[arg(short, long, value_enum, default_value = "cinematic")]
    style: StyleArg,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "16:9")]
    aspect_ratio: AspectRatioArg,

    /// Things the image should avoid
    #[arg(long)]
    negative_prompt: Option<String>,

    /// Seed for reproducible output
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    seed: Option<u64>,

    /// Reference image file
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Use the higher quality (slower) model
    #[arg(long)]
    pro: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleArg {
    Cinematic,
    #[value(name = "3d")]
    ThreeD,
    Animation,
    None,
}

impl From<StyleArg> for ImageStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Cinematic => ImageStyle::Cinematic,
            StyleArg::ThreeD => ImageStyle::ThreeD,
            StyleArg::Animation => ImageStyle::Animation,
            StyleArg::None => ImageStyle::Unstyled,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "1:1")]
    Square,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Square => AspectRatio::Square,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imageready=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = Arc::new(FileStore::new(&cli.draft_file));

    match cli.command {
        Commands::Generate(args) => {
            generate_image(args, store, cli.json).await?;
        }
        Commands::Draft { clear } => {
            show_draft(store, clear, cli.json)?;
        }
        Commands::Styles => {
            list_styles(cli.json)?;
        }
    }

    Ok(())
}

async fn generate_image(
    args: GenerateArgs,
    store: Arc<FileStore>,
    json_output: bool,
) -> anyhow::Result<()> {
    let model = if args.pro {
        GeminiModel::ProImage
    } else {
        GeminiModel::FlashImage
    };
    let generator = Arc::new(GeminiClient::builder().model(model).build());
    let mut session = GenerationSession::new(generator, DraftStore::new(store));

    if let Some(prompt) = args.prompt {
        if !session.set_prompt(prompt) {
            anyhow::bail!(
                "prompt is longer than {} characters",
                session.prompt_max_len()
            );
        }
    }
    session.set_style(args.style.into());
    session.set_aspect_ratio(args.aspect_ratio.into());
    if let Some(negative) = args.negative_prompt {
        session.set_negative_prompt(negative);
    }
    session.set_seed(args.seed);

    if let Some(ref path) = args.reference {
        if !session.select_reference_image(path).await {
            anyhow::bail!("could not read reference image {}", path.display());
        }
    }

    let state = session.request_generation().await.clone();
    session.shutdown();

    match state {
        GenerationState::Succeeded(image) => {
            image.save(&args.output)?;
            if json_output {
                let result = serde_json::json!({
                    "success": true,
                    "output": args.output.display().to_string(),
                    "mime_type": image.mime_type(),
                    "style": session.options().style,
                    "aspect_ratio": session.options().aspect_ratio,
                    "generator": session.generator_name(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Generated image: {} ({}) via {}",
                    args.output.display(),
                    image.mime_type(),
                    session.generator_name()
                );
            }
            Ok(())
        }
        GenerationState::Failed(message) => {
            if json_output {
                let result = serde_json::json!({ "success": false, "error": message });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            anyhow::bail!(message)
        }
        GenerationState::Idle | GenerationState::Loading => {
            anyhow::bail!("generation did not complete")
        }
    }
}

fn show_draft(store: Arc<FileStore>, clear: bool, json_output: bool) -> anyhow::Result<()> {
    if clear {
        store.set(DRAFT_KEY, "")?;
    }
    let draft = DraftStore::new(store).load();

    if json_output {
        let result = serde_json::json!({
            "draft": draft,
            "length": draft.chars().count(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if draft.is_empty() {
        println!("No saved draft.");
    } else {
        println!("{draft}");
    }
    Ok(())
}

fn list_styles(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct StyleInfo {
        name: &'static str,
        description: &'static str,
    }

    let styles: Vec<StyleInfo> = ImageStyle::ALL
        .iter()
        .map(|style| StyleInfo {
            name: style.as_str(),
            description: style.description(),
        })
        .collect();
    let ratios: Vec<&str> = AspectRatio::ALL.iter().map(AspectRatio::as_str).collect();

    if json_output {
        let result = serde_json::json!({ "styles": styles, "aspect_ratios": ratios });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("STYLES:");
        for s in &styles {
            println!("  {}", s.name);
            println!("    {}", s.description);
        }
        println!("\nASPECT RATIOS: {}", ratios.join(", "));
    }
    Ok(())
}
