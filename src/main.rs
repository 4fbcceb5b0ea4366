use watcher::common::DevMode;
use watcher::core::{cosine_similarity, face_distance, FaceExtractor, FaceMatcher, OnnxFaceExtractor};
use watcher::storage::frame_store::parse_frame_name;
use watcher::storage::{FrameStore, LocalFrameStore, UrlSigner};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "watcher")]
#[command(about = "Administration tool for The Watcher")]
struct Cli {
    /// Enable development mode (data under ./dev_data)
    #[arg(long, global = true)]
    dev: bool,

    /// Config file to use instead of the mode default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the frame namespace of a camera so it can be enrolled
    InitCamera {
        camera_id: String,
    },
    /// List stored frames of a camera
    Frames {
        camera_id: String,
        /// Also print signed links (needs `signing.secret` in the config)
        #[arg(long)]
        links: bool,
    },
    /// Run face detection on an image file
    Detect {
        image: PathBuf,
    },
    /// Compare the most confident face of two image files
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let config = dev_mode.load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::InitCamera { camera_id } => {
            let store = LocalFrameStore::new(dev_mode.frames_dir(&config))?;
            store.ensure_namespace(&camera_id).await?;
            println!("Camera namespace {} ready, it can now be enrolled", camera_id);
        }
        Commands::Frames { camera_id, links } => {
            let store = LocalFrameStore::new(dev_mode.frames_dir(&config))?;
            if !store.namespace_exists(&camera_id).await? {
                println!("No namespace for camera {} (run init-camera first)", camera_id);
                return Ok(());
            }

            let signer = match (&config.signing.secret, links) {
                (Some(secret), true) => Some(UrlSigner::new(
                    secret.as_bytes().to_vec(),
                    &config.server.public_url,
                    Duration::from_secs(config.signing.url_ttl_seconds),
                )),
                (None, true) => {
                    println!("signing.secret is not set, links would not verify on the server");
                    None
                }
                _ => None,
            };

            let names = store.names(&camera_id).await?;
            let now = chrono::Utc::now().timestamp();
            for name in names.iter().rev() {
                let when = parse_frame_name(name)
                    .map(|stamp| format!("{} {}", stamp.date, stamp.time))
                    .unwrap_or_else(|| "-".into());
                match &signer {
                    Some(signer) => println!("{}  {}  {}", when, name, signer.sign(&camera_id, name, now)?.url),
                    None => println!("{}  {}", when, name),
                }
            }
            println!("{} frame(s)", names.len());
        }
        Commands::Detect { image } => {
            let extractor = OnnxFaceExtractor::new(&config, &dev_mode.models_dir())?;
            let img = load_image(&image)?;
            let faces = extractor.detector().detect(&img)?;

            println!("Found {} face(s) in {}x{} image", faces.len(), img.width(), img.height());
            for (i, face) in faces.iter().enumerate() {
                println!(
                    "  #{}: ({:.0}, {:.0}) - ({:.0}, {:.0})  confidence {:.3}",
                    i + 1, face.x1, face.y1, face.x2, face.y2, face.confidence
                );
            }
        }
        Commands::Compare { first, second } => {
            let extractor = OnnxFaceExtractor::new(&config, &dev_mode.models_dir())?;
            let a = first_encoding(&extractor, &first)?;
            let b = first_encoding(&extractor, &second)?;

            let matcher = FaceMatcher::new(config.matcher.distance_threshold);
            let distance = face_distance(&a, &b).context("Encodings have different lengths")?;
            println!("Distance:   {:.4} (threshold {:.2})", distance, matcher.threshold());
            println!("Similarity: {:.4}", cosine_similarity(&a, &b));
            println!("Verdict:    {}", if matcher.is_match(&a, &b) { "same person" } else { "different people" });
        }
    }

    Ok(())
}

fn load_image(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn first_encoding(extractor: &OnnxFaceExtractor, path: &Path) -> Result<Vec<f32>> {
    let img = load_image(path)?;
    extractor
        .extract(&img)?
        .into_iter()
        .next()
        .with_context(|| format!("No face detected in {}", path.display()))
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}
