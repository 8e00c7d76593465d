//! `note-pub` command-line interface.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use note_pub_rs::markdown::{parse_document, MarkdownDocument};
use note_pub_rs::{utils, ArticleOverrides, Config, Credentials, NotePublisher};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "note-pub", version, about = "Publish Markdown articles as note drafts")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "NOTE_PUB_CONFIG")]
    config: Option<PathBuf>,

    /// Show the browser window during login
    #[arg(long, global = true)]
    headed: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append logs to this file
    #[arg(long, global = true, env = "NOTE_PUB_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new draft from a Markdown file
    Publish(ArticleArgs),
    /// Replace the content of an existing draft
    Update {
        /// Id of the draft to update
        #[arg(long)]
        draft_id: String,
        #[command(flatten)]
        article: ArticleArgs,
    },
    /// Print the HTML a Markdown file renders to
    Render {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
struct ArticleArgs {
    /// Markdown file, optionally starting with YAML front matter
    #[arg(long)]
    file: PathBuf,

    /// Title (overrides front matter)
    #[arg(long)]
    title: Option<String>,

    /// Eyecatch image (overrides front matter)
    #[arg(long)]
    image: Option<PathBuf>,

    /// Login email (defaults to NOTE_EMAIL)
    #[arg(long)]
    email: Option<String>,

    /// Login password (defaults to NOTE_PASSWORD)
    #[arg(long)]
    password: Option<String>,
}

impl ArticleArgs {
    fn credentials(&self) -> anyhow::Result<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Ok(Credentials::new(email, password)),
            _ => Credentials::from_env()
                .context("credentials missing: pass --email/--password or set NOTE_EMAIL/NOTE_PASSWORD"),
        }
    }

    fn overrides(&self) -> ArticleOverrides {
        ArticleOverrides {
            title: self.title.clone(),
            image: self.image.clone(),
            fallback_title: None,
        }
    }

    fn base_dir(&self) -> &Path {
        self.file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .apply_env()?;
    if cli.headed {
        config.headless = false;
    }

    match cli.command {
        Command::Render { file } => {
            let document = read_document(&file)?;
            print!("{}", note_pub_rs::markdown::render(&document.body));
        }
        Command::Publish(args) => {
            let document = read_document(&args.file)?;
            let credentials = args.credentials()?;
            let publisher = NotePublisher::new(config)?;

            let article = publisher
                .publish_document(&credentials, &document, args.base_dir(), &args.overrides())
                .await
                .with_context(|| format!("publishing {}", args.file.display()))?;

            info!("Draft {} saved", article.draft_id);
            println!("{}", article.url);
        }
        Command::Update { draft_id, article } => {
            let document = read_document(&article.file)?;
            let credentials = article.credentials()?;
            let publisher = NotePublisher::new(config)?;

            publisher
                .update_document(
                    &credentials,
                    &draft_id,
                    &document,
                    article.base_dir(),
                    &article.overrides(),
                )
                .await
                .with_context(|| format!("updating draft {draft_id}"))?;

            println!("{draft_id}");
        }
    }

    Ok(())
}

/// Logs to stderr, and to `log_file` when given. The returned guard flushes
/// the file writer on drop.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("{} is not a file path", path.display()))?;
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

fn read_document(path: &Path) -> anyhow::Result<MarkdownDocument> {
    if !utils::is_markdown_file(path) {
        bail!("{} is not a markdown file (.md or .markdown)", path.display());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_document(&text))
}
