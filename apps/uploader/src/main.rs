//! `cloudmux-upload`: uploads one file through the chunked upload engine.

mod config;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use cloudmux_protocol::HashAlgorithm;
use cloudmux_remote_http::{ClientCredentialsSource, HttpRemote};
use cloudmux_upload::{
    AuthHeaders, CredentialSupplier, StaticCredentials, TokenManager, UploadOrchestrator,
    UploadRequest, UploadSource,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::{AuthMode, UploaderConfig};
use progress::ProgressReporter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HashArg {
    Md5,
    Sha256,
}

impl From<HashArg> for HashAlgorithm {
    fn from(h: HashArg) -> Self {
        match h {
            HashArg::Md5 => HashAlgorithm::Md5,
            HashArg::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "cloudmux-upload", version, about = "Resumable chunked upload to a cloud drive")]
struct Cli {
    /// File to upload, or `-` to read standard input (requires --size)
    file: PathBuf,

    /// Destination folder id
    #[arg(short, long)]
    folder: String,

    /// Remote file name (defaults to the local file name)
    #[arg(short, long)]
    name: Option<String>,

    /// Byte count of standard input
    #[arg(long)]
    size: Option<u64>,

    /// Config file (defaults to ~/.config/cloudmux/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token, overriding configured credentials
    #[arg(long, env = "CLOUDMUX_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Parallel chunk uploads
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Delay between completion polls in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Give up after this many completion polls
    #[arg(long)]
    max_poll_attempts: Option<u32>,

    /// Digest algorithm the remote expects
    #[arg(long, value_enum)]
    hash: Option<HashArg>,

    /// Minimum percentage between progress lines
    #[arg(long, default_value_t = 5.0)]
    progress_step: f64,
}

impl Cli {
    fn apply(&self, config: &mut UploaderConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.access_token = token.clone();
        }
        if let Some(n) = self.concurrency {
            config.engine.concurrency = Some(n);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.engine.poll_interval_ms = ms;
        }
        if let Some(n) = self.max_poll_attempts {
            config.engine.max_poll_attempts = Some(n);
        }
        if let Some(h) = self.hash {
            config.engine.hash_algorithm = Some(h.into());
        }
    }

    fn is_stdin(&self) -> bool {
        self.file.as_os_str() == "-"
    }

    fn remote_name(&self) -> anyhow::Result<String> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        if self.is_stdin() {
            anyhow::bail!("--name is required when reading standard input");
        }
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("cannot derive a remote name from the file path")
    }
}

fn credentials(config: &UploaderConfig) -> anyhow::Result<Arc<dyn CredentialSupplier>> {
    let supplier: Arc<dyn CredentialSupplier> = match config.auth_mode()? {
        AuthMode::Bearer(token) => Arc::new(StaticCredentials::new(AuthHeaders::bearer(&token))),
        AuthMode::ClientCredentials { id, secret } => {
            let source = ClientCredentialsSource::new(&config.base_url, &id, &secret)?;
            Arc::new(TokenManager::new(source))
        }
    };
    Ok(supplier)
}

fn source(cli: &Cli) -> anyhow::Result<(UploadSource, u64)> {
    if cli.is_stdin() {
        let size = cli.size.context("--size is required when reading standard input")?;
        return Ok((UploadSource::stream(std::io::stdin()), size));
    }
    let size = std::fs::metadata(&cli.file)
        .with_context(|| format!("cannot stat {}", cli.file.display()))?
        .len();
    let source = UploadSource::file(&cli.file)
        .with_context(|| format!("cannot open {}", cli.file.display()))?;
    Ok((source, size))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cloudmux=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => UploaderConfig::load_from(path)?,
        None => UploaderConfig::load()?,
    };
    cli.apply(&mut config);
    if config.base_url.is_empty() {
        anyhow::bail!("no base URL: set baseUrl in the config file or pass --base-url");
    }

    let mut remote = HttpRemote::new(&config.base_url)?;
    if let Some(alg) = config.engine.hash_algorithm {
        remote = remote.with_hash_algorithm(alg);
    }
    let orchestrator = UploadOrchestrator::new(Arc::new(remote), credentials(&config)?, config.engine.clone());

    let file_name = cli.remote_name()?;
    let (source, total_size) = source(&cli)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling upload");
            on_signal.cancel();
        }
    });

    tracing::info!(
        file = %file_name,
        folder = %cli.folder,
        size = total_size,
        concurrency = config.engine.effective_concurrency(),
        "starting upload"
    );

    let reporter = Arc::new(ProgressReporter::new(total_size, cli.progress_step));
    let request = UploadRequest {
        destination_id: cli.folder.clone(),
        file_name,
        total_size,
    };
    let meta = orchestrator
        .upload(request, source, Some(reporter.into_callback()), &cancel)
        .await?;

    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}
