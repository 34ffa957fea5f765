//! The `screen-analysis models` command for managing the local model.

use std::path::Path;

use clap::{Args, Subcommand};
use screen_analysis_core::backend::{DECODER_FILENAME, ENCODER_FILENAME, TOKENIZER_FILENAME};
use screen_analysis_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download the Pix2Struct encoder, decoder and tokenizer
    Download {
        /// Hugging Face repository hosting the ONNX export (e.g. `owner/pix2struct-screen2words-base`)
        #[arg(long)]
        repo: String,

        /// Directory inside the repository holding the ONNX files
        #[arg(long, default_value = "onnx")]
        subdir: String,

        /// Git revision to download from
        #[arg(long, default_value = "main")]
        revision: String,
    },

    /// List installed model files
    List,

    /// Show model directory path
    Path,
}

/// One file to fetch: where it lives in the repo and what it is called locally.
#[derive(Debug, PartialEq, Eq)]
struct RemoteFile {
    remote_path: String,
    local_name: &'static str,
}

/// Files making up the local model, in download order.
fn model_files(subdir: &str) -> Vec<RemoteFile> {
    let in_subdir = |name: &str| {
        let subdir = subdir.trim_matches('/');
        if subdir.is_empty() {
            name.to_string()
        } else {
            format!("{subdir}/{name}")
        }
    };

    vec![
        RemoteFile {
            remote_path: in_subdir(ENCODER_FILENAME),
            local_name: ENCODER_FILENAME,
        },
        RemoteFile {
            remote_path: in_subdir(DECODER_FILENAME),
            local_name: DECODER_FILENAME,
        },
        RemoteFile {
            remote_path: TOKENIZER_FILENAME.to_string(),
            local_name: TOKENIZER_FILENAME,
        },
    ]
}

fn hub_url(repo: &str, revision: &str, remote_path: &str) -> String {
    format!("https://huggingface.co/{repo}/resolve/{revision}/{remote_path}")
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download {
            repo,
            subdir,
            revision,
        } => {
            let client = reqwest::Client::new();
            download_model(&client, &config, &repo, &subdir, &revision).await?;
            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();

            if !model_dir.exists() {
                println!("No models installed.");
                println!("Run `screen-analysis models download --repo <hf-repo>` to download the local model.");
                return Ok(());
            }

            println!("Installed models:");
            println!("  Directory: {}\n", model_dir.display());

            let mut names: Vec<String> = std::fs::read_dir(&model_dir)?
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_dir())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            if !names.contains(&config.local.model) {
                names.push(config.local.model.clone());
            }
            names.sort();

            for name in names {
                let default_marker = if name == config.local.model {
                    "  (default)"
                } else {
                    ""
                };
                println!("  {}{}", name, default_marker);
                let dir = model_dir.join(&name);
                for file in [ENCODER_FILENAME, DECODER_FILENAME, TOKENIZER_FILENAME] {
                    let status = if dir.join(file).exists() {
                        "ready"
                    } else {
                        "not installed"
                    };
                    println!("    - {:30} {}", file, status);
                }
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.local_model_path().display());
        }
    }

    Ok(())
}

/// Download every model file into the configured model directory.
///
/// Skips files that already exist.
async fn download_model(
    client: &reqwest::Client,
    config: &Config,
    repo: &str,
    subdir: &str,
    revision: &str,
) -> anyhow::Result<()> {
    let dest_dir = config.local_model_path();
    std::fs::create_dir_all(&dest_dir)?;

    for file in model_files(subdir) {
        let dest = dest_dir.join(file.local_name);
        if dest.exists() {
            tracing::info!("{} already exists at {:?}", file.local_name, dest);
            continue;
        }

        let url = hub_url(repo, revision, &file.remote_path);
        tracing::info!("Downloading {}...", file.local_name);
        tracing::info!("  Source: {}", url);
        tracing::info!("  Destination: {:?}", dest);

        download_file(client, &url, &dest).await?;

        let file_size = std::fs::metadata(&dest)?.len();
        tracing::info!(
            "  {} complete ({:.1} MB)",
            file.local_name,
            file_size as f64 / (1024.0 * 1024.0)
        );
    }

    Ok(())
}

/// Download a file from a URL to a local path, streaming to disk.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> anyhow::Result<()> {
    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let total_size = response.content_length();
    if let Some(size) = total_size {
        tracing::info!("  Size: {:.1} MB", size as f64 / (1024.0 * 1024.0));
    }

    save_stream(response.bytes_stream(), dest, total_size).await
}

/// Write a byte stream to `dest`.
///
/// Writes to a `.part` file first and renames on success, so an interrupted
/// download is never mistaken for a complete one. The `.part` file is
/// removed if the stream or a write fails.
async fn save_stream<S, B, E>(stream: S, dest: &Path, total_size: Option<u64>) -> anyhow::Result<()>
where
    S: futures_util::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let partial = dest.with_extension("part");
    if let Err(e) = write_partial(stream, &partial, total_size).await {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
            tracing::warn!("Could not remove {:?}: {}", partial, cleanup);
        }
        return Err(e);
    }

    tokio::fs::rename(&partial, dest).await?;
    Ok(())
}

async fn write_partial<S, B, E>(stream: S, partial: &Path, total_size: Option<u64>) -> anyhow::Result<()>
where
    S: futures_util::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = std::pin::pin!(stream);
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        file.write_all(chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total_size {
            if downloaded % (50 * 1024 * 1024) < chunk.len() as u64 {
                tracing::info!(
                    "  Progress: {:.0}%",
                    downloaded as f64 / total as f64 * 100.0
                );
            }
        }
    }

    file.flush().await?;
    Ok(())
}
