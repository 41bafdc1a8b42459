use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use spotify_scraper::{
    BulkReport, Config, ContentKind, Entity, OverwritePolicy, QualityPreference, SpotifyScraper,
    TransportStrategy, classify,
};

#[derive(Parser)]
#[command(name = "spotify-scraper")]
#[command(about = "Extract track, album, artist and playlist data from Spotify web pages")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Page transport: lightweight, full-session or auto
    #[arg(long, global = true)]
    transport: Option<TransportStrategy>,

    /// Proxy URL for every request
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Netscape cookie file with an sp_dc cookie
    #[arg(long, global = true)]
    cookies: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a track
    Track {
        reference: String,

        /// Also fetch lyrics (needs credentials)
        #[arg(long)]
        lyrics: bool,
    },

    /// Extract an album
    Album { reference: String },

    /// Extract an artist
    Artist { reference: String },

    /// Extract a playlist
    Playlist { reference: String },

    /// Download a track preview, or the cover of any entity
    Download {
        reference: String,

        /// Download the cover image instead of (or, for tracks, into) the preview
        #[arg(long)]
        cover: bool,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Image size preference, e.g. large,medium,small
        #[arg(long)]
        quality: Option<QualityPreference>,

        /// skip, overwrite or rename
        #[arg(long)]
        overwrite: Option<OverwritePolicy>,
    },

    /// Extract many references; prefix a path with @ to read one per line
    Bulk {
        #[arg(required = true)]
        references: Vec<String>,

        /// Write the JSON report here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Items processed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(transport) = cli.transport {
        config.transport = transport;
    }
    if cli.proxy.is_some() {
        config.proxy = cli.proxy;
    }
    if cli.cookies.is_some() {
        config.cookie_file = cli.cookies;
    }

    match cli.command {
        Commands::Track { reference, lyrics } => {
            let scraper = SpotifyScraper::new(config).context("Failed to initialize scraper")?;
            if lyrics {
                let extraction = scraper
                    .get_track_with_lyrics(&reference)
                    .await
                    .with_context(|| format!("Failed to extract {}", reference))?;
                for warning in &extraction.warnings {
                    eprintln!("{} {}", "warning:".yellow(), warning);
                }
                print_json(&extraction.entity)?;
            } else {
                let track = scraper
                    .get_track(&reference)
                    .await
                    .with_context(|| format!("Failed to extract {}", reference))?;
                print_json(&track)?;
            }
        }
        Commands::Album { reference } => {
            let scraper = SpotifyScraper::new(config).context("Failed to initialize scraper")?;
            let album = scraper
                .get_album(&reference)
                .await
                .with_context(|| format!("Failed to extract {}", reference))?;
            print_json(&album)?;
        }
        Commands::Artist { reference } => {
            let scraper = SpotifyScraper::new(config).context("Failed to initialize scraper")?;
            let artist = scraper
                .get_artist(&reference)
                .await
                .with_context(|| format!("Failed to extract {}", reference))?;
            print_json(&artist)?;
        }
        Commands::Playlist { reference } => {
            let scraper = SpotifyScraper::new(config).context("Failed to initialize scraper")?;
            let playlist = scraper
                .get_playlist(&reference)
                .await
                .with_context(|| format!("Failed to extract {}", reference))?;
            print_json(&playlist)?;
        }
        Commands::Download {
            reference,
            cover,
            output,
            quality,
            overwrite,
        } => {
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            if let Some(quality) = quality {
                config.quality = quality;
            }
            if let Some(overwrite) = overwrite {
                config.overwrite = overwrite;
            }
            download(config, &reference, cover).await?;
        }
        Commands::Bulk {
            references,
            out,
            concurrency,
        } => {
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            bulk(config, &references, out).await?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

async fn download(config: Config, reference: &str, cover: bool) -> Result<()> {
    let kind = classify(reference)
        .with_context(|| format!("Not a Spotify reference: {}", reference))?
        .kind;
    let scraper = SpotifyScraper::new(config).context("Failed to initialize scraper")?;

    let downloaded = if kind == ContentKind::Track && !cover {
        let track = scraper.get_track(reference).await?;
        scraper.download_preview(&track, true).await?
    } else if kind == ContentKind::Track {
        let track = scraper.get_track(reference).await?;
        scraper.download_cover(&Entity::Track(track)).await?
    } else if cover {
        let entity = scraper.get_entity(reference).await?;
        scraper.download_cover(&entity).await?
    } else {
        bail!("Only tracks have previews; pass --cover to download the {} cover", kind);
    };

    println!(
        "{} {} ({:?})",
        "Saved".green(),
        downloaded.path.display(),
        downloaded.action
    );
    Ok(())
}

async fn bulk(config: Config, references: &[String], out: Option<PathBuf>) -> Result<()> {
    let urls = expand_references(references)?;
    if urls.is_empty() {
        bail!("No references to process");
    }

    eprintln!("{}", "Spotify Scraper".cyan().bold());
    eprintln!("{}", "=".repeat(50));
    eprintln!("Processing {} references", urls.len());

    let scraper = SpotifyScraper::new(config).context("Failed to initialize scraper")?;
    let processor = scraper.bulk_processor().with_progress();

    let cancel = processor.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Interrupted, cancelling remaining items...".yellow());
            cancel.cancel();
        }
    });

    let report = scraper.scrape_bulk(&processor, urls).await;

    write_report(&report, out.as_deref(), &mut std::io::stdout().lock())?;
    print_summary(&report);
    Ok(())
}

/// The JSON report goes to `out`, or alone to `stdout` so it can be piped.
fn write_report(report: &BulkReport, out: Option<&Path>, stdout: &mut impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => writeln!(stdout, "{}", json).context("Failed to write report")?,
    }
    Ok(())
}

/// Inline references, or `@path` for a file with one reference per line.
/// Blank lines and `#` comments are ignored.
fn expand_references(references: &[String]) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    for reference in references {
        match reference.strip_prefix('@') {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path))?;
                urls.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty() && !line.starts_with('#'))
                        .map(String::from),
                );
            }
            None => urls.push(reference.clone()),
        }
    }
    Ok(urls)
}

/// Human-readable summary on stderr, keeping stdout for the JSON report.
fn print_summary(report: &BulkReport) {
    eprintln!();
    eprintln!("{}", "=".repeat(60));
    eprintln!("{}", "BULK SUMMARY".bold());
    eprintln!("{}", "=".repeat(60));
    eprintln!("Total references processed: {}", report.total());
    eprintln!("Succeeded: {}", report.succeeded().to_string().green());
    eprintln!("Failed: {}", report.failed().to_string().red());

    let rate = format!("{:.1}%", report.success_rate());
    let rate = if report.success_rate() >= 90.0 {
        rate.green()
    } else if report.success_rate() >= 70.0 {
        rate.yellow()
    } else {
        rate.red()
    };
    eprintln!("Success rate: {}", rate);
    if report.cancelled {
        eprintln!("{}", "Batch was cancelled before completion".yellow());
    }
    eprintln!("{}", "=".repeat(60));

    let failures: Vec<_> = report.results.iter().filter(|r| !r.success).collect();
    if !failures.is_empty() {
        eprintln!("\n{}", "Failed references:".yellow());
        for entry in failures {
            eprintln!(
                "  - {}: {}",
                entry.url,
                entry.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotify_scraper::BulkEntry;
    use spotify_scraper::error::ScrapeError;

    fn report() -> BulkReport {
        BulkReport {
            results: vec![
                BulkEntry::succeeded(
                    "spotify:track:abc".to_string(),
                    serde_json::json!({"name": "Song"}),
                ),
                BulkEntry::failed("spotify:track:def".to_string(), &ScrapeError::Cancelled),
            ],
            cancelled: true,
        }
    }

    #[test]
    fn test_stdout_report_is_pure_json() {
        let mut stdout = Vec::new();
        write_report(&report(), None, &mut stdout).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&stdout).unwrap();
        assert_eq!(parsed["results"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["cancelled"], true);
    }

    #[test]
    fn test_report_file_leaves_stdout_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut stdout = Vec::new();
        write_report(&report(), Some(&path), &mut stdout).unwrap();

        assert!(stdout.is_empty());
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["results"][0]["url"], "spotify:track:abc");
    }

    #[test]
    fn test_reference_file_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("refs.txt");
        std::fs::write(&list, "# favourites\nspotify:track:abc\n\n  spotify:album:def  \n").unwrap();

        let urls = expand_references(&[
            "spotify:artist:ghi".to_string(),
            format!("@{}", list.display()),
        ])
        .unwrap();
        assert_eq!(urls, vec!["spotify:artist:ghi", "spotify:track:abc", "spotify:album:def"]);
    }
}
