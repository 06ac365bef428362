use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use feeddeck::columns::refresh_columns;
use feeddeck::config::Config;
use feeddeck::content::extract;
use feeddeck::feed::fetch_feed;
use feeddeck::http::build_client;
use feeddeck::news::fetch_news;
use feeddeck::trending::{fetch_trending, Since};

/// Get the config directory path (~/.config/feeddeck/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feeddeck"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feeddeck",
    version,
    about = "Fetch feeds, news searches and GitHub trending as normalized articles"
)]
struct Args {
    /// Config file (defaults to ~/.config/feeddeck/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one RSS/RDF/Atom feed
    Feed {
        url: String,
        /// Source name stamped on every article
        #[arg(long)]
        source: Option<String>,
    },
    /// Search the news aggregator for keywords
    News { keywords: String },
    /// Scrape GitHub trending repositories
    Trending {
        #[arg(long)]
        language: Option<String>,
        #[arg(long, value_enum, default_value_t = Since::Daily)]
        since: Since,
    },
    /// Extract an article page as Markdown
    Extract {
        url: String,
        /// Title to use instead of the page's own
        #[arg(long)]
        title: Option<String>,
        /// Write the Markdown here instead of stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Refresh every column in the config file
    Columns,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let client = build_client().context("Failed to build HTTP client")?;

    match args.command {
        Command::Feed { url, source } => {
            let source = source.unwrap_or_else(|| {
                url::Url::parse(&url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_else(|| "RSS".to_string())
            });
            let articles = fetch_feed(&client, &config.feed_settings(), &url, &source).await;
            print_json(&articles)?;
        }
        Command::News { keywords } => {
            let articles = fetch_news(
                &client,
                &config.feed_settings(),
                &config.news_settings(),
                &keywords,
                &keywords,
            )
            .await;
            print_json(&articles)?;
        }
        Command::Trending { language, since } => {
            let repos =
                fetch_trending(&client, &config.trending_settings(), language.as_deref(), since)
                    .await;
            let articles: Vec<feeddeck::Article> = repos.into_iter().map(Into::into).collect();
            print_json(&articles)?;
        }
        Command::Extract { url, title, output } => {
            match extract(&client, &config.extract_settings(), &url, title.as_deref()).await {
                Ok(doc) => match output {
                    Some(path) => {
                        std::fs::write(&path, &doc.markdown)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        eprintln!("Saved \"{}\" to {}", doc.title, path.display());
                    }
                    None => println!("{}", doc.markdown),
                },
                Err(e) => {
                    eprintln!("Error ({}): {}", e.status(), e);
                    std::process::exit(1);
                }
            }
        }
        Command::Columns => {
            if config.columns.is_empty() {
                eprintln!("No columns configured in {}", config_path.display());
                eprintln!();
                eprintln!("Add one, for example:");
                eprintln!("  [[columns]]");
                eprintln!("  kind = \"rss\"");
                eprintln!("  url = \"https://zenn.dev/feed\"");
                std::process::exit(1);
            }
            let results =
                refresh_columns(&client, &config.source_settings(), &config.columns).await;
            print_json(&results)?;
        }
    }

    Ok(())
}
