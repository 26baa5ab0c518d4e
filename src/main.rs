use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dirscope::config::{AppConfig, ScanConfig, TreeConfig};
use dirscope::engine::{Engine, EngineOptions};
use dirscope::error::{Error, Result};
use dirscope::event::Event;
use dirscope::fs::aggregator::largest_files;
use dirscope::tree::format_size;

/// A headless directory-size explorer, driven from the command line.
#[derive(Parser, Debug)]
#[command(name = "dirscope", version, about)]
struct Cli {
    /// Root directory to scan (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Explicit config file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sort order for the listing: "name" or "size"
    #[arg(long)]
    sort: Option<String>,

    /// Concurrent filesystem operations per sizing run
    #[arg(long)]
    fan_out: Option<usize>,

    /// Search for file/directory names containing this substring
    #[arg(long)]
    search: Option<String>,

    /// Report the N largest files under the root instead of a listing
    #[arg(long, value_name = "N")]
    largest: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let path = cli
        .path
        .canonicalize()
        .map_err(|_| Error::InvalidRoot(format!("{} does not exist", cli.path.display())))?;

    let cli_overrides = AppConfig {
        scan: ScanConfig {
            fan_out: cli.fan_out,
            ..ScanConfig::default()
        },
        tree: TreeConfig {
            sort_by: cli.sort.clone(),
        },
    };
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli_overrides));
    let options = config.engine_options();

    if let Some(query) = cli.search {
        run_search(&path, &query, options).await
    } else if let Some(top) = cli.largest {
        run_largest(path, top, options).await
    } else {
        run_listing(&path, options).await
    }
}

/// Expand the root, wait for sizes to settle, print the sorted summary.
async fn run_listing(path: &PathBuf, options: EngineOptions) -> Result<()> {
    let mut engine = Engine::new(path, options)?;
    let root = engine.root();
    engine.expand(root);

    loop {
        match engine.next_event().await? {
            Event::SizesSettled { node } if node == root => break,
            _ => {}
        }
    }

    let tree = engine.tree();
    for &child in &tree.get(root).children {
        let node = tree.get(child);
        let marker = if node.is_dir() { "/" } else { "" };
        println!(
            "{:>10}  {}{}",
            format_size(node.size.bytes_or_zero()),
            node.name,
            marker
        );
    }
    println!(
        "{:>10}  total",
        format_size(tree.get(root).size.bytes_or_zero())
    );
    Ok(())
}

/// Stream search matches as they are found.
async fn run_search(path: &PathBuf, query: &str, options: EngineOptions) -> Result<()> {
    let mut engine = Engine::new(path, options)?;
    engine.start_search(query, vec![path.clone()]);

    loop {
        match engine.next_event().await? {
            Event::SearchMatch { path, is_dir } => {
                let marker = if is_dir { "/" } else { "" };
                println!("{}{}", path.display(), marker);
            }
            Event::SearchEnded { cancelled } => {
                if cancelled {
                    eprintln!("search cancelled");
                }
                break;
            }
            _ => {}
        }
    }
    eprintln!("{} matches", engine.matches().len());
    Ok(())
}

/// Print the top-N largest files under the root.
async fn run_largest(path: PathBuf, top: usize, options: EngineOptions) -> Result<()> {
    let policy = options.policy.clone();
    let found =
        tokio::task::spawn_blocking(move || largest_files(&path, &policy, top))
            .await
            .map_err(|_| Error::ChannelClosed)?;

    for (file, size) in found {
        println!("{:>10}  {}", format_size(size), file.display());
    }
    Ok(())
}
