use clap::{Parser, Subcommand};
use stanza::model::NodeKind;
use stanza::{BuildOptions, config, publish, scan};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stanza")]
#[command(version)]
#[command(about = "Static site generator for articles and article series")]
#[command(long_about = "\
Static site generator for articles and article series

Your filesystem is the data source. Markdown files under articles/ become
pages, directories become series, and a ----delimited header block on each
file carries the metadata.

Content structure:

  site/
  ├── site.toml                    # Site config (optional)
  ├── templates/                   # {{name}} template overrides (optional)
  ├── images/  video/  files/      # Static trees, copied into the artifact
  └── articles/
      ├── index.md                 # Front cover (optional)
      ├── about.md                 # Standalone article
      ├── _archive/                # Underscore = grouping only, no series
      │   └── old_post.md
      └── raven_facts/             # Directory = series
          ├── index.md             # Series cover
          ├── one.md
          └── two.md

Header block:

  ---
  title: Why ravens
  tags: birds, corvids
  published: 2024-03-01 09:30
  ---

Missing uuid/published/updated fields are generated from the file and
written back into the header after a successful build.")]
struct Cli {
    /// Site source directory
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: scan → publish → render → commit
    Build {
        /// Output directory, replaced on success
        #[arg(long, default_value = "dist")]
        destination: PathBuf,
        /// Include drafts and future-dated articles; never touch sources
        #[arg(long)]
        preview: bool,
        /// Render worker count (default: one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Keep the staging directory for inspection
        #[arg(long)]
        keep_staging: bool,
    },
    /// Scan the content tree and print what was found
    Scan,
    /// Validate content and configuration without building
    Check,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            destination,
            preview,
            jobs,
            keep_staging,
        } => {
            println!("==> Building {}", cli.source.display());
            let summary = stanza::build(&BuildOptions {
                source: cli.source,
                destination: destination.clone(),
                preview,
                jobs,
                keep_staging,
            })?;
            println!("==> {summary}");
            println!("==> Artifact: {}", destination.display());
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }
        Command::Scan => {
            let graph = scan::scan(&cli.source)?;
            print_graph(&graph);
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let config = config::load_config(&cli.source)?;
            let graph = scan::scan(&cli.source)?;
            let publication =
                publish::aggregate(graph, &config, chrono::Utc::now(), false);
            println!(
                "    {} front-page entries, {} series, {} tags, {} info pages",
                publication.front.len(),
                publication.series.len(),
                publication.tags.len(),
                publication.infos.len()
            );
            println!("==> Content is valid");
        }
    }
    Ok(())
}

fn print_graph(graph: &stanza::model::ContentGraph) {
    println!(
        "{} articles, {} series",
        graph.articles.len(),
        graph.series.len()
    );
    for article in &graph.articles {
        if article.series.is_some() {
            continue;
        }
        let marker = match article.meta.kind {
            NodeKind::Index => " (cover)",
            NodeKind::Info => " (info)",
            NodeKind::Article => "",
        };
        let draft = if article.meta.is_published {
            ""
        } else {
            " [draft]"
        };
        println!("  {}{marker}{draft}", article.meta.title);
    }
    for series in &graph.series {
        println!("  {}/", series.meta.title);
        for id in &series.articles {
            let member = graph.article(*id);
            let draft = if member.meta.is_published {
                ""
            } else {
                " [draft]"
            };
            println!("    {}{draft}", member.meta.title);
        }
    }
}
