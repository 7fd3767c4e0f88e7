use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rand::Rng;
use ranking::{EntryDraft, EntryId, InMemoryStore, ListId, RankedEntry, RankedList, MAX_RANK};
use server::TopMoviesService;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Top Movies - ranked movie lists from the command line
#[derive(Parser)]
#[command(name = "top-movies")]
#[command(about = "Build and reorder ranked Top Movies lists", long_about = None)]
struct Cli {
    /// Snapshot file holding all lists
    #[arg(short, long, default_value = "top-movies.json")]
    snapshot: PathBuf,

    /// How long to wait for a busy list, in milliseconds
    #[arg(long, default_value = "2000")]
    lock_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

/// Movie metadata, as returned by a movie database lookup
#[derive(Args, Clone)]
struct MovieArgs {
    /// The Movie Database id
    #[arg(long)]
    tmdb_id: String,

    #[arg(long)]
    title: String,

    /// Release date as YYYY-MM-DD
    #[arg(long)]
    release_date: String,

    /// Poster URL
    #[arg(long)]
    poster_path: Option<String>,
}

impl From<MovieArgs> for EntryDraft {
    fn from(args: MovieArgs) -> Self {
        EntryDraft {
            tmdb_id: Some(args.tmdb_id),
            title: Some(args.title),
            release_date: Some(args.release_date),
            poster_path: args.poster_path,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new list with its first movie
    New {
        #[command(flatten)]
        movie: MovieArgs,

        /// Title for the new list
        #[arg(long)]
        list_title: Option<String>,
    },

    /// Add a movie to the end of a list
    Add {
        #[arg(long)]
        list_id: ListId,

        #[command(flatten)]
        movie: MovieArgs,
    },

    /// Show a list in rank order
    Show {
        #[arg(long)]
        list_id: ListId,
    },

    /// Show every list
    Lists,

    /// Move an entry to a rank (clamped into the list)
    Move {
        #[arg(long)]
        entry_id: EntryId,

        #[arg(long, allow_negative_numbers = true)]
        rank: i64,
    },

    /// Move an entry one place up
    Up {
        #[arg(long)]
        entry_id: EntryId,
    },

    /// Move an entry one place down
    Down {
        #[arg(long)]
        entry_id: EntryId,
    },

    /// Remove an entry and close the gap
    Remove {
        #[arg(long)]
        entry_id: EntryId,
    },

    /// Delete an entry without renumbering the rest
    Delete {
        #[arg(long)]
        entry_id: EntryId,
    },

    /// Renumber a list to 1..N after plain deletes
    Repair {
        #[arg(long)]
        list_id: ListId,
    },

    /// Set or clear a list's title
    Rename {
        #[arg(long)]
        list_id: ListId,

        /// New title; omit to clear it
        #[arg(long)]
        title: Option<String>,
    },

    /// Delete a list and all of its entries
    Drop {
        #[arg(long)]
        list_id: ListId,
    },

    /// Run concurrent moves against a scratch list to test throughput
    Benchmark {
        /// Number of moves to make
        #[arg(long, default_value = "1000")]
        requests: usize,

        /// Number of concurrent writers
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let lock_timeout = Duration::from_millis(cli.lock_timeout_ms);

    let store = Arc::new(
        InMemoryStore::load_from_file(&cli.snapshot)
            .with_context(|| format!("Failed to load snapshot {}", cli.snapshot.display()))?,
    );
    let service = TopMoviesService::new(store.clone(), lock_timeout);

    // Dispatch to appropriate command handler
    let changed = match cli.command {
        Commands::Benchmark {
            requests,
            concurrent,
        } => return handle_benchmark(requests, concurrent, lock_timeout).await,
        Commands::New { movie, list_title } => {
            let (list, entry) = service.create_list(movie.into(), list_title).await?;
            println!("{} Created list {}", "✓".green(), list.id);
            print_entry(&entry);
            true
        }
        Commands::Add { list_id, movie } => {
            let entry = service.append(list_id, movie.into()).await?;
            println!("{} Added to list {}", "✓".green(), list_id);
            print_entry(&entry);
            true
        }
        Commands::Show { list_id } => {
            print_list(&service.get_list(list_id).await?);
            false
        }
        Commands::Lists => {
            handle_lists(&service).await?;
            false
        }
        Commands::Move { entry_id, rank } => {
            print_entry(&service.move_entry(entry_id, rank).await?);
            true
        }
        Commands::Up { entry_id } => {
            print_entry(&service.move_up(entry_id).await?);
            true
        }
        Commands::Down { entry_id } => {
            print_entry(&service.move_down(entry_id).await?);
            true
        }
        Commands::Remove { entry_id } => {
            let removed = service.remove(entry_id).await?;
            println!("{} Removed '{}' (was #{})", "✓".green(), removed.title, removed.rank);
            true
        }
        Commands::Delete { entry_id } => {
            let removed = service.delete_entry(entry_id).await?;
            println!(
                "{} Deleted '{}', ranks left as they were",
                "✓".yellow(),
                removed.title
            );
            true
        }
        Commands::Repair { list_id } => {
            print_list(&service.compact_list(list_id).await?);
            true
        }
        Commands::Rename { list_id, title } => {
            print_list(&service.rename_list(list_id, title).await?);
            true
        }
        Commands::Drop { list_id } => {
            service.delete_list(list_id).await?;
            println!("{} Dropped list {}", "✓".green(), list_id);
            true
        }
    };

    if changed {
        store
            .save_to_file(&cli.snapshot)
            .with_context(|| format!("Failed to save snapshot {}", cli.snapshot.display()))?;
        debug!(path = %cli.snapshot.display(), "Saved snapshot");
    }
    Ok(())
}

/// Handle the 'lists' command
async fn handle_lists(service: &TopMoviesService) -> Result<()> {
    let ids = service.list_ids().await?;
    if ids.is_empty() {
        println!("No lists yet. Start one with 'top-movies new'.");
        return Ok(());
    }
    for id in ids {
        let list = service.get_list(id).await?;
        println!(
            "{} {} ({} movies)",
            format!("#{}", list.id).bold().blue(),
            list.title.as_deref().unwrap_or("Untitled"),
            list.count()
        );
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(requests: usize, concurrent: usize, lock_timeout: Duration) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        return Err(anyhow!("requests and concurrent must both be positive"));
    }

    // Scratch store: the benchmark never touches the snapshot
    let service = TopMoviesService::new(Arc::new(InMemoryStore::new()), lock_timeout);
    let seed = |n: u32| EntryDraft {
        tmdb_id: Some(n.to_string()),
        title: Some(format!("Movie {}", n)),
        release_date: Some("2000-01-01".to_string()),
        poster_path: None,
    };
    let (list, first) = service.create_list(seed(1), Some("Benchmark".into())).await?;
    let mut entry_ids = vec![first.id];
    for n in 2..=MAX_RANK {
        entry_ids.push(service.append(list.id, seed(n)).await?.id);
    }

    // Random (entry, target) pairs, generated up front
    let mut rng = rand::rng();
    let moves: Vec<(EntryId, i64)> = (0..requests)
        .map(|_| {
            let entry = entry_ids[rng.random_range(0..entry_ids.len())];
            (entry, rng.random_range(1..=i64::from(MAX_RANK)))
        })
        .collect();

    let wall = Instant::now();
    let chunk_size = requests.div_ceil(concurrent);
    let mut handles = vec![];
    for chunk in moves.chunks(chunk_size) {
        let service = service.clone();
        let chunk = chunk.to_vec();
        handles.push(tokio::spawn(async move {
            let mut timings = Vec::with_capacity(chunk.len());
            for (entry_id, rank) in chunk {
                let start = Instant::now();
                service.move_entry(entry_id, rank).await?;
                timings.push(start.elapsed());
            }
            Ok::<_, anyhow::Error>(timings)
        }));
    }

    let mut timings = vec![];
    for handle in handles {
        timings.extend(handle.await??);
    }
    let wall_time = wall.elapsed();

    let final_list = service.get_list(list.id).await?;
    if !final_list.is_contiguous() {
        return Err(anyhow!("ranks are no longer contiguous: {:?}", final_list.ranks()));
    }

    let total_time: Duration = timings.iter().sum();
    let avg_latency = total_time / (timings.len() as u32);
    timings.sort();
    let percentile = |p: f32| timings[((timings.len() as f32 * p) as usize).min(timings.len() - 1)];
    let throughput = requests as f32 / wall_time.as_secs_f32();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Moves: {} across {} writers", requests, concurrent);
    println!("Wall time: {:?}", wall_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} moves/second", throughput);
    println!("{} Ranks still contiguous", "✓".green());

    Ok(())
}

/// Print one entry on a single line
fn print_entry(entry: &RankedEntry) {
    println!(
        "{}. {} ({}) [entry {}, tmdb {}]",
        entry.rank.to_string().green(),
        entry.title,
        entry.release_date.format("%Y"),
        entry.id,
        entry.tmdb_id
    );
}

/// Print a list header followed by its entries in rank order
fn print_list(list: &RankedList) {
    print!(
        "{}",
        format!(
            "List #{}: {}\n",
            list.id,
            list.title.as_deref().unwrap_or("Untitled")
        )
        .bold()
        .blue()
    );
    if list.is_empty() {
        println!("  (empty)");
    }
    for entry in list.entries() {
        print_entry(entry);
    }
    if !list.is_contiguous() {
        println!(
            "{} Ranks have gaps; run 'top-movies repair --list-id {}'",
            "!".yellow(),
            list.id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(snapshot: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec!["top-movies", "--snapshot", snapshot.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    const TITANIC: [&str; 6] = [
        "--tmdb-id",
        "597",
        "--title",
        "Titanic",
        "--release-date",
        "1997-11-18",
    ];

    #[tokio::test]
    async fn test_commands_persist_to_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.json");

        let mut new = vec!["new"];
        new.extend_from_slice(&TITANIC);
        run(cli(&path, &new)).await.unwrap();

        let mut add = vec!["add", "--list-id", "1"];
        add.extend_from_slice(&TITANIC);
        run(cli(&path, &add)).await.unwrap();
        run(cli(&path, &["move", "--entry-id", "2", "--rank", "-4"])).await.unwrap();

        let store = InMemoryStore::load_from_file(&path).unwrap();
        let list = &store.snapshot().lists[0];
        let order: Vec<EntryId> = list.entries().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![2, 1]);

        run(cli(&path, &["remove", "--entry-id", "2"])).await.unwrap();
        let store = InMemoryStore::load_from_file(&path).unwrap();
        assert_eq!(store.counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_unknown_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.json");
        assert!(run(cli(&path, &["up", "--entry-id", "9"])).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_benchmark_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unused.json");
        run(cli(&path, &["benchmark", "--requests", "50", "--concurrent", "4"]))
            .await
            .unwrap();
        assert!(!path.exists());
    }
}
