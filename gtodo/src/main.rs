use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use gtodo::config::Config;
use gtodo::controller::ListController;
use gtodo::mediator::SyncMediator;
use gtodo::remote::gitee::GiteeClient;
use gtodo::storage::{self, Storage};
use gtodo::types::{SortDirection, TodoShow, TodoState};

#[derive(Parser)]
#[command(name = "gtodo")]
#[command(about = "gtodo - Task lists backed by a Git hosting issue tracker, cached for offline use", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cache database path (default: .gtodo/cache.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Repository holding the task list, as owner/repo
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Access token for the remote API
    #[arg(long, global = true, env = "GTODO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Only tasks carrying this label (repeatable)
    #[arg(long = "label", global = true)]
    labels: Vec<String>,

    /// Only tasks in this state (open|progressing|closed|rejected)
    #[arg(long, global = true)]
    state: Option<String>,

    /// Sort direction on update time (asc|desc)
    #[arg(long, global = true)]
    direction: Option<SortDirection>,

    /// Creation date range filter, passed to the remote as given
    #[arg(long, global = true)]
    created_at: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the first page again and replace the cache
    Refresh,

    /// Fetch the next page after the cached ones
    More,

    /// List cached tasks without touching the network
    List {
        /// Limit number of results
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show a cached task by its issue number
    Show {
        /// Issue number
        number: String,
    },

    /// Drop every cached task and page key
    Clear,
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    if let Some(repo) = &cli.repo {
        config.query.repo_path = repo.clone();
    }
    if let Some(token) = &cli.token {
        config.remote.access_token = Some(token.clone());
    }
    if !cli.labels.is_empty() {
        config.query.labels = cli.labels.clone();
    }
    if let Some(state) = &cli.state {
        let parsed = TodoState::parse(&state.to_ascii_lowercase())
            .filter(|s| *s != TodoState::Unknown)
            .with_context(|| format!("invalid state filter: {}", state))?;
        config.query.state = Some(parsed);
    }
    if let Some(direction) = cli.direction {
        config.query.direction = direction;
    }
    if let Some(created_at) = &cli.created_at {
        config.query.created_at = Some(created_at.clone());
    }
    Ok(())
}

fn colored_state(state: TodoState) -> colored::ColoredString {
    match state {
        TodoState::Open => state.as_str().green(),
        TodoState::Progressing => state.as_str().yellow(),
        TodoState::Closed => state.as_str().blue(),
        TodoState::Rejected => state.as_str().red(),
        TodoState::Unknown => state.as_str().dimmed(),
    }
}

fn print_todos(todos: &[TodoShow], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(todos)?);
        return Ok(());
    }

    let mut header: Option<&str> = None;
    for todo in todos {
        if header != Some(todo.header_title.as_str()) {
            println!("{}", todo.header_title.bold());
            header = Some(todo.header_title.as_str());
        }
        let labels: Vec<&str> = todo.labels.iter().map(|l| l.name.as_str()).collect();
        println!(
            "  {:<10} [{}] {}{}",
            todo.number,
            colored_state(todo.state),
            todo.title,
            if labels.is_empty() {
                String::new()
            } else {
                format!(" ({})", labels.join(", ")).dimmed().to_string()
            }
        );
    }
    Ok(())
}

fn print_todo(todo: &TodoShow, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(todo)?);
        return Ok(());
    }

    println!("{} {}", todo.number.bold(), todo.title);
    println!("  state:   {}", colored_state(todo.state));
    println!("  created: {}", todo.created_at);
    println!("  updated: {}", todo.updated_at);
    for label in &todo.labels {
        println!("  label:   {} #{}", label.name, label.color);
    }
    Ok(())
}

fn build_controller(config: &Config, storage: Arc<dyn Storage>) -> Result<ListController> {
    let remote = GiteeClient::new(&config.remote.base_url, config.timeout())
        .context("Failed to create remote client")?;
    let mediator = SyncMediator::new(Arc::new(remote), storage.clone(), config.query_params());
    Ok(ListController::attach(
        mediator,
        storage,
        config.paging.page_size,
        config.paging.initial_load_size,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load();
    apply_overrides(&mut config, &cli)?;

    let storage: Arc<dyn Storage> = Arc::new(
        storage::Config::sqlite(config.database.path.clone())
            .open()
            .context("Failed to open cache")?,
    );
    log::debug!("using cache at {}", storage.path());

    match &cli.command {
        Commands::Refresh => {
            let mut controller = build_controller(&config, storage)?;
            let end = controller.refresh().await?;
            let todos = controller.snapshot(config.paging.initial_load_size as usize)?;
            print_todos(&todos, cli.json)?;
            if !end && !cli.json {
                println!("{}", "more available: gtodo more".dimmed());
            }
            Ok(())
        }
        Commands::More => {
            let mut controller = build_controller(&config, storage.clone())?;
            // A pending refresh replaces the cache instead of extending it.
            let before = if controller.refresh_pending() {
                0
            } else {
                storage.count_todos()?
            };
            let end = controller.append().await?;
            let after = storage.count_todos()?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "fetched": after.saturating_sub(before), "end": end })
                );
            } else if before == 0 && after > 0 {
                println!("Cached {} tasks for the current query.", after);
            } else if end && after == before {
                println!("No more tasks.");
            } else {
                println!("Cached {} more tasks ({} total).", after.saturating_sub(before), after);
            }
            Ok(())
        }
        Commands::List { limit } => {
            let mut controller = build_controller(&config, storage)?;
            if controller.refresh_pending() {
                if cli.json {
                    println!("[]");
                } else {
                    println!("Cached tasks belong to a different query. Run `gtodo refresh` first.");
                }
                return Ok(());
            }
            let todos = controller.snapshot(*limit)?;
            if todos.is_empty() && !cli.json {
                println!("No cached tasks. Run `gtodo refresh` first.");
                return Ok(());
            }
            print_todos(&todos, cli.json)
        }
        Commands::Show { number } => match storage.find_todo_by_number(number)? {
            Some(todo) => print_todo(&todo, cli.json),
            None => anyhow::bail!("task {} is not cached", number),
        },
        Commands::Clear => {
            storage.clear_all()?;
            println!("Cache cleared.");
            Ok(())
        }
    }
}
