use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use eyre::Result;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use todostore::snapshot;
use todostore::{
    Config, Filter, Language, NewTask, Priority, StatusFilter, Store, SubtaskDraft, Task, TaskEdit,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "TodoStore CLI - todo list with tags, subtasks and due dates")]
#[command(version)]
struct Cli {
    /// Path to the store directory (overrides the config file)
    #[arg(short, long, global = true)]
    store_path: Option<PathBuf>,

    /// Config file (default: <config dir>/todostore/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        text: String,

        #[arg(short, long, default_value = "normal")]
        priority: Priority,

        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<NaiveDate>,

        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(short = 'u', long = "subtask")]
        subtasks: Vec<String>,
    },

    /// List tasks in display order
    List {
        #[arg(long, default_value = "all")]
        status: StatusFilter,

        /// Case-insensitive text search
        #[arg(short = 'q', long)]
        search: Option<String>,

        /// Only tasks carrying all of these tags
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Toggle a task, or one of its subtasks
    Toggle {
        id: u64,

        #[arg(long)]
        subtask: Option<u64>,
    },

    /// Edit a task; unspecified fields keep their current value
    Edit {
        id: u64,

        #[arg(long)]
        text: Option<String>,

        #[arg(short, long)]
        priority: Option<Priority>,

        #[arg(short, long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,

        #[arg(long)]
        clear_due: bool,

        /// Replace all tags (no values clears them)
        #[arg(long, num_args = 0..)]
        tags: Option<Vec<String>>,

        /// Replace all subtasks with new, incomplete ones
        #[arg(long, num_args = 0..)]
        subtasks: Option<Vec<String>>,
    },

    /// Delete a task
    Delete {
        id: u64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove all completed tasks
    ClearCompleted,

    /// Manage subtasks
    Subtask {
        #[command(subcommand)]
        action: SubtaskCommand,
    },

    /// Show completion and due-date statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// List every tag in use
    Tags,

    /// Show or change settings
    Settings {
        #[arg(long)]
        dark_mode: Option<bool>,

        #[arg(long)]
        language: Option<Language>,
    },
}

#[derive(Subcommand)]
enum SubtaskCommand {
    /// Append a subtask
    Add { task: u64, text: String },

    /// Remove a subtask
    Rm { task: u64, subtask: u64 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.store_path {
        config.data_dir = Some(path);
    }

    // Open store
    let mut store = Store::open(config.open_storage()?)?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Add {
            text,
            priority,
            due,
            tags,
            subtasks,
        } => {
            let new = NewTask {
                text,
                priority,
                due_date: due,
                tags,
                subtasks,
            };
            match store.add(new) {
                Some(id) => println!("Added task {}", id),
                None => notice("Task text is empty, nothing added"),
            }
        }
        Commands::List {
            status,
            search,
            tags,
            json,
        } => {
            let filter = tags
                .iter()
                .fold(Filter::new().with_status(status).with_search(search.unwrap_or_default()), |f, tag| {
                    f.with_tag(tag)
                });
            let visible = store.view(&filter);

            if json {
                println!("{}", serde_json::to_string_pretty(&visible)?);
            } else {
                let counts = store.counts();
                println!(
                    "{} all ({})  active ({})  completed ({})",
                    format!("[{}]", filter.status).bold(),
                    counts.total,
                    counts.active,
                    counts.completed
                );
                if visible.is_empty() {
                    println!("{}", "No tasks".dimmed());
                }
                for task in visible {
                    print_task(task, today);
                }
            }
        }
        Commands::Toggle { id, subtask } => {
            if store.toggle(id, subtask) {
                if let Some(task) = store.get(id) {
                    print_task(task, today);
                }
            } else {
                notice(&missing(id, subtask));
            }
        }
        Commands::Edit {
            id,
            text,
            priority,
            due,
            clear_due,
            tags,
            subtasks,
        } => {
            let Some(task) = store.get(id) else {
                notice(&missing(id, None));
                return Ok(());
            };

            let mut edit = TaskEdit::from_task(task);
            if let Some(text) = text {
                edit.text = text;
            }
            if priority.is_some() {
                edit.priority = priority;
            }
            if clear_due {
                edit.due_date = None;
            } else if due.is_some() {
                edit.due_date = due;
            }
            if let Some(tags) = tags {
                edit.tags = tags;
            }
            if let Some(subtasks) = subtasks {
                edit.subtasks = subtasks.into_iter().map(SubtaskDraft::new).collect();
            }

            if store.edit(id, edit) {
                if let Some(task) = store.get(id) {
                    print_task(task, today);
                }
            } else {
                notice("Task text is empty, edit rejected");
            }
        }
        Commands::Delete { id, yes } => {
            let Some(task) = store.get(id) else {
                notice(&missing(id, None));
                return Ok(());
            };

            if !yes && !confirm(&format!("Delete task {} \"{}\"?", id, task.text))? {
                println!("Cancelled");
                return Ok(());
            }
            store.delete(id);
            println!("Deleted task {}", id);
        }
        Commands::ClearCompleted => {
            let removed = store.clear_completed();
            println!("Removed {} completed task(s)", removed);
        }
        Commands::Subtask { action } => match action {
            SubtaskCommand::Add { task, text } => match store.add_subtask(task, &text) {
                Some(id) => println!("Added subtask {} to task {}", id, task),
                None => notice("Unknown task or empty subtask text, nothing added"),
            },
            SubtaskCommand::Rm { task, subtask } => {
                if store.delete_subtask(task, subtask) {
                    println!("Removed subtask {} from task {}", subtask, task);
                } else {
                    notice(&missing(task, Some(subtask)));
                }
            }
        },
        Commands::Stats { json } => {
            let stats = todostore::Stats::compute_with_window(store.tasks(), today, config.upcoming_days);

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                let dist = stats.priority_distribution;
                println!("Completion rate:  {}%", stats.completion_rate.to_string().blue().bold());
                println!(
                    "Priorities:       {} high, {} normal, {} low",
                    dist.high.to_string().red(),
                    dist.normal.to_string().blue(),
                    dist.low.to_string().green()
                );
                let overdue = stats.overdue_count.to_string();
                println!(
                    "Overdue:          {}",
                    if stats.overdue_count > 0 { overdue.red() } else { overdue.green() }
                );
                println!(
                    "Upcoming ({} d):   {}",
                    config.upcoming_days,
                    stats.upcoming_count.to_string().yellow()
                );
            }
        }
        Commands::Tags => {
            for tag in store.all_tags() {
                println!("#{}", tag);
            }
        }
        Commands::Settings { dark_mode, language } => {
            let storage = store.storage_mut();
            let mut settings = snapshot::load_settings(&*storage)?;
            let changed = dark_mode.is_some() || language.is_some();

            if let Some(dark_mode) = dark_mode {
                settings.dark_mode = dark_mode;
            }
            if let Some(language) = language {
                settings.language = language;
            }
            if changed {
                snapshot::save_settings(storage, &settings)?;
            }

            println!("dark_mode: {}", settings.dark_mode);
            println!("language:  {}", settings.language);
        }
    }

    Ok(())
}

fn print_task(task: &Task, today: NaiveDate) {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let text = if task.completed {
        task.text.dimmed().strikethrough()
    } else {
        task.text.normal()
    };

    let mut line = format!("{} {} {} {}", check, task.id.to_string().dimmed(), priority_label(task.priority), text);
    if let Some(due) = task.due_date {
        let label = format!("due {}", due);
        let label = if !task.completed && due < today {
            label.red()
        } else {
            label.yellow()
        };
        line.push_str(&format!("  {}", label));
    }
    for tag in &task.tags {
        line.push_str(&format!(" {}", format!("#{}", tag).cyan()));
    }
    println!("{}", line);

    for subtask in &task.subtasks {
        let check = if subtask.completed { "[x]" } else { "[ ]" };
        println!("      {} {} {}", check, subtask.id.to_string().dimmed(), subtask.text);
    }
}

fn priority_label(priority: Priority) -> ColoredString {
    match priority {
        Priority::High => "high  ".red(),
        Priority::Normal => "normal".blue(),
        Priority::Low => "low   ".green(),
    }
}

fn missing(task: u64, subtask: Option<u64>) -> String {
    match subtask {
        Some(subtask) => format!("No subtask {} on task {}", subtask, task),
        None => format!("No task with id {}", task),
    }
}

fn notice(message: &str) {
    eprintln!("{}", message.yellow());
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
