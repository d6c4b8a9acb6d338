mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fm_fs::{DirectoryLister, FileOperations, NativeCapabilities};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use ui_file_list::{
    DeleteConfirmation, DirectoryLoader, FileAction, FileListController, FileListSettings,
    FileListUpdate, ListController, OperationDone,
};

const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
const ICON_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "fm_browse")]
#[command(about = "List a directory and rename or delete its entries", long_about = None)]
struct Args {
    /// Directory to list (default: current directory)
    #[arg(short, long, env = "FM_BROWSE_DIR")]
    dir: Option<PathBuf>,

    /// Settings file (default: platform config directory)
    #[arg(long, env = "FM_BROWSE_SETTINGS")]
    settings: Option<PathBuf>,

    /// Include hidden entries
    #[arg(short, long)]
    all: bool,

    /// Treat the directory as a virtual namespace (no shortcuts)
    #[arg(long = "virtual")]
    virtual_namespace: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List entries with their permitted actions
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one entry and what can be done with it
    Info { name: String },
    /// Print the path of an entry as it would be copied
    CopyPath { name: String },
    /// Rename an entry in place
    Rename { name: String, new_name: String },
    /// Delete an entry, directories recursively
    Delete {
        name: String,
        /// Confirm the delete
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct ListingRow {
    name: String,
    directory: bool,
    symlink: bool,
    detail: u64,
    modified: Option<u64>,
    icon: Option<String>,
    actions: Vec<FileAction>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let mut settings = match args.settings.clone().or_else(FileListSettings::default_path) {
        Some(path) => FileListSettings::load(&path)?,
        None => FileListSettings::default(),
    };
    settings.show_hidden |= args.all;
    settings.virtual_namespace |= args.virtual_namespace;

    let dir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let capabilities = Arc::new(NativeCapabilities);
    let list = Arc::new(ListController::new());
    let lister = DirectoryLister::new(settings.list_options(), capabilities.clone());
    let loader = DirectoryLoader::new(list.clone(), lister, dir.clone(), false)?;
    let listed = loader.load_now()?;
    tracing::debug!("Loaded {} entries from {:?}", listed, dir);

    let controller = FileListController::new(
        list,
        loader,
        Arc::new(FileOperations::native()),
        capabilities,
        &settings,
    )?;

    match args.command.unwrap_or(Command::List { json: false }) {
        Command::List { json } => print_listing(&controller, json),
        Command::Info { name } => print_info(&controller, &name),
        Command::CopyPath { name } => {
            let index = find(&controller, &name)?;
            println!("{}", controller.copy_path(index)?);
            Ok(())
        }
        Command::Rename { name, new_name } => {
            let index = find(&controller, &name)?;
            controller.rename(index, &new_name)?;
            await_operation(&controller)
        }
        Command::Delete { name, yes } => {
            if !yes {
                bail!("Refusing to delete {name:?} without --yes");
            }
            let index = find(&controller, &name)?;
            controller.delete(index, DeleteConfirmation::confirmed_by_user())?;
            await_operation(&controller)
        }
    }
}

fn find(controller: &FileListController, name: &str) -> Result<usize> {
    controller
        .list()
        .snapshot()
        .entries()
        .iter()
        .position(|entry| entry.display_name == name)
        .with_context(|| format!("No entry named {name:?}"))
}

fn await_operation(controller: &FileListController) -> Result<()> {
    loop {
        let Some(updates) = controller.wait_for_update(OPERATION_TIMEOUT) else {
            bail!("Timed out waiting for the operation to finish");
        };

        for update in updates {
            match update {
                FileListUpdate::OperationSucceeded { done, .. } => {
                    match done {
                        OperationDone::Renamed(entry) => {
                            println!("Renamed to {}", entry.display_name)
                        }
                        OperationDone::Deleted => println!("Deleted"),
                    }
                    return Ok(());
                }
                FileListUpdate::OperationFailed { action, error, .. } => {
                    bail!("{action:?} failed: {error}");
                }
                FileListUpdate::IconReady { .. } => {}
            }
        }
    }
}

/// Resolve the icons of every row before printing, giving up after a short wait.
fn collect_icons(controller: &FileListController) -> Result<()> {
    let count = controller.count();
    let mut pending = count - controller.request_icons(0..count)?.len();
    while pending > 0 {
        let Some(updates) = controller.wait_for_update(ICON_TIMEOUT) else {
            tracing::debug!("{} icons still pending", pending);
            break;
        };
        let arrived = updates
            .iter()
            .filter(|update| matches!(update, FileListUpdate::IconReady { .. }))
            .count();
        pending = pending.saturating_sub(arrived);
    }
    Ok(())
}

fn print_listing(controller: &FileListController, json: bool) -> Result<()> {
    collect_icons(controller)?;

    let mut rows = Vec::with_capacity(controller.count());
    for index in 0..controller.count() {
        let row = controller.row(index)?;
        rows.push(ListingRow {
            name: row.title,
            directory: row.is_directory,
            symlink: row.is_symlink,
            detail: row.detail,
            modified: row
                .modified
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|age| age.as_secs()),
            icon: row.icon.map(|tag| tag.to_string()),
            actions: controller.permitted_actions(index)?.iter().collect(),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in rows {
        let name = if row.symlink { format!("{} @", row.name) } else { row.name };
        let actions: Vec<String> = row.actions.iter().map(|action| format!("{action:?}")).collect();
        println!(
            "{:<9} {:<40} {:>12}  {}",
            row.icon.as_deref().unwrap_or("-"),
            name,
            row.detail,
            actions.join(",")
        );
    }
    Ok(())
}

fn print_info(controller: &FileListController, name: &str) -> Result<()> {
    let index = find(controller, name)?;
    let entry = controller.prepare(FileAction::Properties, index)?;
    let actions: Vec<String> = controller
        .permitted_actions(index)?
        .iter()
        .map(|action| format!("{action:?}"))
        .collect();

    println!("Name:      {}", entry.display_name);
    println!("Path:      {}", entry.displayable_path());
    println!("Kind:      {:?}{}", entry.kind, if entry.is_symlink { " (symlink)" } else { "" });
    if entry.is_dir() {
        println!("Children:  {}", entry.child_count);
    } else {
        println!("Size:      {} bytes", entry.size_bytes);
    }
    match entry.capabilities {
        Some(caps) => println!("Access:    read={} write={}", caps.read, caps.write),
        None => println!("Access:    unknown"),
    }
    println!("Actions:   {}", actions.join(","));
    Ok(())
}
