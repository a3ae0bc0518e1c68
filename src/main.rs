//! Decoy Vault - CLI
//!
//! Command-line front end for the vault core, standing in for the
//! calculator UI on desktop.

use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use decoy_vault::{AuthState, VaultCore, VaultError, VaultResult};

#[derive(Parser)]
#[command(name = "decoy-vault")]
#[command(version = decoy_vault::VERSION)]
#[command(about = "Decoy-calculator file vault - encrypted store behind a PIN")]
struct Cli {
    /// Vault storage root
    #[arg(short, long, default_value = "./vault")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// First-time setup: choose the main PIN
    Setup {
        /// 4-digit PIN
        pin: String,
    },

    /// Configure the decoy vault PIN
    SetFakePin {
        /// 4-digit PIN for the decoy vault
        pin: String,
    },

    /// Create a custom vault with its own PIN
    AddVault {
        /// Display name
        name: String,
        /// 4-digit PIN for the new vault
        new_pin: String,
    },

    /// Import a file into whichever vault the PIN unlocks
    Import {
        /// Source file
        path: PathBuf,
        /// PIN
        #[arg(short, long)]
        pin: String,
    },

    /// List files of the unlocked vault
    List {
        #[arg(short, long)]
        pin: String,
    },

    /// Export a file by id
    Export {
        id: i64,
        output: PathBuf,
        #[arg(short, long)]
        pin: String,
    },

    /// Delete a file by id
    Delete {
        id: i64,
        #[arg(short, long)]
        pin: String,
    },

    /// Show storage statistics for the unlocked vault
    Stats {
        #[arg(short, long)]
        pin: String,
    },

    /// Wipe the unlocked vault's storage and records
    Wipe {
        #[arg(short, long)]
        pin: String,
    },

    /// Show break-in records (main vault only)
    Logs {
        #[arg(short, long)]
        pin: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Feed the PIN through the session digit by digit, as the calculator
/// surface would
fn unlock(core: &VaultCore, pin: &str) -> VaultResult<String> {
    let mut state = core.session.state();
    for c in pin.chars() {
        let digit = c
            .to_digit(10)
            .ok_or_else(|| VaultError::FormatCorruption(format!("not a digit: {}", c)))?;
        state = core.session.push_digit(digit as u8)?;
    }

    match state {
        AuthState::Authenticated { vault_id } => Ok(vault_id),
        _ => Err(VaultError::WrongPin),
    }
}

fn guess_mime(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
        .as_str()
    {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn run(cli: Cli) -> VaultResult<()> {
    let core = VaultCore::open(&cli.root)?;

    match cli.command {
        Commands::Setup { pin } => {
            core.credentials.set_pin(&pin)?;
            core.credentials.set_first_setup_complete(true)?;
            println!("🔐 Vault initialized at {}", cli.root.display());
        }

        Commands::SetFakePin { pin } => {
            core.credentials.set_fake_pin(&pin)?;
            core.credentials.set_fake_vault_enabled(true)?;
            println!("🎭 Decoy vault enabled");
        }

        Commands::AddVault { name, new_pin } => {
            let id = core.credentials.add_custom_vault(&name, &new_pin)?;
            println!("✅ Custom vault '{}' created ({})", name, id);
        }

        Commands::Import { path, pin } => {
            let vault_id = unlock(&core, &pin)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".into());

            let mut source = File::open(&path)?;
            let record =
                core.files
                    .import_file(&mut source, &vault_id, &name, guess_mime(&path))?;
            core.records.add_file(record.clone())?;

            println!(
                "✅ Imported {} ({}, {})",
                record.original_name,
                record.file_type.display_name(),
                record.formatted_size()
            );
            println!("   id: {}", record.id);
        }

        Commands::List { pin } => {
            let vault_id = unlock(&core, &pin)?;
            let files = core.records.files(&vault_id);

            if files.is_empty() {
                println!("(empty vault)");
            }
            for f in files {
                println!(
                    "{:>16}  {:<10} {:>10}  {}",
                    f.id,
                    f.file_type.display_name(),
                    f.formatted_size(),
                    f.original_name
                );
            }
        }

        Commands::Export { id, output, pin } => {
            let vault_id = unlock(&core, &pin)?;
            let record = core
                .records
                .files(&vault_id)
                .into_iter()
                .find(|f| f.id == id)
                .ok_or_else(|| VaultError::FileNotFound(id.to_string()))?;

            let written = core.files.export_to_path(&record, &output)?;
            println!("✅ Exported {} bytes to {}", written, output.display());
        }

        Commands::Delete { id, pin } => {
            let vault_id = unlock(&core, &pin)?;
            let record = core
                .records
                .files(&vault_id)
                .into_iter()
                .find(|f| f.id == id)
                .ok_or_else(|| VaultError::FileNotFound(id.to_string()))?;

            core.files.delete_file(&record);
            core.records.remove_file(&record)?;
            println!("🗑️  Deleted {}", record.original_name);
        }

        Commands::Stats { pin } => {
            let vault_id = unlock(&core, &pin)?;
            println!("Vault:          {}", vault_id);
            println!("Files:          {}", core.records.file_count(&vault_id));
            println!(
                "Content bytes:  {}",
                core.records.total_size(&vault_id)
            );
            println!(
                "On-disk bytes:  {}",
                core.files.vault_size_bytes(&vault_id)?
            );
            println!(
                "Settings store: {}",
                if core.credentials.is_encrypted() {
                    "encrypted"
                } else {
                    "plaintext fallback"
                }
            );
        }

        Commands::Wipe { pin } => {
            let vault_id = unlock(&core, &pin)?;
            core.files.wipe_vault(&vault_id)?;
            core.records.clear_files(&vault_id)?;
            println!("🧹 Vault '{}' wiped", vault_id);
        }

        Commands::Logs { pin } => {
            let vault_id = unlock(&core, &pin)?;
            if vault_id != decoy_vault::MAIN_VAULT {
                // Decoy sessions must not reveal that logs exist
                println!("(empty)");
                return Ok(());
            }

            let logs = core.records.intruder_logs();
            if logs.is_empty() {
                println!("No break-in attempts recorded");
            }
            for log in logs {
                println!(
                    "{}  attempts={}  photo={}",
                    log.timestamp,
                    log.attempt_count,
                    log.photo_path.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}
