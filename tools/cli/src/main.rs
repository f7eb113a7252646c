//! Twinkey CLI - Command line interface for the credential vault.
//!
//! Every command that touches the vault prompts for both the master and the
//! data passphrase. Keys are dropped as soon as the command finishes.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use twinkey_common::{ErrorKind, Passphrase};
use twinkey_crypto::{PasswordGenerator, StrengthRating};
use twinkey_storage::{LocalProvider, StorageProvider};
use twinkey_vault::{
    strength, Field, FieldValue, KeySession, Record, RecordFields, RecordManager, StrengthLevel,
    VaultOptions, VaultStore,
};

#[derive(Parser)]
#[command(name = "twinkey")]
#[command(about = "Twinkey - Two-passphrase encrypted credential vault")]
#[command(version)]
struct Cli {
    /// Vault file (default: <data dir>/twinkey/passwords.vault).
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Failed unlock attempts allowed before giving up.
    #[arg(long, global = true, default_value_t = 5)]
    max_attempts: u32,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault.
    Init {
        /// Description stored in the vault header.
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Check whether a pair of passphrases opens the vault.
    Check,

    /// List all records.
    List,

    /// Show a single record.
    Show {
        /// Record identifier.
        id: String,

        /// Print the password instead of masking it.
        #[arg(short, long)]
        reveal: bool,
    },

    /// Add a record.
    Add(AddArgs),

    /// Edit a record. Options not given keep their current value.
    Edit(EditArgs),

    /// Remove a record.
    Remove {
        /// Record identifier.
        id: String,

        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// Search service, username and comment, ignoring case.
    Search {
        /// Text to look for.
        query: String,
    },

    /// Show vault information.
    Info,

    /// Generate a random password. Does not open the vault.
    Generate(GenerateArgs),

    /// Score a password. Does not open the vault.
    Strength,
}

#[derive(Args)]
struct AddArgs {
    /// Service or site name.
    #[arg(short, long)]
    service: String,

    /// Account name.
    #[arg(short, long)]
    username: String,

    /// Free-text note.
    #[arg(short, long)]
    comment: Option<String>,

    /// Generate a password of this length instead of prompting for one.
    #[arg(short, long, value_name = "LENGTH")]
    generate: Option<usize>,
}

#[derive(Args)]
struct EditArgs {
    /// Record identifier.
    id: String,

    #[arg(short, long)]
    service: Option<String>,

    #[arg(short, long)]
    username: Option<String>,

    #[arg(short, long)]
    comment: Option<String>,

    /// Remove the comment.
    #[arg(long, conflicts_with = "comment")]
    clear_comment: bool,

    /// Prompt for a new password.
    #[arg(short, long)]
    password: bool,
}

#[derive(Args)]
struct GenerateArgs {
    /// Number of characters.
    #[arg(short, long, default_value_t = 16)]
    length: usize,

    #[arg(long)]
    no_lowercase: bool,

    #[arg(long)]
    no_uppercase: bool,

    #[arg(long)]
    no_digits: bool,

    #[arg(long)]
    no_special: bool,

    /// Leave out look-alike characters such as `l`, `1` and `O`.
    #[arg(long)]
    exclude_similar: bool,

    /// Leave out quotes and backslashes.
    #[arg(long)]
    exclude_ambiguous: bool,

    /// Generate a memorable passphrase of this many words instead.
    #[arg(short, long)]
    words: Option<usize>,
}

/// Where the vault lives and how unlocking behaves.
struct Target {
    vault: Option<PathBuf>,
    max_attempts: u32,
}

impl Target {
    fn provider(&self) -> Result<Arc<dyn StorageProvider>> {
        let path = match &self.vault {
            Some(path) => path.clone(),
            None => default_vault_path()?,
        };
        let provider: Arc<dyn StorageProvider> = Arc::new(LocalProvider::new(path));
        Ok(provider)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let target = Target {
        vault: cli.vault,
        max_attempts: cli.max_attempts,
    };

    match cli.command {
        Commands::Init { description } => cmd_init(&target, description),
        Commands::Check => cmd_check(&target),
        Commands::List => with_manager(&target, cmd_list),
        Commands::Show { id, reveal } => with_manager(&target, |m| cmd_show(m, &id, reveal)),
        Commands::Add(args) => with_manager(&target, |m| cmd_add(m, args)),
        Commands::Edit(args) => with_manager(&target, |m| cmd_edit(m, args)),
        Commands::Remove { id, yes } => with_manager(&target, |m| cmd_remove(m, &id, yes)),
        Commands::Search { query } => with_manager(&target, |m| cmd_search(m, &query)),
        Commands::Info => with_manager(&target, cmd_info),
        Commands::Generate(args) => cmd_generate(&args),
        Commands::Strength => cmd_strength(),
    }
}

fn default_vault_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Cannot determine the data directory; pass --vault")?;
    Ok(data_dir.join("twinkey").join("passwords.vault"))
}

/// Prompt for a passphrase without echo.
fn prompt_passphrase(prompt: &str) -> Result<Passphrase> {
    let passphrase = rpassword::prompt_password(prompt).context("Failed to read passphrase")?;
    Ok(Passphrase::from(passphrase))
}

/// Prompt twice for a new passphrase.
fn prompt_new_passphrase(label: &str) -> Result<Passphrase> {
    let passphrase = prompt_passphrase(&format!("New {} passphrase: ", label))?;
    if passphrase.is_empty() {
        bail!("The {} passphrase cannot be empty", label);
    }
    let confirm = prompt_passphrase(&format!("Confirm {} passphrase: ", label))?;
    if passphrase != confirm {
        bail!("The {} passphrases do not match", label);
    }
    Ok(passphrase)
}

/// Prompt twice for a record password.
fn prompt_record_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let confirm =
        rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn ensure_exists(provider: &Arc<dyn StorageProvider>) -> Result<()> {
    if !provider.exists()? {
        bail!(
            "No vault at {}; run `twinkey init` first",
            provider.location()
        );
    }
    Ok(())
}

/// Prompt for passphrases until the vault opens or attempts run out.
fn unlock(provider: &Arc<dyn StorageProvider>, max_attempts: u32) -> Result<KeySession> {
    let mut session = KeySession::new();

    for attempt in 1..=max_attempts.max(1) {
        let master = prompt_passphrase("Master passphrase: ")?;
        let data = prompt_passphrase("Data passphrase: ")?;
        if let Err(e) = session.set_keys(master, data) {
            eprintln!("{}", e);
            continue;
        }

        let opened = VaultStore::new(&session, provider.clone()).load();
        match opened {
            Ok(()) => {
                info!(attempt, "Vault unlocked");
                return Ok(session);
            }
            Err(e) if e.kind() == ErrorKind::Decryption => {
                session.clear_keys();
                warn!(attempt, max_attempts, "Unlock rejected");
                eprintln!("Incorrect keys ({}/{})", attempt, max_attempts);
            }
            Err(e) => return Err(e.into()),
        }
    }

    bail!("Too many failed attempts")
}

/// Unlock the vault, run `f` against it, then clear the keys.
fn with_manager<F>(target: &Target, f: F) -> Result<()>
where
    F: FnOnce(&mut RecordManager<'_>) -> Result<()>,
{
    let provider = target.provider()?;
    ensure_exists(&provider)?;

    let mut session = unlock(&provider, target.max_attempts)?;
    let result = {
        let mut manager = RecordManager::new(VaultStore::new(&session, provider));
        f(&mut manager)
    };
    session.clear_keys();
    result
}

/// Create a new vault.
fn cmd_init(target: &Target, description: Option<String>) -> Result<()> {
    let provider = target.provider()?;
    if provider.exists()? {
        bail!("A vault already exists at {}", provider.location());
    }
    info!(location = %provider.location(), "Creating new vault");

    let master = prompt_new_passphrase("master")?;
    let data = prompt_new_passphrase("data")?;
    if master == data {
        eprintln!("Warning: master and data passphrases are identical");
    }

    let mut session = KeySession::new();
    session.set_keys(master, data)?;

    let mut options = VaultOptions::default();
    if let Some(description) = description {
        options.description = description;
    }

    {
        let mut store = VaultStore::with_options(&session, provider, options);
        store.initialize().context("Failed to create vault")?;
        println!("Vault created successfully!");
        println!("  Location: {}", store.location());
    }
    session.clear_keys();

    Ok(())
}

/// Verify passphrases without the retry loop.
fn cmd_check(target: &Target) -> Result<()> {
    let provider = target.provider()?;
    ensure_exists(&provider)?;

    let mut session = KeySession::new();
    session.set_keys(
        prompt_passphrase("Master passphrase: ")?,
        prompt_passphrase("Data passphrase: ")?,
    )?;

    let records = {
        let mut store = VaultStore::new(&session, provider);
        if store.test_keys() && session.test_encryption() {
            Some(store.get_all()?)
        } else {
            None
        }
    };
    session.clear_keys();

    let Some(records) = records else {
        bail!("Incorrect keys");
    };

    println!("Master passphrase accepted.");
    let unreadable = records.iter().filter(|r| r.has_undecryptable()).count();
    if unreadable > 0 {
        println!(
            "Data passphrase does not decrypt {} of {} record(s).",
            unreadable,
            records.len()
        );
    } else {
        println!("All {} record(s) decrypt.", records.len());
    }

    Ok(())
}

fn cmd_list(manager: &mut RecordManager<'_>) -> Result<()> {
    let records = manager.get_all()?;
    print_records(&records);
    Ok(())
}

fn cmd_show(manager: &mut RecordManager<'_>, id: &str, reveal: bool) -> Result<()> {
    let record = manager.get_by_id(id)?;

    let password = match record.get(Field::Password) {
        Some(FieldValue::Decrypted(_)) if !reveal => "********".to_string(),
        other => cell(other),
    };

    println!("ID:       {}", record.id);
    println!("Service:  {}", cell(record.get(Field::Service)));
    println!("Username: {}", cell(record.get(Field::Username)));
    println!("Password: {}", password);
    println!("Comment:  {}", cell(record.get(Field::Comment)));
    println!("Created:  {}", local_time(&record.created_at));
    println!("Updated:  {}", local_time(&record.updated_at));

    if record.has_undecryptable() {
        eprintln!("Some fields could not be decrypted; check the data passphrase.");
    }
    Ok(())
}

fn cmd_add(manager: &mut RecordManager<'_>, args: AddArgs) -> Result<()> {
    let password = match args.generate {
        Some(length) => {
            let generator = PasswordGenerator::new().with_length(length);
            let password = generator.generate()?;
            println!("Generated a {}-character password.", generator.length());
            password
        }
        None => prompt_record_password()?,
    };
    warn_if_weak(manager, &password);

    let fields = RecordFields {
        service: Some(args.service),
        username: Some(args.username),
        password: Some(password),
        comment: args.comment,
    };
    let id = manager.add(&fields)?;

    println!("Record added: {}", id);
    Ok(())
}

fn cmd_edit(manager: &mut RecordManager<'_>, args: EditArgs) -> Result<()> {
    let record = manager.get_by_id(&args.id)?;
    if record.has_undecryptable() {
        bail!(
            "Record {} has fields that cannot be decrypted; refusing to overwrite them",
            record.id
        );
    }

    let mut fields = record.fields();
    if let Some(service) = args.service {
        fields.service = Some(service);
    }
    if let Some(username) = args.username {
        fields.username = Some(username);
    }
    if args.clear_comment {
        fields.comment = None;
    } else if let Some(comment) = args.comment {
        fields.comment = Some(comment);
    }
    if args.password {
        let password = prompt_record_password()?;
        warn_if_weak(manager, &password);
        fields.password = Some(password);
    }

    manager.update(&args.id, &fields)?;
    println!("Record updated: {}", record.id);
    Ok(())
}

fn cmd_remove(manager: &mut RecordManager<'_>, id: &str, yes: bool) -> Result<()> {
    let record = manager.get_by_id(id)?;
    let label = format!(
        "{} / {}",
        cell(record.get(Field::Service)),
        cell(record.get(Field::Username))
    );

    if !yes && !confirm(&format!("Remove {}?", label))? {
        println!("Aborted.");
        return Ok(());
    }

    manager.delete(id)?;
    println!("Record removed: {}", label);
    Ok(())
}

fn cmd_search(manager: &mut RecordManager<'_>, query: &str) -> Result<()> {
    let records = manager.search(query)?;
    print_records(&records);
    Ok(())
}

fn cmd_info(manager: &mut RecordManager<'_>) -> Result<()> {
    let summary = manager.vault_info()?;
    let metadata = &summary.metadata;

    println!("Vault Information:");
    println!("  Location: {}", summary.location);
    println!("  Version: {}", metadata.version);
    println!("  Description: {}", metadata.description);
    println!("  Created: {}", local_time(&metadata.created_at));
    println!("  Modified: {}", local_time(&metadata.updated_at));
    println!("  Records: {}", summary.record_count);

    Ok(())
}

fn cmd_generate(args: &GenerateArgs) -> Result<()> {
    if let Some(words) = args.words {
        let passphrase = PasswordGenerator::generate_memorable(words);
        let bits = PasswordGenerator::password_entropy(&passphrase);
        println!("{}", passphrase);
        eprintln!(
            "Estimated entropy: {:.0} bits ({})",
            bits,
            StrengthRating::from_entropy(bits)
        );
        return Ok(());
    }

    let mut generator = PasswordGenerator::new().with_length(args.length);
    generator.use_lowercase = !args.no_lowercase;
    generator.use_uppercase = !args.no_uppercase;
    generator.use_digits = !args.no_digits;
    generator.use_special = !args.no_special;
    generator.exclude_similar = args.exclude_similar;
    generator.exclude_ambiguous = args.exclude_ambiguous;

    let password = generator
        .generate()
        .context("Failed to generate password")?;
    println!("{}", password);
    eprintln!(
        "Estimated entropy: {:.0} bits ({})",
        generator.entropy(),
        generator.strength()
    );

    Ok(())
}

fn cmd_strength() -> Result<()> {
    let password =
        rpassword::prompt_password("Password to score: ").context("Failed to read password")?;
    let result = strength::evaluate(&password);

    println!("Score: {}/100 ({})", result.score, result.level);
    for hint in &result.feedback {
        println!("  - {}", hint);
    }
    Ok(())
}

fn warn_if_weak(manager: &RecordManager<'_>, password: &str) {
    let result = manager.check_password_strength(password);
    if result.level < StrengthLevel::Moderate {
        let hints: Vec<String> = result.feedback.iter().map(ToString::to_string).collect();
        eprintln!(
            "Warning: {} password ({}/100): {}",
            result.level,
            result.score,
            hints.join(", ")
        );
    }
}

fn print_records(records: &[Record]) {
    if records.is_empty() {
        println!("No records.");
        return;
    }

    println!("{:<36}  {:<24}  {:<24}", "ID", "SERVICE", "USERNAME");
    for record in records {
        println!(
            "{:<36}  {:<24}  {:<24}",
            record.id.as_str(),
            cell(record.get(Field::Service)),
            cell(record.get(Field::Username))
        );
    }
    println!("\n{} record(s)", records.len());
}

fn cell(value: Option<&FieldValue>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

fn local_time(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
