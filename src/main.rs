//! SecureVault - CLI
//!
//! Command-line front end over a single vault file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::EnvFilter;

use securevault::{
    estimate_strength, generate_password, Entry, EntryData, PasswordPolicy, Session, VaultConfig,
    VaultError,
};

#[derive(Parser)]
#[command(name = "securevault")]
#[command(version = securevault::VERSION)]
#[command(about = "SecureVault - local encrypted password vault")]
struct Cli {
    /// Vault file
    #[arg(short, long, env = "SECUREVAULT_PATH", global = true)]
    vault: Option<PathBuf>,

    /// Config file (defaults to <config dir>/securevault/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Master password. Prompted for when unset.
    #[arg(long, env = "SECUREVAULT_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty vault
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Add an entry
    Add {
        title: String,

        #[command(flatten)]
        fields: FieldArgs,

        /// Generate the entry password instead of prompting for it
        #[arg(short, long)]
        generate: bool,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// List entries
    List {
        /// Only entries in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Search title, username, url and notes
    Search { query: String },

    /// Show one entry
    Show {
        id: usize,

        /// Print the password
        #[arg(short, long)]
        reveal: bool,
    },

    /// Edit an entry; only the given fields change
    Edit {
        id: usize,

        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        fields: FieldArgs,

        /// Prompt for a new entry password
        #[arg(long, conflicts_with = "generate")]
        new_password: bool,

        /// Replace the entry password with a generated one
        #[arg(short, long)]
        generate: bool,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Delete an entry
    Delete {
        id: usize,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List categories
    Categories,

    /// Add a category
    AddCategory { name: String },

    /// Generate random passwords
    Generate {
        #[command(flatten)]
        policy: PolicyArgs,

        /// How many to print
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Estimate password strength
    Strength {
        /// Password to rate. Prompted for when omitted.
        password: Option<String>,
    },

    /// Change the master password
    Passwd,
}

#[derive(Args)]
struct FieldArgs {
    #[arg(short, long)]
    username: Option<String>,

    #[arg(long)]
    url: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct PolicyArgs {
    /// Generated password length
    #[arg(short, long, default_value_t = 16)]
    length: usize,

    #[arg(long)]
    no_upper: bool,

    #[arg(long)]
    no_lower: bool,

    #[arg(long)]
    no_digits: bool,

    #[arg(long)]
    no_symbols: bool,
}

impl From<&PolicyArgs> for PasswordPolicy {
    fn from(args: &PolicyArgs) -> Self {
        Self {
            length: args.length,
            upper: !args.no_upper,
            lower: !args.no_lower,
            digits: !args.no_digits,
            symbols: !args.no_symbols,
        }
    }
}

struct App {
    vault: PathBuf,
    config: VaultConfig,
    password: Option<String>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        if let Some(vault_err) = e.downcast_ref::<VaultError>() {
            if vault_err.is_untrusted_source() {
                eprintln!("   Check the master password, or restore the vault from a backup.");
            } else if vault_err.is_transient() {
                eprintln!("   Nothing was changed; it is safe to retry.");
            }
        }
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = VaultConfig::load_or_default(cli.config.as_deref()).context("loading config")?;
    let app = App {
        vault: cli.vault.unwrap_or_else(default_vault_path),
        config,
        password: cli.password,
    };

    match cli.command {
        Commands::Init { force } => {
            if app.vault.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", app.vault.display());
            }
            let password = app.new_master_password()?;
            let mut session = with_spinner("Deriving key...", || {
                Session::create(&password, app.config.clone())
            })?;
            session.save(Some(&app.vault))?;
            println!("{} Vault created at: {}", style("✔").green(), app.vault.display());
        }

        Commands::Add {
            title,
            fields,
            generate,
            policy,
        } => {
            let mut session = app.open()?;
            let mut data = EntryData::new(title);
            fields.apply(&mut data);
            check_entry(&data, session.categories()?, None)?;

            data.password = if generate {
                let generated = generate_password(&(&policy).into());
                println!("Generated password: {}", style(&generated).yellow());
                generated
            } else {
                rpassword::prompt_password("Entry password: ")?
            };
            let id = session.add_entry(data)?;
            session.save(None)?;
            println!("{} Added entry {}", style("✔").green(), id);
        }

        Commands::List { category } => {
            let session = app.open()?;
            let entries = match &category {
                Some(c) => session.entries_by_category(c)?,
                None => session.entries()?.iter().collect(),
            };
            print_table(&entries);
        }

        Commands::Search { query } => {
            let session = app.open()?;
            print_table(&session.search(&query)?);
        }

        Commands::Show { id, reveal } => {
            let session = app.open()?;
            let entry = session.get_entry(id)?;
            println!("{}", style(&entry.title).bold());
            println!("{:-<40}", "");
            println!("Username:  {}", entry.username);
            if reveal {
                println!("Password:  {}", entry.password);
            } else {
                println!("Password:  {}", style("******** (use --reveal)").dim());
            }
            println!("URL:       {}", entry.url);
            println!("Category:  {}", entry.category);
            println!("Notes:     {}", entry.notes);
            println!("Created:   {}", entry.created.format("%Y-%m-%d %H:%M"));
            println!("Modified:  {}", entry.modified.format("%Y-%m-%d %H:%M"));
        }

        Commands::Edit {
            id,
            title,
            fields,
            new_password,
            generate,
            policy,
        } => {
            let mut session = app.open()?;
            let mut data = session.get_entry(id)?.data();
            let previous_category = data.category.clone();
            if let Some(title) = title {
                data.title = title;
            }
            fields.apply(&mut data);
            check_entry(&data, session.categories()?, Some(&previous_category))?;
            if generate {
                data.password = generate_password(&(&policy).into());
                println!("Generated password: {}", style(&data.password).yellow());
            } else if new_password {
                data.password = rpassword::prompt_password("New entry password: ")?;
            }
            session.update_entry(id, data)?;
            session.save(None)?;
            println!("{} Updated entry {}", style("✔").green(), id);
        }

        Commands::Delete { id, yes } => {
            let mut session = app.open()?;
            let title = session.get_entry(id)?.title.clone();
            if !yes && !confirm(&format!("Delete '{}'?", title))? {
                println!("Cancelled");
                return Ok(());
            }
            session.delete_entry(id)?;
            session.save(None)?;
            println!("{} Deleted '{}'", style("✔").green(), title);
        }

        Commands::Categories => {
            let session = app.open()?;
            for category in session.categories()? {
                let count = session.entries_by_category(category)?.len();
                println!("{:<20} {}", category, style(count).dim());
            }
        }

        Commands::AddCategory { name } => {
            let mut session = app.open()?;
            if session.categories()?.contains(&name) {
                println!("{} Category '{}' already exists", style("!").yellow(), name);
                return Ok(());
            }
            session.add_category(name.as_str())?;
            session.save(None)?;
            println!("{} Added category '{}'", style("✔").green(), name);
        }

        Commands::Generate { policy, count } => {
            let policy = PasswordPolicy::from(&policy);
            for _ in 0..count {
                println!("{}", generate_password(&policy));
            }
        }

        Commands::Strength { password } => {
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password("Password to rate: ")?,
            };
            let report = estimate_strength(&password);
            let label = match report.score {
                0 | 1 => style(report.label()).red(),
                2 => style(report.label()).yellow(),
                _ => style(report.label()).green(),
            };
            println!("Strength: {} ({}/4)", label.bold(), report.score);
            for hint in &report.feedback {
                println!("  - {}", hint);
            }
        }

        Commands::Passwd => {
            let (mut session, current) = app.open_with_password()?;
            let new = prompt_confirmed("New master password: ")?;
            with_spinner("Re-deriving key...", || {
                session.change_master_password(&current, &new)
            })?;
            session.save(None)?;
            println!("{} Master password changed", style("✔").green());
        }
    }

    Ok(())
}

impl FieldArgs {
    fn apply(self, data: &mut EntryData) {
        if let Some(v) = self.username {
            data.username = v;
        }
        if let Some(v) = self.url {
            data.url = v;
        }
        if let Some(v) = self.category {
            data.category = v;
        }
        if let Some(v) = self.notes {
            data.notes = v;
        }
    }
}

impl App {
    fn master_password(&self, prompt: &str) -> anyhow::Result<SecretString> {
        match &self.password {
            Some(p) => Ok(SecretString::from(p.clone())),
            None => Ok(SecretString::from(rpassword::prompt_password(prompt)?)),
        }
    }

    fn new_master_password(&self) -> anyhow::Result<SecretString> {
        let password = match &self.password {
            Some(p) => SecretString::from(p.clone()),
            None => prompt_confirmed("New master password: ")?,
        };
        self.config
            .validate_master_password(password.expose_secret())?;
        Ok(password)
    }

    fn open(&self) -> anyhow::Result<Session> {
        Ok(self.open_with_password()?.0)
    }

    /// Also hands back the master password that unlocked the vault
    fn open_with_password(&self) -> anyhow::Result<(Session, SecretString)> {
        let password = self.master_password("Master password: ")?;
        let session = with_spinner("Unlocking...", || {
            Session::open(&self.vault, &password, self.config.clone())
        })
        .with_context(|| format!("cannot open {}", self.vault.display()))?;
        Ok((session, password))
    }
}

/// Title must be non-blank; category must be one of the vault's, or the
/// entry's current one when editing.
fn check_entry(data: &EntryData, categories: &[String], current_category: Option<&str>) -> anyhow::Result<()> {
    if data.title.trim().is_empty() {
        bail!("title cannot be empty");
    }
    let known = categories.iter().any(|c| *c == data.category);
    if !known && current_category != Some(data.category.as_str()) {
        bail!(
            "unknown category '{}' (add it with `add-category` first)",
            data.category
        );
    }
    Ok(())
}

fn prompt_confirmed(prompt: &str) -> anyhow::Result<SecretString> {
    let first = SecretString::from(rpassword::prompt_password(prompt)?);
    let second = SecretString::from(rpassword::prompt_password("Repeat: ")?);
    if first.expose_secret() != second.expose_secret() {
        bail!("passwords do not match");
    }
    Ok(first)
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let term = console::Term::stdout();
    term.write_str(&format!("{} [y/N] ", question))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn with_spinner<T>(message: &str, f: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    let out = f();
    spinner.finish_and_clear();
    out
}

fn print_table(entries: &[&Entry]) {
    if entries.is_empty() {
        println!("No entries");
        return;
    }
    println!(
        "{}",
        style(format!("{:>4}  {:<24} {:<24} {:<14}", "ID", "TITLE", "USERNAME", "CATEGORY")).bold()
    );
    for e in entries {
        println!(
            "{:>4}  {:<24} {:<24} {:<14}",
            e.id,
            truncate(&e.title, 24),
            truncate(&e.username, 24),
            truncate(&e.category, 14)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

/// `<data dir>/securevault/vault.svdb`, or `vault.svdb` in the working directory
fn default_vault_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("securevault").join("vault.svdb"))
        .unwrap_or_else(|| Path::new("vault.svdb").to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<String> {
        vec!["General".into(), "Email".into()]
    }

    #[test]
    fn test_check_entry_accepts_known_category() {
        let data = EntryData {
            category: "Email".into(),
            ..EntryData::new("Mail")
        };
        assert!(check_entry(&data, &categories(), None).is_ok());
        assert!(check_entry(&EntryData::new("Mail"), &categories(), None).is_ok());
    }

    #[test]
    fn test_check_entry_rejects_blank_title() {
        assert!(check_entry(&EntryData::new(""), &categories(), None).is_err());
        assert!(check_entry(&EntryData::new("  \t"), &categories(), None).is_err());
    }

    #[test]
    fn test_check_entry_rejects_unknown_category() {
        let data = EntryData {
            category: "Nonexistent".into(),
            ..EntryData::new("Mail")
        };
        assert!(check_entry(&data, &categories(), None).is_err());
        assert!(check_entry(&data, &categories(), Some("Email")).is_err());
    }

    #[test]
    fn test_check_entry_keeps_current_category_on_edit() {
        let data = EntryData {
            category: "Legacy".into(),
            ..EntryData::new("Old")
        };
        assert!(check_entry(&data, &categories(), Some("Legacy")).is_ok());
    }

    #[test]
    fn test_passwd_reuses_unlocking_password() {
        let dir = tempfile::tempdir().unwrap();
        let vault = dir.path().join("v.svdb");
        let master = SecretString::from("correct horse battery staple".to_string());
        let mut created = Session::create(&master, VaultConfig::fast_for_tests()).unwrap();
        created.save(Some(&vault)).unwrap();

        let app = App {
            vault,
            config: VaultConfig::fast_for_tests(),
            password: Some("correct horse battery staple".into()),
        };
        let (mut session, current) = app.open_with_password().unwrap();
        assert_eq!(current.expose_secret(), master.expose_secret());

        let new = SecretString::from("another long secret".to_string());
        session.change_master_password(&current, &new).unwrap();
        assert!(session.is_dirty());
    }

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from(["securevault", "add", "Mail", "--category", "Email", "-g"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Add { ref title, generate: true, .. } if title == "Mail"
        ));
    }
}
