//! Command-line shell

use crate::actions::{self, App, OverrideEdit};
use anyhow::{bail, Result};
use brewlabel_common::config::StartMode;
use brewlabel_common::db::{self, Batch, BatchSummary, EffectiveBatch, OverrideFields};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for brewlabel
#[derive(Parser, Debug)]
#[command(name = "brewlabel")]
#[command(about = "Fetch Brewfather batches, annotate them and print bottle labels")]
#[command(version)]
pub struct Cli {
    /// Root folder holding the database, .env file and templates
    #[arg(short, long, global = true, env = "BREWLABEL_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List recent batches from Brewfather
    List {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
        /// Cache the listed batches locally
        #[arg(long)]
        save: bool,
    },
    /// Fetch one batch from Brewfather (merged with any stored override)
    Show {
        id: String,
        /// Cache the batch and its bottling event locally
        #[arg(long)]
        save: bool,
    },
    /// List cached batches, optionally filtered by brew date
    Stored {
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
        /// First brew date (dd/mm/YYYY)
        #[arg(long)]
        from: Option<String>,
        /// Last brew date (dd/mm/YYYY)
        #[arg(long)]
        to: Option<String>,
    },
    /// Override label fields of a cached batch (an empty value clears a field)
    Override(OverrideArgs),
    /// Show the override history of a batch
    History { id: String },
    /// List batches with overrides, most recently edited first
    Overridden {
        #[arg(short, long, default_value_t = 100)]
        limit: i64,
    },
    /// Manage free-form label tags
    #[command(subcommand)]
    Tag(TagCommand),
    /// Render label pages for a cached batch
    Render {
        id: String,
        /// Number of labels to print
        #[arg(short = 'n', long)]
        count: usize,
        /// Template (.docx); defaults to the saved template
        #[arg(short, long)]
        template: Option<PathBuf>,
        /// Remember the template as the default
        #[arg(long)]
        save_default: bool,
    },
    /// Show or set the default label template
    Template {
        #[arg(long)]
        set: Option<PathBuf>,
    },
    /// Persist the start mode
    Mode { mode: ModeArg },
}

impl Command {
    /// Commands that talk to Brewfather and need credentials
    pub fn needs_remote(&self) -> bool {
        matches!(self, Command::List { .. } | Command::Show { .. })
    }
}

#[derive(Args, Debug)]
pub struct OverrideArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Brew date (dd/mm/YYYY)
    #[arg(long)]
    pub brew_date: Option<String>,
    #[arg(long)]
    pub abv: Option<String>,
    #[arg(long)]
    pub ibu: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub observation: Option<String>,
    /// Discard the current override before applying these values
    #[arg(long)]
    pub reset: bool,
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    /// Set (or overwrite) a tag
    Set { id: String, key: String, value: String },
    /// Remove a tag
    Rm { id: String, key: String },
    /// List tags of a batch
    List { id: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Ask,
    Cli,
    Gui,
}

impl From<ModeArg> for StartMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Ask => StartMode::Ask,
            ModeArg::Cli => StartMode::Cli,
            ModeArg::Gui => StartMode::Gui,
        }
    }
}

/// Run one command (or print status when none is given)
pub async fn run(app: &App, command: Option<Command>) -> Result<()> {
    let Some(command) = command else {
        print_status(app).await?;
        return Ok(());
    };

    match command {
        Command::List { limit, save } => {
            let client = app.client()?;
            match actions::list_remote(app, &client, limit, save).await? {
                Some(listing) => {
                    print_summaries(&listing.batches);
                    if save {
                        println!("Saved {} batches ({} failed).", listing.saved, listing.failed);
                    }
                }
                None => println!("Brewfather is unavailable; no batches listed."),
            }
        }
        Command::Show { id, save } => {
            let client = app.client()?;
            match actions::show_remote(app, &client, &id, save).await? {
                Some(detail) => {
                    print_effective(&detail.effective);
                    if detail.current_override.is_some() {
                        println!("(stored override applied)");
                    }
                    if detail.saved {
                        println!("Saved batch {}.", detail.effective.id);
                    }
                }
                None => println!("Brewfather is unavailable; batch {} not fetched.", id),
            }
        }
        Command::Stored { limit, from, to } => {
            let start = actions::parse_date_bound(from.as_deref())?;
            let end = actions::parse_date_bound(to.as_deref())?;
            let batches = db::fetch_batches_filtered(&app.db, limit, start, end).await?;
            print_stored(&batches);
        }
        Command::Override(args) => {
            let edit = OverrideEdit {
                fields: OverrideFields {
                    name: args.name,
                    brew_date: args.brew_date,
                    measured_abv: args.abv,
                    estimated_ibu: args.ibu,
                    estimated_color: args.color,
                },
                observation: args.observation,
                reset: args.reset,
            };
            let effective = actions::write_override(app, &args.id, &edit).await?;
            println!("Override saved.");
            print_effective(&effective);
        }
        Command::History { id } => {
            let history = db::list_override_history(&app.db, &id).await?;
            if history.is_empty() {
                println!("No override history for batch {}.", id);
            }
            for entry in history {
                println!(
                    "{}  name={} brew_date={} abv={} ibu={} color={} obs={}",
                    entry.created_at,
                    show(&entry.name),
                    show(&entry.brew_date),
                    show(&entry.measured_abv),
                    show(&entry.estimated_ibu),
                    show(&entry.estimated_color),
                    show(&entry.observation),
                );
            }
        }
        Command::Overridden { limit } => {
            let batches = db::list_overridden_batches(&app.db, limit).await?;
            if batches.is_empty() {
                println!("No overridden batches.");
            }
            for batch in batches {
                println!(
                    "{:<26} #{:<6} {:<32} {}",
                    batch.id,
                    batch.batch_no.map(|n| n.to_string()).unwrap_or_default(),
                    show(&batch.name),
                    batch.last_touched
                );
            }
        }
        Command::Tag(tag) => run_tag(app, tag).await?,
        Command::Render {
            id,
            count,
            template,
            save_default,
        } => {
            let files =
                actions::render_labels(app, &id, count, template.as_deref(), save_default).await?;
            if files.is_empty() {
                println!("Nothing to render.");
            }
            for file in files {
                println!("{}", file.display());
            }
        }
        Command::Template { set } => match set {
            Some(path) => {
                if !path.is_file() {
                    bail!("Template not found: {}", path.display());
                }
                db::save_template_as_default(&app.db, &path).await?;
                println!("Default template: {}", path.display());
            }
            None => {
                let path = actions::resolve_template(app, None).await?;
                let marker = if path.is_file() { "" } else { " (missing)" };
                println!("Default template: {}{}", path.display(), marker);
            }
        },
        Command::Mode { mode } => {
            let mode = StartMode::from(mode);
            actions::set_start_mode(&app.config, mode)?;
            println!("Start mode: {}", mode);
        }
    }

    Ok(())
}

async fn run_tag(app: &App, command: TagCommand) -> Result<()> {
    match command {
        TagCommand::Set { id, key, value } => {
            db::set_tag(&app.db, &id, &key, &value).await?;
            println!("{} = {}", key.trim(), value);
        }
        TagCommand::Rm { id, key } => {
            if db::delete_tag(&app.db, &id, &key).await? {
                println!("Removed {}.", key);
            } else {
                println!("No tag {} on batch {}.", key, id);
            }
        }
        TagCommand::List { id } => {
            let tags = db::list_tags(&app.db, &id).await?;
            if tags.is_empty() {
                println!("No tags on batch {}.", id);
            }
            for tag in tags {
                println!("{} = {}", tag.key, tag.value);
            }
        }
    }
    Ok(())
}

async fn print_status(app: &App) -> Result<()> {
    let config = &app.config;
    let template = actions::resolve_template(app, None).await?;
    println!("Root folder:  {}", config.root_folder.display());
    println!("Database:     {}", config.database_path.display());
    println!("Settings:     {}", config.env_path.display());
    println!("Template:     {}", template.display());
    println!(
        "Credentials:  {}",
        if config.credentials.is_some() { "configured" } else { "missing" }
    );
    println!("Start mode:   {}", config.start_mode);
    println!();
    println!("Run `brewlabel --help` for commands.");
    Ok(())
}

fn show(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn print_summaries(batches: &[BatchSummary]) {
    if batches.is_empty() {
        println!("No batches.");
    }
    for batch in batches {
        println!(
            "{:<26} #{:<6} {:<12} {:<20} {}",
            show(&batch.id),
            batch.batch_no.map(|n| n.to_string()).unwrap_or_default(),
            show(&batch.brew_date),
            show(&batch.brewer),
            show(&batch.recipe_name)
        );
    }
}

fn print_stored(batches: &[Batch]) {
    if batches.is_empty() {
        println!("No stored batches.");
    }
    for batch in batches {
        println!(
            "{:<26} #{:<6} {:<12} {}",
            batch.id,
            batch.batch_no.map(|n| n.to_string()).unwrap_or_default(),
            show(&batch.brew_date),
            show(&batch.name)
        );
    }
}

fn print_effective(batch: &EffectiveBatch) {
    println!("Batch:        {}", batch.id);
    println!(
        "Number:       {}",
        batch.batch_no.map(|n| n.to_string()).unwrap_or_default()
    );
    println!("Brewer:       {}", show(&batch.brewer));
    println!("Name:         {}", show(&batch.name));
    println!("Brew date:    {}", show(&batch.brew_date));
    println!("ABV:          {}", show(&batch.measured_abv));
    println!("IBU:          {}", show(&batch.estimated_ibu));
    println!("Color:        {}", show(&batch.estimated_color));
    println!("Bottled:      {}", show(&batch.bottling_time));
    if let Some(observation) = &batch.observation {
        println!("Observation:  {}", observation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from(["brewlabel", "--root", "/tmp/x", "render", "abc", "-n", "14"]);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/x")));
        match cli.command {
            Some(Command::Render { id, count, template, save_default }) => {
                assert_eq!(id, "abc");
                assert_eq!(count, 14);
                assert!(template.is_none());
                assert!(!save_default);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_tag_set() {
        let cli = Cli::parse_from(["brewlabel", "tag", "set", "abc", "garrafa", "600ml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Tag(TagCommand::Set { ref key, .. })) if key == "garrafa"
        ));
    }

    #[test]
    fn test_only_fetch_commands_need_remote() {
        let list = Cli::parse_from(["brewlabel", "list", "--save"]);
        assert!(list.command.unwrap().needs_remote());
        let stored = Cli::parse_from(["brewlabel", "stored", "--from", "01/01/2024"]);
        assert!(!stored.command.unwrap().needs_remote());
    }

    #[test]
    fn test_no_command_is_status() {
        let cli = Cli::parse_from(["brewlabel"]);
        assert!(cli.command.is_none());
    }
}
