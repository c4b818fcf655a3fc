// src/cli.rs
use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Track training profiles, exercise loads and weekly training days", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Print lists as CSV instead of tables
    #[arg(long, global = true)]
    pub export_csv: bool,
    /// Don't ask for confirmation before deleting
    #[arg(short, long, global = true)]
    pub yes: bool,
}

// Custom parser for date strings and shorthands
pub fn parse_date_shorthand(s: &str) -> Result<NaiveDate, String> {
    powertrack_lib::input::parse_date(s, Local::now().date_naive())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new profile and select it
    CreateProfile {
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Bodyweight at the start (kg)
        #[arg(short, long)]
        weight: String,
        /// Date training started (defaults to today)
        #[arg(short, long, value_parser = parse_date_shorthand)]
        start_date: Option<NaiveDate>,
        /// Goal bodyweight (kg)
        #[arg(short, long)]
        goal: Option<String>,
        /// Path to a profile photo
        #[arg(short, long)]
        photo: Option<PathBuf>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Edit a profile (the current one if no id is given)
    EditProfile {
        id: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_date_shorthand)]
        start_date: Option<NaiveDate>,
        /// Starting bodyweight (kg)
        #[arg(long)]
        weight_initial: Option<String>,
        /// Current bodyweight (kg)
        #[arg(short, long)]
        weight: Option<String>,
        /// Goal bodyweight (kg); pass "" to clear it
        #[arg(short, long)]
        goal: Option<String>,
        /// Path to a new profile photo; the old one is kept otherwise
        #[arg(short, long)]
        photo: Option<PathBuf>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a profile and all of its exercises
    DeleteProfile { id: String },
    /// Select the profile to work with; omit the id to clear the selection
    SelectProfile { id: Option<String> },
    /// List all profiles
    ListProfiles,
    /// Show the current profile
    ShowProfile,
    /// Add an exercise to the current profile
    AddExercise {
        #[arg(short, long)]
        name: String,
        /// Reference video link
        #[arg(short, long, default_value = "")]
        video: String,
        /// Working weight (kg)
        #[arg(short, long, default_value = "0")]
        weight: String,
    },
    /// Edit an exercise of the current profile
    EditExercise {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        video: Option<String>,
        #[arg(short, long)]
        weight: Option<String>,
    },
    /// Set the working weight of an exercise
    UpdateWeight { id: String, weight: String },
    /// Delete an exercise from the current profile
    DeleteExercise { id: String },
    /// List the current profile's exercises
    ListExercises,
    /// Flip a whole day between trained and not trained
    ToggleDay {
        #[arg(value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Mark a whole day as trained (or not, with --trained false)
    SetDay {
        #[arg(value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
        #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
        trained: bool,
    },
    /// Flip a single exercise on a day
    ToggleExercise {
        id: String,
        #[arg(short, long, value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Show the training week (Sunday to Saturday) containing a date
    Week {
        #[arg(value_parser = parse_date_shorthand, default_value = "today")]
        date: NaiveDate,
    },
    /// Write a backup file of all data
    Backup {
        /// Target directory (defaults to the configured backup dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Restore data from a backup file
    Restore { file: PathBuf },
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    GenerateCompletion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
