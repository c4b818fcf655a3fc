//src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{bail, Context, Result};
use chrono::Local;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdin, stdout, Write};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

use powertrack_lib::input::parse_weight;
use powertrack_lib::{
    trained_days, AppService, Confirmer, DayView, Exercise, ExerciseEditForm, ExerciseForm,
    FixedAnswer, Notifier, Profile, ProfileEditForm, ProfileForm, Severity,
};

const DEFAULT_LOG_FILTER: &str = "powertrack=warn,powertrack_lib=warn";

/// Prints notifications to the terminal.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Success => println!("{message}"),
            Severity::Warning => eprintln!("Warning: {message}"),
            Severity::Error => eprintln!("Error: {message}"),
        }
    }
}

/// Asks y/N on stdin.
struct PromptConfirmer;

impl Confirmer for PromptConfirmer {
    fn confirm(&self, message: &str) -> bool {
        print!("{message} [y/N]: ");
        if stdout().flush().is_err() {
            return false;
        }
        let mut input = String::new();
        if stdin().read_line(&mut input).is_err() {
            return false;
        }
        matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // --- Check for completion generation request FIRST ---
    let cli_args = cli::parse_args(); // Parse arguments once
    let export_csv = cli_args.export_csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command(); // Get the command structure
        let bin_name = cmd.get_name().to_string(); // Get the binary name

        eprintln!("Generating completion script for {shell}..."); // Print to stderr
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout()); // Print script to stdout
        return Ok(()); // Exit after generating script
    }

    init_logging();

    let confirmer: Box<dyn Confirmer> = if cli_args.yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(PromptConfirmer)
    };
    // Initialize the application service (loads config, opens the DB, loads saved data)
    let mut service = AppService::initialize(Rc::new(TerminalNotifier), confirmer)
        .context("Failed to initialize application service")?;

    let header_color = powertrack_lib::parse_color(&service.config.theme.header_color)
        .map(Color::from)
        .unwrap_or(Color::Green); // Fallback
    let trained_color = powertrack_lib::parse_color(&service.config.theme.trained_color)
        .map(Color::from)
        .unwrap_or(Color::DarkGreen);

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            // This case is handled above, but keep it exhaustive
            unreachable!("Completion generation should have exited already");
        }
        // --- Profile Commands ---
        cli::Commands::CreateProfile {
            name,
            weight,
            start_date,
            goal,
            photo,
            notes,
        } => {
            if name.trim().is_empty() {
                bail!("Profile name cannot be empty.");
            }
            let photo = photo.and_then(|path| service.load_photo(&path));
            let form = ProfileForm {
                name,
                start_date,
                weight_initial: weight,
                goal_weight: goal,
                notes,
                photo,
            };
            if let Some(id) = service.create_profile(form) {
                println!("Profile ID: {id} (now selected)");
            }
        }
        cli::Commands::EditProfile {
            id,
            name,
            start_date,
            weight_initial,
            weight,
            goal,
            photo,
            notes,
        } => {
            let id = resolve_profile_id(&service, id)?;
            let photo = photo.and_then(|path| service.load_photo(&path));
            let form = ProfileEditForm {
                name,
                start_date,
                weight_initial,
                weight_current: weight,
                goal_weight: goal,
                notes,
                photo,
            };
            if !service.update_profile(&id, form) {
                bail!("Profile '{id}' not found.");
            }
        }
        cli::Commands::DeleteProfile { id } => {
            if !service.state().profiles.contains_key(&id) {
                bail!("Profile '{id}' not found.");
            }
            if !service.delete_profile(&id) {
                println!("Deletion cancelled.");
            }
        }
        cli::Commands::SelectProfile { id } => {
            let id = id.filter(|id| !id.trim().is_empty());
            if !service.select_profile(id.as_deref()) {
                bail!("Profile '{}' not found.", id.unwrap_or_default());
            }
            match service.current_profile() {
                Some(profile) => println!("Selected profile '{}' ({}).", profile.name, profile.id),
                None => println!("Profile selection cleared."),
            }
        }
        cli::Commands::ListProfiles => {
            let current = service.state().current_profile_id.clone();
            let profiles: Vec<&Profile> = service.state().profiles.values().collect();
            if profiles.is_empty() {
                println!("No profiles yet. Use 'create-profile' to add one.");
            } else if export_csv {
                print_profile_csv(&profiles)?;
            } else {
                print_profile_table(&profiles, current.as_deref(), header_color);
            }
        }
        cli::Commands::ShowProfile => {
            let profile = require_current_profile(&service)?;
            print_profile_details(profile, header_color);
        }

        // --- Exercise Commands ---
        cli::Commands::AddExercise {
            name,
            video,
            weight,
        } => {
            if name.trim().is_empty() {
                bail!("Exercise name cannot be empty.");
            }
            let profile_id = require_current_profile(&service)?.id.clone();
            let form = ExerciseForm {
                name,
                video_url: video,
                weight,
            };
            if let Some(id) = service.add_exercise(&profile_id, form) {
                println!("Exercise ID: {id}");
            }
        }
        cli::Commands::EditExercise {
            id,
            name,
            video,
            weight,
        } => {
            let profile_id = require_current_profile(&service)?.id.clone();
            let form = ExerciseEditForm {
                name,
                video_url: video,
                weight,
            };
            if !service.update_exercise(&profile_id, &id, form) {
                bail!("Exercise '{id}' not found in the current profile.");
            }
        }
        cli::Commands::UpdateWeight { id, weight } => {
            let profile_id = require_current_profile(&service)?.id.clone();
            if !service.update_weight(&profile_id, &id, parse_weight(&weight)) {
                bail!("Exercise '{id}' not found in the current profile.");
            }
        }
        cli::Commands::DeleteExercise { id } => {
            let profile = require_current_profile(&service)?;
            if !profile.exercises.contains_key(&id) {
                bail!("Exercise '{id}' not found in the current profile.");
            }
            let profile_id = profile.id.clone();
            if !service.delete_exercise(&profile_id, &id) {
                println!("Deletion cancelled.");
            }
        }
        cli::Commands::ListExercises => {
            let profile = require_current_profile(&service)?;
            let mut exercises: Vec<&Exercise> = profile.exercises.values().collect();
            exercises.sort_by(|a, b| a.name.cmp(&b.name));
            if exercises.is_empty() {
                println!("No exercises yet. Use 'add-exercise' to add one.");
            } else if export_csv {
                print_exercise_csv(&exercises)?;
            } else {
                print_exercise_table(&exercises, header_color);
            }
        }

        // --- Training Day Commands ---
        cli::Commands::ToggleDay { date } => {
            require_current_profile(&service)?;
            service.toggle_day(date);
            print_day_status(&service, date);
        }
        cli::Commands::SetDay { date, trained } => {
            require_current_profile(&service)?;
            service.set_day_trained(date, trained);
            print_day_status(&service, date);
        }
        cli::Commands::ToggleExercise { id, date } => {
            require_current_profile(&service)?;
            if !service.toggle_day_exercise(date, &id) {
                bail!("Exercise '{id}' not found in the current profile.");
            }
            let done = service.day_record(date).is_some_and(|r| r.is_done(&id));
            println!(
                "{} on {}: {}",
                id,
                date.format("%Y-%m-%d"),
                if done { "done" } else { "not done" }
            );
            print_day_status(&service, date);
        }
        cli::Commands::Week { date } => {
            let profile = require_current_profile(&service)?;
            let name = profile.name.clone();
            let week = service.week(date);
            if export_csv {
                print_week_csv(&week)?;
            } else {
                print_week_table(&week, service.today(), header_color, trained_color);
                println!(
                    "{}: trained {} of 7 days this week.",
                    name,
                    trained_days(&week)
                );
            }
        }

        // --- Backup Commands ---
        cli::Commands::Backup { out } => {
            let path = service.export_backup(out.as_deref())?;
            println!("Backup written to {}", path.display());
        }
        cli::Commands::Restore { file } => {
            if !service.restore_from_file(&file) {
                bail!("Nothing was restored from {}.", file.display());
            }
        }
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
        }
        cli::Commands::ConfigPath => {
            println!("Config file is located at: {:?}", service.get_config_path());
        }
    }

    Ok(())
}

fn resolve_profile_id(service: &AppService, id: Option<String>) -> Result<String> {
    match id {
        Some(id) => Ok(id),
        None => Ok(require_current_profile(service)?.id.clone()),
    }
}

fn require_current_profile(service: &AppService) -> Result<&Profile> {
    service
        .current_profile()
        .context("No profile selected. Use 'select-profile <id>' or 'create-profile' first.")
}

fn format_weight(weight: f64) -> String {
    format!("{weight:.1} kg")
}

fn print_day_status(service: &AppService, date: chrono::NaiveDate) {
    let record = service.day_record(date);
    let trained = record.is_some_and(|r| r.trained);
    println!(
        "{}: {}",
        date.format("%Y-%m-%d"),
        if trained { "trained" } else { "not trained" }
    );
}

/// Prints profiles in a formatted table.
fn print_profile_table(profiles: &[&Profile], current: Option<&str>, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("").fg(header_color),
            Cell::new("ID").fg(header_color),
            Cell::new("Name").fg(header_color),
            Cell::new("Exercises").fg(header_color),
            Cell::new("Current Weight").fg(header_color),
            Cell::new("Goal").fg(header_color),
        ]);

    for profile in profiles {
        let marker = if current == Some(profile.id.as_str()) {
            "*"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(marker).add_attribute(Attribute::Bold),
            Cell::new(&profile.id),
            Cell::new(&profile.name),
            Cell::new(profile.exercises.len().to_string()),
            Cell::new(format_weight(profile.weight_current)),
            Cell::new(profile.goal_weight.map_or("-".to_string(), format_weight)),
        ]);
    }
    println!("{table}");
}

fn print_profile_details(profile: &Profile, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Field").fg(header_color),
            Cell::new("Value").fg(header_color),
        ]);
    table.add_row(vec![Cell::new("ID"), Cell::new(&profile.id)]);
    table.add_row(vec![
        Cell::new("Name"),
        Cell::new(&profile.name).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Start Date"),
        Cell::new(profile.start_date.format("%Y-%m-%d").to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Initial Weight"),
        Cell::new(format_weight(profile.weight_initial)),
    ]);
    table.add_row(vec![
        Cell::new("Current Weight"),
        Cell::new(format_weight(profile.weight_current)),
    ]);
    table.add_row(vec![
        Cell::new("Goal"),
        Cell::new(profile.goal_weight.map_or("-".to_string(), format_weight)),
    ]);
    table.add_row(vec![
        Cell::new("Photo"),
        Cell::new(if profile.photo.is_some() { "yes" } else { "no" }),
    ]);
    table.add_row(vec![
        Cell::new("Exercises"),
        Cell::new(profile.exercises.len().to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Notes"),
        Cell::new(if profile.notes.is_empty() {
            "-"
        } else {
            profile.notes.as_str()
        }),
    ]);
    println!("{table}");
}

/// Prints exercises in a formatted table.
fn print_exercise_table(exercises: &[&Exercise], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Name").fg(header_color),
            Cell::new("Weight (kg)").fg(header_color),
            Cell::new("Since").fg(header_color),
            Cell::new("Updated (Local)").fg(header_color),
            Cell::new("Video").fg(header_color),
        ]);

    for exercise in exercises {
        table.add_row(vec![
            Cell::new(&exercise.id),
            Cell::new(&exercise.name),
            Cell::new(format!("{:.2}", exercise.current_weight)),
            Cell::new(
                exercise
                    .date_added
                    .with_timezone(&Local)
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
            Cell::new(
                exercise
                    .last_updated
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
            ),
            Cell::new(if exercise.video_url.is_empty() {
                "-"
            } else {
                exercise.video_url.as_str()
            }),
        ]);
    }
    println!("{table}");
}

/// Prints the training week, one row per day.
fn print_week_table(
    week: &[DayView],
    today: chrono::NaiveDate,
    header_color: Color,
    trained_color: Color,
) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Day").fg(header_color),
            Cell::new("Date").fg(header_color),
            Cell::new("Trained").fg(header_color),
            Cell::new("Exercises").fg(header_color),
        ]);

    for day in week {
        let mut date_cell = Cell::new(day.date.format("%d/%m").to_string());
        if day.date == today {
            date_cell = date_cell.add_attribute(Attribute::Bold);
        }
        let trained_cell = if day.trained {
            Cell::new("yes").fg(trained_color)
        } else {
            Cell::new("-")
        };
        let exercises = if day.exercises.is_empty() {
            "No exercises".to_string()
        } else {
            day.exercises
                .iter()
                .map(|check| format!("[{}] {}", if check.done { "x" } else { " " }, check.name))
                .collect::<Vec<_>>()
                .join("\n")
        };
        table.add_row(vec![
            Cell::new(day.date.format("%A").to_string()),
            date_cell,
            trained_cell,
            Cell::new(exercises),
        ]);
    }
    println!("{table}");
}

fn print_profile_csv(profiles: &[&Profile]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "ID",
        "Name",
        "Start_Date",
        "Weight_Initial_kg",
        "Weight_Current_kg",
        "Goal_kg",
        "Exercises",
    ])?;
    for profile in profiles {
        writer.write_record(&[
            profile.id.clone(),
            profile.name.clone(),
            profile.start_date.format("%Y-%m-%d").to_string(),
            format!("{:.2}", profile.weight_initial),
            format!("{:.2}", profile.weight_current),
            profile
                .goal_weight
                .map_or(String::new(), |w| format!("{w:.2}")),
            profile.exercises.len().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_exercise_csv(exercises: &[&Exercise]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Name", "Weight_kg", "Date_Added", "Last_Updated", "Video_URL"])?;
    for exercise in exercises {
        writer.write_record(&[
            exercise.id.clone(),
            exercise.name.clone(),
            format!("{:.2}", exercise.current_weight),
            exercise.date_added.to_rfc3339(), // Use ISO 8601/RFC3339 for CSV
            exercise.last_updated.to_rfc3339(),
            exercise.video_url.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_week_csv(week: &[DayView]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Date", "Trained", "Exercise_ID", "Exercise", "Done"])?;
    for day in week {
        let date = day.date.format("%Y-%m-%d").to_string();
        if day.exercises.is_empty() {
            writer.write_record([date.as_str(), bool_str(day.trained), "", "", ""])?;
        }
        for check in &day.exercises {
            writer.write_record([
                date.as_str(),
                bool_str(day.trained),
                check.exercise_id.as_str(),
                check.name.as_str(),
                bool_str(check.done),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

const fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
