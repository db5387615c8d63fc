//! CLI probe for `questlog_core`.
//!
//! # Usage
//! - `questlog_cli` prints the core version.
//! - `questlog_cli <db_path> <username>` prints a stored profile with its
//!   recommendations and study plan.
//! - `questlog_cli export <db_path> <username>` prints the profile as JSON.
//! - `questlog_cli import <db_path> <file>` stores a JSON profile document.
//! - `questlog_cli leaderboard <db_path>` prints the top entries as JSON.
//!
//! Logging is enabled when `QUESTLOG_LOG_DIR` names an absolute directory;
//! `QUESTLOG_LOG_LEVEL` overrides the build default.

use log::warn;
use questlog_core::db::open_db;
use questlog_core::{
    default_log_level, init_logging, xp_needed, Profile, ProfileService, SqliteLeaderboard,
    SqliteProfileRepository, Task,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    init_logging_from_env();
    println!("questlog_core version={}", questlog_core::core_version());

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => ExitCode::SUCCESS,
        [command, db_path, username] if command == "export" => {
            report(export_profile(db_path, username))
        }
        [command, db_path, file] if command == "import" => report(import_profile(db_path, file)),
        [command, db_path] if command == "leaderboard" => report(show_leaderboard(db_path)),
        [db_path, username] => report(show_profile(db_path, username)),
        _ => {
            eprintln!(
                "usage: questlog_cli [<db_path> <username> | export <db_path> <username> | import <db_path> <file> | leaderboard <db_path>]"
            );
            ExitCode::from(2)
        }
    }
}

fn report(result: Result<(), String>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging_from_env() {
    let Ok(log_dir) = std::env::var("QUESTLOG_LOG_DIR") else {
        return;
    };
    let level =
        std::env::var("QUESTLOG_LOG_LEVEL").unwrap_or_else(|_| default_log_level().to_string());
    if let Err(err) = init_logging(&level, &log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn show_profile(db_path: &str, username: &str) -> Result<(), String> {
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        SqliteLeaderboard::new(&conn),
    );
    let profile = service.sign_in(username).map_err(|err| {
        warn!("event=cli_profile module=cli status=error username={username}");
        err.to_string()
    })?;

    print_summary(&profile);

    println!("recommended:");
    for task in service.recommendations(&profile) {
        println!("  {}", describe(task));
    }

    let plan = service.study_plan(&profile);
    println!(
        "study plan (effort {}/{}, value {}):",
        plan.total_effort, plan.budget, plan.total_value
    );
    for task in plan.tasks {
        println!("  {}", describe(task));
    }
    Ok(())
}

fn export_profile(db_path: &str, username: &str) -> Result<(), String> {
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        SqliteLeaderboard::new(&conn),
    );
    let profile = service.sign_in(username).map_err(|err| err.to_string())?;
    let json = serde_json::to_string_pretty(&profile).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

fn import_profile(db_path: &str, file: &str) -> Result<(), String> {
    let document = std::fs::read_to_string(file).map_err(|err| format!("{file}: {err}"))?;
    let profile: Profile =
        serde_json::from_str(&document).map_err(|err| format!("{file}: {err}"))?;

    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        SqliteLeaderboard::new(&conn),
    );
    let profile = service.import_profile(profile).map_err(|err| {
        warn!("event=cli_import module=cli status=error file={file}");
        err.to_string()
    })?;
    print_summary(&profile);
    Ok(())
}

fn show_leaderboard(db_path: &str) -> Result<(), String> {
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let entries = SqliteLeaderboard::new(&conn)
        .top_entries(10)
        .map_err(|err| err.to_string())?;
    let json = serde_json::to_string_pretty(&entries).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

fn print_summary(profile: &Profile) {
    println!("user={}", profile.username());
    println!(
        "level={} xp={}/{} coins={} lifetime_completed={}",
        profile.level(),
        profile.xp(),
        xp_needed(profile.level()),
        profile.coins(),
        profile.total_completed_tasks()
    );
}

fn describe(task: &Task) -> String {
    let status = if task.is_completed() { "x" } else { " " };
    format!(
        "[{status}] {} ({}) xp={} coins={}",
        task.description, task.difficulty, task.xp_reward, task.coin_reward
    )
}
