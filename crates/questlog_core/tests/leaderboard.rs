use questlog_core::db::open_db_in_memory;
use questlog_core::{
    add_xp, publish_best_effort, LeaderboardEntry, LeaderboardPublisher, Profile, PublishError,
    SqliteLeaderboard,
};

fn entry(username: &str, level: u32, xp: u64, completed: u64) -> LeaderboardEntry {
    LeaderboardEntry {
        username: username.to_string(),
        level,
        xp,
        total_completed_tasks: completed,
    }
}

#[test]
fn publish_replaces_previous_row() {
    let conn = open_db_in_memory().unwrap();
    let board = SqliteLeaderboard::new(&conn);

    board.publish(&entry("ada", 1, 40, 1)).unwrap();
    board.publish(&entry("ada", 2, 5, 3)).unwrap();

    let top = board.top_entries(10).unwrap();
    assert_eq!(top, vec![entry("ada", 2, 5, 3)]);
}

#[test]
fn top_entries_rank_by_level_then_xp_then_completions() {
    let conn = open_db_in_memory().unwrap();
    let board = SqliteLeaderboard::new(&conn);

    board.publish(&entry("ada", 2, 10, 4)).unwrap();
    board.publish(&entry("bob", 3, 0, 9)).unwrap();
    board.publish(&entry("cy", 2, 10, 6)).unwrap();
    board.publish(&entry("dee", 2, 80, 1)).unwrap();

    let names: Vec<String> = board
        .top_entries(10)
        .unwrap()
        .into_iter()
        .map(|row| row.username)
        .collect();
    assert_eq!(names, vec!["bob", "dee", "cy", "ada"]);

    assert_eq!(board.top_entries(2).unwrap().len(), 2);
    assert_eq!(board.top_entries(0).unwrap().len(), 1);
}

#[test]
fn best_effort_publish_projects_profile() {
    let conn = open_db_in_memory().unwrap();
    let board = SqliteLeaderboard::new(&conn);
    let mut profile = Profile::new("ada").unwrap();
    add_xp(&mut profile, 130);

    assert!(publish_best_effort(&board, &profile));
    assert_eq!(board.top_entries(1).unwrap(), vec![entry("ada", 2, 30, 0)]);
}

#[test]
fn negative_stored_values_are_rejected_not_clamped() {
    let conn = open_db_in_memory().unwrap();
    let board = SqliteLeaderboard::new(&conn);
    conn.execute_batch(
        "PRAGMA ignore_check_constraints = ON;
         INSERT INTO leaderboard (username, level, xp, total_completed_tasks)
         VALUES ('ada', 2, -5, 1);",
    )
    .unwrap();

    let err = board.top_entries(10).unwrap_err();
    assert!(
        matches!(err, PublishError::InvalidData(ref message) if message.contains("leaderboard.xp")),
        "unexpected error: {err}"
    );
}
