use questlog_core::db::open_db_in_memory;
use questlog_core::{
    Difficulty, LeaderboardEntry, LeaderboardPublisher, ProfileRepository, ProfileService,
    ProfileServiceError, PublishError, Reward, SqliteLeaderboard, SqliteProfileRepository,
    TaskDraft, TaskInputError,
};
use std::cell::RefCell;

#[derive(Default)]
struct RecordingPublisher {
    entries: RefCell<Vec<LeaderboardEntry>>,
}

impl LeaderboardPublisher for RecordingPublisher {
    fn publish(&self, entry: &LeaderboardEntry) -> Result<(), PublishError> {
        self.entries.borrow_mut().push(entry.clone());
        Ok(())
    }
}

struct RejectingPublisher;

impl LeaderboardPublisher for RejectingPublisher {
    fn publish(&self, _entry: &LeaderboardEntry) -> Result<(), PublishError> {
        Err(PublishError::Rejected("offline".to_string()))
    }
}

#[test]
fn sign_up_then_sign_in_returns_stored_profile() {
    let conn = open_db_in_memory().unwrap();
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        SqliteLeaderboard::new(&conn),
    );

    let created = service.sign_up("ada").unwrap();
    assert_eq!(created.level(), 1);
    assert_eq!(created.revision(), 1);

    let loaded = service.sign_in(" ada ").unwrap();
    assert_eq!(loaded, created);

    let top = SqliteLeaderboard::new(&conn).top_entries(10).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].username, "ada");
}

#[test]
fn sign_up_rejects_blank_and_taken_usernames() {
    let conn = open_db_in_memory().unwrap();
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        RecordingPublisher::default(),
    );

    assert!(matches!(
        service.sign_up("   ").unwrap_err(),
        ProfileServiceError::InvalidUsername(_)
    ));

    service.sign_up("ada").unwrap();
    assert!(matches!(
        service.sign_up("ada").unwrap_err(),
        ProfileServiceError::UsernameTaken(ref name) if name == "ada"
    ));
}

#[test]
fn sign_in_without_profile_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        RecordingPublisher::default(),
    );

    assert!(matches!(
        service.sign_in("ghost").unwrap_err(),
        ProfileServiceError::ProfileNotFound(ref name) if name == "ghost"
    ));
}

#[test]
fn sign_in_with_corrupt_row_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        RecordingPublisher::default(),
    );
    service.sign_up("ada").unwrap();
    conn.execute("UPDATE profiles SET xp = 500 WHERE username = 'ada';", [])
        .unwrap();

    assert!(matches!(
        service.sign_in("ada").unwrap_err(),
        ProfileServiceError::ProfileNotFound(_)
    ));
}

#[test]
fn invalid_draft_leaves_profile_and_storage_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::new(&conn);
    let service = ProfileService::new(repo, RecordingPublisher::default());
    let mut profile = service.sign_up("ada").unwrap();

    let err = service
        .add_task(&mut profile, &TaskDraft::new("essay").with_rewards("lots", "5"))
        .unwrap_err();
    assert!(matches!(
        err,
        ProfileServiceError::Input(TaskInputError::InvalidXpReward(ref raw)) if raw == "lots"
    ));
    assert!(profile.tasks().is_empty());
    assert_eq!(profile.revision(), 1);
    assert_eq!(repo.load("ada").unwrap().unwrap().revision(), 1);
}

#[test]
fn completing_a_task_persists_rewards_and_publishes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::new(&conn);
    let publisher = RecordingPublisher::default();
    let service = ProfileService::new(repo, &publisher);
    let mut profile = service.sign_up("ada").unwrap();

    let index = service
        .add_task(
            &mut profile,
            &TaskDraft::new("mock exam")
                .with_rewards("120", "40")
                .with_difficulty(Difficulty::Hard),
        )
        .unwrap();
    let reward = service.complete_task(&mut profile, index).unwrap();

    assert_eq!(reward.xp, 120);
    assert_eq!(reward.coins, 40);
    assert_eq!(reward.levels_gained, 1);
    assert_eq!(profile.level(), 2);
    assert_eq!(profile.xp(), 20);
    assert_eq!(profile.coins(), 90);

    let stored = repo.load("ada").unwrap().unwrap();
    assert_eq!(stored, profile);
    assert!(stored.tasks()[0].is_completed());

    let entries = publisher.entries.borrow();
    let last = entries.last().unwrap();
    assert_eq!(last.username, "ada");
    assert_eq!(last.level, 2);
    assert_eq!(last.xp, 20);
    assert_eq!(last.total_completed_tasks, 1);
}

#[test]
fn completing_twice_or_out_of_range_fails() {
    let conn = open_db_in_memory().unwrap();
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        RecordingPublisher::default(),
    );
    let mut profile = service.sign_up("ada").unwrap();
    service
        .add_task(&mut profile, &TaskDraft::new("flashcards"))
        .unwrap();
    service.complete_task(&mut profile, 0).unwrap();

    assert!(matches!(
        service.complete_task(&mut profile, 0).unwrap_err(),
        ProfileServiceError::Progress(_)
    ));
    assert!(matches!(
        service.complete_task(&mut profile, 5).unwrap_err(),
        ProfileServiceError::Progress(_)
    ));
    assert_eq!(profile.total_completed_tasks(), 1);
}

#[test]
fn deleting_a_completed_task_keeps_lifetime_counter() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::new(&conn);
    let service = ProfileService::new(repo, RecordingPublisher::default());
    let mut profile = service.sign_up("ada").unwrap();
    service
        .add_task(&mut profile, &TaskDraft::new("flashcards"))
        .unwrap();
    service.complete_task(&mut profile, 0).unwrap();

    let removed = service.delete_task(&mut profile, 0).unwrap();
    assert_eq!(removed.description, "flashcards");

    let stored = repo.load("ada").unwrap().unwrap();
    assert!(stored.tasks().is_empty());
    assert_eq!(stored.total_completed_tasks(), 1);
}

#[test]
fn redeeming_without_enough_coins_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::new(&conn);
    let service = ProfileService::new(repo, RecordingPublisher::default());
    let mut profile = service.sign_up("ada").unwrap();
    let break_reward = Reward::find("1 hour break").unwrap();

    assert!(!service.redeem_reward(&mut profile, &break_reward).unwrap());
    assert_eq!(profile.coins(), 0);
    assert_eq!(repo.load("ada").unwrap().unwrap().revision(), 1);
}

#[test]
fn redeeming_with_enough_coins_spends_them() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::new(&conn);
    let service = ProfileService::new(repo, RecordingPublisher::default());
    let mut profile = service.sign_up("ada").unwrap();
    service
        .add_task(
            &mut profile,
            &TaskDraft::new("thesis chapter").with_rewards("10", "200"),
        )
        .unwrap();
    service.complete_task(&mut profile, 0).unwrap();

    let netflix = Reward::find("NETFLIX 30 MINS").unwrap();
    assert!(service.redeem_reward(&mut profile, &netflix).unwrap());
    assert_eq!(profile.coins(), 50);
    assert_eq!(repo.load("ada").unwrap().unwrap().coins(), 50);
}

#[test]
fn study_plan_and_recommendations_skip_completed_tasks() {
    let conn = open_db_in_memory().unwrap();
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        RecordingPublisher::default(),
    );
    let mut profile = service.sign_up("ada").unwrap();
    for (name, xp, coins, difficulty) in [
        ("read chapter", "30", "10", Difficulty::Easy),
        ("lab report", "60", "20", Difficulty::Medium),
        ("final project", "200", "80", Difficulty::Hard),
    ] {
        service
            .add_task(
                &mut profile,
                &TaskDraft::new(name)
                    .with_rewards(xp, coins)
                    .with_difficulty(difficulty),
            )
            .unwrap();
    }
    service.complete_task(&mut profile, 2).unwrap();

    let recommended: Vec<&str> = service
        .recommendations(&profile)
        .into_iter()
        .map(|task| task.description.as_str())
        .collect();
    assert_eq!(recommended, vec!["lab report", "read chapter"]);

    let plan = service.study_plan(&profile);
    assert!(plan
        .tasks
        .iter()
        .all(|task| task.description != "final project"));
    assert!(plan.total_effort <= plan.budget);
}

#[test]
fn failing_publisher_does_not_fail_the_operation() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::new(&conn);
    let service = ProfileService::new(repo, RejectingPublisher);
    let mut profile = service.sign_up("ada").unwrap();
    service
        .add_task(&mut profile, &TaskDraft::new("flashcards"))
        .unwrap();

    let reward = service.complete_task(&mut profile, 0).unwrap();
    assert_eq!(reward.xp, 50);
    assert_eq!(repo.load("ada").unwrap().unwrap().xp(), 50);
}

#[test]
fn progress_stats_reflect_completed_work() {
    let conn = open_db_in_memory().unwrap();
    let service = ProfileService::new(
        SqliteProfileRepository::new(&conn),
        RecordingPublisher::default(),
    );
    let mut profile = service.sign_up("ada").unwrap();
    service
        .add_task(&mut profile, &TaskDraft::new("flashcards"))
        .unwrap();
    service
        .add_task(&mut profile, &TaskDraft::new("essay"))
        .unwrap();
    service.complete_task(&mut profile, 0).unwrap();

    let stats = service.progress_stats(&profile);
    assert_eq!(stats.total_tasks, 2);
    assert_eq!(stats.completed_tasks, 1);
    assert_eq!(stats.xp_to_next_level, 50);
}

#[test]
fn exported_profile_document_imports_as_new_profile() {
    let source_conn = open_db_in_memory().unwrap();
    let source = ProfileService::new(
        SqliteProfileRepository::new(&source_conn),
        RecordingPublisher::default(),
    );
    let mut profile = source.sign_up("ada").unwrap();
    source
        .add_task(&mut profile, &TaskDraft::new("flashcards"))
        .unwrap();
    source.complete_task(&mut profile, 0).unwrap();
    let document = serde_json::to_string(&profile).unwrap();

    let conn = open_db_in_memory().unwrap();
    let repo = SqliteProfileRepository::new(&conn);
    let publisher = RecordingPublisher::default();
    let service = ProfileService::new(repo, &publisher);

    let imported = service
        .import_profile(serde_json::from_str(&document).unwrap())
        .unwrap();
    assert_eq!(imported.revision(), 1);
    assert_eq!(imported.xp(), 50);
    assert!(imported.tasks()[0].is_completed());
    assert_eq!(repo.load("ada").unwrap().unwrap(), imported);
    assert_eq!(publisher.entries.borrow().len(), 1);

    assert!(matches!(
        service
            .import_profile(serde_json::from_str(&document).unwrap())
            .unwrap_err(),
        ProfileServiceError::UsernameTaken(ref name) if name == "ada"
    ));
}
