use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use wfm::clock::{DayZone, ManualClock};
use wfm::config::Config;
use wfm::service::{AssignByReference, DailyQuery, TaskUpdate};
use wfm::storage::Storage;
use wfm::store::{FileStore, TaskStore};
use wfm::task::{ActivityKind, NewTask, Priority, ReferenceType, TaskStatus, TaskType};
use wfm::{Error, TaskService};

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn service<'a>(
    storage: &Storage,
    clock: &'a ManualClock,
) -> TaskService<FileStore, &'a ManualClock> {
    let config = Config::default();
    TaskService::new(
        FileStore::new(storage.clone()),
        config.reference_table().expect("reference table"),
    )
    .with_policy(config.task_policy().expect("policy"))
    .with_zone(DayZone::utc())
    .with_clock(clock)
}

#[test]
fn reassignment_survives_reopening_the_store() {
    let temp = TempDir::new().expect("tempdir");
    let storage = Storage::new(temp.path().to_path_buf());
    let clock = ManualClock::at(at("2024-05-01T09:00:00Z"));

    let mut svc = service(&storage, &clock);
    let created = svc
        .create_tasks(vec![NewTask {
            reference_id: 55,
            reference_type: ReferenceType::new("ORDER"),
            task_type: TaskType::new("CREATE_INVOICE"),
            assignee_id: 1,
            priority: Priority::High,
            deadline_time: at("2024-05-03T00:00:00Z"),
        }])
        .expect("create");
    let invoice_id = created[0].id.expect("id");

    clock.advance(Duration::hours(1));
    let report = svc
        .assign_by_reference(&AssignByReference {
            reference_id: 55,
            reference_type: ReferenceType::new("ORDER"),
            assignee_id: 2,
        })
        .expect("assign");
    assert_eq!(report.reassigned, vec![invoice_id]);
    assert_eq!(report.created.len(), 2);
    drop(svc);

    let mut reopened = service(&storage, &clock);
    let invoice = reopened.find_task(invoice_id).expect("invoice");
    assert_eq!(invoice.assignee_id, 2);
    assert_eq!(invoice.priority, Priority::High);
    assert_eq!(invoice.activities.last().map(|a| a.event_type), Some(ActivityKind::Reassigned));

    for id in &report.created {
        let task = reopened.find_task(*id).expect("created task");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.deadline_time, at("2024-05-02T10:00:00Z"));
    }

    let all = reopened
        .store()
        .find_by_reference(55, &ReferenceType::new("ORDER"))
        .expect("by reference");
    assert_eq!(all.len(), 3);

    reopened
        .update_tasks(vec![TaskUpdate {
            task_id: invoice_id,
            status: Some(TaskStatus::Completed),
            description: None,
        }])
        .expect("complete");

    clock.set(at("2024-05-02T08:00:00Z"));
    let daily = reopened
        .fetch_daily(&DailyQuery {
            assignee_ids: vec![2],
            date: None,
        })
        .expect("daily");
    let daily_ids: Vec<_> = daily.iter().filter_map(|task| task.id).collect();
    assert_eq!(daily_ids, report.created);
}

#[test]
fn missing_task_is_reported_with_its_id() {
    let temp = TempDir::new().expect("tempdir");
    let storage = Storage::new(temp.path().to_path_buf());
    let clock = ManualClock::at(at("2024-05-01T09:00:00Z"));
    let mut svc = service(&storage, &clock);

    let err = svc.add_comment(404, "anyone?", 1).unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(404)));
    assert_eq!(err.exit_code(), wfm::error::exit_codes::USER_ERROR);
    assert!(!storage.tasks_file().exists());
}
