use chrono::{TimeZone, Utc};
use lifecycle_store::{
  ComponentKind, MoveDirection, ProcessId, SettingStore, SqliteStore, StoreError, SubjectId,
};

fn now() -> chrono::DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

const ACTOR: SubjectId = SubjectId(1);

#[tokio::test]
async fn test_file_database_persists_across_connections() {
  let dir = tempfile::tempdir().unwrap();
  let url = format!("sqlite://{}", dir.path().join("lifecycle.db").display());

  {
    let store = SqliteStore::connect(&url).await.unwrap();
    store
      .create_workflow("Inactive users", Some("Clean up"), ACTOR, now())
      .await
      .unwrap();
  }

  let store = SqliteStore::connect(&url).await.unwrap();
  let workflows = store.list_workflows().await.unwrap();
  assert_eq!(workflows.len(), 1);
  assert_eq!(workflows[0].title, "Inactive users");
  assert_eq!(workflows[0].sort, 1);
  assert!(!workflows[0].active);
}

#[tokio::test]
async fn test_workflow_sort_indices_are_contiguous() {
  let store = SqliteStore::in_memory().await.unwrap();
  for title in ["a", "b", "c"] {
    store.create_workflow(title, None, ACTOR, now()).await.unwrap();
  }

  let sorts: Vec<i64> = store
    .list_workflows()
    .await
    .unwrap()
    .iter()
    .map(|w| w.sort)
    .collect();
  assert_eq!(sorts, vec![1, 2, 3]);
  assert_eq!(store.count_workflows().await.unwrap(), 3);
}

#[tokio::test]
async fn test_swap_workflow_touches_both() {
  let store = SqliteStore::in_memory().await.unwrap();
  let a = store.create_workflow("a", None, ACTOR, now()).await.unwrap();
  let b = store.create_workflow("b", None, ACTOR, now()).await.unwrap();

  let later = now() + chrono::Duration::minutes(5);
  let new_sort = store
    .swap_workflow(b.id, MoveDirection::Up, SubjectId(9), later)
    .await
    .unwrap();
  assert_eq!(new_sort, Some(1));

  let a = store.get_workflow(a.id).await.unwrap().unwrap();
  let b = store.get_workflow(b.id).await.unwrap().unwrap();
  assert_eq!((a.sort, b.sort), (2, 1));
  assert_eq!(a.modified_by, SubjectId(9));
  assert_eq!(b.modified_at, later);

  // Already at the top.
  let unchanged = store
    .swap_workflow(b.id, MoveDirection::Up, ACTOR, later)
    .await
    .unwrap();
  assert_eq!(unchanged, None);
}

#[tokio::test]
async fn test_steps_are_ordered_per_workflow() {
  let store = SqliteStore::in_memory().await.unwrap();
  let w1 = store.create_workflow("one", None, ACTOR, now()).await.unwrap();
  let w2 = store.create_workflow("two", None, ACTOR, now()).await.unwrap();

  let s1 = store.create_step(w1.id, Some("warn"), None).await.unwrap();
  let s2 = store.create_step(w1.id, None, None).await.unwrap();
  let other = store.create_step(w2.id, None, None).await.unwrap();
  assert_eq!((s1.sort, s2.sort, other.sort), (1, 2, 1));

  assert_eq!(store.swap_step(s2.id, MoveDirection::Up).await.unwrap(), Some(1));
  let steps = store.list_steps(w1.id).await.unwrap();
  assert_eq!(steps[0].id, s2.id);
  assert_eq!(steps[1].id, s1.id);

  assert_eq!(store.swap_step(s1.id, MoveDirection::Down).await.unwrap(), None);
  assert_eq!(
    store.find_step_by_sort(w1.id, 1).await.unwrap().map(|s| s.id),
    Some(s2.id)
  );
}

#[tokio::test]
async fn test_delete_instance_removes_settings() {
  let store = SqliteStore::in_memory().await.unwrap();
  let w = store.create_workflow("w", None, ACTOR, now()).await.unwrap();
  let step = store.create_step(w.id, None, None).await.unwrap();

  let effect = store
    .create_instance(ComponentKind::Effect, step.id, "noop")
    .await
    .unwrap();
  store
    .set(ComponentKind::Effect, effect.id, "subject", Some("Bye"))
    .await
    .unwrap();
  store
    .set(ComponentKind::Effect, effect.id, "subject", Some("Farewell"))
    .await
    .unwrap();
  assert_eq!(
    store.get(ComponentKind::Effect, effect.id, "subject").await.unwrap(),
    Some("Farewell".to_string())
  );

  store
    .delete_instance(ComponentKind::Effect, effect.id)
    .await
    .unwrap();
  assert!(
    store
      .get_all(ComponentKind::Effect, effect.id)
      .await
      .unwrap()
      .is_empty()
  );
  assert!(
    store
      .list_instances(ComponentKind::Effect, step.id)
      .await
      .unwrap()
      .is_empty()
  );

  let err = store
    .delete_instance(ComponentKind::Effect, effect.id)
    .await
    .unwrap_err();
  assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_one_unfinished_process_per_subject() {
  let store = SqliteStore::in_memory().await.unwrap();
  let w = store.create_workflow("w", None, ACTOR, now()).await.unwrap();
  let step = store.create_step(w.id, None, None).await.unwrap();
  let subject = SubjectId(42);

  let mut tx = store.begin_process().await.unwrap();
  assert!(!tx.has_unfinished_process(subject).await.unwrap());
  let process = tx.insert_process(subject, &step, false, now()).await.unwrap();
  tx.commit().await.unwrap();
  assert_eq!(process.workflow_id, w.id);

  let mut tx = store.begin_process().await.unwrap();
  assert!(tx.has_unfinished_process(subject).await.unwrap());
  let err = tx.insert_process(subject, &step, false, now()).await.unwrap_err();
  assert!(matches!(err, StoreError::Conflict(_)));
  tx.rollback().await.unwrap();

  store
    .update_process_step(process.id, step.id, true, now())
    .await
    .unwrap();
  let mut tx = store.begin_process().await.unwrap();
  assert!(!tx.has_unfinished_process(subject).await.unwrap());
  tx.insert_process(subject, &step, false, now()).await.unwrap();
  tx.commit().await.unwrap();

  assert_eq!(
    store
      .list_processes_for_subject(subject, true)
      .await
      .unwrap()
      .len(),
    2
  );
  assert_eq!(
    store
      .list_processes_for_subject(subject, false)
      .await
      .unwrap()
      .len(),
    1
  );
  assert_eq!(
    store
      .list_active_processes_for_step(step.id)
      .await
      .unwrap()
      .len(),
    1
  );
}

#[tokio::test]
async fn test_rolled_back_process_is_not_visible() {
  let store = SqliteStore::in_memory().await.unwrap();
  let w = store.create_workflow("w", None, ACTOR, now()).await.unwrap();
  let step = store.create_step(w.id, None, None).await.unwrap();

  let mut tx = store.begin_process().await.unwrap();
  let process = tx
    .insert_process(SubjectId(5), &step, false, now())
    .await
    .unwrap();
  tx.rollback().await.unwrap();

  assert!(store.get_process(process.id).await.unwrap().is_none());
}

async fn file_store(dir: &tempfile::TempDir) -> SqliteStore {
  let url = format!("sqlite://{}", dir.path().join("lifecycle.db").display());
  SqliteStore::connect(&url).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creators_keep_sort_contiguous() {
  let dir = tempfile::tempdir().unwrap();
  let store = file_store(&dir).await;
  let first = store.create_workflow("first", None, ACTOR, now()).await.unwrap();

  let mut tasks = Vec::new();
  for i in 0..8 {
    let store = store.clone();
    let workflow_id = first.id;
    tasks.push(tokio::spawn(async move {
      store
        .create_workflow(&format!("w{i}"), None, ACTOR, now())
        .await
        .unwrap();
      store.create_step(workflow_id, None, None).await.unwrap();
    }));
  }
  for task in tasks {
    task.await.unwrap();
  }

  let workflow_sorts: Vec<i64> = store
    .list_workflows()
    .await
    .unwrap()
    .iter()
    .map(|w| w.sort)
    .collect();
  assert_eq!(workflow_sorts, (1..=9).collect::<Vec<_>>());

  let step_sorts: Vec<i64> = store
    .list_steps(first.id)
    .await
    .unwrap()
    .iter()
    .map(|s| s.sort)
    .collect();
  assert_eq!(step_sorts, (1..=8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_finished_process_does_not_move() {
  let store = SqliteStore::in_memory().await.unwrap();
  let w = store.create_workflow("w", None, ACTOR, now()).await.unwrap();
  let s1 = store.create_step(w.id, None, None).await.unwrap();
  let s2 = store.create_step(w.id, None, None).await.unwrap();

  let mut tx = store.begin_process().await.unwrap();
  let process = tx.insert_process(SubjectId(7), &s1, false, now()).await.unwrap();
  tx.commit().await.unwrap();

  store
    .update_process_step(process.id, s2.id, true, now())
    .await
    .unwrap();
  let err = store
    .update_process_step(process.id, s1.id, false, now())
    .await
    .unwrap_err();
  assert!(matches!(err, StoreError::Conflict(_)));

  let stored = store.get_process(process.id).await.unwrap().unwrap();
  assert_eq!(stored.step_id, s2.id);
  assert!(stored.finished);

  let err = store
    .update_process_step(ProcessId(999), s1.id, false, now())
    .await
    .unwrap_err();
  assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_workflow_closes_sort_gap() {
  let store = SqliteStore::in_memory().await.unwrap();
  let a = store.create_workflow("a", None, ACTOR, now()).await.unwrap();
  let b = store.create_workflow("b", None, ACTOR, now()).await.unwrap();
  let c = store.create_workflow("c", None, ACTOR, now()).await.unwrap();

  let step = store.create_step(b.id, None, None).await.unwrap();
  let effect = store
    .create_instance(ComponentKind::Effect, step.id, "noop")
    .await
    .unwrap();
  store
    .set(ComponentKind::Effect, effect.id, "subject", Some("Bye"))
    .await
    .unwrap();

  store.delete_workflow(b.id).await.unwrap();

  assert!(store.get_workflow(b.id).await.unwrap().is_none());
  assert!(store.get_step(step.id).await.unwrap().is_none());
  assert!(
    store
      .get_instance(ComponentKind::Effect, effect.id)
      .await
      .unwrap()
      .is_none()
  );
  assert!(
    store
      .get_all(ComponentKind::Effect, effect.id)
      .await
      .unwrap()
      .is_empty()
  );

  let order: Vec<_> = store
    .list_workflows()
    .await
    .unwrap()
    .into_iter()
    .map(|w| (w.id, w.sort))
    .collect();
  assert_eq!(order, vec![(a.id, 1), (c.id, 2)]);
}

#[tokio::test]
async fn test_delete_workflow_with_processes_is_refused() {
  let store = SqliteStore::in_memory().await.unwrap();
  let w = store.create_workflow("w", None, ACTOR, now()).await.unwrap();
  let step = store.create_step(w.id, None, None).await.unwrap();

  let mut tx = store.begin_process().await.unwrap();
  tx.insert_process(SubjectId(3), &step, false, now()).await.unwrap();
  tx.commit().await.unwrap();

  let err = store.delete_workflow(w.id).await.unwrap_err();
  assert!(matches!(err, StoreError::Conflict(_)));
  assert!(store.get_workflow(w.id).await.unwrap().is_some());
}
