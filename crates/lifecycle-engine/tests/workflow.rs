mod common;

use chrono::Duration;
use common::{ADMIN, Harness};
use lifecycle_engine::{Context, EngineError, ErrorKind};
use lifecycle_store::{MoveDirection, SubjectId};

async fn sorts(h: &Harness) -> Vec<(String, i64)> {
  h.engine
    .list_workflows()
    .await
    .unwrap()
    .into_iter()
    .map(|w| (w.title, w.sort))
    .collect()
}

#[tokio::test]
async fn test_create_workflow_defaults() {
  let h = Harness::new().await;
  let workflow = h
    .engine
    .create_workflow(&h.ctx, "  Inactive users ", Some("warn, then delete"))
    .await
    .unwrap();

  assert_eq!(workflow.title, "Inactive users");
  assert_eq!(workflow.sort, 1);
  assert!(!workflow.active);
  assert_eq!(workflow.created_by, ADMIN);
  assert_eq!(workflow.created_at, h.ctx.now());
  assert_eq!(h.engine.get_workflow(workflow.id).await.unwrap(), workflow);
}

#[tokio::test]
async fn test_empty_title_is_rejected() {
  let h = Harness::new().await;
  let err = h.engine.create_workflow(&h.ctx, "   ", None).await.unwrap_err();
  assert!(matches!(err, EngineError::EmptyTitle));
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert_eq!(h.engine.workflow_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sort_stays_a_permutation_under_moves() {
  let h = Harness::new().await;
  let mut workflows = Vec::new();
  for title in ["a", "b", "c", "d"] {
    workflows.push(h.engine.create_workflow(&h.ctx, title, None).await.unwrap());
  }

  let moves = [
    (3, MoveDirection::Up),
    (3, MoveDirection::Up),
    (0, MoveDirection::Down),
    (1, MoveDirection::Up),
    (2, MoveDirection::Down),
  ];
  for (index, direction) in moves {
    h.engine
      .move_workflow(&h.ctx, &mut workflows[index], direction)
      .await
      .unwrap();
  }

  let mut indices: Vec<i64> = sorts(&h).await.into_iter().map(|(_, sort)| sort).collect();
  indices.sort();
  assert_eq!(indices, vec![1, 2, 3, 4]);
  assert_eq!(h.engine.workflow_count().await.unwrap(), 4);

  // a b c d -> a b d c -> a d b c -> d a b c -> d b a c -> (c is last)
  let titles: Vec<String> = sorts(&h).await.into_iter().map(|(title, _)| title).collect();
  assert_eq!(titles, vec!["d", "b", "a", "c"]);
}

#[tokio::test]
async fn test_move_at_boundaries_is_a_noop() {
  let h = Harness::new().await;
  let mut first = h.engine.create_workflow(&h.ctx, "first", None).await.unwrap();
  let mut last = h.engine.create_workflow(&h.ctx, "last", None).await.unwrap();
  h.clock.advance(Duration::hours(1));

  assert!(
    !h.engine
      .move_workflow(&h.ctx, &mut first, MoveDirection::Up)
      .await
      .unwrap()
  );
  assert!(
    !h.engine
      .move_workflow(&h.ctx, &mut last, MoveDirection::Down)
      .await
      .unwrap()
  );

  assert_eq!(
    sorts(&h).await,
    vec![("first".to_string(), 1), ("last".to_string(), 2)]
  );
  let stored = h.engine.get_workflow(first.id).await.unwrap();
  assert_eq!(stored.modified_at, stored.created_at);
}

#[tokio::test]
async fn test_move_touches_both_workflows() {
  let h = Harness::new().await;
  let a = h.engine.create_workflow(&h.ctx, "a", None).await.unwrap();
  let mut b = h.engine.create_workflow(&h.ctx, "b", None).await.unwrap();

  h.clock.advance(Duration::minutes(10));
  let editor = Context::new(SubjectId(7), h.clock.clone());
  assert!(
    h.engine
      .move_workflow(&editor, &mut b, MoveDirection::Up)
      .await
      .unwrap()
  );

  assert_eq!(b.sort, 1);
  let a = h.engine.get_workflow(a.id).await.unwrap();
  assert_eq!(a.sort, 2);
  assert_eq!(a.modified_by, SubjectId(7));
  assert_eq!(a.modified_at, editor.now());
  assert_eq!(b.modified_by, SubjectId(7));
}

#[tokio::test]
async fn test_setters_update_audit_fields() {
  let h = Harness::new().await;
  let mut workflow = h.engine.create_workflow(&h.ctx, "draft", None).await.unwrap();

  h.clock.advance(Duration::days(1));
  let editor = Context::new(SubjectId(9), h.clock.clone());

  h.engine
    .set_workflow_title(&editor, &mut workflow, "Inactive users")
    .await
    .unwrap();
  h.engine
    .set_workflow_description(&editor, &mut workflow, Some("after one year"))
    .await
    .unwrap();
  h.engine
    .activate_workflow(&editor, &mut workflow)
    .await
    .unwrap();

  let stored = h.engine.get_workflow(workflow.id).await.unwrap();
  assert_eq!(stored, workflow);
  assert_eq!(stored.title, "Inactive users");
  assert_eq!(stored.description.as_deref(), Some("after one year"));
  assert!(stored.active);
  assert_eq!(stored.created_by, ADMIN);
  assert_eq!(stored.modified_by, SubjectId(9));
  assert_eq!(stored.modified_at, editor.now());

  h.engine
    .deactivate_workflow(&editor, &mut workflow)
    .await
    .unwrap();
  assert!(!h.engine.get_workflow(workflow.id).await.unwrap().active);

  let err = h
    .engine
    .set_workflow_title(&editor, &mut workflow, "")
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::EmptyTitle));
  assert_eq!(workflow.title, "Inactive users");
}

#[tokio::test]
async fn test_missing_workflow() {
  let h = Harness::new().await;
  let err = h
    .engine
    .get_workflow(lifecycle_store::WorkflowId(99))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}
