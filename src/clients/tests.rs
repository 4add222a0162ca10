use chrono::Utc;

use super::fake::{local_task, remote_task, FakeBoard, FakeLocal};
use super::{LocalStore, RemoteBoard};
use crate::error::ClientError;
use crate::model::local::{LocalFilter, LocalTask};
use crate::model::mutation::{LocalUpdate, WaitChange};
use crate::util::dates::sync_epoch;

#[tokio::test]
async fn ledger_sync_defaults_to_noop() {
    struct Bare;

    #[async_trait::async_trait]
    impl LocalStore for Bare {
        async fn list_tasks(
            &self,
            _filter: &LocalFilter,
        ) -> Result<Vec<LocalTask>, ClientError> {
            Ok(vec![])
        }
        async fn get_task(
            &self,
            uuid: &str,
        ) -> Result<LocalTask, ClientError> {
            Err(ClientError::NotFound(uuid.into()))
        }
        async fn create_task(
            &self,
            update: &LocalUpdate,
        ) -> Result<LocalTask, ClientError> {
            Ok(local_task("u", &update.description, Utc::now()))
        }
        async fn save(&self, _uuid: &str, _update: &LocalUpdate) -> Result<(), ClientError> {
            Ok(())
        }
        async fn start(&self, _uuid: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn stop(&self, _uuid: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn complete(&self, _uuid: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn delete(&self, _uuid: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    assert!(Bare.sync_ledger().await.is_ok());
    assert!(Bare.get_task("missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn fake_board_reports_auth_failures() {
    let board = FakeBoard::new().with_auth_failure();
    let err = board.get_task(1).await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn fake_board_missing_task_is_not_found() {
    let board = FakeBoard::new();
    board.insert(remote_task(5, "Write report", 1, sync_epoch()));
    assert!(board.get_task(5).await.is_ok());
    assert!(board.get_task(6).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn fake_mutation_log_skips_reads() {
    let local = FakeLocal::new();
    local.insert(local_task("u1", "Write report", Utc::now()));
    local.get_task("u1").await.unwrap();
    local
        .save(
            "u1",
            &LocalUpdate {
                description: "Write final report".into(),
                project: "Work".into(),
                due: None,
                wait: WaitChange::Keep,
                swimlane: None,
                category: None,
            },
        )
        .await
        .unwrap();
    local.start("u1").await.unwrap();

    assert_eq!(local.mutations(), vec!["save u1", "start u1"]);
    let task = local.task("u1").unwrap();
    assert!(task.active);
    assert_eq!(task.description, "Write final report");
}
