pub mod changeset;
pub mod daemon;
pub mod purge;
pub mod reconcile;
pub mod to_local;
pub mod to_remote;

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, Offset, Utc};
use tracing::{debug, error, info, warn};

use crate::clients::{BoardConnector, Connection, LocalStore, RemoteBoard};
use crate::error::SyncError;
use crate::model::board::TaskQuery;
use crate::model::local::LocalFilter;
use crate::model::project::ProjectSyncConfig;
use crate::store::Store;
use changeset::ChangeSet;
use reconcile::Reconciler;

/// Clock and timezone the translators evaluate date rules against.
#[derive(Debug, Clone, Copy)]
pub struct TranslateContext {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl TranslateContext {
    /// The wall clock in the machine's timezone.
    pub fn current() -> Self {
        let now = Local::now();
        Self {
            now: now.with_timezone(&Utc),
            offset: now.offset().fix(),
        }
    }

    pub fn at(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now)
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Same ISO week of the same ISO year.
    pub fn same_iso_week(&self, a: NaiveDate, b: NaiveDate) -> bool {
        a.iso_week() == b.iso_week()
    }

    pub fn format_remote_due(&self, due: DateTime<Utc>) -> String {
        due.with_timezone(&self.offset)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Decide and log, but call nothing that mutates and persist nothing.
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum ProjectOutcome {
    Synced { pairs: usize },
    Skipped { reason: String },
    Failed { error: SyncError },
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub projects: Vec<(String, ProjectOutcome)>,
}

impl CycleReport {
    pub fn has_failures(&self) -> bool {
        self.projects
            .iter()
            .any(|(_, outcome)| matches!(outcome, ProjectOutcome::Failed { .. }))
    }

    /// A board or task store refused credentials or a request this cycle.
    pub fn has_client_failure(&self) -> bool {
        self.projects.iter().any(|(_, outcome)| {
            matches!(outcome, ProjectOutcome::Failed { error } if error.is_client_failure())
        })
    }
}

/// Runs one reconciliation pass for a single project.
///
/// Each pair's bookmark is committed as soon as the pair is done; the first
/// pair that fails aborts the project and leaves its cursor untouched.
pub async fn sync_project(
    store: &Store,
    project: &ProjectSyncConfig,
    remote: &dyn RemoteBoard,
    local: &dyn LocalStore,
    opts: SyncOptions,
) -> Result<usize, SyncError> {
    let cycle_start = Utc::now();
    let ctx = TranslateContext::current();
    let collection = project.collection();

    if project.run_ledger_sync {
        if opts.dry_run {
            info!(project = %project.name, "[dry-run] would sync the local ledger");
        } else {
            debug!(project = %project.name, "syncing local ledger");
            if let Err(err) = local.sync_ledger().await {
                warn!(project = %project.name, error = %err, "Local ledger sync failed, continuing");
            }
        }
    }

    let query = TaskQuery {
        modified_since: project.last_sync,
        assignee: project.assignee.as_ref().map(|a| a.name.clone()),
    };
    let remote_changes = remote.search_tasks(project.project_id, &query).await?;
    let local_changes = local
        .list_tasks(&LocalFilter {
            project: project.name.clone(),
            modified_after: project.last_sync,
        })
        .await?;
    debug!(
        project = %project.name,
        remote = remote_changes.len(),
        local = local_changes.len(),
        "fetched changes since {}",
        project.last_sync
    );

    let pairs = store.pairs(&collection)?;
    let changes = ChangeSet::build(local_changes, remote_changes, &pairs);
    if changes.is_empty() {
        debug!(project = %project.name, "nothing changed");
    }
    let reconciler = Reconciler::new(remote, local, project, opts.dry_run);

    let mut synced = 0;
    for candidate in changes.candidates() {
        let pair = reconciler.reconcile(candidate, &changes, &ctx).await?;
        if !opts.dry_run {
            store.upsert_pair(&collection, &pair)?;
        }
        synced += 1;
    }

    if !opts.dry_run {
        store.set_project_last_sync(&project.name, cycle_start)?;
    }
    info!(project = %project.name, pairs = synced, "Project synced");
    Ok(synced)
}

/// Visits every configured project (or just `filter`) once, in order.
pub async fn sync_projects(
    store: &Store,
    connector: &dyn BoardConnector,
    local: &dyn LocalStore,
    filter: Option<&str>,
    opts: SyncOptions,
) -> Result<CycleReport, SyncError> {
    let projects = match filter {
        Some(name) => vec![store
            .project(name)?
            .ok_or_else(|| SyncError::ProjectNotConfigured(name.to_string()))?],
        None => store.list_projects()?,
    };

    let mut report = CycleReport::default();
    for project in projects {
        let outcome = match connector.connect(&project).await {
            Connection::Unavailable(reason) => {
                warn!(project = %project.name, %reason, "Board unreachable, skipping project");
                ProjectOutcome::Skipped { reason }
            }
            Connection::Connected(remote) => {
                match sync_project(store, &project, remote.as_ref(), local, opts).await {
                    Ok(pairs) => ProjectOutcome::Synced { pairs },
                    Err(err) if err.is_unreachable() => {
                        warn!(project = %project.name, error = %err, "Board became unreachable, skipping project");
                        ProjectOutcome::Skipped {
                            reason: err.to_string(),
                        }
                    }
                    Err(err) => {
                        error!(project = %project.name, error = %err, "Project sync failed");
                        ProjectOutcome::Failed { error: err }
                    }
                }
            }
        };
        report.projects.push((project.name.clone(), outcome));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::fake::{local_task, remote_task, FakeBoard, FakeConnector, FakeLocal};
    use crate::model::mapping::{RemoteRef, VirtualTag};
    use crate::util::dates::sync_epoch;
    use chrono::{Duration, TimeZone};

    fn project() -> ProjectSyncConfig {
        let mut project = ProjectSyncConfig::new("Work", "https://kb/jsonrpc.php", 1);
        let columns = &mut project.mapping.columns;
        columns.insert("column", VirtualTag::Waiting, RemoteRef::new(1, "Backlog")).unwrap();
        columns.insert("column", VirtualTag::Active, RemoteRef::new(2, "Doing")).unwrap();
        columns.insert("column", VirtualTag::Completed, RemoteRef::new(5, "Done")).unwrap();
        project
            .mapping
            .swimlanes
            .insert("swimlane", "office".into(), RemoteRef::new(1, "Office"))
            .unwrap();
        project
    }

    fn setup() -> (Store, FakeBoard, FakeLocal) {
        let store = Store::open_in_memory().unwrap();
        store.save_project(&project()).unwrap();
        (store, FakeBoard::new(), FakeLocal::new())
    }

    fn connector(board: &FakeBoard) -> FakeConnector {
        FakeConnector {
            board: board.clone(),
            reachable: true,
        }
    }

    #[test]
    fn iso_week_compares_year_too() {
        let ctx = TranslateContext::at(Utc::now(), FixedOffset::east_opt(0).unwrap());
        let a = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let b = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        // both are in ISO week 1 of 2025
        assert!(ctx.same_iso_week(a, b));
        let c = NaiveDate::from_ymd_opt(2023, 1, 4).unwrap();
        assert!(!ctx.same_iso_week(b, c));
    }

    #[test]
    fn dates_follow_the_offset() {
        let ctx = TranslateContext::at(
            Utc.with_ymd_and_hms(2024, 6, 10, 23, 30, 0).unwrap(),
            FixedOffset::east_opt(2 * 3600).unwrap(),
        );
        assert_eq!(ctx.today(), NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
        assert_eq!(ctx.format_remote_due(ctx.now), "2024-06-11 01:30");
    }

    #[tokio::test]
    async fn second_cycle_without_edits_is_silent() {
        let (store, board, local) = setup();
        let mut task = local_task("u1", "Write report", Utc::now());
        task.swimlane = Some("office".into());
        local.insert(task);
        board.insert(remote_task(4, "Call back", 2, Utc::now()));

        let report = sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        assert!(!report.has_failures());
        assert_eq!(store.pairs("work_tasks").unwrap().len(), 2);
        assert!(!board.mutations().is_empty());

        board.clear_calls();
        local.clear_calls();
        sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        assert!(board.mutations().is_empty());
        assert!(local.mutations().is_empty());
    }

    #[tokio::test]
    async fn cursor_only_moves_forward() {
        let (store, board, local) = setup();
        assert_eq!(store.project("Work").unwrap().unwrap().last_sync, sync_epoch());

        let before = Utc::now();
        sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        let first = store.project("Work").unwrap().unwrap().last_sync;
        assert!(first >= before - Duration::seconds(1));

        sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        let second = store.project("Work").unwrap().unwrap().last_sync;
        assert!(second >= first);
    }

    #[tokio::test]
    async fn conflict_produces_exactly_one_copy_across_cycles() {
        let (store, board, local) = setup();
        let mut task = local_task("u1", "Write report", Utc::now());
        task.swimlane = Some("office".into());
        local.insert(task);
        sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        let remote_id = store.pairs("work_tasks").unwrap()[0].remote_id.unwrap();

        // edit both sides after the bookmark
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let mut edited = local.task("u1").unwrap();
        edited.description = "Write final report".into();
        edited.modified = Utc::now() + Duration::seconds(5);
        local.insert(edited);
        let mut remote = board.task(remote_id).unwrap();
        remote.title = "Write the report".into();
        remote.modified = Utc::now() + Duration::seconds(5);
        board.insert(remote);

        board.clear_calls();
        sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        let duplicates = board
            .mutations()
            .into_iter()
            .filter(|c| c.starts_with("duplicate"))
            .count();
        assert_eq!(duplicates, 1);
        assert_eq!(board.task(remote_id).unwrap().title, "Write final report");

        board.clear_calls();
        sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        assert!(board.mutations().is_empty());
    }

    #[tokio::test]
    async fn dry_run_mutates_and_persists_nothing() {
        let (store, board, local) = setup();
        let mut task = local_task("u1", "Write report", Utc::now());
        task.swimlane = Some("office".into());
        local.insert(task);
        board.insert(remote_task(4, "Call back", 2, Utc::now()));

        let report = sync_projects(
            &store,
            &connector(&board),
            &local,
            Some("Work"),
            SyncOptions { dry_run: true },
        )
        .await
        .unwrap();
        assert!(matches!(report.projects[0].1, ProjectOutcome::Synced { pairs: 2 }));
        assert!(board.mutations().is_empty());
        assert!(local.mutations().is_empty());
        assert!(store.pairs("work_tasks").unwrap().is_empty());
        assert_eq!(store.project("Work").unwrap().unwrap().last_sync, sync_epoch());
    }

    #[tokio::test]
    async fn unreachable_board_skips_project() {
        let (store, board, local) = setup();
        let offline = FakeConnector {
            board: board.clone(),
            reachable: false,
        };
        let report = sync_projects(&store, &offline, &local, None, SyncOptions::default())
            .await
            .unwrap();
        assert!(matches!(report.projects[0].1, ProjectOutcome::Skipped { .. }));
        assert!(!report.has_failures());
        assert!(board.calls().is_empty());
        assert!(local.calls().is_empty());
    }

    #[tokio::test]
    async fn auth_failure_is_reported_and_cursor_kept() {
        let (store, board, local) = setup();
        let board = board.with_auth_failure();
        let report = sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        assert!(report.has_client_failure());
        assert_eq!(store.project("Work").unwrap().unwrap().last_sync, sync_epoch());
    }

    #[tokio::test]
    async fn rejected_create_is_a_client_failure() {
        let (store, board, local) = setup();
        let board = board.with_rejected_creates();
        local.insert(local_task("u1", "Write report", Utc::now()));

        let report = sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        assert!(report.has_client_failure());
        assert!(store.pairs("work_tasks").unwrap().is_empty());
        assert_eq!(store.project("Work").unwrap().unwrap().last_sync, sync_epoch());
    }

    #[tokio::test]
    async fn failing_pair_aborts_project() {
        let (store, board, local) = setup();
        let mut bad = remote_task(4, "Call back", 2, Utc::now());
        bad.swimlane_id = 99;
        board.insert(bad);

        let report = sync_projects(&store, &connector(&board), &local, None, SyncOptions::default())
            .await
            .unwrap();
        assert!(report.has_failures());
        assert!(!report.has_client_failure());
        assert_eq!(store.project("Work").unwrap().unwrap().last_sync, sync_epoch());
    }

    #[tokio::test]
    async fn unknown_project_filter_is_an_error() {
        let (store, board, local) = setup();
        let err = sync_projects(&store, &connector(&board), &local, Some("Home"), SyncOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ProjectNotConfigured(_)));
    }
}
