//! The run engine: owns every run's lifecycle from start to terminal status.
//!
//! Each started run gets one supervised background task. That task loads the
//! catalogs, applies the output cleanup policy, plans the variant tasks and
//! fans out to a fixed number of lane workers. Lane workers execute their
//! statically assigned units strictly in planner order and report every
//! status transition through the event sink.

use chrono::Utc;
use encoding_rs::Encoding;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::{CatalogProvider, ColumnsCatalog};
use crate::config::{ExecutionConfig, OutputConfig};
use crate::datasource::SessionFactory;
use crate::events::RunEventSink;
use crate::export::{
    apply_cleanup, rewrite_projection, write_sliced, EscapeRules, RewriteContext, SlicerOptions,
};
use crate::metrics;

use super::planner::plan_tasks;
use super::status::{aggregate_group, aggregate_run, aggregate_script};
use super::types::{ExportMode, Run, RunSelection, ScriptSelection, Status, UserContext, VariantTask};

/// Why a run's background execution stopped early.
enum RunAbort {
    Cancelled,
    Fault(anyhow::Error),
}

fn fault<E: Into<anyhow::Error>>(e: E) -> RunAbort {
    RunAbort::Fault(e.into())
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Queued => "queued",
        Status::Running => "running",
        Status::Success => "success",
        Status::NoData => "no_data",
        Status::Failed => "failed",
        Status::Cancelled => "cancelled",
    }
}

/// Bookkeeping about the most recently finished run, consumed by the
/// cleanup policy at the start of the next run.
#[derive(Debug, Clone)]
struct LastRun {
    run_id: String,
    succeeded: bool,
}

/// Run orchestration engine. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct RunEngine {
    output: OutputConfig,
    execution: ExecutionConfig,
    encoding: &'static Encoding,
    catalog: Arc<dyn CatalogProvider>,
    sessions: Arc<dyn SessionFactory>,
    events: Arc<dyn RunEventSink>,
    runs: Arc<RwLock<HashMap<String, Run>>>,
    cancel_tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
    last_run: Arc<RwLock<Option<LastRun>>>,
    shutdown: CancellationToken,
}

impl RunEngine {
    pub fn new(
        output: OutputConfig,
        execution: ExecutionConfig,
        catalog: Arc<dyn CatalogProvider>,
        sessions: Arc<dyn SessionFactory>,
        events: Arc<dyn RunEventSink>,
    ) -> Self {
        let encoding =
            Encoding::for_label(output.encoding.as_bytes()).unwrap_or(encoding_rs::UTF_8);
        Self {
            output,
            execution,
            encoding,
            catalog,
            sessions,
            events,
            runs: Arc::new(RwLock::new(HashMap::new())),
            cancel_tokens: Arc::new(RwLock::new(HashMap::new())),
            last_run: Arc::new(RwLock::new(None)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts a run and returns it in Queued state. Execution continues in a
    /// background task; failures there never propagate to this caller.
    pub async fn start_run(&self, user_context: UserContext, selection: RunSelection) -> Run {
        let run_id = Uuid::new_v4().simple().to_string();
        info!(
            run_id,
            login = %user_context.login,
            database_id = %user_context.database_id,
            manager_id = %user_context.manager_id,
            stream_id = %user_context.stream_id,
            "run start requested"
        );

        let token = self.shutdown.child_token();
        self.cancel_tokens
            .write()
            .await
            .insert(run_id.clone(), token.clone());

        let now = Utc::now();
        let mut run = Run {
            run_id: run_id.clone(),
            user_context,
            selection,
            status: Status::Queued,
            group_statuses: HashMap::new(),
            script_statuses: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        for group in run.selection.groups.iter().filter(|g| g.enabled) {
            run.group_statuses
                .insert(group.group_id.clone(), Status::Queued);
            let scripts = run
                .script_statuses
                .entry(group.group_id.clone())
                .or_default();
            for script in group.scripts.iter().filter(|s| s.enabled) {
                scripts.insert(script.script_id.clone(), Status::Queued);
            }
        }
        self.runs.write().await.insert(run_id.clone(), run.clone());

        info!(
            run_id,
            enabled_groups = run.group_statuses.len(),
            lane_count = self.execution.lane_count,
            "run queued"
        );
        metrics::RUNS_STARTED.inc();
        self.events.run_status_changed(&run_id, Status::Queued).await;

        let engine = self.clone();
        let spawned_run_id = run_id.clone();
        tokio::spawn(async move {
            engine.execute_run(spawned_run_id, token).await;
        });

        run
    }

    /// Returns a snapshot of a run, or None if the id is unknown.
    pub async fn get_run(&self, run_id: &str) -> Option<Run> {
        self.runs.read().await.get(run_id).cloned()
    }

    /// Lists snapshots of all runs held in memory.
    pub async fn list_runs(&self) -> Vec<Run> {
        let mut runs: Vec<Run> = self.runs.read().await.values().cloned().collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs
    }

    /// Requests cancellation. Returns false when the run is unknown or has
    /// already reached a terminal status.
    ///
    /// Marking is optimistic: group and script statuses flip to Cancelled
    /// immediately, before in-flight units actually observe the signal.
    pub async fn cancel_run(&self, run_id: &str) -> bool {
        let token = self.cancel_tokens.read().await.get(run_id).cloned();
        {
            let mut runs = self.runs.write().await;
            let Some(run) = runs.get_mut(run_id) else {
                return false;
            };
            if run.status.is_terminal() {
                return false;
            }
            let Some(token) = token else {
                return false;
            };
            info!(run_id, status = ?run.status, "cancel requested");
            token.cancel();

            run.status = Status::Cancelled;
            run.updated_at = Utc::now();
            for status in run.group_statuses.values_mut() {
                *status = Status::Cancelled;
            }
            for scripts in run.script_statuses.values_mut() {
                for status in scripts.values_mut() {
                    *status = Status::Cancelled;
                }
            }
        }

        let events = Arc::clone(&self.events);
        let run_id = run_id.to_string();
        tokio::spawn(async move {
            events.run_status_changed(&run_id, Status::Cancelled).await;
        });
        true
    }

    /// Cancels every active run. Used on process shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Supervises one run's background execution and guarantees exactly one
    /// terminal transition, whatever the lanes did.
    async fn execute_run(self, run_id: String, token: CancellationToken) {
        let started = Instant::now();
        metrics::RUNS_ACTIVE.inc();

        let outcome = self.drive_run(&run_id, &token).await;
        match outcome {
            Ok(()) => {}
            Err(RunAbort::Cancelled) => {
                self.mark_run_cancelled(&run_id).await;
                self.record_last_run(&run_id, false).await;
                // Delivered regardless of the cancelled token.
                self.events
                    .run_status_changed(&run_id, Status::Cancelled)
                    .await;
                warn!(run_id, "run cancelled");
            }
            Err(RunAbort::Fault(e)) => {
                self.mark_run_failed(&run_id).await;
                self.record_last_run(&run_id, false).await;
                error!(run_id, error = %e, "run failed with unhandled error");
                self.events.run_status_changed(&run_id, Status::Failed).await;
            }
        }

        let final_status = self
            .get_run(&run_id)
            .await
            .map(|r| r.status)
            .unwrap_or(Status::Failed);
        metrics::RUNS_ACTIVE.dec();
        metrics::RUNS_COMPLETED
            .with_label_values(&[status_label(final_status)])
            .inc();
        metrics::RUN_DURATION
            .with_label_values(&[status_label(final_status)])
            .observe(started.elapsed().as_secs_f64());

        self.cancel_tokens.write().await.remove(&run_id);
    }

    async fn drive_run(&self, run_id: &str, token: &CancellationToken) -> Result<(), RunAbort> {
        info!(run_id, "reading scripts and columns catalogs");
        let scripts = self.catalog.scripts().await.map_err(fault)?;
        let columns = Arc::new(self.catalog.columns().await.map_err(fault)?);

        {
            let last = self.last_run.read().await.clone();
            let (last_id, last_ok) = match &last {
                Some(l) => (Some(l.run_id.as_str()), l.succeeded),
                None => (None, false),
            };
            info!(
                run_id,
                policy = ?self.output.cleanup_policy,
                root = %self.output.root_path.display(),
                "applying output cleanup policy"
            );
            apply_cleanup(&self.output.root_path, self.output.cleanup_policy, last_id, last_ok)
                .await
                .map_err(fault)?;
        }

        let (selection, database_id) = {
            let runs = self.runs.read().await;
            let run = runs.get(run_id).ok_or_else(|| {
                fault(anyhow::anyhow!("run {run_id} missing from registry"))
            })?;
            (
                Arc::new(run.selection.clone()),
                run.user_context.database_id.clone(),
            )
        };

        let tasks = plan_tasks(&selection, &scripts);
        info!(run_id, total_variants = tasks.len(), "tasks planned");

        let lane_count = self.execution.lane_count;
        let mut by_lane: HashMap<usize, Vec<VariantTask>> = HashMap::new();
        for task in tasks {
            by_lane.entry(task.lane).or_default().push(task);
        }
        for (lane, stranded) in by_lane.iter().filter(|(lane, _)| **lane >= lane_count) {
            warn!(
                run_id,
                lane,
                tasks = stranded.len(),
                lane_count,
                "tasks assigned to a lane outside the configured range will not run"
            );
        }

        self.set_run_status(run_id, Status::Running).await;
        self.events.run_status_changed(run_id, Status::Running).await;
        info!(run_id, "run running");

        let mut lanes = JoinSet::new();
        for lane in 0..lane_count {
            let list = by_lane.remove(&lane).unwrap_or_default();
            let engine = self.clone();
            let run_id = run_id.to_string();
            let selection = Arc::clone(&selection);
            let columns = Arc::clone(&columns);
            let database_id = database_id.clone();
            let token = token.clone();
            lanes.spawn(async move {
                engine
                    .run_lane(&run_id, lane, list, &selection, &columns, &database_id, &token)
                    .await
            });
        }

        let mut cancelled = false;
        let mut first_fault: Option<anyhow::Error> = None;
        while let Some(joined) = lanes.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(RunAbort::Cancelled)) => cancelled = true,
                Ok(Err(RunAbort::Fault(e))) => {
                    if first_fault.is_none() {
                        first_fault = Some(e);
                    }
                }
                Err(join_error) => {
                    if first_fault.is_none() {
                        first_fault = Some(join_error.into());
                    }
                }
            }
        }
        if cancelled {
            return Err(RunAbort::Cancelled);
        }
        if let Some(e) = first_fault {
            return Err(RunAbort::Fault(e));
        }

        let (final_status, group_snapshot) = {
            let mut runs = self.runs.write().await;
            let run = runs.get_mut(run_id).ok_or_else(|| {
                fault(anyhow::anyhow!("run {run_id} missing from registry"))
            })?;
            let group_ids: Vec<String> = run.group_statuses.keys().cloned().collect();
            for group_id in &group_ids {
                let script_statuses: Vec<Status> = run
                    .script_statuses
                    .get(group_id)
                    .map(|m| m.values().copied().collect())
                    .unwrap_or_default();
                run.group_statuses
                    .insert(group_id.clone(), aggregate_group(script_statuses));
            }
            let status = aggregate_run(run.group_statuses.values().copied());
            run.status = status;
            run.updated_at = Utc::now();
            let snapshot: Vec<(String, Status)> = run
                .selection
                .groups
                .iter()
                .filter(|g| g.enabled)
                .filter_map(|g| {
                    run.group_statuses
                        .get(&g.group_id)
                        .map(|s| (g.group_id.clone(), *s))
                })
                .collect();
            (status, snapshot)
        };

        self.record_last_run(run_id, final_status == Status::Success)
            .await;
        for (group_id, status) in &group_snapshot {
            self.events
                .group_status_changed(run_id, group_id, *status)
                .await;
        }
        self.events.run_status_changed(run_id, final_status).await;
        info!(run_id, status = ?final_status, "run finished");
        Ok(())
    }

    /// Drains one lane's tasks strictly in planner order.
    #[allow(clippy::too_many_arguments)]
    async fn run_lane(
        &self,
        run_id: &str,
        lane: usize,
        tasks: Vec<VariantTask>,
        selection: &RunSelection,
        columns: &ColumnsCatalog,
        database_id: &str,
        token: &CancellationToken,
    ) -> Result<(), RunAbort> {
        if tasks.is_empty() {
            return Ok(());
        }
        info!(run_id, lane, tasks = tasks.len(), "lane start");

        // All variants of a script run in this lane, so the per-script
        // outcome lists need no cross-lane synchronization.
        let mut outcomes: HashMap<(String, String), Vec<Status>> = HashMap::new();

        for task in &tasks {
            if token.is_cancelled() {
                return Err(RunAbort::Cancelled);
            }
            let Some(script_sel) = selection.enabled_script(&task.group_id, &task.script_id)
            else {
                continue;
            };

            let progress = format!(
                "Executing variant {}/{}",
                task.variant_index + 1,
                task.variant_count
            );
            self.events
                .script_status_changed(
                    run_id,
                    &task.group_id,
                    &task.script_id,
                    Status::Running,
                    Some(&progress),
                )
                .await;

            info!(
                run_id,
                group_id = %task.group_id,
                script_id = %task.script_id,
                variant_id = %task.variant_id,
                lane,
                idx = task.variant_index + 1,
                "executing variant"
            );
            let status = self
                .execute_variant(run_id, task, script_sel, columns, database_id, token)
                .await?;
            metrics::VARIANTS_EXECUTED
                .with_label_values(&[status_label(status)])
                .inc();
            info!(
                run_id,
                group_id = %task.group_id,
                script_id = %task.script_id,
                variant_id = %task.variant_id,
                status = ?status,
                "variant executed"
            );

            let key = (task.group_id.clone(), task.script_id.clone());
            let list = outcomes.entry(key).or_default();
            list.push(status);
            if list.len() == task.variant_count {
                let aggregated = aggregate_script(list);
                {
                    let mut runs = self.runs.write().await;
                    if let Some(run) = runs.get_mut(run_id) {
                        if let Some(scripts) = run.script_statuses.get_mut(&task.group_id) {
                            scripts.insert(task.script_id.clone(), aggregated);
                        }
                        run.updated_at = Utc::now();
                    }
                }
                self.events
                    .script_status_changed(
                        run_id,
                        &task.group_id,
                        &task.script_id,
                        aggregated,
                        None,
                    )
                    .await;
                info!(
                    run_id,
                    group_id = %task.group_id,
                    script_id = %task.script_id,
                    status = ?aggregated,
                    "script aggregated"
                );
            }
        }

        info!(run_id, lane, "lane done");
        Ok(())
    }

    /// Executes one variant: resolve SQL, optionally rewrite the projection,
    /// query, and write sliced output.
    ///
    /// Unit-level failures come back as `Ok(Status::Failed)`; only datasource
    /// and output-write faults abort the whole run.
    async fn execute_variant(
        &self,
        run_id: &str,
        task: &VariantTask,
        script_sel: &ScriptSelection,
        columns: &ColumnsCatalog,
        database_id: &str,
        token: &CancellationToken,
    ) -> Result<Status, RunAbort> {
        let _timer = metrics::VARIANT_DURATION.with_label_values(&[]).start_timer();

        let sql_path = self.output.scripts_root.join(&task.sql_file);
        let sql = match tokio::fs::read_to_string(&sql_path).await {
            Ok(sql) => sql,
            Err(e) => {
                error!(run_id, path = %sql_path.display(), error = %e, "sql file not readable");
                return Ok(Status::Failed);
            }
        };

        let sql = if script_sel.export_mode == ExportMode::CustomColumns
            && !script_sel.selected_column_item_ids.is_empty()
        {
            let profile = task
                .columns_profile_id
                .as_deref()
                .and_then(|id| columns.profile(id));
            match profile {
                Some(profile) => {
                    let context = RewriteContext {
                        selected_column_item_ids: script_sel.selected_column_item_ids.clone(),
                        id_to_expression: profile
                            .items
                            .iter()
                            .map(|item| (item.id.clone(), item.expression.clone()))
                            .collect(),
                        delimiter: columns.serialization.delimiter.clone(),
                        escape: EscapeRules {
                            backslash: columns.serialization.escape.backslash.clone(),
                            pipe: columns.serialization.escape.pipe.clone(),
                            cr: columns.serialization.escape.cr.clone(),
                            lf: columns.serialization.escape.lf.clone(),
                        },
                    };
                    match rewrite_projection(&sql, Some(&context)) {
                        Ok(sql) => sql,
                        Err(e) => {
                            error!(
                                run_id,
                                group_id = %task.group_id,
                                script_id = %task.script_id,
                                variant_id = %task.variant_id,
                                error = %e,
                                "sql rewrite failed"
                            );
                            return Ok(Status::Failed);
                        }
                    }
                }
                // Unknown profile falls back to the unmodified SQL.
                None => sql,
            }
        } else {
            sql
        };

        let session = self
            .sessions
            .create_session(database_id)
            .await
            .map_err(fault)?;
        let mut stream = session.execute_query(&sql).await.map_err(fault)?;

        let mut lines = Vec::new();
        loop {
            tokio::select! {
                _ = token.cancelled() => return Err(RunAbort::Cancelled),
                next = stream.next() => match next {
                    Some(Ok(line)) => lines.push(line),
                    Some(Err(e)) => return Err(fault(e)),
                    None => break,
                },
            }
        }

        if lines.is_empty() {
            info!(
                run_id,
                group_id = %task.group_id,
                script_id = %task.script_id,
                variant_id = %task.variant_id,
                "variant produced no data"
            );
            return Ok(Status::NoData);
        }

        let base_path = self
            .output
            .root_path
            .join(run_id)
            .join(&task.group_id)
            .join(&task.script_id)
            .join(&task.variant_id);
        let report = write_sliced(
            &base_path,
            &lines,
            SlicerOptions {
                encoding: self.encoding,
                max_file_bytes: self.output.max_file_bytes,
                allow_oversize_single_line: self.output.allow_oversize_single_line,
            },
        )
        .await
        .map_err(fault)?;
        info!(
            run_id,
            base_path = %base_path.display(),
            parts = report.parts,
            lines = report.lines,
            bytes = report.bytes,
            "variant output written"
        );
        metrics::LINES_EXPORTED.inc_by(report.lines);

        Ok(Status::Success)
    }

    async fn set_run_status(&self, run_id: &str, status: Status) {
        let mut runs = self.runs.write().await;
        if let Some(run) = runs.get_mut(run_id) {
            run.status = status;
            run.updated_at = Utc::now();
        }
    }

    async fn mark_run_failed(&self, run_id: &str) {
        self.set_run_status(run_id, Status::Failed).await;
    }

    async fn mark_run_cancelled(&self, run_id: &str) {
        let mut runs = self.runs.write().await;
        if let Some(run) = runs.get_mut(run_id) {
            run.status = Status::Cancelled;
            run.updated_at = Utc::now();
            for status in run.group_statuses.values_mut() {
                *status = Status::Cancelled;
            }
            for scripts in run.script_statuses.values_mut() {
                for status in scripts.values_mut() {
                    *status = Status::Cancelled;
                }
            }
        }
    }

    async fn record_last_run(&self, run_id: &str, succeeded: bool) {
        *self.last_run.write().await = Some(LastRun {
            run_id: run_id.to_string(),
            succeeded,
        });
    }
}
