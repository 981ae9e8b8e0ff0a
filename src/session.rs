//! Report session: owns the query state, the group tree and the per-node
//! fetches, and assembles the dense report grid.
//!
//! Every fetch runs as its own task and reports back over a channel. The
//! session is the only writer of the registry and the tree; a result is
//! applied only if it belongs to the fetch currently tracked for its
//! `(group, kind)` key and that fetch's query is still the active one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dates::derive_dates;
use crate::error::{ReportError, Result};
use crate::lookup::LookupTable;
use crate::models::{AttendanceStatus, GroupReport, GroupSummary, ReportQuery, TimeSlot};
use crate::query::{QueryPatch, ReportQueryState};
use crate::registry::{GroupLoadingRegistry, RowStatus};
use crate::row::{self, GridAxes, ReportGrid, RowSource};
use crate::source::ReportSource;
use crate::tree::{ExpandOutcome, GroupTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// Group aggregate counts.
    Group,
    /// Per-user breakdown of a users group.
    Users,
}

type FetchKey = (String, FetchKind);

struct FetchEvent {
    key: FetchKey,
    ticket: u64,
    result: Result<GroupReport>,
}

struct InFlight {
    ticket: u64,
    query: ReportQuery,
    handle: JoinHandle<()>,
}

struct RowData {
    query: ReportQuery,
    report: Arc<GroupReport>,
    table: LookupTable,
}

pub struct ReportSession<S: ReportSource> {
    source: Arc<S>,
    query: ReportQueryState,
    tree: Option<GroupTree>,
    registry: GroupLoadingRegistry,
    user_registry: GroupLoadingRegistry,
    rows: HashMap<FetchKey, RowData>,
    in_flight: HashMap<FetchKey, InFlight>,
    next_ticket: u64,
    root_report: Option<Arc<GroupReport>>,
    events_tx: mpsc::UnboundedSender<FetchEvent>,
    events_rx: mpsc::UnboundedReceiver<FetchEvent>,
}

impl<S: ReportSource> ReportSession<S> {
    pub fn new(source: Arc<S>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            source,
            query: ReportQueryState::new(),
            tree: None,
            registry: GroupLoadingRegistry::new(),
            user_registry: GroupLoadingRegistry::new(),
            rows: HashMap::new(),
            in_flight: HashMap::new(),
            next_ticket: 0,
            root_report: None,
            events_tx,
            events_rx,
        }
    }

    pub fn query_state(&self) -> &ReportQueryState {
        &self.query
    }

    pub fn tree(&self) -> Option<&GroupTree> {
        self.tree.as_ref()
    }

    pub fn registry(&self) -> &GroupLoadingRegistry {
        &self.registry
    }

    pub fn root_report(&self) -> Option<&GroupReport> {
        self.root_report.as_deref()
    }

    /// Latest accepted report for a group.
    pub fn report(&self, group_id: &str, kind: FetchKind) -> Option<&GroupReport> {
        self.rows
            .get(&(group_id.to_string(), kind))
            .map(|data| data.report.as_ref())
    }

    pub fn pending_fetches(&self) -> usize {
        self.in_flight.len()
    }

    /// Merge `patch` into the filter and refetch every visible node whose
    /// query changed.
    pub fn update_query(&mut self, patch: QueryPatch) {
        let revision = self.query.update_query(patch);
        debug!(revision, "report query updated");
        self.refetch_visible();
    }

    /// Select a new root. The previous tree is discarded along with any
    /// fetches still running for it.
    pub fn set_root_group(&mut self, summary: GroupSummary) {
        info!(group_id = %summary.id, name = %summary.name, "selecting root group");

        let aborted: Vec<FetchKey> = self
            .in_flight
            .drain()
            .map(|(key, flight)| {
                flight.handle.abort();
                key
            })
            .collect();
        for (group_id, kind) in aborted {
            self.registry_for(kind)
                .set_group_loading_state(&group_id, false, None);
        }

        self.query.set_root_group(summary.clone());
        self.tree = Some(GroupTree::new(summary.clone()));
        self.root_report = None;
        self.request(&summary.id, FetchKind::Group);
    }

    /// Expand a node from its latest report: subgroups become child nodes,
    /// a users group reveals its per-user rows.
    pub fn expand(&mut self, node: NodeId) -> Result<ExpandOutcome> {
        let tree = self
            .tree
            .as_mut()
            .ok_or(ReportError::UnknownNode(node.index()))?;
        let group_id = tree
            .node(node)
            .ok_or(ReportError::UnknownNode(node.index()))?
            .group_id
            .clone();
        let report = self
            .rows
            .get(&(group_id.clone(), FetchKind::Group))
            .map(|data| Arc::clone(&data.report))
            .ok_or_else(|| ReportError::NotLoaded(group_id.clone()))?;

        let outcome = tree.expand(node, &report.group)?;
        match &outcome {
            ExpandOutcome::Groups(children) => {
                debug!(%group_id, children = children.len(), "expanded subgroups");
                let child_ids = self.group_ids(children);
                for child in child_ids {
                    self.request(&child, FetchKind::Group);
                }
                self.cancel_detached();
            }
            ExpandOutcome::Users => {
                debug!(%group_id, "showing users");
                self.request(&group_id, FetchKind::Users);
            }
            ExpandOutcome::Nothing => debug!(%group_id, "nothing to expand"),
        }

        Ok(outcome)
    }

    /// Wait for one fetch result and apply it. Returns `false` once nothing
    /// is in flight.
    pub async fn next_event(&mut self) -> bool {
        if self.in_flight.is_empty() {
            return false;
        }
        match self.events_rx.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    /// Apply results until every outstanding fetch has landed.
    pub async fn settle(&mut self) {
        while self.next_event().await {}
    }

    /// Dates for the shared column axis, derived from the root report.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let (Some(tree), Some(root_report)) = (&self.tree, &self.root_report) else {
            return Vec::new();
        };
        if root_report.group.id != tree.root_group_id() {
            return Vec::new();
        }

        let form = self.query.form();
        derive_dates(
            &root_report.day_reports,
            form.start_date,
            form.end_date,
            form.days_of_week.as_deref(),
        )
    }

    pub fn time_slots(&self) -> &[TimeSlot] {
        self.root_report
            .as_ref()
            .map(|report| report.time_slots.as_slice())
            .unwrap_or(&[])
    }

    pub fn attendance_statuses(&self) -> &[AttendanceStatus] {
        self.root_report
            .as_ref()
            .map(|report| report.attendance_statuses.as_slice())
            .unwrap_or(&[])
    }

    pub fn axes(&self) -> GridAxes {
        GridAxes {
            dates: self.dates(),
            time_slots: self.time_slots().to_vec(),
            statuses: self.attendance_statuses().to_vec(),
        }
    }

    /// Visible rows in pre-order against the shared axes.
    pub fn grid(&self) -> ReportGrid {
        let axes = self.axes();
        let Some(tree) = &self.tree else {
            return ReportGrid {
                axes,
                ..Default::default()
            };
        };

        let mut rows = Vec::new();
        for id in tree.visible() {
            let Some(node) = tree.node(id) else { continue };

            let source = self.row_source(&node.group_id, FetchKind::Group);
            let status = self.registry.status(&node.group_id);
            rows.push(row::group_row(node, status, source, &axes));

            if node.show_users() {
                let source = self.row_source(&node.group_id, FetchKind::Users);
                let status = self.user_registry.status(&node.group_id);
                rows.extend(row::user_rows(node, status, source, &axes));
            }
        }

        ReportGrid {
            root: self.query.root_group().cloned(),
            axes,
            rows,
        }
    }

    pub fn row_status(&self, group_id: &str, kind: FetchKind) -> RowStatus<'_> {
        match kind {
            FetchKind::Group => self.registry.status(group_id),
            FetchKind::Users => self.user_registry.status(group_id),
        }
    }

    fn row_source(&self, group_id: &str, kind: FetchKind) -> Option<RowSource<'_>> {
        self.rows
            .get(&(group_id.to_string(), kind))
            .map(|data| RowSource {
                report: &data.report,
                table: &data.table,
            })
    }

    fn registry_for(&mut self, kind: FetchKind) -> &mut GroupLoadingRegistry {
        match kind {
            FetchKind::Group => &mut self.registry,
            FetchKind::Users => &mut self.user_registry,
        }
    }

    fn group_ids(&self, nodes: &[NodeId]) -> Vec<String> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        nodes
            .iter()
            .filter_map(|id| tree.node(*id))
            .map(|node| node.group_id.clone())
            .collect()
    }

    fn query_for(&self, group_id: &str, kind: FetchKind) -> ReportQuery {
        let base = self.query.get_query();
        match kind {
            FetchKind::Group => base.for_group(group_id),
            FetchKind::Users => base.for_users_of(group_id),
        }
    }

    fn refetch_visible(&mut self) {
        let Some(tree) = &self.tree else { return };

        let mut wanted = Vec::new();
        for id in tree.visible() {
            if let Some(node) = tree.node(id) {
                wanted.push((node.group_id.clone(), FetchKind::Group));
                if node.show_users() {
                    wanted.push((node.group_id.clone(), FetchKind::Users));
                }
            }
        }

        for (group_id, kind) in wanted {
            self.request(&group_id, kind);
        }
        self.cancel_detached();
    }

    /// Fetch keys for every visible node.
    fn live_keys(&self) -> HashSet<FetchKey> {
        let mut keys = HashSet::new();
        let Some(tree) = &self.tree else { return keys };
        for id in tree.visible() {
            if let Some(node) = tree.node(id) {
                keys.insert((node.group_id.clone(), FetchKind::Group));
                if node.show_users() {
                    keys.insert((node.group_id.clone(), FetchKind::Users));
                }
            }
        }
        keys
    }

    /// Abort fetches whose group is no longer reachable in the tree.
    fn cancel_detached(&mut self) {
        let live = self.live_keys();
        let detached: Vec<FetchKey> = self
            .in_flight
            .keys()
            .filter(|key| !live.contains(*key))
            .cloned()
            .collect();

        for key in detached {
            if let Some(flight) = self.in_flight.remove(&key) {
                debug!(group_id = %key.0, kind = ?key.1, ticket = flight.ticket, "cancelling fetch for detached group");
                flight.handle.abort();
                self.registry_for(key.1)
                    .set_group_loading_state(&key.0, false, None);
            }
        }
    }

    /// Start a fetch unless an identical one is running. A report already
    /// accepted for the same query is served again instead, which also
    /// clears an error left by a later failed query.
    fn request(&mut self, group_id: &str, kind: FetchKind) {
        let query = self.query_for(group_id, kind);
        let key: FetchKey = (group_id.to_string(), kind);

        if self.in_flight.get(&key).is_some_and(|flight| flight.query == query) {
            return;
        }
        if let Some(stale) = self.in_flight.remove(&key) {
            debug!(%group_id, ?kind, ticket = stale.ticket, "superseding fetch");
            stale.handle.abort();
        }

        let cached = self
            .rows
            .get(&key)
            .filter(|data| data.query == query)
            .map(|data| Arc::clone(&data.report));
        if let Some(report) = cached {
            debug!(%group_id, ?kind, "serving cached report");
            self.registry_for(kind)
                .set_group_loading_state(group_id, false, None);
            if kind == FetchKind::Group {
                self.publish_group_report(group_id, report);
            }
            return;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.registry_for(kind)
            .set_group_loading_state(group_id, true, None);
        debug!(%group_id, ?kind, ticket, "dispatching fetch");

        let source = Arc::clone(&self.source);
        let events = self.events_tx.clone();
        let task_key = key.clone();
        let task_query = query.clone();
        let handle = tokio::spawn(async move {
            let result = source.group_report(&task_query).await;
            let _ = events.send(FetchEvent {
                key: task_key,
                ticket,
                result,
            });
        });

        self.in_flight.insert(
            key,
            InFlight {
                ticket,
                query,
                handle,
            },
        );
    }

    fn apply(&mut self, event: FetchEvent) {
        let FetchEvent { key, ticket, result } = event;
        let (group_id, kind) = (key.0.clone(), key.1);

        let current = self
            .in_flight
            .get(&key)
            .is_some_and(|flight| flight.ticket == ticket);
        if !current {
            debug!(%group_id, ?kind, ticket, "discarding stale response");
            return;
        }
        let Some(flight) = self.in_flight.remove(&key) else {
            return;
        };
        if flight.query != self.query_for(&group_id, kind) {
            debug!(%group_id, ?kind, ticket, "discarding response for an old query");
            self.registry_for(kind)
                .set_group_loading_state(&group_id, false, None);
            return;
        }

        match result {
            Ok(report) => {
                let table = match kind {
                    FetchKind::Group => LookupTable::from_group_report(&report),
                    FetchKind::Users => LookupTable::from_user_reports(&report.user_reports),
                };
                debug!(%group_id, ?kind, ticket, entries = table.len(), "fetch accepted");
                let report = Arc::new(report);
                self.rows.insert(
                    key,
                    RowData {
                        query: flight.query,
                        report: Arc::clone(&report),
                        table,
                    },
                );
                self.registry_for(kind)
                    .set_group_loading_state(&group_id, false, None);

                if kind == FetchKind::Group {
                    self.publish_group_report(&group_id, report);
                }
            }
            Err(e) => {
                warn!(%group_id, ?kind, error = %e, "report fetch failed");
                self.registry_for(kind)
                    .set_group_loading_state(&group_id, false, Some(e.to_string()));
            }
        }
    }

    /// Root reports feed the shared axes; expanded nodes re-derive their
    /// children from the newest subgroup list.
    fn publish_group_report(&mut self, group_id: &str, report: Arc<GroupReport>) {
        let Some(tree) = self.tree.as_mut() else { return };

        if tree.root_group_id() == group_id {
            self.root_report = Some(Arc::clone(&report));
        }

        let nodes: Vec<NodeId> = tree
            .visible()
            .into_iter()
            .filter(|id| tree.node(*id).is_some_and(|node| node.group_id == group_id))
            .collect();

        let mut replaced = Vec::new();
        for node in nodes {
            match tree.refresh(node, &report.group) {
                Ok(Some(children)) => replaced.extend(children),
                Ok(None) => {}
                Err(e) => warn!(%group_id, error = %e, "could not refresh children"),
            }
        }

        if !replaced.is_empty() {
            debug!(%group_id, children = replaced.len(), "children replaced from newer report");
            for child in self.group_ids(&replaced) {
                self.request(&child, FetchKind::Group);
            }
            self.cancel_detached();
        }
    }
}
