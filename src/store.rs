//! Selection/sync store.
//!
//! Mirrors the remote database and page lists and tracks row selection.
//! All mutation goes through named methods so that the derived
//! `selected_count` and the fetch generation can never drift from the data
//! they describe.
//!
//! Page fetches are split in two halves: [`DashboardStore::begin_page_fetch`]
//! hands out a [`FetchTicket`] and the caller performs the network request
//! without holding the store, then reports back through
//! [`DashboardStore::complete_page_fetch`]. Only the newest ticket for the
//! still-active database is applied, so a slow response for a database the
//! user already left cannot overwrite the current page list.

use crate::error::DashboardError;
use crate::types::{NotionDatabase, NotionPage, PageList, PublishedNote};
use crate::util::now_iso;
use serde::Serialize;
use serde_json::Map;
use std::collections::BTreeMap;

/// Row index -> selected flag. Indices are positions in the current page
/// list, so the map is reset whenever that list is replaced.
pub type Selection = BTreeMap<usize, bool>;

pub fn count_selected(selection: &Selection) -> usize {
    selection.values().filter(|selected| **selected).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchKind {
    /// Initial load after the active database changed.
    Switch,
    /// Background refresh that reconciles an optimistic insert.
    Reconcile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    database_id: String,
    kind: FetchKind,
}

impl FetchTicket {
    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn kind(&self) -> FetchKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchOutcome {
    Applied,
    Failed,
    Stale,
}

/// What the page table should render, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum TableView {
    Loading,
    Error {
        message: String,
    },
    NoDatabase,
    Empty,
    #[serde(rename_all = "camelCase")]
    Rows {
        total: usize,
        selected: usize,
        summary: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub databases: Vec<NotionDatabase>,
    pub active_database_id: Option<String>,
    pub pages: Vec<NotionPage>,
    pub has_more: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub selection: Selection,
    pub selected_count: usize,
    pub view: TableView,
}

#[derive(Debug, Default)]
pub struct DashboardStore {
    databases: Vec<NotionDatabase>,
    active_database_id: Option<String>,
    pages: Vec<NotionPage>,
    /// Database the listed pages were fetched from. Lags behind
    /// `active_database_id` while a switch is in flight or after it failed.
    pages_database_id: Option<String>,
    /// Bumped whenever rows are replaced or shifted, so row indices taken
    /// before the bump no longer point at the same pages.
    rows_revision: u64,
    has_more: bool,
    is_loading: bool,
    error: Option<String>,
    selection: Selection,
    selected_count: usize,
    generation: u64,
}

impl DashboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn databases(&self) -> &[NotionDatabase] {
        &self.databases
    }

    pub fn active_database_id(&self) -> Option<&str> {
        self.active_database_id.as_deref()
    }

    pub fn active_database(&self) -> Option<&NotionDatabase> {
        let id = self.active_database_id.as_deref()?;
        self.databases.iter().find(|database| database.id == id)
    }

    pub fn pages(&self) -> &[NotionPage] {
        &self.pages
    }

    pub fn pages_database_id(&self) -> Option<&str> {
        self.pages_database_id.as_deref()
    }

    pub fn rows_revision(&self) -> u64 {
        self.rows_revision
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_count(&self) -> usize {
        self.selected_count
    }

    /// Replace the database list wholesale. Last write wins.
    pub fn set_databases(&mut self, databases: Vec<NotionDatabase>) {
        log::debug!("store: {} database(s) loaded", databases.len());
        self.databases = databases;
    }

    /// Set the active database id; an empty id clears it. Returns whether
    /// the value changed. Pages and selection are left alone: the caller
    /// that starts the follow-up fetch is responsible for clearing them.
    pub fn set_active_database(&mut self, id: &str) -> bool {
        let next = Some(id.trim().to_string()).filter(|value| !value.is_empty());
        if next == self.active_database_id {
            return false;
        }
        log::info!(
            "store: active database {} -> {}",
            self.active_database_id.as_deref().unwrap_or("<none>"),
            next.as_deref().unwrap_or("<none>")
        );
        self.active_database_id = next;
        true
    }

    /// Start loading pages for the active database: raises the loading
    /// flag, clears the error and the selection. Returns `None` when no
    /// database is active.
    pub fn begin_page_fetch(&mut self) -> Option<FetchTicket> {
        let database_id = self.active_database_id.clone()?;
        self.is_loading = true;
        self.error = None;
        self.replace_selection(Selection::new());
        Some(self.issue_ticket(database_id, FetchKind::Switch))
    }

    /// Start a background refresh after an optimistic insert. Loading,
    /// error and selection are untouched until the result arrives.
    ///
    /// Returns `None` while a switch fetch is pending: that fetch already
    /// brings the server's rows, and a new ticket would supersede it and
    /// leave the loading flag raised on a failure.
    pub fn begin_reconcile(&mut self) -> Option<FetchTicket> {
        let database_id = self.active_database_id.clone()?;
        if self.is_loading {
            log::debug!("store: reconcile for {database_id} folded into the pending switch fetch");
            return None;
        }
        Some(self.issue_ticket(database_id, FetchKind::Reconcile))
    }

    fn issue_ticket(&mut self, database_id: String, kind: FetchKind) -> FetchTicket {
        self.generation += 1;
        log::debug!(
            "store: fetch #{} ({:?}) issued for {}",
            self.generation,
            kind,
            database_id
        );
        FetchTicket {
            generation: self.generation,
            database_id,
            kind,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && self.active_database_id.as_deref() == Some(ticket.database_id.as_str())
    }

    /// Apply the result of a fetch started with `begin_page_fetch` or
    /// `begin_reconcile`. Results for superseded tickets are dropped.
    pub fn complete_page_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<PageList, DashboardError>,
    ) -> FetchOutcome {
        if !self.is_current(ticket) {
            log::info!(
                "store: discarding stale fetch #{} for {} (current #{}, active {})",
                ticket.generation,
                ticket.database_id,
                self.generation,
                self.active_database_id.as_deref().unwrap_or("<none>")
            );
            return FetchOutcome::Stale;
        }

        self.is_loading = false;
        match result {
            Ok(list) => {
                log::info!(
                    "store: fetch #{} loaded {} page(s) for {}",
                    ticket.generation,
                    list.pages.len(),
                    ticket.database_id
                );
                self.pages = list.pages;
                self.pages_database_id = Some(ticket.database_id.clone());
                self.rows_revision += 1;
                self.has_more = list.has_more;
                self.replace_selection(Selection::new());
                FetchOutcome::Applied
            }
            Err(error) => match ticket.kind {
                FetchKind::Switch => {
                    log::error!(
                        "store: fetch #{} failed for {}: {}",
                        ticket.generation,
                        ticket.database_id,
                        error
                    );
                    self.error = Some(error.to_string());
                    FetchOutcome::Failed
                }
                FetchKind::Reconcile => {
                    log::warn!(
                        "store: reconcile #{} failed for {}, keeping optimistic rows: {}",
                        ticket.generation,
                        ticket.database_id,
                        error
                    );
                    FetchOutcome::Failed
                }
            },
        }
    }

    /// Update the selection from its current value. Runs synchronously so it
    /// can be driven straight from a pointer handler.
    pub fn set_selection<F>(&mut self, update: F)
    where
        F: FnOnce(&Selection) -> Selection,
    {
        let next = update(&self.selection);
        self.replace_selection(next);
    }

    pub fn replace_selection(&mut self, selection: Selection) {
        self.selected_count = count_selected(&selection);
        self.selection = selection;
    }

    pub fn clear_selection(&mut self) {
        self.replace_selection(Selection::new());
    }

    pub fn toggle_row(&mut self, index: usize) {
        self.set_selection(|current| {
            let mut next = current.clone();
            let selected = current.get(&index).copied().unwrap_or(false);
            next.insert(index, !selected);
            next
        });
    }

    /// Select or deselect every row currently listed.
    pub fn select_all(&mut self, selected: bool) {
        let selection = (0..self.pages.len()).map(|index| (index, selected)).collect();
        self.replace_selection(selection);
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.get(&index).copied().unwrap_or(false)
    }

    /// Pages whose row index is selected, in row order.
    pub fn selected_pages(&self) -> Vec<NotionPage> {
        self.pages
            .iter()
            .enumerate()
            .filter(|(index, _)| self.is_selected(*index))
            .map(|(_, page)| page.clone())
            .collect()
    }

    /// Phase one of an optimistic create: show the new page at the top
    /// immediately. Selection indices are not shifted. Skipped, returning
    /// `false`, when the listed rows belong to another database.
    pub fn create_page_optimistic(&mut self, page: NotionPage) -> bool {
        if self.active_database_id.is_none() || self.pages_database_id != self.active_database_id {
            log::debug!(
                "store: not inserting page {} into rows of {}",
                page.id,
                self.pages_database_id.as_deref().unwrap_or("<none>")
            );
            return false;
        }
        log::debug!("store: optimistic insert of page {}", page.id);
        self.pages.insert(0, page);
        self.rows_revision += 1;
        true
    }

    pub fn table_view(&self) -> TableView {
        if self.is_loading {
            return TableView::Loading;
        }
        if let Some(message) = &self.error {
            return TableView::Error {
                message: message.clone(),
            };
        }
        if self.active_database_id.is_none() {
            return TableView::NoDatabase;
        }
        if self.pages.is_empty() {
            return TableView::Empty;
        }
        let total = self.pages.len();
        let selected = (0..total).filter(|index| self.is_selected(*index)).count();
        TableView::Rows {
            total,
            selected,
            summary: format!("{selected} of {total} row(s) selected."),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            databases: self.databases.clone(),
            active_database_id: self.active_database_id.clone(),
            pages: self.pages.clone(),
            has_more: self.has_more,
            is_loading: self.is_loading,
            error: self.error.clone(),
            selection: self.selection.clone(),
            selected_count: self.selected_count,
            view: self.table_view(),
        }
    }
}

/// Best-effort page record built from a create response, shown until the
/// next refresh brings the authoritative row.
pub fn provisional_page(note: &PublishedNote) -> NotionPage {
    let now = now_iso();
    NotionPage {
        id: note.page.id.clone(),
        title: note.title.clone(),
        url: note.page.url.clone().unwrap_or_default(),
        created_time: now.clone(),
        last_edited_time: now,
        archived: false,
        in_trash: false,
        properties: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::types::CreatedPage;

    fn page(id: &str) -> NotionPage {
        NotionPage {
            id: id.to_string(),
            title: format!("Page {id}"),
            url: format!("https://www.notion.so/{id}"),
            created_time: "2024-05-01T10:00:00.000Z".to_string(),
            last_edited_time: "2024-05-01T10:00:00.000Z".to_string(),
            archived: false,
            in_trash: false,
            properties: Map::new(),
        }
    }

    fn page_list(database_id: &str, ids: &[&str]) -> PageList {
        PageList {
            pages: ids.iter().map(|id| page(id)).collect(),
            has_more: false,
            next_cursor: None,
            total_count: ids.len(),
            database_id: database_id.to_string(),
        }
    }

    fn upstream_failure() -> DashboardError {
        DashboardError::Upstream {
            provider: "Notion".to_string(),
            category: ErrorCategory::NotFound,
            status: 404,
            code: Some("object_not_found".to_string()),
            message: "Database not found".to_string(),
        }
    }

    fn loaded_store(database_id: &str, ids: &[&str]) -> DashboardStore {
        let mut store = DashboardStore::new();
        store.set_active_database(database_id);
        let ticket = store.begin_page_fetch().expect("ticket");
        store.complete_page_fetch(&ticket, Ok(page_list(database_id, ids)));
        store
    }

    #[test]
    fn selected_count_tracks_every_update() {
        let mut store = DashboardStore::new();
        store.set_selection(|_| Selection::from([(0, true), (1, false), (4, true)]));
        assert_eq!(store.selected_count(), 2);

        store.set_selection(|current| {
            let mut next = current.clone();
            next.insert(1, true);
            next.insert(4, false);
            next
        });
        assert_eq!(store.selected_count(), count_selected(store.selection()));
        assert_eq!(store.selected_count(), 2);

        store.toggle_row(7);
        store.toggle_row(0);
        assert_eq!(store.selected_count(), count_selected(store.selection()));

        store.clear_selection();
        assert_eq!(store.selected_count(), 0);
    }

    #[test]
    fn setting_same_database_is_a_no_op() {
        let mut store = DashboardStore::new();
        assert!(store.set_active_database("db-1"));
        assert!(!store.set_active_database("db-1"));
        assert!(store.set_active_database(""));
        assert_eq!(store.active_database_id(), None);
    }

    #[test]
    fn begin_fetch_clears_selection_and_error() {
        let mut store = loaded_store("db-1", &["a", "b", "c"]);
        store.toggle_row(1);
        assert_eq!(store.selected_count(), 1);

        store.set_active_database("db-2");
        let ticket = store.begin_page_fetch().expect("ticket");
        assert!(store.is_loading());
        assert_eq!(store.selected_count(), 0);
        assert!(store.selection().is_empty());
        assert_eq!(ticket.database_id(), "db-2");
        assert_eq!(ticket.kind(), FetchKind::Switch);
    }

    #[test]
    fn begin_fetch_without_active_database_returns_none() {
        let mut store = DashboardStore::new();
        assert!(store.begin_page_fetch().is_none());
        assert!(store.begin_reconcile().is_none());
    }

    #[test]
    fn stale_response_does_not_overwrite_newer_database() {
        let mut store = DashboardStore::new();
        store.set_active_database("db-x");
        let ticket_x = store.begin_page_fetch().expect("ticket x");

        store.set_active_database("db-y");
        let ticket_y = store.begin_page_fetch().expect("ticket y");
        assert_eq!(
            store.complete_page_fetch(&ticket_y, Ok(page_list("db-y", &["y1", "y2"]))),
            FetchOutcome::Applied
        );

        assert_eq!(
            store.complete_page_fetch(&ticket_x, Ok(page_list("db-x", &["x1"]))),
            FetchOutcome::Stale
        );
        let ids = store.pages().iter().map(|page| page.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["y1", "y2"]);
        assert!(!store.is_loading());
    }

    #[test]
    fn stale_response_arriving_first_keeps_loading() {
        let mut store = DashboardStore::new();
        store.set_active_database("db-x");
        let ticket_x = store.begin_page_fetch().expect("ticket x");
        store.set_active_database("db-y");
        let _ticket_y = store.begin_page_fetch().expect("ticket y");

        assert_eq!(
            store.complete_page_fetch(&ticket_x, Ok(page_list("db-x", &["x1"]))),
            FetchOutcome::Stale
        );
        assert!(store.is_loading());
        assert!(store.pages().is_empty());
    }

    #[test]
    fn failed_fetch_keeps_previous_pages_and_sets_error() {
        let mut store = loaded_store("db-1", &["a", "b"]);
        store.set_active_database("db-2");
        let ticket = store.begin_page_fetch().expect("ticket");
        assert_eq!(
            store.complete_page_fetch(&ticket, Err(upstream_failure())),
            FetchOutcome::Failed
        );

        assert!(!store.is_loading());
        assert_eq!(store.pages().len(), 2);
        assert_eq!(store.error(), Some("Notion API 404: Database not found"));
        assert!(matches!(store.table_view(), TableView::Error { .. }));
    }

    #[test]
    fn optimistic_insert_then_reconcile_replaces_list() {
        let mut store = loaded_store("db-1", &["a", "b"]);
        let note = PublishedNote {
            page: CreatedPage {
                id: "new".to_string(),
                url: Some("https://www.notion.so/new".to_string()),
            },
            title: "Voice note".to_string(),
        };
        assert!(store.create_page_optimistic(provisional_page(&note)));
        assert_eq!(store.pages()[0].id, "new");
        assert_eq!(store.pages()[0].title, "Voice note");
        assert_eq!(store.pages().len(), 3);

        let ticket = store.begin_reconcile().expect("ticket");
        assert!(!store.is_loading());
        store.complete_page_fetch(&ticket, Ok(page_list("db-1", &["new", "a", "b"])));
        let ids = store.pages().iter().map(|page| page.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["new", "a", "b"]);
    }

    #[test]
    fn failed_reconcile_keeps_optimistic_row_without_error() {
        let mut store = loaded_store("db-1", &["a"]);
        assert!(store.create_page_optimistic(page("new")));
        let ticket = store.begin_reconcile().expect("ticket");
        assert_eq!(
            store.complete_page_fetch(&ticket, Err(upstream_failure())),
            FetchOutcome::Failed
        );
        assert_eq!(store.pages().len(), 2);
        assert_eq!(store.pages()[0].id, "new");
        assert_eq!(store.error(), None);
    }

    #[test]
    fn reconcile_for_abandoned_database_is_stale() {
        let mut store = loaded_store("db-1", &["a"]);
        let ticket = store.begin_reconcile().expect("ticket");
        store.set_active_database("db-2");
        let _switch = store.begin_page_fetch().expect("switch");
        assert_eq!(
            store.complete_page_fetch(&ticket, Ok(page_list("db-1", &["a", "b"]))),
            FetchOutcome::Stale
        );
        assert!(store.pages().iter().all(|page| page.id == "a"));
    }

    #[test]
    fn publish_during_switch_defers_to_the_switch_fetch() {
        let mut store = loaded_store("db-x", &["x1", "x2"]);
        store.set_active_database("db-y");
        let switch = store.begin_page_fetch().expect("switch");

        assert!(!store.create_page_optimistic(page("new")));
        assert!(store.pages().iter().all(|page| page.id != "new"));
        assert!(store.begin_reconcile().is_none());
        assert!(store.is_current(&switch));

        assert_eq!(
            store.complete_page_fetch(&switch, Ok(page_list("db-y", &["new", "y1"]))),
            FetchOutcome::Applied
        );
        let ids = store.pages().iter().map(|page| page.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["new", "y1"]);
        assert_eq!(store.pages_database_id(), Some("db-y"));
        assert!(!store.is_loading());
    }

    #[test]
    fn failed_switch_still_clears_loading_after_a_publish() {
        let mut store = loaded_store("db-x", &["x1"]);
        store.set_active_database("db-y");
        let switch = store.begin_page_fetch().expect("switch");
        assert!(store.begin_reconcile().is_none());

        assert_eq!(
            store.complete_page_fetch(&switch, Err(upstream_failure())),
            FetchOutcome::Failed
        );
        assert!(!store.is_loading());
        assert!(store.error().is_some());
        assert_eq!(store.pages_database_id(), Some("db-x"));

        // Rows are still db-x's, so a later publish to db-y only refreshes.
        assert!(!store.create_page_optimistic(page("new")));
        let reconcile = store.begin_reconcile().expect("reconcile");
        assert_eq!(reconcile.kind(), FetchKind::Reconcile);
    }

    #[test]
    fn rows_revision_moves_with_the_rows() {
        let mut store = loaded_store("db-1", &["a"]);
        let loaded = store.rows_revision();
        store.toggle_row(0);
        assert_eq!(store.rows_revision(), loaded);

        assert!(store.create_page_optimistic(page("new")));
        let inserted = store.rows_revision();
        assert!(inserted > loaded);

        let ticket = store.begin_reconcile().expect("ticket");
        store.complete_page_fetch(&ticket, Ok(page_list("db-1", &["new", "a"])));
        assert!(store.rows_revision() > inserted);
    }

    #[test]
    fn selected_pages_follow_row_indices() {
        let mut store = loaded_store("db-1", &["a", "b", "c"]);
        store.replace_selection(Selection::from([(0, true), (2, true), (9, true)]));
        let ids = store
            .selected_pages()
            .into_iter()
            .map(|page| page.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(store.selected_count(), 3);
    }

    #[test]
    fn table_view_precedence() {
        let mut store = DashboardStore::new();
        assert_eq!(store.table_view(), TableView::NoDatabase);

        store.set_active_database("db-1");
        let ticket = store.begin_page_fetch().expect("ticket");
        assert_eq!(store.table_view(), TableView::Loading);

        store.complete_page_fetch(&ticket, Ok(page_list("db-1", &[])));
        assert_eq!(store.table_view(), TableView::Empty);

        let ticket = store.begin_page_fetch().expect("ticket");
        store.complete_page_fetch(&ticket, Ok(page_list("db-1", &["a", "b"])));
        store.toggle_row(1);
        assert_eq!(
            store.table_view(),
            TableView::Rows {
                total: 2,
                selected: 1,
                summary: "1 of 2 row(s) selected.".to_string(),
            }
        );
    }

    #[test]
    fn select_all_covers_listed_rows() {
        let mut store = loaded_store("db-1", &["a", "b", "c"]);
        store.select_all(true);
        assert_eq!(store.selected_count(), 3);
        store.select_all(false);
        assert_eq!(store.selected_count(), 0);
        assert_eq!(store.selection().len(), 3);
    }
}
