//! Command dispatcher.
//!
//! `Dashboard` owns the store, the drag controller, the voice recorder and
//! the palette, and turns user intents into calls against them and the
//! collaborators. Every method blocks; the desktop shell runs the ones that
//! touch the network on a worker thread. Locks are never held across a
//! network call, so the UI can keep mutating selection while a fetch runs.

use crate::drag::{DragController, DragEffect, Modifiers, PointerTarget};
use crate::error::{DashboardError, Result};
use crate::keymap::{
    palette_groups, shortcut_for, KeyPress, Palette, PaletteCommand, PaletteGroup, Shortcut,
};
use crate::markdown::prepare_note;
use crate::providers::{convert_pages_to_markdown, CreatePageRequest, Services};
use crate::storage::settings_io::{normalize_settings, save_settings_to};
use crate::store::{provisional_page, DashboardStore, FetchOutcome, FetchTicket, Selection, StoreSnapshot};
use crate::types::{
    AppSettings, ChatMessage, ChatRequest, DatabaseList, MarkdownBatch, NotionPage, PageQuery,
    PublishedNote, MAX_DATABASE_PAGE_SIZE,
};
use crate::voice::{cleanup_request, RecordingState, VoiceAction, VoiceRecorder};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

pub const SUMMARIZE_PROMPT: &str = "Summarize these Notion pages:";
pub const EXTRACT_TASKS_PROMPT: &str =
    "Extract all tasks (todo items) from these notion pages and format them into a markdown task list:";
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|error| DashboardError::Lock(error.to_string()))
}

/// A converted selection: the per-page batch plus the converted pages
/// joined in row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedSelection {
    #[serde(flatten)]
    pub batch: MarkdownBatch,
    pub document: String,
}

/// What running a palette command produced, for the shell to present.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "data")]
pub enum PaletteOutcome {
    Voice(VoiceAction),
    Logged(Vec<NotionPage>),
    Converted(ConvertedSelection),
    Chat(String),
    SelectionCleared,
    OpenDatabasePicker,
}

/// Result of a key press that may have toggled the palette or recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOutcome {
    pub shortcut: Option<Shortcut>,
    pub palette_open: bool,
    pub voice: Option<VoiceAction>,
}

pub struct Dashboard {
    store: Mutex<DashboardStore>,
    drag: Mutex<DragController>,
    recorder: Mutex<VoiceRecorder>,
    palette: Mutex<Palette>,
    settings: Mutex<AppSettings>,
    settings_path: Option<PathBuf>,
    services: Arc<dyn Services>,
}

impl Dashboard {
    pub fn new(services: Arc<dyn Services>, settings: AppSettings) -> Self {
        Self {
            store: Mutex::new(DashboardStore::new()),
            drag: Mutex::new(DragController::new()),
            recorder: Mutex::new(VoiceRecorder::new()),
            palette: Mutex::new(Palette::default()),
            settings: Mutex::new(settings),
            settings_path: None,
            services,
        }
    }

    /// Persist settings changes to `path`.
    pub fn with_settings_path(mut self, path: PathBuf) -> Self {
        self.settings_path = Some(path);
        self
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        Ok(lock(&self.store)?.snapshot())
    }

    pub fn settings(&self) -> Result<AppSettings> {
        Ok(lock(&self.settings)?.clone())
    }

    pub fn update_settings(&self, settings: AppSettings) -> Result<AppSettings> {
        let saved = match &self.settings_path {
            Some(path) => save_settings_to(path, &settings)?,
            None => normalize_settings(settings),
        };
        *lock(&self.settings)? = saved.clone();
        Ok(saved)
    }

    // Databases and pages

    /// Fetch the database list. When nothing is active yet, the configured
    /// default database is activated if it is part of the list.
    pub fn load_databases(&self) -> Result<DatabaseList> {
        let list = self
            .services
            .notion()?
            .list_databases(MAX_DATABASE_PAGE_SIZE, None)?;
        let default_id = lock(&self.settings)?.notion.default_database_id.clone();

        let activate = {
            let mut store = lock(&self.store)?;
            store.set_databases(list.databases.clone());
            default_id.filter(|id| {
                store.active_database_id().is_none()
                    && list.databases.iter().any(|database| &database.id == id)
            })
        };
        if let Some(id) = activate {
            log::info!("Activating default database {id}");
            self.set_active_database(&id)?;
        }
        Ok(list)
    }

    /// Change the active database and load its pages. An empty id clears
    /// the active database and the selection without fetching.
    pub fn set_active_database(&self, id: &str) -> Result<Option<FetchOutcome>> {
        {
            let mut store = lock(&self.store)?;
            if !store.set_active_database(id) {
                return Ok(None);
            }
            if id.trim().is_empty() {
                store.clear_selection();
                return Ok(None);
            }
        }
        self.refresh_pages()
    }

    /// Picker semantics: choosing the active database again deactivates it.
    pub fn choose_database(&self, id: &str) -> Result<Option<FetchOutcome>> {
        let is_active = lock(&self.store)?.active_database_id() == Some(id.trim());
        if is_active {
            self.set_active_database("")
        } else {
            self.set_active_database(id)
        }
    }

    /// Reload pages for the active database. `None` when nothing is active.
    pub fn refresh_pages(&self) -> Result<Option<FetchOutcome>> {
        let Some(ticket) = lock(&self.store)?.begin_page_fetch() else {
            return Ok(None);
        };
        self.run_fetch(ticket).map(Some)
    }

    fn reconcile(&self) -> Result<Option<FetchOutcome>> {
        let Some(ticket) = lock(&self.store)?.begin_reconcile() else {
            return Ok(None);
        };
        self.run_fetch(ticket).map(Some)
    }

    fn run_fetch(&self, ticket: FetchTicket) -> Result<FetchOutcome> {
        let page_size = lock(&self.settings)?.notion.page_size;
        let query = PageQuery::with_page_size(page_size);
        let result = self
            .services
            .notion()
            .and_then(|api| api.list_pages(ticket.database_id(), &query));
        Ok(lock(&self.store)?.complete_page_fetch(&ticket, result))
    }

    // Selection

    pub fn replace_selection(&self, selection: Selection) -> Result<usize> {
        let mut store = lock(&self.store)?;
        store.replace_selection(selection);
        Ok(store.selected_count())
    }

    pub fn toggle_row(&self, index: usize) -> Result<usize> {
        let mut store = lock(&self.store)?;
        store.toggle_row(index);
        Ok(store.selected_count())
    }

    pub fn select_all(&self, selected: bool) -> Result<usize> {
        let mut store = lock(&self.store)?;
        store.select_all(selected);
        Ok(store.selected_count())
    }

    pub fn clear_selection(&self) -> Result<()> {
        lock(&self.store)?.clear_selection();
        Ok(())
    }

    pub fn pointer_down(
        &self,
        row_index: usize,
        target: PointerTarget,
        modifiers: Modifiers,
    ) -> Result<DragEffect> {
        let (current, rows_revision) = {
            let store = lock(&self.store)?;
            (store.selection().clone(), store.rows_revision())
        };
        let effect =
            lock(&self.drag)?.pointer_down(row_index, target, modifiers, &current, rows_revision);
        self.apply_drag_effect(&effect)?;
        Ok(effect)
    }

    pub fn pointer_enter(&self, row_index: usize) -> Result<DragEffect> {
        Ok(lock(&self.drag)?.pointer_enter(row_index))
    }

    pub fn pointer_up(&self) -> Result<DragEffect> {
        let (row_count, rows_revision) = {
            let store = lock(&self.store)?;
            (store.pages().len(), store.rows_revision())
        };
        let effect = lock(&self.drag)?.pointer_up(row_count, rows_revision);
        self.apply_drag_effect(&effect)?;
        Ok(effect)
    }

    pub fn escape(&self) -> Result<DragEffect> {
        Ok(lock(&self.drag)?.escape())
    }

    pub fn drag_range(&self) -> Result<Option<(usize, usize)>> {
        Ok(lock(&self.drag)?.drag_range())
    }

    fn apply_drag_effect(&self, effect: &DragEffect) -> Result<()> {
        if let DragEffect::Commit(selection) = effect {
            lock(&self.store)?.replace_selection(selection.clone());
        }
        Ok(())
    }

    // Palette intents

    pub fn log_selection(&self) -> Result<Vec<NotionPage>> {
        let pages = lock(&self.store)?.selected_pages();
        if pages.is_empty() {
            log::info!("No pages selected");
        }
        for page in &pages {
            log::info!("Selected notion page {} ({}) {}", page.id, page.title, page.url);
        }
        log::info!("Logged {} selected page(s)", pages.len());
        Ok(pages)
    }

    fn selected_or_err(&self) -> Result<Vec<NotionPage>> {
        let pages = lock(&self.store)?.selected_pages();
        if pages.is_empty() {
            log::info!("No pages selected");
            return Err(DashboardError::NothingSelected);
        }
        Ok(pages)
    }

    fn convert(&self, pages: &[NotionPage]) -> Result<MarkdownBatch> {
        let ids = pages.iter().map(|page| page.id.clone()).collect::<Vec<_>>();
        let api = self.services.notion()?;
        let batch = convert_pages_to_markdown(api.as_ref(), &ids)?;
        if let Some(errors) = &batch.errors {
            log::warn!("{} page(s) failed to convert: {:?}", batch.error_count, errors);
        }
        Ok(batch)
    }

    pub fn convert_selection(&self) -> Result<ConvertedSelection> {
        let pages = self.selected_or_err()?;
        log::info!("Converting {} selected page(s) to markdown...", pages.len());
        let batch = self.convert(&pages)?;
        let document = pages
            .iter()
            .filter_map(|page| batch.data.get(&page.id).cloned())
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR);
        Ok(ConvertedSelection { batch, document })
    }

    pub fn summarize_selection(&self, on_chunk: &mut dyn FnMut(&str)) -> Result<String> {
        self.chat_with_selection(SUMMARIZE_PROMPT, on_chunk)
    }

    pub fn extract_tasks_from_selection(&self, on_chunk: &mut dyn FnMut(&str)) -> Result<String> {
        self.chat_with_selection(EXTRACT_TASKS_PROMPT, on_chunk)
    }

    fn chat_with_selection(&self, prompt: &str, on_chunk: &mut dyn FnMut(&str)) -> Result<String> {
        let pages = self.selected_or_err()?;
        let batch = self.convert(&pages)?;
        if batch.processed_count == 0 {
            return Err(DashboardError::NothingConverted);
        }

        let settings = self.settings()?;
        let request = ChatRequest {
            model: settings.openai.chat_model.clone(),
            messages: vec![ChatMessage::user(pages_prompt(prompt, &pages, &batch))],
        };
        self.services.chat(&settings)?.stream_chat(&request, on_chunk)
    }

    // Voice notes

    pub fn recording_state(&self) -> Result<RecordingState> {
        Ok(lock(&self.recorder)?.state())
    }

    pub fn toggle_recording(&self) -> Result<VoiceAction> {
        Ok(lock(&self.recorder)?.toggle())
    }

    pub fn abort_recording(&self) -> Result<RecordingState> {
        let mut recorder = lock(&self.recorder)?;
        recorder.abort();
        Ok(recorder.state())
    }

    /// Transcribe captured audio, clean it up with the chat model, and
    /// publish the result into the active database. The recorder returns
    /// to idle whatever the outcome.
    pub fn submit_voice_note(&self, audio: &[u8], on_chunk: &mut dyn FnMut(&str)) -> Result<PublishedNote> {
        lock(&self.recorder)?.begin_processing()?;
        let outcome = self.process_voice_note(audio, on_chunk);
        lock(&self.recorder)?.finish();
        if let Err(error) = &outcome {
            log::error!("Voice note processing failed: {error}");
        }
        outcome
    }

    fn process_voice_note(&self, audio: &[u8], on_chunk: &mut dyn FnMut(&str)) -> Result<PublishedNote> {
        let settings = self.settings()?;
        let transcription = self.services.speech(&settings)?.transcribe(audio)?;
        log::info!("Transcribed {} character(s)", transcription.text.chars().count());

        let request = cleanup_request(&settings.openai.chat_model, &transcription.text);
        let markdown = self.services.chat(&settings)?.stream_chat(&request, on_chunk)?;

        let database_id = lock(&self.store)?
            .active_database_id()
            .map(str::to_string)
            .ok_or(DashboardError::NoActiveDatabase)?;
        self.publish_note(&database_id, &markdown, None)
    }

    /// Create a page from Markdown, show it at the top of the table right
    /// away, then refresh the list from Notion.
    pub fn publish_note(
        &self,
        database_id: &str,
        markdown: &str,
        title: Option<&str>,
    ) -> Result<PublishedNote> {
        let prepared = prepare_note(markdown, title)?;
        let api = self.services.notion()?;
        let title_property = api.title_property_name(database_id)?;
        let page = api.create_page(&CreatePageRequest {
            database_id: database_id.to_string(),
            title_property,
            title: prepared.title.clone(),
            blocks: prepared.blocks,
        })?;
        let note = PublishedNote {
            page,
            title: prepared.title,
        };

        {
            let mut store = lock(&self.store)?;
            if store.active_database_id() == Some(database_id)
                && !store.create_page_optimistic(provisional_page(&note))
            {
                log::info!("Rows for {database_id} are still loading, skipping optimistic insert");
            }
        }
        self.reconcile()?;
        Ok(note)
    }

    // Keyboard and palette

    pub fn handle_key(&self, press: &KeyPress) -> Result<KeyOutcome> {
        let recording = self.recording_state()?;
        let shortcut = shortcut_for(press, recording);
        let mut voice = None;
        match shortcut {
            Some(Shortcut::TogglePalette) => {
                lock(&self.palette)?.toggle();
            }
            Some(Shortcut::ToggleRecording) => {
                voice = Some(self.toggle_recording()?);
            }
            None => {}
        }
        Ok(KeyOutcome {
            shortcut,
            palette_open: lock(&self.palette)?.is_open(),
            voice,
        })
    }

    pub fn set_palette_open(&self, open: bool) -> Result<()> {
        lock(&self.palette)?.set_open(open);
        Ok(())
    }

    /// Close the palette and run one of its commands. Chat commands stream
    /// their reply through `on_chunk`.
    pub fn run_palette_command(
        &self,
        command: PaletteCommand,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<PaletteOutcome> {
        let command = lock(&self.palette)?.run(command);
        log::debug!("Running palette command {command:?}");
        let outcome = match command {
            PaletteCommand::StartRecording | PaletteCommand::StopRecording => {
                PaletteOutcome::Voice(self.toggle_recording()?)
            }
            PaletteCommand::LogSelection => PaletteOutcome::Logged(self.log_selection()?),
            PaletteCommand::ConvertSelection => PaletteOutcome::Converted(self.convert_selection()?),
            PaletteCommand::Summarize => PaletteOutcome::Chat(self.summarize_selection(on_chunk)?),
            PaletteCommand::ExtractTasks => {
                PaletteOutcome::Chat(self.extract_tasks_from_selection(on_chunk)?)
            }
            PaletteCommand::ClearSelection => {
                self.clear_selection()?;
                PaletteOutcome::SelectionCleared
            }
            PaletteCommand::SelectDatabase => PaletteOutcome::OpenDatabasePicker,
        };
        Ok(outcome)
    }

    pub fn palette(&self) -> Result<Vec<PaletteGroup>> {
        let selected_count = lock(&self.store)?.selected_count();
        Ok(palette_groups(selected_count, self.recording_state()?))
    }
}

/// Prompt body for chat intents: one `## title` section per converted page,
/// in row order.
pub fn pages_prompt(prompt: &str, pages: &[NotionPage], batch: &MarkdownBatch) -> String {
    let sections = pages
        .iter()
        .filter_map(|page| {
            let markdown = batch.data.get(&page.id)?;
            let title = if page.title.trim().is_empty() {
                "Untitled"
            } else {
                page.title.as_str()
            };
            Some(format!("## {title}\n\n{markdown}"))
        })
        .collect::<Vec<_>>();
    format!("{prompt}\n\n{}", sections.join(SECTION_SEPARATOR))
}
