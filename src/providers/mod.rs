//! Collaborators the dashboard talks to. The HTTP clients live in the
//! submodules; everything else depends only on these traits.

pub mod notion;
pub mod openai;

use crate::error::{DashboardError, Result};
use crate::markdown::NotionBlock;
use crate::storage::keychain::{resolve_secret, Secret};
use crate::storage::settings_io::effective_stt_prompt;
use crate::types::{
    AppSettings, ChatRequest, CreatedPage, DatabaseList, MarkdownBatch, PageList, PageQuery,
    Transcription,
};
use notion::NotionClient;
use openai::OpenAiClient;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum number of pages converted at the same time.
pub const CONVERSION_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePageRequest {
    pub database_id: String,
    pub title_property: String,
    pub title: String,
    pub blocks: Vec<NotionBlock>,
}

pub trait NotionApi: Send + Sync {
    fn list_databases(&self, page_size: usize, start_cursor: Option<&str>) -> Result<DatabaseList>;

    fn list_pages(&self, database_id: &str, query: &PageQuery) -> Result<PageList>;

    /// Name of the database's `title` property.
    fn title_property_name(&self, database_id: &str) -> Result<String>;

    fn create_page(&self, request: &CreatePageRequest) -> Result<CreatedPage>;

    /// The page rendered as Markdown with its title as a leading H1.
    fn page_markdown(&self, page_id: &str) -> Result<String>;
}

pub trait SpeechToText: Send + Sync {
    fn transcribe(&self, audio: &[u8]) -> Result<Transcription>;
}

pub trait ChatCompletion: Send + Sync {
    /// Stream a completion, handing each text delta to `on_chunk`. Returns
    /// the assembled reply.
    fn stream_chat(&self, request: &ChatRequest, on_chunk: &mut dyn FnMut(&str)) -> Result<String>;
}

/// Hands out collaborators on demand, so credentials added after start-up
/// are picked up by the next request.
pub trait Services: Send + Sync {
    fn notion(&self) -> Result<Arc<dyn NotionApi>>;

    fn speech(&self, settings: &AppSettings) -> Result<Arc<dyn SpeechToText>>;

    fn chat(&self, settings: &AppSettings) -> Result<Arc<dyn ChatCompletion>>;
}

/// HTTP clients with secrets resolved from the environment or keychain.
#[derive(Debug, Default)]
pub struct LiveServices;

impl Services for LiveServices {
    fn notion(&self) -> Result<Arc<dyn NotionApi>> {
        let api_key = resolve_secret(Secret::Notion, None)?;
        Ok(Arc::new(NotionClient::new(api_key)?))
    }

    fn speech(&self, settings: &AppSettings) -> Result<Arc<dyn SpeechToText>> {
        let api_key = resolve_secret(Secret::OpenAi, None)?;
        Ok(Arc::new(OpenAiClient::new(
            api_key,
            settings.openai.transcription_model.clone(),
            effective_stt_prompt(settings),
        )?))
    }

    fn chat(&self, settings: &AppSettings) -> Result<Arc<dyn ChatCompletion>> {
        let api_key = resolve_secret(Secret::OpenAi, None)?;
        log::debug!("Chat client ready, default model {}", settings.openai.chat_model);
        Ok(Arc::new(OpenAiClient::for_chat(api_key)?))
    }
}

/// Reject an empty or blank id list before any request goes out.
pub fn validate_page_ids(page_ids: &[String]) -> Result<Vec<String>> {
    if page_ids.is_empty() {
        return Err(DashboardError::InvalidInput(
            "pageIds array cannot be empty".to_string(),
        ));
    }
    if page_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(DashboardError::InvalidInput(
            "All page IDs must be non-empty strings".to_string(),
        ));
    }
    Ok(page_ids.to_vec())
}

/// Convert every page independently. A failing page lands in `errors` and
/// never cancels its siblings. Results are keyed by the id as given.
pub fn convert_pages_to_markdown(api: &dyn NotionApi, page_ids: &[String]) -> Result<MarkdownBatch> {
    let page_ids = validate_page_ids(page_ids)?;
    let mut data = BTreeMap::new();
    let mut errors = BTreeMap::new();

    for chunk in page_ids.chunks(CONVERSION_CONCURRENCY) {
        let outcomes = std::thread::scope(|scope| {
            let handles = chunk
                .iter()
                .map(|page_id| {
                    let handle = scope.spawn(move || api.page_markdown(page_id.trim()));
                    (page_id, handle)
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|(page_id, handle)| {
                    let outcome = handle.join().unwrap_or_else(|_| {
                        Err(DashboardError::Worker(format!(
                            "conversion of page {page_id} panicked"
                        )))
                    });
                    (page_id.clone(), outcome)
                })
                .collect::<Vec<_>>()
        });

        for (page_id, outcome) in outcomes {
            match outcome {
                Ok(markdown) => {
                    data.insert(page_id, markdown);
                }
                Err(error) => {
                    log::error!("Error converting page {page_id} to markdown: {error}");
                    errors.insert(page_id, error.to_string());
                }
            }
        }
    }

    log::info!(
        "Converted {} page(s) to markdown, {} failed",
        data.len(),
        errors.len()
    );
    Ok(MarkdownBatch::from_parts(data, errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    struct PagesOnly;

    impl NotionApi for PagesOnly {
        fn list_databases(&self, _: usize, _: Option<&str>) -> Result<DatabaseList> {
            unreachable!()
        }
        fn list_pages(&self, _: &str, _: &PageQuery) -> Result<PageList> {
            unreachable!()
        }
        fn title_property_name(&self, _: &str) -> Result<String> {
            unreachable!()
        }
        fn create_page(&self, _: &CreatePageRequest) -> Result<CreatedPage> {
            unreachable!()
        }
        fn page_markdown(&self, page_id: &str) -> Result<String> {
            if page_id.starts_with("bad") {
                Err(DashboardError::upstream(
                    "Notion",
                    404,
                    r#"{"code":"object_not_found","message":"Could not find page"}"#,
                ))
            } else {
                Ok(format!("# {page_id}\n\n"))
            }
        }
    }

    #[test]
    fn failures_are_isolated() {
        let ids = vec!["a".to_string(), "bad-b".to_string()];
        let batch = convert_pages_to_markdown(&PagesOnly, &ids).expect("batch");
        assert!(batch.success);
        assert_eq!(batch.processed_count, 1);
        assert_eq!(batch.error_count, 1);
        assert_eq!(batch.data.get("a").map(String::as_str), Some("# a\n\n"));
        let errors = batch.errors.expect("errors present");
        assert!(errors["bad-b"].contains("Could not find page"));
    }

    #[test]
    fn large_batches_cover_every_id() {
        let ids = (0..11).map(|index| format!("page-{index}")).collect::<Vec<_>>();
        let batch = convert_pages_to_markdown(&PagesOnly, &ids).expect("batch");
        assert_eq!(batch.processed_count, 11);
        assert!(batch.errors.is_none());
    }

    #[test]
    fn all_failed_is_not_success() {
        let ids = vec!["bad-1".to_string()];
        let batch = convert_pages_to_markdown(&PagesOnly, &ids).expect("batch");
        assert!(!batch.success);
        assert_eq!(batch.error_count, 1);
    }

    #[test]
    fn ids_are_validated_before_any_request() {
        let empty = convert_pages_to_markdown(&PagesOnly, &[]).expect_err("empty rejected");
        assert_eq!(empty.category(), ErrorCategory::InvalidInput);
        let blank = convert_pages_to_markdown(&PagesOnly, &["a".to_string(), " ".to_string()])
            .expect_err("blank rejected");
        assert_eq!(blank.status(), 400);
    }
}
