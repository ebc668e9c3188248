use super::{CreatePageRequest, NotionApi};
use crate::error::{DashboardError, Result};
use crate::page_markdown::{blocks_to_markdown, page_document, page_title, plain_text_from_rich_text};
use crate::types::{
    CreatedPage, DatabaseList, DatabaseProperty, NotionDatabase, NotionPage, PageList, PageQuery,
    DEFAULT_TITLE_PROPERTY, MAX_CHILDREN_PER_REQUEST, MAX_DATABASE_PAGE_SIZE, NOTION_API_BASE_URL,
    NOTION_API_VERSION, UNTITLED_DATABASE, UNTITLED_PAGE,
};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Map, Value};
use std::time::Duration as StdDuration;

const PROVIDER: &str = "Notion";
/// Nesting limit when walking a page's block tree.
const MAX_BLOCK_DEPTH: usize = 8;

pub struct NotionClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NotionClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(50))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: NOTION_API_BASE_URL.to_string(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", NOTION_API_VERSION)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.authorized(request).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let error = DashboardError::upstream(PROVIDER, status.as_u16(), &body);
            log::warn!("{error}");
            return Err(error);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn get(&self, path: &str) -> Result<Value> {
        self.send(self.client.get(format!("{}{path}", self.base_url)))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.client.post(format!("{}{path}", self.base_url)).json(body))
    }

    fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.client.patch(format!("{}{path}", self.base_url)).json(body))
    }

    /// Every child of `block_id`, following `next_cursor` until exhausted.
    fn fetch_children(&self, block_id: &str) -> Result<Vec<Value>> {
        let mut blocks: Vec<Value> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/blocks/{block_id}/children", self.base_url))
                .query(&[("page_size", "100")]);
            if let Some(next_cursor) = cursor.as_ref() {
                request = request.query(&[("start_cursor", next_cursor)]);
            }

            let value = self.send(request)?;
            if let Some(items) = value.get("results").and_then(Value::as_array) {
                blocks.extend(items.iter().cloned());
            }

            let has_more = value
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            cursor = value
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if !has_more || cursor.is_none() {
                break;
            }
        }

        Ok(blocks)
    }

    /// Blocks of `block_id` with nested children attached under `children`.
    /// Child pages and databases are rendered by title only.
    fn fetch_block_tree(&self, block_id: &str, depth: usize) -> Result<Vec<Value>> {
        let mut blocks = self.fetch_children(block_id)?;
        if depth >= MAX_BLOCK_DEPTH {
            return Ok(blocks);
        }
        for block in blocks.iter_mut() {
            if !descends_into(block) {
                continue;
            }
            let Some(child_id) = block.get("id").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let nested = self.fetch_block_tree(&child_id, depth + 1)?;
            block["children"] = Value::Array(nested);
        }
        Ok(blocks)
    }
}

fn descends_into(block: &Value) -> bool {
    let has_children = block
        .get("has_children")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let kind = block.get("type").and_then(Value::as_str).unwrap_or_default();
    has_children && !matches!(kind, "child_page" | "child_database")
}

impl NotionApi for NotionClient {
    fn list_databases(&self, page_size: usize, start_cursor: Option<&str>) -> Result<DatabaseList> {
        let value = self.post("/search", &search_body(page_size, start_cursor))?;
        let databases = value
            .get("results")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(database_from_value).collect::<Vec<_>>())
            .unwrap_or_default();
        log::info!("Fetched {} Notion database(s)", databases.len());

        Ok(DatabaseList {
            total_count: databases.len(),
            has_more: value.get("has_more").and_then(Value::as_bool).unwrap_or(false),
            next_cursor: value
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string),
            databases,
        })
    }

    fn list_pages(&self, database_id: &str, query: &PageQuery) -> Result<PageList> {
        let database_id = database_id.trim();
        if database_id.is_empty() {
            return Err(DashboardError::InvalidInput("Database ID is required".to_string()));
        }
        let body = query_body(query)?;
        let value = self.post(&format!("/databases/{database_id}/query"), &body)?;

        let pages = value
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.get("object").and_then(Value::as_str) == Some("page"))
                    .map(page_from_value)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(PageList {
            total_count: pages.len(),
            has_more: value.get("has_more").and_then(Value::as_bool).unwrap_or(false),
            next_cursor: value
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string),
            database_id: database_id.to_string(),
            pages,
        })
    }

    fn title_property_name(&self, database_id: &str) -> Result<String> {
        let database = self.get(&format!("/databases/{}", database_id.trim()))?;
        Ok(database
            .get("properties")
            .and_then(Value::as_object)
            .and_then(find_title_property_name)
            .unwrap_or_else(|| DEFAULT_TITLE_PROPERTY.to_string()))
    }

    fn create_page(&self, request: &CreatePageRequest) -> Result<CreatedPage> {
        let (body, remaining) = create_page_payload(request);
        let page = self.post("/pages", &body)?;
        let id = page
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DashboardError::upstream(PROVIDER, 200, "Created page has no id"))?;

        for batch in remaining {
            self.patch(&format!("/blocks/{id}/children"), &json!({ "children": batch }))?;
        }
        log::info!("Created Notion page {id} with {} block(s)", request.blocks.len());

        Ok(CreatedPage {
            url: page.get("url").and_then(Value::as_str).map(str::to_string),
            id,
        })
    }

    fn page_markdown(&self, page_id: &str) -> Result<String> {
        let page = self.get(&format!("/pages/{page_id}"))?;
        let title = page_title(&page);
        let blocks = self.fetch_block_tree(page_id, 0)?;
        Ok(page_document(&title, &blocks_to_markdown(&blocks)))
    }
}

pub fn search_body(page_size: usize, start_cursor: Option<&str>) -> Value {
    let mut body = json!({
        "filter": { "property": "object", "value": "database" },
        "sort": { "direction": "descending", "timestamp": "last_edited_time" },
        "page_size": page_size.clamp(1, MAX_DATABASE_PAGE_SIZE),
    });
    if let Some(cursor) = start_cursor.filter(|cursor| !cursor.trim().is_empty()) {
        body["start_cursor"] = Value::String(cursor.to_string());
    }
    body
}

/// Body of a database query. Filters must be JSON objects and sorts JSON
/// arrays; anything else is rejected before the request is sent.
pub fn query_body(query: &PageQuery) -> Result<Value> {
    let mut body = json!({ "page_size": query.effective_page_size() });
    if let Some(cursor) = query
        .start_cursor
        .as_deref()
        .filter(|cursor| !cursor.trim().is_empty())
    {
        body["start_cursor"] = Value::String(cursor.to_string());
    }
    if let Some(filter) = &query.filter {
        if !filter.is_object() {
            return Err(DashboardError::InvalidInput(
                "Filter must be a valid JSON object".to_string(),
            ));
        }
        body["filter"] = filter.clone();
    }
    if let Some(sorts) = &query.sorts {
        if !sorts.is_array() {
            return Err(DashboardError::InvalidInput(
                "Sorts must be a valid JSON array".to_string(),
            ));
        }
        body["sorts"] = sorts.clone();
    }
    Ok(body)
}

/// `POST /pages` body plus the children that did not fit in it, already
/// split into append batches.
pub fn create_page_payload(request: &CreatePageRequest) -> (Value, Vec<Vec<Value>>) {
    let children = request.blocks.iter().map(|block| block.to_json()).collect::<Vec<_>>();
    let mut batches = children
        .chunks(MAX_CHILDREN_PER_REQUEST)
        .map(<[Value]>::to_vec)
        .collect::<Vec<_>>();
    let first = if batches.is_empty() {
        Vec::new()
    } else {
        batches.remove(0)
    };

    let mut properties = Map::new();
    properties.insert(
        request.title_property.clone(),
        json!({ "title": [{ "type": "text", "text": { "content": request.title } }] }),
    );
    let body = json!({
        "parent": { "database_id": request.database_id },
        "properties": Value::Object(properties),
        "children": first,
    });
    (body, batches)
}

pub fn find_title_property_name(properties: &Map<String, Value>) -> Option<String> {
    properties
        .iter()
        .find(|(_, schema)| schema.get("type").and_then(Value::as_str) == Some("title"))
        .map(|(name, _)| name.to_string())
}

fn first_plain_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .map(|item| plain_text_from_rich_text(&Value::Array(vec![item.clone()])))
        .filter(|text| !text.is_empty())
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub fn database_from_value(value: &Value) -> NotionDatabase {
    let properties = value
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| DatabaseProperty {
                    name: name.to_string(),
                    kind: string_field(property, "type"),
                    id: string_field(property, "id"),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    NotionDatabase {
        id: string_field(value, "id"),
        title: first_plain_text(value.get("title"))
            .unwrap_or_else(|| UNTITLED_DATABASE.to_string()),
        description: first_plain_text(value.get("description")),
        url: string_field(value, "url"),
        created_time: string_field(value, "created_time"),
        last_edited_time: string_field(value, "last_edited_time"),
        properties,
        archived: bool_field(value, "archived"),
        is_inline: bool_field(value, "is_inline"),
    }
}

pub fn page_from_value(value: &Value) -> NotionPage {
    let properties = value
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let title = properties
        .values()
        .find(|property| property.get("type").and_then(Value::as_str) == Some("title"))
        .and_then(|property| property.get("title"))
        .map(plain_text_from_rich_text)
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED_PAGE.to_string());

    NotionPage {
        id: string_field(value, "id"),
        title,
        url: string_field(value, "url"),
        created_time: string_field(value, "created_time"),
        last_edited_time: string_field(value, "last_edited_time"),
        archived: bool_field(value, "archived"),
        in_trash: bool_field(value, "in_trash"),
        properties,
    }
}
