//! Client directory listing against an API whose pagination contract is
//! unknown ahead of time.
//!
//! Some deployments page with `skip`/`offset`, others with 1-based
//! `page`/`pageNumber`. [`DirectoryFetcher::fetch_all`] starts with the
//! offset form and switches to the page form when a request fails or a full
//! page brings nothing new.

use std::{collections::HashSet, sync::Arc};

use {
    async_trait::async_trait,
    keeperlink_config::DirectoryConfig,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::{debug, info, warn},
};

use crate::{
    client::KeeperApi,
    error::{Error, Result},
};

/// Name fields tried on a client record, in priority order.
const CLIENT_NAME_FIELDS: &[&str] = &[
    "name",
    "clientName",
    "title",
    "companyName",
    "client_name",
    "company",
];

/// Wrapper keys tried for the record list, in priority order.
const LIST_KEYS: &[&str] = &["items", "results", "clients", "data"];

/// Server-side search results are capped at this many records.
const SEARCH_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperUser {
    pub id: String,
    pub name: String,
}

/// Anything that can produce the full client directory.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<ClientRecord>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageStyle {
    Offset,
    Page,
}

impl PageStyle {
    fn params(self, cursor: usize, limit: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", limit.to_string())];
        match self {
            Self::Offset => {
                let offset = (cursor * limit).to_string();
                params.push(("skip", offset.clone()));
                params.push(("offset", offset));
            },
            Self::Page => {
                let page = (cursor + 1).to_string();
                params.push(("page", page.clone()));
                params.push(("pageNumber", page));
                params.push(("pageSize", limit.to_string()));
            },
        }
        params
    }
}

pub struct DirectoryFetcher {
    api: Arc<dyn KeeperApi>,
    clients_path: String,
    users_path: String,
    page_size: usize,
}

impl DirectoryFetcher {
    pub fn new(api: Arc<dyn KeeperApi>, config: &DirectoryConfig) -> Self {
        Self {
            api,
            clients_path: config.clients_path.clone(),
            users_path: config.users_path.clone(),
            page_size: config.page_size.max(1),
        }
    }

    /// One server-side search request; an empty query lists the first page.
    pub async fn search_clients(&self, query: &str) -> Result<Vec<ClientRecord>> {
        let mut params = vec![("limit", SEARCH_LIMIT.to_string())];
        let query = query.trim();
        if !query.is_empty() {
            params.push(("search", query.to_string()));
        }
        let response = self.api.get_json(&self.clients_path, &params).await?;
        Ok(pick_list(&response)
            .iter()
            .filter_map(map_client)
            .collect())
    }

    pub async fn list_users(&self) -> Result<Vec<KeeperUser>> {
        let response = self.api.get_json(&self.users_path, &[]).await?;
        let users: Vec<KeeperUser> = pick_list(&response)
            .iter()
            .filter_map(|user| {
                let id = record_id(user)?;
                let name = non_blank(user.get("name"))?;
                Some(KeeperUser { id, name })
            })
            .collect();
        debug!(count = users.len(), "listed keeper users");
        Ok(users)
    }

    async fn fetch_pages(&self) -> Result<Vec<ClientRecord>> {
        let limit = self.page_size;
        let mut style = PageStyle::Offset;
        let mut cursor = 0usize;
        // `seen` measures progress over every id; `emitted` dedups output, so a
        // nameless copy of an id never hides a named one on a later page.
        let mut seen: HashSet<String> = HashSet::new();
        let mut emitted: HashSet<String> = HashSet::new();
        let mut collected: Vec<ClientRecord> = Vec::new();

        loop {
            let params = style.params(cursor, limit);
            let response = match self.api.get_json(&self.clients_path, &params).await {
                Ok(response) => response,
                Err(e) if style == PageStyle::Offset => {
                    warn!(cursor, error = %e, "offset pagination failed, switching to page numbers");
                    style = PageStyle::Page;
                    continue;
                },
                Err(e) => return Err(e),
            };

            let page = pick_list(&response);
            let before = seen.len();
            for raw in page {
                let Some(id) = record_id(raw) else {
                    continue;
                };
                seen.insert(id.clone());
                if emitted.contains(&id) {
                    continue;
                }
                if let Some(name) = client_name(raw) {
                    emitted.insert(id.clone());
                    collected.push(ClientRecord { id, name });
                }
            }
            let added = seen.len() - before;
            debug!(?style, cursor, received = page.len(), added, "fetched directory page");

            if page.len() < limit {
                break;
            }

            if added == 0 {
                match style {
                    PageStyle::Offset => {
                        debug!(cursor, "offset pagination stalled, switching to page numbers");
                        style = PageStyle::Page;
                        continue;
                    },
                    PageStyle::Page if seen.is_empty() => return Err(Error::PaginationExhausted),
                    PageStyle::Page => break,
                }
            }

            cursor += 1;
        }

        Ok(collected)
    }
}

#[async_trait]
impl DirectorySource for DirectoryFetcher {
    async fn fetch_all(&self) -> Result<Vec<ClientRecord>> {
        let records = self.fetch_pages().await?;
        info!(count = records.len(), "fetched client directory");
        Ok(records)
    }
}

/// The record list of a listing response: a bare array, or the first array
/// found under a known wrapper key.
fn pick_list(response: &Value) -> &[Value] {
    if let Some(list) = response.as_array() {
        return list;
    }
    LIST_KEYS
        .iter()
        .find_map(|key| response.get(key).and_then(Value::as_array))
        .map_or(&[], Vec::as_slice)
}

/// Ids arrive as numbers or strings depending on the endpoint.
fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn client_name(record: &Value) -> Option<String> {
    CLIENT_NAME_FIELDS
        .iter()
        .find_map(|field| non_blank(record.get(field)))
}

fn map_client(record: &Value) -> Option<ClientRecord> {
    Some(ClientRecord {
        id: record_id(record)?,
        name: client_name(record)?,
    })
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
