//! Task creation with a best-effort description attach.
//!
//! Tenants disagree on where a task description lives. The create request
//! carries only fields every tenant accepts; the description is then tried
//! against each configured [`AttachStrategy`] until one succeeds.

use std::sync::Arc;

use {
    keeperlink_config::{AttachStrategy, TasksConfig},
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    tracing::{debug, info, warn},
};

use crate::{client::KeeperApi, error::Result};

/// Caller-supplied task fields. Ids are kept as strings; see [`id_value`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub client_id: String,
    pub assignee_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Passed through verbatim (`YYYY-MM-DD` in practice).
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// `None` when the create response carried no usable id.
    pub id: Option<String>,
    pub client_id: String,
    pub assignee_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    /// Index into the attach strategy list that stored the description.
    pub description_attached_via: Option<usize>,
}

/// HTTP verb of an attach attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMethod {
    Patch,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachRequest {
    pub method: AttachMethod,
    pub path: String,
    pub body: Value,
}

/// The request one strategy would send for `task_id` and `text`.
#[must_use]
pub fn build_attach_request(strategy: &AttachStrategy, task_id: &str, text: &str) -> AttachRequest {
    let mut body = Map::new();
    let (method, path) = match strategy {
        AttachStrategy::FieldUpdate { path, field } => {
            body.insert(field.clone(), Value::from(text));
            (AttachMethod::Patch, path)
        },
        AttachStrategy::NestedNote { path, text_field } => {
            body.insert(text_field.clone(), Value::from(text));
            (AttachMethod::Post, path)
        },
        AttachStrategy::FlatNote {
            path,
            id_field,
            text_field,
        } => {
            body.insert(id_field.clone(), id_value(task_id));
            body.insert(text_field.clone(), Value::from(text));
            (AttachMethod::Post, path)
        },
    };
    AttachRequest {
        method,
        path: path.replace("{id}", task_id),
        body: Value::Object(body),
    }
}

/// Ids that look numeric go over the wire as JSON numbers.
#[must_use]
pub fn id_value(id: &str) -> Value {
    let id = id.trim();
    id.parse::<i64>()
        .map_or_else(|_| Value::from(id), Value::from)
}

/// Explicit title, else the first line of the description, else `default`,
/// cut to `max_chars` characters.
#[must_use]
pub fn resolve_title(title: Option<&str>, description: Option<&str>, default: &str, max_chars: usize) -> String {
    let chosen = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            description
                .map(str::trim)
                .and_then(|d| d.lines().next())
                .map(str::trim)
                .filter(|line| !line.is_empty())
        })
        .unwrap_or(default);
    chosen.chars().take(max_chars).collect()
}

pub struct TaskWriter {
    api: Arc<dyn KeeperApi>,
    create_path: String,
    title_max_chars: usize,
    default_title: String,
    strategies: Vec<AttachStrategy>,
}

impl TaskWriter {
    pub fn new(api: Arc<dyn KeeperApi>, config: &TasksConfig) -> Self {
        Self {
            api,
            create_path: config.create_path.clone(),
            title_max_chars: config.title_max_chars,
            default_title: config.default_title.clone(),
            strategies: config.attach_strategies.clone(),
        }
    }

    /// Create the task, then attach its description if there is one.
    ///
    /// Only the create request can fail the call. A description that no
    /// strategy accepts is logged and reported as `description_attached_via:
    /// None`.
    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        let description = new
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let title = resolve_title(
            new.title.as_deref(),
            description.as_deref(),
            &self.default_title,
            self.title_max_chars,
        );
        let assignee_id = new
            .assignee_id
            .filter(|id| !id.trim().is_empty());
        let due_date = new.due_date.filter(|d| !d.trim().is_empty());

        let mut body = Map::new();
        body.insert("clientId".into(), id_value(&new.client_id));
        body.insert("taskName".into(), Value::from(title.as_str()));
        body.insert("priority".into(), Value::Bool(false));
        if let Some(assignee) = &assignee_id {
            body.insert("assignedTo".into(), id_value(assignee));
        }
        if let Some(due) = &due_date {
            body.insert("dueDate".into(), Value::from(due.as_str()));
        }

        let created = self
            .api
            .post_json(&self.create_path, &Value::Object(body))
            .await?;
        let id = created_id(&created);
        info!(task_id = ?id, client_id = %new.client_id, "keeper task created");

        let description_attached_via = match (&id, &description) {
            (Some(id), Some(text)) => self.attach_description(id, text).await,
            (None, Some(_)) => {
                warn!("create response carried no task id, description not attached");
                None
            },
            _ => None,
        };

        Ok(Task {
            id,
            client_id: new.client_id,
            assignee_id,
            title,
            description,
            due_date,
            description_attached_via,
        })
    }

    async fn attach_description(&self, task_id: &str, text: &str) -> Option<usize> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            let request = build_attach_request(strategy, task_id, text);
            let outcome = match request.method {
                AttachMethod::Patch => self.api.patch_json(&request.path, &request.body).await,
                AttachMethod::Post => self.api.post_json(&request.path, &request.body).await,
            };
            match outcome {
                Ok(_) => {
                    debug!(task_id, strategy = index, path = %request.path, "description attached");
                    return Some(index);
                },
                Err(e) => {
                    warn!(task_id, strategy = index, path = %request.path, error = %e, "description attach failed");
                },
            }
        }
        warn!(
            task_id,
            attempts = self.strategies.len(),
            "no attach strategy accepted the description"
        );
        None
    }
}

fn created_id(response: &Value) -> Option<String> {
    match response.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
