//! Wires the Slack and Keeper halves together behind the three operations
//! the command handlers use.

use std::{collections::HashMap, sync::Arc};

use {
    anyhow::Context,
    keeperlink_config::KeeperlinkConfig,
    keeperlink_keeper::{
        ClientRecord, DirectoryFetcher, EntityCache, KeeperApi, KeeperClient, KeeperUser,
        NewTask, Task, TaskWriter,
    },
    keeperlink_slack::{IdentifierResolver, NameResolver, SlackWebClient, append_permalink},
    tracing::{debug, warn},
};

/// The Slack message a task was raised from.
#[derive(Debug, Clone)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

/// A task request as it arrives from Slack: raw message text as the
/// description, plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct TaskRequest {
    pub client_id: String,
    pub assignee_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub source: Option<MessageRef>,
}

pub struct Bridge {
    slack: Option<SlackWebClient>,
    resolver: Arc<dyn NameResolver>,
    directory: Arc<DirectoryFetcher>,
    cache: Arc<EntityCache>,
    writer: TaskWriter,
}

impl Bridge {
    pub fn from_config(config: &KeeperlinkConfig) -> anyhow::Result<Self> {
        let slack = SlackWebClient::from_config(&config.slack)
            .context("failed to build slack client")?;
        let resolver: Arc<dyn NameResolver> = match &slack {
            Some(client) => Arc::new(IdentifierResolver::new(Arc::new(client.clone()))),
            None => {
                debug!("no slack bot token, mentions keep raw ids");
                Arc::new(HashMap::<String, String>::new())
            },
        };

        let api: Arc<dyn KeeperApi> = Arc::new(
            KeeperClient::from_config(&config.keeper).context("failed to build keeper client")?,
        );
        let directory = Arc::new(DirectoryFetcher::new(Arc::clone(&api), &config.directory));
        let cache = Arc::new(EntityCache::new(directory.clone(), &config.directory));
        let writer = TaskWriter::new(api, &config.tasks);

        Ok(Self {
            slack,
            resolver,
            directory,
            cache,
            writer,
        })
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn directory(&self) -> &DirectoryFetcher {
        &self.directory
    }

    /// Slack markup to plain text, with mentions resolved to names.
    pub async fn normalize(&self, text: &str) -> String {
        keeperlink_slack::normalize(text, self.resolver.as_ref()).await
    }

    /// Cached client search.
    pub async fn list_entities(&self, query: Option<&str>) -> Vec<ClientRecord> {
        self.cache.list_entities(query).await
    }

    pub async fn list_users(&self) -> anyhow::Result<Vec<KeeperUser>> {
        Ok(self.directory.list_users().await?)
    }

    /// Normalize the description, reference the source message and create
    /// the task.
    pub async fn create_task(&self, request: TaskRequest) -> anyhow::Result<Task> {
        let description = match request.description.as_deref() {
            Some(raw) => self.normalize(raw).await,
            None => String::new(),
        };
        let permalink = match &request.source {
            Some(source) => self.permalink(source).await,
            None => None,
        };
        let description = append_permalink(&description, permalink.as_deref());

        let task = self
            .writer
            .create_task(NewTask {
                client_id: request.client_id,
                assignee_id: request.assignee_id,
                title: request.title.map(|t| t.trim().to_string()),
                description: Some(description).filter(|d| !d.is_empty()),
                due_date: request.due_date,
            })
            .await?;
        Ok(task)
    }

    async fn permalink(&self, source: &MessageRef) -> Option<String> {
        let slack = self.slack.as_ref()?;
        match slack.permalink(&source.channel, &source.ts).await {
            Ok(link) => Some(link),
            Err(e) => {
                warn!(channel = %source.channel, ts = %source.ts, error = %e, "permalink lookup failed");
                None
            },
        }
    }
}
