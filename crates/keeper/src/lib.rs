//! Keeper API client: credentials, client directory, entity cache and task
//! writing.

pub mod auth;
pub mod cache;
pub mod client;
pub mod directory;
pub mod error;
pub mod writer;

pub use {
    auth::CredentialCache,
    cache::{DirectorySnapshot, EntityCache},
    client::{KeeperApi, KeeperClient},
    directory::{ClientRecord, DirectoryFetcher, DirectorySource, KeeperUser},
    error::{Error, Result},
    writer::{NewTask, Task, TaskWriter, build_attach_request, resolve_title},
};
