pub mod client;
pub mod database;
pub mod collection;
pub mod document;
pub mod index;
pub mod cursor;
pub mod transaction;
pub mod graph;
pub mod view;
pub mod analyzer;
pub mod user;
pub mod task;
pub mod cluster;
pub mod replication;
pub mod admin;
pub mod async_job;

use crate::common::error::{ArangoError, Result};
use crate::connection::{Connection, Request, Response, ASYNC_ID_HEADER};

pub use client::{Client, ServerRole};
pub use database::{CreateDatabaseOptions, Database, DatabaseInfo, DatabaseOptions, DatabaseUser, EngineInfo};
pub use collection::{
    Collection,
    CollectionChecksum,
    CollectionProperties,
    CollectionStatistics,
    CollectionStatus,
    CollectionType,
    CreateCollectionOptions,
    KeyGeneratorType,
    KeyOptions,
    ReplicationFactor,
    SetCollectionPropertiesOptions,
    ShardingStrategy,
};
pub use document::{ImportOnDuplicate, ImportOptions, ImportResult};
pub use index::{Index, IndexOptions, IndexType};
pub use cursor::{Cursor, CursorStatistics, ExplainResult, Query, QueryValidation, QueryWarning};
pub use transaction::{
    BeginTransactionOptions,
    JsTransactionOptions,
    TransactionCollections,
    TransactionId,
    TransactionState,
    TransactionStatus,
};
pub use graph::{CreateGraphOptions, EdgeDefinition, Graph, GraphCollection, GraphCreateSettings, GraphInfo};
pub use view::{
    ArangoSearchLink,
    ArangoSearchViewProperties,
    PrimarySortField,
    SearchAliasIndex,
    SearchAliasViewProperties,
    View,
    ViewInfo,
    ViewProperties,
    ViewType,
};
pub use analyzer::{Analyzer, AnalyzerDefinition};
pub use user::{Grant, User, UserInfo, UserOptions};
pub use task::{Task, TaskInfo, TaskOptions};
pub use cluster::{
    Cluster,
    ClusterHealth,
    InventoryCollection,
    InventoryResponse,
    JobStatus,
    NumberOfServers,
    ServerHealth,
    ServerStatus,
};
pub use replication::{Batch, LoggerServer, LoggerState, LoggerStatus, Replication, ReplicationInventory};
pub use admin::{LogLevels, ServerMode};
pub use async_job::{AsyncJobStatus, AsyncJobs};

/// Execute a request and require one of the expected status codes.
/// A call the server stored as an async job fails with `AsyncJobInProgress`.
pub(crate) async fn send(conn: &dyn Connection, req: Request, expected: &[u16]) -> Result<Response> {
    let resp = conn.execute(req).await?;
    if resp.status_code == 202 {
        if let Some(job_id) = resp.header(ASYNC_ID_HEADER) {
            return Err(ArangoError::AsyncJobInProgress { job_id: job_id.to_string() });
        }
    }
    resp.check_status(expected)?;
    Ok(resp)
}
