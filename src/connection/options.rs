use serde::{Deserialize, Serialize};
use crate::connection::request::Request;

/// Header selecting a running stream transaction
pub const TRANSACTION_ID_HEADER: &str = "x-arango-trx-id";

/// How an insert treats an already existing `_key`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    Ignore,
    Replace,
    Update,
    Conflict,
}

impl OverwriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverwriteMode::Ignore => "ignore",
            OverwriteMode::Replace => "replace",
            OverwriteMode::Update => "update",
            OverwriteMode::Conflict => "conflict",
        }
    }
}

/// Per-call modifiers translated into query parameters and headers.
///
/// Only the fields that are set end up on the request; the server
/// ignores parameters an endpoint does not understand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub revision: Option<String>,
    pub ignore_revs: Option<bool>,
    pub wait_for_sync: Option<bool>,
    pub return_new: Option<bool>,
    pub return_old: Option<bool>,
    pub silent: Option<bool>,
    pub keep_null: Option<bool>,
    pub merge_objects: Option<bool>,
    pub overwrite: Option<bool>,
    pub overwrite_mode: Option<OverwriteMode>,
    pub refill_index_caches: Option<bool>,
    pub is_restore: Option<bool>,
    pub transaction_id: Option<String>,
    pub allow_dirty_reads: bool,
    pub db_server_id: Option<String>,
    pub details: Option<bool>,
    pub async_store: bool,
    pub extra_query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the document to have this revision (`If-Match`)
    pub fn with_revision(mut self, rev: impl Into<String>) -> Self {
        self.revision = Some(rev.into());
        self
    }

    pub fn with_ignore_revs(mut self, ignore: bool) -> Self {
        self.ignore_revs = Some(ignore);
        self
    }

    pub fn with_wait_for_sync(mut self, wait: bool) -> Self {
        self.wait_for_sync = Some(wait);
        self
    }

    pub fn with_return_new(mut self, value: bool) -> Self {
        self.return_new = Some(value);
        self
    }

    pub fn with_return_old(mut self, value: bool) -> Self {
        self.return_old = Some(value);
        self
    }

    pub fn with_silent(mut self, value: bool) -> Self {
        self.silent = Some(value);
        self
    }

    pub fn with_keep_null(mut self, value: bool) -> Self {
        self.keep_null = Some(value);
        self
    }

    pub fn with_merge_objects(mut self, value: bool) -> Self {
        self.merge_objects = Some(value);
        self
    }

    pub fn with_overwrite(mut self, value: bool) -> Self {
        self.overwrite = Some(value);
        self
    }

    pub fn with_overwrite_mode(mut self, mode: OverwriteMode) -> Self {
        self.overwrite_mode = Some(mode);
        self
    }

    pub fn with_refill_index_caches(mut self, value: bool) -> Self {
        self.refill_index_caches = Some(value);
        self
    }

    pub fn with_is_restore(mut self, value: bool) -> Self {
        self.is_restore = Some(value);
        self
    }

    /// Run the call inside a stream transaction
    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    /// Allow reads from followers in a cluster
    pub fn with_allow_dirty_reads(mut self, value: bool) -> Self {
        self.allow_dirty_reads = value;
        self
    }

    pub fn with_db_server_id(mut self, id: impl Into<String>) -> Self {
        self.db_server_id = Some(id.into());
        self
    }

    pub fn with_details(mut self, value: bool) -> Self {
        self.details = Some(value);
        self
    }

    /// Ask the server to store the request as an async job
    pub fn with_async_store(mut self, value: bool) -> Self {
        self.async_store = value;
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra_query.push((key.into(), value.to_string()));
        self
    }

    pub(crate) fn apply(&self, mut req: Request) -> Request {
        if let Some(rev) = &self.revision {
            req.set_header("if-match", rev.clone());
        }
        if let Some(id) = &self.transaction_id {
            req.set_header(TRANSACTION_ID_HEADER, id.clone());
        }
        if self.allow_dirty_reads {
            req.set_header("x-arango-allow-dirty-read", "true");
        }
        if self.async_store {
            req.set_header("x-arango-async", "store");
        }

        let flags = [
            ("ignoreRevs", self.ignore_revs),
            ("waitForSync", self.wait_for_sync),
            ("returnNew", self.return_new),
            ("returnOld", self.return_old),
            ("silent", self.silent),
            ("keepNull", self.keep_null),
            ("mergeObjects", self.merge_objects),
            ("overwrite", self.overwrite),
            ("refillIndexCaches", self.refill_index_caches),
            ("isRestore", self.is_restore),
            ("details", self.details),
        ];
        for (name, value) in flags {
            if let Some(value) = value {
                req.set_query(name, value);
            }
        }
        if let Some(mode) = self.overwrite_mode {
            req.set_query("overwriteMode", mode.as_str());
        }
        if let Some(id) = &self.db_server_id {
            req.set_query("DBserver", id);
        }
        for (key, value) in &self.extra_query {
            req.set_query(key.clone(), value);
        }
        req
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sets_only_given_fields() {
        let opts = RequestOptions::new()
            .with_revision("_abc")
            .with_return_new(true)
            .with_overwrite_mode(OverwriteMode::Update)
            .with_transaction_id("99")
            .with_query_param("custom", 1);
        let req = opts.apply(Request::post("/_api/document/c"));

        assert_eq!(req.header("If-Match"), Some("_abc"));
        assert_eq!(req.header(TRANSACTION_ID_HEADER), Some("99"));
        assert_eq!(req.query_param("returnNew"), Some("true"));
        assert_eq!(req.query_param("overwriteMode"), Some("update"));
        assert_eq!(req.query_param("custom"), Some("1"));
        assert_eq!(req.query_param("returnOld"), None);
        assert_eq!(req.header("x-arango-async"), None);
    }

    #[test]
    fn test_default_is_empty() {
        let req = RequestOptions::default().apply(Request::get("/_api/version"));
        assert!(req.query.is_empty());
        assert!(req.headers.is_empty());
    }
}
