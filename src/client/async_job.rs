use std::fmt;
use chrono::{DateTime, Utc};
use tracing::debug;
use crate::client::client::Client;
use crate::client::send;
use crate::common::error::{ArangoError, Result};
use crate::common::utils::{join_path, path_escape, require_non_empty};
use crate::connection::{Connection, Request, Response, ASYNC_ID_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncJobStatus {
    Done,
    Pending,
}

impl AsyncJobStatus {
    fn as_str(&self) -> &'static str {
        match self {
            AsyncJobStatus::Done => "done",
            AsyncJobStatus::Pending => "pending",
        }
    }
}

/// Results of calls sent with `RequestOptions::with_async_store`
#[derive(Clone)]
pub struct AsyncJobs {
    client: Client,
}

impl Client {
    pub fn async_jobs(&self) -> AsyncJobs {
        AsyncJobs { client: self.clone() }
    }
}

impl AsyncJobs {
    fn conn(&self) -> &dyn Connection {
        &**self.client.connection()
    }

    fn job_path(&self, parts: &[&str]) -> String {
        let mut all = vec!["_api", "job"];
        all.extend_from_slice(parts);
        join_path(&all)
    }

    /// Ids of jobs in the given state, at most `count` when set
    pub async fn jobs(&self, status: AsyncJobStatus, count: Option<u32>) -> Result<Vec<String>> {
        let mut req = Request::get(self.job_path(&[status.as_str()]));
        if let Some(count) = count {
            req.set_query("count", count);
        }
        send(self.conn(), req, &[200]).await?.parse_body()
    }

    /// Fetch the stored response of a finished job; this also removes it
    /// from the server. A job still running yields `AsyncJobInProgress`.
    pub async fn job_result(&self, job_id: &str) -> Result<Response> {
        require_non_empty(job_id, "job id")?;
        let escaped = path_escape(job_id);
        let req = Request::put(self.job_path(&[&escaped]));
        let resp = self.conn().execute(req).await?;
        match resp.status_code {
            204 => Err(ArangoError::AsyncJobInProgress { job_id: job_id.to_string() }),
            404 if resp.header(ASYNC_ID_HEADER).is_none() => Err(resp.as_error()),
            _ => Ok(resp),
        }
    }

    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        require_non_empty(job_id, "job id")?;
        let escaped = path_escape(job_id);
        let req = Request::put(self.job_path(&[&escaped, "cancel"]));
        send(self.conn(), req, &[200]).await?;
        debug!(job = %job_id, "cancelled async job");
        Ok(())
    }

    pub async fn delete(&self, job_id: &str) -> Result<()> {
        require_non_empty(job_id, "job id")?;
        let escaped = path_escape(job_id);
        let req = Request::delete(self.job_path(&[&escaped]));
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }

    /// Delete results of jobs created before `stamp`
    pub async fn delete_expired(&self, stamp: DateTime<Utc>) -> Result<()> {
        let secs = stamp.timestamp_millis() as f64 / 1000.0;
        let req = Request::delete(self.job_path(&["expired"])).with_query("stamp", secs);
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<()> {
        let req = Request::delete(self.job_path(&["all"]));
        send(self.conn(), req, &[200]).await?;
        Ok(())
    }
}

impl fmt::Debug for AsyncJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncJobs").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use crate::connection::mock::{error_response, json_response, MockConnection};
    use crate::connection::{HttpMethod, RequestOptions};

    #[tokio::test]
    async fn test_async_store_round_trip() {
        let conn = MockConnection::new();
        conn.push(Response::new(202).with_header(ASYNC_ID_HEADER, "555"));
        conn.push(Response::new(204));
        conn.push(json_response(200, json!({"name": "c"})).with_header(ASYNC_ID_HEADER, "555"));
        let client = Client::new(conn.clone());

        let col = client.database_unchecked("app").collection_unchecked("c");
        let opts = RequestOptions::new().with_async_store(true);
        let err = col.create_document(&json!({"name": "c"}), &opts).await.unwrap_err();
        assert!(matches!(err, ArangoError::AsyncJobInProgress { ref job_id } if job_id == "555"));
        assert_eq!(conn.last_request().header("x-arango-async"), Some("store"));

        let jobs = client.async_jobs();
        let err = jobs.job_result("555").await.unwrap_err();
        assert!(matches!(err, ArangoError::AsyncJobInProgress { .. }));

        let resp = jobs.job_result("555").await.unwrap();
        let body: Value = resp.parse_body().unwrap();
        assert_eq!(body["name"], "c");
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::PUT);
        assert_eq!(req.path, "/_api/job/555");
    }

    #[tokio::test]
    async fn test_job_result_unknown() {
        let conn = MockConnection::new();
        conn.push(error_response(404, 404, "not found"));
        let err = Client::new(conn.clone()).async_jobs().job_result("1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let conn = MockConnection::new();
        conn.push_json(200, json!(["1", "2"]));
        conn.push_json(200, json!({"result": true}));
        conn.push_json(200, json!({"result": true}));
        conn.push_json(200, json!({"result": true}));
        let jobs = Client::new(conn.clone()).async_jobs();

        let ids = jobs.jobs(AsyncJobStatus::Pending, Some(10)).await.unwrap();
        assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);
        let req = conn.last_request();
        assert_eq!(req.path, "/_api/job/pending");
        assert_eq!(req.query_param("count"), Some("10"));

        jobs.cancel("2").await.unwrap();
        assert_eq!(conn.last_request().path, "/_api/job/2/cancel");

        jobs.delete_expired(Utc.timestamp_opt(1_700_000_000, 0).unwrap()).await.unwrap();
        assert_eq!(conn.last_request().query_param("stamp"), Some("1700000000"));

        jobs.delete_all().await.unwrap();
        let req = conn.last_request();
        assert_eq!(req.method, HttpMethod::DELETE);
        assert_eq!(req.path, "/_api/job/all");
    }
}
