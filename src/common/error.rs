use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! error_codes {
    ($($(#[$meta:meta])* $name:ident = $value:literal => $text:literal,)*) => {
        /// ArangoDB error numbers (`errorNum` in the response envelope)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum ErrorCode {
            $($(#[$meta])* $name = $value,)*
        }

        impl ErrorCode {
            /// Look up a known error number. Unknown numbers yield `None`.
            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($value => Some(ErrorCode::$name),)*
                    _ => None,
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $(ErrorCode::$name => $text,)*
                }
            }
        }
    };
}

error_codes! {
    // General errors
    NoError = 0 => "no error",
    Failed = 1 => "failed",
    SystemError = 2 => "system error",
    OutOfMemory = 3 => "out of memory",
    Internal = 4 => "internal error",
    IllegalNumber = 5 => "illegal number",
    NumericOverflow = 6 => "numeric overflow",
    IllegalOption = 7 => "illegal option",
    NotImplemented = 9 => "not implemented",
    BadParameter = 10 => "bad parameter",
    Forbidden = 11 => "forbidden",
    LockTimeout = 18 => "lock timeout",
    RequestCanceled = 21 => "canceled request",
    Locked = 28 => "locked",
    Deadlock = 29 => "deadlock detected",
    ShuttingDown = 30 => "shutdown in progress",
    OnlyEnterprise = 31 => "only enterprise version",
    ResourceLimit = 32 => "resource limit exceeded",

    // HTTP errors
    HttpBadParameter = 400 => "bad parameter",
    HttpUnauthorized = 401 => "unauthorized",
    HttpForbidden = 403 => "forbidden",
    HttpNotFound = 404 => "not found",
    HttpMethodNotAllowed = 405 => "method not supported",
    HttpNotAcceptable = 406 => "request not acceptable",
    HttpRequestTimeout = 408 => "request timeout",
    HttpConflict = 409 => "conflict",
    HttpGone = 410 => "content permanently deleted",
    HttpPreconditionFailed = 412 => "precondition failed",
    HttpServerError = 500 => "internal server error",
    HttpNotImplemented = 501 => "not implemented",
    HttpServiceUnavailable = 503 => "service unavailable",
    HttpGatewayTimeout = 504 => "gateway timeout",
    HttpCorruptedJson = 600 => "invalid JSON object",

    // Document and collection errors
    ArangoConflict = 1200 => "write-write conflict",
    ArangoDocumentNotFound = 1202 => "document not found",
    ArangoDataSourceNotFound = 1203 => "collection or view not found",
    ArangoCollectionParameterMissing = 1204 => "parameter 'collection' not found",
    ArangoDocumentHandleBad = 1205 => "illegal document identifier",
    ArangoDuplicateName = 1207 => "duplicate name",
    ArangoIllegalName = 1208 => "illegal name",
    ArangoNoIndex = 1209 => "no suitable index known",
    ArangoUniqueConstraintViolated = 1210 => "unique constraint violated",
    ArangoIndexNotFound = 1212 => "index not found",
    ArangoCrossCollectionRequest = 1213 => "cross collection request not allowed",
    ArangoIndexHandleBad = 1214 => "illegal index identifier",
    ArangoDocumentTooLarge = 1216 => "document too large",
    ArangoCollectionTypeInvalid = 1218 => "collection type invalid",
    ArangoDocumentKeyBad = 1221 => "illegal document key",
    ArangoDocumentKeyUnexpected = 1222 => "unexpected document key",
    ArangoDocumentKeyMissing = 1226 => "missing document key",
    ArangoDocumentTypeInvalid = 1227 => "invalid document type",
    ArangoDatabaseNotFound = 1228 => "database not found",
    ArangoDatabaseNameInvalid = 1229 => "database name invalid",
    ArangoUseSystemDatabase = 1230 => "operation only allowed in system database",
    ArangoInvalidKeyGenerator = 1232 => "invalid key generator",
    ArangoInvalidEdgeAttribute = 1233 => "edge attribute missing or invalid",
    ArangoIndexCreationFailed = 1236 => "index creation failed",
    ArangoDocumentRevBad = 1239 => "illegal document revision",
    ArangoIncompleteRead = 1240 => "incomplete read",

    // Cluster errors
    ClusterTimeout = 1457 => "timeout in cluster operation",
    ClusterLeadershipChallengeOngoing = 1495 => "leadership challenge is ongoing",
    ClusterNotLeader = 1496 => "not a leader",

    // Query errors
    QueryKilled = 1500 => "query killed",
    QueryParse = 1501 => "query parse error",
    QueryEmpty = 1502 => "query is empty",
    QueryScript = 1503 => "runtime error",
    QueryNumberOutOfRange = 1504 => "number out of range",
    QueryVariableNameInvalid = 1510 => "variable name is invalid",
    QueryVariableRedeclared = 1511 => "variable is redeclared",
    QueryVariableNameUnknown = 1512 => "variable name is unknown",
    QueryCollectionLockFailed = 1521 => "unable to read-lock collection",
    QueryTooManyCollections = 1522 => "too many collections/shards",
    QueryFunctionNameUnknown = 1540 => "function name unknown",
    QueryFunctionArgumentNumberMismatch = 1541 => "invalid number of arguments for function",
    QueryFunctionArgumentTypeMismatch = 1542 => "invalid argument type in call to function",
    QueryInvalidRegex = 1543 => "invalid regex value",
    QueryBindParametersInvalid = 1550 => "invalid structure of bind parameters",
    QueryBindParameterMissing = 1551 => "no value specified for declared bind parameter",
    QueryBindParameterUndeclared = 1552 => "bind parameter declared but not used",
    QueryBindParameterType = 1553 => "invalid data source type for bind parameter",
    QueryDivisionByZero = 1562 => "division by zero",
    QueryArrayExpected = 1563 => "array expected",
    QueryFailCalled = 1569 => "FAIL(%s) called",
    QueryNotFound = 1591 => "query ID not found",
    QueryInUse = 1592 => "query with this ID is in use",
    CursorNotFound = 1600 => "cursor not found",
    CursorBusy = 1601 => "cursor is busy",

    // Transaction errors
    TransactionInternal = 1650 => "internal transaction error",
    TransactionNested = 1651 => "nested transactions detected",
    TransactionUnregisteredCollection = 1652 => "unregistered collection used in transaction",
    TransactionDisallowedOperation = 1653 => "disallowed operation inside transaction",
    TransactionAborted = 1654 => "transaction aborted",
    TransactionNotFound = 1655 => "transaction not found",

    // User errors
    UserInvalidName = 1700 => "invalid user name",
    UserDuplicate = 1702 => "duplicate user",
    UserNotFound = 1703 => "user not found",

    // Task errors
    TaskInvalidId = 1850 => "invalid task id",
    TaskDuplicateId = 1851 => "duplicate task id",
    TaskNotFound = 1852 => "task not found",

    // Graph errors
    GraphCollectionMultiUse = 1920 => "multi use of edge collection in edge def",
    GraphCollectionUseInMultiGraphs = 1921 => "edge collection already used in edge def",
    GraphCreateMissingName = 1922 => "missing graph name",
    GraphCreateMalformedEdgeDefinition = 1923 => "malformed edge definition",
    GraphNotFound = 1924 => "graph not found",
    GraphDuplicate = 1925 => "graph already exists",
    GraphVertexColDoesNotExist = 1926 => "vertex collection does not exist or is not part of the graph",
    GraphWrongCollectionTypeVertex = 1927 => "collection not a vertex collection",
    GraphNotInOrphanCollection = 1928 => "collection is not in list of orphan collections",
    GraphCollectionUsedInEdgeDef = 1929 => "collection already used in edge def",
    GraphEdgeCollectionNotUsed = 1930 => "edge collection not used in graph",

    // Agency errors
    AgencyMalformedGossipMessage = 20001 => "malformed gossip message",
    AgencyMalformedInquireRequest = 20002 => "malformed inquire request",
    AgencyInformMustBeObject = 20011 => "inform message must be an object",
    AgencyInformMustContainTerm = 20012 => "inform message must contain uint parameter 'term'",
    AgencyInformMustContainId = 20013 => "inform message must contain string parameter 'id'",
    AgencyInformMustContainActive = 20014 => "inform message must contain array 'active'",
    AgencyInformMustContainPool = 20015 => "inform message must contain object 'pool'",
    AgencyInformMustContainMinPing = 20016 => "inform message must contain object 'min ping'",
    AgencyInformMustContainMaxPing = 20017 => "inform message must contain object 'max ping'",
    AgencyInformMustContainTimeoutMult = 20018 => "inform message must contain object 'timeoutMult'",
    AgencyCannotRebuildDbs = 20021 => "cannot rebuild readDB and spearHead",
    AgencyMalformedTransaction = 20030 => "malformed agency transaction",
    SupervisionGeneralFailure = 20501 => "general supervision failure",
}

impl ErrorCode {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Error envelope returned by the server:
/// `{"error": true, "code": 404, "errorNum": 1202, "errorMessage": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// HTTP status code
    #[serde(default)]
    pub code: u16,
    #[serde(rename = "errorNum", default)]
    pub error_num: u32,
    #[serde(rename = "errorMessage", default)]
    pub message: String,
}

impl ResponseError {
    pub fn new(code: u16, error_num: u32, message: impl Into<String>) -> Self {
        ResponseError {
            code,
            error_num,
            message: message.into(),
        }
    }

    /// The known error code for `error_num`, if any
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_u32(self.error_num)
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            match self.error_code() {
                Some(code) => write!(f, "{} (HTTP {}, errorNum {})", code, self.code, self.error_num),
                None => write!(f, "HTTP {} (errorNum {})", self.code, self.error_num),
            }
        } else {
            write!(f, "{} (HTTP {}, errorNum {})", self.message, self.code, self.error_num)
        }
    }
}

/// Main client error type
#[derive(Error, Debug)]
pub enum ArangoError {
    #[error("ArangoDB error: {0}")]
    Response(ResponseError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no more documents")]
    NoMoreDocuments,

    #[error("agency key '{key}' not found")]
    KeyNotFound { key: String },

    #[error("already locked")]
    AlreadyLocked,

    #[error("not locked")]
    NotLocked,

    #[error("request stored as async job {job_id}")]
    AsyncJobInProgress { job_id: String },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<ResponseError> for ArangoError {
    fn from(err: ResponseError) -> Self {
        ArangoError::Response(err)
    }
}

impl From<reqwest::Error> for ArangoError {
    fn from(err: reqwest::Error) -> Self {
        ArangoError::Transport(err.to_string())
    }
}

impl From<config::ConfigError> for ArangoError {
    fn from(err: config::ConfigError) -> Self {
        ArangoError::Config(err.to_string())
    }
}

impl ArangoError {
    pub fn response(code: u16, error_num: u32, message: impl Into<String>) -> Self {
        ArangoError::Response(ResponseError::new(code, error_num, message))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ArangoError::InvalidArgument(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ArangoError::Transport(message.into())
    }

    /// The server's error envelope, if this error came from a response
    pub fn response_error(&self) -> Option<&ResponseError> {
        match self {
            ArangoError::Response(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status code of a server error
    pub fn http_code(&self) -> Option<u16> {
        self.response_error().map(|e| e.code)
    }

    /// `errorNum` of a server error
    pub fn error_num(&self) -> Option<u32> {
        self.response_error().map(|e| e.error_num)
    }

    fn has_http_code(&self, code: u16) -> bool {
        self.http_code() == Some(code)
    }

    pub fn is_arango_error_with_error_num(&self, nums: &[u32]) -> bool {
        self.error_num().is_some_and(|n| nums.contains(&n))
    }

    pub fn is_not_found(&self) -> bool {
        self.has_http_code(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.has_http_code(409)
    }

    pub fn is_precondition_failed(&self) -> bool {
        self.has_http_code(412)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.has_http_code(401)
    }

    pub fn is_forbidden(&self) -> bool {
        self.has_http_code(403)
    }

    /// 404 caused by a missing document, collection or view
    pub fn is_data_source_or_document_not_found(&self) -> bool {
        self.is_not_found()
            && self.is_arango_error_with_error_num(&[
                ErrorCode::ArangoDocumentNotFound.as_u32(),
                ErrorCode::ArangoDataSourceNotFound.as_u32(),
            ])
    }

    pub fn is_no_leader(&self) -> bool {
        self.has_http_code(503) && self.is_arango_error_with_error_num(&[ErrorCode::ClusterNotLeader.as_u32()])
    }

    pub fn is_no_leader_or_ongoing(&self) -> bool {
        self.has_http_code(503)
            && self.is_arango_error_with_error_num(&[
                ErrorCode::ClusterNotLeader.as_u32(),
                ErrorCode::ClusterLeadershipChallengeOngoing.as_u32(),
            ])
    }

    pub fn is_timeout(&self) -> bool {
        self.has_http_code(408)
            || self.has_http_code(504)
            || self.is_arango_error_with_error_num(&[ErrorCode::ClusterTimeout.as_u32()])
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ArangoError::InvalidArgument(_))
    }

    pub fn is_no_more_documents(&self) -> bool {
        matches!(self, ArangoError::NoMoreDocuments)
    }

    pub fn is_key_not_found(&self) -> bool {
        matches!(self, ArangoError::KeyNotFound { .. })
    }

    pub fn is_already_locked(&self) -> bool {
        matches!(self, ArangoError::AlreadyLocked)
    }

    pub fn is_not_locked(&self) -> bool {
        matches!(self, ArangoError::NotLocked)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ArangoError::Transport(_))
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ArangoError>;

/// Macro for creating invalid argument errors
#[macro_export]
macro_rules! invalid_argument {
    ($($arg:tt)*) => {
        $crate::common::error::ArangoError::InvalidArgument(format!($($arg)*))
    };
}

/// Macro for ensuring a condition or returning an invalid argument error
#[macro_export]
macro_rules! ensure_argument {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::invalid_argument!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_lookup() {
        assert_eq!(ErrorCode::from_u32(1202), Some(ErrorCode::ArangoDocumentNotFound));
        assert_eq!(ErrorCode::from_u32(1496), Some(ErrorCode::ClusterNotLeader));
        assert_eq!(ErrorCode::from_u32(99999), None);
        assert_eq!(ErrorCode::GraphNotFound.as_u32(), 1924);
        assert_eq!(ErrorCode::ArangoDocumentNotFound.to_string(), "document not found");
        assert_eq!(ErrorCode::from_u32(20030), Some(ErrorCode::AgencyMalformedTransaction));
        assert_eq!(ErrorCode::SupervisionGeneralFailure.as_u32(), 20501);
    }

    #[test]
    fn test_response_error_from_envelope() {
        let body = r#"{"error":true,"code":404,"errorNum":1203,"errorMessage":"collection or view not found"}"#;
        let err: ResponseError = serde_json::from_str(body).unwrap();
        assert_eq!(err.code, 404);
        assert_eq!(err.error_num, 1203);
        assert_eq!(err.error_code(), Some(ErrorCode::ArangoDataSourceNotFound));

        let err = ArangoError::from(err);
        assert!(err.is_not_found());
        assert!(err.is_data_source_or_document_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_predicates() {
        assert!(ArangoError::response(409, 1210, "dup").is_conflict());
        assert!(ArangoError::response(412, 1200, "rev").is_precondition_failed());
        assert!(ArangoError::response(503, 1496, "no leader").is_no_leader());
        assert!(ArangoError::response(503, 1495, "challenge").is_no_leader_or_ongoing());
        assert!(!ArangoError::response(503, 1495, "challenge").is_no_leader());
        assert!(ArangoError::response(504, 0, "").is_timeout());
        assert!(ArangoError::response(401, 11, "").is_unauthorized());
        // 404 without a document/collection errorNum
        assert!(!ArangoError::response(404, 1924, "graph").is_data_source_or_document_not_found());
        assert!(ArangoError::NoMoreDocuments.is_no_more_documents());
        assert!(ArangoError::AlreadyLocked.is_already_locked());
        assert!(ArangoError::NotLocked.is_not_locked());
        assert!(invalid_argument!("key {} is empty", 1).is_invalid_argument());
        assert_eq!(ArangoError::transport("x").http_code(), None);
    }

    #[test]
    fn test_display() {
        let err = ArangoError::response(404, 1202, "");
        assert_eq!(err.to_string(), "ArangoDB error: document not found (HTTP 404, errorNum 1202)");
        let err = ArangoError::response(500, 4, "boom");
        assert_eq!(err.to_string(), "ArangoDB error: boom (HTTP 500, errorNum 4)");
    }
}
