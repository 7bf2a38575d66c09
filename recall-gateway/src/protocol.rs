//! Newline-delimited JSON messages exchanged between a client and the worker.
//!
//! Every request is one JSON object on one line, selected by its `cmd` field.
//! Every response is one JSON object on one line carrying a `status`; all other
//! response fields are omitted when they do not apply.

use recall_retriever::retrieval::indexer::{DirectoryReport, FileFailure, FileReport, FileStatus};
use recall_retriever::retrieval::query::SearchResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    /// Open (or create) the database and load the embedding provider
    Init {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        db_path: Option<PathBuf>,
    },
    IndexFile {
        path: PathBuf,
        #[serde(default)]
        force: bool,
    },
    IndexDir {
        path: PathBuf,
        #[serde(default)]
        force: bool,
        /// Replaces the configured extension allow-list for this walk
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extensions: Option<Vec<String>>,
    },
    Search {
        #[serde(default)]
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    Stats,
    Clear,
    Quit,
}

impl Request {
    /// Every `cmd` value the worker understands
    pub const COMMANDS: &'static [&'static str] = &[
        "init",
        "index_file",
        "index_dir",
        "search",
        "stats",
        "clear",
        "quit",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Request::Init { .. } => "init",
            Request::IndexFile { .. } => "index_file",
            Request::IndexDir { .. } => "index_dir",
            Request::Search { .. } => "search",
            Request::Stats => "stats",
            Request::Clear => "clear",
            Request::Quit => "quit",
        }
    }
}

/// Why a request line could not be turned into a [`Request`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line is not a JSON object. The stream can no longer be trusted.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// A well-formed object the worker cannot act on. Answered with an error
    /// response; the session carries on.
    #[error("{0}")]
    Invalid(String),
}

impl ProtocolError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Malformed(_))
    }
}

/// Parse one request line.
pub fn decode_request(line: &str) -> Result<Request, ProtocolError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(ProtocolError::Malformed(
            "request must be a JSON object".to_string(),
        ));
    };

    let cmd = match object.get("cmd") {
        Some(Value::String(cmd)) => cmd.clone(),
        Some(_) => return Err(ProtocolError::Invalid("cmd must be a string".to_string())),
        None => return Err(ProtocolError::Invalid("missing cmd".to_string())),
    };
    if !Request::COMMANDS.iter().any(|known| *known == cmd) {
        return Err(ProtocolError::Invalid(format!("unknown command: {cmd}")));
    }

    serde_json::from_value(value)
        .map_err(|e| ProtocolError::Invalid(format!("invalid {cmd} request: {e}")))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// First line written by a worker once it accepts requests
    Ready,
    #[default]
    Ok,
    Indexed,
    Unchanged,
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ready => write!(f, "ready"),
            Status::Ok => write!(f, "ok"),
            Status::Indexed => write!(f, "indexed"),
            Status::Unchanged => write!(f, "unchanged"),
            Status::Error => write!(f, "error"),
        }
    }
}

impl From<FileStatus> for Status {
    fn from(status: FileStatus) -> Self {
        match status {
            FileStatus::Indexed => Status::Indexed,
            FileStatus::Unchanged => Status::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    /// Stored chunk count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Fingerprinted file count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unchanged: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<FileFailure>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchResult>>,
}

impl Response {
    pub fn ready() -> Self {
        Self::with_status(Status::Ready)
    }

    pub fn ok() -> Self {
        Self::with_status(Status::Ok)
    }

    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// A command that ran and failed. `reason` repeats `error` for clients
    /// that only read one of them.
    pub fn failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            reason: Some(reason.clone()),
            ..Self::error(reason)
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Error text of a failed response, `"unknown error"` when none was sent
    pub fn error_message(&self) -> &str {
        self.error
            .as_deref()
            .or(self.reason.as_deref())
            .unwrap_or("unknown error")
    }

    pub fn from_file_report(report: FileReport) -> Self {
        let status = Status::from(report.status);
        Self {
            status,
            reason: (status == Status::Unchanged).then(|| "unchanged".to_string()),
            chunks: Some(report.chunks),
            ..Self::default()
        }
    }

    pub fn from_directory_report(report: DirectoryReport) -> Self {
        Self {
            status: Status::Ok,
            indexed: Some(report.indexed),
            skipped: Some(report.skipped),
            filtered: Some(report.filtered),
            unchanged: Some(report.unchanged),
            failed: Some(report.failed),
            failures: (!report.failures.is_empty()).then_some(report.failures),
            ..Self::default()
        }
    }
}

/// Write `message` as one JSON line and flush.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_commands() {
        assert_eq!(
            decode_request(r#"{"cmd":"init","db_path":"/tmp/db"}"#),
            Ok(Request::Init {
                db_path: Some(PathBuf::from("/tmp/db"))
            })
        );
        assert_eq!(
            decode_request(r#"{"cmd":"index_file","path":"/n/a.md"}"#),
            Ok(Request::IndexFile {
                path: PathBuf::from("/n/a.md"),
                force: false
            })
        );
        assert_eq!(
            decode_request(r#"{"cmd":"index_dir","path":"/n","force":true,"extensions":["md"]}"#),
            Ok(Request::IndexDir {
                path: PathBuf::from("/n"),
                force: true,
                extensions: Some(vec!["md".to_string()])
            })
        );
        assert_eq!(
            decode_request(r#"{"cmd":"search","query":"hello"}"#),
            Ok(Request::Search {
                query: "hello".to_string(),
                limit: None
            })
        );
        // Unexpected extra fields are ignored
        assert_eq!(
            decode_request(r#"{"cmd":"stats","verbose":true}"#),
            Ok(Request::Stats)
        );
    }

    #[test]
    fn test_decode_errors() {
        let fatal = ["not json", "[1,2,3]", "\"init\"", "{\"cmd\":"];
        for line in fatal {
            let err = decode_request(line).unwrap_err();
            assert!(err.is_fatal(), "{line} should be fatal");
        }

        let recoverable = [
            (r#"{"cmd":"explode"}"#, "unknown command: explode"),
            (r#"{"path":"/x"}"#, "missing cmd"),
            (r#"{"cmd":7}"#, "cmd must be a string"),
        ];
        for (line, message) in recoverable {
            assert_eq!(
                decode_request(line),
                Err(ProtocolError::Invalid(message.to_string()))
            );
        }

        let err = decode_request(r#"{"cmd":"index_file"}"#).unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("invalid index_file request"));
    }

    #[test]
    fn test_response_omits_unset_fields() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&Response::ready())?,
            r#"{"status":"ready"}"#
        );
        assert_eq!(
            serde_json::to_string(&Response::error("not initialized"))?,
            r#"{"status":"error","error":"not initialized"}"#
        );

        let stats = Response {
            count: Some(3),
            files: Some(1),
            ..Response::ok()
        };
        assert_eq!(
            serde_json::to_string(&stats)?,
            r#"{"status":"ok","count":3,"files":1}"#
        );
        Ok(())
    }

    #[test]
    fn test_request_serializes_with_cmd_tag() -> anyhow::Result<()> {
        let line = serde_json::to_string(&Request::Search {
            query: "q".to_string(),
            limit: Some(10),
        })?;
        assert_eq!(line, r#"{"cmd":"search","query":"q","limit":10}"#);
        assert_eq!(serde_json::to_string(&Request::Quit)?, r#"{"cmd":"quit"}"#);
        assert_eq!(
            serde_json::to_string(&Request::Init { db_path: None })?,
            r#"{"cmd":"init"}"#
        );
        Ok(())
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(Response::error("boom").error_message(), "boom");
        let reason_only = Response {
            reason: Some("unchanged".to_string()),
            ..Response::with_status(Status::Error)
        };
        assert_eq!(reason_only.error_message(), "unchanged");
        assert_eq!(
            Response::with_status(Status::Error).error_message(),
            "unknown error"
        );
    }
}
