use crate::context::{Context, Payload};
use crate::error::RoutexError;
use crate::pipeline::{sequence, Stage};
use crate::session::Session;
use bytes::Bytes;
use routex_codec::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maps a declared output type to its `Content-Type` header value.
pub fn mime_for(kind: &str) -> String {
    let mime = match kind {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" | "text" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        other if other.contains('/') => other,
        _ => "application/octet-stream",
    };
    mime.to_string()
}

/// An incoming request, as far as handlers are concerned.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub path: String,
    /// Route parameters captured by the matched pattern.
    pub params: Context,
    pub session: Session,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    /// `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        format!("{}={}; Path=/", self.name, self.value)
    }
}

/// The single terminal response of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub cookies: Vec<Cookie>,
    pub body: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: None,
            cookies: Vec::new(),
            body: Bytes::new(),
        }
    }
}

impl Response {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.cookies.push(Cookie {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    fn send(&mut self, content_type: &str, body: Bytes) {
        self.status = 200;
        self.content_type = Some(content_type.to_string());
        self.body = body;
    }

    fn fail(&mut self, status: u16) {
        self.status = status;
        self.content_type = None;
        self.body = Bytes::new();
    }
}

/// Serves one file. Shared by every pattern the file is bound to.
pub struct Handler {
    source: PathBuf,
    content_type: String,
    metadata: Arc<Metadata>,
    tasks: Vec<Stage<Payload>>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("source", &self.source)
            .field("content_type", &self.content_type)
            .field("stages", &self.tasks.len())
            .finish()
    }
}

impl Handler {
    pub fn new(source: PathBuf, kind: &str, metadata: Metadata, tasks: Vec<Stage<Payload>>) -> Self {
        Self {
            source,
            content_type: mime_for(kind),
            metadata: Arc::new(metadata),
            tasks,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Applies the declared cookies and session keys, then runs the stages
    /// from the request's route parameters.
    ///
    /// The side effects land before the first stage starts, whatever the
    /// outcome. A failed run is logged and answered with a bare 500.
    pub async fn handle(&self, request: &mut Request) -> Response {
        let mut response = Response::default();

        for (name, value) in &self.metadata.cookies {
            response.set_cookie(name, value);
        }
        for (key, value) in &self.metadata.session {
            request.session.insert(key.clone(), value.clone());
        }

        let outcome = sequence(&self.tasks, Payload::Context(request.params.clone())).await;
        match outcome {
            Ok(Payload::Body(body)) => response.send(&self.content_type, body),
            Ok(Payload::Context(_)) => {
                let err = RoutexError::Stage(format!("{} produced no body", self.source.display()));
                tracing::error!("{} {}: {}", request.path, self.source.display(), err);
                response.fail(500);
            }
            Err(err) => {
                tracing::error!("{} {}: {}", request.path, self.source.display(), err);
                response.fail(500);
            }
        }
        response
    }
}
