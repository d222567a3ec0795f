use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const BLOCK_OPEN: &str = "<!---";
const BLOCK_CLOSE: &str = "--->";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata block is not closed within the first {0} bytes")]
    Unterminated(usize),
    #[error("invalid metadata block: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("cookie {0:?} is not a valid Set-Cookie name/value pair")]
    InvalidCookie(String),
}

/// RFC 6265 `token`.
fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b))
}

/// RFC 6265 `cookie-octet`s: no controls, whitespace, quote, comma,
/// semicolon or backslash.
fn is_cookie_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_graphic() && !matches!(b, b'"' | b',' | b';' | b'\\'))
}

/// One declared data query.
///
/// Written either as a bare name (`"posts"`, loaded from `posts` and exposed
/// as `posts`) or as a table `{ key = "post", source = "posts/:id" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawQuery")]
pub struct DataQuery {
    pub key: String,
    pub source: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuery {
    Name(String),
    Keyed { key: String, source: String },
}

impl From<RawQuery> for DataQuery {
    fn from(raw: RawQuery) -> Self {
        match raw {
            RawQuery::Name(name) => DataQuery {
                key: name.clone(),
                source: name,
            },
            RawQuery::Keyed { key, source } => DataQuery { key, source },
        }
    }
}

impl DataQuery {
    pub fn named(name: &str) -> Self {
        Self {
            key: name.to_string(),
            source: name.to_string(),
        }
    }
}

/// Directives declared at the head of a templated file.
///
/// Extracted once when the file's route is registered; the values are
/// static for the lifetime of that binding.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Data queries, executed in declaration order.
    pub data: Vec<DataQuery>,
    pub cookies: BTreeMap<String, String>,
    pub session: Map<String, Value>,
    /// Route parameters appended to every pattern of the file.
    pub query: Vec<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
            && self.cookies.is_empty()
            && self.session.is_empty()
            && self.query.is_empty()
    }
}

pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, head: &[u8]) -> Result<Metadata, MetadataError>;
}

/// Reads a TOML block wrapped in `<!--- ... --->` at the very start of a file.
///
/// ```text
/// <!---
/// data = ["posts"]
/// query = ["id"]
/// [cookies]
/// theme = "dark"
/// --->
/// ```
///
/// Files without a leading block carry empty metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadBlockExtractor;

impl MetadataExtractor for HeadBlockExtractor {
    fn extract(&self, head: &[u8]) -> Result<Metadata, MetadataError> {
        let text = String::from_utf8_lossy(head);
        let text = text.trim_start_matches('\u{feff}').trim_start();

        let Some(rest) = text.strip_prefix(BLOCK_OPEN) else {
            return Ok(Metadata::default());
        };
        let end = rest
            .find(BLOCK_CLOSE)
            .ok_or(MetadataError::Unterminated(head.len()))?;

        let metadata: Metadata = toml::from_str(&rest[..end])?;
        if let Some((name, _)) = metadata
            .cookies
            .iter()
            .find(|(name, value)| !is_cookie_name(name) || !is_cookie_value(value))
        {
            return Err(MetadataError::InvalidCookie(name.clone()));
        }
        tracing::trace!(
            "metadata: {} queries, {} cookies, {} session keys",
            metadata.data.len(),
            metadata.cookies.len(),
            metadata.session.len()
        );
        Ok(metadata)
    }
}
