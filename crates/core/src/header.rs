//! Userscript metadata header extraction and parsing.
//!
//! A userscript carries its metadata as comment lines at the top of the file:
//!
//! ```text
//! // ==UserScript==
//! // @name        Example
//! // @namespace   tools
//! // ==/UserScript==
//! ```
//!
//! [`HeaderExtractor`] finds that block incrementally while a file is still
//! being received, so a large script never has to be decoded as a whole just to
//! read its first few lines. [`parse_header`] turns the block interior into a
//! [`HeaderMap`].

use futures::{Stream, StreamExt};
use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Line that opens a header block.
pub const HEADER_START: &str = "// ==UserScript==";

/// Line that closes a header block.
pub const HEADER_END: &str = "// ==/UserScript==";

/// Header block, matched on raw bytes so that a UTF-8 sequence split across
/// chunks is reassembled before anything is decoded. Lines may end in `\n`,
/// `\r\n` or a lone `\r`.
static BLOCK_RE: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r"(?mR)^// ==UserScript==((?s-u:.)*?)^// ==/UserScript==")
        .expect("header block pattern is valid")
});

/// A single `// @key value` annotation line.
static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"// @(\S+)(?:\s+(.*))?").expect("header line pattern is valid"));

/// Order in which [`HeaderMap::to_header_block`] emits annotation lines.
///
/// Served meta documents have always listed keys last-seen-first. That is kept
/// as the default so existing clients see identical output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmitOrder {
    /// Reverse of the order in which keys were first seen while parsing.
    #[default]
    ReverseParseOrder,
    /// Same order in which keys were first seen while parsing.
    ParseOrder,
}

/// Ordered key/value metadata parsed from a header block.
///
/// A key keeps the position where it was first seen; inserting it again only
/// replaces the value. Serialized as an array of `[key, value]` pairs so the
/// order survives persistence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, returning the previous value if the key was present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `@name` value, if present.
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    /// The `@namespace` value, if present.
    pub fn namespace(&self) -> Option<&str> {
        self.get("namespace")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in parse order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render the map back into a complete header block.
    pub fn to_header_block(&self, order: EmitOrder) -> String {
        let mut lines: Vec<String> = self
            .iter()
            .map(|(key, value)| format!("// @{key}    {value}"))
            .collect();
        if order == EmitOrder::ReverseParseOrder {
            lines.reverse();
        }

        let mut out = String::with_capacity(64 + lines.iter().map(|l| l.len() + 1).sum::<usize>());
        out.push_str(HEADER_START);
        out.push('\n');
        out.push_str(&lines.join("\n"));
        out.push('\n');
        out.push_str(HEADER_END);
        out.push('\n');
        out
    }
}

impl From<Vec<(String, String)>> for HeaderMap {
    fn from(entries: Vec<(String, String)>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<HeaderMap> for Vec<(String, String)> {
    fn from(map: HeaderMap) -> Self {
        map.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Parse the interior of a header block.
///
/// Lines that are not `// @key [value]` annotations are dropped. A key that
/// appears twice keeps its first position and its last value.
pub fn parse_header(interior: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for line in interior.split(['\r', '\n']) {
        let line = line.trim_end();
        let Some(caps) = LINE_RE.captures(line) else {
            continue;
        };
        let value = caps.get(2).map_or("", |m| m.as_str());
        headers.insert(&caps[1], value);
    }

    headers
}

/// Incremental header block finder.
///
/// Chunks are appended to an internal buffer and the whole buffer is rescanned
/// after every push, so a block spanning any number of chunk boundaries is
/// found. Once a block has been found the extractor is done and ignores any
/// further input.
#[derive(Debug, Default)]
pub struct HeaderExtractor {
    buf: Vec<u8>,
    done: bool,
}

impl HeaderExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and try to locate the header block.
    ///
    /// Returns the parsed header the first time a complete block is present,
    /// `None` otherwise (including every call after the first success).
    pub fn push(&mut self, chunk: &[u8]) -> Option<HeaderMap> {
        if self.done {
            return None;
        }
        self.buf.extend_from_slice(chunk);

        let headers = {
            let caps = BLOCK_RE.captures(&self.buf)?;
            parse_header(&String::from_utf8_lossy(&caps[1]))
        };

        self.done = true;
        self.buf = Vec::new();
        Some(headers)
    }

    /// Whether a header block has already been found.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes accumulated while searching.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

/// Find the header in a sequence of chunks.
///
/// Chunks are pulled one at a time and iteration stops at the chunk that
/// completes the block. `None` means the sequence ended without a block.
pub fn extract_header<I>(chunks: I) -> Option<HeaderMap>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut extractor = HeaderExtractor::new();
    for chunk in chunks {
        if let Some(headers) = extractor.push(chunk.as_ref()) {
            return Some(headers);
        }
    }
    None
}

/// Find the header in a fallible byte stream, e.g. a download body.
///
/// The stream is not polled again once the block is found. Stream errors are
/// returned as-is.
pub async fn extract_header_from_stream<S, B, E>(stream: S) -> Result<Option<HeaderMap>, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut stream = std::pin::pin!(stream);
    let mut extractor = HeaderExtractor::new();
    while let Some(chunk) = stream.next().await {
        if let Some(headers) = extractor.push(chunk?.as_ref()) {
            return Ok(Some(headers));
        }
    }
    Ok(None)
}
