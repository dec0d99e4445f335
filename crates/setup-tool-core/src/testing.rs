//! Test doubles for the injected collaborators.
//!
//! Enabled for unit tests and, through the `test-utils` feature, for
//! integration tests and downstream crates.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::actions::Diagnostics;
use crate::cache::{CacheStore, ToolCache};
use crate::config::{ExtractionKind, ToolIdentity};
use crate::download::Downloader;
use crate::extract::Extractor;
use crate::github::{Release, ReleaseRegistry, ResolvedDownload};
use crate::{Error, Result};

/// One recorded diagnostics call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// `debug` call
    Debug(String),
    /// `info` call
    Info(String),
    /// `error` call
    Error(String),
    /// `start_group` call
    StartGroup(String),
    /// `end_group` call
    EndGroup,
}

/// Diagnostics that remember every call.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingDiagnostics {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call, in order.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }

    fn collect(&self, pick: impl Fn(&DiagnosticEvent) -> Option<&String>) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| pick(event).cloned())
            .collect()
    }

    /// Messages passed to `debug`.
    pub fn debugs(&self) -> Vec<String> {
        self.collect(|e| match e {
            DiagnosticEvent::Debug(m) => Some(m),
            _ => None,
        })
    }

    /// Messages passed to `info`.
    pub fn infos(&self) -> Vec<String> {
        self.collect(|e| match e {
            DiagnosticEvent::Info(m) => Some(m),
            _ => None,
        })
    }

    /// Messages passed to `error`.
    pub fn errors(&self) -> Vec<String> {
        self.collect(|e| match e {
            DiagnosticEvent::Error(m) => Some(m),
            _ => None,
        })
    }

    /// Titles of every group opened.
    pub fn groups(&self) -> Vec<String> {
        self.collect(|e| match e {
            DiagnosticEvent::StartGroup(m) => Some(m),
            _ => None,
        })
    }

    /// Groups opened but not yet closed.
    pub fn open_groups(&self) -> usize {
        let events = self.events.lock().unwrap();
        let opened = events
            .iter()
            .filter(|e| matches!(e, DiagnosticEvent::StartGroup(_)))
            .count();
        let closed = events
            .iter()
            .filter(|e| matches!(e, DiagnosticEvent::EndGroup))
            .count();
        opened.saturating_sub(closed)
    }

    fn push(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn debug(&self, message: &str) {
        self.push(DiagnosticEvent::Debug(message.to_string()));
    }

    fn info(&self, message: &str) {
        self.push(DiagnosticEvent::Info(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(DiagnosticEvent::Error(message.to_string()));
    }

    fn start_group(&self, title: &str) {
        self.push(DiagnosticEvent::StartGroup(title.to_string()));
    }

    fn end_group(&self) {
        self.push(DiagnosticEvent::EndGroup);
    }
}

/// In-memory release registry. Unknown releases answer with HTTP 404.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    releases: HashMap<(String, String, String), Release>,
    latest: HashMap<(String, String), String>,
    calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl FakeRegistry {
    /// A registry with no releases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `release` for its tag.
    #[must_use]
    pub fn with_release(mut self, owner: &str, repo: &str, release: Release) -> Self {
        self.releases.insert(
            (owner.to_string(), repo.to_string(), release.tag_name.clone()),
            release,
        );
        self
    }

    /// Report `tag` as the latest release.
    #[must_use]
    pub fn with_latest(mut self, owner: &str, repo: &str, tag: &str) -> Self {
        self.latest
            .insert((owner.to_string(), repo.to_string()), tag.to_string());
        self
    }

    /// Number of registry queries made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tokens presented, in call order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    fn record(&self, token: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.to_string());
    }
}

fn not_found(what: String) -> Error {
    Error::Transport {
        message: format!("Request to {what} failed (HTTP 404 Not Found)"),
        status: Some(404),
        source: None,
    }
}

#[async_trait]
impl ReleaseRegistry for FakeRegistry {
    async fn release_by_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
        token: &str,
    ) -> Result<Release> {
        self.record(token);
        self.releases
            .get(&(owner.to_string(), repo.to_string(), tag.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("{owner}/{repo} release {tag}")))
    }

    async fn latest_release(&self, owner: &str, repo: &str, token: &str) -> Result<Release> {
        self.record(token);
        self.latest
            .get(&(owner.to_string(), repo.to_string()))
            .map(|tag| Release {
                tag_name: tag.clone(),
                assets: Vec::new(),
            })
            .ok_or_else(|| not_found(format!("{owner}/{repo} latest release")))
    }
}

/// A real [`ToolCache`] that counts registrations.
#[derive(Debug)]
pub struct FakeCache {
    inner: ToolCache,
    registrations: AtomicUsize,
    last_source: Mutex<Option<PathBuf>>,
}

impl FakeCache {
    /// Wrap a real cache rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            inner: ToolCache::new(root),
            registrations: AtomicUsize::new(0),
            last_source: Mutex::new(None),
        }
    }

    /// Number of `register` calls.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// The directory most recently handed to `register`.
    pub fn last_source(&self) -> Option<PathBuf> {
        self.last_source.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheStore for FakeCache {
    async fn find(&self, tool: &ToolIdentity) -> Option<PathBuf> {
        self.inner.find(tool).await
    }

    async fn register(&self, source: &Path, tool: &ToolIdentity) -> Result<PathBuf> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        *self.last_source.lock().unwrap() = Some(source.to_path_buf());
        self.inner.register(source, tool).await
    }
}

/// Downloader that writes fixed bytes, or always fails.
#[derive(Debug, Default)]
pub struct FakeDownloader {
    body: Option<Vec<u8>>,
    requests: Mutex<Vec<ResolvedDownload>>,
}

impl FakeDownloader {
    /// Every download writes `body`.
    #[must_use]
    pub fn new(body: &[u8]) -> Self {
        Self {
            body: Some(body.to_vec()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every download fails with a transport error.
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Number of download attempts.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every download requested, in order.
    pub fn requests(&self) -> Vec<ResolvedDownload> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, download: &ResolvedDownload, dest: &Path) -> Result<PathBuf> {
        self.requests.lock().unwrap().push(download.clone());
        let Some(body) = &self.body else {
            return Err(Error::transport(format!(
                "Failed to download {}: connection refused",
                download.url
            )));
        };
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, body)?;
        Ok(dest.to_path_buf())
    }
}

/// Extractor that lays out a fixed set of files instead of unpacking.
#[derive(Debug)]
pub struct FakeExtractor {
    files: Vec<String>,
    calls: AtomicUsize,
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self::with_files(&["bin/tool", "jq-1.7.1/bin/jq"])
    }
}

impl FakeExtractor {
    /// Lay out `files` under the destination on each call.
    #[must_use]
    pub fn with_files(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(ToString::to_string).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of extract calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, _kind: ExtractionKind, _archive: &Path, dest: &Path) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for file in &self.files {
            let path = dest.join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, file.as_bytes())?;
        }
        Ok(dest.to_path_buf())
    }
}

/// Write a gzip tarball with the given files, each mode `0o755`.
pub fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(name).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
}

/// Write a zip archive with the given files.
pub fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);

    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }

    zip.finish().unwrap();
}
