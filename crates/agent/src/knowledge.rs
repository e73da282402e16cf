//! Company knowledge base for the help agent.
//!
//! Plain-text and Markdown documents are split into overlapping character chunks and ranked
//! against a query by term overlap.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use onboard_core::config::KnowledgeConfig;

use crate::tools::{parse_args, Tool};

pub const SEARCH_KNOWLEDGE_BASE: &str = "search_knowledge_base";
pub const NOT_AVAILABLE: &str = "Knowledge base search is not available.";
pub const NO_RESULTS: &str = "No relevant documents found in the knowledge base.";

const DOCUMENT_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub source: String,
    pub text: String,
    terms: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
    chunks: Vec<Chunk>,
    top_k: usize,
}

impl KnowledgeBase {
    pub fn new(top_k: usize) -> Self {
        Self { chunks: Vec::new(), top_k }
    }

    /// Loads every document under `config.documents_dir`. Returns `None` when the directory
    /// is missing or holds no documents.
    pub async fn load(config: &KnowledgeConfig) -> Result<Option<Self>> {
        let files = match document_files(&config.documents_dir).await {
            Ok(files) => files,
            Err(error) => {
                warn!(
                    event_name = "knowledge.unavailable",
                    dir = %config.documents_dir.display(),
                    error = %error,
                    "knowledge base directory could not be read"
                );
                return Ok(None);
            }
        };

        let mut base = Self::new(config.top_k);
        for path in files {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read `{}`", path.display()))?;
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            base.add_document(&source, &text, config.chunk_size, config.chunk_overlap);
        }

        if base.is_empty() {
            return Ok(None);
        }
        info!(event_name = "knowledge.loaded", chunks = base.len(), "knowledge base loaded");
        Ok(Some(base))
    }

    pub fn add_document(&mut self, source: &str, text: &str, chunk_size: usize, overlap: usize) {
        for piece in split_text(text, chunk_size, overlap) {
            let terms = tokenize(&piece);
            self.chunks.push(Chunk { source: source.to_string(), text: piece, terms });
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Best `top_k` chunks, ranked by distinct query terms matched, then by total matches.
    pub fn search(&self, query: &str) -> Vec<&Chunk> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(index, chunk)| {
                let mut counts: HashMap<&str, usize> = HashMap::new();
                for term in chunk.terms.iter().filter(|term| query_terms.contains(*term)) {
                    *counts.entry(term.as_str()).or_default() += 1;
                }
                let distinct = counts.len();
                let total: usize = counts.values().sum();
                (distinct > 0).then_some((index, distinct, total))
            })
            .collect();

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));
        scored.into_iter().take(self.top_k).map(|(index, _, _)| &self.chunks[index]).collect()
    }
}

async fn document_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if extension == "pdf" {
            warn!(
                event_name = "knowledge.document_skipped",
                path = %path.display(),
                "PDF documents are not parsed; export them to .txt or .md"
            );
            continue;
        }
        let supported = DOCUMENT_EXTENSIONS.contains(&extension.as_str());
        if supported && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Splits `text` into windows of `chunk_size` characters, each starting `chunk_size - overlap`
/// characters after the previous one.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

pub struct KnowledgeSearchTool {
    base: Option<Arc<KnowledgeBase>>,
}

impl KnowledgeSearchTool {
    pub fn new(base: Option<Arc<KnowledgeBase>>) -> Self {
        Self { base }
    }
}

#[derive(Deserialize)]
struct KnowledgeArgs {
    query: String,
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &'static str {
        SEARCH_KNOWLEDGE_BASE
    }

    fn description(&self) -> &'static str {
        "Searches the company knowledge base: values, culture, internal organization and policies."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let Some(base) = &self.base else {
            return Ok(Value::String(NOT_AVAILABLE.to_string()));
        };
        let args: KnowledgeArgs = parse_args(SEARCH_KNOWLEDGE_BASE, input)?;
        let hits = base.search(&args.query);
        if hits.is_empty() {
            return Ok(Value::String(NO_RESULTS.to_string()));
        }

        let results: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(index, chunk)| format!("Result {}:\n{}\n", index + 1, chunk.text))
            .collect();
        Ok(Value::String(results.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use onboard_core::config::KnowledgeConfig;

    use super::{split_text, KnowledgeBase, KnowledgeSearchTool, NOT_AVAILABLE, NO_RESULTS};
    use crate::tools::Tool;

    #[test]
    fn chunks_overlap_by_the_configured_amount() {
        let text: String = ('a'..='z').cycle().take(1_000).collect();

        let chunks = split_text(&text, 500, 100);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 500);
        assert_eq!(&chunks[0][400..500], &chunks[1][0..100]);
        assert_eq!(chunks[2].chars().count(), 200);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(split_text("  hello  ", 500, 100), vec!["hello".to_string()]);
        assert!(split_text("", 500, 100).is_empty());
    }

    #[test]
    fn search_ranks_by_matched_terms_and_caps_results() {
        let mut base = KnowledgeBase::new(2);
        base.add_document("values.md", "Our values: transparency and ownership.", 500, 100);
        base.add_document("tools.md", "We track work in Jira and chat in Discord.", 500, 100);
        base.add_document("jira.md", "Jira boards are reviewed every Monday. Jira rocks.", 500, 100);
        base.add_document("misc.md", "Lunch is served at noon.", 500, 100);

        let hits = base.search("How do we use Jira and Discord?");

        let sources: Vec<&str> = hits.iter().map(|chunk| chunk.source.as_str()).collect();
        assert_eq!(sources, vec!["tools.md", "jira.md"]);
        assert!(base.search("??").is_empty());
    }

    #[tokio::test]
    async fn tool_formats_numbered_results() {
        let mut base = KnowledgeBase::new(3);
        base.add_document("values.md", "Our values: transparency and ownership.", 500, 100);
        let tool = KnowledgeSearchTool::new(Some(Arc::new(base)));

        let output = tool.execute(json!({ "query": "company values" })).await.expect("search");
        assert_eq!(output, json!("Result 1:\nOur values: transparency and ownership.\n"));

        let none = tool.execute(json!({ "query": "parking" })).await.expect("search");
        assert_eq!(none, json!(NO_RESULTS));
    }

    #[tokio::test]
    async fn missing_index_is_reported() {
        let tool = KnowledgeSearchTool::new(None);

        let output = tool.execute(json!({ "query": "values" })).await.expect("search");

        assert_eq!(output, json!(NOT_AVAILABLE));
    }

    #[tokio::test]
    async fn load_reads_supported_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("culture.md"), "We value ownership.").expect("write");
        std::fs::write(dir.path().join("logo.png"), [0_u8, 1, 2]).expect("write");
        let config = KnowledgeConfig {
            documents_dir: dir.path().to_path_buf(),
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 3,
        };

        let base = KnowledgeBase::load(&config).await.expect("load").expect("documents");
        assert_eq!(base.len(), 1);

        let missing = KnowledgeConfig { documents_dir: dir.path().join("absent"), ..config };
        assert!(KnowledgeBase::load(&missing).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn pdf_only_directories_leave_the_index_unloaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("Onboarding.PDF"), b"%PDF-1.7").expect("write");
        let config = KnowledgeConfig {
            documents_dir: dir.path().to_path_buf(),
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 3,
        };

        assert!(KnowledgeBase::load(&config).await.expect("load").is_none());
    }
}
