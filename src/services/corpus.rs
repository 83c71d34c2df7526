// Corpus Accessor
// Loads sentences, ground-truth labels and the ISO code mapping table

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::config_store::{CorpusConfig, DEFAULT_MAPPING_ISO_COLUMN};

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("mapping file {0} has no header row")]
    EmptyMapping(PathBuf),
    #[error("corpus index {index} out of range (corpus has {len} sentences)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no label for corpus index {index} (label file has {len} lines)")]
    LabelOutOfRange { index: usize, len: usize },
    #[error("corpus sentence {0} is blank")]
    BlankSentence(usize),
}

#[derive(Debug, Clone)]
pub struct CorpusPaths {
    pub sentences: PathBuf,
    pub labels: PathBuf,
    pub mapping: PathBuf,
    pub mapping_delimiter: char,
    pub mapping_iso_column: String,
}

impl CorpusPaths {
    pub fn new(sentences: impl Into<PathBuf>, labels: impl Into<PathBuf>, mapping: impl Into<PathBuf>) -> Self {
        Self {
            sentences: sentences.into(),
            labels: labels.into(),
            mapping: mapping.into(),
            mapping_delimiter: ';',
            mapping_iso_column: DEFAULT_MAPPING_ISO_COLUMN.to_string(),
        }
    }

    fn files(&self) -> [&Path; 3] {
        [self.sentences.as_path(), self.labels.as_path(), self.mapping.as_path()]
    }
}

impl From<&CorpusConfig> for CorpusPaths {
    fn from(cfg: &CorpusConfig) -> Self {
        Self {
            sentences: cfg.sentences_path.clone(),
            labels: cfg.labels_path.clone(),
            mapping: cfg.mapping_path.clone(),
            mapping_delimiter: cfg.mapping_delimiter,
            mapping_iso_column: cfg.mapping_iso_column.clone(),
        }
    }
}

/// ISO code to internal label table. Collisions keep the first row seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeMapping {
    by_iso: HashMap<String, String>,
}

impl CodeMapping {
    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut mapping = Self::default();
        for (iso, label) in pairs {
            mapping.insert(iso.into(), label.into());
        }
        mapping
    }

    fn insert(&mut self, iso: String, label: String) {
        let iso = iso.trim().to_string();
        if iso.is_empty() {
            return;
        }
        self.by_iso.entry(iso).or_insert_with(|| label.trim().to_string());
    }

    pub fn label_for(&self, iso: &str) -> Option<&str> {
        self.by_iso.get(iso.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_iso.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_iso.is_empty()
    }

    /// Parse a delimited table with a header row. Column 0 holds the internal
    /// label; the ISO column is found by header name, else column 1.
    pub fn parse(content: &str, delimiter: char, iso_column: &str) -> Option<Self> {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<&str> = lines.next()?.split(delimiter).map(str::trim).collect();
        let iso_idx = header
            .iter()
            .position(|h| h.trim_matches('"') == iso_column)
            .unwrap_or(1);

        let mut mapping = Self::default();
        for line in lines {
            let cols: Vec<&str> = line.split(delimiter).collect();
            if cols.len() <= iso_idx {
                continue;
            }
            mapping.insert(
                cols[iso_idx].trim_matches('"').to_string(),
                cols[0].trim_matches('"').to_string(),
            );
        }
        Some(mapping)
    }
}

/// Sentences, labels and mapping of one corpus, line-aligned by index.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    sentences: Vec<String>,
    labels: Vec<String>,
    mapping: CodeMapping,
}

impl Corpus {
    pub fn new(sentences: Vec<String>, labels: Vec<String>, mapping: CodeMapping) -> Self {
        let labels = labels.into_iter().map(|l| l.trim().to_string()).collect();
        Self { sentences, labels, mapping }
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn mapping(&self) -> &CodeMapping {
        &self.mapping
    }

    pub fn sentence(&self, index: usize) -> Result<&str, CorpusError> {
        self.sentences
            .get(index)
            .map(String::as_str)
            .ok_or(CorpusError::IndexOutOfRange { index, len: self.sentences.len() })
    }

    pub fn label(&self, index: usize) -> Result<&str, CorpusError> {
        self.labels
            .get(index)
            .map(String::as_str)
            .ok_or(CorpusError::LabelOutOfRange { index, len: self.labels.len() })
    }

    /// Normalized sentences for the given indices, in the given order.
    /// A line that normalizes to nothing is a corpus defect, not a caller error.
    pub fn normalized_sentences(&self, indices: &[usize]) -> Result<Vec<String>, CorpusError> {
        indices
            .iter()
            .map(|&i| {
                let sentence = normalize_sentence(self.sentence(i)?);
                if sentence.trim().is_empty() {
                    return Err(CorpusError::BlankSentence(i));
                }
                Ok(sentence)
            })
            .collect()
    }

    pub fn load(paths: &CorpusPaths) -> Result<Self, CorpusError> {
        let sentences = read_lines(&paths.sentences)?;
        let labels = read_lines(&paths.labels)?;
        let mapping_src = read_file(&paths.mapping)?;
        let mapping = CodeMapping::parse(&mapping_src, paths.mapping_delimiter, &paths.mapping_iso_column)
            .ok_or_else(|| CorpusError::EmptyMapping(paths.mapping.clone()))?;

        let blank = sentences.iter().filter(|s| s.trim().is_empty()).count();
        if blank > 0 {
            warn!(blank, path = %paths.sentences.display(), "corpus.blank_sentences");
        }
        info!(
            sentences = sentences.len(),
            labels = labels.len(),
            mapping = mapping.len(),
            "corpus.loaded"
        );
        Ok(Self::new(sentences, labels, mapping))
    }
}

fn sentence_separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,\r\n]").expect("separator pattern is valid"))
}

/// Make a sentence safe for comma-joined batches: commas become spaces and
/// line breaks are dropped.
pub fn normalize_sentence(text: &str) -> String {
    sentence_separators()
        .replace_all(text, |caps: &regex::Captures| {
            if &caps[0] == "," { " " } else { "" }
        })
        .into_owned()
}

fn read_file(path: &Path) -> Result<String, CorpusError> {
    fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_lines(path: &Path) -> Result<Vec<String>, CorpusError> {
    Ok(read_file(path)?.lines().map(str::to_string).collect())
}

type Stamp = Option<(SystemTime, u64)>;

fn stamp(path: &Path) -> Stamp {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

struct CachedCorpus {
    stamps: [Stamp; 3],
    corpus: Arc<Corpus>,
}

/// Process-wide corpus cache, reloaded when any backing file changes.
pub struct CorpusStore {
    paths: CorpusPaths,
    cache: RwLock<Option<CachedCorpus>>,
}

impl CorpusStore {
    pub fn new(paths: CorpusPaths) -> Self {
        Self {
            paths,
            cache: RwLock::new(None),
        }
    }

    pub fn paths(&self) -> &CorpusPaths {
        &self.paths
    }

    pub fn get(&self) -> Result<Arc<Corpus>, CorpusError> {
        let stamps = self.paths.files().map(stamp);

        if let Ok(guard) = self.cache.read() {
            if let Some(cached) = guard.as_ref() {
                if cached.stamps == stamps && stamps.iter().all(Option::is_some) {
                    return Ok(Arc::clone(&cached.corpus));
                }
            }
        }

        debug!("corpus.cache_miss");
        let corpus = Arc::new(Corpus::load(&self.paths)?);
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(CachedCorpus {
                stamps,
                corpus: Arc::clone(&corpus),
            });
        }
        Ok(corpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING: &str = "Label;English;Wiki Code;ISO 369-3\nfra;French;fr;fra\neng;English;en;eng\nsco;Scots;en;sco\nzxx;None;;zxx\n";

    fn write_corpus(dir: &Path, sentences: &str, labels: &str) -> CorpusPaths {
        let paths = CorpusPaths::new(dir.join("x.txt"), dir.join("y.txt"), dir.join("labels.csv"));
        fs::write(&paths.sentences, sentences).unwrap();
        fs::write(&paths.labels, labels).unwrap();
        fs::write(&paths.mapping, MAPPING).unwrap();
        paths
    }

    #[test]
    fn test_mapping_by_header_first_match_wins() {
        let mapping = CodeMapping::parse(MAPPING, ';', "Wiki Code").unwrap();
        assert_eq!(mapping.label_for("fr"), Some("fra"));
        assert_eq!(mapping.label_for("en"), Some("eng"));
        assert_eq!(mapping.label_for("de"), None);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_mapping_falls_back_to_second_column() {
        let mapping = CodeMapping::parse("label,iso\nfra,fr\n", ',', "Wiki Code").unwrap();
        assert_eq!(mapping.label_for("fr"), Some("fra"));
        assert!(CodeMapping::parse("", ';', "Wiki Code").is_none());
    }

    #[test]
    fn test_normalize_sentence() {
        assert_eq!(normalize_sentence("Hello, world\n"), "Hello  world");
        assert_eq!(normalize_sentence("a,b\r\nc"), "a bc");
    }

    #[test]
    fn test_normalized_join_split_round_trip() {
        let sentences = ["Bonjour le monde\n", "Hello world", "Hallo Welt\r\n"];
        let normalized: Vec<String> = sentences.iter().map(|s| normalize_sentence(s)).collect();
        let joined = normalized.join(",");
        let parts: Vec<&str> = joined.split(',').collect();
        assert_eq!(parts.len(), sentences.len());
        assert!(parts.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_corpus(dir.path(), "Bonjour, le monde\nHello world\n", "fra \neng\n");
        let corpus = Corpus::load(&paths).unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.label(0).unwrap(), "fra");
        assert_eq!(corpus.normalized_sentences(&[1, 0]).unwrap(), vec!["Hello world", "Bonjour  le monde"]);
        assert!(matches!(
            corpus.sentence(2),
            Err(CorpusError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_blank_sentence_is_corpus_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_corpus(dir.path(), "Hello world

,
", "eng
fra
eng
");
        let corpus = Corpus::load(&paths).unwrap();

        assert_eq!(corpus.len(), 3);
        assert!(matches!(corpus.normalized_sentences(&[0, 1]), Err(CorpusError::BlankSentence(1))));
        assert!(matches!(corpus.normalized_sentences(&[2]), Err(CorpusError::BlankSentence(2))));
        assert!(corpus.normalized_sentences(&[0]).is_ok());
    }

    #[test]
    fn test_label_mismatch_is_reported_on_lookup() {
        let corpus = Corpus::new(vec!["a".into(), "b".into()], vec!["eng".into()], CodeMapping::default());
        assert!(matches!(corpus.label(1), Err(CorpusError::LabelOutOfRange { index: 1, len: 1 })));
    }

    #[test]
    fn test_store_reloads_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_corpus(dir.path(), "one\n", "eng\n");
        let store = CorpusStore::new(paths.clone());

        let first = store.get().unwrap();
        let again = store.get().unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        // Length change is enough to invalidate even within mtime granularity.
        fs::write(&paths.sentences, "one\ntwo\n").unwrap();
        fs::write(&paths.labels, "eng\nfra\n").unwrap();
        let reloaded = store.get().unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let store = CorpusStore::new(CorpusPaths::new("/nonexistent/x", "/nonexistent/y", "/nonexistent/z"));
        assert!(matches!(store.get(), Err(CorpusError::Io { .. })));
    }
}
