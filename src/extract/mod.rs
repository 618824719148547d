//! Content extraction: apply a filter to a snapshot and build the prompt text

use crate::domain::{
    ExcludedFile, ExtractionResult, ExtractionTotals, FileError, FileRecord, FilterSpec,
    IncludedFile, PatternDecision, SkipReason, StructureSummary,
};
use crate::error::ExtractionError;
use crate::render::file_block;
use crate::utils::{content_digest, estimate_tokens, read_file_safe};
use rayon::prelude::*;
use std::ops::ControlFlow;
use std::path::Path;

/// Files read concurrently before the budget is checked again.
const READ_BATCH: usize = 32;

pub struct ContentExtractor {
    max_output_bytes: u64,
}

impl ContentExtractor {
    pub fn new(max_output_bytes: u64) -> Self {
        Self { max_output_bytes }
    }

    /// Read every file the filter admits, in summary order.
    ///
    /// A file is skipped for the first matching reason: pattern checks, then
    /// binary content, then size. Read failures are recorded per file.
    pub fn extract(
        &self,
        root: &Path,
        summary: &StructureSummary,
        filter: &FilterSpec,
    ) -> Result<ExtractionResult, ExtractionError> {
        let matcher = filter.matcher()?;
        let mut excluded = Vec::new();
        let mut candidates: Vec<&FileRecord> = Vec::new();

        for file in &summary.files {
            let reason = match matcher.decide(&file.path) {
                PatternDecision::ExcludedByPattern => Some(SkipReason::ExcludedByPattern),
                PatternDecision::NotIncluded => Some(SkipReason::NotIncluded),
                PatternDecision::Included if file.is_binary => Some(SkipReason::Binary),
                PatternDecision::Included if file.size > filter.max_file_size() => {
                    Some(SkipReason::TooLarge)
                }
                PatternDecision::Included => None,
            };
            match reason {
                Some(reason) => excluded.push(ExcludedFile { path: file.path.clone(), reason }),
                None => candidates.push(file),
            }
        }

        let mut content = String::new();
        let mut included = Vec::new();
        let mut errors = Vec::new();

        let consumed = read_in_order(
            &candidates,
            READ_BATCH,
            |file| read_file_safe(&root.join(&file.path)),
            |file, read| {
                let text = match read {
                    Ok(decoded) => decoded.content,
                    Err(e) => {
                        tracing::debug!(path = %file.path, error = %e, "failed reading file");
                        errors.push(FileError { path: file.path.clone(), message: e.to_string() });
                        return ControlFlow::Continue(());
                    }
                };
                if !text.is_empty() {
                    let block = file_block(&file.path, &text);
                    if (content.len() + block.len()) as u64 > self.max_output_bytes {
                        tracing::warn!(
                            limit = self.max_output_bytes,
                            path = %file.path,
                            "output budget reached, skipping remaining files"
                        );
                        excluded.push(ExcludedFile {
                            path: file.path.clone(),
                            reason: SkipReason::OutputBudget,
                        });
                        return ControlFlow::Break(());
                    }
                    content.push_str(&block);
                }
                included.push(IncludedFile { path: file.path.clone(), size: file.size });
                ControlFlow::Continue(())
            },
        );
        excluded.extend(candidates[consumed..].iter().map(|file| ExcludedFile {
            path: file.path.clone(),
            reason: SkipReason::OutputBudget,
        }));

        let totals = ExtractionTotals {
            files_included: included.len(),
            files_excluded: excluded.len(),
            files_failed: errors.len(),
            bytes_included: included.iter().map(|f| f.size).sum(),
            estimated_tokens: estimate_tokens(&content),
        };
        tracing::info!(
            included = totals.files_included,
            excluded = totals.files_excluded,
            failed = totals.files_failed,
            bytes = totals.bytes_included,
            "content extracted"
        );

        let digest = content_digest(&content);
        Ok(ExtractionResult { content, included, excluded, errors, totals, digest })
    }
}

/// Read `items` in order, `batch` at a time on the rayon pool, handing each
/// result to `consume` until it breaks. Returns how many items were consumed;
/// nothing past the batch that broke is read.
fn read_in_order<T, R>(
    items: &[T],
    batch: usize,
    read: impl Fn(&T) -> R + Sync,
    mut consume: impl FnMut(&T, R) -> ControlFlow<()>,
) -> usize
where
    T: Sync,
    R: Send,
{
    let mut consumed = 0;
    for chunk in items.chunks(batch.max(1)) {
        let reads: Vec<R> = chunk.par_iter().map(&read).collect();
        for (item, value) in chunk.iter().zip(reads) {
            consumed += 1;
            if consume(item, value).is_break() {
                return consumed;
            }
        }
    }
    consumed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FilterOrigin;
    use crate::scan::StructureAnalyzer;
    use crate::config::ScanSettings;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const MB: u64 = 10 * 1024 * 1024;

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn analyze(root: &Path) -> StructureSummary {
        StructureAnalyzer::new(ScanSettings::default()).analyze_dir(root, "demo").unwrap()
    }

    fn spec(include: &[&str], exclude: &[&str], max: u64) -> FilterSpec {
        FilterSpec::new(
            include.iter().map(|s| s.to_string()).collect(),
            exclude.iter().map(|s| s.to_string()).collect(),
            max,
            FilterOrigin::Explicit,
        )
    }

    #[test]
    fn binary_and_text_without_filters() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/main.py", &[b'x'; 1024]);
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00];
        png.resize(500 * 1024, 0xab);
        write(tmp.path(), "assets/logo.png", &png);

        let summary = analyze(tmp.path());
        let result = ContentExtractor::new(MB)
            .extract(tmp.path(), &summary, &FilterSpec::match_all(50 * 1024, FilterOrigin::MatchAll))
            .unwrap();

        assert!(result.is_included("src/main.py"));
        assert_eq!(result.excluded_reason("assets/logo.png"), Some(SkipReason::Binary));
        assert!(result.content.contains("File: src/main.py"));
    }

    #[test]
    fn exclude_beats_include() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "main.py", b"print('main')\n");
        write(tmp.path(), "tests/test_main.py", b"def test(): pass\n");
        write(tmp.path(), "README.md", b"# demo\n");

        let summary = analyze(tmp.path());
        let result = ContentExtractor::new(MB)
            .extract(tmp.path(), &summary, &spec(&["*.py"], &["test_*.py"], 1024))
            .unwrap();

        assert!(result.is_included("main.py"));
        assert_eq!(
            result.excluded_reason("tests/test_main.py"),
            Some(SkipReason::ExcludedByPattern)
        );
        assert_eq!(result.excluded_reason("README.md"), Some(SkipReason::NotIncluded));
    }

    #[test]
    fn size_cap_is_inclusive() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "exact.txt", &[b'a'; 100]);
        write(tmp.path(), "over.txt", &[b'a'; 101]);

        let summary = analyze(tmp.path());
        let result = ContentExtractor::new(MB)
            .extract(tmp.path(), &summary, &spec(&[], &[], 100))
            .unwrap();

        assert!(result.is_included("exact.txt"));
        assert_eq!(result.excluded_reason("over.txt"), Some(SkipReason::TooLarge));
    }

    #[test]
    fn pattern_reason_precedes_binary_and_size() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "blob.bin", &[0u8; 10]);
        write(tmp.path(), "big.log", &[b'a'; 500]);

        let summary = analyze(tmp.path());
        let result = ContentExtractor::new(MB)
            .extract(tmp.path(), &summary, &spec(&["*.txt"], &["*.log"], 100))
            .unwrap();

        assert_eq!(result.excluded_reason("blob.bin"), Some(SkipReason::NotIncluded));
        assert_eq!(result.excluded_reason("big.log"), Some(SkipReason::ExcludedByPattern));
    }

    #[test]
    fn empty_files_count_but_render_nothing() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "empty.txt", b"");
        write(tmp.path(), "full.txt", b"data");

        let summary = analyze(tmp.path());
        let result = ContentExtractor::new(MB)
            .extract(tmp.path(), &summary, &spec(&[], &[], 100))
            .unwrap();

        assert!(result.is_included("empty.txt"));
        assert!(!result.content.contains("empty.txt"));
        assert_eq!(result.totals.files_included, 2);
    }

    #[test]
    fn output_budget_stops_extraction() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", &[b'a'; 200]);
        write(tmp.path(), "b.txt", &[b'b'; 200]);

        let summary = analyze(tmp.path());
        let result = ContentExtractor::new(400)
            .extract(tmp.path(), &summary, &spec(&[], &[], 1024))
            .unwrap();

        assert!(result.is_included("a.txt"));
        assert_eq!(result.excluded_reason("b.txt"), Some(SkipReason::OutputBudget));
        assert!(result.content.len() <= 400);
    }

    #[test]
    fn files_past_the_budget_are_not_read() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", &[b'a'; 300]);
        let late: Vec<String> = (0..READ_BATCH * 2).map(|i| format!("b_{i:03}.txt")).collect();
        for path in &late {
            write(tmp.path(), path, b"late\n");
        }
        let summary = analyze(tmp.path());
        for path in &late {
            fs::remove_file(tmp.path().join(path)).unwrap();
        }

        let result = ContentExtractor::new(100)
            .extract(tmp.path(), &summary, &spec(&[], &[], 1024))
            .unwrap();

        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.excluded_reason("a.txt"), Some(SkipReason::OutputBudget));
        for path in &late {
            assert_eq!(result.excluded_reason(path), Some(SkipReason::OutputBudget));
        }
        assert!(result.content.is_empty());
    }

    #[test]
    fn reads_stop_after_the_batch_that_breaks() {
        let items: Vec<usize> = (0..100).collect();
        let reads = AtomicUsize::new(0);
        let mut seen = Vec::new();

        let consumed = read_in_order(
            &items,
            8,
            |i| {
                reads.fetch_add(1, Ordering::SeqCst);
                *i
            },
            |_, i| {
                seen.push(i);
                if i == 10 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
            },
        );

        assert_eq!(consumed, 11);
        assert_eq!(seen, (0..=10).collect::<Vec<_>>());
        assert_eq!(reads.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn repeated_extraction_is_identical() {
        let tmp = TempDir::new().unwrap();
        for i in 0..20 {
            write(tmp.path(), &format!("src/mod_{i}/lib.rs"), format!("pub fn f{i}() {{}}\n").as_bytes());
        }
        let summary = analyze(tmp.path());
        let filter = spec(&["src/**"], &["*_1*"], 1024);
        let extractor = ContentExtractor::new(MB);

        let first = extractor.extract(tmp.path(), &summary, &filter).unwrap();
        let second = extractor.extract(tmp.path(), &summary, &filter).unwrap();
        assert_eq!(first.content, second.content);
        assert_eq!(first.digest, second.digest);
        assert!(!first.is_included("src/mod_1/lib.rs"));
    }

    #[test]
    fn vanished_file_is_a_file_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keep.txt", b"keep");
        write(tmp.path(), "gone.txt", b"gone");
        let summary = analyze(tmp.path());
        fs::remove_file(tmp.path().join("gone.txt")).unwrap();

        let result = ContentExtractor::new(MB)
            .extract(tmp.path(), &summary, &spec(&[], &[], 100))
            .unwrap();

        assert!(result.is_included("keep.txt"));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "gone.txt");
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", b"a");
        let summary = analyze(tmp.path());

        let err = ContentExtractor::new(MB).extract(tmp.path(), &summary, &spec(&["[a"], &[], 100));
        assert!(matches!(err, Err(ExtractionError::InvalidFilter(_))));
    }
}
