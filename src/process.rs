//! Page processing entry points: one page, one folder, or a sync wrapper.
//!
//! A processed document folder follows the upstream layout:
//!
//! ```text
//! <root>/
//!   markdown/            page_001.md, page_002.md, …   (input, required)
//!   images/              Page_01.jpeg, Page_02.jpeg, … (input, required)
//!   markdown_images/     extracted figure crops         (created)
//!   processed_markdown/  rewritten page markdown        (created)
//! ```
//!
//! Pages are independent units of work, so the folder entry point runs them
//! on a bounded worker pool (`buffer_unordered` over `spawn_blocking` jobs —
//! image decode/crop/encode is CPU-bound and must stay off the async
//! workers). Within a page, boxes are processed strictly sequentially
//! because placeholder substitution is order-dependent.
//!
//! A page-level anomaly never aborts sibling pages: [`process_page`] is
//! infallible and reports everything through [`PageReport::warnings`].
//! Processing is idempotent per run — the output is fully determined by the
//! page text, the coordinate list, and the page image bytes.

use crate::config::ProcessingConfig;
use crate::error::{PageWarning, Scan2MdError};
use crate::output::{PageReport, RunOutput};
use crate::pipeline::coords::NormalizedBox;
use crate::pipeline::placeholder::{self, PlaceholderSource};
use crate::pipeline::reconcile::{self, ReconcileContext};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// The unit of work: one page's markdown plus where its coordinates live.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-indexed page number, parsed from the markdown filename.
    pub page_num: usize,
    /// Basename of the markdown file; the output reuses it.
    pub file_name: String,
    /// The page's markdown text.
    pub markdown: String,
    /// Embedded `<bbox>` tags, or an external ordered box list.
    pub source: PlaceholderSource,
}

/// Everything a run needs after input validation.
#[derive(Debug)]
pub(crate) struct RunPlan {
    pub pages: Vec<Page>,
    pub images_dir: PathBuf,
    pub figures_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Parse the page number from a `page_{NNN}.md` filename.
pub fn page_number_from_filename(path: &Path) -> Result<usize, Scan2MdError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.rsplit('_').next())
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| Scan2MdError::InvalidPageFilename {
            path: path.to_path_buf(),
        })
}

/// Locate the page image `Page_{NN}.<ext>`, probing extensions in order.
///
/// Returns the first existing candidate, or the first candidate path (for
/// the warning message) when none exists.
pub fn find_page_image(
    images_dir: &Path,
    page_num: usize,
    extensions: &[String],
) -> Result<PathBuf, PathBuf> {
    let mut first = None;
    for ext in extensions {
        let candidate = images_dir.join(format!("Page_{page_num:02}.{ext}"));
        if candidate.exists() {
            return Ok(candidate);
        }
        first.get_or_insert(candidate);
    }
    Err(first.unwrap_or_else(|| images_dir.join(format!("Page_{page_num:02}"))))
}

/// Process a single page: locate its image, reconcile its markdown, write
/// the result to `output_dir` under the same basename.
///
/// Never fails: every anomaly — missing image, rejected box, write failure —
/// lands in [`PageReport::warnings`] and the page still produces output
/// (pass-through markdown when the image is unreadable).
pub fn process_page(
    page: &Page,
    images_dir: &Path,
    figures_dir: &Path,
    output_dir: &Path,
    config: &ProcessingConfig,
) -> PageReport {
    let start = Instant::now();
    let mut warnings = Vec::new();
    let mut figures = Vec::new();
    let output_path = output_dir.join(&page.file_name);

    let text = match load_page_image(page, images_dir, config, &mut warnings) {
        Some(image) => {
            let ctx = ReconcileContext {
                page_number: page.page_num,
                figures_dir,
                figures_rel_path: &config.figures_rel_path,
                scale_mode: config.scale_mode,
                annotate: config.annotate,
            };
            let result = reconcile::reconcile(&page.markdown, &page.source, &image, &ctx);
            warnings.extend(result.warnings);
            figures = result.figures;
            result.text
        }
        // Pass-through: no figures extracted, markdown written unmodified.
        None => page.markdown.clone(),
    };

    if let Err(e) = write_atomic(&output_path, &text) {
        warn!(path = %output_path.display(), error = %e, "failed to write output markdown");
        warnings.push(PageWarning::WriteFailure {
            page: page.page_num,
            path: output_path.display().to_string(),
            detail: e.to_string(),
        });
    }

    debug!(
        page = page.page_num,
        figures = figures.len(),
        warnings = warnings.len(),
        "page processed"
    );

    PageReport {
        page_num: page.page_num,
        output_path,
        figures,
        warnings,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Process every page of a document folder.
///
/// `root` must contain `markdown/` and `images/`; `markdown_images/` and
/// `processed_markdown/` are created as needed. When `boxes_dir` is given,
/// pages use the external dialect: each `page_{NNN}.md` is paired with a
/// `page_{NNN}.json` sidecar in that directory (a missing sidecar means an
/// empty box list). Otherwise coordinates are read from embedded `<bbox>`
/// tags.
///
/// Returns `Ok` even when individual pages or tags produced warnings; only
/// unrecoverable setup problems (missing directories, unreadable inputs)
/// are errors.
pub async fn process_folder(
    root: impl AsRef<Path>,
    boxes_dir: Option<&Path>,
    config: &ProcessingConfig,
) -> Result<RunOutput, Scan2MdError> {
    let total_start = Instant::now();
    let plan = prepare_run(root.as_ref(), boxes_dir)?;
    let total_pages = plan.pages.len();
    info!(
        root = %root.as_ref().display(),
        pages = total_pages,
        "starting figure extraction run"
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_pages);
    }

    let reports: Vec<PageReport> = stream::iter(plan.pages.into_iter().map(|page| {
        let images_dir = plan.images_dir.clone();
        let figures_dir = plan.figures_dir.clone();
        let output_dir = plan.output_dir.clone();
        let config = config.clone();
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(page.page_num, total_pages);
            }
            let page_config = config.clone();
            let report = tokio::task::spawn_blocking(move || {
                process_page(&page, &images_dir, &figures_dir, &output_dir, &page_config)
            })
            .await
            .map_err(|e| Scan2MdError::Internal(format!("page task panicked: {e}")))?;

            if let Some(ref cb) = config.progress_callback {
                for w in &report.warnings {
                    cb.on_page_warning(report.page_num, total_pages, &w.to_string());
                }
                cb.on_page_complete(report.page_num, total_pages, report.figures.len());
            }
            Ok::<_, Scan2MdError>(report)
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect::<Vec<_>>()
    .await
    .into_iter()
    .collect::<Result<_, _>>()?;

    let output = RunOutput::from_reports(reports, total_start.elapsed().as_millis() as u64);

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(output.stats.total_pages, output.stats.figures_extracted);
    }

    info!(
        pages = output.stats.processed_pages,
        figures = output.stats.figures_extracted,
        warnings = output.stats.pages_with_warnings,
        duration_ms = output.stats.total_duration_ms,
        "run complete"
    );

    Ok(output)
}

/// Synchronous wrapper around [`process_folder`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_folder_sync(
    root: impl AsRef<Path>,
    boxes_dir: Option<&Path>,
    config: &ProcessingConfig,
) -> Result<RunOutput, Scan2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Scan2MdError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(process_folder(root, boxes_dir, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Validate the folder layout, create output directories, and load pages.
pub(crate) fn prepare_run(root: &Path, boxes_dir: Option<&Path>) -> Result<RunPlan, Scan2MdError> {
    let markdown_dir = root.join("markdown");
    let images_dir = root.join("images");
    for dir in [&markdown_dir, &images_dir] {
        if !dir.is_dir() {
            return Err(Scan2MdError::DirectoryMissing { path: dir.clone() });
        }
    }
    if let Some(dir) = boxes_dir {
        if !dir.is_dir() {
            return Err(Scan2MdError::DirectoryMissing {
                path: dir.to_path_buf(),
            });
        }
    }

    let figures_dir = root.join("markdown_images");
    let output_dir = root.join("processed_markdown");
    for dir in [&figures_dir, &output_dir] {
        std::fs::create_dir_all(dir).map_err(|e| Scan2MdError::OutputDirFailed {
            path: dir.clone(),
            source: e,
        })?;
    }

    let pages = load_pages(&markdown_dir, boxes_dir)?;
    Ok(RunPlan {
        pages,
        images_dir,
        figures_dir,
        output_dir,
    })
}

/// Read every `*.md` page file (sorted by name) and pair it with its
/// coordinate source.
fn load_pages(markdown_dir: &Path, boxes_dir: Option<&Path>) -> Result<Vec<Page>, Scan2MdError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(markdown_dir)
        .map_err(|e| Scan2MdError::OutputDirFailed {
            path: markdown_dir.to_path_buf(),
            source: e,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    paths.sort();

    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let page_num = page_number_from_filename(&path)?;
        let markdown =
            std::fs::read_to_string(&path).map_err(|e| Scan2MdError::MarkdownReadFailed {
                path: path.clone(),
                source: e,
            })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| Scan2MdError::InvalidPageFilename { path: path.clone() })?;

        let source = match boxes_dir {
            None => PlaceholderSource::Embedded,
            Some(dir) => PlaceholderSource::External(load_sidecar(dir, &path)?),
        };

        pages.push(Page {
            page_num,
            file_name,
            markdown,
            source,
        });
    }
    Ok(pages)
}

/// Load the ordered box list for a page from its JSON sidecar.
///
/// A missing sidecar is an empty list (the upstream model found no figures);
/// an unreadable or unparseable one is fatal — corrupt structured input from
/// the upstream step is a setup problem, not a page anomaly.
fn load_sidecar(
    boxes_dir: &Path,
    markdown_path: &Path,
) -> Result<Vec<NormalizedBox>, Scan2MdError> {
    let stem = markdown_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Scan2MdError::InvalidPageFilename {
            path: markdown_path.to_path_buf(),
        })?;
    let sidecar = boxes_dir.join(format!("{stem}.json"));
    if !sidecar.exists() {
        return Ok(Vec::new());
    }

    let json = std::fs::read_to_string(&sidecar).map_err(|e| Scan2MdError::SidecarInvalid {
        path: sidecar.clone(),
        detail: e.to_string(),
    })?;
    placeholder::parse_sidecar(&json).map_err(|e| Scan2MdError::SidecarInvalid {
        path: sidecar,
        detail: e.to_string(),
    })
}

/// Load the page's image, recording an `ImageUnreadable` warning on any
/// failure (missing file or decode error).
fn load_page_image(
    page: &Page,
    images_dir: &Path,
    config: &ProcessingConfig,
    warnings: &mut Vec<PageWarning>,
) -> Option<image::DynamicImage> {
    let path = match find_page_image(images_dir, page.page_num, &config.page_image_extensions) {
        Ok(path) => path,
        Err(expected) => {
            warn!(
                page = page.page_num,
                expected = %expected.display(),
                "page image not found; passing markdown through"
            );
            warnings.push(PageWarning::ImageUnreadable {
                page: page.page_num,
                path: expected.display().to_string(),
            });
            return None;
        }
    };

    match image::open(&path) {
        Ok(image) => {
            debug!(
                page = page.page_num,
                path = %path.display(),
                width = image.width(),
                height = image.height(),
                "page image loaded"
            );
            Some(image)
        }
        Err(e) => {
            warn!(page = page.page_num, path = %path.display(), error = %e, "page image unreadable");
            warnings.push(PageWarning::ImageUnreadable {
                page: page.page_num,
                path: path.display().to_string(),
            });
            None
        }
    }
}

/// Atomic write: temp file + rename, so readers never observe a partial page.
fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("md.tmp");
    std::fs::write(&tmp_path, text)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn page_number_parses_standard_names() {
        assert_eq!(
            page_number_from_filename(Path::new("markdown/page_001.md")).unwrap(),
            1
        );
        assert_eq!(
            page_number_from_filename(Path::new("page_042.md")).unwrap(),
            42
        );
    }

    #[test]
    fn page_number_rejects_other_names() {
        assert!(page_number_from_filename(Path::new("notes.md")).is_err());
        assert!(page_number_from_filename(Path::new("page_abc.md")).is_err());
    }

    #[test]
    fn find_page_image_probes_extensions_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Page_03.png"), b"").unwrap();
        let exts: Vec<String> = vec!["jpeg".into(), "jpg".into(), "png".into()];

        let found = find_page_image(dir.path(), 3, &exts).unwrap();
        assert_eq!(found, dir.path().join("Page_03.png"));

        // jpeg wins over png when both exist
        std::fs::write(dir.path().join("Page_03.jpeg"), b"").unwrap();
        let found = find_page_image(dir.path(), 3, &exts).unwrap();
        assert_eq!(found, dir.path().join("Page_03.jpeg"));
    }

    #[test]
    fn find_page_image_reports_first_candidate_when_missing() {
        let dir = TempDir::new().unwrap();
        let exts: Vec<String> = vec!["jpeg".into(), "png".into()];
        let expected = find_page_image(dir.path(), 7, &exts).unwrap_err();
        assert_eq!(expected, dir.path().join("Page_07.jpeg"));
    }

    #[test]
    fn missing_page_image_passes_markdown_through() {
        let root = TempDir::new().unwrap();
        let images = root.path().join("images");
        let figures = root.path().join("markdown_images");
        let output = root.path().join("processed_markdown");
        for d in [&images, &figures, &output] {
            std::fs::create_dir_all(d).unwrap();
        }

        let page = Page {
            page_num: 5,
            file_name: "page_005.md".into(),
            markdown: "# Title\n<bbox>100,100,300,300</bbox>\n".into(),
            source: PlaceholderSource::Embedded,
        };
        let config = ProcessingConfig::default();

        let report = process_page(&page, &images, &figures, &output, &config);

        assert!(matches!(
            report.warnings.as_slice(),
            [PageWarning::ImageUnreadable { page: 5, .. }]
        ));
        assert!(report.figures.is_empty());
        let written = std::fs::read_to_string(output.join("page_005.md")).unwrap();
        assert_eq!(written, page.markdown);
    }

    #[test]
    fn prepare_run_requires_input_dirs() {
        let root = TempDir::new().unwrap();
        let err = prepare_run(root.path(), None).unwrap_err();
        assert!(matches!(err, Scan2MdError::DirectoryMissing { .. }));
    }

    #[test]
    fn missing_sidecar_is_an_empty_list() {
        let boxes = TempDir::new().unwrap();
        let list = load_sidecar(boxes.path(), Path::new("page_001.md")).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn corrupt_sidecar_is_fatal() {
        let boxes = TempDir::new().unwrap();
        std::fs::write(boxes.path().join("page_001.json"), "{not json").unwrap();
        let err = load_sidecar(boxes.path(), Path::new("page_001.md")).unwrap_err();
        assert!(matches!(err, Scan2MdError::SidecarInvalid { .. }));
    }

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page_001.md");
        write_atomic(&path, "hello\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
