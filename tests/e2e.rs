//! End-to-end integration tests for scan2md.
//!
//! Every test builds a self-contained document folder in a tempdir —
//! synthetic page images plus markdown fixtures — so the full pipeline
//! (folder validation → image load → coordinate resolution → crop →
//! placeholder substitution → atomic write) runs without any external
//! test data.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use scan2md::{
    process_folder, process_folder_sync, process_stream, PageWarning, ProcessingConfig,
    ProcessingProgressCallback, RunOutput, ScaleMode, Scan2MdError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// A document folder under construction: `markdown/` + `images/` populated,
/// output directories left for the library to create.
struct Fixture {
    root: TempDir,
    boxes_dir: Option<PathBuf>,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(root.path().join("markdown")).expect("markdown dir");
        std::fs::create_dir_all(root.path().join("images")).expect("images dir");
        Self {
            root,
            boxes_dir: None,
        }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    /// Write `page_{NNN}.md` with the given markdown.
    fn page_markdown(&self, page: usize, text: &str) -> &Self {
        let path = self
            .path()
            .join("markdown")
            .join(format!("page_{page:03}.md"));
        std::fs::write(path, text).expect("write page markdown");
        self
    }

    /// Write a gradient `Page_{NN}.png` page image of the given size.
    ///
    /// The gradient makes crop positions verifiable: pixel (x, y) carries
    /// `(x % 256, y % 256, 0)`.
    fn page_image(&self, page: usize, width: u32, height: u32) -> &Self {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        });
        let path = self
            .path()
            .join("images")
            .join(format!("Page_{page:02}.png"));
        img.save(path).expect("write page image");
        self
    }

    /// Write a `page_{NNN}.json` coordinate sidecar and remember the boxes
    /// directory for the run.
    fn sidecar(&mut self, page: usize, json: &str) -> &mut Self {
        let dir = self.path().join("boxes");
        std::fs::create_dir_all(&dir).expect("boxes dir");
        std::fs::write(dir.join(format!("page_{page:03}.json")), json).expect("write sidecar");
        self.boxes_dir = Some(dir);
        self
    }

    async fn run(&self, config: &ProcessingConfig) -> Result<RunOutput, Scan2MdError> {
        process_folder(self.path(), self.boxes_dir.as_deref(), config).await
    }

    fn processed(&self, page: usize) -> String {
        let path = self
            .path()
            .join("processed_markdown")
            .join(format!("page_{page:03}.md"));
        std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
    }

    fn figure_path(&self, name: &str) -> PathBuf {
        self.path().join("markdown_images").join(name)
    }
}

fn figure_dims(path: &Path) -> (u32, u32) {
    let img = image::open(path).unwrap_or_else(|e| panic!("open {}: {e}", path.display()));
    (img.width(), img.height())
}

// ── Embedded dialect ─────────────────────────────────────────────────────────

/// One page, one embedded tag, square page image: the tag becomes a working
/// image reference and the crop has exactly the tag's dimensions (scale 1.0
/// on a 1000x1000 page).
#[tokio::test]
async fn embedded_tag_becomes_image_reference() {
    let fx = Fixture::new();
    fx.page_markdown(1, "# Chart\n\n<bbox>100,200,400,600</bbox>\n\nCaption below.\n");
    fx.page_image(1, 1000, 1000);

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");

    assert_eq!(output.stats.total_pages, 1);
    assert_eq!(output.stats.figures_extracted, 1);
    assert_eq!(output.stats.pages_with_warnings, 0);

    let md = fx.processed(1);
    assert!(
        md.contains("![Image 1_1](../markdown_images/image_page01_001.png)"),
        "got: {md}"
    );
    assert!(!md.contains("<bbox>"), "tag must be consumed, got: {md}");
    assert!(md.contains("Caption below."), "prose must survive, got: {md}");

    // bbox is y_min,x_min,y_max,x_max → 400 wide (x 200..600), 300 tall (y 100..400).
    let (w, h) = figure_dims(&fx.figure_path("image_page01_001.png"));
    assert_eq!((w, h), (400, 300));
}

/// Per-axis scaling: each axis is scaled by its own dimension / 1000.
#[tokio::test]
async fn per_axis_scaling_follows_each_dimension() {
    let fx = Fixture::new();
    fx.page_markdown(1, "<bbox>0,0,500,500</bbox>\n");
    fx.page_image(1, 600, 2000);

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    assert_eq!(output.stats.figures_extracted, 1);

    // x scaled by 600/1000, y by 2000/1000.
    let (w, h) = figure_dims(&fx.figure_path("image_page01_001.png"));
    assert_eq!((w, h), (300, 1000));
}

/// Uniform scaling applies a single factor, max(width, height) / 1000, to
/// both axes.
#[tokio::test]
async fn uniform_scaling_uses_single_factor() {
    let fx = Fixture::new();
    fx.page_markdown(1, "<bbox>100,100,300,300</bbox>\n");
    fx.page_image(1, 500, 1000);

    let config = ProcessingConfig::builder()
        .scale_mode(ScaleMode::Uniform)
        .build()
        .expect("config");
    let output = fx.run(&config).await.expect("run");
    assert_eq!(output.stats.figures_extracted, 1);

    // factor = max(500, 1000) / 1000 = 1.0 on both axes.
    let (w, h) = figure_dims(&fx.figure_path("image_page01_001.png"));
    assert_eq!((w, h), (200, 200));
}

/// A degenerate tag (zero-area box) is skipped with a warning, but it still
/// consumes its figure index: the surviving second figure is numbered 002.
#[tokio::test]
async fn degenerate_tag_leaves_index_gap() {
    let fx = Fixture::new();
    fx.page_markdown(
        1,
        "<bbox>500,500,500,900</bbox>\n\n<bbox>100,100,400,400</bbox>\n",
    );
    fx.page_image(1, 1000, 1000);

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    let report = &output.reports[0];

    assert_eq!(report.figures, vec!["image_page01_002.png".to_string()]);
    assert!(matches!(
        report.warnings.as_slice(),
        [PageWarning::DegenerateBox {
            page: 1,
            index: 1,
            ..
        }]
    ));

    let md = fx.processed(1);
    // The failed tag stays in place; the good one is replaced.
    assert!(md.contains("<bbox>500,500,500,900</bbox>"), "got: {md}");
    assert!(md.contains("![Image 1_2]"), "got: {md}");
    assert!(!fx.figure_path("image_page01_001.png").exists());
    assert!(fx.figure_path("image_page01_002.png").exists());
}

/// Identical tags are consumed left to right, one box each.
#[tokio::test]
async fn duplicate_tags_each_get_their_own_figure() {
    let fx = Fixture::new();
    fx.page_markdown(
        2,
        "<bbox>0,0,200,200</bbox>\nmiddle\n<bbox>0,0,200,200</bbox>\n",
    );
    fx.page_image(2, 1000, 1000);

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    assert_eq!(output.stats.figures_extracted, 2);

    let md = fx.processed(2);
    assert!(md.contains("![Image 2_1](../markdown_images/image_page02_001.png)"));
    assert!(md.contains("![Image 2_2](../markdown_images/image_page02_002.png)"));
    assert!(!md.contains("<bbox>"));
}

// ── External dialect ─────────────────────────────────────────────────────────

/// Bare markers paired positionally with the sidecar's box list.
#[tokio::test]
async fn external_markers_pair_with_sidecar_in_order() {
    let mut fx = Fixture::new();
    fx.page_markdown(1, "Intro\n\n<image_here>\n\nMore text\n\n<image_here>\n");
    fx.page_image(1, 1000, 1000);
    fx.sidecar(
        1,
        r#"[
            {"figure": "fig-a", "bbox": [100, 100, 300, 300]},
            {"figure": "fig-b", "bbox": [400, 400, 800, 900]}
        ]"#,
    );

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    assert_eq!(output.stats.figures_extracted, 2);
    assert_eq!(output.stats.pages_with_warnings, 0);

    let md = fx.processed(1);
    assert!(!md.contains("<image_here>"), "got: {md}");
    let first = md.find("![Image 1_1]").expect("first reference");
    let second = md.find("![Image 1_2]").expect("second reference");
    assert!(first < second, "references must be in document order");

    // Second box: y 400..800, x 400..900 → 500 wide, 400 tall.
    let (w, h) = figure_dims(&fx.figure_path("image_page01_002.png"));
    assert_eq!((w, h), (500, 400));
}

/// More markers than boxes: the extras stay in the text and are reported.
#[tokio::test]
async fn surplus_markers_are_reported_and_left_in_place() {
    let mut fx = Fixture::new();
    fx.page_markdown(1, "<image_here>\n<image_here>\n<image_here>\n");
    fx.page_image(1, 1000, 1000);
    fx.sidecar(1, r#"[[0, 0, 200, 200], [300, 300, 600, 600]]"#);

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    let report = &output.reports[0];

    assert_eq!(report.figures.len(), 2);
    assert!(matches!(
        report.warnings.as_slice(),
        [PageWarning::UnmatchedPlaceholders { page: 1, count: 1 }]
    ));
    assert_eq!(fx.processed(1).matches("<image_here>").count(), 1);
}

/// More boxes than markers: the excess boxes are ignored and reported.
#[tokio::test]
async fn surplus_boxes_are_reported() {
    let mut fx = Fixture::new();
    fx.page_markdown(1, "<image_here>\n");
    fx.page_image(1, 1000, 1000);
    fx.sidecar(
        1,
        r#"[[0, 0, 200, 200], [300, 300, 600, 600], [0, 0, 100, 100]]"#,
    );

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    let report = &output.reports[0];

    assert_eq!(report.figures.len(), 1);
    assert!(matches!(
        report.warnings.as_slice(),
        [PageWarning::UnusedCoordinates { page: 1, count: 2 }]
    ));
}

/// No sidecar file for a page means an empty box list, so its markers stay.
#[tokio::test]
async fn missing_sidecar_means_no_boxes() {
    let mut fx = Fixture::new();
    fx.page_markdown(1, "<image_here>\nbody\n");
    fx.page_markdown(2, "plain page\n");
    fx.page_image(1, 500, 500);
    fx.page_image(2, 500, 500);
    // Sidecar only for page 2 (and an empty one at that).
    fx.sidecar(2, "[]");

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");

    assert_eq!(output.stats.total_pages, 2);
    assert_eq!(output.stats.figures_extracted, 0);
    let page1 = output
        .reports
        .iter()
        .find(|r| r.page_num == 1)
        .expect("page 1");
    assert!(matches!(
        page1.warnings.as_slice(),
        [PageWarning::UnmatchedPlaceholders { page: 1, count: 1 }]
    ));
    assert!(fx.processed(1).contains("<image_here>"));
    assert_eq!(fx.processed(2), "plain page\n");
}

/// A sidecar that exists but cannot be parsed is a setup error, not a page
/// warning.
#[tokio::test]
async fn corrupt_sidecar_fails_the_run() {
    let mut fx = Fixture::new();
    fx.page_markdown(1, "<image_here>\n");
    fx.page_image(1, 500, 500);
    fx.sidecar(1, "{this is not a box list");

    let err = fx.run(&ProcessingConfig::default()).await.unwrap_err();
    assert!(
        matches!(err, Scan2MdError::SidecarInvalid { .. }),
        "got: {err}"
    );
}

// ── Degraded inputs ──────────────────────────────────────────────────────────

/// A page with no image still produces output: the markdown passes through
/// unmodified and the anomaly lands in the report.
#[tokio::test]
async fn missing_page_image_passes_markdown_through() {
    let fx = Fixture::new();
    let text = "# Page 3\n\n<bbox>100,100,400,400</bbox>\n";
    fx.page_markdown(3, text);
    // No Page_03 image written.

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    let report = &output.reports[0];

    assert!(matches!(
        report.warnings.as_slice(),
        [PageWarning::ImageUnreadable { page: 3, .. }]
    ));
    assert!(report.figures.is_empty());
    assert_eq!(fx.processed(3), text);
}

/// An unreadable image (file exists, not decodable) behaves like a missing one.
#[tokio::test]
async fn undecodable_page_image_passes_markdown_through() {
    let fx = Fixture::new();
    fx.page_markdown(1, "<bbox>0,0,100,100</bbox>\n");
    std::fs::write(fx.path().join("images/Page_01.png"), b"not a png").expect("write");

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    assert!(matches!(
        output.reports[0].warnings.as_slice(),
        [PageWarning::ImageUnreadable { page: 1, .. }]
    ));
    assert_eq!(output.stats.figures_extracted, 0);
}

/// A tag whose payload cannot be parsed is skipped with a warning;
/// the rest of the page still processes.
#[tokio::test]
async fn malformed_tag_payload_is_skipped() {
    let fx = Fixture::new();
    fx.page_markdown(1, "<bbox>12,34</bbox>\n\n<bbox>0,0,500,500</bbox>\n");
    fx.page_image(1, 1000, 1000);

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    let report = &output.reports[0];

    assert!(matches!(
        report.warnings.as_slice(),
        [PageWarning::MalformedCoordinates {
            page: 1,
            index: 1,
            ..
        }]
    ));
    assert_eq!(report.figures, vec!["image_page01_002.png".to_string()]);
    assert!(fx.processed(1).contains("<bbox>12,34</bbox>"));
}

/// Missing markdown/ or images/ directories fail before any page work.
#[tokio::test]
async fn missing_input_dirs_fail_eagerly() {
    let root = TempDir::new().expect("tempdir");
    let err = process_folder(root.path(), None, &ProcessingConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Scan2MdError::DirectoryMissing { .. }));
}

// ── Idempotence ──────────────────────────────────────────────────────────────

/// Feeding a run's output back through the pipeline changes nothing: all
/// tags were consumed, so the second pass is a no-op.
#[tokio::test]
async fn processed_output_is_a_fixed_point() {
    let fx = Fixture::new();
    fx.page_markdown(1, "before\n<bbox>100,100,400,400</bbox>\nafter\n");
    fx.page_image(1, 1000, 1000);
    fx.run(&ProcessingConfig::default()).await.expect("first run");
    let first = fx.processed(1);

    let fx2 = Fixture::new();
    fx2.page_markdown(1, &first);
    fx2.page_image(1, 1000, 1000);
    let output = fx2
        .run(&ProcessingConfig::default())
        .await
        .expect("second run");

    assert_eq!(output.stats.figures_extracted, 0);
    assert_eq!(output.stats.pages_with_warnings, 0);
    assert_eq!(fx2.processed(1), first);
}

// ── Annotation ───────────────────────────────────────────────────────────────

/// With annotate on, a full-page `_bbox` debug copy appears next to the crop,
/// and the crop itself stays outline-free.
#[tokio::test]
async fn annotate_writes_debug_copy() {
    let fx = Fixture::new();
    fx.page_markdown(1, "<bbox>100,100,400,400</bbox>\n");
    fx.page_image(1, 1000, 1000);

    let config = ProcessingConfig::builder()
        .annotate(true)
        .build()
        .expect("config");
    fx.run(&config).await.expect("run");

    let annotated = fx.figure_path("image_page01_001_bbox.png");
    assert!(annotated.exists());
    assert_eq!(figure_dims(&annotated), (1000, 1000));

    // Crop top-left keeps the source gradient (x=100, y=100), not the outline.
    let crop = image::open(fx.figure_path("image_page01_001.png"))
        .expect("crop")
        .to_rgb8();
    assert_eq!(*crop.get_pixel(0, 0), image::Rgb([100, 100, 0]));
}

// ── Concurrency, streaming, callbacks ────────────────────────────────────────

/// A multi-page concurrent run reports pages sorted by number regardless of
/// completion order.
#[tokio::test]
async fn concurrent_run_reports_sorted_pages() {
    let fx = Fixture::new();
    for page in 1..=6 {
        fx.page_markdown(page, &format!("# Page {page}\n<bbox>0,0,300,300</bbox>\n"));
        fx.page_image(page, 800, 800);
    }

    let config = ProcessingConfig::builder()
        .concurrency(4)
        .build()
        .expect("config");
    let output = fx.run(&config).await.expect("run");

    assert_eq!(output.stats.total_pages, 6);
    assert_eq!(output.stats.figures_extracted, 6);
    let nums: Vec<usize> = output.reports.iter().map(|r| r.page_num).collect();
    assert_eq!(nums, vec![1, 2, 3, 4, 5, 6]);

    // Each page's figure bears its own page number.
    for page in 1..=6 {
        assert!(fx
            .figure_path(&format!("image_page{page:02}_001.png"))
            .exists());
    }
}

/// Progress callbacks fire once per page plus run start/complete.
#[tokio::test]
async fn progress_callbacks_fire_per_page() {
    struct Tracker {
        run_total: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        warnings: AtomicUsize,
        figures_total: AtomicUsize,
    }

    impl ProcessingProgressCallback for Tracker {
        fn on_run_start(&self, total_pages: usize) {
            self.run_total.store(total_pages, Ordering::SeqCst);
        }
        fn on_page_start(&self, _page: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _page: usize, _total: usize, _figures: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_warning(&self, _page: usize, _total: usize, _warning: &str) {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }
        fn on_run_complete(&self, _total: usize, figures_total: usize) {
            self.figures_total.store(figures_total, Ordering::SeqCst);
        }
    }

    let tracker = Arc::new(Tracker {
        run_total: AtomicUsize::new(0),
        starts: AtomicUsize::new(0),
        completes: AtomicUsize::new(0),
        warnings: AtomicUsize::new(0),
        figures_total: AtomicUsize::new(0),
    });

    let fx = Fixture::new();
    fx.page_markdown(1, "<bbox>0,0,200,200</bbox>\n");
    fx.page_image(1, 1000, 1000);
    fx.page_markdown(2, "<bbox>0,0,200,200</bbox>\n"); // no image → warning

    let config = ProcessingConfig::builder()
        .progress_callback(Arc::clone(&tracker) as Arc<dyn ProcessingProgressCallback>)
        .build()
        .expect("config");
    fx.run(&config).await.expect("run");

    assert_eq!(tracker.run_total.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.warnings.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.figures_total.load(Ordering::SeqCst), 1);
}

/// The streaming API yields one report per page.
#[tokio::test]
async fn stream_yields_every_page() {
    use futures::StreamExt;

    let fx = Fixture::new();
    for page in 1..=3 {
        fx.page_markdown(page, "<bbox>0,0,250,250</bbox>\n");
        fx.page_image(page, 1000, 1000);
    }

    let mut stream = process_stream(fx.path(), None, &ProcessingConfig::default())
        .await
        .expect("stream");

    let mut pages = Vec::new();
    while let Some(result) = stream.next().await {
        let report = result.expect("page report");
        assert_eq!(report.figures.len(), 1);
        pages.push(report.page_num);
    }
    pages.sort_unstable();
    assert_eq!(pages, vec![1, 2, 3]);
}

/// The blocking wrapper produces the same result without an ambient runtime.
#[test]
fn sync_wrapper_runs_without_a_runtime() {
    let fx = Fixture::new();
    fx.page_markdown(1, "<bbox>100,100,500,500</bbox>\n");
    fx.page_image(1, 1000, 1000);

    let output = process_folder_sync(fx.path(), None, &ProcessingConfig::default()).expect("run");
    assert_eq!(output.stats.figures_extracted, 1);
    assert!(fx.processed(1).contains("![Image 1_1]"));
}

// ── Report shape ─────────────────────────────────────────────────────────────

/// RunOutput must serialise to JSON and round-trip (the `--json` contract).
#[tokio::test]
async fn run_output_round_trips_through_json() {
    let fx = Fixture::new();
    fx.page_markdown(1, "<bbox>0,0,300,300</bbox>\n<bbox>900,900,900,900</bbox>\n");
    fx.page_image(1, 1000, 1000);

    let output = fx.run(&ProcessingConfig::default()).await.expect("run");
    let json = serde_json::to_string_pretty(&output).expect("serialise");
    let back: RunOutput = serde_json::from_str(&json).expect("deserialise");

    assert_eq!(back.stats.total_pages, output.stats.total_pages);
    assert_eq!(back.reports.len(), output.reports.len());
    assert_eq!(back.reports[0].warnings.len(), 1);
}
