// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch scheduler — runs every record through validate → assets → render on
// a bounded worker pool, then composes the surviving pages in input order.
//
// Each record is its own task holding one semaphore permit for its whole
// pipeline. Results come back keyed by position, so completion order never
// affects page order. Codec and layout work runs on the blocking pool.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use ticketpress_core::error::{Result, TicketpressError};
use ticketpress_core::{
    BatchContext, BatchId, BatchOutcome, ErrorKind, ImageAsset, ImageRef, PaperSize,
    PipelineConfig, RecordError, RenderedPage, TicketPage, ValidationOutcome, reference_hint,
    validate,
};
use ticketpress_document::pdf::composer::inspect_page;
use ticketpress_document::{
    DocumentComposer, HttpImageSource, ImageNormalizer, ImageSource, PageRenderer,
    PdfTicketRenderer,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::outcome::OutcomeReporter;
use crate::request::{BatchRequest, SingleTicketRequest};

/// What one record task hands back.
#[derive(Debug)]
struct RecordResult {
    position: usize,
    page: Option<RenderedPage>,
    errors: Vec<RecordError>,
}

impl RecordResult {
    fn failed(position: usize, reference: Option<String>, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            position,
            page: None,
            errors: vec![RecordError::new(position, reference, kind, reason)],
        }
    }
}

/// Everything a record task needs, cheap to clone into each task.
#[derive(Clone)]
struct RecordPipeline {
    ctx: BatchContext,
    paper_size: PaperSize,
    normalizer: ImageNormalizer,
    source: Arc<dyn ImageSource>,
    renderer: Arc<dyn PageRenderer>,
}

impl RecordPipeline {
    async fn process(self, position: usize, raw: Value) -> RecordResult {
        let record = match validate(&raw, position, &self.ctx) {
            ValidationOutcome::Accepted(record) => *record,
            ValidationOutcome::Rejected(error) => {
                return RecordResult {
                    position,
                    page: None,
                    errors: vec![error],
                };
            }
        };
        drop(raw);

        let reference = record.reference.clone();
        let mut errors = Vec::new();

        let (image, qr_code) = tokio::join!(
            self.prepare_asset(record.image.as_ref(), "event image"),
            self.prepare_asset(record.qr_code.as_ref(), "QR code"),
        );
        let (image, image_problem) = image;
        let (qr_code, qr_problem) = qr_code;
        for reason in [image_problem, qr_problem].into_iter().flatten() {
            errors.push(RecordError::new(
                position,
                Some(reference.clone()),
                ErrorKind::AssetDegraded,
                reason,
            ));
        }

        let page = TicketPage {
            position,
            record,
            image,
            qr_code,
            paper_size: self.paper_size,
        };

        let renderer = Arc::clone(&self.renderer);
        let rendered = tokio::task::spawn_blocking(move || {
            let rendered = renderer.render(&page)?;
            inspect_page(&rendered.pdf)?;
            Ok::<_, TicketpressError>(rendered)
        })
        .await;

        let page = match rendered {
            Ok(Ok(rendered)) => Some(rendered),
            Ok(Err(err)) => {
                errors.push(RecordError::new(
                    position,
                    Some(reference),
                    ErrorKind::RenderFailed,
                    err.to_string(),
                ));
                None
            }
            Err(join_err) => {
                errors.push(RecordError::new(
                    position,
                    Some(reference),
                    ErrorKind::RenderFailed,
                    format!("renderer aborted: {join_err}"),
                ));
                None
            }
        };

        RecordResult {
            position,
            page,
            errors,
        }
    }

    /// Load and normalise one optional asset. Never fails the record: any
    /// problem is returned as a reason next to whatever is still usable.
    async fn prepare_asset(
        &self,
        reference: Option<&ImageRef>,
        label: &str,
    ) -> (Option<ImageAsset>, Option<String>) {
        let Some(reference) = reference else {
            return (None, None);
        };

        let loaded = match self.normalizer.load(reference, self.source.as_ref()).await {
            Ok(loaded) => loaded,
            Err(err) => return (None, Some(format!("{label}: {err}"))),
        };

        let normalizer = self.normalizer;
        match tokio::task::spawn_blocking(move || normalizer.normalize_bytes(loaded)).await {
            Ok(normalized) => (
                normalized.asset,
                normalized.degraded.map(|reason| format!("{label}: {reason}")),
            ),
            Err(join_err) => (None, Some(format!("{label}: normalisation aborted: {join_err}"))),
        }
    }
}

/// Runs batches against one configuration, renderer and image source.
pub struct BatchScheduler {
    config: PipelineConfig,
    renderer: Arc<dyn PageRenderer>,
    source: Arc<dyn ImageSource>,
    composer: DocumentComposer,
}

impl BatchScheduler {
    /// Build a scheduler; the configuration is validated up front.
    pub fn new(
        config: PipelineConfig,
        renderer: Arc<dyn PageRenderer>,
        source: Arc<dyn ImageSource>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            renderer,
            source,
            composer: DocumentComposer::new(),
        })
    }

    /// Default ticket layout and HTTP image fetching.
    pub fn with_defaults(config: PipelineConfig) -> Result<Self> {
        let source = HttpImageSource::new(config.fetch_timeout())?;
        Self::new(config, Arc::new(PdfTicketRenderer::new()), Arc::new(source))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Render one ticket as a batch of one.
    pub async fn run_single(&self, request: SingleTicketRequest) -> Result<BatchOutcome> {
        self.run(request.into_batch()).await
    }

    /// Process a batch.
    ///
    /// Returns `Err` only for batch-level rejections (too many tickets, bad
    /// page format), before any record is touched. Everything else,
    /// including "no valid tickets", comes back inside the outcome.
    #[instrument(skip_all, fields(submitted = request.tickets.len()))]
    pub async fn run(&self, request: BatchRequest) -> Result<BatchOutcome> {
        let submitted = request.tickets.len();
        if submitted > self.config.max_batch_size {
            warn!(limit = self.config.max_batch_size, submitted, "Batch rejected: too many tickets");
            return Err(TicketpressError::BatchTooLarge {
                limit: self.config.max_batch_size,
                received: submitted,
            });
        }

        let paper_size = request.paper_size(self.config.paper_size)?;
        let concurrency = self.config.effective_concurrency(request.concurrency);
        let batch_id = BatchId::new();
        info!(%batch_id, submitted, concurrency, ?paper_size, "Batch started");

        let mut reporter = OutcomeReporter::new(batch_id, submitted);
        let references: Vec<Option<String>> = request.tickets.iter().map(reference_hint).collect();

        let pipeline = RecordPipeline {
            ctx: BatchContext::new(submitted),
            paper_size,
            normalizer: ImageNormalizer::from_config(&self.config),
            source: Arc::clone(&self.source),
            renderer: Arc::clone(&self.renderer),
        };

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        let mut positions = HashMap::new();
        let mut results: BTreeMap<usize, RecordResult> = BTreeMap::new();
        let mut first_seen: HashMap<&str, usize> = HashMap::new();

        for (index, raw) in request.tickets.into_iter().enumerate() {
            let position = index + 1;

            // References name files and errors, so later repeats are rejected.
            if let Some(reference) = references[index].as_deref() {
                if let Some(&first) = first_seen.get(reference) {
                    results.insert(
                        position,
                        RecordResult::failed(
                            position,
                            Some(reference.to_owned()),
                            ErrorKind::RecordRejected,
                            format!("duplicate reference {reference} (first at position {first})"),
                        ),
                    );
                    continue;
                }
                first_seen.insert(reference, position);
            }

            let pipeline = pipeline.clone();
            let semaphore = Arc::clone(&semaphore);
            let span = info_span!("record", position);
            let handle = tasks.spawn(
                async move {
                    // Held for the whole record pipeline, released on drop.
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return RecordResult::failed(
                                position,
                                None,
                                ErrorKind::RenderFailed,
                                "worker pool closed",
                            );
                        }
                    };
                    pipeline.process(position, raw).await
                }
                .instrument(span),
            );
            positions.insert(handle.id(), position);
        }

        let deadline = self.config.batch_deadline().map(|d| Instant::now() + d);

        loop {
            let next = match deadline {
                Some(at) => match timeout_at(at, tasks.join_next_with_id()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(pending = tasks.len(), "Batch deadline reached, abandoning unfinished records");
                        tasks.abort_all();
                        break;
                    }
                },
                None => tasks.join_next_with_id().await,
            };
            let Some(joined) = next else { break };

            match joined {
                Ok((_, result)) => {
                    debug!(position = result.position, rendered = result.page.is_some(), "Record finished");
                    results.insert(result.position, result);
                }
                Err(join_err) => {
                    if let Some(&position) = positions.get(&join_err.id()) {
                        results.insert(
                            position,
                            RecordResult::failed(
                                position,
                                references[position - 1].clone(),
                                ErrorKind::RenderFailed,
                                format!("record task failed: {join_err}"),
                            ),
                        );
                    }
                }
            }
        }

        for (index, reference) in references.into_iter().enumerate() {
            let position = index + 1;
            if !results.contains_key(&position) {
                reporter.record(RecordError::new(
                    position,
                    reference,
                    ErrorKind::TimedOut,
                    "batch deadline exceeded",
                ));
            }
        }

        let mut pages = Vec::with_capacity(results.len());
        for (_, result) in results {
            reporter.extend(result.errors);
            pages.extend(result.page);
        }

        if pages.is_empty() {
            let failure = TicketpressError::EmptyBatch { submitted }.to_string();
            warn!(%failure, "No document produced");
            return Ok(reporter.finish(None, Some(failure)));
        }

        let included: Vec<(usize, String)> = pages
            .iter()
            .map(|page| (page.position, page.reference.clone()))
            .collect();
        let composer = self.composer;
        let composed = tokio::task::spawn_blocking(move || composer.compose(pages))
            .await
            .map_err(|join_err| TicketpressError::PdfError(format!("composer aborted: {join_err}")))
            .and_then(|composed| composed);

        Ok(match composed {
            Ok(document) => reporter.finish(Some(document), None),
            Err(err) => {
                warn!(%err, "Composition failed");
                reporter.composition_failed(&included, &err.to_string());
                reporter.finish(None, Some(err.to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use image::{DynamicImage, Rgb, RgbImage};
    use serde_json::json;
    use ticketpress_document::ImageProcessor;
    use ticketpress_document::image::source::FetchedImage;

    fn ticket(reference: &str) -> Value {
        json!({
            "event_title": format!("Show {reference}"),
            "event_date_time": "2026-05-01 20:00",
            "event_location": "Main Hall",
            "ticket_reference": reference,
            "ticket_type": "General",
            "ticket_price": "25.00",
        })
    }

    fn small_png() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Rgb([10, 120, 200]));
        ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(img))
            .to_png_bytes()
            .unwrap()
    }

    /// Serves a fixed PNG and counts requests.
    struct StubSource {
        png: Vec<u8>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubSource {
        fn ok() -> Self {
            Self {
                png: small_png(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok()
            }
        }
    }

    #[async_trait]
    impl ImageSource for StubSource {
        async fn fetch(&self, url: &str) -> Result<FetchedImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TicketpressError::Fetch(format!("{url}: HTTP 404 Not Found")));
            }
            Ok(FetchedImage {
                bytes: self.png.clone(),
                mime: "image/png".into(),
            })
        }
    }

    /// Delegates to the real layout but fails one reference.
    struct FailOn(&'static str);

    impl PageRenderer for FailOn {
        fn render(&self, page: &TicketPage) -> Result<RenderedPage> {
            if page.record.reference == self.0 {
                return Err(TicketpressError::Render("layout exploded".into()));
            }
            PdfTicketRenderer::new().render(page)
        }
    }

    /// Tracks how many renders overlap.
    struct Gauge {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PageRenderer for Gauge {
        fn render(&self, page: &TicketPage) -> Result<RenderedPage> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            PdfTicketRenderer::new().render(page)
        }
    }

    /// Hangs on one reference long enough to hit the deadline.
    struct SlowOn(&'static str);

    impl PageRenderer for SlowOn {
        fn render(&self, page: &TicketPage) -> Result<RenderedPage> {
            if page.record.reference == self.0 {
                std::thread::sleep(Duration::from_millis(1500));
            }
            PdfTicketRenderer::new().render(page)
        }
    }

    /// Claims success but returns two pages.
    struct TwoPages;

    impl PageRenderer for TwoPages {
        fn render(&self, page: &TicketPage) -> Result<RenderedPage> {
            let first = PdfTicketRenderer::new().render(page)?;
            let second = PdfTicketRenderer::new().render(page)?;
            let merged = DocumentComposer::new().compose(vec![first, second])?;
            Ok(RenderedPage {
                position: page.position,
                reference: page.record.reference.clone(),
                pdf: merged.bytes,
            })
        }
    }

    fn scheduler_with(config: PipelineConfig, renderer: Arc<dyn PageRenderer>) -> BatchScheduler {
        BatchScheduler::new(config, renderer, Arc::new(StubSource::ok())).unwrap()
    }

    fn scheduler() -> BatchScheduler {
        scheduler_with(PipelineConfig::default(), Arc::new(PdfTicketRenderer::new()))
    }

    #[tokio::test]
    async fn all_valid_batch_keeps_input_order() {
        let tickets = (1..=6).map(|i| ticket(&format!("T{i}"))).collect();
        let outcome = scheduler().run(BatchRequest::new(tickets)).await.unwrap();

        let document = outcome.document.as_ref().expect("document");
        assert_eq!(document.page_count, 6);
        assert_eq!(document.references, vec!["T1", "T2", "T3", "T4", "T5", "T6"]);
        assert_eq!(document.filename, "tickets_T1_to_T6.pdf");
        assert!(outcome.is_clean());
        assert_eq!(outcome.stats.accepted, 6);

        let reloaded = lopdf::Document::load_mem(&document.bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 6);
    }

    #[tokio::test]
    async fn invalid_record_is_excluded_and_named() {
        let mut b = ticket("B");
        b.as_object_mut().unwrap().remove("event_title");
        let request = BatchRequest::new(vec![ticket("A"), b, ticket("C")]);

        let outcome = scheduler().run(request).await.unwrap();
        let document = outcome.document.as_ref().expect("document");
        assert_eq!(document.page_count, 2);
        assert_eq!(document.references, vec!["A", "C"]);
        assert_eq!(document.filename, "tickets_A_to_C.pdf");

        assert_eq!(outcome.errors.len(), 1);
        let error = &outcome.errors[0];
        assert_eq!(error.position, 2);
        assert_eq!(error.reference.as_deref(), Some("B"));
        assert_eq!(error.kind, ErrorKind::RecordRejected);
        assert_eq!(error.reason, "missing title");
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected_before_processing() {
        let source = Arc::new(StubSource::ok());
        let config = PipelineConfig {
            max_batch_size: 3,
            ..PipelineConfig::default()
        };
        let scheduler = BatchScheduler::new(
            config,
            Arc::new(PdfTicketRenderer::new()),
            Arc::clone(&source) as Arc<dyn ImageSource>,
        )
        .unwrap();

        let mut tickets: Vec<Value> = (0..4).map(|i| ticket(&format!("T{i}"))).collect();
        for t in &mut tickets {
            t["qr_code_url"] = json!("https://example.org/qr.png");
        }
        let err = scheduler.run(BatchRequest::new(tickets)).await.unwrap_err();
        assert!(matches!(
            err,
            TicketpressError::BatchTooLarge {
                limit: 3,
                received: 4
            }
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn batch_at_size_limit_is_accepted() {
        let config = PipelineConfig {
            max_batch_size: 3,
            ..PipelineConfig::default()
        };
        let scheduler = scheduler_with(config, Arc::new(PdfTicketRenderer::new()));
        let tickets = (1..=3).map(|i| ticket(&format!("T{i}"))).collect();

        let outcome = scheduler.run(BatchRequest::new(tickets)).await.unwrap();
        assert_eq!(outcome.document.as_ref().unwrap().page_count, 3);
        assert_eq!(outcome.stats.submitted, 3);
        assert_eq!(outcome.stats.accepted, 3);
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn empty_batch_reports_failure() {
        let outcome = scheduler().run(BatchRequest::new(Vec::new())).await.unwrap();
        assert!(outcome.document.is_none());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.stats.submitted, 0);
        assert_eq!(outcome.stats.accepted, 0);
        assert_eq!(
            outcome.failure.as_deref(),
            Some("no valid tickets to generate (0 submitted)")
        );
    }

    #[tokio::test]
    async fn duplicate_reference_is_rejected() {
        let request = BatchRequest::new(vec![ticket("A"), ticket("A"), ticket("B")]);
        let outcome = scheduler().run(request).await.unwrap();

        let document = outcome.document.as_ref().expect("document");
        assert_eq!(document.references, vec!["A", "B"]);
        assert_eq!(document.filename, "tickets_A_to_B.pdf");

        assert_eq!(outcome.errors.len(), 1);
        let error = &outcome.errors[0];
        assert_eq!(error.position, 2);
        assert_eq!(error.reference.as_deref(), Some("A"));
        assert_eq!(error.kind, ErrorKind::RecordRejected);
        assert_eq!(error.reason, "duplicate reference A (first at position 1)");
        assert_eq!(outcome.stats.accepted + outcome.stats.rejected, outcome.stats.submitted);
    }

    #[tokio::test]
    async fn all_failing_batch_has_no_document() {
        let tickets = vec![json!({}), json!("nope"), json!({ "reference": "Z" })];
        let outcome = scheduler().run(BatchRequest::new(tickets)).await.unwrap();

        assert!(outcome.document.is_none());
        assert_eq!(outcome.errors.len(), 3);
        assert_eq!(outcome.stats.rejected, 3);
        assert_eq!(
            outcome.failure.as_deref(),
            Some("no valid tickets to generate (3 submitted)")
        );
    }

    #[tokio::test]
    async fn render_failure_excludes_only_that_record() {
        let scheduler = scheduler_with(PipelineConfig::default(), Arc::new(FailOn("T3")));
        let tickets = (1..=5).map(|i| ticket(&format!("T{i}"))).collect();
        let outcome = scheduler.run(BatchRequest::new(tickets)).await.unwrap();

        let document = outcome.document.as_ref().expect("document");
        assert_eq!(document.references, vec!["T1", "T2", "T4", "T5"]);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::RenderFailed);
        assert_eq!(outcome.errors[0].reference.as_deref(), Some("T3"));
        assert!(outcome.errors[0].reason.contains("layout exploded"));
    }

    #[tokio::test]
    async fn multi_page_render_is_a_render_failure() {
        let scheduler = scheduler_with(PipelineConfig::default(), Arc::new(TwoPages));
        let outcome = scheduler
            .run(BatchRequest::new(vec![ticket("A")]))
            .await
            .unwrap();
        assert!(outcome.document.is_none());
        assert_eq!(outcome.errors[0].kind, ErrorKind::RenderFailed);
        assert!(outcome.errors[0].reason.contains("expected 1"));
    }

    #[tokio::test]
    async fn same_batch_twice_gives_same_pages() {
        let scheduler = scheduler();
        let tickets: Vec<Value> = (1..=4).map(|i| ticket(&format!("R{i}"))).collect();

        let first = scheduler.run(BatchRequest::new(tickets.clone())).await.unwrap();
        let second = scheduler.run(BatchRequest::new(tickets)).await.unwrap();

        let (a, b) = (first.document.unwrap(), second.document.unwrap());
        assert_eq!(a.page_count, b.page_count);
        assert_eq!(a.references, b.references);
        assert_eq!(a.filename, b.filename);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_limit() {
        let gauge = Arc::new(Gauge {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = PipelineConfig {
            concurrency: 2,
            ..PipelineConfig::default()
        };
        let scheduler = scheduler_with(config, Arc::clone(&gauge) as Arc<dyn PageRenderer>);

        let tickets = (1..=8).map(|i| ticket(&format!("T{i}"))).collect();
        let outcome = scheduler.run(BatchRequest::new(tickets)).await.unwrap();

        assert_eq!(outcome.document.unwrap().page_count, 8);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn request_can_lower_concurrency() {
        let gauge = Arc::new(Gauge {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let scheduler = scheduler_with(PipelineConfig::default(), Arc::clone(&gauge) as Arc<dyn PageRenderer>);
        let request = BatchRequest {
            tickets: (1..=4).map(|i| ticket(&format!("T{i}"))).collect(),
            concurrency: Some(1),
            ..BatchRequest::default()
        };
        scheduler.run(request).await.unwrap();
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn deadline_reports_unfinished_records_as_timed_out() {
        let config = PipelineConfig {
            batch_deadline_secs: Some(1),
            ..PipelineConfig::default()
        };
        let scheduler = scheduler_with(config, Arc::new(SlowOn("B")));
        let request = BatchRequest::new(vec![ticket("A"), ticket("B"), ticket("C")]);

        let outcome = scheduler.run(request).await.unwrap();
        let document = outcome.document.as_ref().expect("document");
        assert_eq!(document.references, vec!["A", "C"]);

        assert_eq!(outcome.stats.timed_out, 1);
        let timed_out = &outcome.errors[0];
        assert_eq!(timed_out.kind, ErrorKind::TimedOut);
        assert_eq!(timed_out.position, 2);
        assert_eq!(timed_out.reference.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn failed_fetch_degrades_but_still_renders() {
        let scheduler = BatchScheduler::new(
            PipelineConfig::default(),
            Arc::new(PdfTicketRenderer::new()),
            Arc::new(StubSource::failing()),
        )
        .unwrap();
        let mut a = ticket("A");
        a["qr_code_url"] = json!("https://example.org/missing.png");

        let outcome = scheduler.run(BatchRequest::new(vec![a])).await.unwrap();
        assert_eq!(outcome.document.as_ref().unwrap().page_count, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::AssetDegraded);
        assert!(outcome.errors[0].reason.starts_with("QR code:"));
        assert_eq!(outcome.stats.degraded, 1);
        assert_eq!(outcome.stats.rejected, 0);
    }

    #[tokio::test]
    async fn inline_and_fetched_images_are_placed() {
        let source = Arc::new(StubSource::ok());
        let scheduler = BatchScheduler::new(
            PipelineConfig::default(),
            Arc::new(PdfTicketRenderer::new()),
            Arc::clone(&source) as Arc<dyn ImageSource>,
        )
        .unwrap();
        let mut a = ticket("A");
        a["event_image_url"] = json!(format!("data:image/png;base64,{}", STANDARD.encode(small_png())));
        a["qr_code_url"] = json!("https://example.org/qr.png");

        let outcome = scheduler.run(BatchRequest::new(vec![a])).await.unwrap();
        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.document.unwrap().filename, "ticket_A.pdf");
    }

    #[tokio::test]
    async fn single_ticket_request_is_a_batch_of_one() {
        let outcome = scheduler()
            .run_single(SingleTicketRequest {
                ticket: ticket("SOLO"),
                current_ticket: Some(2),
                total_tickets: Some(5),
                format: None,
            })
            .await
            .unwrap();
        let document = outcome.document.unwrap();
        assert_eq!(document.filename, "ticket_SOLO.pdf");
        assert_eq!(document.page_count, 1);
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = PipelineConfig {
            concurrency: 0,
            ..PipelineConfig::default()
        };
        let result = BatchScheduler::new(
            config,
            Arc::new(PdfTicketRenderer::new()),
            Arc::new(StubSource::ok()),
        );
        assert!(matches!(result, Err(TicketpressError::Config(_))));
    }
}
