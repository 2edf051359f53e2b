//! Scan pipeline
//!
//! Drives one band photo through capture, compression, feature extraction
//! and catalog matching. Each step feeds an event to the state machine
//! through the [`OperationTracker`], so a superseded or cancelled scan stops
//! at its next step without touching the state or delivering anything.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::barcode::BarcodeGate;
use super::operation::{OperationTracker, ScanOperation};
use super::state::{transition, ScanEvent, ScanState};
use crate::capture::{compress_frame, Camera, CapturedFrame, CompressedImage};
use crate::config::{AppConfig, CompressionConfig};
use crate::matching::{build_text_candidates, CatalogResolver};
use crate::shared::{ErrorCategory, ScanMessage};
use crate::vision::{BandAnnotations, FeatureExtractor, VisionError, BAND_FEATURES};

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Budget for the feature-extraction call
    pub analysis_timeout: Duration,
    pub compression: CompressionConfig,
    /// Barcodes are ignored for this long after a cancellation
    pub barcode_cooldown: Duration,
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            analysis_timeout: config.vision.timeout(),
            compression: config.compression.clone(),
            barcode_cooldown: config.scanner.barcode_cooldown(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Band scan pipeline
///
/// Outcomes are delivered on the receiver returned by [`ScanPipeline::new`].
#[derive(Clone)]
pub struct ScanPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    resolver: CatalogResolver,
    extractor: Arc<dyn FeatureExtractor>,
    tracker: OperationTracker,
    outcomes: Sender<ScanMessage>,
    settings: PipelineSettings,
    barcode_gate: BarcodeGate,
}

impl ScanPipeline {
    pub fn new(
        resolver: CatalogResolver,
        extractor: Arc<dyn FeatureExtractor>,
        settings: PipelineSettings,
    ) -> (Self, Receiver<ScanMessage>) {
        let (outcomes, receiver) = crossbeam_channel::unbounded();
        let barcode_gate = BarcodeGate::new(settings.barcode_cooldown);

        let pipeline = Self {
            inner: Arc::new(PipelineInner {
                resolver,
                extractor,
                tracker: OperationTracker::new(),
                outcomes,
                settings,
                barcode_gate,
            }),
        };

        (pipeline, receiver)
    }

    /// Start a scan, superseding any scan still running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_scan(&self, camera: Arc<dyn Camera>) -> JoinHandle<()> {
        let op = self.inner.tracker.begin();
        info!("Starting scan #{}", op.seq());

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run(&op, camera.as_ref()).await;
            inner.tracker.finish(&op);
        })
    }

    /// Cancel the running scan, if any. No outcome is delivered for it.
    pub fn cancel_scan(&self) -> bool {
        let cancelled = self.inner.tracker.cancel();
        if cancelled {
            info!("Scan cancelled");
        }
        cancelled
    }

    /// Route a decoded barcode to manual search
    ///
    /// Returns false when the barcode was suppressed.
    pub fn handle_barcode(&self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() {
            return false;
        }

        let admitted = self
            .inner
            .tracker
            .admit_barcode(&self.inner.barcode_gate, Instant::now(), || {
                self.inner.deliver(ScanMessage::Fallback {
                    prefill: code.to_string(),
                    ocr_clues: None,
                })
            });

        if admitted {
            info!("Barcode {:?} routed to manual search", code);
        } else {
            debug!("Ignoring barcode {:?} while busy or cooling down", code);
        }
        admitted
    }

    pub fn state(&self) -> ScanState {
        self.inner.tracker.scan_state()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.tracker.is_busy()
    }
}

impl PipelineInner {
    async fn run(&self, op: &ScanOperation, camera: &dyn Camera) {
        if !self.advance(op, ScanEvent::CaptureRequested) {
            return;
        }

        let frame = match camera.take_photo().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Photo capture failed: {:#}", e);
                self.fail(op, ErrorCategory::Generic, None);
                return;
            }
        };
        if !self.advance(op, ScanEvent::PhotoCaptured) {
            return;
        }

        let captured_at = frame.timestamp;
        let image = match self.compress(frame).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Photo compression failed: {:#}", e);
                self.fail(op, ErrorCategory::Generic, None);
                return;
            }
        };
        if !self.advance(op, ScanEvent::PhotoCompressed) {
            return;
        }

        let annotations = match self.analyze(op, &image).await {
            Some(Ok(annotations)) => annotations,
            Some(Err(e)) => {
                warn!("Band analysis failed: {}", e);
                self.fail(op, e.category(), None);
                return;
            }
            None => {
                debug!("Scan #{} aborted during analysis", op.seq());
                return;
            }
        };
        if !self.advance(op, ScanEvent::SignalsExtracted) {
            return;
        }
        debug!(
            "Scan #{} signals ready {:?} after capture",
            op.seq(),
            captured_at.elapsed()
        );

        if let Some(event) = self.match_signals(op, &annotations).await {
            self.advance(op, event);
        }
    }

    async fn compress(&self, frame: CapturedFrame) -> anyhow::Result<CompressedImage> {
        let settings = self.settings.compression.clone();
        tokio::task::spawn_blocking(move || compress_frame(&frame, &settings)).await?
    }

    /// Run feature extraction against the timeout and the abort signal
    ///
    /// Returns None when the operation was aborted.
    async fn analyze(
        &self,
        op: &ScanOperation,
        image: &CompressedImage,
    ) -> Option<Result<BandAnnotations, VisionError>> {
        let call = tokio::time::timeout(
            self.settings.analysis_timeout,
            self.extractor.annotate(image, &BAND_FEATURES),
        );

        tokio::select! {
            _ = op.abort_signal().cancelled() => None,
            result = call => Some(result.unwrap_or(Err(VisionError::Timeout))),
        }
    }

    /// Turn extracted signals into the terminal event
    ///
    /// Returns None when the operation went stale between resolve attempts.
    async fn match_signals(
        &self,
        op: &ScanOperation,
        annotations: &BandAnnotations,
    ) -> Option<ScanEvent> {
        if annotations.is_empty() {
            debug!("No logo or text detected on scan #{}", op.seq());
            return Some(ScanEvent::Failed {
                category: ErrorCategory::NoSignal,
                fallback_prefill: None,
            });
        }

        let ocr_clues = annotations.full_text().map(str::to_string);

        if let Some(logo) = annotations.best_logo() {
            let label = logo.description.trim().to_string();
            debug!("Matching logo {:?} (score {:.2})", label, logo.score);

            return Some(match self.resolver.resolve_to_cigar(&label).await {
                Ok(Some(record)) => ScanEvent::CigarMatched(record),
                Ok(None) => ScanEvent::MatchMissed {
                    prefill: label,
                    ocr_clues,
                },
                Err(e) => {
                    warn!("Catalog lookup failed: {}", e);
                    ScanEvent::Failed {
                        category: ErrorCategory::Permission,
                        fallback_prefill: Some(label),
                    }
                }
            });
        }

        let candidates = ocr_clues
            .as_deref()
            .map(build_text_candidates)
            .unwrap_or_default();
        let Some(first) = candidates.first().cloned() else {
            return Some(ScanEvent::Failed {
                category: ErrorCategory::NoSignal,
                fallback_prefill: None,
            });
        };

        debug!("Matching {} text candidates", candidates.len());
        for candidate in &candidates {
            if self.tracker.is_stale(op) {
                return None;
            }
            match self.resolver.resolve_to_cigar(candidate).await {
                Ok(Some(record)) => return Some(ScanEvent::CigarMatched(record)),
                Ok(None) => continue,
                Err(e) => {
                    warn!("Catalog lookup failed: {}", e);
                    return Some(ScanEvent::Failed {
                        category: ErrorCategory::Permission,
                        fallback_prefill: Some(first),
                    });
                }
            }
        }

        Some(ScanEvent::MatchMissed {
            prefill: first,
            ocr_clues,
        })
    }

    fn fail(&self, op: &ScanOperation, category: ErrorCategory, fallback_prefill: Option<String>) {
        self.advance(
            op,
            ScanEvent::Failed {
                category,
                fallback_prefill,
            },
        );
    }

    /// Apply an event if `op` is still current
    ///
    /// A terminal outcome is delivered and the state returns to idle under
    /// the same lock as the staleness check. Returns false for a stale op.
    fn advance(&self, op: &ScanOperation, event: ScanEvent) -> bool {
        self.tracker
            .with_current(op, |state| {
                let step = transition(*state, event);
                *state = step.next;

                if let Some(outcome) = step.outcome {
                    debug!("Scan #{} finished in {:?}", op.seq(), step.next);
                    self.deliver(outcome);
                    *state = transition(*state, ScanEvent::OutcomeDelivered).next;
                }
            })
            .is_some()
    }

    fn deliver(&self, outcome: ScanMessage) {
        if self.outcomes.send(outcome).is_err() {
            warn!("Scan outcome dropped: receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, CatalogField, CatalogStore, CigarRecord, InMemoryCatalog};
    use crate::vision::{FeatureType, LogoAnnotation, TextAnnotation};
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct StillCamera;

    #[async_trait]
    impl Camera for StillCamera {
        async fn take_photo(&self) -> anyhow::Result<CapturedFrame> {
            let mut data = Vec::new();
            DynamicImage::ImageRgb8(RgbImage::new(32, 16))
                .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
                .unwrap();
            Ok(CapturedFrame::new(data))
        }
    }

    struct BrokenCamera;

    #[async_trait]
    impl Camera for BrokenCamera {
        async fn take_photo(&self) -> anyhow::Result<CapturedFrame> {
            anyhow::bail!("camera unavailable")
        }
    }

    /// Answers each call with the next scripted reply, optionally after a delay
    struct ScriptedExtractor {
        replies: Vec<(Duration, BandAnnotations)>,
        calls: AtomicUsize,
        entered: Notify,
    }

    impl ScriptedExtractor {
        fn new(replies: Vec<(Duration, BandAnnotations)>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
                entered: Notify::new(),
            }
        }

        fn immediate(annotations: BandAnnotations) -> Self {
            Self::new(vec![(Duration::ZERO, annotations)])
        }

        fn hanging() -> Self {
            Self::new(vec![(Duration::from_secs(3600), BandAnnotations::default())])
        }
    }

    #[async_trait]
    impl FeatureExtractor for ScriptedExtractor {
        async fn annotate(
            &self,
            _image: &CompressedImage,
            features: &[FeatureType],
        ) -> Result<BandAnnotations, VisionError> {
            assert_eq!(features, &BAND_FEATURES);
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();

            let (delay, annotations) = self.replies[call.min(self.replies.len() - 1)].clone();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(annotations)
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl FeatureExtractor for FailingExtractor {
        async fn annotate(
            &self,
            _image: &CompressedImage,
            _features: &[FeatureType],
        ) -> Result<BandAnnotations, VisionError> {
            Err(VisionError::Network("connection refused".into()))
        }
    }

    struct DeniedCatalog;

    #[async_trait]
    impl CatalogStore for DeniedCatalog {
        async fn find_equal(
            &self,
            _field: CatalogField,
            _value: &str,
            _limit: usize,
        ) -> Result<Vec<CigarRecord>, CatalogError> {
            Err(CatalogError::PermissionDenied("missing read grant".into()))
        }

        async fn find_range(
            &self,
            _field: CatalogField,
            _start: &str,
            _end: &str,
            _limit: usize,
        ) -> Result<Vec<CigarRecord>, CatalogError> {
            Err(CatalogError::PermissionDenied("missing read grant".into()))
        }
    }

    /// Answers every lookup with nothing after a short delay, recording
    /// equality queries and signalling the first one
    struct SlowCatalog {
        delay: Duration,
        queried: parking_lot::Mutex<Vec<(CatalogField, String)>>,
        entered: Notify,
    }

    impl SlowCatalog {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                queried: parking_lot::Mutex::new(Vec::new()),
                entered: Notify::new(),
            }
        }

        fn was_queried(&self, field: CatalogField, value: &str) -> bool {
            self.queried
                .lock()
                .iter()
                .any(|(f, v)| *f == field && v == value)
        }
    }

    #[async_trait]
    impl CatalogStore for SlowCatalog {
        async fn find_equal(
            &self,
            field: CatalogField,
            value: &str,
            _limit: usize,
        ) -> Result<Vec<CigarRecord>, CatalogError> {
            self.queried.lock().push((field, value.to_string()));
            self.entered.notify_one();
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        }

        async fn find_range(
            &self,
            _field: CatalogField,
            _start: &str,
            _end: &str,
            _limit: usize,
        ) -> Result<Vec<CigarRecord>, CatalogError> {
            Ok(Vec::new())
        }
    }

    fn war_hawk() -> CigarRecord {
        CigarRecord::new("hc-wh", "Henry Clay War Hawk", "Henry Clay")
    }

    fn catalog_resolver() -> CatalogResolver {
        CatalogResolver::new(Arc::new(InMemoryCatalog::new(vec![war_hawk()])))
    }

    fn logo(description: &str, score: f32) -> BandAnnotations {
        BandAnnotations {
            logos: vec![LogoAnnotation {
                description: description.to_string(),
                score,
            }],
            text_annotations: vec![],
        }
    }

    fn text(description: &str) -> BandAnnotations {
        BandAnnotations {
            logos: vec![],
            text_annotations: vec![TextAnnotation {
                description: description.to_string(),
            }],
        }
    }

    fn pipeline_with(
        resolver: CatalogResolver,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> (ScanPipeline, Receiver<ScanMessage>) {
        ScanPipeline::new(resolver, extractor, PipelineSettings::default())
    }

    async fn scan_once(
        pipeline: &ScanPipeline,
        receiver: &Receiver<ScanMessage>,
    ) -> Vec<ScanMessage> {
        pipeline.start_scan(Arc::new(StillCamera)).await.unwrap();
        receiver.try_iter().collect()
    }

    #[tokio::test]
    async fn test_logo_resolves_to_cigar() {
        let extractor = Arc::new(ScriptedExtractor::immediate(logo("Henry Clay", 0.9)));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor);

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(messages, vec![ScanMessage::Resolved(war_hawk())]);
        assert_eq!(pipeline.state(), ScanState::Idle);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn test_logo_miss_prefills_label() {
        let mut annotations = logo("Cohiba", 0.8);
        annotations.text_annotations.push(TextAnnotation {
            description: "COHIBA\nBEHIKE".to_string(),
        });
        let extractor = Arc::new(ScriptedExtractor::immediate(annotations));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor);

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(
            messages,
            vec![ScanMessage::Fallback {
                prefill: "Cohiba".to_string(),
                ocr_clues: Some("COHIBA\nBEHIKE".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_text_resolves_to_cigar() {
        let extractor = Arc::new(ScriptedExtractor::immediate(text("HENRY CLAY\nWAR HAWK")));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor);

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(messages, vec![ScanMessage::Resolved(war_hawk())]);
    }

    #[tokio::test]
    async fn test_unmatched_text_falls_back_to_first_candidate() {
        let extractor = Arc::new(ScriptedExtractor::immediate(text("SOME UNKNOWN BAND TEXT")));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor);

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(
            messages,
            vec![ScanMessage::Fallback {
                prefill: "Some Unknown Band Text".to_string(),
                ocr_clues: Some("SOME UNKNOWN BAND TEXT".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_no_signal() {
        let extractor = Arc::new(ScriptedExtractor::immediate(BandAnnotations::default()));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor);

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(messages, vec![ScanMessage::failed(ErrorCategory::NoSignal, None)]);
    }

    #[tokio::test]
    async fn test_punctuation_only_text_is_no_signal() {
        let extractor = Arc::new(ScriptedExtractor::immediate(text("** ~ **")));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor);

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(messages, vec![ScanMessage::failed(ErrorCategory::NoSignal, None)]);
    }

    #[tokio::test]
    async fn test_analysis_timeout() {
        let settings = PipelineSettings {
            analysis_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let (pipeline, receiver) = ScanPipeline::new(
            catalog_resolver(),
            Arc::new(ScriptedExtractor::hanging()),
            settings,
        );

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(messages, vec![ScanMessage::failed(ErrorCategory::Timeout, None)]);
        assert!(ErrorCategory::Timeout.is_retryable());
    }

    #[tokio::test]
    async fn test_network_failure() {
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), Arc::new(FailingExtractor));

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(messages, vec![ScanMessage::failed(ErrorCategory::Network, None)]);
    }

    #[tokio::test]
    async fn test_camera_failure_is_generic() {
        let extractor = Arc::new(ScriptedExtractor::immediate(logo("Henry Clay", 0.9)));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor);

        pipeline.start_scan(Arc::new(BrokenCamera)).await.unwrap();
        let messages: Vec<_> = receiver.try_iter().collect();
        assert_eq!(messages, vec![ScanMessage::failed(ErrorCategory::Generic, None)]);
    }

    #[tokio::test]
    async fn test_catalog_permission_failure_keeps_prefill() {
        let extractor = Arc::new(ScriptedExtractor::immediate(logo("Henry Clay", 0.9)));
        let resolver = CatalogResolver::new(Arc::new(DeniedCatalog));
        let (pipeline, receiver) = pipeline_with(resolver, extractor);

        let messages = scan_once(&pipeline, &receiver).await;
        assert_eq!(
            messages,
            vec![ScanMessage::failed(
                ErrorCategory::Permission,
                Some("Henry Clay".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_cancel_while_analyzing_is_silent() {
        let extractor = Arc::new(ScriptedExtractor::hanging());
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor.clone());

        let handle = pipeline.start_scan(Arc::new(StillCamera));
        extractor.entered.notified().await;
        assert_eq!(pipeline.state(), ScanState::Analyzing);

        assert!(pipeline.cancel_scan());
        assert!(!pipeline.cancel_scan());
        handle.await.unwrap();

        assert!(receiver.try_recv().is_err());
        assert_eq!(pipeline.state(), ScanState::Idle);
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn test_cancel_while_matching_stops_between_candidates() {
        let catalog = Arc::new(SlowCatalog::new(Duration::from_millis(20)));
        let resolver = CatalogResolver::new(catalog.clone());
        let extractor = Arc::new(ScriptedExtractor::immediate(text("HENRY CLAY\nWAR HAWK")));
        let (pipeline, receiver) = pipeline_with(resolver, extractor);

        let handle = pipeline.start_scan(Arc::new(StillCamera));
        catalog.entered.notified().await;
        assert_eq!(pipeline.state(), ScanState::Matching);

        assert!(pipeline.cancel_scan());
        handle.await.unwrap();

        assert!(receiver.try_recv().is_err());
        assert_eq!(pipeline.state(), ScanState::Idle);
        assert!(!pipeline.is_busy());

        // Candidates are "Henry Clay War Hawk", "Henry Clay", "War Hawk"
        assert!(catalog.was_queried(CatalogField::Name, "Henry Clay War Hawk"));
        assert!(!catalog.was_queried(CatalogField::Name, "Henry Clay"));
        assert!(!catalog.was_queried(CatalogField::Name, "War Hawk"));
    }

    #[tokio::test]
    async fn test_second_scan_supersedes_first() {
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            (Duration::from_millis(200), logo("Henry Clay", 0.9)),
            (Duration::ZERO, text("SOME UNKNOWN BAND TEXT")),
        ]));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor.clone());

        let first = pipeline.start_scan(Arc::new(StillCamera));
        extractor.entered.notified().await;
        let second = pipeline.start_scan(Arc::new(StillCamera));

        second.await.unwrap();
        first.await.unwrap();

        let messages: Vec<_> = receiver.try_iter().collect();
        assert_eq!(
            messages,
            vec![ScanMessage::Fallback {
                prefill: "Some Unknown Band Text".to_string(),
                ocr_clues: Some("SOME UNKNOWN BAND TEXT".to_string()),
            }]
        );
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn test_barcode_routes_to_manual_search() {
        let extractor = Arc::new(ScriptedExtractor::immediate(BandAnnotations::default()));
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor);

        assert!(pipeline.handle_barcode(" 0123456789012 "));
        assert!(!pipeline.handle_barcode("   "));
        assert_eq!(
            receiver.try_iter().collect::<Vec<_>>(),
            vec![ScanMessage::Fallback {
                prefill: "0123456789012".to_string(),
                ocr_clues: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_barcode_suppressed_while_scanning_and_after_cancel() {
        let extractor = Arc::new(ScriptedExtractor::hanging());
        let (pipeline, receiver) = pipeline_with(catalog_resolver(), extractor.clone());

        let handle = pipeline.start_scan(Arc::new(StillCamera));
        extractor.entered.notified().await;
        assert!(!pipeline.handle_barcode("0123456789012"));

        pipeline.cancel_scan();
        handle.await.unwrap();
        assert!(!pipeline.handle_barcode("0123456789012"));

        assert!(receiver.try_recv().is_err());
    }
}
