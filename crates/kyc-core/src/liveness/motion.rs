//! Inter-frame motion liveness for short videos.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::frames::FrameDecoder;
use super::{Capture, LivenessStrategy, INSUFFICIENT_FRAMES, INSUFFICIENT_MOTION};
use crate::config::LivenessConfig;
use crate::domain::{KycError, LivenessResult, Result};
use crate::imaging::{abs_diff_sum, smoothed_gray};

/// Motion statistics over a frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSummary {
    pub frame_count: usize,
    /// Mean over consecutive frame pairs of the summed absolute pixel
    /// difference. Zero with fewer than two frames.
    pub avg_motion: f64,
}

/// Running motion measurement. Frames are pushed one at a time; only the
/// previous blurred grey frame is retained.
///
/// Frames whose size differs from the first are resized to match it.
#[derive(Debug, Clone)]
pub struct MotionAccumulator {
    blur_sigma: f32,
    dims: Option<(u32, u32)>,
    previous: Option<GrayImage>,
    frame_count: usize,
    total: u64,
    pairs: u64,
}

impl MotionAccumulator {
    pub fn new(blur_sigma: f32) -> Self {
        Self {
            blur_sigma,
            dims: None,
            previous: None,
            frame_count: 0,
            total: 0,
            pairs: 0,
        }
    }

    pub fn push(&mut self, frame: &DynamicImage) {
        let mut gray = smoothed_gray(frame, self.blur_sigma);
        let (w, h) = *self.dims.get_or_insert(gray.dimensions());
        if gray.dimensions() != (w, h) {
            gray = imageops::resize(&gray, w, h, FilterType::Triangle);
        }
        if let Some(prev) = self.previous.as_ref() {
            self.total += abs_diff_sum(prev, &gray);
            self.pairs += 1;
        }
        self.previous = Some(gray);
        self.frame_count += 1;
    }

    pub fn summary(&self) -> MotionSummary {
        MotionSummary {
            frame_count: self.frame_count,
            avg_motion: if self.pairs == 0 {
                0.0
            } else {
                self.total as f64 / self.pairs as f64
            },
        }
    }
}

/// Blur every frame, difference consecutive pairs, average the sums.
pub fn measure_motion<'a>(
    frames: impl IntoIterator<Item = &'a DynamicImage>,
    blur_sigma: f32,
) -> MotionSummary {
    let mut acc = MotionAccumulator::new(blur_sigma);
    for frame in frames {
        acc.push(frame);
    }
    acc.summary()
}

pub struct MotionLivenessStrategy {
    decoder: Arc<dyn FrameDecoder>,
    min_frames: usize,
    motion_threshold: f64,
    blur_sigma: f32,
    max_frames: usize,
}

impl MotionLivenessStrategy {
    pub fn new(decoder: Arc<dyn FrameDecoder>, config: &LivenessConfig) -> Self {
        Self {
            decoder,
            min_frames: config.min_frames,
            motion_threshold: config.motion_threshold,
            blur_sigma: config.blur_sigma,
            max_frames: config.max_frames,
        }
    }

    /// Decide from already decoded frames.
    pub fn check_frames(&self, frames: &[DynamicImage]) -> LivenessResult {
        self.decide(measure_motion(frames, self.blur_sigma))
    }

    fn decide(&self, summary: MotionSummary) -> LivenessResult {
        let enough_frames = summary.frame_count >= self.min_frames;
        let enough_motion = summary.avg_motion > self.motion_threshold;

        tracing::debug!(
            frames = summary.frame_count,
            avg_motion = summary.avg_motion,
            threshold = self.motion_threshold,
            "motion liveness"
        );

        let reason = if !enough_frames {
            Some(INSUFFICIENT_FRAMES)
        } else if !enough_motion {
            Some(INSUFFICIENT_MOTION)
        } else {
            None
        };
        LivenessResult {
            live: enough_frames && enough_motion,
            metric: summary.avg_motion,
            reason: reason.map(str::to_string),
        }
    }
}

impl LivenessStrategy for MotionLivenessStrategy {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn check(&self, capture: &Capture) -> Result<LivenessResult> {
        match capture {
            Capture::Video(path) => {
                let mut acc = MotionAccumulator::new(self.blur_sigma);
                self.decoder.for_each_frame(path, self.max_frames, &mut |frame| {
                    acc.push(&frame);
                    Ok(())
                })?;
                Ok(self.decide(acc.summary()))
            }
            Capture::Still(_) => Err(KycError::Validation(
                "motion liveness needs a video capture".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::FrameDirDecoder;
    use image::{GrayImage, Luma};

    fn flat(value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([value])))
    }

    fn strategy(motion_threshold: f64) -> MotionLivenessStrategy {
        let config = LivenessConfig {
            motion_threshold,
            ..LivenessConfig::default()
        };
        MotionLivenessStrategy::new(Arc::new(FrameDirDecoder), &config)
    }

    #[test]
    fn identical_frames_have_zero_motion_and_are_not_live() {
        let frames = vec![flat(90); 10];
        let result = strategy(50_000.0).check_frames(&frames);
        assert_eq!(result.metric, 0.0);
        assert!(!result.live);
        assert_eq!(result.reason.as_deref(), Some(INSUFFICIENT_MOTION));
    }

    #[test]
    fn single_frame_has_zero_motion() {
        let summary = measure_motion(&[flat(10)], 1.0);
        assert_eq!(summary.frame_count, 1);
        assert_eq!(summary.avg_motion, 0.0);
        assert_eq!(measure_motion(&[] as &[DynamicImage], 1.0).avg_motion, 0.0);
    }

    #[test]
    fn alternating_frames_average_their_differences() {
        let frames: Vec<_> = (0..4).map(|i| flat(if i % 2 == 0 { 50 } else { 150 })).collect();
        let summary = measure_motion(&frames, 0.0);
        assert_eq!(summary.avg_motion, (32 * 32 * 100) as f64);
    }

    #[test]
    fn enough_motion_and_frames_is_live() {
        let frames: Vec<_> = (0..8).map(|i| flat(if i % 2 == 0 { 0 } else { 200 })).collect();
        let result = strategy(50_000.0).check_frames(&frames);
        assert!(result.live);
        assert!(result.reason.is_none());
    }

    #[test]
    fn too_few_frames_is_not_live_despite_motion() {
        let frames: Vec<_> = (0..7).map(|i| flat(if i % 2 == 0 { 0 } else { 200 })).collect();
        let result = strategy(50_000.0).check_frames(&frames);
        assert!(!result.live);
        assert_eq!(result.reason.as_deref(), Some(INSUFFICIENT_FRAMES));
    }

    #[test]
    fn mismatched_frame_sizes_are_resized() {
        let small = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([80])));
        let summary = measure_motion(&[flat(80), small], 0.0);
        assert_eq!(summary.frame_count, 2);
        // Resampling a flat frame may round by at most one grey level.
        assert!(summary.avg_motion <= (32 * 32) as f64);
    }

    /// Synthesises flickering frames on demand and records how many were
    /// alive at once.
    struct CountingDecoder {
        frames: usize,
        outstanding: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    impl FrameDecoder for CountingDecoder {
        fn for_each_frame(
            &self,
            _source: &std::path::Path,
            max_frames: usize,
            sink: &mut crate::liveness::frames::FrameSink<'_>,
        ) -> Result<usize> {
            use std::sync::atomic::Ordering;
            let count = self.frames.min(max_frames);
            for i in 0..count {
                let frame = flat(if i % 2 == 0 { 0 } else { 200 });
                let live = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(live, Ordering::SeqCst);
                sink(frame)?;
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(count)
        }
    }

    #[test]
    fn video_frames_are_consumed_one_at_a_time() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let decoder = Arc::new(CountingDecoder {
            frames: 40,
            outstanding: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = LivenessConfig {
            max_frames: 30,
            blur_sigma: 0.0,
            ..LivenessConfig::default()
        };
        let strategy = MotionLivenessStrategy::new(decoder.clone(), &config);

        let result = strategy.check(&Capture::Video("clip.mp4".into())).unwrap();
        assert!(result.live);
        assert_eq!(result.metric, (32 * 32 * 200) as f64);
        assert_eq!(decoder.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn accumulator_matches_batch_measurement() {
        let frames: Vec<_> = (0..5).map(|i| flat(i * 40)).collect();
        let mut acc = MotionAccumulator::new(0.0);
        for frame in &frames {
            acc.push(frame);
        }
        assert_eq!(acc.summary(), measure_motion(&frames, 0.0));
        assert_eq!(acc.summary().frame_count, 5);
    }

    #[test]
    fn still_capture_rejected() {
        let err = strategy(1.0)
            .check(&Capture::Still("/tmp/selfie.jpg".into()))
            .unwrap_err();
        assert!(matches!(err, KycError::Validation(_)));
    }

    #[test]
    fn unreadable_video_source_is_error() {
        let err = strategy(1.0)
            .check(&Capture::Video("/no/such/frames".into()))
            .unwrap_err();
        assert!(matches!(err, KycError::Decode(_)));
    }
}
