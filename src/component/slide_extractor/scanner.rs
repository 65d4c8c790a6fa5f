//! 跳躍取樣掃描器
//!
//! 每一輪：讀取目前影格 → 檢查略過區間 → 與固定距離後的影格比較穩定度 →
//! 穩定則收錄，並以指數跳躍（跳過頭時回溯）尋找下一個明顯變化的位置。

use super::collector::FrameCollector;
use super::stability::StabilityClassifier;
use crate::config::{ScanConfig, SkipRange};
use crate::tools::{Frame, FrameSource, SimilarityOracle};
use image::{GrayImage, imageops};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 由影片幀率推導出的跳躍參數
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    /// 一個超級幀的長度，同時是穩定度前瞻距離與初始跳躍距離
    pub jump_init: u64,
    /// 發現變化時若跳躍距離超過此值，視為跳過頭
    pub jump_threshold: u64,
}

impl ScanParams {
    #[must_use]
    pub fn from_frame_rate(frame_rate: u32, config: &ScanConfig) -> Self {
        let jump_init =
            u64::from(frame_rate.max(1)) * u64::from(config.super_frame_multiplier.max(1));
        Self {
            jump_init,
            jump_threshold: jump_init * u64::from(config.jump_threshold_multiplier.max(1)),
        }
    }
}

/// 掃描游標，每一步都以值傳入並回傳新的游標
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    pub index: u64,
    pub jump: u64,
    /// 自上次收錄後，確認與參考影格仍相似的最遠位置
    pub farthest_similar: u64,
}

impl ScanCursor {
    #[must_use]
    pub const fn start(params: ScanParams) -> Self {
        Self {
            index: 1,
            jump: params.jump_init,
            farthest_similar: 1,
        }
    }

    /// 往前推進一個超級幀，跳躍距離保持不變
    #[must_use]
    const fn advanced(self, params: ScanParams) -> Self {
        Self {
            index: self.index + params.jump_init,
            ..self
        }
    }
}

/// 提供給進度顯示的觀察資料，不影響掃描流程
#[derive(Debug, Clone, Copy)]
pub struct ScanProgress {
    pub current: u64,
    pub total: u64,
    pub emitted: usize,
    pub elapsed: Duration,
}

/// 掃描結束的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTermination {
    /// 游標加上跳躍距離已超出影片
    Completed,
    /// 來源在預期之前就沒有影格了
    EndOfStream,
    /// 解碼或比較失敗，已收錄的影格仍然有效
    Failed(String),
    /// 收到中斷信號
    Interrupted,
}

impl ScanTermination {
    /// 是否提早結束（結果可能不完整）
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Interrupted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub termination: ScanTermination,
    pub params: ScanParams,
    pub iterations: usize,
    pub skipped_in_ranges: usize,
    pub unstable: usize,
    pub backtracks: usize,
}

/// 單一步驟的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue(ScanCursor),
    Stop(ScanTermination),
}

/// 變化搜尋的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// 找到變化點，游標位於該點
    Found(ScanCursor),
    /// 跳到影片結尾都沒有變化
    Exhausted(ScanCursor),
    Stopped(ScanTermination),
}

pub struct JumpScanner<'a, S: FrameSource> {
    source: &'a mut S,
    oracle: &'a dyn SimilarityOracle,
    classifier: StabilityClassifier,
    params: ScanParams,
    threshold: f64,
    skip_ranges: &'a [SkipRange],
    skipped_in_ranges: usize,
    unstable: usize,
    backtracks: usize,
}

impl<'a, S: FrameSource> JumpScanner<'a, S> {
    pub fn new(
        source: &'a mut S,
        oracle: &'a dyn SimilarityOracle,
        threshold: f64,
        skip_ranges: &'a [SkipRange],
        config: &ScanConfig,
    ) -> Self {
        let params = ScanParams::from_frame_rate(source.frame_rate(), config);
        Self {
            source,
            oracle,
            classifier: StabilityClassifier::new(config),
            params,
            threshold,
            skip_ranges,
            skipped_in_ranges: 0,
            unstable: 0,
            backtracks: 0,
        }
    }

    #[must_use]
    pub const fn params(&self) -> ScanParams {
        self.params
    }

    /// 掃描整部影片，將穩定且相異的影格放進 `collector`
    pub fn run(
        &mut self,
        collector: &mut FrameCollector,
        on_progress: &dyn Fn(&ScanProgress),
        shutdown_signal: Option<&AtomicBool>,
    ) -> ScanReport {
        let frame_count = self.source.frame_count();
        let start_time = Instant::now();
        let mut cursor = ScanCursor::start(self.params);
        let mut iterations = 0;

        let termination = loop {
            if cursor.index + cursor.jump >= frame_count {
                break ScanTermination::Completed;
            }
            if shutdown_signal.is_some_and(|s| s.load(Ordering::SeqCst)) {
                warn!("收到中斷信號，停止掃描於第 {} 幀", cursor.index);
                break ScanTermination::Interrupted;
            }

            on_progress(&ScanProgress {
                current: cursor.index,
                total: frame_count,
                emitted: collector.len(),
                elapsed: start_time.elapsed(),
            });

            iterations += 1;
            match self.scan_step(cursor, collector) {
                Step::Continue(next) => cursor = next,
                Step::Stop(reason) => break reason,
            }
        };

        on_progress(&ScanProgress {
            current: cursor.index.min(frame_count),
            total: frame_count,
            emitted: collector.len(),
            elapsed: start_time.elapsed(),
        });

        ScanReport {
            termination,
            params: self.params,
            iterations,
            skipped_in_ranges: self.skipped_in_ranges,
            unstable: self.unstable,
            backtracks: self.backtracks,
        }
    }

    /// 外層迴圈的一步
    pub fn scan_step(&mut self, cursor: ScanCursor, collector: &mut FrameCollector) -> Step {
        let frame = match self.source.seek_and_read(cursor.index) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Step::Stop(ScanTermination::EndOfStream),
            Err(e) => return Step::Stop(read_failure(cursor.index, &e)),
        };

        let time_ms = self.source.presentation_time_ms();
        if self.skip_ranges.iter().any(|r| r.contains(time_ms)) {
            self.skipped_in_ranges += 1;
            return Step::Continue(cursor.advanced(self.params));
        }

        let lookahead_index = cursor.index + self.params.jump_init;
        let lookahead = match self.source.peek(lookahead_index) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Step::Stop(ScanTermination::EndOfStream),
            Err(e) => return Step::Stop(read_failure(lookahead_index, &e)),
        };

        match self
            .classifier
            .is_stable(self.oracle, &frame, &lookahead, self.threshold)
        {
            Ok(true) => {}
            Ok(false) => {
                self.unstable += 1;
                return Step::Continue(cursor.advanced(self.params));
            }
            Err(e) => return Step::Stop(compare_failure(cursor.index, &e)),
        }

        let reference = imageops::grayscale(&frame);
        debug!("收錄第 {} 幀 ({time_ms} ms)", cursor.index);
        collector.push(cursor.index, time_ms, frame);

        match self.search_change(cursor, &reference) {
            SearchOutcome::Found(next) | SearchOutcome::Exhausted(next) => Step::Continue(next),
            SearchOutcome::Stopped(reason) => Step::Stop(reason),
        }
    }

    /// 從 `cursor.index` 開始以指數跳躍尋找與參考影格不同的位置
    ///
    /// 發現變化時若跳躍距離已超過 `jump_threshold`，回到最遠的相似位置並重設跳躍距離，
    /// 因此接受的變化點最多比實際變化晚 `jump_threshold` 幀。
    pub fn search_change(&mut self, cursor: ScanCursor, reference: &GrayImage) -> SearchOutcome {
        let frame_count = self.source.frame_count();
        let mut cursor = ScanCursor {
            index: cursor.index,
            jump: self.params.jump_init,
            farthest_similar: cursor.index,
        };

        while cursor.index + cursor.jump <= frame_count {
            let next_index = (cursor.index + cursor.jump).min(frame_count.saturating_sub(1));

            let candidate: Frame = match self.source.peek(next_index) {
                Ok(Some(frame)) => frame,
                Ok(None) => return SearchOutcome::Stopped(ScanTermination::EndOfStream),
                Err(e) => return SearchOutcome::Stopped(read_failure(next_index, &e)),
            };

            let similarity = match self
                .oracle
                .similarity(reference, &imageops::grayscale(&candidate))
            {
                Ok(similarity) => similarity,
                Err(e) => return SearchOutcome::Stopped(compare_failure(next_index, &e)),
            };

            if similarity <= self.threshold {
                if cursor.jump > self.params.jump_threshold {
                    debug!(
                        "第 {next_index} 幀跳過頭 (jump={})，回溯到第 {} 幀",
                        cursor.jump, cursor.farthest_similar
                    );
                    self.backtracks += 1;
                    cursor.index = cursor.farthest_similar;
                    cursor.jump = self.params.jump_init;
                    continue;
                }

                cursor.index = next_index;
                return SearchOutcome::Found(cursor);
            }

            cursor.farthest_similar = next_index;
            cursor.jump *= 2;
        }

        SearchOutcome::Exhausted(cursor)
    }
}

fn read_failure(index: u64, error: &anyhow::Error) -> ScanTermination {
    warn!("讀取第 {index} 幀失敗，提前結束掃描: {error:#}");
    ScanTermination::Failed(format!("讀取第 {index} 幀失敗: {error}"))
}

fn compare_failure(index: u64, error: &anyhow::Error) -> ScanTermination {
    warn!("比較第 {index} 幀失敗，提前結束掃描: {error:#}");
    ScanTermination::Failed(format!("比較第 {index} 幀失敗: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Ssim;
    use anyhow::{Result, bail};
    use image::{Luma, Rgb};
    use std::cell::RefCell;

    /// 合成影片：`cuts` 為每段開始的幀索引，每段是不同灰階的純色畫面；
    /// `animated` 範圍內畫面是位置來回切換的黑色方塊（模擬轉場動畫）
    struct SyntheticVideo {
        frame_count: u64,
        decodable: u64,
        frame_rate: u32,
        cuts: Vec<u64>,
        animated: Option<(u64, u64)>,
        fail_at: Option<u64>,
        position: u64,
        peeks: RefCell<Vec<u64>>,
    }

    impl SyntheticVideo {
        fn new(frame_count: u64, frame_rate: u32, cuts: &[u64]) -> Self {
            Self {
                frame_count,
                decodable: frame_count,
                frame_rate,
                cuts: cuts.to_vec(),
                animated: None,
                fail_at: None,
                position: 0,
                peeks: RefCell::new(Vec::new()),
            }
        }

        fn render(&self, index: u64) -> Result<Option<Frame>> {
            if self.fail_at == Some(index) {
                bail!("corrupt packet");
            }
            if index >= self.decodable {
                return Ok(None);
            }
            if self
                .animated
                .is_some_and(|(start, end)| (start..end).contains(&index))
            {
                let x0 = ((index / 50) % 2) as u32 * 8;
                return Ok(Some(Frame::from_fn(16, 16, |x, y| {
                    if (x0..x0 + 4).contains(&x) && (6..10).contains(&y) {
                        Rgb([0; 3])
                    } else {
                        Rgb([200; 3])
                    }
                })));
            }
            let segment = self.cuts.iter().filter(|&&c| c <= index).count() as u8;
            let value = 30 + segment.wrapping_mul(70);
            Ok(Some(Frame::from_pixel(16, 16, Rgb([value; 3]))))
        }
    }

    impl FrameSource for SyntheticVideo {
        fn frame_count(&self) -> u64 {
            self.frame_count
        }

        fn frame_rate(&self) -> u32 {
            self.frame_rate
        }

        fn seek_and_read(&mut self, index: u64) -> Result<Option<Frame>> {
            let frame = self.render(index)?;
            self.position = index;
            Ok(frame)
        }

        fn peek(&mut self, index: u64) -> Result<Option<Frame>> {
            self.peeks.borrow_mut().push(index);
            self.render(index)
        }

        fn presentation_time_ms(&self) -> u64 {
            self.position * 1000 / u64::from(self.frame_rate)
        }
    }

    fn scan(video: &mut SyntheticVideo, skip: &[SkipRange]) -> (Vec<u64>, ScanReport) {
        let oracle = Ssim::default();
        let mut collector = FrameCollector::new();
        let report = JumpScanner::new(video, &oracle, 0.88, skip, &ScanConfig::default())
            .run(&mut collector, &|_| {}, None);
        (collector.indices(), report)
    }

    #[test]
    fn test_params_from_frame_rate() {
        let params = ScanParams::from_frame_rate(30, &ScanConfig::default());
        assert_eq!(params.jump_init, 150);
        assert_eq!(params.jump_threshold, 300);

        let custom = ScanConfig {
            super_frame_multiplier: 2,
            jump_threshold_multiplier: 3,
            ..Default::default()
        };
        let params = ScanParams::from_frame_rate(25, &custom);
        assert_eq!(params.jump_init, 50);
        assert_eq!(params.jump_threshold, 150);
    }

    #[test]
    fn test_single_cut_emits_start_and_cut() {
        let mut video = SyntheticVideo::new(900, 30, &[300]);
        let (indices, report) = scan(&mut video, &[]);

        assert_eq!(indices, vec![1, 301]);
        assert_eq!(report.termination, ScanTermination::Completed);
        assert_eq!(report.backtracks, 0);
        assert_eq!(report.iterations, 2);
    }

    #[test]
    fn test_search_backtracks_after_overshoot() {
        let mut video = SyntheticVideo::new(3000, 30, &[1000]);
        let oracle = Ssim::default();
        let mut scanner =
            JumpScanner::new(&mut video, &oracle, 0.88, &[], &ScanConfig::default());

        let start = ScanCursor::start(scanner.params());
        let reference = GrayImage::from_pixel(16, 16, Luma([30]));
        let outcome = scanner.search_change(start, &reference);

        // 151、301、601 相似；1201 不同但 jump=1200 > 300，回溯到 601
        // 751、901 相似；1201 不同但 jump=600 > 300，回溯到 901；1051 不同，接受
        match outcome {
            SearchOutcome::Found(cursor) => {
                assert_eq!(cursor.index, 1051);
                assert_eq!(cursor.farthest_similar, 901);
                assert_eq!(cursor.jump, 150);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(scanner.backtracks, 2);
        assert_eq!(
            *video.peeks.borrow(),
            vec![151, 301, 601, 1201, 751, 901, 1201, 1051]
        );
    }

    #[test]
    fn test_search_exhausted_without_change() {
        let mut video = SyntheticVideo::new(1000, 30, &[]);
        let oracle = Ssim::default();
        let mut scanner =
            JumpScanner::new(&mut video, &oracle, 0.88, &[], &ScanConfig::default());
        let reference = GrayImage::from_pixel(16, 16, Luma([30]));

        match scanner.search_change(ScanCursor::start(scanner.params()), &reference) {
            SearchOutcome::Exhausted(cursor) => {
                assert_eq!(cursor.index, 1);
                assert_eq!(cursor.farthest_similar, 601);
                assert!(cursor.index + cursor.jump > 1000);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_short_video_emits_nothing() {
        let mut video = SyntheticVideo::new(120, 30, &[]);
        let (indices, report) = scan(&mut video, &[]);
        assert!(indices.is_empty());
        assert_eq!(report.iterations, 0);
        assert_eq!(report.termination, ScanTermination::Completed);
    }

    #[test]
    fn test_skip_range_advances_by_super_frame() {
        let mut video = SyntheticVideo::new(900, 30, &[300]);
        let skip = [SkipRange {
            start_ms: 0,
            end_ms: 6_000,
        }];
        let (indices, report) = scan(&mut video, &skip);

        // 第 1 幀 (33 ms) 與第 151 幀 (5033 ms) 都在區間內
        assert_eq!(report.skipped_in_ranges, 2);
        assert_eq!(indices, vec![301]);
    }

    #[test]
    fn test_transition_frames_are_not_emitted() {
        let mut video = SyntheticVideo::new(900, 30, &[]);
        video.animated = Some((0, 400));
        let (indices, report) = scan(&mut video, &[]);

        // 1、151、301 與前瞻影格的二值化畫面不同，直到 451 才穩定
        assert_eq!(report.unstable, 3);
        assert_eq!(indices, vec![451]);
    }

    #[test]
    fn test_decode_failure_keeps_partial_result() {
        let mut video = SyntheticVideo::new(900, 30, &[300]);
        video.fail_at = Some(601);
        let (indices, report) = scan(&mut video, &[]);

        assert_eq!(indices, vec![1, 301]);
        assert!(matches!(report.termination, ScanTermination::Failed(_)));
        assert!(report.termination.is_partial());
    }

    #[test]
    fn test_end_of_stream_during_search_stops_scan() {
        // 容器宣稱 900 幀，實際只能解到第 500 幀
        let mut video = SyntheticVideo::new(900, 30, &[300]);
        video.decodable = 500;
        let (indices, report) = scan(&mut video, &[]);

        assert_eq!(indices, vec![1, 301]);
        assert_eq!(report.termination, ScanTermination::EndOfStream);
        assert!(!report.termination.is_partial());
    }

    #[test]
    fn test_interrupted_scan_stops_before_first_step() {
        let mut video = SyntheticVideo::new(900, 30, &[300]);
        let oracle = Ssim::default();
        let mut collector = FrameCollector::new();
        let shutdown = AtomicBool::new(true);

        let report = JumpScanner::new(&mut video, &oracle, 0.88, &[], &ScanConfig::default())
            .run(&mut collector, &|_| {}, Some(&shutdown));

        assert!(collector.is_empty());
        assert_eq!(report.termination, ScanTermination::Interrupted);
    }

    #[test]
    fn test_progress_reports_each_iteration() {
        let mut video = SyntheticVideo::new(900, 30, &[300]);
        let oracle = Ssim::default();
        let mut collector = FrameCollector::new();
        let seen = RefCell::new(Vec::new());

        let report = JumpScanner::new(&mut video, &oracle, 0.88, &[], &ScanConfig::default())
            .run(
                &mut collector,
                &|p: &ScanProgress| seen.borrow_mut().push((p.current, p.emitted)),
                None,
            );

        let seen = seen.into_inner();
        // 每輪一次，加上結束時一次
        assert_eq!(seen.len(), report.iterations + 1);
        assert_eq!(seen[0], (1, 0));
        assert_eq!(seen[1], (301, 1));
        assert_eq!(seen.last().map(|s| s.1), Some(2));
    }
}
