use crate::config::ScanConfig;
use crate::tools::{Frame, SimilarityOracle};
use anyhow::Result;
use image::{GrayImage, Luma, imageops};

/// 判斷影格是否處於「穩定」狀態（不在轉場中）
///
/// 兩張影格先轉灰階，再做自適應平均二值化以壓低亮度閃爍與壓縮雜訊，
/// 最後比較二值化結果的相似度。
#[derive(Debug, Clone, Copy)]
pub struct StabilityClassifier {
    block_size: u32,
    offset: i32,
}

impl StabilityClassifier {
    #[must_use]
    pub const fn new(config: &ScanConfig) -> Self {
        Self {
            block_size: config.binarize_block_size,
            offset: config.binarize_offset,
        }
    }

    #[must_use]
    pub fn binarize(&self, frame: &Frame) -> GrayImage {
        adaptive_threshold(&imageops::grayscale(frame), self.block_size, self.offset)
    }

    /// 相似度嚴格大於閾值才算穩定
    pub fn is_stable(
        &self,
        oracle: &dyn SimilarityOracle,
        frame_a: &Frame,
        frame_b: &Frame,
        threshold: f64,
    ) -> Result<bool> {
        let binary_a = self.binarize(frame_a);
        let binary_b = self.binarize(frame_b);
        Ok(oracle.similarity(&binary_a, &binary_b)? > threshold)
    }
}

/// 自適應平均二值化
///
/// 像素值減去 `block_size`×`block_size` 鄰域平均（邊界以複製延伸）大於 `-offset`
/// 時輸出 255，否則輸出 0。
#[must_use]
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let (w, h) = (width as usize, height as usize);
    let radius = (block_size / 2) as isize;
    let area = block_size * block_size;
    let src = gray.as_raw();

    let clamp = |i: isize, len: usize| i.clamp(0, len as isize - 1) as usize;

    // 水平方向的滑動和
    let mut row_sums = vec![0u32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        let mut sum: u32 = (-radius..=radius)
            .map(|dx| u32::from(row[clamp(dx, w)]))
            .sum();
        row_sums[y * w] = sum;
        for x in 1..w {
            let xi = x as isize;
            sum += u32::from(row[clamp(xi + radius, w)]);
            sum -= u32::from(row[clamp(xi - radius - 1, w)]);
            row_sums[y * w + x] = sum;
        }
    }

    // 垂直方向累加得到整個鄰域的和
    let mut box_sums = vec![0u32; w * h];
    for x in 0..w {
        let mut sum: u32 = (-radius..=radius)
            .map(|dy| row_sums[clamp(dy, h) * w + x])
            .sum();
        box_sums[x] = sum;
        for y in 1..h {
            let yi = y as isize;
            sum += row_sums[clamp(yi + radius, h) * w + x];
            sum -= row_sums[clamp(yi - radius - 1, h) * w + x];
            box_sums[y * w + x] = sum;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let i = y as usize * w + x as usize;
        let mean = (box_sums[i] * 2 + area) / (2 * area);
        let value = i32::from(src[i]) - mean as i32;
        Luma([if value > -offset { 255 } else { 0 }])
    })
}
