use anyhow::{Result, bail};
use image::GrayImage;

/// 計算兩張同尺寸灰階影像的相似度，結果落在 [0, 1]
pub trait SimilarityOracle: Sync {
    fn similarity(&self, a: &GrayImage, b: &GrayImage) -> Result<f64>;
}

const DEFAULT_WINDOW: u32 = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// 結構相似度（mean SSIM）
///
/// 使用均勻視窗與樣本共變異數，只計算視窗完整落在影像內的位置，
/// 等同於對整張 SSIM 圖裁掉 `window / 2` 的邊界後取平均。
#[derive(Debug, Clone, Copy)]
pub struct Ssim {
    window: u32,
}

impl Default for Ssim {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl SimilarityOracle for Ssim {
    fn similarity(&self, a: &GrayImage, b: &GrayImage) -> Result<f64> {
        if a.dimensions() != b.dimensions() {
            bail!(
                "影像尺寸不一致: {:?} vs {:?}",
                a.dimensions(),
                b.dimensions()
            );
        }

        let (width, height) = a.dimensions();
        if width < self.window || height < self.window {
            bail!(
                "影像太小 ({width}x{height})，無法套用 {0}x{0} 視窗",
                self.window
            );
        }

        Ok(mean_ssim(a, b, self.window as usize).clamp(0.0, 1.0))
    }
}

/// 逐視窗累加的統計量
#[derive(Clone, Copy, Default)]
struct WindowSums {
    x: u64,
    y: u64,
    xx: u64,
    yy: u64,
    xy: u64,
}

impl WindowSums {
    fn add(&mut self, other: &Self) {
        self.x += other.x;
        self.y += other.y;
        self.xx += other.xx;
        self.yy += other.yy;
        self.xy += other.xy;
    }

    fn sub(&mut self, other: &Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.xx -= other.xx;
        self.yy -= other.yy;
        self.xy -= other.xy;
    }

    fn of_pixels(px: u8, py: u8) -> Self {
        let (x, y) = (u64::from(px), u64::from(py));
        Self {
            x,
            y,
            xx: x * x,
            yy: y * y,
            xy: x * y,
        }
    }

    fn ssim(&self, n: f64) -> f64 {
        let c1 = (K1 * DATA_RANGE).powi(2);
        let c2 = (K2 * DATA_RANGE).powi(2);
        let cov_norm = n / (n - 1.0);

        let ux = self.x as f64 / n;
        let uy = self.y as f64 / n;
        let vx = cov_norm * (self.xx as f64 / n - ux * ux);
        let vy = cov_norm * (self.yy as f64 / n - uy * uy);
        let vxy = cov_norm * (self.xy as f64 / n - ux * uy);

        ((2.0 * ux * uy + c1) * (2.0 * vxy + c2)) / ((ux * ux + uy * uy + c1) * (vx + vy + c2))
    }
}

/// 以滑動欄位和計算平均 SSIM，記憶體只與影像寬度成正比
fn mean_ssim(a: &GrayImage, b: &GrayImage, window: usize) -> f64 {
    let width = a.width() as usize;
    let height = a.height() as usize;
    let pa = a.as_raw();
    let pb = b.as_raw();
    let n = (window * window) as f64;

    let row_sums = |y: usize, x: usize| WindowSums::of_pixels(pa[y * width + x], pb[y * width + x]);

    // 每一欄在目前 window 列範圍內的總和
    let mut columns = vec![WindowSums::default(); width];
    for y in 0..window {
        for (x, column) in columns.iter_mut().enumerate() {
            column.add(&row_sums(y, x));
        }
    }

    let mut total = 0.0;
    let mut positions = 0usize;

    for top in 0..=(height - window) {
        if top > 0 {
            let leaving = top - 1;
            let entering = top + window - 1;
            for (x, column) in columns.iter_mut().enumerate() {
                column.sub(&row_sums(leaving, x));
                column.add(&row_sums(entering, x));
            }
        }

        let mut sums = WindowSums::default();
        for column in &columns[..window] {
            sums.add(column);
        }

        for left in 0..=(width - window) {
            if left > 0 {
                sums.sub(&columns[left - 1]);
                sums.add(&columns[left + window - 1]);
            }
            total += sums.ssim(n);
            positions += 1;
        }
    }

    total / positions as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]))
    }

    #[test]
    fn test_identical_images_score_one() {
        let img = gradient(40, 30);
        let score = Ssim::default().similarity(&img, &img).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_flat_images_score_low() {
        let dark = flat(32, 18, 50);
        let bright = flat(32, 18, 200);
        let score = Ssim::default().similarity(&dark, &bright).unwrap();
        // (2*50*200 + C1) / (50^2 + 200^2 + C1)
        assert!((score - 0.4707).abs() < 0.001, "score = {score}");
    }

    #[test]
    fn test_small_noise_keeps_high_score() {
        let base = gradient(64, 36);
        let mut noisy = base.clone();
        for (i, pixel) in noisy.pixels_mut().enumerate() {
            if i % 5 == 0 {
                pixel.0[0] = pixel.0[0].saturating_add(2);
            }
        }
        let score = Ssim::default().similarity(&base, &noisy).unwrap();
        assert!(score > 0.9, "score = {score}");
        assert!(score < 1.0);
    }

    #[test]
    fn test_symmetric() {
        let a = gradient(20, 20);
        let b = flat(20, 20, 90);
        let ssim = Ssim::default();
        let ab = ssim.similarity(&a, &b).unwrap();
        let ba = ssim.similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let a = flat(20, 20, 0);
        let b = flat(21, 20, 0);
        assert!(Ssim::default().similarity(&a, &b).is_err());
    }

    #[test]
    fn test_image_smaller_than_window_is_error() {
        let a = flat(5, 5, 0);
        assert!(Ssim::default().similarity(&a, &a).is_err());
    }
}
