use crate::tools::Frame;
use anyhow::{Context, Result, bail};
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use log::{debug, info};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// 1920×1080 影像在 3.7795 px/mm 下對應的頁面尺寸（截斷為整數公釐）
pub const DEFAULT_PAGE_WIDTH_MM: u32 = 508;
pub const DEFAULT_PAGE_HEIGHT_MM: u32 = 285;

const JPEG_QUALITY: u8 = 90;
const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// 頁面尺寸（公釐）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize {
    pub width_mm: u32,
    pub height_mm: u32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self {
            width_mm: DEFAULT_PAGE_WIDTH_MM,
            height_mm: DEFAULT_PAGE_HEIGHT_MM,
        }
    }
}

impl PageSize {
    #[must_use]
    pub fn width_pt(&self) -> f32 {
        self.width_mm as f32 * POINTS_PER_MM
    }

    #[must_use]
    pub fn height_pt(&self) -> f32 {
        self.height_mm as f32 * POINTS_PER_MM
    }
}

/// 將收錄的影格輸出成文件
pub trait DocumentExporter: Sync {
    /// 依順序一張影格一頁寫到 `path`，每完成一頁呼叫 `on_page(done, total)`
    fn export(&self, frames: &[Frame], path: &Path, on_page: &dyn Fn(usize, usize))
    -> Result<()>;
}

/// 逐頁組出 PDF，最後一次寫入
pub struct PdfDocumentBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    page_size: PageSize,
}

impl PdfDocumentBuilder {
    #[must_use]
    pub fn new(page_size: PageSize) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            page_size,
        }
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// 新增一頁，影像以 JPEG 嵌入並拉伸填滿整頁
    pub fn add_page(&mut self, frame: &Frame) -> Result<()> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            bail!("影格尺寸無效: {width}x{height}");
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(frame)
            .context("JPEG 編碼失敗")?;

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image);

        let (page_width, page_height) = (self.page_size.width_pt(), self.page_size.height_pt());
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        page_width.into(),
                        0.into(),
                        0.into(),
                        page_height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// 寫入同資料夾的暫存檔後改名，失敗時暫存檔自動移除
    pub fn finalize(mut self, path: &Path) -> Result<()> {
        if self.page_ids.is_empty() {
            bail!("沒有任何頁面可輸出");
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("無法建立暫存檔: {}", dir.display()))?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            self.doc
                .save_to(&mut writer)
                .with_context(|| format!("無法寫入 PDF: {}", path.display()))?;
            writer.flush()?;
        }
        temp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("無法輸出 PDF: {}", path.display()))?;

        debug!("PDF 寫入完成: {} 頁", self.page_ids.len());
        Ok(())
    }
}

/// 預設的 PDF 匯出器
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExporter {
    pub page_size: PageSize,
}

impl DocumentExporter for PdfExporter {
    fn export(
        &self,
        frames: &[Frame],
        path: &Path,
        on_page: &dyn Fn(usize, usize),
    ) -> Result<()> {
        let mut builder = PdfDocumentBuilder::new(self.page_size);
        for (i, frame) in frames.iter().enumerate() {
            builder
                .add_page(frame)
                .with_context(|| format!("第 {} 頁轉換失敗", i + 1))?;
            on_page(i + 1, frames.len());
        }
        builder.finalize(path)?;
        info!("PDF 已建立: {}", path.display());
        Ok(())
    }
}
