use crate::tools::Frame;

/// 被選入文件的影格
#[derive(Debug, Clone)]
pub struct CollectedFrame {
    pub index: u64,
    pub time_ms: u64,
    pub image: Frame,
}

/// 依發出順序累積影格，一個工作一個實例
#[derive(Debug, Default)]
pub struct FrameCollector {
    frames: Vec<CollectedFrame>,
}

impl FrameCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: u64, time_ms: u64, image: Frame) {
        self.frames.push(CollectedFrame {
            index,
            time_ms,
            image,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn frames(&self) -> &[CollectedFrame] {
        &self.frames
    }

    #[must_use]
    pub fn indices(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.index).collect()
    }

    /// 交出影格的所有權，給匯出器使用後即釋放
    #[must_use]
    pub fn into_images(self) -> Vec<Frame> {
        self.frames.into_iter().map(|f| f.image).collect()
    }
}
