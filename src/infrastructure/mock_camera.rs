//! モックキャプチャアダプタ
//!
//! テスト・開発用のCapturePort実装。
//! あらかじめ積んだフレーム列を順に返し、尽きたらキャプチャ失敗を
//! 返す（カメラ切断のシミュレーション）。

use crate::domain::{CapturePort, DeviceInfo, Frame, PipelineError, PipelineResult};
use std::collections::VecDeque;

/// モックキャプチャアダプタ
#[allow(dead_code)]
pub struct MockCaptureAdapter {
    frames: VecDeque<Frame>,
    width: u32,
    height: u32,
}

#[allow(dead_code)]
impl MockCaptureAdapter {
    /// フレーム列を指定して作成
    pub fn new(frames: Vec<Frame>, width: u32, height: u32) -> Self {
        Self {
            frames: frames.into(),
            width,
            height,
        }
    }

    /// 単色フレームをcount枚積んだアダプタを作成
    pub fn uniform(color: [u8; 3], width: u32, height: u32, count: usize) -> Self {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&color);
        }
        let frames = (0..count).map(|_| Frame::new(data.clone(), width, height)).collect();
        Self::new(frames, width, height)
    }

    /// 残りフレーム数を取得
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl CapturePort for MockCaptureAdapter {
    fn capture_frame(&mut self) -> PipelineResult<Frame> {
        self.frames
            .pop_front()
            .ok_or_else(|| PipelineError::Capture("mock camera disconnected".to_string()))
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            width: self.width,
            height: self.height,
            frame_rate: 30,
            name: "Mock Camera".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_frames_then_fails() {
        let mut capture = MockCaptureAdapter::uniform([10, 20, 30], 4, 4, 2);
        assert_eq!(capture.remaining(), 2);

        let frame = capture.capture_frame().unwrap();
        assert_eq!(frame.width, 4);
        assert_eq!(frame.pixel(0, 0), [10, 20, 30]);

        capture.capture_frame().unwrap();

        // フレームが尽きたらキャプチャ失敗（切断扱い）
        assert!(capture.capture_frame().is_err());
    }
}
