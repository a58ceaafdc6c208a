//! Webカメラキャプチャアダプタ
//!
//! nokhwaを使用したCapturePort実装。
//! ストリームはライブループの寿命に紐づき、Dropで必ず解放される
//! （エラー経路を含む全ての終了経路で保証）。

use crate::domain::{CapturePort, DeviceInfo, Frame, PipelineError, PipelineResult};
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType},
    Camera,
};

/// Webカメラキャプチャアダプタ
pub struct WebcamCaptureAdapter {
    camera: Camera,
}

impl WebcamCaptureAdapter {
    /// カメラを開いてストリームを開始する
    ///
    /// # Arguments
    /// - `index`: カメラデバイスのインデックス（通常は0）
    pub fn new(index: u32) -> PipelineResult<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| PipelineError::Capture(format!("failed to open camera {}: {}", index, e)))?;

        camera
            .open_stream()
            .map_err(|e| PipelineError::Capture(format!("failed to start camera stream: {}", e)))?;

        Ok(Self { camera })
    }
}

impl CapturePort for WebcamCaptureAdapter {
    fn capture_frame(&mut self) -> PipelineResult<Frame> {
        // カメラ切断等はここでエラーになり、ライブループを終了させる
        let buffer = self
            .camera
            .frame()
            .map_err(|e| PipelineError::Capture(format!("frame capture failed: {}", e)))?;

        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| PipelineError::Capture(format!("frame decode failed: {}", e)))?;

        let width = decoded.width();
        let height = decoded.height();
        Ok(Frame::new(decoded.into_raw(), width, height))
    }

    fn device_info(&self) -> DeviceInfo {
        let resolution = self.camera.resolution();
        DeviceInfo {
            width: resolution.width(),
            height: resolution.height(),
            frame_rate: self.camera.frame_rate(),
            name: self.camera.info().human_name(),
        }
    }
}

impl Drop for WebcamCaptureAdapter {
    fn drop(&mut self) {
        // 全ての終了経路でカメラハンドルを解放する
        if self.camera.is_stream_open() {
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!("failed to stop camera stream: {}", e);
            }
        }
    }
}
