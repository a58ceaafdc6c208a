//! 合成入力アダプタ
//!
//! enigoを使用したDispatchPort実装。OSレベルの入力注入の詳細は
//! enigoに委譲し、このアダプタはDomain型との変換のみを担う。

use crate::domain::{DispatchPort, GestureKey, MouseButton, PipelineError, PipelineResult};
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

/// 合成入力アダプタ
pub struct EnigoDispatchAdapter {
    enigo: Enigo,
}

impl EnigoDispatchAdapter {
    /// 入力バックエンドへ接続する
    pub fn new() -> PipelineResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| PipelineError::Dispatch(format!("failed to initialize enigo: {:?}", e)))?;
        Ok(Self { enigo })
    }

    fn map_button(button: MouseButton) -> Button {
        match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
            MouseButton::Middle => Button::Middle,
        }
    }

    fn map_key(key: GestureKey) -> Key {
        match key {
            GestureKey::Space => Key::Space,
            GestureKey::Enter => Key::Return,
            GestureKey::Escape => Key::Escape,
            GestureKey::Tab => Key::Tab,
            GestureKey::Up => Key::UpArrow,
            GestureKey::Down => Key::DownArrow,
            GestureKey::Left => Key::LeftArrow,
            GestureKey::Right => Key::RightArrow,
            GestureKey::Char(c) => Key::Unicode(c),
        }
    }
}

impl DispatchPort for EnigoDispatchAdapter {
    fn move_mouse(&mut self, dx: i32, dy: i32) -> PipelineResult<()> {
        self.enigo
            .move_mouse(dx, dy, Coordinate::Rel)
            .map_err(|e| PipelineError::Dispatch(format!("mouse move failed: {:?}", e)))
    }

    fn click(&mut self, button: MouseButton) -> PipelineResult<()> {
        self.enigo
            .button(Self::map_button(button), Direction::Click)
            .map_err(|e| PipelineError::Dispatch(format!("mouse click failed: {:?}", e)))
    }

    fn press_key(&mut self, key: GestureKey) -> PipelineResult<()> {
        self.enigo
            .key(Self::map_key(key), Direction::Click)
            .map_err(|e| PipelineError::Dispatch(format!("key press failed: {:?}", e)))
    }
}
