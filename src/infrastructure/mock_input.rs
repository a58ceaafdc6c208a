//! モック入力送出アダプタ
//!
//! テスト・開発用のDispatchPort実装。
//! 実際の入力注入は行わず、送出されたアクションを記録する。

use crate::domain::{DispatchPort, GestureKey, InputAction, MouseButton, PipelineResult};

/// モック入力送出アダプタ
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct MockDispatchAdapter {
    dispatched: Vec<InputAction>,
}

#[allow(dead_code)]
impl MockDispatchAdapter {
    /// 新しいモックアダプタを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録された送出列を取得
    pub fn dispatched(&self) -> &[InputAction] {
        &self.dispatched
    }
}

impl DispatchPort for MockDispatchAdapter {
    fn move_mouse(&mut self, dx: i32, dy: i32) -> PipelineResult<()> {
        tracing::debug!("MockDispatch: move_mouse({}, {})", dx, dy);
        self.dispatched.push(InputAction::MouseMove { dx, dy });
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> PipelineResult<()> {
        tracing::debug!("MockDispatch: click({:?})", button);
        self.dispatched.push(InputAction::Click(button));
        Ok(())
    }

    fn press_key(&mut self, key: GestureKey) -> PipelineResult<()> {
        tracing::debug!("MockDispatch: press_key({:?})", key);
        self.dispatched.push(InputAction::KeyPress(key));
        Ok(())
    }
}
