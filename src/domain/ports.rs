//! Port定義（Clean Architectureのインターフェース）
//!
//! Domain層が外部実装に依存するための抽象trait。
//! Infrastructure層がこれらを実装し、Application層がDIで注入する。

use crate::domain::{
    config::{ActionKind, MouseButtonConfig},
    error::{PipelineError, PipelineResult},
    types::{Frame, LabeledSample, Prediction},
};

/// キャプチャポート: カメラフレームの取得を抽象化
pub trait CapturePort {
    /// 次のフレームをキャプチャする
    ///
    /// # Returns
    /// - `Ok(Frame)`: フレームの取得成功
    /// - `Err(PipelineError)`: 致命的エラー（カメラ切断等）。
    ///   ライブループはこのエラーで終了しなければならない。
    fn capture_frame(&mut self) -> PipelineResult<Frame>;

    /// キャプチャデバイスの情報を取得
    fn device_info(&self) -> DeviceInfo;
}

/// デバイス情報
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub name: String,
}

/// 入力送出ポート: 合成マウス・キーボードイベントを抽象化
pub trait DispatchPort {
    /// マウスカーソルを相対移動する
    fn move_mouse(&mut self, dx: i32, dy: i32) -> PipelineResult<()>;

    /// マウスボタンをクリックする
    fn click(&mut self, button: MouseButton) -> PipelineResult<()>;

    /// キーを押下する
    fn press_key(&mut self, key: GestureKey) -> PipelineResult<()>;
}

/// マウスボタン
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl From<MouseButtonConfig> for MouseButton {
    fn from(config: MouseButtonConfig) -> Self {
        match config {
            MouseButtonConfig::Left => MouseButton::Left,
            MouseButtonConfig::Right => MouseButton::Right,
            MouseButtonConfig::Middle => MouseButton::Middle,
        }
    }
}

/// 送出可能なキー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKey {
    Space,
    Enter,
    Escape,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Char(char),
}

impl GestureKey {
    /// 設定ファイルのキー名文字列をパースする
    ///
    /// 名前付きキー（"space"等）または1文字を受け付ける。
    pub fn parse(name: &str) -> PipelineResult<Self> {
        match name {
            "space" => Ok(Self::Space),
            "enter" => Ok(Self::Enter),
            "escape" => Ok(Self::Escape),
            "tab" => Ok(Self::Tab),
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Self::Char(c)),
                    _ => Err(PipelineError::Configuration(format!(
                        "Unknown key name '{}'",
                        other
                    ))),
                }
            }
        }
    }
}

/// 設定から解決済みの入力アクション
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    MouseMove { dx: i32, dy: i32 },
    Click(MouseButton),
    KeyPress(GestureKey),
}

impl InputAction {
    /// 設定のActionKindを型付きアクションに解決する
    ///
    /// キー名のパースに失敗した場合は設定エラー（起動時に検出される）。
    pub fn from_config(kind: &ActionKind) -> PipelineResult<Self> {
        match kind {
            ActionKind::MouseMove { dx, dy } => Ok(Self::MouseMove { dx: *dx, dy: *dy }),
            ActionKind::Click { button } => Ok(Self::Click((*button).into())),
            ActionKind::KeyPress { key } => Ok(Self::KeyPress(GestureKey::parse(key)?)),
        }
    }

    /// アクションをDispatchPort経由で送出する
    pub fn dispatch(&self, port: &mut dyn DispatchPort) -> PipelineResult<()> {
        match self {
            Self::MouseMove { dx, dy } => port.move_mouse(*dx, *dy),
            Self::Click(button) => port.click(*button),
            Self::KeyPress(key) => port.press_key(*key),
        }
    }
}

/// 分類器ポート: 各分類器ファミリの共通能力 {fit, predict, name}
///
/// ModelTrainerはこのtraitに対して総称的に反復するため、
/// ファミリの追加・削除は選択ロジックに影響しない。
pub trait GestureClassifier {
    /// ファミリ名（モデルファイルのメタデータに保存される）
    fn name(&self) -> &'static str;

    /// 学習サンプルでモデルを適合させる
    fn fit(&mut self, samples: &[LabeledSample]) -> PipelineResult<()>;

    /// 特徴ベクトルからラベルを予測する
    fn predict(&self, features: &[f32]) -> PipelineResult<Prediction>;

    /// 学習済み状態をJSONペイロードに変換（モデル保存用）
    fn snapshot(&self) -> PipelineResult<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_key_parse_named() {
        assert_eq!(GestureKey::parse("space").unwrap(), GestureKey::Space);
        assert_eq!(GestureKey::parse("enter").unwrap(), GestureKey::Enter);
        assert_eq!(GestureKey::parse("up").unwrap(), GestureKey::Up);
    }

    #[test]
    fn test_gesture_key_parse_char() {
        assert_eq!(GestureKey::parse("a").unwrap(), GestureKey::Char('a'));
        assert_eq!(GestureKey::parse("q").unwrap(), GestureKey::Char('q'));
    }

    #[test]
    fn test_gesture_key_parse_rejects_unknown() {
        assert!(GestureKey::parse("hyperspace").is_err());
        assert!(GestureKey::parse("").is_err());
    }

    #[test]
    fn test_input_action_from_config() {
        let action = InputAction::from_config(&ActionKind::MouseMove { dx: -5, dy: 3 }).unwrap();
        assert_eq!(action, InputAction::MouseMove { dx: -5, dy: 3 });

        let action = InputAction::from_config(&ActionKind::Click {
            button: MouseButtonConfig::Right,
        })
        .unwrap();
        assert_eq!(action, InputAction::Click(MouseButton::Right));

        let action = InputAction::from_config(&ActionKind::KeyPress {
            key: "escape".to_string(),
        })
        .unwrap();
        assert_eq!(action, InputAction::KeyPress(GestureKey::Escape));
    }

    #[test]
    fn test_input_action_from_config_bad_key() {
        let result = InputAction::from_config(&ActionKind::KeyPress {
            key: "not-a-key".to_string(),
        });
        assert!(matches!(result.unwrap_err(), PipelineError::Configuration(_)));
    }
}
