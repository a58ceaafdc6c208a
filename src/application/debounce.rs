//! デバウンス状態機械
//!
//! フレームごとの生の分類結果はノイズが多いため、同一ラベルが
//! 連続して確認されるまでアクションを発火しない。
//! ノイズ混じりのラベル列を、離散的で意図的なアクショントリガへ変換する。
//!
//! # 状態遷移
//! - IDLE + ラベル → CANDIDATE(label, 1)
//! - CANDIDATE(l, n) + 同一ラベル → CANDIDATE(l, n+1)、
//!   n+1が確認閾値に達したら ACTIVE(l) へ遷移しアクションを一度発火
//! - CANDIDATE/ACTIVE + 別ラベル → CANDIDATE(新ラベル, 1)
//! - ACTIVE(l) + 同一ラベル → 再発火しない（エッジトリガ）。
//!   連続アクションの再発火判定は呼び出し側が`Hold`で行う
//! - 「ジェスチャーなし」が設定回数連続 → IDLE

use crate::domain::NO_GESTURE;

/// デバウンス状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceState {
    /// 待機中
    Idle,
    /// 確認中（同一ラベルの連続観測回数を保持）
    Candidate { label: String, count: u32 },
    /// 確定済み
    Active { label: String },
}

/// 1フレーム分の遷移結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// 何もしない
    None,
    /// アクションを発火する（ACTIVE遷移の瞬間に一度だけ）
    Dispatch(String),
    /// ACTIVE状態の継続（連続アクションのみ再発火してよい）
    Hold(String),
}

/// デバウンス状態機械
#[derive(Debug)]
pub struct Debouncer {
    confirmation_threshold: u32,
    idle_reset_threshold: u32,
    state: DebounceState,
    no_gesture_streak: u32,
}

impl Debouncer {
    /// 閾値を指定して作成
    ///
    /// # Arguments
    /// - `confirmation_threshold`: ACTIVE遷移に必要な同一ラベル連続回数
    /// - `idle_reset_threshold`: IDLE復帰に必要な「ジェスチャーなし」連続回数
    pub fn new(confirmation_threshold: u32, idle_reset_threshold: u32) -> Self {
        Self {
            confirmation_threshold: confirmation_threshold.max(1),
            idle_reset_threshold: idle_reset_threshold.max(1),
            state: DebounceState::Idle,
            no_gesture_streak: 0,
        }
    }

    /// 現在の状態を取得
    #[allow(dead_code)]
    pub fn state(&self) -> &DebounceState {
        &self.state
    }

    /// 1フレーム分のラベルを処理し、発火判定を返す
    pub fn step(&mut self, label: &str) -> DebounceOutcome {
        if label == NO_GESTURE {
            self.no_gesture_streak += 1;
            if self.no_gesture_streak >= self.idle_reset_threshold {
                self.state = DebounceState::Idle;
            }
            return DebounceOutcome::None;
        }

        // 認識ラベルが来たらIDLE復帰カウンタはリセット
        self.no_gesture_streak = 0;

        match &self.state {
            DebounceState::Idle => self.start_candidate(label),
            DebounceState::Candidate { label: current, count } => {
                if current == label {
                    let count = count + 1;
                    if count >= self.confirmation_threshold {
                        self.state = DebounceState::Active { label: label.to_string() };
                        DebounceOutcome::Dispatch(label.to_string())
                    } else {
                        self.state = DebounceState::Candidate {
                            label: label.to_string(),
                            count,
                        };
                        DebounceOutcome::None
                    }
                } else {
                    self.start_candidate(label)
                }
            }
            DebounceState::Active { label: current } => {
                if current == label {
                    DebounceOutcome::Hold(label.to_string())
                } else {
                    self.start_candidate(label)
                }
            }
        }
    }

    /// 新しい候補ラベルで確認を開始する（閾値1なら即ACTIVE）
    fn start_candidate(&mut self, label: &str) -> DebounceOutcome {
        if self.confirmation_threshold <= 1 {
            self.state = DebounceState::Active { label: label.to_string() };
            DebounceOutcome::Dispatch(label.to_string())
        } else {
            self.state = DebounceState::Candidate {
                label: label.to_string(),
                count: 1,
            };
            DebounceOutcome::None
        }
    }
}
