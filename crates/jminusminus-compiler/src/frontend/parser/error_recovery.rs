//! # パーサーエラー回復機構
//!
//! パニックモードによる回復の状態を管理します。
//! 正常状態で必須トークンの不一致が起きると1件だけ報告して劣化状態に入り、
//! 劣化状態の間は後続の不一致を報告せず、求めるトークンまで読み飛ばします。
//! 求めるトークンが見つかった時点で正常状態に戻ります。

/// 回復状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryState {
    /// 正常。次のエラーは報告される。
    #[default]
    Clean,
    /// 劣化。同期点に達するまでエラーは報告されない。
    Degraded,
}

/// 回復状態と抑止したエラー数の記録
#[derive(Debug, Clone, Default)]
pub struct ErrorRecovery {
    state: RecoveryState,
    suppressed: usize,
    synchronizations: usize,
}

impl ErrorRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn is_clean(&self) -> bool {
        self.state == RecoveryState::Clean
    }

    /// エラーを報告すべきなら `true` を返し、劣化状態に入る
    pub fn should_report(&mut self) -> bool {
        match self.state {
            RecoveryState::Clean => {
                self.state = RecoveryState::Degraded;
                true
            }
            RecoveryState::Degraded => {
                self.suppressed += 1;
                false
            }
        }
    }

    /// 同期点に達した
    pub fn recover(&mut self) {
        if self.state == RecoveryState::Degraded {
            self.synchronizations += 1;
        }
        self.state = RecoveryState::Clean;
    }

    /// 劣化状態の間に報告しなかったエラーの数
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// 劣化状態から回復した回数
    pub fn synchronizations(&self) -> usize {
        self.synchronizations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_error_reported_until_recovery() {
        let mut recovery = ErrorRecovery::new();
        assert!(recovery.should_report());
        assert!(!recovery.should_report());
        assert!(!recovery.should_report());
        assert_eq!(recovery.suppressed(), 2);
        recovery.recover();
        assert!(recovery.is_clean());
        assert_eq!(recovery.synchronizations(), 1);
        assert!(recovery.should_report());
    }

    #[test]
    fn test_recover_when_clean_is_not_a_synchronization() {
        let mut recovery = ErrorRecovery::new();
        recovery.recover();
        assert_eq!(recovery.synchronizations(), 0);
        assert_eq!(recovery.state(), RecoveryState::Clean);
    }
}
