//! コンパイラ設定モジュール
//!
//! コンパイラの動作を設定するためのオプションを提供します。
//! CLIはTOMLファイルから読み込み、コマンドラインフラグで上書きします。

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::frontend::error::{CompilerError, Result};

/// パイプラインをどのフェーズで止めるか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// 構文解析まで
    Parse,
    /// 意味解析まで
    Analyze,
    /// コード生成まで
    Codegen,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Codegen
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Parse => write!(f, "parse"),
            Phase::Analyze => write!(f, "analyze"),
            Phase::Codegen => write!(f, "codegen"),
        }
    }
}

/// コンパイラの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// 最後に実行するフェーズ
    pub stop_after: Phase,

    /// 表示する診断の最大件数（ドライバ側で切り詰める）
    pub max_errors: Option<usize>,

    /// 警告をエラーとして扱うか
    pub warnings_as_errors: bool,

    /// クラスの内部名にパッケージ名を含めるか
    pub package_prefix_in_class_names: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            stop_after: Phase::Codegen,
            max_errors: None,
            warnings_as_errors: false,
            package_prefix_in_class_names: true,
        }
    }
}

impl CompilerConfig {
    /// デフォルト設定を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// TOML文字列から設定を読み込む
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CompilerError::Config(e.to_string()))
    }

    /// TOMLファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_stop_after(mut self, phase: Phase) -> Self {
        self.stop_after = phase;
        self
    }

    pub fn with_warnings_as_errors(mut self, warnings_as_errors: bool) -> Self {
        self.warnings_as_errors = warnings_as_errors;
        self
    }

    pub fn with_max_errors(mut self, max_errors: Option<usize>) -> Self {
        self.max_errors = max_errors;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CompilerConfig::from_toml_str("stop_after = \"analyze\"\n").unwrap();
        assert_eq!(config.stop_after, Phase::Analyze);
        assert!(!config.warnings_as_errors);
        assert!(config.package_prefix_in_class_names);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = CompilerConfig::from_toml_str("stop_after = 3").unwrap_err();
        assert!(matches!(err, CompilerError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jmm.toml");
        fs::write(&path, "warnings_as_errors = true\nmax_errors = 5\n").unwrap();
        let config = CompilerConfig::from_file(&path).unwrap();
        assert!(config.warnings_as_errors);
        assert_eq!(config.max_errors, Some(5));
    }
}
