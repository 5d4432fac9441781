//! # エラー処理モジュール
//!
//! j--コンパイラのエラー種別と、パイプライン全体で使う `Result` 型を定義します。
//! 字句・構文・意味エラーは [`Diagnostics`](crate::diagnostics::Diagnostics) に
//! 蓄積され、ここで定義する [`CompilerError`] はパイプラインを止める失敗だけを表します。

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// 診断の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// 字句解析エラー
    Lexical,
    /// 構文解析エラー
    Syntax,
    /// 意味解析エラー
    Semantic,
    /// 未実装の構文
    Unsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Lexical => write!(f, "字句エラー"),
            ErrorKind::Syntax => write!(f, "構文エラー"),
            ErrorKind::Semantic => write!(f, "意味エラー"),
            ErrorKind::Unsupported => write!(f, "未実装"),
        }
    }
}

/// コンパイラエラー
#[derive(Debug, Error)]
pub enum CompilerError {
    /// 文法上は受理されるが解析・コード生成が実装されていない構文
    #[error("{line}行目: 未実装の構文です: {construct}")]
    Unsupported { construct: String, line: usize },

    /// 先行フェーズでエラーが記録されたためコード生成を行わなかった
    #[error("{errors}件のエラーによりコンパイルを中止しました")]
    Aborted { errors: usize },

    /// 解析済みのコンパイル単位を再度解析しようとした
    #[error("このコンパイル単位は既に解析されています")]
    AlreadyAnalyzed,

    /// 設定ファイルの読み込み・解釈エラー
    #[error("設定エラー: {0}")]
    Config(String),

    /// I/Oエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] io::Error),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl CompilerError {
    /// 未実装構文エラーを作成
    pub fn unsupported(construct: impl Into<String>, line: usize) -> Self {
        CompilerError::Unsupported {
            construct: construct.into(),
            line,
        }
    }

    /// 内部エラーを作成
    pub fn internal(message: impl Into<String>) -> Self {
        CompilerError::Internal(message.into())
    }
}

/// コンパイラの結果型
pub type Result<T> = std::result::Result<T, CompilerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_construct_and_line() {
        let err = CompilerError::unsupported("switch", 12);
        let text = err.to_string();
        assert!(text.contains("switch"));
        assert!(text.contains("12"));
    }

    #[test]
    fn test_io_error_converts() {
        fn open() -> Result<()> {
            Err(io::Error::new(io::ErrorKind::NotFound, "missing"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(CompilerError::Io(_))));
    }
}
