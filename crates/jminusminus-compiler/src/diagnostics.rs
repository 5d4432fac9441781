//! 診断情報モジュール
//!
//! コンパイル1回分の診断（エラー・警告）を蓄積します。
//! 字句解析器・構文解析器・意味解析器はすべて同じ [`Diagnostics`] を
//! `&mut` で受け取り、ドライバはパイプライン終了後にまとめて読み出します。

use std::fmt;

use log::debug;
use serde::Serialize;

use crate::frontend::error::{CompilerError, ErrorKind, Result};

/// 診断情報のレベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// エラー
    Error,
    /// 警告
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "エラー"),
            Severity::Warning => write!(f, "警告"),
        }
    }
}

/// 診断情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// レベル
    pub severity: Severity,
    /// 種類
    pub kind: ErrorKind,
    /// ソースファイル名
    pub file: String,
    /// 行番号（1から始まる）
    pub line: usize,
    /// メッセージ
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "{}:{}: {}", self.file, self.line, self.message),
            Severity::Warning => write!(
                f,
                "{}:{}: {}: {}",
                self.file, self.line, self.severity, self.message
            ),
        }
    }
}

/// コンパイル1回分の診断コレクタ
#[derive(Debug, Clone)]
pub struct Diagnostics {
    file_name: String,
    entries: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    /// 新しい診断コレクタを作成
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            entries: Vec::new(),
            error_count: 0,
        }
    }

    /// 対象ソースファイル名
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// エラーを記録
    pub fn error(&mut self, kind: ErrorKind, line: usize, message: impl Into<String>) {
        self.push(Severity::Error, kind, line, message.into());
        self.error_count += 1;
    }

    /// 警告を記録
    pub fn warning(&mut self, kind: ErrorKind, line: usize, message: impl Into<String>) {
        self.push(Severity::Warning, kind, line, message.into());
    }

    fn push(&mut self, severity: Severity, kind: ErrorKind, line: usize, message: String) {
        let diagnostic = Diagnostic {
            severity,
            kind,
            file: self.file_name.clone(),
            line,
            message,
        };
        debug!("{} ({}): {}", severity, kind, diagnostic);
        self.entries.push(diagnostic);
    }

    /// エラーが1件でも記録されたか
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.entries.len() - self.error_count
    }

    /// 指定した種類のエラー件数
    pub fn count_of(&self, kind: ErrorKind) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error && d.kind == kind)
            .count()
    }

    /// 記録順に診断を列挙
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// 記録順のエラーメッセージ一覧
    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.message.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }

    /// 診断一覧を JSON 配列として書き出す
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries)
            .map_err(|e| CompilerError::internal(format!("診断のシリアライズに失敗しました: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_sets_flag_and_formats_location() {
        let mut diags = Diagnostics::new("Foo.java");
        assert!(!diags.has_errors());
        diags.error(ErrorKind::Syntax, 3, "; sought where } found");
        assert!(diags.has_errors());
        let first = diags.iter().next().map(|d| d.to_string());
        assert_eq!(first.as_deref(), Some("Foo.java:3: ; sought where } found"));
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut diags = Diagnostics::new("Foo.java");
        diags.warning(ErrorKind::Syntax, 1, "lone semicolon");
        assert!(!diags.has_errors());
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.error_count(), 0);
    }

    #[test]
    fn test_count_of_kind() {
        let mut diags = Diagnostics::new("Foo.java");
        diags.error(ErrorKind::Lexical, 1, "a");
        diags.error(ErrorKind::Semantic, 2, "b");
        diags.error(ErrorKind::Semantic, 3, "c");
        assert_eq!(diags.count_of(ErrorKind::Semantic), 2);
        assert_eq!(diags.count_of(ErrorKind::Unsupported), 0);
    }

    #[test]
    fn test_json_export_keeps_location() {
        let mut diags = Diagnostics::new("Foo.java");
        diags.error(ErrorKind::Semantic, 7, "x is not defined");
        let value: serde_json::Value = serde_json::from_str(&diags.to_json().unwrap()).unwrap();
        assert_eq!(value[0]["line"], 7);
        assert_eq!(value[0]["file"], "Foo.java");
        assert_eq!(value[0]["kind"], "Semantic");
        assert_eq!(value[0]["severity"], "Error");
    }
}
