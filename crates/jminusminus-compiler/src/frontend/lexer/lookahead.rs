//! # 先読みスキャナ
//!
//! 構文解析器の曖昧さ解消（キャストか括弧式か、宣言か式文か など）のために、
//! 任意個のトークンを先読みして元の位置へ戻れるようにするバッファです。
//! 一度字句解析したトークンはバッファに残るため、字句エラーは1回しか報告されません。

use crate::diagnostics::Diagnostics;

use super::{Lexer, Token, TokenKind};

/// 先読みスキャナ
#[derive(Debug, Clone)]
pub struct LookaheadScanner {
    lexer: Lexer,
    /// これまでに読んだトークン
    buffer: Vec<Token>,
    /// 現在のトークンのバッファ内位置
    position: usize,
    /// `record_position` で保存した位置のスタック
    marks: Vec<usize>,
}

impl LookaheadScanner {
    /// スキャナを作成し、最初のトークンを読み込む
    pub fn new(source: &str, file_name: &str, diagnostics: &mut Diagnostics) -> Self {
        let mut lexer = Lexer::new(source, file_name);
        let first = lexer.next_token(diagnostics);
        Self {
            lexer,
            buffer: vec![first],
            position: 0,
            marks: Vec::new(),
        }
    }

    /// 現在のトークン
    pub fn token(&self) -> &Token {
        &self.buffer[self.position]
    }

    /// 直前のトークン。先頭にいる場合は現在のトークン。
    pub fn previous_token(&self) -> &Token {
        &self.buffer[self.position.saturating_sub(1)]
    }

    /// 次のトークンへ進む
    pub fn next(&mut self, diagnostics: &mut Diagnostics) {
        if self.token().kind == TokenKind::Eof {
            return;
        }
        self.position += 1;
        if self.position == self.buffer.len() {
            let token = self.lexer.next_token(diagnostics);
            self.buffer.push(token);
        }
    }

    /// 現在位置を保存する
    pub fn record_position(&mut self) {
        self.marks.push(self.position);
    }

    /// 直近に保存した位置へ戻る
    pub fn return_to_position(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.position = mark;
        }
    }

    /// バッファ内の現在位置。前進したかどうかの判定に使う。
    pub fn position(&self) -> usize {
        self.position
    }

    /// 字句エラーが起きたか
    pub fn has_error(&self) -> bool {
        self.lexer.has_error()
    }

    pub fn file_name(&self) -> &str {
        self.lexer.file_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_return() {
        let mut diags = Diagnostics::new("Test.java");
        let mut scanner = LookaheadScanner::new("( int ) x", "Test.java", &mut diags);
        scanner.record_position();
        scanner.next(&mut diags);
        scanner.next(&mut diags);
        assert_eq!(scanner.token().kind, TokenKind::RightParen);
        assert_eq!(scanner.previous_token().kind, TokenKind::Int);
        scanner.return_to_position();
        assert_eq!(scanner.token().kind, TokenKind::LeftParen);
    }

    #[test]
    fn test_lexical_errors_reported_once_across_backtracking() {
        let mut diags = Diagnostics::new("Test.java");
        let mut scanner = LookaheadScanner::new("a # b", "Test.java", &mut diags);
        scanner.record_position();
        scanner.next(&mut diags);
        scanner.return_to_position();
        scanner.next(&mut diags);
        assert_eq!(diags.error_count(), 1);
        assert_eq!(scanner.token().image, "b");
    }

    #[test]
    fn test_next_at_eof_stays() {
        let mut diags = Diagnostics::new("Test.java");
        let mut scanner = LookaheadScanner::new("", "Test.java", &mut diags);
        scanner.next(&mut diags);
        scanner.next(&mut diags);
        assert_eq!(scanner.token().kind, TokenKind::Eof);
        assert_eq!(scanner.position(), 0);
    }
}
