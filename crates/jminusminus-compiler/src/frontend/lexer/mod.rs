//! # レキサー（字句解析器）
//!
//! j--のソースコードを字句解析し、トークン列に変換するモジュールです。
//! トークンは [`Lexer::next_token`] の呼び出しごとに1つずつ生成されます。
//! 字句エラーは [`Diagnostics`] に記録され、走査はそのまま続行されます。

use log::trace;

use crate::diagnostics::Diagnostics;
use crate::frontend::error::ErrorKind;

pub mod lookahead;
pub mod token;

pub use lookahead::LookaheadScanner;
pub use token::{lookup_keyword, Token, TokenKind};

/// レキサー
#[derive(Debug, Clone)]
pub struct Lexer {
    /// ファイル名
    file_name: String,
    /// ソースコードの文字列
    chars: Vec<char>,
    /// 現在の文字位置
    position: usize,
    /// 現在の行番号（1から始まる）
    line: usize,
    /// 字句エラーが一度でも起きたか
    in_error: bool,
}

impl Lexer {
    /// 新しいレキサーを作成
    pub fn new(source: &str, file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            in_error: false,
        }
    }

    /// ソースファイル名
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// これまでに字句エラーが起きたか。一度立つと戻らない。
    pub fn has_error(&self) -> bool {
        self.in_error
    }

    /// 次のトークンを取得
    ///
    /// ファイル終端に達した後は何度呼んでも `Eof` を返します。
    pub fn next_token(&mut self, diagnostics: &mut Diagnostics) -> Token {
        loop {
            self.skip_whitespace_and_comments(diagnostics);

            let line = self.line;
            let start = self.position;
            let ch = match self.peek() {
                Some(ch) => ch,
                None => return Token::new(TokenKind::Eof, TokenKind::Eof.image(), line),
            };

            if let Some(kind) = self.scan(ch, line, diagnostics) {
                let image: String = self.chars[start..self.position].iter().collect();
                trace!("トークン: {:?} '{}' ({}行目)", kind, image, line);
                return Token::new(kind, image, line);
            }
            // 不正な文字は報告済み。次の文字から再開する。
        }
    }

    fn scan(&mut self, ch: char, line: usize, diagnostics: &mut Diagnostics) -> Option<TokenKind> {
        use TokenKind::*;

        if is_identifier_start(ch) {
            return Some(self.scan_identifier());
        }
        if ch.is_ascii_digit() {
            return Some(self.scan_number(line, diagnostics));
        }

        self.bump();
        let kind = match ch {
            '(' => LeftParen,
            ')' => RightParen,
            '{' => LeftBrace,
            '}' => RightBrace,
            '[' => LeftBracket,
            ']' => RightBracket,
            ';' => Semicolon,
            ',' => Comma,
            '.' => Dot,
            ':' => Colon,
            '?' => Question,
            '~' => Tilde,
            '=' => self.either('=', Equal, Assign),
            '!' => self.either('=', NotEqual, LogicalNot),
            '*' => self.either('=', StarAssign, Star),
            '%' => self.either('=', PercentAssign, Percent),
            '/' => self.either('=', SlashAssign, Slash),
            '^' => self.either('=', CaretAssign, Caret),
            '+' => {
                if self.eat('=') {
                    PlusAssign
                } else {
                    self.either('+', Increment, Plus)
                }
            }
            '-' => {
                if self.eat('=') {
                    MinusAssign
                } else {
                    self.either('-', Decrement, Minus)
                }
            }
            '&' => {
                if self.eat('=') {
                    AmpersandAssign
                } else {
                    self.either('&', LogicalAnd, Ampersand)
                }
            }
            '|' => {
                if self.eat('=') {
                    PipeAssign
                } else {
                    self.either('|', LogicalOr, Pipe)
                }
            }
            '>' => {
                if self.eat('=') {
                    GreaterEqual
                } else if self.eat('>') {
                    if self.eat('>') {
                        self.either('=', UnsignedShiftRightAssign, UnsignedShiftRight)
                    } else {
                        self.either('=', ShiftRightAssign, ShiftRight)
                    }
                } else {
                    Greater
                }
            }
            '<' => {
                if self.eat('=') {
                    LessEqual
                } else if self.eat('<') {
                    self.either('=', ShiftLeftAssign, ShiftLeft)
                } else {
                    Less
                }
            }
            '\'' => self.scan_char_literal(line, diagnostics),
            '"' => self.scan_string_literal(line, diagnostics),
            other => {
                self.report(diagnostics, line, format!("不正な文字です: '{}'", other));
                return None;
            }
        };
        Some(kind)
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.position;
        while matches!(self.peek(), Some(c) if is_identifier_part(c)) {
            self.bump();
        }
        let word: String = self.chars[start..self.position].iter().collect();
        lookup_keyword(&word).unwrap_or(TokenKind::Identifier)
    }

    fn scan_number(&mut self, line: usize, diagnostics: &mut Diagnostics) -> TokenKind {
        let start = self.position;

        if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('x') | Some('X') => {
                    self.bump();
                    self.bump();
                    if self.eat_while(|c| c.is_ascii_hexdigit()) == 0 {
                        let found = self.describe_current();
                        self.report(
                            diagnostics,
                            line,
                            format!("16進数リテラルが不正です: [0-9a-fA-F] が必要ですが {} が見つかりました", found),
                        );
                    }
                    return self.integer_suffix();
                }
                Some('b') | Some('B') => {
                    self.bump();
                    self.bump();
                    if self.eat_while(|c| c == '0' || c == '1') == 0 {
                        let found = self.describe_current();
                        self.report(
                            diagnostics,
                            line,
                            format!("2進数リテラルが不正です: [0-1] が必要ですが {} が見つかりました", found),
                        );
                    }
                    return self.integer_suffix();
                }
                _ => {}
            }
        }

        self.eat_while(|c| c.is_ascii_digit());

        if self.peek() == Some('.') {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
            if matches!(self.peek(), Some('e') | Some('E')) {
                self.scan_exponent(line, diagnostics);
            }
            return self.floating_suffix(TokenKind::DoubleLiteral);
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.scan_exponent(line, diagnostics);
            return self.floating_suffix(TokenKind::FloatLiteral);
        }

        let digits: String = self.chars[start..self.position].iter().collect();
        if digits.len() > 1 && digits.starts_with('0') && !digits.chars().all(|c| ('0'..='7').contains(&c)) {
            if !matches!(self.peek(), Some('f' | 'F' | 'd' | 'D')) {
                self.report(diagnostics, line, format!("8進数リテラルが不正です: {}", digits));
            }
        }

        match self.peek() {
            Some('f') | Some('F') => {
                self.bump();
                TokenKind::FloatLiteral
            }
            Some('d') | Some('D') => {
                self.bump();
                TokenKind::DoubleLiteral
            }
            _ => self.integer_suffix(),
        }
    }

    fn scan_exponent(&mut self, line: usize, diagnostics: &mut Diagnostics) {
        self.bump();
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        if self.eat_while(|c| c.is_ascii_digit()) == 0 {
            let found = self.describe_current();
            self.report(
                diagnostics,
                line,
                format!("指数部が不正です: [0-9] が必要ですが {} が見つかりました", found),
            );
        }
    }

    fn integer_suffix(&mut self) -> TokenKind {
        if matches!(self.peek(), Some('l') | Some('L')) {
            self.bump();
            TokenKind::LongLiteral
        } else {
            TokenKind::IntLiteral
        }
    }

    fn floating_suffix(&mut self, default: TokenKind) -> TokenKind {
        match self.peek() {
            Some('f') | Some('F') => {
                self.bump();
                TokenKind::FloatLiteral
            }
            Some('d') | Some('D') => {
                self.bump();
                TokenKind::DoubleLiteral
            }
            _ => default,
        }
    }

    /// 開きの `'` を読んだ直後から
    fn scan_char_literal(&mut self, line: usize, diagnostics: &mut Diagnostics) -> TokenKind {
        match self.peek() {
            Some('\\') => {
                self.bump();
                self.scan_escape(line, diagnostics);
            }
            Some('\n') | Some('\r') | None => {}
            Some(_) => {
                self.bump();
            }
        }

        if !self.eat('\'') {
            let found = self.describe_current();
            self.report(
                diagnostics,
                line,
                format!("文字リテラルを閉じる ' が必要ですが {} が見つかりました", found),
            );
            while !matches!(self.peek(), Some('\'') | Some(';') | Some('\n') | Some('\r') | None) {
                self.bump();
            }
            self.eat('\'');
        }
        TokenKind::CharLiteral
    }

    /// 開きの `"` を読んだ直後から
    fn scan_string_literal(&mut self, line: usize, diagnostics: &mut Diagnostics) -> TokenKind {
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    self.scan_escape(line, diagnostics);
                }
                Some('\n') | Some('\r') => {
                    self.report(diagnostics, line, "文字列リテラルの途中で行が終わりました");
                    break;
                }
                None => {
                    self.report(diagnostics, line, "文字列リテラルの途中でファイルが終わりました");
                    break;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        TokenKind::StringLiteral
    }

    /// `\` を読んだ直後から
    fn scan_escape(&mut self, line: usize, diagnostics: &mut Diagnostics) {
        match self.peek() {
            Some('b' | 't' | 'n' | 'f' | 'r' | '"' | '\'' | '\\') => {
                self.bump();
            }
            Some('\n') | Some('\r') | None => {
                self.report(diagnostics, line, "不正なエスケープシーケンスです: \\");
            }
            Some(other) => {
                self.bump();
                self.report(diagnostics, line, format!("不正なエスケープシーケンスです: \\{}", other));
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self, diagnostics: &mut Diagnostics) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(' ' | '\t' | '\n' | '\r' | '\x0c'), _) => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), Some('\n') | Some('\r') | None) {
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let line = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (None, _) => {
                                self.report(diagnostics, line, "コメントが閉じられていません");
                                break;
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn report(&mut self, diagnostics: &mut Diagnostics, line: usize, message: impl Into<String>) {
        self.in_error = true;
        diagnostics.error(ErrorKind::Lexical, line, message);
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(c) => format!("'{}'", c),
            None => TokenKind::Eof.image().to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    /// 1文字進める。CR、LF、CRLFはいずれも1行として数える。
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        match ch {
            '\n' => self.line += 1,
            '\r' if self.peek() != Some('\n') => self.line += 1,
            _ => {}
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn either(&mut self, next: char, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.eat(next) {
            matched
        } else {
            otherwise
        }
    }

    fn eat_while(&mut self, predicate: impl Fn(char) -> bool) -> usize {
        let mut count = 0;
        while matches!(self.peek(), Some(c) if predicate(c)) {
            self.bump();
            count += 1;
        }
        count
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

/// ソース全体をトークン列に変換する。末尾の `Eof` を含む。
pub fn tokenize(source: &str, file_name: &str) -> (Vec<Token>, Diagnostics) {
    let mut diagnostics = Diagnostics::new(file_name);
    let mut lexer = Lexer::new(source, file_name);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token(&mut diagnostics);
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    (tokens, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, "Test.java").0.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_shift_operators_consume_exactly() {
        use TokenKind::*;
        assert_eq!(
            kinds("a>>b <<= c >>>= d >>> e"),
            vec![
                Identifier,
                ShiftRight,
                Identifier,
                ShiftLeftAssign,
                Identifier,
                UnsignedShiftRightAssign,
                Identifier,
                UnsignedShiftRight,
                Identifier,
                Eof
            ]
        );
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut diags = Diagnostics::new("Test.java");
        let mut lexer = Lexer::new("x", "Test.java");
        assert_eq!(lexer.next_token(&mut diags).kind, TokenKind::Identifier);
        for _ in 0..3 {
            assert_eq!(lexer.next_token(&mut diags).kind, TokenKind::Eof);
        }
    }

    #[test]
    fn test_error_flag_is_sticky() {
        let mut diags = Diagnostics::new("Test.java");
        let mut lexer = Lexer::new("# a b", "Test.java");
        assert_eq!(lexer.next_token(&mut diags).kind, TokenKind::Identifier);
        assert!(lexer.has_error());
        lexer.next_token(&mut diags);
        assert!(lexer.has_error());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_crlf_counts_one_line() {
        let (tokens, _) = tokenize("a\r\nb\rc\nd", "Test.java");
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4, 4]);
    }
}
