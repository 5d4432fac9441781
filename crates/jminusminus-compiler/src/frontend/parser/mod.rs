//! # 構文解析器
//!
//! j--の再帰下降構文解析器です。先読みスキャナからトークンを受け取り、
//! 抽象構文木を構築します。構文エラーでは決して中断せず、エラーを
//! [`Diagnostics`] に蓄積してできる限りの構文木を返します。
//!
//! 文法規則ごとのメソッドは次のファイルに分かれています。
//!
//! - `declaration.rs`: コンパイル単位、クラス、メンバ
//! - `statement.rs`: ブロックと文
//! - `expression.rs`: 演算子の優先順位ごとの式
//! - `types.rs`: 型

use log::{debug, info};

use crate::diagnostics::Diagnostics;
use crate::frontend::ast::CompilationUnit;
use crate::frontend::error::ErrorKind;
use crate::frontend::lexer::{LookaheadScanner, Token, TokenKind};

pub mod error_recovery;

mod declaration;
mod expression;
mod statement;
mod types;

pub use error_recovery::{ErrorRecovery, RecoveryState};

/// 構文解析器
pub struct Parser<'d> {
    /// 先読みスキャナ
    scanner: LookaheadScanner,
    /// 診断の出力先
    diagnostics: &'d mut Diagnostics,
    /// パニックモード回復の状態
    recovery: ErrorRecovery,
}

impl<'d> Parser<'d> {
    /// 新しい構文解析器を作成
    pub fn new(source: &str, file_name: &str, diagnostics: &'d mut Diagnostics) -> Self {
        let scanner = LookaheadScanner::new(source, file_name, diagnostics);
        Self {
            scanner,
            diagnostics,
            recovery: ErrorRecovery::new(),
        }
    }

    /// 回復状態
    pub fn recovery(&self) -> &ErrorRecovery {
        &self.recovery
    }

    /// 字句エラーが起きたか
    pub fn has_lexical_error(&self) -> bool {
        self.scanner.has_error()
    }

    // ---- トークン操作 ----

    fn token(&self) -> &Token {
        self.scanner.token()
    }

    /// 現在のトークンの行番号
    fn line(&self) -> usize {
        self.scanner.token().line
    }

    fn next(&mut self) {
        self.scanner.next(self.diagnostics);
    }

    /// 現在のトークンが `kind` か
    fn see(&self, kind: TokenKind) -> bool {
        self.token().kind == kind
    }

    /// 現在のトークンが `kind` なら読み進めて `true`
    fn have(&mut self, kind: TokenKind) -> bool {
        if self.see(kind) {
            self.next();
            true
        } else {
            false
        }
    }

    /// 必須トークン。不一致なら正常状態でだけ報告し、劣化状態では `kind` まで読み飛ばす。
    fn must_be(&mut self, kind: TokenKind) {
        if self.see(kind) {
            self.next();
            self.recovery.recover();
        } else if self.recovery.is_clean() {
            let message = format!(
                "'{}' が必要ですが '{}' が見つかりました",
                kind.image(),
                self.token().image
            );
            self.report(message);
        } else {
            while !self.see(kind) && !self.see(TokenKind::Eof) {
                self.next();
            }
            if self.see(kind) {
                self.next();
                self.recovery.recover();
            }
        }
    }

    /// 回復状態を考慮して構文エラーを報告する
    fn report(&mut self, message: impl Into<String>) {
        let line = self.line();
        if self.recovery.should_report() {
            self.diagnostics.error(ErrorKind::Syntax, line, message);
        }
    }

    /// 構文を乱さないエラー（修飾子の重複など）をその場で報告する
    fn error_at(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.error(ErrorKind::Syntax, line, message);
    }

    fn warning_at(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.warning(ErrorKind::Syntax, line, message);
    }

    fn unsupported_at(&mut self, line: usize, construct: &str) {
        self.diagnostics.error(
            ErrorKind::Unsupported,
            line,
            format!("未実装の構文です: {}", construct),
        );
    }

    /// 先読みしてから元の位置に戻る
    fn speculate(&mut self, scan: impl FnOnce(&mut Self) -> bool) -> bool {
        self.scanner.record_position();
        let result = scan(self);
        self.scanner.return_to_position();
        result
    }

    // ---- 先読みによる曖昧さ解消 ----

    /// 識別子の直後に `(` が続くか（呼び出しかコンストラクタ宣言）
    fn see_identifier_lparen(&mut self) -> bool {
        self.speculate(|p| p.have(TokenKind::Identifier) && p.see(TokenKind::LeftParen))
    }

    fn see_basic_type(&self) -> bool {
        self.token().kind.is_basic_type()
    }

    /// `[` `]` が続くか
    fn see_dims(&mut self) -> bool {
        self.speculate(|p| p.have(TokenKind::LeftBracket) && p.see(TokenKind::RightBracket))
    }

    /// 参照型が始まるか（識別子、または基本型の配列）
    fn see_reference_type(&mut self) -> bool {
        if self.see(TokenKind::Identifier) {
            return true;
        }
        self.see_basic_type()
            && self.speculate(|p| {
                p.next();
                p.see(TokenKind::LeftBracket)
            })
    }

    /// キャストか括弧式か。参照型へのキャストは、閉じ括弧の後に被演算子が始まる場合だけ。
    fn see_cast(&mut self) -> bool {
        if !self.see(TokenKind::LeftParen) {
            return false;
        }
        self.speculate(|p| {
            p.next();
            if p.see_basic_type() {
                p.next();
                while p.have(TokenKind::LeftBracket) {
                    if !p.have(TokenKind::RightBracket) {
                        return false;
                    }
                }
                return p.see(TokenKind::RightParen);
            }
            if !p.have(TokenKind::Identifier) {
                return false;
            }
            while p.have(TokenKind::Dot) {
                if !p.have(TokenKind::Identifier) {
                    return false;
                }
            }
            while p.have(TokenKind::LeftBracket) {
                if !p.have(TokenKind::RightBracket) {
                    return false;
                }
            }
            if !p.have(TokenKind::RightParen) {
                return false;
            }
            let next = p.token().kind;
            next.is_literal()
                || matches!(
                    next,
                    TokenKind::Identifier
                        | TokenKind::LeftParen
                        | TokenKind::LogicalNot
                        | TokenKind::Tilde
                        | TokenKind::This
                        | TokenKind::Super
                        | TokenKind::New
                )
        })
    }

    /// ブロック内の文の先頭がローカル変数宣言か
    fn see_local_variable_declaration(&mut self) -> bool {
        self.speculate(|p| {
            if p.see_basic_type() {
                p.next();
            } else if p.have(TokenKind::Identifier) {
                while p.have(TokenKind::Dot) {
                    if !p.have(TokenKind::Identifier) {
                        return false;
                    }
                }
            } else {
                return false;
            }
            while p.have(TokenKind::LeftBracket) {
                if !p.have(TokenKind::RightBracket) {
                    return false;
                }
            }
            p.see(TokenKind::Identifier)
        })
    }

    /// `for (` の後、対応する `)` より前にトップレベルの `;` があれば従来形式
    fn see_traditional_for(&mut self) -> bool {
        self.speculate(|p| {
            let mut depth = 0usize;
            loop {
                match p.token().kind {
                    TokenKind::Eof => return false,
                    TokenKind::Semicolon if depth == 0 => return true,
                    TokenKind::LeftParen => depth += 1,
                    TokenKind::RightParen => {
                        if depth == 0 {
                            return false;
                        }
                        depth -= 1;
                    }
                    _ => {}
                }
                p.next();
            }
        })
    }

    // ---- 名前 ----

    /// 識別子。無ければ報告して空文字列を返す。
    fn identifier(&mut self) -> String {
        if self.see(TokenKind::Identifier) {
            let name = self.token().image.clone();
            self.next();
            name
        } else {
            self.must_be(TokenKind::Identifier);
            String::new()
        }
    }

    /// `a.b.c` 形式の名前
    fn qualified_identifier(&mut self) -> String {
        let mut name = self.identifier();
        while self.have(TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.identifier());
        }
        name
    }
}

/// ソースを構文解析してコンパイル単位を返す
pub fn parse(source: &str, file_name: &str, diagnostics: &mut Diagnostics) -> CompilationUnit {
    debug!("構文解析開始: {}", file_name);
    let mut parser = Parser::new(source, file_name, diagnostics);
    let unit = parser.parse_compilation_unit();
    info!(
        "構文解析完了: {} ({}個の型宣言, 抑止したエラー{}件)",
        file_name,
        unit.type_declarations.len(),
        parser.recovery().suppressed()
    );
    unit
}
