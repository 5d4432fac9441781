//! # j-- コンパイラフロントエンド
//!
//! ソースコードの解析から型付き抽象構文木の生成までを統括します。
//!
//! ## コンパイルフェーズ
//! 1. 字句解析（[`lexer`]）
//! 2. 構文解析（[`parser`]）
//! 3. 事前解析と意味解析（[`semantic`]）
//!
//! どのフェーズもエラーで中断せず、[`crate::diagnostics::Diagnostics`] に
//! 報告を積み上げて処理を続けます。

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;

/// フロントエンドの主要インターフェースを統一的にエクスポート
pub use self::{
    ast::{CompilationUnit, PrettyPrinter},
    error::{CompilerError, ErrorKind, Result},
    lexer::{tokenize, Lexer, LookaheadScanner, Token, TokenKind},
    parser::{parse, Parser},
    semantic::Analyzer,
};
