//! # トークン定義
//!
//! j--のレキサーが生成するトークンの定義を提供します。
//! トークンは種類・ソース上の綴り（image）・行番号を持ち、生成後は変更されません。

use std::fmt;

use serde::Serialize;

/// トークンの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    /// ファイル終端
    Eof,

    // 識別子とリテラル
    Identifier,
    IntLiteral,
    LongLiteral,
    FloatLiteral,
    DoubleLiteral,
    CharLiteral,
    StringLiteral,

    // 予約語
    Abstract,
    Boolean,
    Break,
    Byte,
    Case,
    Catch,
    Char,
    Class,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Extends,
    False,
    Final,
    Finally,
    Float,
    For,
    Goto,
    If,
    Implements,
    Import,
    Instanceof,
    Int,
    Interface,
    Long,
    Native,
    New,
    Null,
    Package,
    Private,
    Protected,
    Public,
    Return,
    Short,
    Static,
    Strictfp,
    Super,
    Switch,
    Synchronized,
    This,
    Throw,
    Throws,
    Transient,
    True,
    Try,
    Void,
    Volatile,
    While,

    // 演算子
    /// =
    Assign,
    /// ==
    Equal,
    /// !
    LogicalNot,
    /// !=
    NotEqual,
    /// ?
    Question,
    /// :
    Colon,
    /// ~
    Tilde,
    /// *
    Star,
    /// *=
    StarAssign,
    /// %
    Percent,
    /// %=
    PercentAssign,
    /// +
    Plus,
    /// +=
    PlusAssign,
    /// ++
    Increment,
    /// -
    Minus,
    /// -=
    MinusAssign,
    /// --
    Decrement,
    /// &
    Ampersand,
    /// &=
    AmpersandAssign,
    /// &&
    LogicalAnd,
    /// ^
    Caret,
    /// ^=
    CaretAssign,
    /// |
    Pipe,
    /// |=
    PipeAssign,
    /// ||
    LogicalOr,
    /// >
    Greater,
    /// >=
    GreaterEqual,
    /// >>
    ShiftRight,
    /// >>=
    ShiftRightAssign,
    /// >>>
    UnsignedShiftRight,
    /// >>>=
    UnsignedShiftRightAssign,
    /// <
    Less,
    /// <=
    LessEqual,
    /// <<
    ShiftLeft,
    /// <<=
    ShiftLeftAssign,
    /// /
    Slash,
    /// /=
    SlashAssign,

    // 区切り記号
    Semicolon,
    Comma,
    Dot,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
}

impl TokenKind {
    /// 種類を表す綴り。固定綴りのトークンはその綴り、それ以外は `<...>` 形式。
    pub fn image(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Eof => "<EOF>",
            Identifier => "<IDENTIFIER>",
            IntLiteral => "<INT_LITERAL>",
            LongLiteral => "<LONG_LITERAL>",
            FloatLiteral => "<FLOAT_LITERAL>",
            DoubleLiteral => "<DOUBLE_LITERAL>",
            CharLiteral => "<CHAR_LITERAL>",
            StringLiteral => "<STRING_LITERAL>",
            Abstract => "abstract",
            Boolean => "boolean",
            Break => "break",
            Byte => "byte",
            Case => "case",
            Catch => "catch",
            Char => "char",
            Class => "class",
            Const => "const",
            Continue => "continue",
            Default => "default",
            Do => "do",
            Double => "double",
            Else => "else",
            Extends => "extends",
            False => "false",
            Final => "final",
            Finally => "finally",
            Float => "float",
            For => "for",
            Goto => "goto",
            If => "if",
            Implements => "implements",
            Import => "import",
            Instanceof => "instanceof",
            Int => "int",
            Interface => "interface",
            Long => "long",
            Native => "native",
            New => "new",
            Null => "null",
            Package => "package",
            Private => "private",
            Protected => "protected",
            Public => "public",
            Return => "return",
            Short => "short",
            Static => "static",
            Strictfp => "strictfp",
            Super => "super",
            Switch => "switch",
            Synchronized => "synchronized",
            This => "this",
            Throw => "throw",
            Throws => "throws",
            Transient => "transient",
            True => "true",
            Try => "try",
            Void => "void",
            Volatile => "volatile",
            While => "while",
            Assign => "=",
            Equal => "==",
            LogicalNot => "!",
            NotEqual => "!=",
            Question => "?",
            Colon => ":",
            Tilde => "~",
            Star => "*",
            StarAssign => "*=",
            Percent => "%",
            PercentAssign => "%=",
            Plus => "+",
            PlusAssign => "+=",
            Increment => "++",
            Minus => "-",
            MinusAssign => "-=",
            Decrement => "--",
            Ampersand => "&",
            AmpersandAssign => "&=",
            LogicalAnd => "&&",
            Caret => "^",
            CaretAssign => "^=",
            Pipe => "|",
            PipeAssign => "|=",
            LogicalOr => "||",
            Greater => ">",
            GreaterEqual => ">=",
            ShiftRight => ">>",
            ShiftRightAssign => ">>=",
            UnsignedShiftRight => ">>>",
            UnsignedShiftRightAssign => ">>>=",
            Less => "<",
            LessEqual => "<=",
            ShiftLeft => "<<",
            ShiftLeftAssign => "<<=",
            Slash => "/",
            SlashAssign => "/=",
            Semicolon => ";",
            Comma => ",",
            Dot => ".",
            LeftParen => "(",
            RightParen => ")",
            LeftBrace => "{",
            RightBrace => "}",
            LeftBracket => "[",
            RightBracket => "]",
        }
    }

    /// 予約語か
    pub fn is_keyword(&self) -> bool {
        KEYWORDS.iter().any(|(_, kind)| kind == self)
    }

    /// リテラルか（true/false/nullを含む）
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::IntLiteral
                | TokenKind::LongLiteral
                | TokenKind::FloatLiteral
                | TokenKind::DoubleLiteral
                | TokenKind::CharLiteral
                | TokenKind::StringLiteral
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }

    /// 基本型の予約語か
    pub fn is_basic_type(&self) -> bool {
        matches!(
            self,
            TokenKind::Boolean
                | TokenKind::Char
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Float
                | TokenKind::Double
        )
    }

    /// 修飾子の予約語か
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            TokenKind::Public
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Native
                | TokenKind::Synchronized
                | TokenKind::Transient
                | TokenKind::Volatile
                | TokenKind::Strictfp
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.image())
    }
}

/// トークン
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// 種類
    pub kind: TokenKind,
    /// ソース上の綴り
    pub image: String,
    /// 行番号（1から始まる）
    pub line: usize,
}

impl Token {
    /// 新しいトークンを作成
    pub fn new(kind: TokenKind, image: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            image: image.into(),
            line,
        }
    }

    /// 指定した種類か
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.image)
    }
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("abstract", TokenKind::Abstract),
    ("boolean", TokenKind::Boolean),
    ("break", TokenKind::Break),
    ("byte", TokenKind::Byte),
    ("case", TokenKind::Case),
    ("catch", TokenKind::Catch),
    ("char", TokenKind::Char),
    ("class", TokenKind::Class),
    ("const", TokenKind::Const),
    ("continue", TokenKind::Continue),
    ("default", TokenKind::Default),
    ("do", TokenKind::Do),
    ("double", TokenKind::Double),
    ("else", TokenKind::Else),
    ("extends", TokenKind::Extends),
    ("false", TokenKind::False),
    ("final", TokenKind::Final),
    ("finally", TokenKind::Finally),
    ("float", TokenKind::Float),
    ("for", TokenKind::For),
    ("goto", TokenKind::Goto),
    ("if", TokenKind::If),
    ("implements", TokenKind::Implements),
    ("import", TokenKind::Import),
    ("instanceof", TokenKind::Instanceof),
    ("int", TokenKind::Int),
    ("interface", TokenKind::Interface),
    ("long", TokenKind::Long),
    ("native", TokenKind::Native),
    ("new", TokenKind::New),
    ("null", TokenKind::Null),
    ("package", TokenKind::Package),
    ("private", TokenKind::Private),
    ("protected", TokenKind::Protected),
    ("public", TokenKind::Public),
    ("return", TokenKind::Return),
    ("short", TokenKind::Short),
    ("static", TokenKind::Static),
    ("strictfp", TokenKind::Strictfp),
    ("super", TokenKind::Super),
    ("switch", TokenKind::Switch),
    ("synchronized", TokenKind::Synchronized),
    ("this", TokenKind::This),
    ("throw", TokenKind::Throw),
    ("throws", TokenKind::Throws),
    ("transient", TokenKind::Transient),
    ("true", TokenKind::True),
    ("try", TokenKind::Try),
    ("void", TokenKind::Void),
    ("volatile", TokenKind::Volatile),
    ("while", TokenKind::While),
];

/// 予約語表を引く。予約語でなければ `None`。
pub fn lookup_keyword(identifier: &str) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|(word, _)| *word == identifier)
        .map(|(_, kind)| *kind)
}
