//! # 抽象構文木（AST）
//!
//! j--のソースコードを表現する抽象構文木の定義です。
//! 構文解析器が生成し、意味解析で型を付けられ（糖衣構文は書き換えられ）、
//! コード生成で読み取られます。各ノードは子ノードを排他的に所有します。
//!
//! 意味解析で決まる情報（式の型、ローカル変数のスロット、解決済みメンバなど）は
//! `Option` のフィールドとして保持し、解析前は `None` です。

use std::fmt;

use crate::frontend::lexer::TokenKind;
use crate::typesystem::{FieldRef, MethodRef, Type};

pub mod dump;

pub use dump::PrettyPrinter;

/// 修飾子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Static,
    Abstract,
    Final,
    Native,
    Synchronized,
    Transient,
    Volatile,
    Strictfp,
}

impl Modifier {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        let modifier = match kind {
            TokenKind::Public => Modifier::Public,
            TokenKind::Protected => Modifier::Protected,
            TokenKind::Private => Modifier::Private,
            TokenKind::Static => Modifier::Static,
            TokenKind::Abstract => Modifier::Abstract,
            TokenKind::Final => Modifier::Final,
            TokenKind::Native => Modifier::Native,
            TokenKind::Synchronized => Modifier::Synchronized,
            TokenKind::Transient => Modifier::Transient,
            TokenKind::Volatile => Modifier::Volatile,
            TokenKind::Strictfp => Modifier::Strictfp,
            _ => return None,
        };
        Some(modifier)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Static => "static",
            Modifier::Abstract => "abstract",
            Modifier::Final => "final",
            Modifier::Native => "native",
            Modifier::Synchronized => "synchronized",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Strictfp => "strictfp",
        }
    }

    /// アクセスフラグのビット
    pub fn access_flag(&self) -> u16 {
        match self {
            Modifier::Public => 0x0001,
            Modifier::Private => 0x0002,
            Modifier::Protected => 0x0004,
            Modifier::Static => 0x0008,
            Modifier::Final => 0x0010,
            Modifier::Synchronized => 0x0020,
            Modifier::Volatile => 0x0040,
            Modifier::Transient => 0x0080,
            Modifier::Native => 0x0100,
            Modifier::Abstract => 0x0400,
            Modifier::Strictfp => 0x0800,
        }
    }

    pub fn is_access(&self) -> bool {
        matches!(self, Modifier::Public | Modifier::Protected | Modifier::Private)
    }
}

/// 修飾子の並び
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub list: Vec<Modifier>,
}

impl Modifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.list.contains(&modifier)
    }

    pub fn is_static(&self) -> bool {
        self.contains(Modifier::Static)
    }

    pub fn is_abstract(&self) -> bool {
        self.contains(Modifier::Abstract)
    }

    pub fn access_flags(&self) -> u16 {
        self.list.iter().fold(0, |flags, m| flags | m.access_flag())
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        if !self.contains(modifier) {
            self.list.push(modifier);
        }
        self
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<&str> = self.list.iter().map(Modifier::keyword).collect();
        write!(f, "{}", words.join(" "))
    }
}

/// ソース上に書かれた型（未解決）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub line: usize,
    /// 基本型名またはドット区切りの型名。構文エラー時は空文字列。
    pub name: String,
    /// 配列の次元数
    pub dimensions: usize,
}

impl TypeName {
    pub fn new(line: usize, name: impl Into<String>) -> Self {
        Self {
            line,
            name: name.into(),
            dimensions: 0,
        }
    }

    pub fn array(line: usize, name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            line,
            name: name.into(),
            dimensions,
        }
    }

    /// 構文エラーの代わりに置く型
    pub fn erroneous(line: usize) -> Self {
        Self::new(line, "")
    }

    pub fn is_erroneous(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_void(&self) -> bool {
        self.name == "void" && self.dimensions == 0
    }

    /// 基本型（配列でない int など）か
    pub fn is_primitive(&self) -> bool {
        self.dimensions == 0
            && matches!(self.name.as_str(), "int" | "long" | "float" | "double" | "char" | "boolean")
    }

    /// 配列の要素型
    pub fn element(&self) -> TypeName {
        Self::array(self.line, self.name.clone(), self.dimensions.saturating_sub(1))
    }

    /// 解決済みの型から、同じ型に解決される型名を作る
    pub fn from_type(ty: &Type, line: usize) -> Self {
        match ty {
            Type::Array(element) => {
                let mut name = Self::from_type(element, line);
                name.dimensions += 1;
                name
            }
            Type::Reference(name) => Self::new(line, name.replace('/', ".")),
            Type::Null | Type::Any => Self::new(line, "java.lang.Object"),
            primitive => Self::new(line, primitive.to_string()),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, "[]".repeat(self.dimensions))
    }
}

/// 解析の進み具合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Parsed,
    PreAnalyzed,
    Analyzed,
}

/// import 宣言
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub line: usize,
    /// ドット区切りの完全修飾名
    pub name: String,
}

/// コンパイル単位（1ソースファイル）
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub file_name: String,
    pub line: usize,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub type_declarations: Vec<ClassDeclaration>,
    /// 二重解析を防ぐための状態
    pub state: AnalysisState,
}

impl CompilationUnit {
    pub fn new(file_name: impl Into<String>, line: usize) -> Self {
        Self {
            file_name: file_name.into(),
            line,
            package: None,
            imports: Vec::new(),
            type_declarations: Vec::new(),
            state: AnalysisState::Parsed,
        }
    }
}

/// クラス・インターフェース宣言
#[derive(Debug, Clone)]
pub struct ClassDeclaration {
    pub line: usize,
    pub modifiers: Modifiers,
    pub name: String,
    pub is_interface: bool,
    pub super_class: Option<TypeName>,
    /// クラスでは implements、インターフェースでは extends の並び
    pub interfaces: Vec<TypeName>,
    pub members: Vec<Member>,
    /// 事前解析で決まる内部名
    pub internal_name: Option<String>,
}

impl ClassDeclaration {
    /// 内部名。事前解析前は単純名。
    pub fn internal_name(&self) -> &str {
        self.internal_name.as_deref().unwrap_or(&self.name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDeclaration> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn has_constructor(&self) -> bool {
        self.methods().any(|m| m.kind == MethodKind::Constructor)
    }
}

/// クラス本体のメンバ
#[derive(Debug, Clone)]
pub enum Member {
    Field(FieldDeclaration),
    Method(MethodDeclaration),
    /// `static { ... }` または `{ ... }`
    Initializer(Initializer),
    /// 入れ子の型宣言（未実装）
    Type(ClassDeclaration),
}

#[derive(Debug, Clone)]
pub struct FieldDeclaration {
    pub line: usize,
    pub modifiers: Modifiers,
    pub declarators: Vec<VariableDeclarator>,
}

/// 変数宣言子 `name = initializer`
#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub line: usize,
    pub name: String,
    pub type_name: TypeName,
    pub initializer: Option<Expression>,
    /// 解決済みの型
    pub ty: Option<Type>,
    /// ローカル変数のスロット
    pub slot: Option<usize>,
}

impl VariableDeclarator {
    pub fn new(line: usize, name: impl Into<String>, type_name: TypeName, initializer: Option<Expression>) -> Self {
        Self {
            line,
            name: name.into(),
            type_name,
            initializer,
            ty: None,
            slot: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
}

/// メソッド・コンストラクタ宣言
#[derive(Debug, Clone)]
pub struct MethodDeclaration {
    pub line: usize,
    pub modifiers: Modifiers,
    pub kind: MethodKind,
    pub name: String,
    /// コンストラクタでは `void`
    pub return_type: TypeName,
    pub parameters: Vec<FormalParameter>,
    pub throws: Vec<TypeName>,
    /// 抽象メソッドでは `None`
    pub body: Option<Block>,
    /// 事前解析で決まるメソッド記述子
    pub descriptor: Option<String>,
    /// 事前解析で決まる throws 型の内部名
    pub exceptions: Vec<String>,
}

impl MethodDeclaration {
    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    /// 出力上のメソッド名
    pub fn emitted_name(&self) -> &str {
        match self.kind {
            MethodKind::Constructor => "<init>",
            MethodKind::Method => &self.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Initializer {
    pub line: usize,
    pub is_static: bool,
    pub body: Block,
}

/// 仮引数（メソッド引数、catch 引数、拡張for文の変数）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalParameter {
    pub line: usize,
    pub name: String,
    pub type_name: TypeName,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub line: usize,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(line: usize, statements: Vec<Statement>) -> Self {
        Self { line, statements }
    }
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub line: usize,
    pub parameter: FormalParameter,
    pub body: Block,
    /// 例外を受け取るローカル変数のスロット
    pub slot: Option<usize>,
    /// 捕捉する例外型の内部名
    pub exception_type: Option<String>,
}

/// 文ノード
#[derive(Debug, Clone)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(line: usize, kind: StatementKind) -> Self {
        Self { line, kind }
    }

    pub fn empty(line: usize) -> Self {
        Self::new(line, StatementKind::Empty)
    }

    pub fn expression(expression: Expression) -> Self {
        Self::new(expression.line, StatementKind::Expression(expression))
    }
}

/// 文の種類
#[derive(Debug, Clone)]
pub enum StatementKind {
    Block(Block),
    If {
        condition: Expression,
        then_part: Box<Statement>,
        else_part: Option<Box<Statement>>,
    },
    While {
        condition: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        condition: Expression,
    },
    /// 従来形式の for 文。条件を省略すると常に真。
    For {
        init: Vec<Statement>,
        condition: Option<Expression>,
        update: Vec<Statement>,
        body: Box<Statement>,
    },
    /// 拡張 for 文。意味解析で `Block` と `For` に書き換えられる。
    ForEach {
        parameter: FormalParameter,
        iterable: Expression,
        body: Box<Statement>,
    },
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
        /// 捕捉されなかった例外を finally 実行中に退避するスロット
        finally_slot: Option<usize>,
    },
    Throw(Expression),
    Return(Option<Expression>),
    /// ローカル変数宣言。初期化子は意味解析で代入式に書き換えられる。
    LocalVariable {
        declarators: Vec<VariableDeclarator>,
        initializations: Vec<Expression>,
    },
    Expression(Expression),
    Empty,
}

/// 二項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::UnsignedShiftRight => ">>>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
        }
    }

    /// 大小比較演算子
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual
        )
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    /// 結果が boolean になる演算子
    pub fn is_boolean_valued(&self) -> bool {
        self.is_relational() || self.is_equality() || self.is_logical()
    }

    /// int オペランドだけを受け付けるビット・シフト演算子
    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOp::ShiftLeft
                | BinaryOp::ShiftRight
                | BinaryOp::UnsignedShiftRight
                | BinaryOp::BitAnd
                | BinaryOp::BitOr
                | BinaryOp::BitXor
        )
    }

    /// 論理否定したときの比較演算子
    pub fn negated(&self) -> Option<BinaryOp> {
        let op = match self {
            BinaryOp::Equal => BinaryOp::NotEqual,
            BinaryOp::NotEqual => BinaryOp::Equal,
            BinaryOp::Less => BinaryOp::GreaterEqual,
            BinaryOp::LessEqual => BinaryOp::Greater,
            BinaryOp::Greater => BinaryOp::LessEqual,
            BinaryOp::GreaterEqual => BinaryOp::Less,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Negate,
    /// `+x`
    Plus,
    /// `~x`
    Complement,
    /// `!x`
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Complement => "~",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncrementOp {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl IncrementOp {
    pub fn is_prefix(&self) -> bool {
        matches!(self, IncrementOp::PreIncrement | IncrementOp::PreDecrement)
    }

    pub fn delta(&self) -> i32 {
        match self {
            IncrementOp::PreIncrement | IncrementOp::PostIncrement => 1,
            IncrementOp::PreDecrement | IncrementOp::PostDecrement => -1,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            IncrementOp::PreIncrement => "++pre",
            IncrementOp::PreDecrement => "--pre",
            IncrementOp::PostIncrement => "post++",
            IncrementOp::PostDecrement => "post--",
        }
    }
}

/// 代入演算子。複合代入は対応する二項演算子を持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

impl AssignOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        let op = match kind {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Compound(BinaryOp::Add),
            TokenKind::MinusAssign => AssignOp::Compound(BinaryOp::Subtract),
            TokenKind::StarAssign => AssignOp::Compound(BinaryOp::Multiply),
            TokenKind::SlashAssign => AssignOp::Compound(BinaryOp::Divide),
            TokenKind::PercentAssign => AssignOp::Compound(BinaryOp::Remainder),
            TokenKind::AmpersandAssign => AssignOp::Compound(BinaryOp::BitAnd),
            TokenKind::PipeAssign => AssignOp::Compound(BinaryOp::BitOr),
            TokenKind::CaretAssign => AssignOp::Compound(BinaryOp::BitXor),
            TokenKind::ShiftLeftAssign => AssignOp::Compound(BinaryOp::ShiftLeft),
            TokenKind::ShiftRightAssign => AssignOp::Compound(BinaryOp::ShiftRight),
            TokenKind::UnsignedShiftRightAssign => AssignOp::Compound(BinaryOp::UnsignedShiftRight),
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> String {
        match self {
            AssignOp::Assign => "=".to_string(),
            AssignOp::Compound(op) => format!("{}=", op.symbol()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Boolean,
    Null,
}

/// リテラル。値はソース上の綴りから必要になった時点で取り出す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub image: String,
}

impl Literal {
    pub fn new(kind: LiteralKind, image: impl Into<String>) -> Self {
        Self {
            kind,
            image: image.into(),
        }
    }

    /// int リテラルの値。範囲外なら `None`。
    pub fn int_value(&self) -> Option<i32> {
        let (digits, radix) = integer_digits(&self.image);
        if radix == 10 {
            digits.parse::<i32>().ok()
        } else {
            u32::from_str_radix(&digits, radix).ok().map(|v| v as i32)
        }
    }

    /// long リテラルの値。範囲外なら `None`。
    pub fn long_value(&self) -> Option<i64> {
        let (digits, radix) = integer_digits(&self.image);
        if radix == 10 {
            digits.parse::<i64>().ok()
        } else {
            u64::from_str_radix(&digits, radix).ok().map(|v| v as i64)
        }
    }

    pub fn float_value(&self) -> Option<f32> {
        self.image
            .trim_end_matches(|c| c == 'f' || c == 'F')
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
    }

    pub fn double_value(&self) -> Option<f64> {
        self.image
            .trim_end_matches(|c| c == 'd' || c == 'D')
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    pub fn char_value(&self) -> Option<char> {
        let inner = strip_quotes(&self.image, '\'');
        unescape(inner).chars().next()
    }

    pub fn string_value(&self) -> String {
        unescape(strip_quotes(&self.image, '"'))
    }

    pub fn boolean_value(&self) -> bool {
        self.image == "true"
    }
}

fn integer_digits(image: &str) -> (String, u32) {
    let body = image.trim_end_matches(|c| c == 'l' || c == 'L');
    let lower = body.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        (hex.to_string(), 16)
    } else if let Some(binary) = lower.strip_prefix("0b") {
        (binary.to_string(), 2)
    } else if body.len() > 1 && body.starts_with('0') {
        (body[1..].to_string(), 8)
    } else {
        (body.to_string(), 10)
    }
}

fn strip_quotes(image: &str, quote: char) -> &str {
    let inner = image.strip_prefix(quote).unwrap_or(image);
    inner.strip_suffix(quote).unwrap_or(inner)
}

/// エスケープシーケンスを展開する。不正なものは字句解析で報告済みなのでそのまま残す。
pub fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => result.push('\u{8}'),
            Some('t') => result.push('\t'),
            Some('n') => result.push('\n'),
            Some('f') => result.push('\u{c}'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

/// 式ノード
#[derive(Debug, Clone)]
pub struct Expression {
    pub line: usize,
    pub kind: ExpressionKind,
    /// 意味解析で決まる型
    pub ty: Option<Type>,
}

impl Expression {
    pub fn new(line: usize, kind: ExpressionKind) -> Self {
        Self { line, kind, ty: None }
    }

    pub fn typed(line: usize, kind: ExpressionKind, ty: Type) -> Self {
        Self {
            line,
            kind,
            ty: Some(ty),
        }
    }

    /// 構文エラーの代わりに置く式
    pub fn wild(line: usize) -> Self {
        Self::new(line, ExpressionKind::Wild)
    }

    pub fn literal(line: usize, kind: LiteralKind, image: impl Into<String>) -> Self {
        Self::new(line, ExpressionKind::Literal(Literal::new(kind, image)))
    }

    pub fn variable(line: usize, name: impl Into<String>) -> Self {
        Self::new(
            line,
            ExpressionKind::Variable {
                name: name.into(),
                slot: None,
            },
        )
    }

    /// 解析済みの型。未解析なら `Any`。
    pub fn ty(&self) -> &Type {
        self.ty.as_ref().unwrap_or(&Type::Any)
    }

    pub fn is_analyzed(&self) -> bool {
        self.ty.is_some()
    }

    /// 代入の左辺になれるか
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Variable { .. }
                | ExpressionKind::FieldSelection { .. }
                | ExpressionKind::ArrayAccess { .. }
                | ExpressionKind::ArrayLength(_)
        )
    }

    /// 式文として書ける（副作用を持つ）式か
    pub fn is_statement_expression(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Assign { .. }
                | ExpressionKind::Increment { .. }
                | ExpressionKind::Message { .. }
                | ExpressionKind::New { .. }
                | ExpressionKind::ThisConstruction { .. }
                | ExpressionKind::SuperConstruction { .. }
        )
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(&self.kind, ExpressionKind::Literal(l) if l.kind == LiteralKind::Null)
    }
}

/// 式の種類
#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Literal(Literal),
    /// 単純名。解析後はローカル変数だけがこの形で残る。
    Variable {
        name: String,
        slot: Option<usize>,
    },
    This,
    /// `super.f` や `super.m()` の対象
    Super,
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Increment {
        op: IncrementOp,
        operand: Box<Expression>,
    },
    Assign {
        op: AssignOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then_part: Box<Expression>,
        else_part: Box<Expression>,
    },
    /// メソッド呼び出し。`ambiguous` は `a.b.m()` の `a.b` のような未分類の接頭辞。
    Message {
        target: Option<Box<Expression>>,
        ambiguous: Option<String>,
        name: String,
        arguments: Vec<Expression>,
        method: Option<MethodRef>,
    },
    /// フィールド参照。`target` も `ambiguous` もなければ static フィールド。
    FieldSelection {
        target: Option<Box<Expression>>,
        ambiguous: Option<String>,
        name: String,
        field: Option<FieldRef>,
    },
    ArrayLength(Box<Expression>),
    ArrayAccess {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    Cast {
        type_name: TypeName,
        operand: Box<Expression>,
    },
    InstanceOf {
        operand: Box<Expression>,
        type_name: TypeName,
    },
    New {
        type_name: TypeName,
        arguments: Vec<Expression>,
        constructor: Option<MethodRef>,
    },
    /// `new int[n][m][]`。`type_name` は生成される配列の型そのもの。
    NewArray {
        type_name: TypeName,
        dimensions: Vec<Expression>,
    },
    /// `{1, 2, 3}`。型は宣言側から与えられる。
    ArrayInitializer {
        type_name: Option<TypeName>,
        elements: Vec<Expression>,
    },
    ThisConstruction {
        arguments: Vec<Expression>,
        constructor: Option<MethodRef>,
    },
    SuperConstruction {
        arguments: Vec<Expression>,
        constructor: Option<MethodRef>,
    },
    /// 構文エラー位置に置かれる式
    Wild,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_literal_radixes() {
        assert_eq!(Literal::new(LiteralKind::Int, "0x1F").int_value(), Some(31));
        assert_eq!(Literal::new(LiteralKind::Int, "0b101").int_value(), Some(5));
        assert_eq!(Literal::new(LiteralKind::Int, "017").int_value(), Some(15));
        assert_eq!(Literal::new(LiteralKind::Int, "0xFFFFFFFF").int_value(), Some(-1));
        assert_eq!(Literal::new(LiteralKind::Int, "2147483648").int_value(), None);
        assert_eq!(Literal::new(LiteralKind::Long, "2147483648L").long_value(), Some(2147483648));
    }

    #[test]
    fn test_floating_literals() {
        assert_eq!(Literal::new(LiteralKind::Float, "1.5f").float_value(), Some(1.5));
        assert_eq!(Literal::new(LiteralKind::Float, "1e3").float_value(), Some(1000.0));
        assert_eq!(Literal::new(LiteralKind::Double, "2.25").double_value(), Some(2.25));
    }

    #[test]
    fn test_char_and_string_escapes() {
        assert_eq!(Literal::new(LiteralKind::Char, "'\\n'").char_value(), Some('\n'));
        assert_eq!(Literal::new(LiteralKind::Char, "'a'").char_value(), Some('a'));
        assert_eq!(
            Literal::new(LiteralKind::String, "\"a\\tb\\\"\"").string_value(),
            "a\tb\""
        );
    }

    #[test]
    fn test_type_name_round_trip() {
        let ty = Type::with_dimensions(Type::string(), 2);
        let name = TypeName::from_type(&ty, 4);
        assert_eq!(name.name, "java.lang.String");
        assert_eq!(name.dimensions, 2);
        assert_eq!(name.to_string(), "java.lang.String[][]");
    }
}
