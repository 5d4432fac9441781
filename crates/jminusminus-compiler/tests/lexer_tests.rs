use jminusminus_compiler::frontend::lexer::{self, Token, TokenKind};
use jminusminus_compiler::ErrorKind;

fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
    tokens.iter().map(|t| t.kind).collect()
}

#[test]
fn test_lexer_simple_tokens() {
    let source = "int x = 42;";
    let (tokens, diagnostics) = lexer::tokenize(source, "Test.java");
    assert!(!diagnostics.has_errors());

    let expected_tokens = vec![
        TokenKind::Int,
        TokenKind::Identifier,
        TokenKind::Assign,
        TokenKind::IntLiteral,
        TokenKind::Semicolon,
        TokenKind::Eof,
    ];
    assert_eq!(kinds(&tokens), expected_tokens);
}

#[test]
fn test_lexer_images_round_trip() {
    let source = "x+=0x1F>>>2; s = \"a\\tb\"; c = '\\''; d = 1.5e3d; l = 10L;";
    let (tokens, diagnostics) = lexer::tokenize(source, "Test.java");
    assert!(!diagnostics.has_errors());

    // 空白を除けば、トークンの綴りを連結するとソースに戻る
    let rebuilt: String = tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.image.as_str())
        .collect();
    let compact: String = source.chars().filter(|c| !c.is_whitespace()).collect();
    assert_eq!(rebuilt, compact);
}

#[test]
fn test_lexer_keywords() {
    let source = "if (true) { return false; } else { while (x) do y; }";
    let (tokens, _) = lexer::tokenize(source, "Test.java");

    let actual_keywords: Vec<_> = tokens
        .iter()
        .filter(|t| t.kind.is_keyword())
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        actual_keywords,
        vec![
            TokenKind::If,
            TokenKind::True,
            TokenKind::Return,
            TokenKind::False,
            TokenKind::Else,
            TokenKind::While,
            TokenKind::Do,
        ]
    );
}

#[test]
fn test_lexer_operators() {
    let source = "a + b - c * d / e % f && g || h == i != j < k <= l > m >= n";
    let (tokens, _) = lexer::tokenize(source, "Test.java");

    let operators: Vec<_> = tokens
        .iter()
        .filter(|t| !matches!(t.kind, TokenKind::Identifier | TokenKind::Eof))
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        operators,
        vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::LogicalAnd,
            TokenKind::LogicalOr,
            TokenKind::Equal,
            TokenKind::NotEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
            TokenKind::Greater,
            TokenKind::GreaterEqual,
        ]
    );
}

#[test]
fn test_lexer_compound_shift_operators() {
    let (tokens, _) = lexer::tokenize("a <<= 1; b >>= 2; c >>>= 3; d >> e", "Test.java");
    let operators: Vec<_> = kinds(&tokens)
        .into_iter()
        .filter(|k| {
            matches!(
                k,
                TokenKind::ShiftLeftAssign
                    | TokenKind::ShiftRightAssign
                    | TokenKind::UnsignedShiftRightAssign
                    | TokenKind::ShiftRight
            )
        })
        .collect();
    assert_eq!(
        operators,
        vec![
            TokenKind::ShiftLeftAssign,
            TokenKind::ShiftRightAssign,
            TokenKind::UnsignedShiftRightAssign,
            TokenKind::ShiftRight,
        ]
    );
}

#[test]
fn test_lexer_numeric_literal_kinds() {
    let (tokens, diagnostics) = lexer::tokenize("017 1e3 1e3d 1.5 2.5f 3L 0", "Test.java");
    assert!(!diagnostics.has_errors());
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::IntLiteral,
            TokenKind::FloatLiteral,
            TokenKind::DoubleLiteral,
            TokenKind::DoubleLiteral,
            TokenKind::FloatLiteral,
            TokenKind::LongLiteral,
            TokenKind::IntLiteral,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_lexer_error_handling() {
    let (tokens, diagnostics) = lexer::tokenize("int x = @ 3;", "Test.java");

    // 不正な文字は報告され、字句解析はその次から続く
    assert_eq!(diagnostics.count_of(ErrorKind::Lexical), 1);
    assert_eq!(
        kinds(&tokens),
        vec![
            TokenKind::Int,
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::IntLiteral,
            TokenKind::Semicolon,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_lexer_bad_octal_is_reported() {
    let (_, diagnostics) = lexer::tokenize("int x = 089;", "Test.java");
    assert_eq!(diagnostics.count_of(ErrorKind::Lexical), 1);
}

#[test]
fn test_lexer_bad_octal_with_long_suffix_is_reported() {
    let (tokens, diagnostics) = lexer::tokenize("long x = 09L; long y = 07L; double z = 09d;", "Test.java");
    assert_eq!(diagnostics.count_of(ErrorKind::Lexical), 1);
    assert!(diagnostics.messages()[0].contains("09"));
    let longs: Vec<&str> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::LongLiteral)
        .map(|t| t.image.as_str())
        .collect();
    assert_eq!(longs, vec!["09L", "07L"]);
}

#[test]
fn test_lexer_unterminated_string() {
    let (tokens, diagnostics) = lexer::tokenize("String s = \"Hello, World!\nint y;", "Test.java");
    assert!(diagnostics.has_errors());
    let first = diagnostics.iter().next().map(|d| d.line);
    assert_eq!(first, Some(1));
    // 次の行のトークンは正しく読める
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Int && t.line == 2));
}

#[test]
fn test_lexer_unterminated_comment() {
    let (tokens, diagnostics) = lexer::tokenize("int x; /* never closed", "Test.java");
    assert_eq!(diagnostics.count_of(ErrorKind::Lexical), 1);
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
}

#[test]
fn test_lexer_comments_and_line_numbers() {
    let source = "
        // これは行コメントです
        int x = 10; /* これはブロックコメントです */
        /* 複数行の
           ブロックコメント
        */
        int y = 20;
    ";
    let (tokens, diagnostics) = lexer::tokenize(source, "Test.java");
    assert!(!diagnostics.has_errors());

    // コメントは無視される
    let identifiers: Vec<_> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Identifier)
        .map(|t| (t.image.as_str(), t.line))
        .collect();
    assert_eq!(identifiers, vec![("x", 3), ("y", 7)]);
}
