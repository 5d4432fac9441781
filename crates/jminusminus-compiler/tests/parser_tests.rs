use jminusminus_compiler::ast::{
    BinaryOp, CompilationUnit, ExpressionKind, Member, PrettyPrinter, StatementKind,
};
use jminusminus_compiler::parser::{self, Parser};
use jminusminus_compiler::{Diagnostics, ErrorKind, Severity};

fn parse(source: &str) -> (CompilationUnit, Diagnostics) {
    let mut diagnostics = Diagnostics::new("Test.java");
    let unit = parser::parse(source, "Test.java", &mut diagnostics);
    (unit, diagnostics)
}

/// `main` 本体の文を解析する
fn parse_body(body: &str) -> (Vec<StatementKind>, Diagnostics) {
    let source = format!(
        "public class T {{\n    public static void main(String[] args) {{\n{}\n    }}\n}}\n",
        body
    );
    let (unit, diagnostics) = parse(&source);
    let statements = unit.type_declarations[0]
        .methods()
        .next()
        .and_then(|m| m.body.clone())
        .map(|b| b.statements.into_iter().map(|s| s.kind).collect())
        .unwrap_or_default();
    (statements, diagnostics)
}

#[test]
fn test_parser_basic_expressions() {
    let mut diagnostics = Diagnostics::new("Test.java");
    let expression = Parser::new("2 + 3 * 4", "Test.java", &mut diagnostics).parse_expression();
    assert!(!diagnostics.has_errors());

    // `+` が根で、右の子が `*`
    let dump = PrettyPrinter::dump_expression(&expression);
    let plus = dump.find("operator=\"+\"").unwrap();
    let times = dump.find("operator=\"*\"").unwrap();
    assert!(plus < times);
    match expression.kind {
        ExpressionKind::Binary { op: BinaryOp::Add, lhs, rhs } => {
            assert!(matches!(lhs.kind, ExpressionKind::Literal(_)));
            assert!(matches!(rhs.kind, ExpressionKind::Binary { op: BinaryOp::Multiply, .. }));
        }
        other => panic!("予期しない根: {:?}", other),
    }
}

#[test]
fn test_parser_shift_and_bitwise_precedence() {
    let mut diagnostics = Diagnostics::new("Test.java");
    let expression = Parser::new("a | b ^ c & d << 1", "Test.java", &mut diagnostics).parse_expression();
    assert!(!diagnostics.has_errors());
    match expression.kind {
        ExpressionKind::Binary { op: BinaryOp::BitOr, rhs, .. } => match rhs.kind {
            ExpressionKind::Binary { op: BinaryOp::BitXor, rhs, .. } => {
                assert!(matches!(rhs.kind, ExpressionKind::Binary { op: BinaryOp::BitAnd, .. }));
            }
            other => panic!("予期しない右辺: {:?}", other),
        },
        other => panic!("予期しない根: {:?}", other),
    }
}

#[test]
fn test_parser_package_imports_and_class_shape() {
    let source = r#"
package shapes;

import java.util.Iterator;

public class Square extends Shape implements Comparable, Cloneable {
    private int side;
    static int count = 0, limit;

    static {
        count = 1;
    }

    public Square(int side) {
        super();
        this.side = side;
    }

    public int area() {
        return side * side;
    }

    public abstract void draw() throws IllegalStateException;
}
"#;
    let (unit, diagnostics) = parse(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.messages());
    assert_eq!(unit.package.as_deref(), Some("shapes"));
    assert_eq!(unit.imports.len(), 1);
    assert_eq!(unit.imports[0].name, "java.util.Iterator");

    let class = &unit.type_declarations[0];
    assert_eq!(class.name, "Square");
    assert_eq!(class.interfaces.len(), 2);
    assert!(class.super_class.is_some());
    assert!(class.has_constructor());

    let fields = class.members.iter().filter(|m| matches!(m, Member::Field(_))).count();
    let initializers = class
        .members
        .iter()
        .filter(|m| matches!(m, Member::Initializer(i) if i.is_static))
        .count();
    assert_eq!(fields, 2);
    assert_eq!(initializers, 1);

    let draw = class.methods().find(|m| m.name == "draw").unwrap();
    assert!(draw.body.is_none());
    assert_eq!(draw.throws.len(), 1);
}

#[test]
fn test_parser_statements() {
    let body = r#"
        int[] xs = {1, 2, 3};
        int sum = 0;
        for (int i = 0; i < xs.length; i++) sum += xs[i];
        for (int x : xs) { sum = sum + x; }
        while (sum > 0) sum--;
        do { sum++; } while (sum < 3);
        if (sum == 3) sum = 0; else { sum = 1; }
        try { sum = 1 / sum; } catch (ArithmeticException e) { sum = -1; } finally { sum++; }
        ;
        return;
    "#;
    let (statements, diagnostics) = parse_body(body);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.messages());
    assert!(matches!(statements[0], StatementKind::LocalVariable { .. }));
    assert!(matches!(statements[2], StatementKind::For { .. }));
    assert!(matches!(statements[3], StatementKind::ForEach { .. }));
    assert!(matches!(statements[4], StatementKind::While { .. }));
    assert!(matches!(statements[5], StatementKind::DoWhile { .. }));
    assert!(matches!(statements[6], StatementKind::If { else_part: Some(_), .. }));
    match &statements[7] {
        StatementKind::Try { catches, finally, .. } => {
            assert_eq!(catches.len(), 1);
            assert!(finally.is_some());
        }
        other => panic!("try 文ではありません: {:?}", other),
    }
    assert!(matches!(statements[8], StatementKind::Empty));
    assert!(matches!(statements[9], StatementKind::Return(None)));
}

#[test]
fn test_parser_try_needs_catch_or_finally() {
    let (_, diagnostics) = parse_body("try { int x = 1; }");
    assert_eq!(diagnostics.count_of(ErrorKind::Syntax), 1);
}

#[test]
fn test_parser_rejects_non_statement_expression() {
    let (_, diagnostics) = parse_body("int x = 1;\nx + 1;");
    assert_eq!(diagnostics.count_of(ErrorKind::Syntax), 1);
    assert_eq!(diagnostics.iter().next().map(|d| d.line), Some(4));
}

#[test]
fn test_parser_repeated_modifier() {
    let (_, diagnostics) = parse("public public class A { }");
    assert_eq!(diagnostics.count_of(ErrorKind::Syntax), 1);
}

#[test]
fn test_parser_lone_semicolon_in_class_body_is_warning() {
    let (unit, diagnostics) = parse("class A { ; int x; }");
    assert!(!diagnostics.has_errors());
    assert_eq!(diagnostics.warning_count(), 1);
    assert_eq!(diagnostics.iter().next().map(|d| d.severity), Some(Severity::Warning));
    assert_eq!(unit.type_declarations[0].members.len(), 1);
}

#[test]
fn test_parser_recovers_after_error() {
    let source = r#"
class A {
    void f() {
        int x = ;
    }

    void g() {
        int y = 3 + ;
    }

    void h() {
        int z = 1;
    }
}
"#;
    let (unit, diagnostics) = parse(source);
    // 同期点ごとに1件ずつ報告され、後続のメソッドも読み取れる
    assert_eq!(diagnostics.error_count(), 2);
    let lines: Vec<_> = diagnostics.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![4, 8]);
    let names: Vec<_> = unit.type_declarations[0].methods().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["f", "g", "h"]);
}

#[test]
fn test_parser_dump_is_structured() {
    let (unit, _) = parse("class A { int f(int n) { return n * 2; } }");
    let dump = PrettyPrinter::dump(&unit);
    assert!(dump.starts_with("<CompilationUnit file=\"Test.java\""));
    assert!(dump.contains("<ClassDeclaration line=\"1\" name=\"A\""));
    assert!(dump.contains("<ReturnStatement line=\"1\">"));
    assert!(dump.trim_end().ends_with("</CompilationUnit>"));
}
