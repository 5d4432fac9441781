use jminusminus_compiler::ast::{AnalysisState, CompilationUnit, PrettyPrinter};
use jminusminus_compiler::frontend::semantic::{Analyzer, ContextTree};
use jminusminus_compiler::parser;
use jminusminus_compiler::{CompilerError, Diagnostics, ErrorKind};

/// 構文解析と意味解析を行い、解析結果・診断・コンテキスト木を返す
fn analyze(source: &str) -> (CompilationUnit, Diagnostics, ContextTree) {
    let mut diagnostics = Diagnostics::new("Test.java");
    let mut unit = parser::parse(source, "Test.java", &mut diagnostics);
    assert!(!diagnostics.has_errors(), "構文エラー: {:?}", diagnostics.messages());
    let mut analyzer = Analyzer::new(&mut diagnostics);
    analyzer.analyze(&mut unit).unwrap();
    let (_, contexts) = analyzer.into_parts();
    (unit, diagnostics, contexts)
}

/// `main` 本体として解析し、意味エラーの件数を返す
fn semantic_errors(body: &str) -> usize {
    let source = format!(
        "public class T {{\n    public static void main(String[] args) {{\n{}\n    }}\n}}\n",
        body
    );
    let (_, diagnostics, _) = analyze(&source);
    diagnostics.count_of(ErrorKind::Semantic)
}

#[test]
fn test_basic_type_checking() {
    let source = r#"
public class Counter {
    private int count;
    private String label = "n";

    public Counter(int start) {
        count = start;
    }

    public int next() {
        count++;
        return count;
    }

    public String describe() {
        return label + "=" + count;
    }

    public static void main(String[] args) {
        Counter c = new Counter(3);
        int n = c.next() * 2;
        char ch = 'a';
        int code = ch + 1;
        boolean big = n > 5 && code != 0;
        System.out.println(c.describe());
    }
}
"#;
    let (unit, diagnostics, _) = analyze(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.messages());
    assert_eq!(unit.state, AnalysisState::Analyzed);

    let dump = PrettyPrinter::dump(&unit);
    assert!(dump.contains("type=\"int\""));
    assert!(dump.contains("type=\"java.lang.String\""));
}

#[test]
fn test_type_mismatch_is_reported() {
    assert_eq!(semantic_errors("int x = true;"), 1);
    assert_eq!(semantic_errors("boolean b = 1;"), 1);
    assert_eq!(semantic_errors("String s = 'c';"), 1);
    assert_eq!(semantic_errors("int i = 'c';"), 0);
}

#[test]
fn test_numeric_operands_must_match() {
    assert_eq!(semantic_errors("int a = 1; long b = 2L; long c = a + b;"), 1);
    assert_eq!(semantic_errors("double d = 1.5; double e = d * 2.0;"), 0);
    assert_eq!(semantic_errors("String s = \"a\" + 1 + 'c' + true;"), 0);
}

#[test]
fn test_undefined_name() {
    assert_eq!(semantic_errors("int x = y + 1;"), 1);
    assert_eq!(semantic_errors("Missing m = null;"), 1);
}

#[test]
fn test_shadowing_reported_once_and_first_binding_kept() {
    let body = r#"
        int x = 1;
        {
            String x = "a";
            x = 3;
        }
    "#;
    // 内側の宣言は拒否され、x は外側の int のまま
    assert_eq!(semantic_errors(body), 1);
}

#[test]
fn test_sibling_blocks_may_reuse_names() {
    assert_eq!(semantic_errors("{ int x = 1; } { int x = 2; }"), 0);
}

#[test]
fn test_redeclaration_in_same_scope() {
    assert_eq!(semantic_errors("int x = 1; int x = 2;"), 1);
}

#[test]
fn test_definite_assignment() {
    assert_eq!(semantic_errors("int x; int y = x;"), 1);
    assert_eq!(semantic_errors("int x; x = 2; int y = x;"), 0);
}

#[test]
fn test_scopes_are_balanced_even_with_errors() {
    let source = r#"
class A {
    void f(int n) {
        for (int i = 0; i < n; i++) {
            if (i > 2) { undefined(); } else { int j = true; }
        }
        try { n = 1; } catch (RuntimeException e) { n = 2; } finally { n = 3; }
        int[] xs = {1, 2};
        for (int x : xs) { while (x > 0) { x--; } }
    }
}
"#;
    let (_, diagnostics, contexts) = analyze(source);
    assert!(diagnostics.has_errors());
    assert!(contexts.is_balanced());
    assert_eq!(contexts.open_count(), contexts.close_count());
}

#[test]
fn test_double_analysis_is_rejected() {
    let source = "class A { int f() { return 1 + 2; } }";
    let mut diagnostics = Diagnostics::new("Test.java");
    let mut unit = parser::parse(source, "Test.java", &mut diagnostics);
    let mut analyzer = Analyzer::new(&mut diagnostics);
    analyzer.analyze(&mut unit).unwrap();
    let before = PrettyPrinter::dump(&unit);

    let result = analyzer.analyze(&mut unit);
    assert!(matches!(result, Err(CompilerError::AlreadyAnalyzed)));
    assert_eq!(PrettyPrinter::dump(&unit), before);
    assert!(matches!(analyzer.pre_analyze(&mut unit), Err(CompilerError::AlreadyAnalyzed)));
}

#[test]
fn test_for_each_is_desugared() {
    let source = r#"
class A {
    int sum(int[] xs) {
        int total = 0;
        for (int x : xs) total += x;
        return total;
    }
}
"#;
    let (unit, diagnostics, _) = analyze(source);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.messages());
    let dump = PrettyPrinter::dump(&unit);
    assert!(!dump.contains("ForEachStatement"));
    assert!(dump.contains("ForStatement"));
}

#[test]
fn test_for_each_requires_array_or_iterable() {
    assert_eq!(semantic_errors("int n = 3; for (int x : n) { }"), 1);
}

#[test]
fn test_thrown_types_must_be_declared() {
    let runtime = "class A { static void f() { throw new RuntimeException(\"x\"); } }";
    let null_pointer = "class A { static void f() { throw new NullPointerException(); } }";
    let checked = "class A { void f() { throw new Exception(\"x\"); } }";
    let caught = "class A { void f() { try { throw new Exception(\"x\"); } catch (Exception e) { } } }";
    for source in [runtime, null_pointer, checked, caught] {
        let (_, diags, _) = analyze(source);
        assert_eq!(diags.error_count(), 1, "{}", source);
        assert!(diags.messages()[0].contains("throws"));
    }

    let declared = "class A { void f() throws Exception { throw new Exception(\"x\"); } }";
    let supertype = "class A { void f() throws RuntimeException { throw new NullPointerException(); } }";
    let sibling = "class A { void f() throws ArithmeticException { throw new IllegalStateException(); } }";
    assert_eq!(analyze(declared).1.error_count(), 0);
    assert_eq!(analyze(supertype).1.error_count(), 0);
    assert_eq!(analyze(sibling).1.error_count(), 1);
}

#[test]
fn test_instanceof_requires_reference_types() {
    assert_eq!(semantic_errors("int x = 1; boolean b = x instanceof Object;"), 1);
    assert_eq!(semantic_errors("Object o = null; boolean b = o instanceof int;"), 1);
    assert_eq!(semantic_errors("Object o = \"s\"; boolean b = o instanceof String;"), 0);
}

#[test]
fn test_throw_and_catch_require_throwables() {
    assert_eq!(semantic_errors("throw \"oops\";"), 1);
    assert_eq!(semantic_errors("try { } catch (String s) { }"), 1);
}

#[test]
fn test_unimplemented_interface_method() {
    let concrete = "class Bag implements Iterable { }";
    let abstract_class = "abstract class Bag implements Iterable { }";
    assert_eq!(analyze(concrete).1.error_count(), 1);
    assert_eq!(analyze(abstract_class).1.error_count(), 0);
}

#[test]
fn test_instance_member_from_static_context() {
    let source = r#"
class A {
    int value;
    int get() { return value; }
    static int f() { return value + get(); }
}
"#;
    assert_eq!(analyze(source).1.count_of(ErrorKind::Semantic), 2);
}

#[test]
fn test_method_resolution() {
    let source = r#"
class A {
    int twice(int n) { return n * 2; }
    String twice(String s) { return s + s; }
    void use() {
        int a = twice(2);
        String b = twice("x");
        int c = twice(true);
    }
}
"#;
    assert_eq!(analyze(source).1.count_of(ErrorKind::Semantic), 1);
}

#[test]
fn test_nested_type_is_unsupported() {
    let source = "class Outer { class Inner { } }";
    let (_, diagnostics, _) = analyze(source);
    assert_eq!(diagnostics.count_of(ErrorKind::Unsupported), 1);
}
