use jminusminus_compiler::backend::{Instruction, Machine, MachineError, Value};
use jminusminus_compiler::{ClassFile, Compiler, CompilerConfig};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// ソースをコンパイルしてクラスを返す。エラーがあれば診断を表示して失敗する。
fn compile(source: &str) -> Vec<ClassFile> {
    init_logger();
    let compilation = Compiler::new(CompilerConfig::default())
        .compile(source, "Test.java")
        .unwrap();
    let messages: Vec<String> = compilation.diagnostics.iter().map(|d| d.to_string()).collect();
    match compilation.into_result() {
        Ok(classes) => classes,
        Err(err) => panic!("{}: {:#?}", err, messages),
    }
}

/// `main` を実行して標準出力を返す
fn run(source: &str, class: &str) -> String {
    let classes = compile(source);
    let mut machine = Machine::new(&classes);
    if let Err(err) = machine.run_main(class) {
        panic!("{} (出力: {:?})", err, machine.output());
    }
    machine.take_output()
}

/// `main` 本体だけを書いて実行する
fn run_body(body: &str) -> String {
    let source = format!(
        "public class Main {{\n    public static void main(String[] args) throws Exception {{\n{}\n    }}\n}}\n",
        body
    );
    run(&source, "Main")
}

#[test]
fn test_for_loop_sums() {
    let source = r#"
public class Loops {
    public static int sum(int n) {
        int sum = 0;
        for (int i = 0; i < n; i++) sum += i;
        return sum;
    }
}
"#;
    let classes = compile(source);
    let mut machine = Machine::new(&classes);
    for n in [0, 1, 5] {
        let result = machine
            .invoke_static("Loops", "sum", "(I)I", vec![Value::Int(n)])
            .unwrap();
        assert_eq!(result, Some(Value::Int(n * (n - 1) / 2)), "N = {}", n);
    }
}

#[test]
fn test_for_each_matches_index_loop() {
    let output = run_body(
        r#"
        int[] xs = {1, 2, 3};
        int sum = 0;
        for (int x : xs) {
            sum += x;
            System.out.print(x);
        }
        System.out.println();
        int indexed = 0;
        for (int i = 0; i < xs.length; i++) indexed += xs[i];
        System.out.println(sum);
        System.out.println(sum == indexed);
    "#,
    );
    assert_eq!(output, "123\n6\ntrue\n");
}

#[test]
fn test_try_catch_finally_order() {
    let output = run_body(
        r#"
        try {
            System.out.println("try");
            if (args.length == 0) throw new IllegalStateException("boom");
            System.out.println("unreachable");
        } catch (IllegalStateException e) {
            System.out.println("catch " + e.getMessage());
        } finally {
            System.out.println("finally");
        }
        try {
            System.out.println("try");
        } catch (RuntimeException e) {
            System.out.println("catch");
        } finally {
            System.out.println("finally");
        }
    "#,
    );
    assert_eq!(output, "try\ncatch boom\nfinally\ntry\nfinally\n");
}

#[test]
fn test_finally_runs_on_return_and_rethrow() {
    let source = r#"
public class F {
    static int early() {
        try {
            return 1;
        } finally {
            System.out.println("cleanup");
        }
    }

    static void escape() throws RuntimeException {
        try {
            throw new RuntimeException("out");
        } finally {
            System.out.println("cleanup");
        }
    }

    public static void main(String[] args) {
        System.out.println(early());
        try {
            escape();
        } catch (RuntimeException e) {
            System.out.println("caught " + e.getMessage());
        }
    }
}
"#;
    assert_eq!(run(source, "F"), "cleanup\n1\ncleanup\ncaught out\n");
}

#[test]
fn test_operator_precedence() {
    assert_eq!(run_body("System.out.println(2 + 3 * 4);"), "14\n");
    assert_eq!(run_body("System.out.println((2 + 3) * 4);"), "20\n");
    assert_eq!(run_body("System.out.println(10 - 4 - 3);"), "3\n");
}

#[test]
fn test_bitwise_and_shift_operators() {
    let output = run_body(
        r#"
        System.out.println(5 & 3);
        System.out.println(5 | 3);
        System.out.println(5 ^ 3);
        System.out.println(5 << 1);
        System.out.println(5 >> 1);
        System.out.println(~5);
        System.out.println(-16 >>> 28);
    "#,
    );
    assert_eq!(output, "1\n7\n6\n10\n2\n-6\n15\n");
}

#[test]
fn test_compound_assignments_and_increments() {
    let output = run_body(
        r#"
        int x = 10;
        x += 5; x -= 3; x *= 2; x /= 4; x %= 4;
        System.out.println(x);
        int y = 1;
        y <<= 4; y >>= 1; y |= 1; y &= 13; y ^= 3;
        System.out.println(y);
        int i = 5;
        int a = i++;
        int b = ++i;
        int c = i--;
        System.out.println(a + " " + b + " " + c + " " + i);
        int[] arr = new int[2];
        arr[1] += 7;
        arr[1]++;
        System.out.println(arr[1]);
    "#,
    );
    assert_eq!(output, "2\n10\n5 7 7 6\n8\n");
}

#[test]
fn test_logical_operators_short_circuit() {
    let source = r#"
public class L {
    static int calls = 0;

    static boolean touch(boolean value) {
        calls++;
        return value;
    }

    public static void main(String[] args) {
        boolean a = touch(false) && touch(true);
        boolean b = touch(true) || touch(false);
        boolean c = !a && b;
        System.out.println(a + " " + b + " " + c + " " + calls);
        System.out.println(calls > 1 ? "many" : "few");
    }
}
"#;
    assert_eq!(run(source, "L"), "false true true 2\nmany\n");
}

#[test]
fn test_string_concatenation() {
    let output = run_body(
        r#"
        String s = "a" + 1 + 'c' + true + 2L + null;
        System.out.println(s);
        s += 5;
        s += "!";
        System.out.println(s);
        System.out.println(1 + 2 + "x");
        System.out.println(s.length());
    "#,
    );
    assert_eq!(output, "a1ctrue2null\na1ctrue2null5!\n3x\n14\n");
}

#[test]
fn test_long_and_double_arithmetic() {
    let output = run_body(
        r#"
        long big = 3000000000L;
        big = big * 2L;
        System.out.println(big);
        double d = 1.5;
        d = d * 4.0;
        System.out.println(d);
        System.out.println((int) 7.9);
        System.out.println((double) 3);
        System.out.println(big > 5L);
        System.out.println((char) 65);
    "#,
    );
    assert_eq!(output, "6000000000\n6.0\n7\n3.0\ntrue\nA\n");
}

#[test]
fn test_while_and_do_while() {
    let output = run_body(
        r#"
        int n = 0;
        while (n < 3) {
            System.out.print(n);
            n++;
        }
        do {
            System.out.print(n);
            n--;
        } while (n > 10);
        System.out.println();
    "#,
    );
    assert_eq!(output, "0123\n");
}

#[test]
fn test_classes_fields_and_dispatch() {
    let source = r#"
abstract class Animal {
    protected String name;
    private static int created = 0;

    Animal(String name) {
        this.name = name;
        created++;
    }

    abstract String sound();

    String describe() {
        return name + " says " + sound();
    }

    static int count() {
        return created;
    }
}

class Dog extends Animal {
    private int tricks = 2;

    Dog(String name) {
        super(name);
    }

    Dog() {
        this("Rex");
        tricks = tricks + 1;
    }

    String sound() {
        return "woof";
    }

    String describe() {
        return super.describe() + " (" + tricks + " tricks)";
    }
}

public class Zoo {
    public static void main(String[] args) {
        Animal a = new Dog();
        Animal b = new Dog("Fido");
        System.out.println(a.describe());
        System.out.println(b.describe());
        System.out.println(Animal.count());
        System.out.println(a instanceof Dog);
        Object o = b;
        Dog d = (Dog) o;
        System.out.println(d.sound());
    }
}
"#;
    assert_eq!(
        run(source, "Zoo"),
        "Rex says woof (3 tricks)\nFido says woof (2 tricks)\n2\ntrue\nwoof\n"
    );
}

#[test]
fn test_static_initializers() {
    let source = r#"
public class S {
    static int[] table = new int[4];
    static int seed;

    static {
        for (int i = 0; i < table.length; i++) table[i] = i * i;
        seed = table[3];
    }

    public static void main(String[] args) {
        System.out.println(seed + table[2]);
    }
}
"#;
    assert_eq!(run(source, "S"), "13\n");
}

#[test]
fn test_arrays() {
    let output = run_body(
        r#"
        int[][] grid = new int[3][4];
        grid[2][3] = 9;
        System.out.println(grid.length + " " + grid[0].length + " " + grid[2][3]);
        String[] words = {"x", "y"};
        words[0] = words[1] + words[0];
        System.out.println(words[0]);
        char[] cs = new char[]{'h', 'i'};
        System.out.println(cs[0] + "" + cs[1]);
        int[][] rows = {{1}, {2, 3}};
        System.out.println(rows[1][1]);
    "#,
    );
    assert_eq!(output, "3 4 9\nyx\nhi\n3\n");
}

#[test]
fn test_iterable_for_each() {
    let source = r#"
import java.util.Iterator;

class Cell {
    int value;
    Cell(int value) { this.value = value; }
}

class Countdown implements Iterator {
    private int current;
    Countdown(int from) { current = from; }
    public boolean hasNext() { return current > 0; }
    public Object next() { current--; return new Cell(current + 1); }
}

class Range implements Iterable {
    private int size;
    Range(int size) { this.size = size; }
    public Iterator iterator() { return new Countdown(size); }
}

public class It {
    public static void main(String[] args) {
        int total = 0;
        for (Cell c : new Range(4)) {
            total = total * 10 + c.value;
        }
        System.out.println(total);
    }
}
"#;
    assert_eq!(run(source, "It"), "4321\n");
}

#[test]
fn test_runtime_exceptions() {
    let output = run_body(
        r#"
        int zero = 0;
        try {
            System.out.println(1 / zero);
        } catch (ArithmeticException e) {
            System.out.println(e.getMessage());
        }
        int[] xs = new int[1];
        try {
            xs[3] = 1;
        } catch (ArrayIndexOutOfBoundsException e) {
            System.out.println("bounds");
        }
        Object o = "text";
        try {
            int[] ys = (int[]) o;
        } catch (ClassCastException e) {
            System.out.println("cast");
        }
    "#,
    );
    assert_eq!(output, "/ by zero\nbounds\ncast\n");
}

#[test]
fn test_catch_order_picks_first_matching_handler() {
    let output = run_body(
        r#"
        try {
            throw new IllegalArgumentException("bad");
        } catch (IllegalStateException e) {
            System.out.println("state");
        } catch (RuntimeException e) {
            System.out.println("runtime " + e.getMessage());
        } catch (Exception e) {
            System.out.println("exception");
        }
    "#,
    );
    assert_eq!(output, "runtime bad\n");
}

#[test]
fn test_user_exception_and_uncaught_error() {
    let source = r#"
class Problem extends RuntimeException {
    Problem(String message) { super(message); }
}

public class U {
    public static void main(String[] args) throws Problem {
        System.out.println("before");
        throw new Problem("fatal");
    }
}
"#;
    let classes = compile(source);
    let mut machine = Machine::new(&classes);
    let err = machine.run_main("U").unwrap_err();
    assert_eq!(machine.output(), "before\n");
    assert_eq!(
        err,
        MachineError::UncaughtException {
            class: "Problem".to_string(),
            message: Some("fatal".to_string()),
        }
    );
}

#[test]
fn test_recursion_and_builtins() {
    let source = r#"
public class R {
    static int fib(int n) {
        return n < 2 ? n : fib(n - 1) + fib(n - 2);
    }

    public static void main(String[] args) {
        System.out.println(fib(15));
        System.out.println(Math.max(3, Math.abs(-7)));
        System.out.println(Integer.parseInt("41") + 1);
        String s = "hello";
        System.out.println(s.charAt(1));
        System.out.println(s.substring(1, 3).equals("el"));
    }
}
"#;
    assert_eq!(run(source, "R"), "610\n7\n42\ne\ntrue\n");
}

#[test]
fn test_increment_of_int_local_uses_iinc() {
    let classes = compile(
        "public class I { static int f(int n) { n++; n += 3; return n; } }",
    );
    let method = classes[0].method("f", "(I)I").unwrap();
    assert!(method.code.iter().any(|i| matches!(i, Instruction::Iinc(0, 1))));
    let mut machine = Machine::new(&classes);
    let result = machine.invoke_static("I", "f", "(I)I", vec![Value::Int(1)]).unwrap();
    assert_eq!(result, Some(Value::Int(5)));
}

#[test]
fn test_listing_names_methods() {
    let classes = compile("public class P { int x; void f() { x = 1; } }");
    let listing = classes[0].listing();
    assert!(listing.contains("<init>"));
    assert!(listing.contains("putfield"));
}
