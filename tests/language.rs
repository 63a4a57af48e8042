use dynlisp::error::{BindingError, Error, RuntimeError, SyntaxErrorKind};
use dynlisp::printer::print_to_string;
use dynlisp::reader::read_from_string;
use dynlisp::symbol::{PackageId, SymbolTable};
use dynlisp::{Interpreter, InterpreterConfig, Value};
use pretty_assertions::assert_eq;

fn interp() -> Interpreter {
    Interpreter::new(InterpreterConfig::default())
}

fn eval_print(interp: &mut Interpreter, text: &str) -> String {
    match interp.eval_str(text) {
        Ok(value) => interp.print_value(&value, true),
        Err(e) => panic!("{text}: {}", interp.describe_error(&e)),
    }
}

#[test]
fn read_print_is_idempotent() {
    let symbols = SymbolTable::new();
    for text in [
        "(a b . c)",
        "(1 2.5 -3 \"s\\n\\\"q\\\"\" :key [1 (2)] ())",
        "'(quote x)",
        "`(a ,b ,@c)",
        "123456789012345678901234567890",
        "(p.x q.r.s)",
        "system@car",
    ] {
        let once = read_from_string(text, &symbols, PackageId::USER)
            .unwrap()
            .unwrap();
        let printed = print_to_string(&symbols, &once);
        let twice = read_from_string(&printed, &symbols, PackageId::USER)
            .unwrap()
            .unwrap();
        assert_eq!(print_to_string(&symbols, &twice), printed, "{text}");
    }
}

#[test]
fn if_and_block_results() {
    let mut interp = interp();
    assert_eq!(eval_print(&mut interp, "(if (< 1 2) 'yes 'no)"), "yes");
    assert_eq!(eval_print(&mut interp, "(if null 'yes)"), "null");
    assert_eq!(eval_print(&mut interp, "(if 0 'yes 'no)"), "yes");
    assert_eq!(eval_print(&mut interp, "(block)"), "null");
    assert_eq!(eval_print(&mut interp, "(block (+ 1 1))"), "2");
    assert_eq!(eval_print(&mut interp, "(block 1 2 (+ 1 2))"), "3");
}

#[test]
fn fast_and_general_binding_paths_agree() {
    let mut interp = interp();
    interp
        .eval_str(
            "(def fast (lambda (a b) (list a b)))
             (def general (lambda (a &optional (b 99)) (list a b)))",
        )
        .unwrap();

    let before = interp.counters.clone();
    let fast = eval_print(&mut interp, "(fast 1 2)");
    let after_fast = interp.counters.clone();
    let general = eval_print(&mut interp, "(general 1 2)");
    let after_general = interp.counters.clone();

    assert_eq!(fast, general);
    assert_eq!(after_fast.fast_path_calls, before.fast_path_calls + 1);
    assert_eq!(after_fast.general_path_calls, before.general_path_calls);
    assert_eq!(after_general.general_path_calls, after_fast.general_path_calls + 1);
    assert_eq!(eval_print(&mut interp, "(general 1)"), "(1 99)");
}

#[test]
fn rest_and_keyword_arguments() {
    let mut interp = interp();
    interp
        .eval_str("(defun opts (&key (width 10) height) (list width height))")
        .unwrap();
    assert_eq!(eval_print(&mut interp, "(opts)"), "(10 null)");
    assert_eq!(eval_print(&mut interp, "(opts :height 3)"), "(10 3)");
    assert_eq!(eval_print(&mut interp, "(opts :height 3 :width 4)"), "(4 3)");
    let err = interp.eval_str("(opts :height)").unwrap_err();
    assert!(matches!(err.root(), Error::Runtime(RuntimeError::UnpairedKeyword(_))));

    interp.eval_str("(defun gather (first &rest more) more)").unwrap();
    assert_eq!(eval_print(&mut interp, "(gather 1 2 3)"), "(2 3)");
    assert_eq!(eval_print(&mut interp, "(gather 1)"), "null");
}

#[test]
fn dynamic_binding_is_visible_in_callees_and_restored() {
    let mut interp = interp();
    interp
        .eval_str("(def *depth* 0) (defun current-depth () *depth*)")
        .unwrap();
    assert_eq!(eval_print(&mut interp, "(dynamic-let ((*depth* 5)) (current-depth))"), "5");
    assert_eq!(eval_print(&mut interp, "(current-depth)"), "0");

    let err = interp
        .eval_str("(dynamic-let ((*depth* 7)) (current-depth) (error \"boom\"))")
        .unwrap_err();
    assert!(matches!(err.root(), Error::Runtime(RuntimeError::User(_))));
    assert_eq!(eval_print(&mut interp, "(current-depth)"), "0");

    assert_eq!(
        eval_print(
            &mut interp,
            "(dynamic-let ((*depth* 1)) (set! *depth* 2) (current-depth))"
        ),
        "2"
    );
    assert_eq!(eval_print(&mut interp, "*depth*"), "0");

    // a variable with no global value is unbound again afterwards
    interp.eval_str("(defun peek-fresh () *fresh*)").unwrap();
    assert_eq!(
        eval_print(&mut interp, "(dynamic-let ((*fresh* 1)) (set! *fresh* 2) (peek-fresh))"),
        "2"
    );
    let err = interp.eval_str("(peek-fresh)").unwrap_err();
    assert!(matches!(err.root(), Error::Binding(BindingError::Unbound(name)) if name == "*fresh*"));

    let err = interp
        .eval_str("(dynamic-let ((*fresh* 3)) (error \"fail ~a\" (peek-fresh)))")
        .unwrap_err();
    assert!(matches!(err.root(), Error::Runtime(RuntimeError::User(m)) if m == "fail 3"));
    let err = interp.eval_str("*fresh*").unwrap_err();
    assert!(matches!(err.root(), Error::Binding(BindingError::Unbound(_))));
}

#[test]
fn backtrace_has_one_frame_per_call_with_lines() {
    let mut interp = interp();
    let source = "(defun inner (x) (car x))\n\
                  (defun middle (x) (inner x))\n\
                  (defun outer (x) (middle x))\n\
                  (outer 5)";
    let err = interp.eval_str(source).unwrap_err();
    assert!(matches!(err.root(), Error::Runtime(RuntimeError::Type { .. })));

    let frames = err.frames();
    let summary: Vec<(String, u32)> = frames
        .iter()
        .map(|f| (f.callable.clone(), f.loc.as_ref().map_or(0, |l| l.line)))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("inner".to_string(), 2),
            ("middle".to_string(), 3),
            ("outer".to_string(), 4),
        ]
    );
    assert!(matches!(frames[2].args[0], Value::Int(5)));

    let report = interp.describe_error(&err);
    assert!(report.contains("in (outer 5) at <eval>:4"), "{report}");
}

#[test]
fn prelude_macros() {
    let mut interp = interp();
    interp
        .eval_str("(defun fact (n) (if (<= n 1) 1 (* n (fact (- n 1)))))")
        .unwrap();
    assert_eq!(eval_print(&mut interp, "(fact 20)"), "2432902008176640000");
    assert_eq!(
        eval_print(&mut interp, "(fact 25)"),
        "15511210043330985984000000"
    );
    assert_eq!(eval_print(&mut interp, "(cond ((= 1 2) 'a) (true 'b))"), "b");
    assert_eq!(eval_print(&mut interp, "(cond (false 'a))"), "null");
    assert_eq!(
        eval_print(&mut interp, "(let* ((a 1) (b (+ a 1))) (list a b))"),
        "(1 2)"
    );
    assert_eq!(eval_print(&mut interp, "(def n 0) (inc! n) (inc! n 5) n"), "6");
    assert_eq!(eval_print(&mut interp, "(when true 1 2)"), "2");
    assert_eq!(eval_print(&mut interp, "(unless true 1)"), "null");
}

#[test]
fn while_loops_and_local_assignment() {
    let mut interp = interp();
    assert_eq!(
        eval_print(
            &mut interp,
            "(let ((i 0) (acc 0))
               (while (< i 5)
                 (set! acc (+ acc i))
                 (inc! i))
               acc)"
        ),
        "10"
    );
}

#[test]
fn macros_see_unevaluated_arguments() {
    let mut interp = interp();
    interp
        .eval_str("(defmacro swap! (a b) (let ((tmp (gensym))) `(let ((,tmp ,a)) (set! ,a ,b) (set! ,b ,tmp))))")
        .unwrap();
    assert_eq!(
        eval_print(&mut interp, "(def x 1) (def y 2) (swap! x y) (list x y)"),
        "(2 1)"
    );
    assert!(interp.counters.macro_expansions > 0);
}

#[test]
fn binding_errors() {
    let mut interp = interp();
    let err = interp.eval_str("undefined-thing").unwrap_err();
    assert!(matches!(err.root(), Error::Binding(BindingError::Unbound(name)) if name == "undefined-thing"));

    let err = interp.eval_str("(set! :k 1)").unwrap_err();
    assert!(matches!(err.root(), Error::Binding(BindingError::KeywordAssignment(_))));

    let err = interp.eval_str("(def null 1)").unwrap_err();
    assert!(matches!(err.root(), Error::Binding(BindingError::ConstantAssignment(_))));

    assert_eq!(eval_print(&mut interp, ":k"), ":k");
}

#[test]
fn syntax_errors_carry_lines() {
    let mut interp = interp();
    match interp.eval_str("(+ 1 2)\n(list 1))") {
        Err(Error::Syntax(e)) => {
            assert_eq!(e.kind, SyntaxErrorKind::UnmatchedDelimiter(')'));
            assert_eq!(e.loc.line, 2);
        }
        other => panic!("expected syntax error, got {other:?}"),
    }
    match interp.eval_str("(list 1\n 2") {
        Err(Error::Syntax(e)) => assert!(e.is_eof()),
        other => panic!("expected end of input, got {other:?}"),
    }
}

#[test]
fn packages_and_qualified_symbols() {
    let mut interp = interp();
    interp
        .eval_str(
            "(make-package \"geometry\")
             (in-package \"geometry\")
             (def area 42)
             (def hidden 7)
             (export 'area)
             (in-package \"user\")",
        )
        .unwrap();
    assert_eq!(eval_print(&mut interp, "geometry@area"), "42");
    assert_eq!(eval_print(&mut interp, "geometry@hidden"), "7");
    assert_eq!(eval_print(&mut interp, "'geometry@hidden"), "geometry@hidden");

    interp.eval_str("(use-package \"geometry\")").unwrap();
    assert_eq!(eval_print(&mut interp, "area"), "42");
    assert_eq!(eval_print(&mut interp, "(symbol-package 'area)"), "\"geometry\"");
    assert_eq!(eval_print(&mut interp, "(find-symbol \"area\")"), "area");
    assert!(interp.eval_str("(in-package \"nowhere\")").is_err());
}

#[test]
fn load_file_reports_file_and_line() {
    let mut interp = interp();
    let path = std::env::temp_dir().join(format!("dynlisp-load-{}.lisp", std::process::id()));
    std::fs::write(&path, "(def loaded 1)\n(defun broken () (car 1))\n(broken)\n").unwrap();

    let err = interp.load_file(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();

    let frame = &err.frames()[0];
    let loc = frame.loc.as_ref().unwrap();
    assert_eq!(loc.line, 3);
    assert!(loc.file.contains("dynlisp-load"));
    assert_eq!(eval_print(&mut interp, "loaded"), "1");

    // errors outside any call still point at their top-level form
    let path = std::env::temp_dir().join(format!("dynlisp-toplevel-{}.lisp", std::process::id()));
    std::fs::write(&path, "(def again 1)\n(car 1)\n").unwrap();
    let err = interp.load_file(&path).unwrap_err();
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(err.root(), Error::Runtime(RuntimeError::Type { .. })));
    assert_eq!(err.frames().len(), 1);
    let loc = err.frames()[0].loc.as_ref().unwrap();
    assert_eq!(loc.line, 2);
    assert!(loc.file.contains("dynlisp-toplevel"));
    let report = interp.describe_error(&err);
    assert!(report.contains("in (car 1) at "), "{report}");

    let err = interp.eval_str("(def x 1)\n\nundefined-thing").unwrap_err();
    assert_eq!(err.frames()[0].loc.as_ref().map(|l| l.line), Some(3));

    let missing = interp.load_file("/definitely/not/here.lisp").unwrap_err();
    assert!(matches!(missing.root(), Error::Runtime(RuntimeError::Io(_))));
}

#[test]
fn long_lists_are_compared_and_released() {
    let mut interp = interp();
    interp
        .eval_str(
            "(defun build (n)
               (let ((acc null))
                 (while (> n 0)
                   (set! acc (cons n acc))
                   (set! n (- n 1)))
                 acc))
             (def a (build 300000))
             (def b (build 300000))",
        )
        .unwrap();
    assert_eq!(eval_print(&mut interp, "(equal? a b)"), "true");
    assert_eq!(eval_print(&mut interp, "(= a b)"), "true");
    assert_eq!(eval_print(&mut interp, "(equal? a (cdr b))"), "false");
    assert_eq!(eval_print(&mut interp, "(length a)"), "300000");
    interp.eval_str("(def a null) (def b null)").unwrap();
    assert_eq!(eval_print(&mut interp, "a"), "null");
}
