use dynlisp::error::{DispatchError, Error, RuntimeError};
use dynlisp::{Interpreter, InterpreterConfig};
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
fn mixed_arithmetic() {
    let mut interp = interp();
    for (text, expected) in [
        ("(+)", "0"),
        ("(*)", "1"),
        ("(+ 1 2 3)", "6"),
        ("(- 5)", "-5"),
        ("(- 10 1 2)", "7"),
        ("(+ 1 2.5)", "3.5"),
        ("(* 2 0.25)", "0.5"),
        ("(/ 6 3)", "2"),
        ("(/ 1 2)", "0.5"),
        ("(/ 2)", "0.5"),
        ("(mod 7 3)", "1"),
        ("(mod -7 3)", "2"),
        ("(mod 7 -3)", "-2"),
        ("(+ \"ab\" \"cd\")", "\"abcd\""),
        ("(bit-and 12 10)", "8"),
        ("(bit-or 12 10)", "14"),
        ("(bit-xor 12 10)", "6"),
        ("(shl 1 4)", "16"),
        ("(shr 256 4)", "16"),
    ] {
        assert_eq!(eval_print(&mut interp, text), expected, "{text}");
    }
}

#[test]
fn integers_promote_and_demote() {
    let mut interp = interp();
    assert_eq!(
        eval_print(&mut interp, "(* 4611686018427387904 4)"),
        "18446744073709551616"
    );
    assert_eq!(
        eval_print(&mut interp, "(+ 9223372036854775807 1)"),
        "9223372036854775808"
    );
    assert_eq!(
        eval_print(&mut interp, "(- (* 4611686018427387904 4) 18446744073709551615)"),
        "1"
    );
    assert_eq!(eval_print(&mut interp, "(integer? (shl 1 100))"), "true");
    assert_eq!(eval_print(&mut interp, "(shr (shl 1 100) 99)"), "2");
    assert_eq!(
        eval_print(&mut interp, "(/ (* 4611686018427387904 4) 4)"),
        "4611686018427387904"
    );
}

#[test]
fn chained_comparisons() {
    let mut interp = interp();
    for (text, expected) in [
        ("(< 1 2 3)", "true"),
        ("(< 1 3 2)", "false"),
        ("(<= 1 1 2)", "true"),
        ("(> 3 2.5 1)", "true"),
        ("(>= 1 2)", "false"),
        ("(= 1 1.0)", "true"),
        ("(= 2 2 2)", "true"),
        ("(< \"apple\" \"banana\")", "true"),
        ("(= \"a\" \"a\")", "true"),
        ("(= '(1 2) '(1 2))", "true"),
        ("(= 'a 'b)", "false"),
        ("(< 5)", "true"),
    ] {
        assert_eq!(eval_print(&mut interp, text), expected, "{text}");
    }
}

#[test]
fn nan_is_unordered() {
    let mut interp = interp();
    interp.eval_str("(def nan (/ 0.0 0.0))").unwrap();
    for text in ["(< nan 1)", "(> nan 1)", "(<= nan 1)", "(>= 1 nan)", "(= nan nan)", "(< 0 nan 2)"] {
        assert_eq!(eval_print(&mut interp, text), "false", "{text}");
    }
}

#[test]
fn oversized_shifts_are_rejected() {
    let mut interp = interp();
    let err = interp.eval_str("(shl 1 (shl 1 40))").unwrap_err();
    assert!(matches!(
        err.root(),
        Error::Runtime(RuntimeError::ShiftTooLarge { .. })
    ));
    assert_eq!(eval_print(&mut interp, "(shr (shl 1 4096) 4095)"), "2");
}

#[test]
fn division_by_zero() {
    let mut interp = interp();
    for text in ["(/ 1 0)", "(mod 1 0)", "(mod 1.5 0)"] {
        let err = interp.eval_str(text).unwrap_err();
        assert!(
            matches!(err.root(), Error::Runtime(RuntimeError::DivisionByZero)),
            "{text}"
        );
    }
}

#[test]
fn no_applicable_method_names_the_operator() {
    let mut interp = interp();
    let err = interp.eval_str("(+ 1 \"a\")").unwrap_err();
    match err.root() {
        Error::Dispatch(DispatchError::NoApplicableMethod { operator, args }) => {
            assert_eq!(operator, "+");
            assert_eq!(args, "(1 \"a\")");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("'+'"));
    assert!(interp.eval_str("(bit-and 1 2.0)").is_err());
    assert!(interp.eval_str("(< 1 \"a\")").is_err());
}

#[test]
fn repeated_dispatch_hits_the_cache() {
    let mut interp = interp();
    interp.eval_str("(+ 3 4)").unwrap();
    let scans = interp.counters.operator_scans;
    let hits = interp.counters.operator_cache_hits;

    assert_eq!(eval_print(&mut interp, "(+ 3 4)"), "7");
    assert_eq!(interp.counters.operator_scans, scans);
    assert_eq!(interp.counters.operator_cache_hits, hits + 1);

    interp.eval_str("(+ 1.5 2)").unwrap();
    assert_eq!(interp.counters.operator_scans, scans + 1);
}

#[test]
fn user_methods_extend_operators() {
    let mut interp = interp();
    interp
        .eval_str(
            "(defclass Vec2 () ((x 0) (y 0)))
             (add-operator-method + :instance :instance
               (lambda (a b) (new Vec2 :x (+ a.x b.x) :y (+ a.y b.y))))
             (add-operator-method * :instance :number
               (lambda (v k) (new Vec2 :x (* v.x k) :y (* v.y k))))
             (def v (+ (new Vec2 :x 1 :y 2) (new Vec2 :x 10 :y 20) (new Vec2 :x 100)))",
        )
        .unwrap();
    assert_eq!(eval_print(&mut interp, "(list v.x v.y)"), "(111 22)");
    assert_eq!(eval_print(&mut interp, "(.x (* v 2))"), "222");
    assert_eq!(eval_print(&mut interp, "(.y (* v 0.5))"), "11.0");
    assert_eq!(eval_print(&mut interp, "(+ 1 2)"), "3");
    assert!(interp.eval_str("(+ 1 v)").is_err());
    assert!(interp
        .eval_str("(add-operator-method + :gadget :number (lambda (a b) a))")
        .is_err());
}

#[test]
fn operators_are_first_class() {
    let mut interp = interp();
    assert_eq!(eval_print(&mut interp, "(fold + 0 '(1 2 3 4))"), "10");
    assert_eq!(eval_print(&mut interp, "(apply * '(2 3 4))"), "24");
    assert_eq!(eval_print(&mut interp, "(map - '(1 2))"), "(-1 -2)");
    assert_eq!(eval_print(&mut interp, "(function? <)"), "true");
}
