use pretty_assertions::assert_eq;
use treewalk::{
    ast::{self, BinaryOp, Expr, Stmt},
    config::{Config, DEFAULT_PARSE_DEPTH_LIMIT},
    parser::{self, ParseError},
    tokenizer::{self, TokenType},
    tree_walk_interpreter::{ExecutionErrorKind, Interpreter, Value},
    InterpretError,
};

fn test_valid_program(source: &str, expected: Value) {
    let mut interpreter = Interpreter::new();
    let value = treewalk::run(source, &mut interpreter).expect("Run should work on valid program");
    assert_eq!(value, expected);
}

fn parse(source: &str) -> Stmt {
    let tokens = tokenizer::tokens(source).expect("Tokenize should work on valid program");
    parser::program(&tokens).expect("Parse should work on valid program")
}

#[test]
fn test_numeric_literal_evaluates_to_itself() {
    for n in [0.0, 1.0, 42.0, 3.5, 0.125, 1e21, 123456789.0625] {
        let tokens = tokenizer::tokens(&n.to_string()).unwrap();
        let expr = parser::single_expression(&tokens).unwrap();
        let value = Interpreter::new().evaluate(&expr).unwrap();
        assert_eq!(value, Value::Number(n));
    }
}

#[test]
fn test_precedence() {
    test_valid_program("1 + 2 * 3;", Value::Number(7.0));
    test_valid_program("2 * 3 + 1 == 7 && 10 % 4 == 2;", Value::Boolean(true));
}

#[test]
fn test_dangling_else() {
    let program = parse("if (a) if (b) 1; else 2;");
    let Stmt::Block { stmts } = &program else {
        panic!("program root should be a block");
    };
    let Stmt::If {
        then, otherwise, ..
    } = &stmts[0]
    else {
        panic!("expected an if statement");
    };
    assert!(otherwise.is_none());
    assert!(matches!(
        then.as_ref(),
        Stmt::If {
            otherwise: Some(_),
            ..
        }
    ));

    let mut interpreter = Interpreter::new();
    interpreter.define("a", Value::Boolean(true));
    interpreter.define("b", Value::Boolean(false));
    assert_eq!(interpreter.interpret(&program).unwrap(), Value::Number(2.0));

    let mut interpreter = Interpreter::new();
    interpreter.define("a", Value::Boolean(false));
    interpreter.define("b", Value::Boolean(false));
    assert_eq!(interpreter.interpret(&program).unwrap(), Value::Unit);
}

#[test]
fn test_unbound_identifier() {
    let err = treewalk::run("x = 1; y + x;", &mut Interpreter::new()).unwrap_err();
    let InterpretError::Execution(err) = err else {
        panic!("expected an execution error, got {err:?}");
    };
    assert_eq!(err.kind, ExecutionErrorKind::UnboundIdentifier("y".to_string()));
    assert!(err.to_string().contains("`y`"));
}

#[test]
fn test_short_circuit() {
    test_valid_program("false && (1/0 > 0);", Value::Boolean(false));
}

#[test]
fn test_missing_closing_paren() {
    let err = treewalk::run("if (x > 1 { 2; }", &mut Interpreter::new()).unwrap_err();
    assert_eq!(err.category(), "SyntaxError");
    let InterpretError::Syntax(err) = err else {
        panic!("expected a syntax error");
    };
    assert_eq!(err.error, ParseError::Expected(TokenType::RightParen));
    let position = err.position().unwrap();
    assert_eq!((position.start_line, position.start_column), (1, 11));
}

#[test]
fn test_tokenize_error_is_a_syntax_error() {
    let err = treewalk::run("1 # 2;", &mut Interpreter::new()).unwrap_err();
    assert!(matches!(err, InterpretError::Tokenize(_)));
    assert_eq!(err.category(), "SyntaxError");
}

#[test]
fn test_scoped_program() {
    let source = r#"
        count = 0;
        limit = 3;
        {
            count = count + 1;
            local = "inside";
            if (count < limit) {
                count = count + 1;
            }
        }
        if (count == 2) { "two"; } else { "other"; }
    "#;
    test_valid_program(source, Value::String("two".to_string()));
}

#[test]
fn test_string_concatenation_and_comparison() {
    test_valid_program(
        r#"greeting = "hello, " + "world"; greeting == "hello, world";"#,
        Value::Boolean(true),
    );
    test_valid_program(r#""apple" < "banana";"#, Value::Boolean(true));
}

#[test]
fn test_print_parse_idempotent() {
    let source = r#"
        // comments and layout are not preserved
        x = 1 + 2 * (3 - 4) / 5;
        s = "quote \" backslash \\";
        if (x >= 0 || s != "") { y = x % 2; { z = (y = 1); } } else if (true) x; else {}
        a - (b - c);
        (a = b) == c;
    "#;
    let first = parse(source);
    let printed = ast::print_program(&first);
    assert_eq!(parse(&printed), first);
    assert_eq!(ast::print_program(&parse(&printed)), printed);
}

#[test]
fn test_json_round_trip_then_run() {
    let program = parse("n = 4; if (n > 3) n * 2; else 0;");
    let json = ast::to_json(&program, "kind").unwrap();
    assert_eq!(json["kind"], "BlockStmt");
    assert_eq!(json["stmts"][0]["expr"]["op"], "=");
    assert_eq!(json["stmts"][1]["otherwise"]["kind"], "ExprStmt");

    let text = serde_json::to_string(&json).unwrap();
    let decoded = ast::from_json(serde_json::from_str(&text).unwrap(), "kind").unwrap();
    assert_eq!(decoded, program);
    assert_eq!(
        Interpreter::new().interpret(&decoded).unwrap(),
        Value::Number(8.0)
    );
}

#[test]
fn test_constructed_tree() {
    let program = Stmt::block(vec![Stmt::conditional(
        Expr::binary(BinaryOp::NotEqual, Expr::string("a"), Expr::number(1.0)),
        Stmt::expr(Expr::bool(true)),
        None,
    )]);
    assert_eq!(
        Interpreter::new().interpret(&program).unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn test_recursion_limits_are_configurable() {
    let config = Config {
        parse_depth_limit: 5,
        eval_depth_limit: 10,
    };

    let err = treewalk::parse_source("((((((1))))));", &config).unwrap_err();
    let InterpretError::Syntax(err) = err else {
        panic!("expected a syntax error");
    };
    assert_eq!(err.error, ParseError::RecursionLimit(5));

    let config = Config {
        parse_depth_limit: 50,
        eval_depth_limit: 10,
    };
    let mut interpreter = Interpreter::with_config(&config);
    let err = treewalk::run("1+1+1+1+1+1+1+1+1+1+1+1;", &mut interpreter).unwrap_err();
    assert_eq!(err.category(), "RecursionLimitError");
}

#[test]
fn test_long_chains_fail_cleanly_by_default() {
    let source = format!("{}1;", "1 + ".repeat(300_000));
    let err = treewalk::run(&source, &mut Interpreter::new()).unwrap_err();
    assert_eq!(err.category(), "SyntaxError");
    let InterpretError::Syntax(err) = err else {
        panic!("expected a syntax error");
    };
    assert_eq!(err.error, ParseError::RecursionLimit(DEFAULT_PARSE_DEPTH_LIMIT));
}

#[test]
fn test_oversized_number_literal_is_rejected() {
    let source = format!("x = {};", "9".repeat(400));
    let err = treewalk::run(&source, &mut Interpreter::new()).unwrap_err();
    assert!(matches!(
        err,
        InterpretError::Tokenize(tokenizer::TokenizeError::NumberOutOfRange { .. })
    ));
    assert_eq!(err.category(), "SyntaxError");
}
