use std::cell::{Cell, RefCell};

use tracing::debug;

use crate::{
    ast::{BinaryOp, Expr, Stmt},
    config::DEFAULT_PARSE_DEPTH_LIMIT,
    span::Span,
    tokenizer::{Token, TokenType},
};

type ParseResult<'a, T> = Result<(T, &'a [Token]), SyntaxError>;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub error: ParseError,
    /// Grammar rules being parsed when the error occurred, outermost first.
    pub context: Vec<&'static str>,
    /// The offending token; `None` only when the token stream ended without `Eof`.
    pub token: Option<Token>,
}

impl SyntaxError {
    pub fn position(&self) -> Option<Span> {
        self.token.as_ref().map(|token| token.span)
    }
}

impl std::error::Error for SyntaxError {}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Syntax error: {}", self.error)?;
        if let Some(token) = &self.token {
            write!(
                f,
                " at {} but found \"{}\"",
                token.span, token.token_type
            )?;
        }
        write!(f, " (while parsing {})", self.context.join(" > "))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Expected \"{0}\"")]
    Expected(TokenType),
    #[error("Expected an expression")]
    ExpectedExpression,
    #[error("Only an identifier can be assigned to")]
    InvalidAssignmentTarget,
    #[error("Nesting exceeds the limit of {0} levels")]
    RecursionLimit(usize),
}

#[derive(Debug)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
    depth: Cell<usize>,
    max_depth: usize,
}

impl ParseContext {
    fn new(max_depth: usize) -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            max_depth,
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard<'_> {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn descend(&self, tokens: &[Token]) -> Result<NestingGuard<'_>, SyntaxError> {
        let depth = self.depth.get() + 1;
        if depth > self.max_depth {
            return Err(self.error(ParseError::RecursionLimit(self.max_depth), tokens));
        }
        self.depth.set(depth);
        Ok(NestingGuard { context: self })
    }

    fn error(&self, error: ParseError, tokens: &[Token]) -> SyntaxError {
        SyntaxError {
            error,
            context: self.stack.borrow().clone(),
            token: tokens.first().cloned(),
        }
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

struct NestingGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> Drop for NestingGuard<'a> {
    fn drop(&mut self) {
        self.context.depth.set(self.context.depth.get() - 1);
    }
}

/// Parses `statement* EOF` into a root block.
pub fn program(tokens: &[Token]) -> Result<Stmt, SyntaxError> {
    program_with_limit(tokens, DEFAULT_PARSE_DEPTH_LIMIT)
}

pub fn program_with_limit(tokens: &[Token], max_depth: usize) -> Result<Stmt, SyntaxError> {
    let context = ParseContext::new(max_depth);
    let _guard = context.push("program");
    let mut stmts = Vec::new();
    let mut tokens = tokens;

    while !matches!(
        tokens.first().map(Token::token_type),
        Some(TokenType::Eof) | None
    ) {
        let (stmt, rest) = statement(&context, tokens)?;
        stmts.push(stmt);
        tokens = rest;
    }

    consume(&context, tokens, TokenType::Eof)?;
    debug!(statements = stmts.len(), "parsed program");
    Ok(Stmt::Block { stmts })
}

/// Parses `expr EOF`.
pub fn single_expression(tokens: &[Token]) -> Result<Expr, SyntaxError> {
    single_expression_with_limit(tokens, DEFAULT_PARSE_DEPTH_LIMIT)
}

pub fn single_expression_with_limit(
    tokens: &[Token],
    max_depth: usize,
) -> Result<Expr, SyntaxError> {
    let context = ParseContext::new(max_depth);
    let _guard = context.push("single_expression");
    let (expr, tokens) = expression(&context, tokens)?;
    consume(&context, tokens, TokenType::Eof)?;
    Ok(expr)
}

fn statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Stmt> {
    let _guard = context.push("statement");
    let _depth = context.descend(tokens)?;
    match tokens.first().map(Token::token_type) {
        Some(TokenType::LeftBrace) => block(context, &tokens[1..]),
        Some(TokenType::If) => if_statement(context, &tokens[1..]),
        _ => expression_statement(context, tokens),
    }
}

fn if_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Stmt> {
    let _guard = context.push("if_statement");
    let tokens = consume(context, tokens, TokenType::LeftParen)?;
    let (cond, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::RightParen)?;
    let (then, tokens) = statement(context, tokens)?;
    // Checking for `else` right after the innermost branch binds it to the nearest `if`.
    if let Some(TokenType::Else) = tokens.first().map(Token::token_type) {
        let (otherwise, tokens) = statement(context, &tokens[1..])?;
        Ok((Stmt::conditional(cond, then, Some(otherwise)), tokens))
    } else {
        Ok((Stmt::conditional(cond, then, None), tokens))
    }
}

fn block<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Stmt> {
    let _guard = context.push("block");
    let mut stmts = Vec::new();
    let mut tokens = tokens;

    loop {
        match tokens.first().map(Token::token_type) {
            Some(TokenType::RightBrace) => return Ok((Stmt::Block { stmts }, &tokens[1..])),
            Some(TokenType::Eof) | None => {
                return Err(context.error(ParseError::Expected(TokenType::RightBrace), tokens))
            }
            _ => {
                let (stmt, rest) = statement(context, tokens)?;
                stmts.push(stmt);
                tokens = rest;
            }
        }
    }
}

fn expression_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Stmt> {
    let _guard = context.push("expression_statement");
    let (expr, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::Semicolon)?;
    Ok((Stmt::Expr { expr }, tokens))
}

fn expression<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("expression");
    assignment(context, tokens)
}

fn assignment<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("assignment");
    let (target, rest) = logical_or(context, tokens)?;

    match rest.first().map(Token::token_type) {
        Some(TokenType::Equal) => match target {
            Expr::Identifier { .. } => {
                let _depth = context.descend(rest)?;
                let (value, rest) = assignment(context, &rest[1..])?;
                Ok((Expr::binary(BinaryOp::Assign, target, value), rest))
            }
            _ => Err(context.error(ParseError::InvalidAssignmentTarget, rest)),
        },
        _ => Ok((target, rest)),
    }
}

fn binary<'a>(
    context: &ParseContext,
    precedence: impl Fn(&ParseContext, &'a [Token]) -> ParseResult<'a, Expr>,
    operator: impl Fn(&TokenType) -> Option<BinaryOp>,
    tokens: &'a [Token],
) -> ParseResult<'a, Expr> {
    let (mut expr, mut tokens) = precedence(context, tokens)?;
    // Every fold nests the tree built so far one level deeper.
    let mut folds = Vec::new();

    while let Some(token) = tokens.first() {
        let op = match operator(token.token_type()) {
            Some(op) => op,
            None => break,
        };
        folds.push(context.descend(tokens)?);
        let (right, rest) = precedence(context, &tokens[1..])?;
        expr = Expr::binary(op, expr, right);
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn logical_or<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("logical_or");
    binary(
        context,
        logical_and,
        |token_type| match token_type {
            TokenType::OrOr => Some(BinaryOp::Or),
            _ => None,
        },
        tokens,
    )
}

fn logical_and<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("logical_and");
    binary(
        context,
        equality,
        |token_type| match token_type {
            TokenType::AndAnd => Some(BinaryOp::And),
            _ => None,
        },
        tokens,
    )
}

fn equality<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("equality");
    binary(
        context,
        comparison,
        |token_type| match token_type {
            TokenType::EqualEqual => Some(BinaryOp::Equal),
            TokenType::BangEqual => Some(BinaryOp::NotEqual),
            _ => None,
        },
        tokens,
    )
}

fn comparison<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("comparison");
    binary(
        context,
        term,
        |token_type| match token_type {
            TokenType::Less => Some(BinaryOp::LessThan),
            TokenType::LessEqual => Some(BinaryOp::LessThanOrEqual),
            TokenType::Greater => Some(BinaryOp::GreaterThan),
            TokenType::GreaterEqual => Some(BinaryOp::GreaterThanOrEqual),
            _ => None,
        },
        tokens,
    )
}

fn term<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("term");
    binary(
        context,
        factor,
        |token_type| match token_type {
            TokenType::Plus => Some(BinaryOp::Plus),
            TokenType::Minus => Some(BinaryOp::Minus),
            _ => None,
        },
        tokens,
    )
}

fn factor<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("factor");
    binary(
        context,
        primary,
        |token_type| match token_type {
            TokenType::Star => Some(BinaryOp::Multiply),
            TokenType::Slash => Some(BinaryOp::Divide),
            TokenType::Percent => Some(BinaryOp::Remainder),
            _ => None,
        },
        tokens,
    )
}

fn primary<'a>(context: &ParseContext, tokens: &'a [Token]) -> ParseResult<'a, Expr> {
    let _guard = context.push("primary");
    let Some(token) = tokens.first() else {
        return Err(context.error(ParseError::ExpectedExpression, tokens));
    };

    match token.token_type() {
        TokenType::Number(n) => Ok((Expr::number(*n), &tokens[1..])),
        TokenType::String(s) => Ok((Expr::string(s.clone()), &tokens[1..])),
        TokenType::True => Ok((Expr::bool(true), &tokens[1..])),
        TokenType::False => Ok((Expr::bool(false), &tokens[1..])),
        TokenType::Identifier(name) => Ok((Expr::identifier(name.clone()), &tokens[1..])),
        TokenType::LeftParen => {
            let _depth = context.descend(tokens)?;
            let (expr, rest) = expression(context, &tokens[1..])?;
            let tokens = consume(context, rest, TokenType::RightParen)?;
            Ok((expr, tokens))
        }
        _ => Err(context.error(ParseError::ExpectedExpression, tokens)),
    }
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    token_type: TokenType,
) -> Result<&'a [Token], SyntaxError> {
    match tokens.first().map(Token::token_type) {
        Some(t) if t == &token_type => Ok(&tokens[1..]),
        _ => Err(context.error(ParseError::Expected(token_type), tokens)),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ast::print_program, tokenizer::tokens};

    fn parse(source: &str) -> Result<Stmt, SyntaxError> {
        program(&tokens(source).expect("Tokenize should work on test source"))
    }

    fn parse_expr(source: &str) -> Expr {
        single_expression(&tokens(source).unwrap()).unwrap()
    }

    fn num(n: f64) -> Expr {
        Expr::number(n)
    }

    fn id(name: &str) -> Expr {
        Expr::identifier(name)
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse_expr("1 + 2 * 3"),
            Expr::binary(
                BinaryOp::Plus,
                num(1.0),
                Expr::binary(BinaryOp::Multiply, num(2.0), num(3.0)),
            )
        );
    }

    #[test]
    fn test_binary_levels_are_left_associative() {
        assert_eq!(
            parse_expr("a - b - c"),
            Expr::binary(
                BinaryOp::Minus,
                Expr::binary(BinaryOp::Minus, id("a"), id("b")),
                id("c"),
            )
        );
    }

    #[test]
    fn test_full_precedence_ladder() {
        // a || b && c == d < e + f * g
        let expected = Expr::binary(
            BinaryOp::Or,
            id("a"),
            Expr::binary(
                BinaryOp::And,
                id("b"),
                Expr::binary(
                    BinaryOp::Equal,
                    id("c"),
                    Expr::binary(
                        BinaryOp::LessThan,
                        id("d"),
                        Expr::binary(
                            BinaryOp::Plus,
                            id("e"),
                            Expr::binary(BinaryOp::Multiply, id("f"), id("g")),
                        ),
                    ),
                ),
            ),
        );
        assert_eq!(parse_expr("a || b && c == d < e + f * g"), expected);
    }

    #[test]
    fn test_parentheses_group_without_a_node() {
        assert_eq!(
            parse_expr("(1 + 2) * 3"),
            Expr::binary(
                BinaryOp::Multiply,
                Expr::binary(BinaryOp::Plus, num(1.0), num(2.0)),
                num(3.0),
            )
        );
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(
            parse_expr("a = b = 1 + 1"),
            Expr::binary(
                BinaryOp::Assign,
                id("a"),
                Expr::binary(
                    BinaryOp::Assign,
                    id("b"),
                    Expr::binary(BinaryOp::Plus, num(1.0), num(1.0)),
                ),
            )
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("1 + a = 2;").unwrap_err();
        assert_eq!(err.error, ParseError::InvalidAssignmentTarget);
        let position = err.position().unwrap();
        assert_eq!((position.start_line, position.start_column), (1, 7));
        assert_eq!(position.end_column, 8);
    }

    #[test]
    fn test_dangling_else_binds_to_nearest_if() {
        let expected = Stmt::block(vec![Stmt::conditional(
            id("a"),
            Stmt::conditional(
                id("b"),
                Stmt::expr(num(1.0)),
                Some(Stmt::expr(num(2.0))),
            ),
            None,
        )]);
        assert_eq!(parse("if (a) if (b) 1; else 2;").unwrap(), expected);
    }

    #[test]
    fn test_blocks_and_statements() {
        let expected = Stmt::block(vec![
            Stmt::block(vec![
                Stmt::expr(Expr::binary(BinaryOp::Assign, id("x"), Expr::string("hi"))),
                Stmt::block(vec![]),
            ]),
            Stmt::conditional(Expr::bool(true), Stmt::block(vec![]), Some(Stmt::block(vec![]))),
        ]);
        assert_eq!(
            parse("{ x = \"hi\"; {} } if (true) {} else {}").unwrap(),
            expected
        );
    }

    #[test]
    fn test_empty_program() {
        assert_eq!(parse("  // nothing\n").unwrap(), Stmt::block(vec![]));
    }

    #[test]
    fn test_missing_right_paren_reports_position() {
        let err = parse("x = (1 + 2;").unwrap_err();
        assert_eq!(err.error, ParseError::Expected(TokenType::RightParen));
        let token = err.token.as_ref().unwrap();
        assert_eq!(token.token_type, TokenType::Semicolon);
        assert_eq!(token.span.start_line, 1);
        assert_eq!(token.span.start_column, 11);
        assert_eq!(err.context.last(), Some(&"primary"));
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("1\n2;").unwrap_err();
        assert_eq!(err.error, ParseError::Expected(TokenType::Semicolon));
        assert_eq!(err.position().map(|span| span.start_line), Some(2));
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse("{ 1;").unwrap_err();
        assert_eq!(err.error, ParseError::Expected(TokenType::RightBrace));
        assert_eq!(err.token.unwrap().token_type, TokenType::Eof);
    }

    #[test]
    fn test_stray_closing_brace() {
        let err = parse("1; }").unwrap_err();
        assert_eq!(err.error, ParseError::ExpectedExpression);
    }

    #[test]
    fn test_single_expression_rejects_trailing_tokens() {
        let err = single_expression(&tokens("1 2").unwrap()).unwrap_err();
        assert_eq!(err.error, ParseError::Expected(TokenType::Eof));
    }

    #[test]
    fn test_missing_eof_token() {
        let err = program(&[]).unwrap_err();
        assert_eq!(err.error, ParseError::Expected(TokenType::Eof));
        assert_eq!(err.position(), None);
    }

    #[test]
    fn test_deep_parentheses_hit_recursion_limit() {
        let source = format!("{}1{};", "(".repeat(5000), ")".repeat(5000));
        let err = parse(&source).unwrap_err();
        assert_eq!(err.error, ParseError::RecursionLimit(DEFAULT_PARSE_DEPTH_LIMIT));
    }

    #[test]
    fn test_deep_blocks_hit_recursion_limit() {
        let source = format!("{}{}", "{".repeat(5000), "}".repeat(5000));
        let err = parse(&source).unwrap_err();
        assert_eq!(err.error, ParseError::RecursionLimit(DEFAULT_PARSE_DEPTH_LIMIT));
    }

    #[test]
    fn test_long_operator_chain_hits_recursion_limit() {
        let source = format!("{}1;", "1 + ".repeat(300_000));
        let err = parse(&source).unwrap_err();
        assert_eq!(err.error, ParseError::RecursionLimit(DEFAULT_PARSE_DEPTH_LIMIT));
        assert_eq!(err.token.unwrap().token_type, TokenType::Plus);
    }

    #[test]
    fn test_operator_chains_count_towards_nesting() {
        // `a * b` is folded before `c * d` starts, so only two folds are open at once.
        let mixed = tokens("a * b + c * d;").unwrap();
        assert!(program_with_limit(&mixed, 3).is_ok());
        let err = program_with_limit(&mixed, 2).unwrap_err();
        assert_eq!(err.error, ParseError::RecursionLimit(2));

        let chain = tokens("1 + 1 + 1;").unwrap();
        assert!(program_with_limit(&chain, 3).is_ok());
        assert!(program_with_limit(&chain, 2).is_err());
    }

    #[test]
    fn test_nesting_within_limit() {
        let tokens = tokens(&format!("{}1{};", "(".repeat(10), ")".repeat(10))).unwrap();
        assert!(program_with_limit(&tokens, 11).is_ok());
        assert!(program_with_limit(&tokens, 10).is_err());
    }

    #[test]
    fn test_reparsing_printed_program_is_idempotent() {
        let source = r#"
            total = (1 + 2) * 3 - (4 - 5);
            name = "a\tb";
            if (total < 10 || name == "x") { total = total % 4; } else if (false) 1; else { }
            if (a) if (b) 1; else 2;
            { x = y = z; }
        "#;
        let first = parse(source).unwrap();
        let printed = print_program(&first);
        let second = parse(&printed).unwrap();
        assert_eq!(first, second);
        assert_eq!(print_program(&second), printed);
    }
}
