use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Tag name written in front of every node when the AST is encoded as JSON.
pub const DEFAULT_DISCRIMINANT: &str = "$kind";

const FIELD_NAMES: [&str; 10] = [
    "cond", "then", "otherwise", "expr", "stmts", "value", "name", "op", "left", "right",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$kind")]
pub enum Stmt {
    #[serde(rename = "IfStmt")]
    If {
        cond: Expr,
        then: Box<Stmt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<Stmt>>,
    },
    #[serde(rename = "ExprStmt")]
    Expr { expr: Expr },
    #[serde(rename = "BlockStmt")]
    Block { stmts: Vec<Stmt> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$kind")]
pub enum Expr {
    #[serde(rename = "NumericLiteral")]
    Number { value: f64 },
    #[serde(rename = "StringLiteral")]
    String { value: String },
    #[serde(rename = "BoolLiteral")]
    Bool { value: bool },
    Identifier { name: String },
    #[serde(rename = "BinaryExpr")]
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "%")]
    Remainder,
}

/// Binding strength of an operator, loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Assignment,
    LogicalOr,
    LogicalAnd,
    Equality,
    Relational,
    Additive,
    Multiplicative,
    Primary,
}

impl Precedence {
    fn tighter(self) -> Precedence {
        match self {
            Precedence::Assignment => Precedence::LogicalOr,
            Precedence::LogicalOr => Precedence::LogicalAnd,
            Precedence::LogicalAnd => Precedence::Equality,
            Precedence::Equality => Precedence::Relational,
            Precedence::Relational => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative | Precedence::Primary => Precedence::Primary,
        }
    }
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 14] = [
        BinaryOp::Assign,
        BinaryOp::Or,
        BinaryOp::And,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::LessThan,
        BinaryOp::LessThanOrEqual,
        BinaryOp::GreaterThan,
        BinaryOp::GreaterThanOrEqual,
        BinaryOp::Plus,
        BinaryOp::Minus,
        BinaryOp::Multiply,
        BinaryOp::Divide,
        BinaryOp::Remainder,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
        }
    }

    pub fn precedence(self) -> Precedence {
        match self {
            BinaryOp::Assign => Precedence::Assignment,
            BinaryOp::Or => Precedence::LogicalOr,
            BinaryOp::And => Precedence::LogicalAnd,
            BinaryOp::Equal | BinaryOp::NotEqual => Precedence::Equality,
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => Precedence::Relational,
            BinaryOp::Plus | BinaryOp::Minus => Precedence::Additive,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Remainder => {
                Precedence::Multiplicative
            }
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, BinaryOp::Assign)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown binary operator \"{0}\"")]
pub struct UnknownOperator(pub String);

impl FromStr for BinaryOp {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BinaryOp::ALL
            .into_iter()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Number { value }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::String {
            value: value.into(),
        }
    }

    pub fn bool(value: bool) -> Self {
        Expr::Bool { value }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expr::Identifier { name: name.into() }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn precedence(&self) -> Precedence {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            _ => Precedence::Primary,
        }
    }
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr { expr }
    }

    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::Block { stmts }
    }

    pub fn conditional(cond: Expr, then: Stmt, otherwise: Option<Stmt>) -> Self {
        Stmt::If {
            cond,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number { value } => write!(f, "{}", value),
            Expr::String { value } => write_quoted(f, value),
            Expr::Bool { value } => write!(f, "{}", value),
            Expr::Identifier { name } => write!(f, "{}", name),
            Expr::Binary { op, left, right } => {
                let precedence = op.precedence();
                let (left_min, right_min) = if op.is_right_associative() {
                    (precedence.tighter(), precedence)
                } else {
                    (precedence, precedence.tighter())
                };
                write_operand(f, left, left_min)?;
                write!(f, " {} ", op)?;
                write_operand(f, right, right_min)
            }
        }
    }
}

fn write_operand(
    f: &mut std::fmt::Formatter<'_>,
    expr: &Expr,
    min: Precedence,
) -> std::fmt::Result {
    if expr.precedence() < min {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

fn write_quoted(f: &mut std::fmt::Formatter<'_>, value: &str) -> std::fmt::Result {
    write!(f, "\"")?;
    for c in value.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

impl Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_stmt(f, self, 0)
    }
}

// Writes `stmt` starting at the current column; nested lines are indented
// relative to `indent`.
fn write_stmt(f: &mut std::fmt::Formatter<'_>, stmt: &Stmt, indent: usize) -> std::fmt::Result {
    match stmt {
        Stmt::Expr { expr } => write!(f, "{};", expr),
        Stmt::Block { stmts } if stmts.is_empty() => write!(f, "{{}}"),
        Stmt::Block { stmts } => {
            writeln!(f, "{{")?;
            for stmt in stmts {
                write!(f, "{:width$}", "", width = (indent + 1) * 4)?;
                write_stmt(f, stmt, indent + 1)?;
                writeln!(f)?;
            }
            write!(f, "{:width$}}}", "", width = indent * 4)
        }
        Stmt::If {
            cond,
            then,
            otherwise,
        } => {
            write!(f, "if ({}) ", cond)?;
            write_stmt(f, then, indent)?;
            if let Some(otherwise) = otherwise {
                write!(f, " else ")?;
                write_stmt(f, otherwise, indent)?;
            }
            Ok(())
        }
    }
}

/// Renders a program root as source text. A root block is written without its
/// surrounding braces so that parsing the output yields the same tree.
pub fn print_program(root: &Stmt) -> String {
    match root {
        Stmt::Block { stmts } => stmts.iter().map(|stmt| format!("{}\n", stmt)).collect(),
        stmt => format!("{}\n", stmt),
    }
}

pub fn to_json(stmt: &Stmt, discriminant: &str) -> Result<serde_json::Value, serde_json::Error> {
    check_discriminant(discriminant).map_err(<serde_json::Error as serde::ser::Error>::custom)?;
    let mut value = serde_json::to_value(stmt)?;
    if discriminant != DEFAULT_DISCRIMINANT {
        rename_key(&mut value, DEFAULT_DISCRIMINANT, discriminant);
    }
    Ok(value)
}

pub fn from_json(
    mut value: serde_json::Value,
    discriminant: &str,
) -> Result<Stmt, serde_json::Error> {
    check_discriminant(discriminant).map_err(<serde_json::Error as serde::de::Error>::custom)?;
    if discriminant != DEFAULT_DISCRIMINANT {
        rename_key(&mut value, discriminant, DEFAULT_DISCRIMINANT);
    }
    serde_json::from_value(value)
}

fn check_discriminant(discriminant: &str) -> Result<(), String> {
    if discriminant.is_empty() || FIELD_NAMES.contains(&discriminant) {
        Err(format!("\"{discriminant}\" cannot be used as a discriminant"))
    } else {
        Ok(())
    }
}

fn rename_key(value: &mut serde_json::Value, from: &str, to: &str) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(kind) = map.remove(from) {
                map.insert(to.to_string(), kind);
            }
            for child in map.values_mut() {
                rename_key(child, from, to);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                rename_key(item, from, to);
            }
        }
        _ => {}
    }
}
