mod operator;
mod scope;

use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    rc::Rc,
};

use tracing::{debug, trace};

use crate::{
    ast::{BinaryOp, Expr, Stmt},
    config::Config,
};

use self::scope::Scope;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Unit,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Unit => "unit",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Unit => write!(f, "()"),
        }
    }
}

pub struct Interpreter {
    scope: Rc<RefCell<Scope>>,
    depth: usize,
    config: Config,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("scope", &self.scope)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    /// Innermost statement that failed, printed as `expr;` or `if (cond)`.
    /// `None` when a bare expression was evaluated.
    pub statement: Option<String>,
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(statement) = &self.statement {
            write!(f, "\n  while executing: {}", statement)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("Name error: unbound identifier `{0}`")]
    UnboundIdentifier(String),
    #[error(
        "Type error: invalid operands for `{op}`: {left} ({}) and {right} ({})",
        .left.type_name(),
        .right.type_name()
    )]
    InvalidOperands {
        op: BinaryOp,
        left: Value,
        right: Value,
    },
    #[error("Type error: condition must be a boolean, found {0} ({})", .0.type_name())]
    NonBooleanCondition(Value),
    #[error(
        "Type error: operands of `{op}` must be booleans, found {value} ({})",
        .value.type_name()
    )]
    NonBooleanOperand { op: BinaryOp, value: Value },
    #[error("Type error: cannot assign to `{0}`")]
    InvalidAssignmentTarget(Expr),
    #[error("Arithmetic error: `{op}` by zero")]
    DivisionByZero { op: BinaryOp },
    #[error("Recursion limit error: evaluation nested deeper than {0} levels")]
    RecursionLimit(usize),
}

impl ExecutionErrorKind {
    pub fn category(&self) -> &'static str {
        match self {
            ExecutionErrorKind::UnboundIdentifier(_) => "NameError",
            ExecutionErrorKind::InvalidOperands { .. }
            | ExecutionErrorKind::NonBooleanCondition(_)
            | ExecutionErrorKind::NonBooleanOperand { .. }
            | ExecutionErrorKind::InvalidAssignmentTarget(_) => "TypeError",
            ExecutionErrorKind::DivisionByZero { .. } => "ArithmeticError",
            ExecutionErrorKind::RecursionLimit(_) => "RecursionLimitError",
        }
    }
}

impl ExecutionError {
    fn new(kind: ExecutionErrorKind) -> Self {
        debug!(category = kind.category(), error = %kind, "execution failed");
        Self {
            kind,
            statement: None,
        }
    }

    fn within(mut self, statement: impl FnOnce() -> String) -> Self {
        if self.statement.is_none() {
            self.statement = Some(statement());
        }
        self
    }
}

impl From<ExecutionErrorKind> for ExecutionError {
    fn from(kind: ExecutionErrorKind) -> Self {
        Self::new(kind)
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            scope: Scope::boxed(None),
            depth: 0,
            config: *config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Binds `name` in the global scope.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        debug!(%name, %value, "defining global");
        self.scope.borrow_mut().define(name, value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.scope.borrow().get(name)
    }

    /// Runs a program root. The statements of a root block share the global
    /// scope, so bindings survive between calls.
    pub fn interpret(&mut self, program: &Stmt) -> Result<Value, ExecutionError> {
        let stmts = match program {
            Stmt::Block { stmts } => stmts.as_slice(),
            stmt => std::slice::from_ref(stmt),
        };

        let mut result = Value::Unit;
        for stmt in stmts {
            result = self.execute_stmt(stmt)?;
        }

        Ok(result)
    }

    /// Executes one statement and returns its completion value.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Value, ExecutionError> {
        self.execute_stmt(stmt)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, ExecutionError> {
        self.evaluate_expr(expr)
    }

    fn enter(&mut self) -> Result<(), ExecutionErrorKind> {
        if self.depth >= self.config.eval_depth_limit {
            return Err(ExecutionErrorKind::RecursionLimit(
                self.config.eval_depth_limit,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Value, ExecutionError> {
        self.enter()?;
        let result = match stmt {
            Stmt::Expr { expr } => self
                .evaluate_expr(expr)
                .map_err(|e| e.within(|| format!("{};", expr))),
            Stmt::Block { stmts } => {
                self.execute_in_scope(Scope::boxed(Some(self.scope.clone())), |_self| {
                    trace!(statements = stmts.len(), "entering block scope");
                    let mut result = Value::Unit;
                    for stmt in stmts.iter() {
                        result = _self.execute_stmt(stmt)?;
                    }
                    Ok(result)
                })
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => match self.evaluate_expr(cond) {
                Ok(Value::Boolean(true)) => self.execute_stmt(then),
                Ok(Value::Boolean(false)) => match otherwise {
                    Some(otherwise) => self.execute_stmt(otherwise),
                    None => Ok(Value::Unit),
                },
                Ok(value) => Err(ExecutionError::new(
                    ExecutionErrorKind::NonBooleanCondition(value),
                )),
                Err(e) => Err(e),
            }
            .map_err(|e| e.within(|| format!("if ({})", cond))),
        };
        self.depth -= 1;
        result
    }

    fn execute_in_scope<T>(
        &mut self,
        scope: Rc<RefCell<Scope>>,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        let prev = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = prev;
        trace!("left block scope");
        result
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, ExecutionError> {
        self.enter()?;
        let result = match expr {
            Expr::Number { value } => Ok(Value::Number(*value)),
            Expr::String { value } => Ok(Value::String(value.clone())),
            Expr::Bool { value } => Ok(Value::Boolean(*value)),
            Expr::Identifier { name } => self
                .scope
                .borrow()
                .get(name)
                .ok_or_else(|| {
                    ExecutionError::from(ExecutionErrorKind::UnboundIdentifier(name.clone()))
                }),
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And | BinaryOp::Or => self.logical(*op, left, right),
                BinaryOp::Assign => self.assign(left, right),
                _ => self.evaluate_expr(left).and_then(|left| {
                    let right = self.evaluate_expr(right)?;
                    Ok(operator::apply(*op, left, right)?)
                }),
            },
        };
        self.depth -= 1;
        result
    }

    fn logical(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Value, ExecutionError> {
        // `||` stops on true, `&&` stops on false.
        let stops_on = op == BinaryOp::Or;
        match self.evaluate_expr(left)? {
            Value::Boolean(b) if b == stops_on => Ok(Value::Boolean(b)),
            Value::Boolean(_) => match self.evaluate_expr(right)? {
                Value::Boolean(b) => Ok(Value::Boolean(b)),
                value => Err(ExecutionErrorKind::NonBooleanOperand { op, value }.into()),
            },
            value => Err(ExecutionErrorKind::NonBooleanOperand { op, value }.into()),
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr) -> Result<Value, ExecutionError> {
        let Expr::Identifier { name } = target else {
            return Err(ExecutionErrorKind::InvalidAssignmentTarget(target.clone()).into());
        };

        let value = self.evaluate_expr(value)?;
        let mut scope = self.scope.borrow_mut();
        if !scope.assign(name, &value) {
            scope.define(name.clone(), value.clone());
        }
        Ok(value)
    }
}
