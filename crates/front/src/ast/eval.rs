use crate::ast::{AssignExpression, Ast, BinaryExpression, BinaryOpKind, BoolExpression, CallExpression, ExprIndex, Expression, FxDeclaration, IfStatement, LetStatement, NumberExpression, ReturnStatement, Statement, StmtIndex, StringExpression, UnaryExpression, UnaryOpKind, VarExpression, WhileStatement};
use crate::ast::visitor::ASTVisitor;
use crate::compilation_unit::{Builtin, CallTarget, FunctionIndex, GlobalScope, VariableIndex};
use ember_common::bug_report;
use ember_common::diagnostics::DiagnosticsReportCell;
use ember_common::text::span::TextSpan;
use ember_common::typings::Type;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::time::Instant;
use tracing::{trace, warn};


// one frame per active call, variable indices are unique per function
#[derive(Debug)]
struct Frame {
    variables: HashMap<VariableIndex, Value>,
}

impl Frame {
    fn new() -> Self {
        Self { variables: HashMap::new() }
    }
}

#[derive(Debug)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    fn new() -> Self {
        Self { frames: Vec::new() }
    }

    fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn insert(&mut self, index: VariableIndex, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.variables.insert(index, value);
            }
            None => bug_report!("no active frame to bind variable {}", index.index),
        }
    }

    fn get(&self, index: &VariableIndex) -> Option<&Value> {
        self.frames.last().and_then(|frame| frame.variables.get(index))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(i64),
    Boolean(bool),
    String(String),
    Void,
}

impl Value {
    pub fn expect_number(&self) -> i64 {
        match self {
            Value::Number(value) => *value,
            _ => bug_report!("expected a number, found {:?}", self),
        }
    }

    /// Value a function of `ty` produces when its body ends without `return`
    pub fn default_for(ty: &Type, function: &str) -> Value {
        let value = match ty {
            Type::Int => Value::Number(0),
            Type::Bool => Value::Boolean(false),
            Type::String => Value::String(String::new()),
            _ => return Value::Void,
        };
        warn!("Function '{}' with return type {} lacks an explicit return, returning {:?}", function, ty, value);
        value
    }

    pub fn expect_boolean(&self) -> bool {
        match self {
            Value::Boolean(value) => *value,
            _ => bug_report!("expected a boolean, found {:?}", self),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::String(value) => write!(f, "{}", value),
            Value::Void => write!(f, "()"),
        }
    }
}

/// Tree-walking interpreter over a resolved AST
///
/// Program output from `print` goes to `output`. A runtime fault is reported
/// through the diagnostics and unwinds the whole program.
pub struct ASTEvaluator<'a, W: Write> {
    pub last_value: Option<Value>,
    pub frames: FrameStack,
    global_scope: &'a GlobalScope,
    diagnostics: DiagnosticsReportCell,
    output: W,
    started: Instant,
    returned: bool,
    halted: bool,
}

impl <'a, W: Write> ASTEvaluator<'a, W> {
    pub fn new(global_scope: &'a GlobalScope, diagnostics: DiagnosticsReportCell, output: W) -> Self {
        Self {
            last_value: None,
            frames: FrameStack::new(),
            global_scope,
            diagnostics,
            output,
            started: Instant::now(),
            returned: false,
            halted: false,
        }
    }

    /// Runs the top-level statements; `main` exits with 0 unless a fault halted it
    pub fn run_main(&mut self, ast: &mut Ast) -> Value {
        let main = self.global_scope.main_function();
        let body = self.global_scope.functions[main].body.clone();

        self.frames.push();
        self.run_statements(ast, &body);
        self.frames.pop();

        if self.halted { Value::Void } else { Value::Number(0) }
    }

    fn run_statements(&mut self, ast: &mut Ast, statements: &[StmtIndex]) {
        for statement in statements {
            if self.returned || self.halted {
                break;
            }
            self.visit_statement(ast, *statement);
        }
    }

    fn take_last_value(&mut self) -> Value {
        self.last_value.take().unwrap_or(Value::Void)
    }

    fn evaluate(&mut self, ast: &mut Ast, expression: ExprIndex) -> Value {
        self.visit_expression(ast, expression);
        self.take_last_value()
    }

    fn call_function(&mut self, ast: &mut Ast, function: FunctionIndex, arguments: Vec<Value>) -> Value {
        let callee = &self.global_scope.functions[function];
        let parameters = callee.parameters.clone();
        let body = callee.body.clone();
        let return_type = callee.return_type.clone();
        let name = callee.name.clone();
        trace!(function = %callee.name, depth = self.frames.depth(), "calling");

        self.frames.push();
        for (parameter, argument) in parameters.into_iter().zip(arguments) {
            self.frames.insert(parameter, argument);
        }

        self.run_statements(ast, &body);
        self.frames.pop();

        let value = if self.returned {
            self.take_last_value()
        } else {
            Value::default_for(&return_type, &name)
        };
        self.returned = false;
        value
    }

    fn call_builtin(&mut self, builtin: Builtin, arguments: Vec<Value>) -> Value {
        match builtin {
            Builtin::Print => {
                for argument in arguments {
                    if let Err(error) = writeln!(self.output, "{}", argument) {
                        warn!(%error, "failed to write program output");
                    }
                }
                Value::Void
            }
            Builtin::Tick => Value::Number(self.started.elapsed().as_nanos() as i64),
            Builtin::ToString => match arguments.first() {
                Some(value) => Value::String(value.to_string()),
                None => bug_report!("to_string called without an argument"),
            },
        }
    }

    fn divide(&mut self, operator: BinaryOpKind, left: i64, right: i64, span: &TextSpan) -> Value {
        if right == 0 {
            self.diagnostics.borrow_mut().report_division_by_zero(&operator.to_string(), span);
            self.halted = true;
            return Value::Void;
        }

        // `idiv` traps on `i64::MIN / -1`, and so does the evaluator
        let result = match operator {
            BinaryOpKind::Divide => left.checked_div(right),
            _ => left.checked_rem(right),
        };
        match result {
            Some(value) => Value::Number(value),
            None => {
                self.diagnostics.borrow_mut().report_division_overflow(&operator.to_string(), span);
                self.halted = true;
                Value::Void
            }
        }
    }
}

impl <'a, W: Write> ASTVisitor for ASTEvaluator<'a, W> {
    fn visit_statement(&mut self, ast: &mut Ast, statement: StmtIndex) {
        if self.returned || self.halted {
            return;
        }
        self.do_visit_statement(ast, statement);
    }

    fn visit_fx_decl(&mut self, _ast: &mut Ast, _fx_decl: &FxDeclaration, _statement: &Statement) {}

    fn visit_let_statement(&mut self, ast: &mut Ast, let_statement: &LetStatement, _statement: &Statement) {
        let value = self.evaluate(ast, let_statement.initialiser);

        match let_statement.variable {
            Some(variable) => self.frames.insert(variable, value),
            None => bug_report!("unresolved let binding `{}`", let_statement.identifier.span.literal),
        }
    }

    fn visit_return_statement(&mut self, ast: &mut Ast, return_statement: &ReturnStatement, _statement: &Statement) {
        self.last_value = match return_statement.return_value {
            Some(expression) => Some(self.evaluate(ast, expression)),
            None => Some(Value::Void),
        };
        self.returned = true;
    }

    fn visit_if_statement(&mut self, ast: &mut Ast, if_statement: &IfStatement, _statement: &Statement) {
        let condition = self.evaluate(ast, if_statement.condition);
        if self.halted {
            return;
        }

        if condition.expect_boolean() {
            self.run_statements(ast, &if_statement.then_branch.statements);
        } else if let Some(else_branch) = &if_statement.else_branch {
            self.run_statements(ast, &else_branch.body.statements);
        }
    }

    fn visit_while_statement(&mut self, ast: &mut Ast, while_statement: &WhileStatement, _statement: &Statement) {
        loop {
            let condition = self.evaluate(ast, while_statement.condition);
            if self.halted || !condition.expect_boolean() {
                break;
            }

            self.run_statements(ast, &while_statement.body.statements);
            if self.returned || self.halted {
                break;
            }
        }
    }

    fn visit_number_expression(&mut self, _ast: &mut Ast, number: &NumberExpression, _expr: &Expression) {
        self.last_value = Some(Value::Number(number.number));
    }

    fn visit_string_expression(&mut self, _ast: &mut Ast, string: &StringExpression, _expr: &Expression) {
        self.last_value = Some(Value::String(string.value.clone()));
    }

    fn visit_boolean_expression(&mut self, _ast: &mut Ast, boolean: &BoolExpression, _expr: &Expression) {
        self.last_value = Some(Value::Boolean(boolean.value));
    }

    fn visit_variable_expression(&mut self, _ast: &mut Ast, variable_expression: &VarExpression, _expr: &Expression) {
        let value = variable_expression.variable
            .and_then(|variable| self.frames.get(&variable))
            .cloned();

        match value {
            Some(value) => self.last_value = Some(value),
            None => bug_report!("variable `{}` read before it was bound", variable_expression.identifier()),
        }
    }

    fn visit_assignment_expression(&mut self, ast: &mut Ast, assignment_expression: &AssignExpression, _expr: &Expression) {
        let value = self.evaluate(ast, assignment_expression.expression);

        match assignment_expression.variable {
            Some(variable) => self.frames.insert(variable, value.clone()),
            None => bug_report!("unresolved assignment to `{}`", assignment_expression.identifier.span.literal),
        }
        self.last_value = Some(value);
    }

    fn visit_binary_expression(&mut self, ast: &mut Ast, binary_expression: &BinaryExpression, expr: &Expression) {
        let left = self.evaluate(ast, binary_expression.left);
        let right = self.evaluate(ast, binary_expression.right);
        if self.halted {
            return;
        }

        let operator = binary_expression.operator.kind;
        self.last_value = Some(match (operator, &left, &right) {
            (BinaryOpKind::Plus, Value::String(left), Value::String(right)) => Value::String(format!("{}{}", left, right)),
            (BinaryOpKind::Plus, _, _) => Value::Number(left.expect_number().wrapping_add(right.expect_number())),
            (BinaryOpKind::Minus, _, _) => Value::Number(left.expect_number().wrapping_sub(right.expect_number())),
            (BinaryOpKind::Multiply, _, _) => Value::Number(left.expect_number().wrapping_mul(right.expect_number())),
            (BinaryOpKind::Divide | BinaryOpKind::Modulo, _, _) => {
                self.divide(operator, left.expect_number(), right.expect_number(), &expr.span)
            }
            (BinaryOpKind::Equals, _, _) => Value::Boolean(left == right),
            (BinaryOpKind::NotEquals, _, _) => Value::Boolean(left != right),
            (BinaryOpKind::LessThan, _, _) => Value::Boolean(left.expect_number() < right.expect_number()),
            (BinaryOpKind::GreaterThan, _, _) => Value::Boolean(left.expect_number() > right.expect_number()),
            (BinaryOpKind::LessThanOrEqual, _, _) => Value::Boolean(left.expect_number() <= right.expect_number()),
            (BinaryOpKind::GreaterThanOrEqual, _, _) => Value::Boolean(left.expect_number() >= right.expect_number()),
        });
    }

    fn visit_unary_expression(&mut self, ast: &mut Ast, unary_expression: &UnaryExpression, _expr: &Expression) {
        let operand = self.evaluate(ast, unary_expression.operand);
        if self.halted {
            return;
        }

        self.last_value = Some(match unary_expression.operator.kind {
            UnaryOpKind::Negation => Value::Number(operand.expect_number().wrapping_neg()),
        });
    }

    fn visit_call_expression(&mut self, ast: &mut Ast, call_expression: &CallExpression, _expr: &Expression) {
        let mut arguments = Vec::with_capacity(call_expression.arguments.len());
        for argument in call_expression.arguments.iter() {
            arguments.push(self.evaluate(ast, *argument));
            if self.halted {
                return;
            }
        }

        let value = match call_expression.target {
            CallTarget::Function(function) => self.call_function(ast, function, arguments),
            CallTarget::Builtin(builtin) => self.call_builtin(builtin, arguments),
            CallTarget::Unresolved => bug_report!("call to unresolved function `{}`", call_expression.fx_name()),
        };
        self.last_value = Some(value);
    }

    fn visit_error(&mut self, _ast: &mut Ast, span: &TextSpan) {
        bug_report!("error expression `{}` reached the evaluator", span.literal);
    }
}
