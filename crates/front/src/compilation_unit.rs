use ember_common::{bug_report, idx, Idx, IndexVec};
use ember_common::typings::Type;

use crate::ast::{AssignExpression, Ast, BinaryExpression, BinaryOpKind, Body, BoolExpression, CallExpression, Expression, FxDeclaration, IfStatement, LetStatement, NumberExpression, ReturnStatement, Statement, StatementKind, StmtIndex, StringExpression, UnaryExpression, VarExpression, WhileStatement};
use crate::ast::visitor::ASTVisitor;
use crate::ast::eval::{ASTEvaluator, Value};
use crate::ast::lexer::Lexer;
use crate::ast::parser::Parser;
use ember_common::diagnostics::{DiagnosticsReport, DiagnosticsReportCell};
use ember_common::diagnostics::printer::DiagnosticsPrinter;
use ember_common::text::SourceText;
use ember_common::text::span::TextSpan;
use ember_common::token::Token;

use std::io::Write;
use std::rc::Rc;
use tracing::debug;


idx!(VariableIndex);
idx!(FunctionIndex);

pub const MAIN_FUNCTION: &str = "main";

/// Operations the language provides without a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Tick,
    ToString,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        match name {
            "print" => Some(Builtin::Print),
            "tick" => Some(Builtin::Tick),
            "to_string" => Some(Builtin::ToString),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Tick => "tick",
            Builtin::ToString => "to_string",
        }
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            Builtin::Tick => 0,
            Builtin::Print | Builtin::ToString => 1,
        }
    }

    pub fn return_type(&self) -> Type {
        match self {
            Builtin::Print => Type::Void,
            Builtin::Tick => Type::Int,
            Builtin::ToString => Type::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    Unresolved,
    Function(FunctionIndex),
    Builtin(Builtin),
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<VariableIndex>,
    /// Parameters in declaration order, then locals in declaration order
    pub variables: Vec<VariableIndex>,
    pub body: Vec<StmtIndex>,
    pub return_type: Type,
    pub declaration: Option<StmtIndex>,
}

impl Function {
    pub fn declared_count(&self) -> usize {
        self.variables.len()
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub function: FunctionIndex,
    /// Position in the owning function's `variables`
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct GlobalScope {
    pub variables: IndexVec<VariableIndex, Variable>,
    pub functions: IndexVec<FunctionIndex, Function>,
}

impl GlobalScope {
    fn new() -> Self {
        let mut functions = IndexVec::new();
        functions.push(Function {
            name: MAIN_FUNCTION.to_string(),
            parameters: Vec::new(),
            variables: Vec::new(),
            body: Vec::new(),
            return_type: Type::Int,
            declaration: None,
        });

        GlobalScope { variables: IndexVec::new(), functions }
    }

    /// The implicit function formed by the top-level statements
    pub fn main_function(&self) -> FunctionIndex {
        FunctionIndex::first()
    }

    pub fn create_function(&mut self, name: String, declaration: StmtIndex) -> Result<FunctionIndex, FunctionIndex> {
        if let Some(existing) = self.lookup_fx(&name) {
            return Err(existing);
        }

        Ok(self.functions.push(Function {
            name,
            parameters: Vec::new(),
            variables: Vec::new(),
            body: Vec::new(),
            return_type: Type::Void,
            declaration: Some(declaration),
        }))
    }

    pub fn lookup_fx(&self, name: &str) -> Option<FunctionIndex> {
        self.functions.indexed_iter()
            .find(|(_, function)| function.name == name)
            .map(|(index, _)| index)
    }

    pub fn declare_variable(&mut self, name: &str, ty: Type, function: FunctionIndex, is_parameter: bool) -> VariableIndex {
        let slot = self.functions[function].variables.len();
        let index = self.variables.push(Variable { name: name.to_string(), ty, function, slot });

        let owner = &mut self.functions[function];
        owner.variables.push(index);
        if is_parameter {
            owner.parameters.push(index);
        }

        index
    }
}

struct LocalScope {
    locals: Vec<VariableIndex>,
}

struct ScopeStack {
    local_scopes: Vec<LocalScope>,
    global_scope: GlobalScope,
    function: Option<FunctionIndex>,
}

impl ScopeStack {
    fn from_global_scope(global_scope: GlobalScope) -> Self {
        ScopeStack { local_scopes: Vec::new(), global_scope, function: None }
    }

    fn enter_fx_scope(&mut self, function: FunctionIndex) {
        self.function = Some(function);
        self.enter_scope();
    }

    fn exit_fx_scope(&mut self) {
        self.exit_scope();
        if !self.local_scopes.is_empty() {
            bug_report!("function scope closed with {} nested scopes left open", self.local_scopes.len());
        }
        self.function = None;
    }

    fn enter_scope(&mut self) {
        self.local_scopes.push(LocalScope { locals: Vec::new() });
    }

    fn exit_scope(&mut self) {
        self.local_scopes.pop();
    }

    fn surrounding_function(&self) -> FunctionIndex {
        match self.function {
            Some(function) => function,
            None => bug_report!("variable declared outside of any function"),
        }
    }

    fn declare_variable(&mut self, name: &str, ty: Type, is_parameter: bool) -> VariableIndex {
        let function = self.surrounding_function();
        let index = self.global_scope.declare_variable(name, ty, function, is_parameter);

        match self.local_scopes.last_mut() {
            Some(scope) => scope.locals.push(index),
            None => bug_report!("no open scope to declare `{}` in", name),
        }

        index
    }

    /// Innermost declaration wins; lookups never cross the function boundary
    fn lookup_variable(&self, name: &str) -> Option<VariableIndex> {
        self.local_scopes.iter().rev()
            .flat_map(|scope| scope.locals.iter().rev())
            .copied()
            .find(|index| self.global_scope.variables[*index].name == name)
    }
}

struct Resolver {
    scopes: ScopeStack,
    diagnostics: DiagnosticsReportCell,
}

impl Resolver {
    fn new(diagnostics: DiagnosticsReportCell, scopes: ScopeStack) -> Self {
        Resolver { scopes, diagnostics }
    }

    fn expect_type(&self, expected: &Type, actual: &Type, span: &TextSpan) -> Type {
        if !actual.is_assignable_to(expected) {
            self.diagnostics.borrow_mut().report_type_mismatch(expected, actual, span);
        }

        expected.clone()
    }

    fn expect_value(&self, expr: &Expression) {
        if expr.ty == Type::Void {
            self.diagnostics.borrow_mut().report_void_value(&expr.span);
        }
    }

    fn resolve_type_name(&self, type_name: &Token) -> Type {
        match Type::from_str(&type_name.span.literal) {
            Some(ty) => ty,
            None => {
                self.diagnostics.borrow_mut().report_undeclared_type(type_name);
                Type::Error
            }
        }
    }

    pub fn resolve(&mut self, ast: &mut Ast) {
        let main = self.scopes.global_scope.main_function();
        let mut declarations = Vec::new();

        for stmt_id in ast.top_level.clone() {
            match ast.query_statement(stmt_id).kind.clone() {
                StatementKind::FxDeclaration(fx_decl) => {
                    if let Some(function) = self.declare_function(ast, &fx_decl, stmt_id) {
                        declarations.push((function, fx_decl));
                    }
                }
                _ => self.scopes.global_scope.functions[main].body.push(stmt_id),
            }
        }

        // every signature is known before any body is checked
        for (function, fx_decl) in declarations.iter() {
            self.declare_parameters(fx_decl, *function);
        }

        let main_body = self.scopes.global_scope.functions[main].body.clone();
        self.scopes.enter_fx_scope(main);
        self.resolve_statements(ast, &main_body);
        self.scopes.exit_fx_scope();

        for (function, fx_decl) in declarations {
            self.resolve_function_body(ast, &fx_decl, function);
        }
    }

    fn declare_function(&mut self, ast: &mut Ast, fx_decl: &FxDeclaration, stmt_id: StmtIndex) -> Option<FunctionIndex> {
        let name = fx_decl.identifier.span.literal.clone();
        let created = match Builtin::from_name(&name) {
            Some(_) => None,
            None => self.scopes.global_scope.create_function(name, stmt_id).ok(),
        };

        match created {
            Some(function) => {
                ast.set_function(stmt_id, function);
                Some(function)
            }
            None => {
                self.diagnostics.borrow_mut().report_function_already_declared(&fx_decl.identifier);
                None
            }
        }
    }

    fn declare_parameters(&mut self, fx_decl: &FxDeclaration, function: FunctionIndex) {
        let return_type = match &fx_decl.return_type {
            Some(return_type) => self.resolve_type_name(&return_type.type_name),
            None => Type::Void,
        };
        self.scopes.global_scope.functions[function].return_type = return_type;
        self.scopes.global_scope.functions[function].body = fx_decl.body.statements.clone();

        for parameter in fx_decl.parameters.iter() {
            let ty = self.resolve_type_name(&parameter.type_annotation.type_name);
            self.scopes.global_scope.declare_variable(&parameter.identifier.span.literal, ty, function, true);
        }
    }

    fn resolve_function_body(&mut self, ast: &mut Ast, fx_decl: &FxDeclaration, function: FunctionIndex) {
        self.scopes.enter_fx_scope(function);

        let parameters = self.scopes.global_scope.functions[function].parameters.clone();
        for parameter in parameters {
            match self.scopes.local_scopes.last_mut() {
                Some(scope) => scope.locals.push(parameter),
                None => bug_report!("function scope missing for `{}`", fx_decl.identifier.span.literal),
            }
        }

        self.resolve_statements(ast, &fx_decl.body.statements);
        self.scopes.exit_fx_scope();
    }

    /// Resolves a statement list, warning once about anything after a `return`
    fn resolve_statements(&mut self, ast: &mut Ast, statements: &[StmtIndex]) {
        let mut returned = false;

        for stmt_id in statements.iter() {
            let statement = ast.query_statement(*stmt_id);
            if returned {
                self.diagnostics.borrow_mut().warn_unreachable_code(&statement.span);
                returned = false;
            }
            let is_return = matches!(statement.kind, StatementKind::Return(_));

            self.visit_statement(ast, *stmt_id);
            returned |= is_return;
        }
    }

    fn resolve_binary_expression(&self, left: &Expression, right: &Expression, operator: BinaryOpKind, span: &TextSpan) -> Type {
        if left.ty == Type::Error || right.ty == Type::Error {
            return if operator.is_comparison() { Type::Bool } else { Type::Error };
        }

        match operator {
            BinaryOpKind::Plus if left.ty == Type::String => {
                self.expect_type(&Type::String, &right.ty, &right.span);
                Type::String
            }
            BinaryOpKind::Plus | BinaryOpKind::Minus | BinaryOpKind::Multiply
            | BinaryOpKind::Divide | BinaryOpKind::Modulo => {
                self.expect_type(&Type::Int, &left.ty, &left.span);
                self.expect_type(&Type::Int, &right.ty, &right.span);
                Type::Int
            }
            BinaryOpKind::Equals | BinaryOpKind::NotEquals => {
                self.expect_value(left);
                if left.ty != right.ty {
                    self.diagnostics.borrow_mut().report_type_mismatch(&left.ty, &right.ty, span);
                }
                Type::Bool
            }
            BinaryOpKind::LessThan | BinaryOpKind::GreaterThan
            | BinaryOpKind::LessThanOrEqual | BinaryOpKind::GreaterThanOrEqual => {
                self.expect_type(&Type::Int, &left.ty, &left.span);
                self.expect_type(&Type::Int, &right.ty, &right.span);
                Type::Bool
            }
        }
    }

    fn resolve_builtin_call(&mut self, ast: &mut Ast, builtin: Builtin, call_expression: &CallExpression) -> Type {
        for argument in call_expression.arguments.iter() {
            self.visit_expression(ast, *argument);
        }

        if call_expression.arguments.len() != builtin.parameter_count() {
            self.diagnostics.borrow_mut().report_invalid_arg_count(
                &call_expression.callee.span,
                builtin.parameter_count(),
                call_expression.arguments.len(),
            );
            return builtin.return_type();
        }

        if let Some(argument) = call_expression.arguments.first() {
            let argument = ast.query_expression(*argument);
            match builtin {
                Builtin::Print => self.expect_value(argument),
                Builtin::ToString => {
                    self.expect_type(&Type::Int, &argument.ty, &argument.span);
                }
                Builtin::Tick => {}
            }
        }

        builtin.return_type()
    }
}

impl ASTVisitor for Resolver {
    fn visit_fx_decl(&mut self, _ast: &mut Ast, _fx_decl: &FxDeclaration, _statement: &Statement) {
        // nested declarations were rejected by the parser
    }

    fn visit_let_statement(&mut self, ast: &mut Ast, let_statement: &LetStatement, statement: &Statement) {
        let expected = let_statement.type_annotation.as_ref()
            .map(|annotation| self.resolve_type_name(&annotation.type_name));

        self.visit_expression(ast, let_statement.initialiser);
        let initialiser = ast.query_expression(let_statement.initialiser);
        self.expect_value(initialiser);

        let ty = match expected {
            Some(expected) => self.expect_type(&expected, &initialiser.ty, &initialiser.span),
            None => initialiser.ty.clone(),
        };

        let variable = self.scopes.declare_variable(&let_statement.identifier.span.literal, ty, false);
        ast.set_variable_for_statement(statement.id, variable);
    }

    fn visit_return_statement(&mut self, ast: &mut Ast, return_statement: &ReturnStatement, _statement: &Statement) {
        let function = self.scopes.surrounding_function();

        if function == self.scopes.global_scope.main_function() {
            self.diagnostics.borrow_mut().report_return_outside_function(&return_statement.return_keyword);
            return;
        }

        let return_type = self.scopes.global_scope.functions[function].return_type.clone();
        match return_statement.return_value {
            Some(return_value) => {
                self.visit_expression(ast, return_value);
                let return_expression = ast.query_expression(return_value);
                self.expect_type(&return_type, &return_expression.ty, &return_expression.span);
            }
            None => {
                self.expect_type(&return_type, &Type::Void, &return_statement.return_keyword.span);
            }
        }
    }

    fn visit_if_statement(&mut self, ast: &mut Ast, if_statement: &IfStatement, _statement: &Statement) {
        self.visit_expression(ast, if_statement.condition);
        let condition = ast.query_expression(if_statement.condition);
        self.expect_type(&Type::Bool, &condition.ty, &condition.span);

        self.visit_body(ast, &if_statement.then_branch);
        if let Some(else_branch) = &if_statement.else_branch {
            self.visit_body(ast, &else_branch.body);
        }
    }

    fn visit_while_statement(&mut self, ast: &mut Ast, while_statement: &WhileStatement, _statement: &Statement) {
        self.visit_expression(ast, while_statement.condition);
        let condition = ast.query_expression(while_statement.condition);
        self.expect_type(&Type::Bool, &condition.ty, &condition.span);

        self.visit_body(ast, &while_statement.body);
    }

    fn visit_body(&mut self, ast: &mut Ast, body: &Body) {
        self.scopes.enter_scope();
        self.resolve_statements(ast, &body.statements);
        self.scopes.exit_scope();
    }

    fn visit_number_expression(&mut self, ast: &mut Ast, _number: &NumberExpression, expr: &Expression) {
        ast.set_type(expr.id, Type::Int);
    }

    fn visit_string_expression(&mut self, ast: &mut Ast, _string: &StringExpression, expr: &Expression) {
        ast.set_type(expr.id, Type::String);
    }

    fn visit_boolean_expression(&mut self, ast: &mut Ast, _boolean: &BoolExpression, expr: &Expression) {
        ast.set_type(expr.id, Type::Bool);
    }

    fn visit_variable_expression(&mut self, ast: &mut Ast, variable_expression: &VarExpression, expr: &Expression) {
        match self.scopes.lookup_variable(variable_expression.identifier()) {
            Some(variable) => {
                ast.set_variable(expr.id, variable);
                ast.set_type(expr.id, self.scopes.global_scope.variables[variable].ty.clone());
            }
            None => {
                self.diagnostics.borrow_mut().report_undeclared_variable(variable_expression.identifier(), &expr.span);
                ast.set_type(expr.id, Type::Error);
            }
        }
    }

    fn visit_assignment_expression(&mut self, ast: &mut Ast, assignment_expression: &AssignExpression, expr: &Expression) {
        self.visit_expression(ast, assignment_expression.expression);
        let name = &assignment_expression.identifier.span.literal;

        let ty = match self.scopes.lookup_variable(name) {
            Some(variable) => {
                ast.set_variable(expr.id, variable);
                let ty = self.scopes.global_scope.variables[variable].ty.clone();
                let value = ast.query_expression(assignment_expression.expression);
                self.expect_type(&ty, &value.ty, &value.span)
            }
            None => {
                self.diagnostics.borrow_mut().report_undeclared_variable(name, &assignment_expression.identifier.span);
                Type::Error
            }
        };

        ast.set_type(expr.id, ty);
    }

    fn visit_binary_expression(&mut self, ast: &mut Ast, binary_expression: &BinaryExpression, expr: &Expression) {
        self.visit_expression(ast, binary_expression.left);
        self.visit_expression(ast, binary_expression.right);

        let left = ast.query_expression(binary_expression.left);
        let right = ast.query_expression(binary_expression.right);
        let ty = self.resolve_binary_expression(left, right, binary_expression.operator.kind, &expr.span);

        ast.set_type(expr.id, ty);
    }

    fn visit_unary_expression(&mut self, ast: &mut Ast, unary_expression: &UnaryExpression, expr: &Expression) {
        self.visit_expression(ast, unary_expression.operand);

        let operand = ast.query_expression(unary_expression.operand);
        let ty = self.expect_type(&Type::Int, &operand.ty, &operand.span);
        ast.set_type(expr.id, ty);
    }

    fn visit_parenthesised_expression(&mut self, ast: &mut Ast, parenthesised_expression: &crate::ast::ParenExpression, expr: &Expression) {
        self.visit_expression(ast, parenthesised_expression.expression);

        let ty = ast.query_expression(parenthesised_expression.expression).ty.clone();
        ast.set_type(expr.id, ty);
    }

    fn visit_call_expression(&mut self, ast: &mut Ast, call_expression: &CallExpression, expr: &Expression) {
        let name = call_expression.fx_name();

        let ty = if let Some(builtin) = Builtin::from_name(name) {
            ast.set_call_target(expr.id, CallTarget::Builtin(builtin));
            self.resolve_builtin_call(ast, builtin, call_expression)
        } else if let Some(function) = self.scopes.global_scope.lookup_fx(name).filter(|f| *f != self.scopes.global_scope.main_function()) {
            ast.set_call_target(expr.id, CallTarget::Function(function));
            let callee = self.scopes.global_scope.functions[function].clone();

            if callee.parameters.len() != call_expression.arguments.len() {
                self.diagnostics.borrow_mut().report_invalid_arg_count(
                    &call_expression.callee.span,
                    callee.parameters.len(),
                    call_expression.arguments.len(),
                );
            }

            for (position, argument) in call_expression.arguments.iter().enumerate() {
                self.visit_expression(ast, *argument);

                if let Some(parameter) = callee.parameters.get(position) {
                    let argument = ast.query_expression(*argument);
                    let parameter_ty = self.scopes.global_scope.variables[*parameter].ty.clone();
                    self.expect_type(&parameter_ty, &argument.ty, &argument.span);
                }
            }

            callee.return_type
        } else {
            self.diagnostics.borrow_mut().report_undeclared_function(name, &call_expression.callee.span);
            for argument in call_expression.arguments.iter() {
                self.visit_expression(ast, *argument);
            }
            Type::Error
        };

        ast.set_type(expr.id, ty);
    }

    fn visit_error(&mut self, _ast: &mut Ast, _span: &TextSpan) {}
}

pub struct CompilationUnit {
    pub ast: Ast,
    pub diagnostics_report: DiagnosticsReportCell,
    pub global_scope: GlobalScope,
}

impl CompilationUnit {
    /// Lexes, parses and resolves `input`; any error-severity diagnostic fails the unit
    pub fn compile(input: &str) -> Result<CompilationUnit, DiagnosticsReportCell> {
        let tokens = Lexer::new(input).tokenize();
        debug!(tokens = tokens.len(), "lexed source");

        let diagnostics_report = DiagnosticsReport::new_cell();
        let mut ast = Ast::new();
        Parser::new(tokens, Rc::clone(&diagnostics_report), &mut ast).parse();
        debug!(statements = ast.statements.len(), expressions = ast.expressions.len(), "parsed source");

        if diagnostics_report.borrow().has_errors() {
            return Err(diagnostics_report);
        }

        let scopes = ScopeStack::from_global_scope(GlobalScope::new());
        let mut resolver = Resolver::new(Rc::clone(&diagnostics_report), scopes);
        resolver.resolve(&mut ast);
        debug!(functions = resolver.scopes.global_scope.functions.len(), "resolved symbols");

        if diagnostics_report.borrow().has_errors() {
            return Err(diagnostics_report);
        }

        Ok(CompilationUnit {
            global_scope: resolver.scopes.global_scope,
            ast,
            diagnostics_report,
        })
    }

    /// Runs the program on the tree-walking evaluator, returning `main`'s exit value
    pub fn run_evaluator<W: Write>(&mut self, output: W) -> Result<Value, DiagnosticsReportCell> {
        let mut evaluator = ASTEvaluator::new(&self.global_scope, Rc::clone(&self.diagnostics_report), output);
        let value = evaluator.run_main(&mut self.ast);

        if self.diagnostics_report.borrow().has_errors() {
            return Err(Rc::clone(&self.diagnostics_report));
        }

        Ok(value)
    }

    pub fn output_errors(text: &SourceText, diagnostics_report: &DiagnosticsReportCell) {
        let diagnostics_binding = diagnostics_report.borrow();
        DiagnosticsPrinter::new(text, &diagnostics_binding.errors).print_errors();
    }

    pub fn output_warnings(text: &SourceText, diagnostics_report: &DiagnosticsReportCell) {
        let diagnostics_binding = diagnostics_report.borrow();
        DiagnosticsPrinter::new(text, &diagnostics_binding.warnings).print_warnings();
    }
}
