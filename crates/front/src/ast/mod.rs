use std::fmt::{Display, Formatter};

use crate::compilation_unit::{CallTarget, FunctionIndex, VariableIndex};
use ember_common::token::Token;
use ember_common::{text::span::TextSpan, typings::Type, idx, Idx, IndexVec};
use visitor::ASTVisitor;
use printer::ASTPrinter;

pub mod lexer;
pub mod parser;
pub mod eval;
pub mod visitor;
pub mod printer;


idx!(StmtIndex);
idx!(ExprIndex);

#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub statements: IndexVec<StmtIndex, Statement>,
    pub expressions: IndexVec<ExprIndex, Expression>,
    pub top_level: Vec<StmtIndex>,
}

impl Ast {
    pub fn new() -> Self {
        Self {
            statements: IndexVec::new(),
            expressions: IndexVec::new(),
            top_level: Vec::new(),
        }
    }

    pub fn query_statement(&self, stmt_id: StmtIndex) -> &Statement {
        &self.statements[stmt_id]
    }

    pub fn query_expression(&self, expr_id: ExprIndex) -> &Expression {
        &self.expressions[expr_id]
    }

    pub fn query_statement_mut(&mut self, stmt_id: StmtIndex) -> &mut Statement {
        &mut self.statements[stmt_id]
    }

    pub fn query_expression_mut(&mut self, expr_id: ExprIndex) -> &mut Expression {
        &mut self.expressions[expr_id]
    }

    pub fn set_type(&mut self, expr_id: ExprIndex, ty: Type) {
        self.expressions[expr_id].ty = ty;
    }

    pub fn set_variable(&mut self, expr_id: ExprIndex, variable: VariableIndex) {
        match &mut self.query_expression_mut(expr_id).kind {
            ExpressionKind::Variable(var_expr) => var_expr.variable = Some(variable),
            ExpressionKind::Assignment(assign_expr) => assign_expr.variable = Some(variable),
            _ => unreachable!("Unable to set variable of non-variable expression"),
        }
    }

    pub fn set_variable_for_statement(&mut self, stmt_id: StmtIndex, variable: VariableIndex) {
        match &mut self.query_statement_mut(stmt_id).kind {
            StatementKind::Let(let_statement) => let_statement.variable = Some(variable),
            _ => unreachable!("Unable to set variable of non-let statement"),
        }
    }

    pub fn set_call_target(&mut self, expr_id: ExprIndex, target: CallTarget) {
        match &mut self.query_expression_mut(expr_id).kind {
            ExpressionKind::Call(call_expr) => call_expr.target = target,
            _ => unreachable!("Unable to set function of non-call expression"),
        }
    }

    pub fn set_function(&mut self, stmt_id: StmtIndex, function: FunctionIndex) {
        match &mut self.query_statement_mut(stmt_id).kind {
            StatementKind::FxDeclaration(fx_decl) => fx_decl.function = Some(function),
            _ => unreachable!("Unable to set function of non-function statement"),
        }
    }

    // Statements
    fn statement_from_kind(&mut self, kind: StatementKind, span: TextSpan) -> &Statement {
        let id = self.statements.push(Statement::new(kind, StmtIndex::new(0), span));
        self.statements[id].id = id;

        &self.statements[id]
    }

    pub fn expression_statement(&mut self, expr_id: ExprIndex) -> &Statement {
        let span = self.query_expression(expr_id).span.clone();
        self.statement_from_kind(StatementKind::Expression(expr_id), span)
    }

    pub fn let_statement(
        &mut self,
        let_keyword: Token,
        identifier: Token,
        type_annotation: Option<TypeAnnotation>,
        initialiser: ExprIndex,
    ) -> &Statement {
        let span = let_keyword.span.to(&self.query_expression(initialiser).span);
        let kind = StatementKind::Let(LetStatement { identifier, type_annotation, initialiser, variable: None });

        self.statement_from_kind(kind, span)
    }

    pub fn return_statement(&mut self, return_keyword: Token, return_value: Option<ExprIndex>) -> &Statement {
        let span = match return_value {
            Some(value) => return_keyword.span.to(&self.query_expression(value).span),
            None => return_keyword.span.clone(),
        };

        self.statement_from_kind(StatementKind::Return(ReturnStatement { return_keyword, return_value }), span)
    }

    pub fn if_statement(
        &mut self,
        if_keyword: Token,
        condition: ExprIndex,
        then_branch: Body,
        else_branch: Option<ElseBranch>,
    ) -> &Statement {
        let last = else_branch.as_ref().map(|branch| &branch.body).unwrap_or(&then_branch);
        let span = if_keyword.span.to(&last.close_brace.span);

        self.statement_from_kind(
            StatementKind::If(IfStatement { if_keyword, condition, then_branch, else_branch }),
            span,
        )
    }

    pub fn while_statement(&mut self, while_keyword: Token, condition: ExprIndex, body: Body) -> &Statement {
        let span = while_keyword.span.to(&body.close_brace.span);
        self.statement_from_kind(StatementKind::While(WhileStatement { while_keyword, condition, body }), span)
    }

    pub fn fx_declaration(
        &mut self,
        fx_keyword: Token,
        identifier: Token,
        parameters: Vec<FxParameter>,
        return_type: Option<FxReturnType>,
        body: Body,
    ) -> &Statement {
        let span = fx_keyword.span.to(&body.close_brace.span);
        let kind = StatementKind::FxDeclaration(FxDeclaration {
            fx_keyword, identifier, parameters, return_type, body, function: None,
        });

        self.statement_from_kind(kind, span)
    }

    // Expressions
    pub fn expression_from_kind(&mut self, kind: ExpressionKind, span: TextSpan) -> &Expression {
        let id = self.expressions.push(Expression::new(kind, ExprIndex::new(0), Type::Unresolved, span));
        self.expressions[id].id = id;

        &self.expressions[id]
    }

    pub fn number_expression(&mut self, token: Token, number: i64) -> &Expression {
        let span = token.span.clone();
        self.expression_from_kind(ExpressionKind::Number(NumberExpression { number, token }), span)
    }

    pub fn string_expression(&mut self, token: Token, value: String) -> &Expression {
        let span = token.span.clone();
        self.expression_from_kind(ExpressionKind::String(StringExpression { value, token }), span)
    }

    pub fn boolean_expression(&mut self, token: Token, value: bool) -> &Expression {
        let span = token.span.clone();
        self.expression_from_kind(ExpressionKind::Boolean(BoolExpression { value, token }), span)
    }

    pub fn variable_expression(&mut self, identifier: Token) -> &Expression {
        let span = identifier.span.clone();
        self.expression_from_kind(ExpressionKind::Variable(VarExpression { identifier, variable: None }), span)
    }

    pub fn assignment_expression(&mut self, identifier: Token, equals: Token, expression: ExprIndex) -> &Expression {
        let span = TextSpan::merge(&[&identifier.span, &equals.span, &self.query_expression(expression).span]);
        self.expression_from_kind(
            ExpressionKind::Assignment(AssignExpression { identifier, equals, expression, variable: None }),
            span,
        )
    }

    pub fn binary_expression(&mut self, operator: BinaryOp, left: ExprIndex, right: ExprIndex) -> &Expression {
        let span = TextSpan::merge(&[
            &self.query_expression(left).span,
            &operator.token.span,
            &self.query_expression(right).span,
        ]);
        self.expression_from_kind(ExpressionKind::Binary(BinaryExpression { left, operator, right }), span)
    }

    pub fn unary_expression(&mut self, operator: UnaryOp, operand: ExprIndex) -> &Expression {
        let span = operator.token.span.to(&self.query_expression(operand).span);
        self.expression_from_kind(ExpressionKind::Unary(UnaryExpression { operator, operand }), span)
    }

    pub fn parenthesised_expression(&mut self, left_paren: Token, expression: ExprIndex, right_paren: Token) -> &Expression {
        let span = TextSpan::merge(&[&left_paren.span, &self.query_expression(expression).span, &right_paren.span]);
        self.expression_from_kind(
            ExpressionKind::Parenthesised(ParenExpression { left_paren, expression, right_paren }),
            span,
        )
    }

    pub fn call_expression(&mut self, callee: Token, left_paren: Token, arguments: Vec<ExprIndex>, right_paren: Token) -> &Expression {
        let mut spans = vec![&callee.span, &left_paren.span, &right_paren.span];
        spans.extend(arguments.iter().map(|argument| &self.expressions[*argument].span));
        let span = TextSpan::merge(&spans);
        self.expression_from_kind(
            ExpressionKind::Call(CallExpression { callee, left_paren, arguments, right_paren, target: CallTarget::Unresolved }),
            span,
        )
    }

    pub fn error_expression(&mut self, span: TextSpan) -> &Expression {
        self.expression_from_kind(ExpressionKind::Error(span.clone()), span)
    }

    pub fn visit(&mut self, visitor: &mut dyn ASTVisitor) {
        for statement in self.top_level.clone() {
            visitor.visit_statement(self, statement);
        }
    }

    pub fn visualise(&mut self, coloured: bool) -> String {
        let mut printer = if coloured { ASTPrinter::new() } else { ASTPrinter::plain() };
        self.visit(&mut printer);

        printer.result
    }
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Expression(ExprIndex),
    Let(LetStatement),
    Return(ReturnStatement),
    If(IfStatement),
    While(WhileStatement),
    FxDeclaration(FxDeclaration),
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub id: StmtIndex,
    pub span: TextSpan,
}

impl Statement {
    pub fn new(kind: StatementKind, id: StmtIndex, span: TextSpan) -> Self {
        Self { kind, id, span }
    }
}

#[derive(Debug, Clone)]
pub struct TypeAnnotation {
    pub colon: Token,
    pub type_name: Token,
}

#[derive(Debug, Clone)]
pub struct LetStatement {
    pub identifier: Token,
    pub type_annotation: Option<TypeAnnotation>,
    pub initialiser: ExprIndex,
    pub variable: Option<VariableIndex>,
}

#[derive(Debug, Clone)]
pub struct ReturnStatement {
    pub return_keyword: Token,
    pub return_value: Option<ExprIndex>,
}

#[derive(Debug, Clone)]
pub struct Body {
    pub open_brace: Token,
    pub statements: Vec<StmtIndex>,
    pub close_brace: Token,
}

impl Body {
    pub fn new(open_brace: Token, statements: Vec<StmtIndex>, close_brace: Token) -> Self {
        Self { open_brace, statements, close_brace }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StmtIndex> {
        self.statements.iter()
    }
}

#[derive(Debug, Clone)]
pub struct ElseBranch {
    pub else_keyword: Token,
    pub body: Body,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub if_keyword: Token,
    pub condition: ExprIndex,
    pub then_branch: Body,
    pub else_branch: Option<ElseBranch>,
}

#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub while_keyword: Token,
    pub condition: ExprIndex,
    pub body: Body,
}

#[derive(Debug, Clone)]
pub struct FxParameter {
    pub identifier: Token,
    pub type_annotation: TypeAnnotation,
}

#[derive(Debug, Clone)]
pub struct FxReturnType {
    pub arrow: Token,
    pub type_name: Token,
}

#[derive(Debug, Clone)]
pub struct FxDeclaration {
    pub fx_keyword: Token,
    pub identifier: Token,
    pub parameters: Vec<FxParameter>,
    pub return_type: Option<FxReturnType>,
    pub body: Body,
    pub function: Option<FunctionIndex>,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Number(NumberExpression),
    String(StringExpression),
    Boolean(BoolExpression),
    Variable(VarExpression),
    Assignment(AssignExpression),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Parenthesised(ParenExpression),
    Call(CallExpression),
    Error(TextSpan),
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub id: ExprIndex,
    pub ty: Type,
    pub span: TextSpan,
}

impl Expression {
    pub fn new(kind: ExpressionKind, id: ExprIndex, ty: Type, span: TextSpan) -> Self {
        Self { kind, id, ty, span }
    }
}

#[derive(Debug, Clone)]
pub struct NumberExpression {
    pub number: i64,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct StringExpression {
    pub value: String,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct BoolExpression {
    pub value: bool,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct VarExpression {
    pub identifier: Token,
    pub variable: Option<VariableIndex>,
}

impl VarExpression {
    pub fn identifier(&self) -> &str {
        &self.identifier.span.literal
    }
}

#[derive(Debug, Clone)]
pub struct AssignExpression {
    pub identifier: Token,
    pub equals: Token,
    pub expression: ExprIndex,
    pub variable: Option<VariableIndex>,
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub callee: Token,
    pub left_paren: Token,
    pub arguments: Vec<ExprIndex>,
    pub right_paren: Token,
    pub target: CallTarget,
}

impl CallExpression {
    pub fn fx_name(&self) -> &str {
        &self.callee.span.literal
    }
}

#[derive(Debug, Clone)]
pub struct ParenExpression {
    pub left_paren: Token,
    pub expression: ExprIndex,
    pub right_paren: Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Negation,
}

impl Display for UnaryOpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOpKind::Negation => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnaryOp {
    pub kind: UnaryOpKind,
    pub token: Token,
}

impl UnaryOp {
    pub fn new(kind: UnaryOpKind, token: Token) -> Self {
        Self { kind, token }
    }
}

#[derive(Debug, Clone)]
pub struct UnaryExpression {
    pub operator: UnaryOp,
    pub operand: ExprIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpKind {
    // arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    // relational
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
}

impl BinaryOpKind {
    pub fn is_comparison(&self) -> bool {
        !matches!(self, BinaryOpKind::Plus | BinaryOpKind::Minus | BinaryOpKind::Multiply
            | BinaryOpKind::Divide | BinaryOpKind::Modulo)
    }
}

impl Display for BinaryOpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            BinaryOpKind::Plus => "+",
            BinaryOpKind::Minus => "-",
            BinaryOpKind::Multiply => "*",
            BinaryOpKind::Divide => "/",
            BinaryOpKind::Modulo => "%",
            BinaryOpKind::Equals => "==",
            BinaryOpKind::NotEquals => "!=",
            BinaryOpKind::LessThan => "<",
            BinaryOpKind::GreaterThan => ">",
            BinaryOpKind::LessThanOrEqual => "<=",
            BinaryOpKind::GreaterThanOrEqual => ">=",
        };

        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone)]
pub struct BinaryOp {
    pub kind: BinaryOpKind,
    pub token: Token,
}

impl BinaryOp {
    pub fn new(kind: BinaryOpKind, token: Token) -> Self {
        Self { kind, token }
    }

    pub fn precedence(&self) -> u8 {
        match self.kind {
            BinaryOpKind::Multiply | BinaryOpKind::Divide | BinaryOpKind::Modulo => 19,
            BinaryOpKind::Plus | BinaryOpKind::Minus => 18,
            BinaryOpKind::LessThan | BinaryOpKind::GreaterThan
            | BinaryOpKind::LessThanOrEqual | BinaryOpKind::GreaterThanOrEqual => 17,
            BinaryOpKind::Equals | BinaryOpKind::NotEquals => 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub left: ExprIndex,
    pub operator: BinaryOp,
    pub right: ExprIndex,
}
