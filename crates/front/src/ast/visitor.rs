/*
 * traversal over the arena AST, shared by the resolver, printer, evaluator and LIR builder
 */

use crate::ast::{AssignExpression, Ast, BinaryExpression, Body, BoolExpression, CallExpression, ExprIndex, Expression, ExpressionKind, FxDeclaration, IfStatement, LetStatement, NumberExpression, ParenExpression, ReturnStatement, Statement, StatementKind, StmtIndex, StringExpression, UnaryExpression, VarExpression, WhileStatement};
use ember_common::text::span::TextSpan;


pub trait ASTVisitor {
    fn visit_statement(&mut self, ast: &mut Ast, statement: StmtIndex) {
        self.do_visit_statement(ast, statement);
    }

    fn do_visit_statement(&mut self, ast: &mut Ast, statement: StmtIndex) {
        let statement = ast.query_statement(statement).clone();

        match &statement.kind {
            StatementKind::Expression(expr) => {
                self.visit_expression(ast, *expr);
            }
            StatementKind::Let(let_statement) => {
                self.visit_let_statement(ast, let_statement, &statement);
            }
            StatementKind::Return(return_statement) => {
                self.visit_return_statement(ast, return_statement, &statement);
            }
            StatementKind::If(if_statement) => {
                self.visit_if_statement(ast, if_statement, &statement);
            }
            StatementKind::While(while_statement) => {
                self.visit_while_statement(ast, while_statement, &statement);
            }
            StatementKind::FxDeclaration(fx_decl) => {
                self.visit_fx_decl(ast, fx_decl, &statement);
            }
        }
    }

    fn visit_fx_decl(&mut self, ast: &mut Ast, fx_decl: &FxDeclaration, statement: &Statement);

    fn visit_let_statement(&mut self, ast: &mut Ast, let_statement: &LetStatement, statement: &Statement);

    fn visit_return_statement(&mut self, ast: &mut Ast, return_statement: &ReturnStatement, _statement: &Statement) {
        if let Some(expr) = return_statement.return_value {
            self.visit_expression(ast, expr);
        }
    }

    fn visit_if_statement(&mut self, ast: &mut Ast, if_statement: &IfStatement, _statement: &Statement) {
        self.visit_expression(ast, if_statement.condition);
        self.visit_body(ast, &if_statement.then_branch);

        if let Some(else_branch) = &if_statement.else_branch {
            self.visit_body(ast, &else_branch.body);
        }
    }

    fn visit_while_statement(&mut self, ast: &mut Ast, while_statement: &WhileStatement, _statement: &Statement) {
        self.visit_expression(ast, while_statement.condition);
        self.visit_body(ast, &while_statement.body);
    }

    fn visit_body(&mut self, ast: &mut Ast, body: &Body) {
        for statement in body.iter() {
            self.visit_statement(ast, *statement);
        }
    }

    fn visit_expression(&mut self, ast: &mut Ast, expression: ExprIndex) {
        self.do_visit_expression(ast, expression);
    }

    fn do_visit_expression(&mut self, ast: &mut Ast, expression: ExprIndex) {
        let expression = ast.query_expression(expression).clone();

        match &expression.kind {
            ExpressionKind::Number(number) => {
                self.visit_number_expression(ast, number, &expression);
            }
            ExpressionKind::String(string) => {
                self.visit_string_expression(ast, string, &expression);
            }
            ExpressionKind::Boolean(boolean) => {
                self.visit_boolean_expression(ast, boolean, &expression);
            }
            ExpressionKind::Variable(variable) => {
                self.visit_variable_expression(ast, variable, &expression);
            }
            ExpressionKind::Assignment(assignment) => {
                self.visit_assignment_expression(ast, assignment, &expression);
            }
            ExpressionKind::Binary(binary) => {
                self.visit_binary_expression(ast, binary, &expression);
            }
            ExpressionKind::Unary(unary) => {
                self.visit_unary_expression(ast, unary, &expression);
            }
            ExpressionKind::Parenthesised(paren) => {
                self.visit_parenthesised_expression(ast, paren, &expression);
            }
            ExpressionKind::Call(call) => {
                self.visit_call_expression(ast, call, &expression);
            }
            ExpressionKind::Error(span) => {
                self.visit_error(ast, span);
            }
        }
    }

    fn visit_number_expression(&mut self, ast: &mut Ast, number: &NumberExpression, expr: &Expression);

    fn visit_string_expression(&mut self, ast: &mut Ast, string: &StringExpression, expr: &Expression);

    fn visit_boolean_expression(&mut self, ast: &mut Ast, boolean: &BoolExpression, expr: &Expression);

    fn visit_variable_expression(&mut self, ast: &mut Ast, variable_expression: &VarExpression, expr: &Expression);

    fn visit_assignment_expression(&mut self, ast: &mut Ast, assignment_expression: &AssignExpression, _expr: &Expression) {
        self.visit_expression(ast, assignment_expression.expression);
    }

    fn visit_binary_expression(&mut self, ast: &mut Ast, binary_expression: &BinaryExpression, _expr: &Expression) {
        self.visit_expression(ast, binary_expression.left);
        self.visit_expression(ast, binary_expression.right);
    }

    fn visit_unary_expression(&mut self, ast: &mut Ast, unary_expression: &UnaryExpression, expr: &Expression);

    fn visit_parenthesised_expression(&mut self, ast: &mut Ast, parenthesised_expression: &ParenExpression, _expr: &Expression) {
        self.visit_expression(ast, parenthesised_expression.expression);
    }

    fn visit_call_expression(&mut self, ast: &mut Ast, call_expression: &CallExpression, _expr: &Expression) {
        for argument in &call_expression.arguments {
            self.visit_expression(ast, *argument);
        }
    }

    fn visit_error(&mut self, ast: &mut Ast, span: &TextSpan);
}
