use crate::ast::{Ast, BinaryOp, BinaryOpKind, Body, ElseBranch, ExprIndex, FxParameter, FxReturnType, StmtIndex, TypeAnnotation, UnaryOp, UnaryOpKind};
use ember_common::diagnostics::DiagnosticsReportCell;
use ember_common::token::{Token, TokenKind};
use std::cell::Cell;


#[derive(Debug, Clone)]
pub struct Counter {
    value: Cell<usize>
}

impl Counter {
    pub fn new() -> Self {
        Self { value: Cell::new(0) }
    }

    pub fn increment(&self) {
        self.value.set(self.value.get() + 1);
    }

    pub fn get_value(&self) -> usize {
        self.value.get()
    }
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: Counter,
    diagnostics_report: DiagnosticsReportCell,
    ast: &'a mut Ast,
    function_depth: usize,
}

impl <'a> Parser<'a> {
    /// `tokens` must end with an `Eof` token
    pub fn new(tokens: Vec<Token>, diagnostics_report: DiagnosticsReportCell, ast: &'a mut Ast) -> Self {
        Self {
            tokens,
            current: Counter::new(),
            diagnostics_report,
            ast,
            function_depth: 0,
        }
    }

    pub fn parse(&mut self) {
        while !self.is_at_end() {
            let start = self.current.get_value();
            let statement = self.parse_statement();
            self.ast.top_level.push(statement);

            // recovery: never stall on a token nothing can consume
            if self.current.get_value() == start {
                self.consume();
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn parse_statement(&mut self) -> StmtIndex {
        let statement = match self.current().kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Function => self.parse_fx_declaration(),
            _ => {
                let expr = self.parse_expression();
                self.ast.expression_statement(expr).id
            }
        };

        self.consume_if(TokenKind::SemiColon);
        statement
    }

    fn parse_body(&mut self) -> Body {
        let open_brace = self.consume_and_check(TokenKind::OpenBrace).clone();
        let mut statements = Vec::new();

        while self.current().kind != TokenKind::CloseBrace && !self.is_at_end() {
            let start = self.current.get_value();
            statements.push(self.parse_statement());
            if self.current.get_value() == start {
                self.consume();
            }
        }

        let close_brace = self.consume_and_check(TokenKind::CloseBrace).clone();
        Body::new(open_brace, statements, close_brace)
    }

    fn parse_fx_declaration(&mut self) -> StmtIndex {
        let fx_keyword = self.consume_and_check(TokenKind::Function).clone();
        let identifier = self.consume_and_check(TokenKind::Identifier).clone();

        if self.function_depth > 0 {
            self.diagnostics_report.borrow_mut().report_nested_function(&identifier);
        }

        let parameters = self.parse_parameter_list();
        let return_type = self.parse_optional_return_type();

        self.function_depth += 1;
        let body = self.parse_body();
        self.function_depth -= 1;

        self.ast.fx_declaration(fx_keyword, identifier, parameters, return_type, body).id
    }

    fn parse_parameter_list(&mut self) -> Vec<FxParameter> {
        self.consume_and_check(TokenKind::LeftParen);
        let mut parameters = Vec::new();

        while self.current().kind != TokenKind::RightParen && !self.is_at_end() {
            let identifier = self.consume_and_check(TokenKind::Identifier).clone();
            let type_annotation = self.parse_type_annotation();
            parameters.push(FxParameter { identifier, type_annotation });

            if self.current().kind != TokenKind::RightParen {
                self.consume_and_check(TokenKind::Comma);
            }
        }

        self.consume_and_check(TokenKind::RightParen);
        parameters
    }

    fn parse_optional_return_type(&mut self) -> Option<FxReturnType> {
        let arrow = self.consume_if(TokenKind::Arrow)?.clone();
        let type_name = self.consume_and_check(TokenKind::Identifier).clone();

        Some(FxReturnType { arrow, type_name })
    }

    fn parse_type_annotation(&mut self) -> TypeAnnotation {
        let colon = self.consume_and_check(TokenKind::Colon).clone();
        let type_name = self.consume_and_check(TokenKind::Identifier).clone();

        TypeAnnotation { colon, type_name }
    }

    fn parse_let_statement(&mut self) -> StmtIndex {
        let let_keyword = self.consume_and_check(TokenKind::Let).clone();
        let identifier = self.consume_and_check(TokenKind::Identifier).clone();
        let type_annotation = if self.current().kind == TokenKind::Colon {
            Some(self.parse_type_annotation())
        } else {
            None
        };

        self.consume_and_check(TokenKind::Equals);
        let initialiser = self.parse_expression();

        self.ast.let_statement(let_keyword, identifier, type_annotation, initialiser).id
    }

    fn parse_return_statement(&mut self) -> StmtIndex {
        let return_keyword = self.consume_and_check(TokenKind::Return).clone();
        let return_value = match self.current().kind {
            TokenKind::SemiColon | TokenKind::CloseBrace | TokenKind::Eof => None,
            _ => Some(self.parse_expression()),
        };

        self.ast.return_statement(return_keyword, return_value).id
    }

    fn parse_if_statement(&mut self) -> StmtIndex {
        let if_keyword = self.consume_and_check(TokenKind::If).clone();
        let condition = self.parse_expression();
        let then_branch = self.parse_body();
        let else_branch = match self.consume_if(TokenKind::Else).cloned() {
            Some(else_keyword) => Some(ElseBranch { else_keyword, body: self.parse_body() }),
            None => None,
        };

        self.ast.if_statement(if_keyword, condition, then_branch, else_branch).id
    }

    fn parse_while_statement(&mut self) -> StmtIndex {
        let while_keyword = self.consume_and_check(TokenKind::While).clone();
        let condition = self.parse_expression();
        let body = self.parse_body();

        self.ast.while_statement(while_keyword, condition, body).id
    }

    fn parse_expression(&mut self) -> ExprIndex {
        if self.current().kind == TokenKind::Identifier && self.peek(1).kind == TokenKind::Equals {
            let identifier = self.consume().clone();
            let equals = self.consume().clone();
            let expression = self.parse_expression();

            return self.ast.assignment_expression(identifier, equals, expression).id;
        }

        let expression = self.parse_binary_expression(0);

        // `(a) = 1`, `1 = 2`, ...
        if self.current().kind == TokenKind::Equals {
            let span = self.ast.query_expression(expression).span.clone();
            self.diagnostics_report.borrow_mut().report_invalid_assignment_target(&span);
            self.consume();
            self.parse_expression();
        }

        expression
    }

    /// Precedence climbing over left-associative operators
    fn parse_binary_expression(&mut self, min_precedence: u8) -> ExprIndex {
        let mut left = self.parse_unary_expression();

        while let Some(operator) = self.parse_binary_operator() {
            let precedence = operator.precedence();
            if precedence < min_precedence {
                break;
            }

            self.consume();
            let right = self.parse_binary_expression(precedence + 1);
            left = self.ast.binary_expression(operator, left, right).id;
        }

        left
    }

    fn parse_unary_expression(&mut self) -> ExprIndex {
        if self.current().kind == TokenKind::Minus {
            let operator = UnaryOp::new(UnaryOpKind::Negation, self.consume().clone());
            let operand = self.parse_unary_expression();
            return self.ast.unary_expression(operator, operand).id;
        }

        self.parse_primary_expression()
    }

    fn parse_binary_operator(&self) -> Option<BinaryOp> {
        let token = self.current();

        let kind = match token.kind {
            TokenKind::Plus => BinaryOpKind::Plus,
            TokenKind::Minus => BinaryOpKind::Minus,
            TokenKind::Asterisk => BinaryOpKind::Multiply,
            TokenKind::Slash => BinaryOpKind::Divide,
            TokenKind::Percent => BinaryOpKind::Modulo,
            TokenKind::EqualsEquals => BinaryOpKind::Equals,
            TokenKind::NotEquals => BinaryOpKind::NotEquals,
            TokenKind::LessThan => BinaryOpKind::LessThan,
            TokenKind::GreaterThan => BinaryOpKind::GreaterThan,
            TokenKind::LessThanOrEqual => BinaryOpKind::LessThanOrEqual,
            TokenKind::GreaterThanOrEqual => BinaryOpKind::GreaterThanOrEqual,
            _ => return None,
        };

        Some(BinaryOp::new(kind, token.clone()))
    }

    fn parse_call_expression(&mut self, callee: Token) -> ExprIndex {
        let left_paren = self.consume_and_check(TokenKind::LeftParen).clone();
        let mut arguments = Vec::new();

        while self.current().kind != TokenKind::RightParen && !self.is_at_end() {
            arguments.push(self.parse_expression());

            if self.current().kind != TokenKind::RightParen {
                self.consume_and_check(TokenKind::Comma);
            }
        }

        let right_paren = self.consume_and_check(TokenKind::RightParen).clone();
        self.ast.call_expression(callee, left_paren, arguments, right_paren).id
    }

    fn parse_primary_expression(&mut self) -> ExprIndex {
        let token = self.consume().clone();

        match token.kind.clone() {
            TokenKind::Number(number) => self.ast.number_expression(token, number).id,
            TokenKind::String(value) => self.ast.string_expression(token, value).id,
            TokenKind::True | TokenKind::False => {
                let value = token.kind == TokenKind::True;
                self.ast.boolean_expression(token, value).id
            }
            TokenKind::LeftParen => {
                let expression = self.parse_expression();
                let right_paren = self.consume_and_check(TokenKind::RightParen).clone();
                self.ast.parenthesised_expression(token, expression, right_paren).id
            }
            TokenKind::Identifier => {
                if self.current().kind == TokenKind::LeftParen {
                    return self.parse_call_expression(token);
                }
                self.ast.variable_expression(token).id
            }
            TokenKind::NumberOutOfRange => {
                self.diagnostics_report.borrow_mut().report_integer_out_of_range(&token);
                self.ast.error_expression(token.span).id
            }
            TokenKind::Bad => {
                self.diagnostics_report.borrow_mut().report_bad_character(&token);
                self.ast.error_expression(token.span).id
            }
            _ => {
                self.diagnostics_report.borrow_mut().report_expected_expression(&token);
                self.ast.error_expression(token.span).id
            }
        }
    }

    fn current(&self) -> &Token {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> &Token {
        let index = (self.current.get_value() + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn consume(&self) -> &Token {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.current.increment();
        }

        token
    }

    fn consume_and_check(&self, kind: TokenKind) -> &Token {
        let token = self.consume();

        if token.kind != kind {
            self.diagnostics_report.borrow_mut().report_unexpected_token(&kind, token);
        }

        token
    }

    fn consume_if(&self, kind: TokenKind) -> Option<&Token> {
        if self.current().kind == kind {
            Some(self.consume())
        } else {
            None
        }
    }
}
