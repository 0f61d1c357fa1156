use termion::color;
use termion::color::{Fg, Reset};
use crate::ast::*;
use crate::ast::visitor::ASTVisitor;
use ember_common::text::span::TextSpan;


/// Pretty-prints the resolved AST back as source, annotating expression types
pub struct ASTPrinter {
    indent: usize,
    coloured: bool,
    pub result: String,
}

impl ASTPrinter {
    const NUMBER_COLOUR: color::Cyan = color::Cyan;
    const TEXT_COLOUR: color::LightWhite = color::LightWhite;
    const KEYWORD_COLOUR: color::Magenta = color::Magenta;
    const VARIABLE_COLOUR: color::Green = color::Green;
    const BOOL_COLOUR: color::Yellow = color::Yellow;
    const TYPE_COLOUR: color::LightBlue = color::LightBlue;
    const STRING_COLOUR: color::LightGreen = color::LightGreen;

    pub fn new() -> Self {
        Self { indent: 0, coloured: true, result: String::new() }
    }

    /// Same layout without terminal escape codes
    pub fn plain() -> Self {
        Self { indent: 0, coloured: false, result: String::new() }
    }

    fn push<C: color::Color>(&mut self, colour: C, text: &str) {
        if self.coloured {
            self.result.push_str(&format!("{}", Fg(colour)));
        }
        self.result.push_str(text);
    }

    fn add_keyword(&mut self, keyword: &str) {
        self.push(Self::KEYWORD_COLOUR, keyword);
        self.result.push(' ');
    }

    fn add_text(&mut self, text: &str) {
        self.push(Self::TEXT_COLOUR, text);
    }

    fn add_type(&mut self, ty: &str) {
        self.push(Self::TYPE_COLOUR, ty);
    }

    fn add_padding(&mut self) {
        self.result.push_str(&"    ".repeat(self.indent));
    }

    fn add_body(&mut self, ast: &mut Ast, body: &Body) {
        self.add_text("{\n");
        self.indent += 1;
        self.visit_body(ast, body);
        self.indent -= 1;
        self.add_padding();
        self.add_text("}");
    }

    fn end_line(&mut self) {
        if self.coloured {
            self.result.push_str(&format!("{}", Fg(Reset)));
        }
        self.result.push('\n');
    }
}

impl ASTVisitor for ASTPrinter {
    fn visit_statement(&mut self, ast: &mut Ast, statement: StmtIndex) {
        self.add_padding();
        self.do_visit_statement(ast, statement);
        self.end_line();
    }

    fn visit_fx_decl(&mut self, ast: &mut Ast, fx_decl: &FxDeclaration, _statement: &Statement) {
        self.add_keyword("fx");
        self.push(Self::VARIABLE_COLOUR, &fx_decl.identifier.span.literal);
        self.add_text("(");

        for (index, parameter) in fx_decl.parameters.iter().enumerate() {
            if index > 0 {
                self.add_text(", ");
            }
            self.push(Self::VARIABLE_COLOUR, &parameter.identifier.span.literal);
            self.add_text(": ");
            self.add_type(&parameter.type_annotation.type_name.span.literal);
        }

        self.add_text(") ");
        if let Some(return_type) = &fx_decl.return_type {
            self.add_text("-> ");
            self.add_type(&return_type.type_name.span.literal);
            self.add_text(" ");
        }

        self.add_body(ast, &fx_decl.body);
    }

    fn visit_let_statement(&mut self, ast: &mut Ast, let_statement: &LetStatement, _statement: &Statement) {
        self.add_keyword("let");
        self.push(Self::VARIABLE_COLOUR, &let_statement.identifier.span.literal);

        let ty = ast.query_expression(let_statement.initialiser).ty.to_string();
        self.add_text(": ");
        self.add_type(&ty);
        self.add_text(" = ");

        self.visit_expression(ast, let_statement.initialiser);
    }

    fn visit_return_statement(&mut self, ast: &mut Ast, return_statement: &ReturnStatement, _statement: &Statement) {
        self.push(Self::KEYWORD_COLOUR, "return");
        if let Some(value) = return_statement.return_value {
            self.result.push(' ');
            self.visit_expression(ast, value);
        }
    }

    fn visit_if_statement(&mut self, ast: &mut Ast, if_statement: &IfStatement, _statement: &Statement) {
        self.add_keyword("if");
        self.visit_expression(ast, if_statement.condition);
        self.result.push(' ');
        self.add_body(ast, &if_statement.then_branch);

        if let Some(else_branch) = &if_statement.else_branch {
            self.result.push(' ');
            self.add_keyword("else");
            self.add_body(ast, &else_branch.body);
        }
    }

    fn visit_while_statement(&mut self, ast: &mut Ast, while_statement: &WhileStatement, _statement: &Statement) {
        self.add_keyword("while");
        self.visit_expression(ast, while_statement.condition);
        self.result.push(' ');
        self.add_body(ast, &while_statement.body);
    }

    fn visit_number_expression(&mut self, _ast: &mut Ast, number: &NumberExpression, _expr: &Expression) {
        self.push(Self::NUMBER_COLOUR, &number.number.to_string());
    }

    fn visit_string_expression(&mut self, _ast: &mut Ast, string: &StringExpression, _expr: &Expression) {
        self.push(Self::STRING_COLOUR, &format!("{:?}", string.value));
    }

    fn visit_boolean_expression(&mut self, _ast: &mut Ast, boolean: &BoolExpression, _expr: &Expression) {
        self.push(Self::BOOL_COLOUR, &boolean.value.to_string());
    }

    fn visit_variable_expression(&mut self, _ast: &mut Ast, variable_expression: &VarExpression, _expr: &Expression) {
        self.push(Self::VARIABLE_COLOUR, variable_expression.identifier());
    }

    fn visit_assignment_expression(&mut self, ast: &mut Ast, assignment_expression: &AssignExpression, _expr: &Expression) {
        self.push(Self::VARIABLE_COLOUR, &assignment_expression.identifier.span.literal);
        self.add_text(" = ");
        self.visit_expression(ast, assignment_expression.expression);
    }

    fn visit_binary_expression(&mut self, ast: &mut Ast, binary_expression: &BinaryExpression, _expr: &Expression) {
        self.visit_expression(ast, binary_expression.left);
        self.add_text(&format!(" {} ", binary_expression.operator.kind));
        self.visit_expression(ast, binary_expression.right);
    }

    fn visit_unary_expression(&mut self, ast: &mut Ast, unary_expression: &UnaryExpression, _expr: &Expression) {
        self.add_text(&unary_expression.operator.kind.to_string());
        self.visit_expression(ast, unary_expression.operand);
    }

    fn visit_parenthesised_expression(&mut self, ast: &mut Ast, parenthesised_expression: &ParenExpression, _expr: &Expression) {
        self.add_text("(");
        self.visit_expression(ast, parenthesised_expression.expression);
        self.add_text(")");
    }

    fn visit_call_expression(&mut self, ast: &mut Ast, call_expression: &CallExpression, _expr: &Expression) {
        self.push(Self::VARIABLE_COLOUR, call_expression.fx_name());
        self.add_text("(");

        for (index, argument) in call_expression.arguments.iter().enumerate() {
            if index > 0 {
                self.add_text(", ");
            }
            self.visit_expression(ast, *argument);
        }

        self.add_text(")");
    }

    fn visit_error(&mut self, _ast: &mut Ast, span: &TextSpan) {
        self.add_text(&format!("<error: {}>", span.literal));
    }
}
