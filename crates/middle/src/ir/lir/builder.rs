use anyhow::Result;
use ember_common::{Idx, bug_report};
use ember_common::diagnostics::DiagnosticsReportCell;
use ember_common::text::span::TextSpan;
use ember_common::typings::Type;
use ember_front::ast::{AssignExpression, Ast, BinaryExpression, BinaryOpKind, BoolExpression, CallExpression, ExprIndex, Expression, ExpressionKind, FxDeclaration, IfStatement, LetStatement, NumberExpression, ReturnStatement, Statement, StmtIndex, StringExpression, UnaryExpression, UnaryOpKind, VarExpression, WhileStatement};
use ember_front::ast::visitor::ASTVisitor;
use ember_front::compilation_unit::{Builtin, CallTarget, FunctionIndex, GlobalScope, VariableIndex, MAIN_FUNCTION};
use tracing::{debug, warn};

use crate::ir::lir::{BasicBlock, BasicBlockIdx, Function, FunctionIdx, FunctionRef, Instruction, Opcode, Operand, LIR};


/// Runtime symbols backing the built-in operations
pub const PRINT_INT_SYMBOL: &str = "ember_print_int";
pub const PRINT_BOOL_SYMBOL: &str = "ember_print_bool";
pub const PRINT_STR_SYMBOL: &str = "ember_print_str";
pub const TICK_SYMBOL: &str = "ember_tick";
pub const INT_TO_STRING_SYMBOL: &str = "ember_int_to_string";

/// Lowers a resolved AST into basic blocks over virtual slots
///
/// Every function gets an entry block and a trailing exit block holding `ret`;
/// `return` moves its value into the return slot and jumps to the exit block.
pub struct LIRBuilder<'a> {
    scope: &'a GlobalScope,
    diagnostics: DiagnosticsReportCell,
    lir: LIR,
    current_function: Option<FunctionIdx>,
    current_bb: Option<BasicBlockIdx>,
    exit_bb: Option<BasicBlockIdx>,
    next_slot: usize,
    last_operand: Option<Operand>,
    terminated: bool,
    failures: usize,
}

impl<'a> LIRBuilder<'a> {
    pub fn new(scope: &'a GlobalScope, diagnostics: DiagnosticsReportCell) -> Self {
        Self {
            scope,
            diagnostics,
            lir: LIR::new(),
            current_function: None,
            current_bb: None,
            exit_bb: None,
            next_slot: 0,
            last_operand: None,
            terminated: false,
            failures: 0,
        }
    }

    pub fn build(mut self, ast: &mut Ast) -> Result<LIR> {
        let scope = self.scope;
        for (fx_index, function) in scope.functions.indexed_iter() {
            self.build_function(ast, fx_index, &function.body);
        }

        if self.failures > 0 {
            anyhow::bail!("code generation failed with {} error(s)", self.failures);
        }

        Ok(self.lir)
    }

    fn build_function(&mut self, ast: &mut Ast, fx_index: FunctionIndex, body: &[StmtIndex]) {
        let scope = self.scope;
        let function = &scope.functions[fx_index];
        let declared_count = function.declared_count();

        let fx_idx = self.lir.functions.push(Function {
            name: function.name.clone(),
            return_type: function.return_type.clone(),
            basic_blocks: Vec::new(),
            parameter_count: function.parameters.len(),
            declared_count,
            variable_count: declared_count,
            is_leaf: true,
        });
        if fx_idx.as_index() != fx_index.as_index() {
            bug_report!("function `{}` built out of order", function.name);
        }

        self.current_function = Some(fx_idx);
        self.next_slot = declared_count;
        self.terminated = false;

        let entry_bb = self.lir.basic_blocks.push(BasicBlock::new(fx_idx));
        self.lir.functions[fx_idx].basic_blocks.push(entry_bb);
        self.current_bb = Some(entry_bb);

        let mut exit = BasicBlock::new(fx_idx);
        exit.instructions.push(Instruction::Nullary(Opcode::Ret));
        let exit_bb = self.lir.basic_blocks.push(exit);
        self.exit_bb = Some(exit_bb);

        for statement in body {
            self.visit_statement(ast, *statement);
        }

        if !self.terminated {
            if function.name == MAIN_FUNCTION {
                self.emit(Instruction::Binary(Opcode::Mov, Operand::ReturnSlot, Operand::Immediate(0)));
            } else if function.return_type.has_value() {
                warn!(
                    "Function '{}' with return type {} lacks an explicit return, adding a default return",
                    function.name, function.return_type
                );
                let default = self.default_value(&function.return_type);
                self.emit(Instruction::Binary(Opcode::Mov, Operand::ReturnSlot, default));
            }
            self.emit(Instruction::Unary(Opcode::Jmp, Operand::Block(exit_bb)));
        }

        let lir_function = &mut self.lir.functions[fx_idx];
        lir_function.basic_blocks.push(exit_bb);
        lir_function.variable_count = self.next_slot;

        debug!(
            function = %lir_function.name,
            blocks = lir_function.basic_blocks.len(),
            variables = lir_function.variable_count,
            leaf = lir_function.is_leaf,
            "built LIR function"
        );
    }

    fn function(&self) -> &Function {
        match self.current_function {
            Some(fx_idx) => &self.lir.functions[fx_idx],
            None => bug_report!("no function is being built"),
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        match self.current_bb {
            Some(bb_idx) => self.lir.basic_blocks[bb_idx].instructions.push(instruction),
            None => bug_report!("no basic block to emit `{}` into", instruction),
        }
    }

    fn emit_move(&mut self, destination: Operand, source: Operand) {
        if destination != source {
            self.emit(Instruction::Binary(Opcode::Mov, destination, source));
        }
    }

    fn new_temporary(&mut self) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.emit(Instruction::Unary(Opcode::Declare, Operand::Slot(slot)));

        slot
    }

    /// Reuses `operand` when it is already a temporary, otherwise copies it into a fresh one
    fn destination_for(&mut self, operand: Operand) -> usize {
        match operand {
            Operand::Slot(slot) if self.function().is_temporary(slot) => slot,
            operand => {
                let slot = self.new_temporary();
                self.emit_move(Operand::Slot(slot), operand);
                slot
            }
        }
    }

    fn evaluate(&mut self, ast: &mut Ast, expression: ExprIndex) -> Option<Operand> {
        self.last_operand = None;
        self.visit_expression(ast, expression);
        self.last_operand.take()
    }

    /// Evaluates an expression that must produce a value, substituting zero after a failure
    fn evaluate_value(&mut self, ast: &mut Ast, expression: ExprIndex) -> Operand {
        let failures = self.failures;

        match self.evaluate(ast, expression) {
            Some(operand) => operand,
            None => {
                if self.failures == failures {
                    let span = ast.query_expression(expression).span.clone();
                    self.fail_unresolved("a value", &span);
                }
                Operand::Immediate(0)
            }
        }
    }

    /// Zero of `ty`: `0`, `false` or the empty string
    fn default_value(&mut self, ty: &Type) -> Operand {
        match ty {
            Type::String => Operand::Str(self.lir.intern_string("")),
            _ => Operand::Immediate(0),
        }
    }

    /// Literals and variable reads emit nothing and cannot write a variable
    fn is_plain_read(ast: &Ast, expression: ExprIndex) -> bool {
        matches!(
            ast.query_expression(expression).kind,
            ExpressionKind::Number(_) | ExpressionKind::String(_) | ExpressionKind::Boolean(_) | ExpressionKind::Variable(_)
        )
    }

    fn variable_slot(&self, variable: VariableIndex) -> usize {
        self.scope.variables[variable].slot
    }

    fn fail_unsupported(&mut self, construct: &str, span: &TextSpan) {
        self.failures += 1;
        self.diagnostics.borrow_mut().report_unsupported_in_backend(construct, span);
    }

    fn fail_unresolved(&mut self, what: &str, span: &TextSpan) {
        self.failures += 1;
        self.diagnostics.borrow_mut().report_error(
            format!("unresolved in code generation"),
            format!("Expected {} for `{}` during code generation", what, span.literal),
            span.clone(),
        );
    }

    fn callee_for(&self, call_expression: &CallExpression, arguments: &[ExprIndex], ast: &Ast) -> Option<(String, Type, bool)> {
        match call_expression.target {
            CallTarget::Function(function) => {
                let callee = &self.scope.functions[function];
                Some((callee.name.clone(), callee.return_type.clone(), false))
            }
            CallTarget::Builtin(Builtin::Print) => {
                let argument = arguments.first().map(|argument| ast.query_expression(*argument).ty.clone());
                let symbol = match argument {
                    Some(Type::Bool) => PRINT_BOOL_SYMBOL,
                    Some(Type::String) => PRINT_STR_SYMBOL,
                    _ => PRINT_INT_SYMBOL,
                };
                Some((symbol.to_string(), Type::Void, true))
            }
            CallTarget::Builtin(Builtin::Tick) => Some((TICK_SYMBOL.to_string(), Type::Int, true)),
            CallTarget::Builtin(Builtin::ToString) => Some((INT_TO_STRING_SYMBOL.to_string(), Type::String, true)),
            CallTarget::Unresolved => None,
        }
    }
}

impl<'a> ASTVisitor for LIRBuilder<'a> {
    fn visit_statement(&mut self, ast: &mut Ast, statement: StmtIndex) {
        // nothing after a return in the same body is generated
        if self.terminated {
            return;
        }
        self.do_visit_statement(ast, statement);
    }

    fn visit_fx_decl(&mut self, _ast: &mut Ast, _fx_decl: &FxDeclaration, _statement: &Statement) {}

    fn visit_let_statement(&mut self, ast: &mut Ast, let_statement: &LetStatement, statement: &Statement) {
        let value = self.evaluate_value(ast, let_statement.initialiser);

        match let_statement.variable {
            Some(variable) => {
                let slot = self.variable_slot(variable);
                self.emit(Instruction::Unary(Opcode::Declare, Operand::Slot(slot)));
                self.emit_move(Operand::Slot(slot), value);
            }
            None => self.fail_unresolved("a declared variable", &statement.span),
        }
    }

    fn visit_return_statement(&mut self, ast: &mut Ast, return_statement: &ReturnStatement, _statement: &Statement) {
        if let Some(return_value) = return_statement.return_value {
            let value = self.evaluate_value(ast, return_value);
            self.emit_move(Operand::ReturnSlot, value);
        }

        match self.exit_bb {
            Some(exit_bb) => self.emit(Instruction::Unary(Opcode::Jmp, Operand::Block(exit_bb))),
            None => bug_report!("return outside of a function body"),
        }
        self.terminated = true;
    }

    fn visit_if_statement(&mut self, _ast: &mut Ast, _if_statement: &IfStatement, statement: &Statement) {
        self.fail_unsupported("`if` statement", &statement.span);
    }

    fn visit_while_statement(&mut self, _ast: &mut Ast, _while_statement: &WhileStatement, statement: &Statement) {
        self.fail_unsupported("`while` loop", &statement.span);
    }

    fn visit_number_expression(&mut self, _ast: &mut Ast, number: &NumberExpression, _expr: &Expression) {
        self.last_operand = Some(Operand::Immediate(number.number));
    }

    fn visit_string_expression(&mut self, _ast: &mut Ast, string: &StringExpression, _expr: &Expression) {
        let string = self.lir.intern_string(&string.value);
        self.last_operand = Some(Operand::Str(string));
    }

    fn visit_boolean_expression(&mut self, _ast: &mut Ast, boolean: &BoolExpression, _expr: &Expression) {
        self.last_operand = Some(Operand::Immediate(boolean.value as i64));
    }

    fn visit_variable_expression(&mut self, _ast: &mut Ast, variable_expression: &VarExpression, expr: &Expression) {
        match variable_expression.variable {
            Some(variable) => self.last_operand = Some(Operand::Slot(self.variable_slot(variable))),
            None => self.fail_unresolved("a declared variable", &expr.span),
        }
    }

    fn visit_assignment_expression(&mut self, ast: &mut Ast, assignment_expression: &AssignExpression, expr: &Expression) {
        let value = self.evaluate_value(ast, assignment_expression.expression);

        match assignment_expression.variable {
            Some(variable) => {
                let slot = Operand::Slot(self.variable_slot(variable));
                self.emit_move(slot.clone(), value);
                self.last_operand = Some(slot);
            }
            None => self.fail_unresolved("a declared variable", &expr.span),
        }
    }

    fn visit_binary_expression(&mut self, ast: &mut Ast, binary_expression: &BinaryExpression, expr: &Expression) {
        let operator = binary_expression.operator.kind;
        if operator.is_comparison() {
            self.fail_unsupported(&format!("comparison `{}`", operator), &expr.span);
            self.last_operand = Some(Operand::Immediate(0));
            return;
        }
        if ast.query_expression(binary_expression.left).ty == Type::String {
            self.fail_unsupported("string concatenation", &expr.span);
            self.last_operand = Some(Operand::Immediate(0));
            return;
        }

        // the left value is captured before the right side can assign to it
        let left = self.evaluate_value(ast, binary_expression.left);
        let destination = self.destination_for(left);
        let right = self.evaluate_value(ast, binary_expression.right);

        let opcode = match operator {
            BinaryOpKind::Plus => Opcode::Add,
            BinaryOpKind::Minus => Opcode::Sub,
            BinaryOpKind::Multiply => Opcode::Imul,
            BinaryOpKind::Divide => Opcode::Idiv,
            BinaryOpKind::Modulo => Opcode::Irem,
            _ => bug_report!("comparison `{}` reached arithmetic lowering", operator),
        };
        self.emit(Instruction::Binary(opcode, Operand::Slot(destination), right));
        self.last_operand = Some(Operand::Slot(destination));
    }

    fn visit_unary_expression(&mut self, ast: &mut Ast, unary_expression: &UnaryExpression, _expr: &Expression) {
        let operand = self.evaluate_value(ast, unary_expression.operand);
        let destination = self.destination_for(operand);

        match unary_expression.operator.kind {
            UnaryOpKind::Negation => self.emit(Instruction::Unary(Opcode::Neg, Operand::Slot(destination))),
        }
        self.last_operand = Some(Operand::Slot(destination));
    }

    fn visit_call_expression(&mut self, ast: &mut Ast, call_expression: &CallExpression, expr: &Expression) {
        // strictly left to right, nested calls complete before this one marshals
        let mut arguments = Vec::with_capacity(call_expression.arguments.len());
        for (position, argument) in call_expression.arguments.iter().enumerate() {
            let value = self.evaluate_value(ast, *argument);
            let later_may_write = call_expression.arguments[position + 1..].iter()
                .any(|later| !Self::is_plain_read(ast, *later));

            let value = match value {
                Operand::Slot(slot) if later_may_write && !self.function().is_temporary(slot) => {
                    let copy = self.new_temporary();
                    self.emit_move(Operand::Slot(copy), Operand::Slot(slot));
                    Operand::Slot(copy)
                }
                other => other,
            };
            arguments.push(value);
        }

        let Some((symbol, return_type, is_external)) = self.callee_for(call_expression, &call_expression.arguments, ast) else {
            self.fail_unresolved("a resolved callee", &expr.span);
            return;
        };

        let has_value = return_type.has_value();
        self.emit(Instruction::Unary(Opcode::Call, Operand::Function(FunctionRef {
            symbol,
            arguments,
            return_type,
            is_external,
        })));
        if let Some(fx_idx) = self.current_function {
            self.lir.functions[fx_idx].is_leaf = false;
        }

        if has_value {
            let result = self.new_temporary();
            self.emit(Instruction::Binary(Opcode::Mov, Operand::Slot(result), Operand::ReturnSlot));
            self.last_operand = Some(Operand::Slot(result));
        }
    }

    fn visit_error(&mut self, _ast: &mut Ast, span: &TextSpan) {
        self.fail_unresolved("a well-formed expression", span);
    }
}
