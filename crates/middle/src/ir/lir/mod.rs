use std::fmt::{Display, Formatter};

use ember_common::{idx, IndexVec};
use ember_common::typings::Type;
use iced_x86::Register;

pub mod builder;
pub mod writer;


/// Low-level IR for a whole program, one entry per source function
#[derive(Debug, Clone)]
pub struct LIR {
    pub functions: IndexVec<FunctionIdx, Function>,
    pub basic_blocks: IndexVec<BasicBlockIdx, BasicBlock>,
    pub strings: IndexVec<StringIdx, String>,
}

impl LIR {
    pub fn new() -> Self {
        Self {
            functions: IndexVec::new(),
            basic_blocks: IndexVec::new(),
            strings: IndexVec::new(),
        }
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    /// Blocks of `function` in program order
    pub fn blocks_of<'a>(&'a self, function: &'a Function) -> impl Iterator<Item = (BasicBlockIdx, &'a BasicBlock)> + 'a {
        function.basic_blocks.iter().map(move |bb_idx| (*bb_idx, &self.basic_blocks[*bb_idx]))
    }

    pub fn intern_string(&mut self, value: &str) -> StringIdx {
        let interned = self.strings.indexed_iter()
            .find(|(_, existing)| existing.as_str() == value)
            .map(|(idx, _)| idx);

        match interned {
            Some(idx) => idx,
            None => self.strings.push(value.to_string()),
        }
    }
}

idx!(FunctionIdx);
idx!(BasicBlockIdx);
idx!(StringIdx);

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub basic_blocks: Vec<BasicBlockIdx>,
    pub parameter_count: usize,
    /// Parameters plus locals; slots below this are named variables
    pub declared_count: usize,
    /// Declared variables plus temporaries
    pub variable_count: usize,
    pub is_leaf: bool,
}

impl Function {
    pub fn is_temporary(&self, slot: usize) -> bool {
        slot >= self.declared_count
    }
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
    pub function: FunctionIdx,
    /// Assigned once dead and empty blocks are gone
    pub position: Option<usize>,
    pub is_jump_target: bool,
}

impl BasicBlock {
    pub fn new(function: FunctionIdx) -> Self {
        Self { instructions: Vec::new(), function, position: None, is_jump_target: false }
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|instruction| instruction.opcode().is_terminator())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl Condition {
    pub fn suffix(&self) -> &'static str {
        match self {
            Condition::Equal => "e",
            Condition::NotEqual => "ne",
            Condition::Less => "l",
            Condition::Greater => "g",
            Condition::LessEqual => "le",
            Condition::GreaterEqual => "ge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Marks the point a slot starts holding a value; never emitted
    Declare,
    Mov,
    Add,
    Sub,
    Imul,
    Idiv,
    /// Remainder of a signed division, lowered through `idiv` and `rdx`
    Irem,
    Cqo,
    Neg,
    Cmp,
    Lea,
    Push,
    Pop,
    Call,
    Jmp,
    Jcc(Condition),
    Ret,
}

impl Opcode {
    pub fn mnemonic(&self) -> String {
        match self {
            Opcode::Declare => "declare".to_string(),
            Opcode::Mov => "mov".to_string(),
            Opcode::Add => "add".to_string(),
            Opcode::Sub => "sub".to_string(),
            Opcode::Imul => "imul".to_string(),
            Opcode::Idiv => "idiv".to_string(),
            Opcode::Irem => "irem".to_string(),
            Opcode::Cqo => "cqo".to_string(),
            Opcode::Neg => "neg".to_string(),
            Opcode::Cmp => "cmp".to_string(),
            Opcode::Lea => "lea".to_string(),
            Opcode::Push => "push".to_string(),
            Opcode::Pop => "pop".to_string(),
            Opcode::Call => "call".to_string(),
            Opcode::Jmp => "jmp".to_string(),
            Opcode::Jcc(condition) => format!("j{}", condition.suffix()),
            Opcode::Ret => "ret".to_string(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Jcc(_) | Opcode::Ret)
    }
}

/// Callee of a call instruction together with its marshalled arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub symbol: String,
    pub arguments: Vec<Operand>,
    pub return_type: Type,
    /// Provided by the runtime support library rather than this module
    pub is_external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Parameter, local or temporary of the enclosing function
    Slot(usize),
    ReturnSlot,
    Block(BasicBlockIdx),
    Function(FunctionRef),
    Str(StringIdx),
    Register(Register),
    Memory { base: Register, offset: i32 },
    Immediate(i64),
    Flag(Condition),
}

impl Operand {
    pub fn as_slot(&self) -> Option<usize> {
        match self {
            Operand::Slot(slot) => Some(*slot),
            _ => None,
        }
    }

    /// Every virtual slot this operand reads or writes, call arguments included
    pub fn slots(&self) -> Vec<usize> {
        match self {
            Operand::Slot(slot) => vec![*slot],
            Operand::Function(function) => function.arguments.iter().flat_map(|argument| argument.slots()).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the operand still needs a physical location
    pub fn is_virtual(&self) -> bool {
        match self {
            Operand::Slot(_) | Operand::ReturnSlot => true,
            Operand::Function(function) => function.arguments.iter().any(|argument| argument.is_virtual()),
            _ => false,
        }
    }
}

/// An instruction is an opcode applied to zero, one or two operands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Nullary(Opcode),
    Unary(Opcode, Operand),
    Binary(Opcode, Operand, Operand),
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Nullary(opcode)
            | Instruction::Unary(opcode, _)
            | Instruction::Binary(opcode, _, _) => *opcode,
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Instruction::Nullary(_) => vec![],
            Instruction::Unary(_, operand) => vec![operand],
            Instruction::Binary(_, first, second) => vec![first, second],
        }
    }

    pub fn slots(&self) -> Vec<usize> {
        self.operands().into_iter().flat_map(|operand| operand.slots()).collect()
    }

    pub fn jump_target(&self) -> Option<BasicBlockIdx> {
        match self {
            Instruction::Unary(Opcode::Jmp | Opcode::Jcc(_), Operand::Block(target)) => Some(*target),
            _ => None,
        }
    }

    /// A `mov` whose source and destination are the same location
    pub fn is_dead_move(&self) -> bool {
        matches!(self, Instruction::Binary(Opcode::Mov, destination, source) if destination == source)
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Slot(slot) => write!(f, "%{}", slot),
            Operand::ReturnSlot => write!(f, "%ret"),
            Operand::Block(bb_idx) => write!(f, "bb{}", bb_idx.index),
            Operand::Function(function) => {
                write!(f, "{}(", function.symbol)?;
                for (position, argument) in function.arguments.iter().enumerate() {
                    if position > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                write!(f, ") -> {}", function.return_type)
            }
            Operand::Str(string) => write!(f, "str{}", string.index),
            Operand::Register(register) => write!(f, "{:?}", register),
            Operand::Memory { base, offset } => write!(f, "[{:?}{:+}]", base, offset),
            Operand::Immediate(value) => write!(f, "{}", value),
            Operand::Flag(condition) => write!(f, "flag.{}", condition.suffix()),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Nullary(opcode) => write!(f, "{}", opcode.mnemonic()),
            Instruction::Unary(opcode, operand) => write!(f, "{} {}", opcode.mnemonic(), operand),
            Instruction::Binary(opcode, first, second) => write!(f, "{} {}, {}", opcode.mnemonic(), first, second),
        }
    }
}
