//! IR tree nodes.
//!
//! Trees are built bottom-up and rewritten rather than mutated. Every
//! non-leaf node exposes its child expressions in evaluation order through
//! `kids` and can be rebuilt around new children with `build`, which keeps
//! the node's tag and payload (operator, label, constant) untouched.

use super::temp::{Label, Temp};
use itertools::Itertools;
use std::fmt;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    #[display(fmt = "PLUS")]
    Plus,
    #[display(fmt = "MINUS")]
    Minus,
    #[display(fmt = "MUL")]
    Mul,
    #[display(fmt = "DIV")]
    Div,
    #[display(fmt = "MOD")]
    Mod,
    #[display(fmt = "AND")]
    And,
    #[display(fmt = "OR")]
    Or,
    #[display(fmt = "XOR")]
    Xor,
    #[display(fmt = "LSHIFT")]
    Lshift,
    #[display(fmt = "RSHIFT")]
    Rshift,
    #[display(fmt = "ARSHIFT")]
    Arshift,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    #[display(fmt = "EQ")]
    Eq,
    #[display(fmt = "NE")]
    Ne,
    #[display(fmt = "LT")]
    Lt,
    #[display(fmt = "GT")]
    Gt,
    #[display(fmt = "LE")]
    Le,
    #[display(fmt = "GE")]
    Ge,
    #[display(fmt = "ULT")]
    Ult,
    #[display(fmt = "ULE")]
    Ule,
    #[display(fmt = "UGT")]
    Ugt,
    #[display(fmt = "UGE")]
    Uge,
}

impl RelOp {
    /// The relation that holds exactly when `self` does not.
    pub fn negate(self) -> Self {
        use self::RelOp::*;
        match self {
            Eq => Ne,
            Ne => Eq,
            Lt => Ge,
            Ge => Lt,
            Gt => Le,
            Le => Gt,
            Ult => Uge,
            Uge => Ult,
            Ugt => Ule,
            Ule => Ugt,
        }
    }

    /// The relation with swapped operands: `a op b <=> b op.commute() a`.
    pub fn commute(self) -> Self {
        use self::RelOp::*;
        match self {
            Lt => Gt,
            Gt => Lt,
            Le => Ge,
            Ge => Le,
            Ult => Ugt,
            Ugt => Ult,
            Ule => Uge,
            Uge => Ule,
            op => op,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exp {
    Const(i32),
    Name(Label),
    Temp(Temp),
    BinOp(BinOp, Box<Exp>, Box<Exp>),
    Mem(Box<Exp>),
    /// Function address and arguments.
    Call(Box<Exp>, Vec<Exp>),
    /// Run the statement, then evaluate to the expression.
    ESeq(Box<Stm>, Box<Exp>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stm {
    /// Store `src` into `dst`, which must be a `Temp` or a `Mem`.
    Move(Exp, Exp),
    /// Evaluate for side effects, discard the result.
    Expr(Exp),
    /// Jump to the computed address, which is one of the listed labels.
    Jump(Exp, Vec<Label>),
    CJump(RelOp, Exp, Exp, Label, Label),
    Label(Label),
    Seq(Box<Stm>, Box<Stm>),
}

/// The non-child payload of an expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpKind {
    Const(i32),
    Name(Label),
    Temp(Temp),
    BinOp(BinOp),
    Mem,
    Call,
    /// The statement of an `ESeq` is payload, its expression is the only
    /// kid.
    ESeq(Box<Stm>),
}

impl ExpKind {
    /// Rebuild a node of this kind around `kids`.
    ///
    /// # Panics
    ///
    /// Panics if the number of kids does not fit the kind.
    pub fn build(self, kids: Vec<Exp>) -> Exp {
        let mut kids = kids.into_iter();
        let exp = match self {
            ExpKind::Const(value) => Exp::Const(value),
            ExpKind::Name(label) => Exp::Name(label),
            ExpKind::Temp(temp) => Exp::Temp(temp),
            ExpKind::BinOp(op) => {
                let left = kids.next().expect("binop needs a left operand");
                let right = kids.next().expect("binop needs a right operand");
                Exp::BinOp(op, Box::new(left), Box::new(right))
            }
            ExpKind::Mem => Exp::Mem(Box::new(kids.next().expect("mem needs an address"))),
            ExpKind::Call => {
                let func = kids.next().expect("call needs a function");
                let args = kids.by_ref().collect();
                Exp::Call(Box::new(func), args)
            }
            ExpKind::ESeq(stm) => Exp::ESeq(stm, Box::new(kids.next().expect("eseq needs a value"))),
        };
        debug_assert!(kids.next().is_none(), "too many kids");
        exp
    }
}

impl Exp {
    pub fn binop(op: BinOp, left: Exp, right: Exp) -> Exp {
        Exp::BinOp(op, Box::new(left), Box::new(right))
    }

    pub fn mem(addr: Exp) -> Exp {
        Exp::Mem(Box::new(addr))
    }

    pub fn call(func: Exp, args: Vec<Exp>) -> Exp {
        Exp::Call(Box::new(func), args)
    }

    pub fn eseq(stm: Stm, exp: Exp) -> Exp {
        Exp::ESeq(Box::new(stm), Box::new(exp))
    }

    pub fn kind(&self) -> ExpKind {
        match self {
            Exp::Const(value) => ExpKind::Const(*value),
            Exp::Name(label) => ExpKind::Name(label.clone()),
            Exp::Temp(temp) => ExpKind::Temp(*temp),
            Exp::BinOp(op, ..) => ExpKind::BinOp(*op),
            Exp::Mem(_) => ExpKind::Mem,
            Exp::Call(..) => ExpKind::Call,
            Exp::ESeq(stm, _) => ExpKind::ESeq(stm.clone()),
        }
    }

    /// Child expressions in evaluation order.
    pub fn kids(&self) -> Vec<&Exp> {
        match self {
            Exp::Const(_) | Exp::Name(_) | Exp::Temp(_) => vec![],
            Exp::BinOp(_, left, right) => vec![&**left, &**right],
            Exp::Mem(addr) => vec![&**addr],
            Exp::Call(func, args) => std::iter::once(&**func).chain(args.iter()).collect(),
            Exp::ESeq(_, exp) => vec![&**exp],
        }
    }

    /// Split into payload and owned kids. `kind.build(kids)` restores the
    /// node.
    pub fn into_parts(self) -> (ExpKind, Vec<Exp>) {
        match self {
            Exp::Const(value) => (ExpKind::Const(value), vec![]),
            Exp::Name(label) => (ExpKind::Name(label), vec![]),
            Exp::Temp(temp) => (ExpKind::Temp(temp), vec![]),
            Exp::BinOp(op, left, right) => (ExpKind::BinOp(op), vec![*left, *right]),
            Exp::Mem(addr) => (ExpKind::Mem, vec![*addr]),
            Exp::Call(func, args) => {
                let mut kids = Vec::with_capacity(args.len() + 1);
                kids.push(*func);
                kids.extend(args);
                (ExpKind::Call, kids)
            }
            Exp::ESeq(stm, exp) => (ExpKind::ESeq(stm), vec![*exp]),
        }
    }

    /// A node with the same tag and payload as `self`, but with `kids` as
    /// children.
    pub fn build(&self, kids: Vec<Exp>) -> Exp {
        self.kind().build(kids)
    }

    pub fn is_call(&self) -> bool {
        match self {
            Exp::Call(..) => true,
            _ => false,
        }
    }
}

/// The non-child payload of a statement node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmKind {
    /// `Move(Temp(t), _)`: the destination is payload, the source the only
    /// kid.
    MoveTemp(Temp),
    /// `Move(Mem(addr), src)`: kids are `[addr, src]`.
    MoveMem,
    Expr,
    Jump(Vec<Label>),
    CJump(RelOp, Label, Label),
    Label(Label),
}

impl StmKind {
    pub fn build(self, kids: Vec<Exp>) -> Stm {
        let mut kids = kids.into_iter();
        let mut next = || kids.next().expect("statement is missing a kid");
        match self {
            StmKind::MoveTemp(temp) => Stm::Move(Exp::Temp(temp), next()),
            StmKind::MoveMem => {
                let addr = next();
                Stm::Move(Exp::mem(addr), next())
            }
            StmKind::Expr => Stm::Expr(next()),
            StmKind::Jump(targets) => Stm::Jump(next(), targets),
            StmKind::CJump(op, t, f) => {
                let left = next();
                Stm::CJump(op, left, next(), t, f)
            }
            StmKind::Label(label) => Stm::Label(label),
        }
    }
}

impl Stm {
    pub fn seq(first: Stm, second: Stm) -> Stm {
        Stm::Seq(Box::new(first), Box::new(second))
    }

    /// Chain `stms` into right-nested `Seq`s. An empty list becomes a no-op.
    pub fn seq_all(stms: Vec<Stm>) -> Stm {
        let mut stms = stms.into_iter().rev();
        match stms.next() {
            None => Stm::nop(),
            Some(last) => stms.fold(last, |acc, stm| Stm::seq(stm, acc)),
        }
    }

    /// The canonical no-op statement.
    pub fn nop() -> Stm {
        Stm::Expr(Exp::Const(0))
    }

    pub fn is_nop(&self) -> bool {
        match self {
            Stm::Expr(Exp::Const(_)) => true,
            _ => false,
        }
    }

    pub fn jump_to(label: Label) -> Stm {
        Stm::Jump(Exp::Name(label.clone()), vec![label])
    }

    pub fn is_jump(&self) -> bool {
        match self {
            Stm::Jump(..) | Stm::CJump(..) => true,
            _ => false,
        }
    }

    /// Child expressions in evaluation order. `Seq` has no kids, and the
    /// destination `Temp` of a move is not a kid.
    pub fn kids(&self) -> Vec<&Exp> {
        match self {
            Stm::Move(Exp::Temp(_), src) => vec![src],
            Stm::Move(Exp::Mem(addr), src) => vec![&**addr, src],
            Stm::Move(dst, src) => vec![dst, src],
            Stm::Expr(exp) | Stm::Jump(exp, _) => vec![exp],
            Stm::CJump(_, left, right, ..) => vec![left, right],
            Stm::Label(_) | Stm::Seq(..) => vec![],
        }
    }

    /// Split into payload and owned kids. Statements without a `StmKind`
    /// are handed back unchanged.
    pub fn into_parts(self) -> Result<(StmKind, Vec<Exp>), Stm> {
        match self {
            Stm::Move(Exp::Temp(temp), src) => Ok((StmKind::MoveTemp(temp), vec![src])),
            Stm::Move(Exp::Mem(addr), src) => Ok((StmKind::MoveMem, vec![*addr, src])),
            Stm::Expr(exp) => Ok((StmKind::Expr, vec![exp])),
            Stm::Jump(exp, targets) => Ok((StmKind::Jump(targets), vec![exp])),
            Stm::CJump(op, left, right, t, f) => Ok((StmKind::CJump(op, t, f), vec![left, right])),
            Stm::Label(label) => Ok((StmKind::Label(label), vec![])),
            stm @ Stm::Move(..) | stm @ Stm::Seq(..) => Err(stm),
        }
    }

    /// The payload of this statement, or `None` for `Seq` and for moves
    /// into something other than a `Temp` or `Mem`.
    pub fn kind(&self) -> Option<StmKind> {
        Some(match self {
            Stm::Move(Exp::Temp(temp), _) => StmKind::MoveTemp(*temp),
            Stm::Move(Exp::Mem(_), _) => StmKind::MoveMem,
            Stm::Move(..) | Stm::Seq(..) => return None,
            Stm::Expr(_) => StmKind::Expr,
            Stm::Jump(_, targets) => StmKind::Jump(targets.clone()),
            Stm::CJump(op, _, _, t, f) => StmKind::CJump(*op, t.clone(), f.clone()),
            Stm::Label(label) => StmKind::Label(label.clone()),
        })
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exp::Const(value) => write!(fmt, "CONST {}", value),
            Exp::Name(label) => write!(fmt, "NAME {}", label),
            Exp::Temp(temp) => write!(fmt, "TEMP {}", temp),
            Exp::BinOp(op, left, right) => write!(fmt, "BINOP({}, {}, {})", op, left, right),
            Exp::Mem(addr) => write!(fmt, "MEM({})", addr),
            Exp::Call(func, args) => write!(fmt, "CALL({}, [{}])", func, args.iter().join(", ")),
            Exp::ESeq(stm, exp) => write!(fmt, "ESEQ({}, {})", stm, exp),
        }
    }
}

impl fmt::Display for Stm {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stm::Move(dst, src) => write!(fmt, "MOVE({}, {})", dst, src),
            Stm::Expr(exp) => write!(fmt, "EXP({})", exp),
            Stm::Jump(exp, targets) => write!(fmt, "JUMP({}, [{}])", exp, targets.iter().join(", ")),
            Stm::CJump(op, left, right, t, f) => {
                write!(fmt, "CJUMP({}, {}, {}, {}, {})", op, left, right, t, f)
            }
            Stm::Label(label) => write!(fmt, "LABEL {}", label),
            Stm::Seq(first, second) => write!(fmt, "SEQ({}, {})", first, second),
        }
    }
}
