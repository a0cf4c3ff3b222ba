//! The behavior-equation DSL.
//!
//! A handful of the CPU's combinational equations are naturally expressed
//! as a small algebraic expression tree over [`BitVec`] — priority-ordered
//! case selection ("pick the first matching condition"), two-way muxing,
//! and local let-bindings for a sub-expression used by several cases. This
//! module gives that shape a real (if small) AST, evaluated by a visitor
//! ([`Expr::eval`]) against an [`Env`] of named signal values, rather than
//! letting every call site hand-roll its own `if`/`else if` chain.
//!
//! Most combinational bodies in this crate (the ALU, the decoder, the CSR
//! file) are still plain Rust, the same way functional units elsewhere
//! are plain Rust inside `define_units!` bodies — this AST is reserved
//! for the places that are genuinely a mux/case/let expression over
//! already-computed signals: pipeline-latch input selection, trap-cause
//! selection, and CSR read-address overrides.

use std::collections::HashMap;

use crate::bitvec::BitVec;

/// An environment of named signal values, consulted by [`Expr::Signal`]
/// and extended locally by [`Expr::Let`].
#[derive(Debug, Default, Clone)]
pub struct Env {
    vars: HashMap<&'static str, BitVec>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: &'static str, value: BitVec) -> &mut Self {
        self.vars.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> BitVec {
        *self
            .vars
            .get(name)
            .unwrap_or_else(|| panic!("behavior DSL: unbound signal `{name}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    LtU,
    LtS,
    GeU,
    GeS,
    ShlLogical,
    ShrLogical,
    ShrArith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

/// A tagged-value node of the behavior DSL's expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal constant of a fixed width.
    Lit(BitVec),
    /// A reference to a named signal already present in the evaluation [`Env`].
    Signal(&'static str),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    UnOp(UnOp, Box<Expr>),
    /// `a[hi:lo]`
    Slice(Box<Expr>, u8, u8),
    /// `{hi, lo}`, Verilog-style bit concatenation.
    Concat(Box<Expr>, Box<Expr>),
    /// Two-way select.
    Mux(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Priority-ordered case list, matching a `[ cond: val; ... ; 1: default ]`
    /// mux-chain syntax: the first entry whose condition evaluates to a
    /// nonzero (true) value wins. The list must be exhaustive (typically
    /// ended by a literal `1` / always-true condition); panics otherwise,
    /// since an undriven wire is an elaboration-time bug, not a runtime one.
    Case(Vec<(Expr, Expr)>),
    /// Bind `name` to the evaluated first expression within the scope of
    /// the second.
    Let(&'static str, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn lit(v: BitVec) -> Expr {
        Expr::Lit(v)
    }

    pub fn sig(name: &'static str) -> Expr {
        Expr::Signal(name)
    }

    pub fn case(arms: Vec<(Expr, Expr)>) -> Expr {
        Expr::Case(arms)
    }

    /// Evaluate this expression to a [`BitVec`] against `env`.
    ///
    /// Evaluation is a pure fold over the tree: each node is visited at
    /// most once per call (the caller's [`Env`] may itself memoize shared
    /// sub-expressions across a sub-phase by binding them once with
    /// [`Expr::Let`] and referencing the bound name repeatedly).
    pub fn eval(&self, env: &Env) -> BitVec {
        match self {
            Expr::Lit(v) => *v,
            Expr::Signal(name) => env.get(name),
            Expr::BinOp(op, a, b) => eval_binop(*op, &a.eval(env), &b.eval(env)),
            Expr::UnOp(op, a) => eval_unop(*op, &a.eval(env)),
            Expr::Slice(e, hi, lo) => e.eval(env).slice(*hi, *lo),
            Expr::Concat(hi, lo) => hi.eval(env).concat(&lo.eval(env)),
            Expr::Mux(cond, a, b) => BitVec::mux(cond.eval(env).as_bool(), a.eval(env), b.eval(env)),
            Expr::Case(arms) => {
                for (cond, val) in arms {
                    if cond.eval(env).as_bool() {
                        return val.eval(env);
                    }
                }
                panic!("behavior DSL: case expression has no matching arm (undriven wire)")
            }
            Expr::Let(name, bound, body) => {
                let v = bound.eval(env);
                let mut inner = env.clone();
                inner.bind(name, v);
                body.eval(&inner)
            }
        }
    }
}

fn eval_binop(op: BinOp, a: &BitVec, b: &BitVec) -> BitVec {
    match op {
        BinOp::Add => a.add(b),
        BinOp::Sub => a.sub(b),
        BinOp::Mul => a.mul(b),
        BinOp::And => a.bitand(b),
        BinOp::Or => a.bitor(b),
        BinOp::Xor => a.bitxor(b),
        BinOp::Eq => BitVec::bool(a.eq_val(b)),
        BinOp::Ne => BitVec::bool(!a.eq_val(b)),
        BinOp::LtU => BitVec::bool(a.lt_unsigned(b)),
        BinOp::LtS => BitVec::bool(a.lt_signed(b, a.width())),
        BinOp::GeU => BitVec::bool(!a.lt_unsigned(b)),
        BinOp::GeS => BitVec::bool(!a.lt_signed(b, a.width())),
        BinOp::ShlLogical => a.shl(b.value() as u32),
        BinOp::ShrLogical => a.shr_logical(b.value() as u32),
        BinOp::ShrArith => a.shr_arith(b.value() as u32),
    }
}

fn eval_unop(op: UnOp, a: &BitVec) -> BitVec {
    match op {
        UnOp::Not => a.not(),
        UnOp::Neg => BitVec::zero(a.width()).sub(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_picks_first_true_arm() {
        let mut env = Env::new();
        env.bind("taken", BitVec::bool(true));
        env.bind("a", BitVec::new(32, 10));
        env.bind("b", BitVec::new(32, 20));
        let e = Expr::case(vec![
            (Expr::sig("taken"), Expr::sig("a")),
            (Expr::lit(BitVec::bool(true)), Expr::sig("b")),
        ]);
        assert_eq!(e.eval(&env).value(), 10);
    }

    #[test]
    fn case_falls_through_to_default() {
        let mut env = Env::new();
        env.bind("taken", BitVec::bool(false));
        env.bind("b", BitVec::new(32, 20));
        let e = Expr::case(vec![
            (Expr::sig("taken"), Expr::lit(BitVec::new(32, 999))),
            (Expr::lit(BitVec::bool(true)), Expr::sig("b")),
        ]);
        assert_eq!(e.eval(&env).value(), 20);
    }

    #[test]
    fn let_binds_locally() {
        let env = Env::new();
        let e = Expr::Let(
            "x",
            Box::new(Expr::lit(BitVec::new(32, 5))),
            Box::new(Expr::BinOp(
                BinOp::Add,
                Box::new(Expr::sig("x")),
                Box::new(Expr::sig("x")),
            )),
        );
        assert_eq!(e.eval(&env).value(), 10);
    }

    #[test]
    #[should_panic(expected = "undriven wire")]
    fn case_without_match_panics() {
        let env = Env::new();
        let e = Expr::case(vec![(Expr::lit(BitVec::bool(false)), Expr::lit(BitVec::new(1, 0)))]);
        e.eval(&env);
    }
}
