//! Canonicalization: removes `Seq` and `ESeq` and pulls every `Call` up to
//! statement level.
//!
//! After [`linearize`], each statement is one of the plain tree statements
//! and a `Call` only ever appears as `Move(Temp(_), Call(..))` or
//! `Expr(Call(..))`. The statements of an `ESeq` are hoisted in front of the
//! enclosing node. If a sibling expression evaluated earlier could observe
//! the hoisted statement, that sibling is first saved into a fresh temp.

use super::{
    temp::IrContext,
    tree::{Exp, ExpKind, Stm},
};

/// Canonicalize `stm` into a flat list of statements without `Seq`s and
/// no-ops.
pub fn linearize(ctx: &mut IrContext, stm: Stm) -> Vec<Stm> {
    let stm = do_stm(ctx, stm);
    let mut out = Vec::new();
    flatten(stm, &mut out);
    log::trace!("linearized into {} statements", out.len());
    debug_assert!(is_canonical(&out));
    out
}

fn flatten(stm: Stm, out: &mut Vec<Stm>) {
    match stm {
        Stm::Seq(first, second) => {
            flatten(*first, out);
            flatten(*second, out);
        }
        stm if stm.is_nop() => (),
        stm => out.push(stm),
    }
}

/// `Seq` that drops no-ops on either side.
fn seq(first: Stm, second: Stm) -> Stm {
    if first.is_nop() {
        second
    } else if second.is_nop() {
        first
    } else {
        Stm::seq(first, second)
    }
}

/// Whether `stm` may be executed before `exp` without changing the value of
/// `exp`. Conservative: only no-ops and constant expressions commute.
fn commute(stm: &Stm, exp: &Exp) -> bool {
    stm.is_nop()
        || match exp {
            Exp::Const(_) | Exp::Name(_) => true,
            _ => false,
        }
}

fn do_stm(ctx: &mut IrContext, stm: Stm) -> Stm {
    match stm {
        Stm::Seq(first, second) => {
            let first = do_stm(ctx, *first);
            let second = do_stm(ctx, *second);
            seq(first, second)
        }
        Stm::Move(Exp::Temp(dst), call @ Exp::Call(..)) => {
            let (kind, kids) = call.into_parts();
            let (stms, kids) = reorder(ctx, kids);
            seq(stms, Stm::Move(Exp::Temp(dst), kind.build(kids)))
        }
        Stm::Expr(call @ Exp::Call(..)) => {
            let (kind, kids) = call.into_parts();
            let (stms, kids) = reorder(ctx, kids);
            seq(stms, Stm::Expr(kind.build(kids)))
        }
        Stm::Move(Exp::ESeq(stm, dst), src) => do_stm(ctx, Stm::seq(*stm, Stm::Move(*dst, src))),
        stm => match stm.into_parts() {
            Ok((kind, kids)) => {
                let (stms, kids) = reorder(ctx, kids);
                seq(stms, kind.build(kids))
            }
            Err(stm) => {
                log::debug!("leaving malformed statement untouched: {}", stm);
                stm
            }
        },
    }
}

/// Returns the statements that must run first and an expression free of
/// `ESeq` and nested calls.
fn do_exp(ctx: &mut IrContext, exp: Exp) -> (Stm, Exp) {
    match exp {
        Exp::ESeq(stm, exp) => {
            let first = do_stm(ctx, *stm);
            let (second, exp) = do_exp(ctx, *exp);
            (seq(first, second), exp)
        }
        call @ Exp::Call(..) => {
            let temp = ctx.new_temp();
            do_exp(
                ctx,
                Exp::eseq(Stm::Move(Exp::Temp(temp), call), Exp::Temp(temp)),
            )
        }
        exp => {
            let (kind, kids) = exp.into_parts();
            debug_assert!(match kind {
                ExpKind::ESeq(_) | ExpKind::Call => false,
                _ => true,
            });
            let (stms, kids) = reorder(ctx, kids);
            (stms, kind.build(kids))
        }
    }
}

/// Canonicalize `exps` (in evaluation order) and collect the statements
/// hoisted out of them.
fn reorder(ctx: &mut IrContext, exps: Vec<Exp>) -> (Stm, Vec<Exp>) {
    let mut exps = exps.into_iter();
    let head = match exps.next() {
        Some(head) => head,
        None => return (Stm::nop(), vec![]),
    };

    let (head_stms, head) = do_exp(ctx, head);
    let (rest_stms, mut rest) = reorder(ctx, exps.collect());

    if commute(&rest_stms, &head) {
        rest.insert(0, head);
        (seq(head_stms, rest_stms), rest)
    } else {
        let temp = ctx.new_temp();
        rest.insert(0, Exp::Temp(temp));
        let save = Stm::Move(Exp::Temp(temp), head);
        (seq(head_stms, seq(save, rest_stms)), rest)
    }
}

/// Checks the canonical-form invariant: no `Seq`/`ESeq` anywhere and calls
/// only directly below `Move(Temp(_), _)` or `Expr(_)`.
pub fn is_canonical(stms: &[Stm]) -> bool {
    stms.iter().all(stm_is_canonical)
}

fn stm_is_canonical(stm: &Stm) -> bool {
    match stm {
        Stm::Seq(..) => false,
        Stm::Move(Exp::Temp(_), Exp::Call(func, args)) | Stm::Expr(Exp::Call(func, args)) => {
            exp_is_flat(func) && args.iter().all(exp_is_flat)
        }
        stm => stm.kids().into_iter().all(exp_is_flat),
    }
}

fn exp_is_flat(exp: &Exp) -> bool {
    match exp {
        Exp::ESeq(..) | Exp::Call(..) => false,
        exp => exp.kids().into_iter().all(exp_is_flat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        temp::{Label, Temp},
        tree::{BinOp, RelOp},
    };

    fn temp(t: Temp) -> Exp {
        Exp::Temp(t)
    }

    fn mov(dst: Temp, src: Exp) -> Stm {
        Stm::Move(Exp::Temp(dst), src)
    }

    #[test]
    fn seq_becomes_flat_list() {
        let mut ctx = IrContext::new();
        let (a, b) = (ctx.new_temp(), ctx.new_temp());
        let stm = Stm::seq(
            Stm::seq(mov(a, Exp::Const(1)), Stm::nop()),
            Stm::seq(Stm::nop(), mov(b, Exp::Const(2))),
        );
        assert_eq!(
            linearize(&mut ctx, stm),
            vec![mov(a, Exp::Const(1)), mov(b, Exp::Const(2))]
        );
    }

    #[test]
    fn eseq_is_hoisted_past_constant() {
        let mut ctx = IrContext::new();
        let (a, r) = (ctx.new_temp(), ctx.new_temp());
        let exp = Exp::binop(
            BinOp::Plus,
            Exp::Const(3),
            Exp::eseq(mov(a, Exp::Const(5)), temp(a)),
        );
        assert_eq!(
            linearize(&mut ctx, mov(r, exp)),
            vec![
                mov(a, Exp::Const(5)),
                mov(r, Exp::binop(BinOp::Plus, Exp::Const(3), temp(a))),
            ]
        );
    }

    #[test]
    fn earlier_operand_is_saved_when_statement_does_not_commute() {
        let mut ctx = IrContext::new();
        let (a, r) = (ctx.new_temp(), ctx.new_temp());
        let exp = Exp::binop(
            BinOp::Plus,
            temp(a),
            Exp::eseq(mov(a, Exp::Const(5)), Exp::Const(1)),
        );
        let out = linearize(&mut ctx, mov(r, exp));
        let saved = Temp(2);
        assert_eq!(
            out,
            vec![
                mov(saved, temp(a)),
                mov(a, Exp::Const(5)),
                mov(r, Exp::binop(BinOp::Plus, temp(saved), Exp::Const(1))),
            ]
        );
    }

    #[test]
    fn nested_calls_are_lifted_into_temps() {
        let mut ctx = IrContext::new();
        let f = ctx.named_label("f");
        let g = ctx.named_label("g");
        let r = ctx.new_temp();
        let inner = Exp::call(Exp::Name(g.clone()), vec![Exp::Const(1)]);
        let outer = Exp::call(Exp::Name(f.clone()), vec![inner, Exp::Const(2)]);
        let out = linearize(&mut ctx, mov(r, outer));

        assert!(is_canonical(&out));
        assert_eq!(out.len(), 2);
        match (&out[0], &out[1]) {
            (
                Stm::Move(Exp::Temp(t), Exp::Call(g_name, _)),
                Stm::Move(Exp::Temp(dst), Exp::Call(f_name, args)),
            ) => {
                assert_eq!(**g_name, Exp::Name(g));
                assert_eq!(**f_name, Exp::Name(f));
                assert_eq!(*dst, r);
                assert_eq!(args, &vec![Exp::Temp(*t), Exp::Const(2)]);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn call_inside_binop_is_lifted() {
        let mut ctx = IrContext::new();
        let f = ctx.named_label("f");
        let (a, r) = (ctx.new_temp(), ctx.new_temp());
        let exp = Exp::binop(
            BinOp::Mul,
            temp(a),
            Exp::call(Exp::Name(f), vec![]),
        );
        let out = linearize(&mut ctx, mov(r, exp));
        assert!(is_canonical(&out));
        // `a` is read before the call and must be saved across it
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], mov(Temp(3), temp(a)));
    }

    #[test]
    fn move_into_eseq_destination() {
        let mut ctx = IrContext::new();
        let (a, b) = (ctx.new_temp(), ctx.new_temp());
        let dst = Exp::eseq(mov(a, Exp::Const(1)), Exp::mem(temp(a)));
        let out = linearize(&mut ctx, Stm::Move(dst, temp(b)));
        assert_eq!(
            out,
            vec![
                mov(a, Exp::Const(1)),
                Stm::Move(Exp::mem(temp(a)), temp(b)),
            ]
        );
    }

    #[test]
    fn expr_call_stays_a_statement() {
        let mut ctx = IrContext::new();
        let f = ctx.named_label("print");
        let stm = Stm::Expr(Exp::call(Exp::Name(f), vec![Exp::Const(42)]));
        let out = linearize(&mut ctx, stm.clone());
        assert_eq!(out, vec![stm]);
    }

    #[test]
    fn linearize_is_idempotent() {
        let mut ctx = IrContext::new();
        let stm = random_stm(&mut ctx, &mut XorShift(0x2545_f491), 4);
        let once = linearize(&mut ctx, stm);
        let twice = linearize(&mut ctx, Stm::seq_all(once.clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn random_trees_become_canonical() {
        let mut rng = XorShift(0x9e37_79b9);
        for _ in 0..200 {
            let mut ctx = IrContext::new();
            let stm = random_stm(&mut ctx, &mut rng, 5);
            let out = linearize(&mut ctx, stm);
            assert!(is_canonical(&out), "not canonical: {:#?}", out);
        }
    }

    #[test]
    fn canonical_check_rejects_nested_call() {
        let mut ctx = IrContext::new();
        let f = ctx.named_label("f");
        let r = ctx.new_temp();
        let nested = mov(
            r,
            Exp::binop(BinOp::Plus, Exp::call(Exp::Name(f), vec![]), Exp::Const(1)),
        );
        assert!(!is_canonical(&[nested]));
    }

    struct XorShift(u32);

    impl XorShift {
        fn next(&mut self, bound: u32) -> u32 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 17;
            self.0 ^= self.0 << 5;
            self.0 % bound
        }
    }

    fn random_label(ctx: &mut IrContext, rng: &mut XorShift) -> Label {
        ctx.named_label(&format!("l{}", rng.next(4)))
    }

    fn random_exp(ctx: &mut IrContext, rng: &mut XorShift, depth: u32) -> Exp {
        let choice = if depth == 0 { rng.next(3) } else { rng.next(7) };
        match choice {
            0 => Exp::Const(rng.next(100) as i32),
            1 => Exp::Temp(Temp(rng.next(5) as usize)),
            2 => Exp::Name(random_label(ctx, rng)),
            3 => Exp::binop(
                BinOp::Plus,
                random_exp(ctx, rng, depth - 1),
                random_exp(ctx, rng, depth - 1),
            ),
            4 => Exp::mem(random_exp(ctx, rng, depth - 1)),
            5 => {
                let args = (0..rng.next(3))
                    .map(|_| random_exp(ctx, rng, depth - 1))
                    .collect();
                Exp::call(random_exp(ctx, rng, depth - 1), args)
            }
            _ => Exp::eseq(random_stm(ctx, rng, depth - 1), random_exp(ctx, rng, depth - 1)),
        }
    }

    fn random_stm(ctx: &mut IrContext, rng: &mut XorShift, depth: u32) -> Stm {
        if depth == 0 {
            return Stm::Label(random_label(ctx, rng));
        }
        match rng.next(6) {
            0 => Stm::Move(
                Exp::Temp(Temp(rng.next(5) as usize)),
                random_exp(ctx, rng, depth - 1),
            ),
            1 => Stm::Move(
                Exp::mem(random_exp(ctx, rng, depth - 1)),
                random_exp(ctx, rng, depth - 1),
            ),
            2 => Stm::Expr(random_exp(ctx, rng, depth - 1)),
            3 => {
                let (t, f) = (random_label(ctx, rng), random_label(ctx, rng));
                Stm::CJump(
                    RelOp::Lt,
                    random_exp(ctx, rng, depth - 1),
                    random_exp(ctx, rng, depth - 1),
                    t,
                    f,
                )
            }
            4 => Stm::seq(random_stm(ctx, rng, depth - 1), random_stm(ctx, rng, depth - 1)),
            _ => Stm::Move(
                Exp::eseq(random_stm(ctx, rng, depth - 1), Exp::Temp(Temp(0))),
                random_exp(ctx, rng, depth - 1),
            ),
        }
    }
}
