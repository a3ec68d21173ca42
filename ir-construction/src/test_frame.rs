//! A minimal frame layout used to unit test the generators without a real
//! target.

use ir::{Access, Exp, Frame, IrContext, Label, Stm, Target, Temp};

pub struct TestTarget;

pub struct TestFrame {
    name: Label,
    formals: Vec<Access>,
    locals: i32,
    fp: Temp,
    rv: Temp,
    ra: Temp,
    args: Vec<Temp>,
}

const WORD: i32 = 4;

impl Target for TestTarget {
    type Frame = TestFrame;

    fn new_frame(&self, ctx: &mut IrContext, name: Label, escapes: &[bool]) -> TestFrame {
        let formals = escapes
            .iter()
            .enumerate()
            .map(|(idx, &escapes)| {
                if escapes {
                    Access::InFrame(idx as i32 * WORD)
                } else {
                    Access::InReg(ctx.new_temp())
                }
            })
            .collect();
        TestFrame {
            name,
            formals,
            locals: 0,
            fp: ctx.new_temp(),
            rv: ctx.new_temp(),
            ra: ctx.new_temp(),
            args: (0..4).map(|_| ctx.new_temp()).collect(),
        }
    }
}

impl Frame for TestFrame {
    fn word_size(&self) -> i32 {
        WORD
    }

    fn name(&self) -> &Label {
        &self.name
    }

    fn formals(&self) -> &[Access] {
        &self.formals
    }

    fn alloc_local(&mut self, ctx: &mut IrContext, in_frame: bool) -> Access {
        if in_frame {
            self.locals += 1;
            Access::InFrame(-self.locals * WORD)
        } else {
            Access::InReg(ctx.new_temp())
        }
    }

    fn fp(&self) -> Temp {
        self.fp
    }

    fn rv(&self) -> Temp {
        self.rv
    }

    fn ra(&self) -> Temp {
        self.ra
    }

    fn arg_regs(&self) -> Vec<Temp> {
        self.args.clone()
    }

    fn caller_saves(&self) -> Vec<Temp> {
        vec![]
    }

    fn registers(&self) -> Vec<Temp> {
        let mut regs = vec![self.fp, self.rv, self.ra];
        regs.extend(&self.args);
        regs
    }

    fn external_call(&self, ctx: &mut IrContext, name: &str, args: Vec<Exp>) -> Exp {
        Exp::call(Exp::Name(ctx.named_label(name)), args)
    }

    fn proc_entry_exit1(&self, body: Stm) -> Stm {
        let mut stms: Vec<Stm> = self
            .formals
            .iter()
            .zip(&self.args)
            .map(|(formal, &arg)| Stm::Move(formal.exp(Exp::Temp(self.fp)), Exp::Temp(arg)))
            .collect();
        stms.push(body);
        Stm::seq_all(stms)
    }
}
