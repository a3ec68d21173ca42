use super::{
    ast::{self, BinaryOp, UnaryOp},
    program_generator::{method_label, vtable_label},
    runtime::{RTLib, RuntimeFunction},
    Options, TranslateError,
};
use ir::{Access, BinOp, Exp, Frame, IrContext, Label, RelOp, Stm};
use std::collections::HashMap;

type Result<T> = std::result::Result<T, TranslateError>;

pub struct MethodBodyGenerator<'a, F: Frame> {
    ctx: &'a mut IrContext,
    frame: &'a mut F,
    runtime: &'a dyn RTLib,
    options: &'a Options,
    method_name: &'a str,
    this: Option<Access>,
    local_vars: HashMap<String, Access>,
    /// Targets of `break` and `continue` in the innermost enclosing loop.
    loop_exit: Option<Label>,
    loop_continue: Option<Label>,
    return_label: Label,
}

impl<'a, F: Frame> MethodBodyGenerator<'a, F> {
    /// The receiver of an instance method is the first formal of `frame`,
    /// the parameters follow.
    pub fn new(
        ctx: &'a mut IrContext,
        frame: &'a mut F,
        runtime: &'a dyn RTLib,
        options: &'a Options,
        method: &'a ast::Method,
    ) -> Self {
        let mut formals = frame.formals().to_vec().into_iter();
        let this = if method.is_static {
            None
        } else {
            formals.next()
        };
        let local_vars = method.params.iter().cloned().zip(formals).collect();
        let return_label = ctx.new_label();

        Self {
            ctx,
            frame,
            runtime,
            options,
            method_name: &method.name,
            this,
            local_vars,
            loop_exit: None,
            loop_continue: None,
            return_label,
        }
    }

    /// Translate a method body. Every `return` jumps to a label placed right
    /// after the body.
    pub fn gen_method(&mut self, body: &ast::Block) -> Result<Stm> {
        let body = self.gen_block(body)?;
        Ok(Stm::seq(body, Stm::Label(self.return_label.clone())))
    }

    fn gen_block(&mut self, block: &ast::Block) -> Result<Stm> {
        let outer_scope = self.local_vars.clone();
        let stms = block
            .statements
            .iter()
            .map(|stmt| self.gen_stmt(stmt))
            .collect::<Result<Vec<_>>>();
        self.local_vars = outer_scope;
        Ok(Stm::seq_all(stms?))
    }

    fn gen_stmt(&mut self, stmt: &ast::Stmt) -> Result<Stm> {
        use self::ast::Stmt::*;
        match stmt {
            Block(block) => self.gen_block(block),
            Empty => Ok(Stm::nop()),
            If(cond, then_arm, else_arm) => self.gen_if(cond, then_arm, else_arm),
            While(cond, body) => self.gen_while(cond, body),
            DoWhile(body, cond) => self.gen_do_while(body, cond),
            Break => self
                .loop_exit
                .clone()
                .map(Stm::jump_to)
                .ok_or(TranslateError::BreakOutsideLoop),
            Continue => self
                .loop_continue
                .clone()
                .map(Stm::jump_to)
                .ok_or(TranslateError::ContinueOutsideLoop),
            Expression(expr) => self.gen_expr(expr)?.enforce_effect(self.ctx),
            Return(res_expr) => self.gen_return(res_expr),
            LocalVariableDeclaration(name, init_expr) => self.gen_var_decl(name, init_expr),
        }
    }

    fn gen_var_decl(&mut self, name: &str, init_expr: &Option<Box<ast::Expr>>) -> Result<Stm> {
        let initial_val = match init_expr {
            Some(init_expr) => self.gen_value(init_expr)?,
            None => Exp::Const(0),
        };
        let access = self.frame.alloc_local(self.ctx, false);
        self.local_vars.insert(name.to_owned(), access);
        Ok(Stm::Move(access.exp(Exp::Temp(self.frame.fp())), initial_val))
    }

    fn gen_if(
        &mut self,
        cond: &ast::Expr,
        then_arm: &ast::Stmt,
        else_arm: &Option<Box<ast::Stmt>>,
    ) -> Result<Stm> {
        let cond = self.gen_cond(cond)?;
        let then_label = self.ctx.new_label();
        let join_label = self.ctx.new_label();
        let then_arm = self.gen_stmt(then_arm)?;

        let stms = match else_arm {
            None => vec![
                cond.gen(self.ctx, then_label.clone(), join_label.clone()),
                Stm::Label(then_label),
                then_arm,
                Stm::Label(join_label),
            ],
            Some(else_arm) => {
                let else_label = self.ctx.new_label();
                let else_arm = self.gen_stmt(else_arm)?;
                vec![
                    cond.gen(self.ctx, then_label.clone(), else_label.clone()),
                    Stm::Label(then_label),
                    then_arm,
                    Stm::jump_to(join_label.clone()),
                    Stm::Label(else_label),
                    else_arm,
                    Stm::Label(join_label),
                ]
            }
        };
        Ok(Stm::seq_all(stms))
    }

    fn gen_while(&mut self, cond: &ast::Expr, body: &ast::Stmt) -> Result<Stm> {
        let begin = self.ctx.new_label();
        let body_label = self.ctx.new_label();
        let end = self.ctx.new_label();

        // We evaluate the condition
        let cond = self.gen_cond(cond)?;
        let body = self.gen_loop_body(end.clone(), begin.clone(), body)?;

        Ok(Stm::seq_all(vec![
            Stm::Label(begin.clone()),
            cond.gen(self.ctx, body_label.clone(), end.clone()),
            Stm::Label(body_label),
            body,
            // We jump back to the condition-check
            Stm::jump_to(begin),
            Stm::Label(end),
        ]))
    }

    fn gen_do_while(&mut self, body: &ast::Stmt, cond: &ast::Expr) -> Result<Stm> {
        let begin = self.ctx.new_label();
        let test = self.ctx.new_label();
        let end = self.ctx.new_label();

        let body = self.gen_loop_body(end.clone(), test.clone(), body)?;
        let cond = self.gen_cond(cond)?;

        Ok(Stm::seq_all(vec![
            Stm::Label(begin.clone()),
            body,
            Stm::Label(test),
            cond.gen(self.ctx, begin, end.clone()),
            Stm::Label(end),
        ]))
    }

    fn gen_loop_body(&mut self, exit: Label, cont: Label, body: &ast::Stmt) -> Result<Stm> {
        let outer_exit = self.loop_exit.replace(exit);
        let outer_continue = self.loop_continue.replace(cont);
        let body = self.gen_stmt(body);
        self.loop_exit = outer_exit;
        self.loop_continue = outer_continue;
        body
    }

    fn gen_return(&mut self, res_expr: &Option<Box<ast::Expr>>) -> Result<Stm> {
        let ret = Stm::jump_to(self.return_label.clone());
        match res_expr {
            Some(res_expr) => {
                let val = self.gen_value(res_expr)?;
                Ok(Stm::seq(Stm::Move(Exp::Temp(self.frame.rv()), val), ret))
            }
            None => Ok(ret),
        }
    }

    fn gen_expr(&mut self, expr: &ast::Expr) -> Result<ExprResult> {
        use self::{ast::Expr::*, ExprResult::*};
        Ok(match expr {
            Int(val) => Value(Exp::Const(*val)),
            Boolean(val) => Cond(Condition::Const(*val)),
            Null => Value(Exp::Const(0)),
            This => Value(self.this()?),
            Var(name) => Assignable(self.local_var(name)?),
            FieldAccess(obj, field) => {
                let obj = self.gen_value(obj)?;
                let obj = self.checked_pointer(obj);
                let offset = (field.index as i32 + 1) * self.frame.word_size();
                Assignable(Exp::mem(Exp::binop(BinOp::Plus, obj, Exp::Const(offset))))
            }
            ArrayAccess(array, idx) => Assignable(self.gen_array_access(array, idx)?),
            ArrayLength(array) => {
                let array = self.gen_value(array)?;
                Value(Exp::mem(self.checked_pointer(array)))
            }
            Binary(op, lhs, rhs) => self.gen_binary_expr(*op, lhs, rhs)?,
            Unary(UnaryOp::Neg, expr) => {
                let val = self.gen_value(expr)?;
                Value(Exp::binop(BinOp::Minus, Exp::Const(0), val))
            }
            Unary(UnaryOp::Not, expr) => Cond(self.gen_cond(expr)?.flip()),
            Ternary(cond, then_expr, else_expr) => {
                Value(self.gen_ternary(cond, then_expr, else_expr)?)
            }
            MethodInvocation(target_obj, method, arguments) => {
                self.gen_method_invocation(target_obj, method, arguments)?
            }
            Builtin(builtin, arguments) => {
                let args = self.gen_expr_list(arguments)?;
                self.gen_runtime_call((*builtin).into(), args)
            }
            NewObject(class) => Value(self.gen_new_object(class)),
            NewArray(num_expr) => Value(self.gen_new_array(num_expr)?),
        })
    }

    fn gen_value(&mut self, expr: &ast::Expr) -> Result<Exp> {
        self.gen_expr(expr)?.enforce_value(self.ctx)
    }

    fn gen_cond(&mut self, expr: &ast::Expr) -> Result<Condition> {
        self.gen_expr(expr)?.enforce_cond(self.ctx)
    }

    fn gen_expr_list(&mut self, exprs: &[ast::Expr]) -> Result<Vec<Exp>> {
        exprs.iter().map(|expr| self.gen_value(expr)).collect()
    }

    fn relation(op: BinaryOp) -> Option<RelOp> {
        match op {
            BinaryOp::Equals => Some(RelOp::Eq),
            BinaryOp::NotEquals => Some(RelOp::Ne),
            BinaryOp::LessThan => Some(RelOp::Lt),
            BinaryOp::GreaterThan => Some(RelOp::Gt),
            BinaryOp::LessEquals => Some(RelOp::Le),
            BinaryOp::GreaterEquals => Some(RelOp::Ge),
            _ => None,
        }
    }

    fn gen_binary_expr(
        &mut self,
        op: BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
    ) -> Result<ExprResult> {
        use self::ExprResult::*;
        if let Some(relation) = Self::relation(op) {
            let lhs = self.gen_value(lhs)?;
            let rhs = self.gen_value(rhs)?;
            return Ok(Cond(Condition::Relation(relation, lhs, rhs)));
        }

        Ok(match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let lhs = self.gen_value(lhs)?;
                let rhs = self.gen_value(rhs)?;
                let op = match op {
                    BinaryOp::Add => BinOp::Plus,
                    BinaryOp::Sub => BinOp::Minus,
                    BinaryOp::Mul => BinOp::Mul,
                    BinaryOp::Div => BinOp::Div,
                    BinaryOp::Mod => BinOp::Mod,
                    _ => unreachable!(),
                };
                Value(Exp::binop(op, lhs, rhs))
            }
            BinaryOp::LogicalOr => {
                let lhs = self.gen_cond(lhs)?;
                let rhs = self.gen_cond(rhs)?;
                Cond(Condition::Or(Box::new(lhs), Box::new(rhs)))
            }
            BinaryOp::LogicalAnd => {
                let lhs = self.gen_cond(lhs)?;
                let rhs = self.gen_cond(rhs)?;
                Cond(Condition::And(Box::new(lhs), Box::new(rhs)))
            }
            BinaryOp::Assign => {
                let dst = match self.gen_expr(lhs)? {
                    Assignable(dst) => dst,
                    _ => {
                        return Err(TranslateError::NotAssignable {
                            expr: ast::ExprDiscriminants::from(lhs),
                        });
                    }
                };
                let src = self.gen_value(rhs)?;
                Assignment(dst, src)
            }
            _ => unreachable!("relations are handled above"),
        })
    }

    fn gen_ternary(
        &mut self,
        cond: &ast::Expr,
        then_expr: &ast::Expr,
        else_expr: &ast::Expr,
    ) -> Result<Exp> {
        let cond = self.gen_cond(cond)?;
        let then_val = self.gen_value(then_expr)?;
        let else_val = self.gen_value(else_expr)?;

        let result = self.ctx.new_temp();
        let then_label = self.ctx.new_label();
        let else_label = self.ctx.new_label();
        let join_label = self.ctx.new_label();

        let stms = vec![
            cond.gen(self.ctx, then_label.clone(), else_label.clone()),
            Stm::Label(then_label),
            Stm::Move(Exp::Temp(result), then_val),
            Stm::jump_to(join_label.clone()),
            Stm::Label(else_label),
            Stm::Move(Exp::Temp(result), else_val),
            Stm::Label(join_label),
        ];
        Ok(Exp::eseq(Stm::seq_all(stms), Exp::Temp(result)))
    }

    fn gen_method_invocation(
        &mut self,
        target_obj: &ast::Expr,
        method: &ast::MethodRef,
        arguments: &[ast::Expr],
    ) -> Result<ExprResult> {
        let target_obj = self.gen_value(target_obj)?;
        let target_obj = self.checked_pointer(target_obj);

        // the receiver is used twice for dynamic dispatch, evaluate it once
        let this = self.ctx.new_temp();
        let mut args = vec![Exp::Temp(this)];
        args.extend(self.gen_expr_list(arguments)?);

        let func = match method.vtable_index {
            Some(slot) => {
                let offset = slot as i32 * self.frame.word_size();
                Exp::mem(Exp::binop(
                    BinOp::Plus,
                    Exp::mem(Exp::Temp(this)),
                    Exp::Const(offset),
                ))
            }
            None => Exp::Name(
                self.ctx
                    .named_label(&method_label(&method.class, &method.name)),
            ),
        };

        let receiver = Stm::Move(Exp::Temp(this), target_obj);
        let call = Exp::call(func, args);
        Ok(if method.returns {
            ExprResult::Value(Exp::eseq(receiver, call))
        } else {
            ExprResult::Void(Stm::seq(receiver, Stm::Expr(call)))
        })
    }

    fn runtime_call(&mut self, func: RuntimeFunction, args: Vec<Exp>) -> Exp {
        let name = self.runtime.ld_name(func);
        self.frame.external_call(self.ctx, name, args)
    }

    fn gen_runtime_call(&mut self, func: RuntimeFunction, args: Vec<Exp>) -> ExprResult {
        let call = self.runtime_call(func, args);
        if func.returns_value() {
            ExprResult::Value(call)
        } else {
            ExprResult::Void(Stm::Expr(call))
        }
    }

    fn gen_new_object(&mut self, class: &ast::ClassRef) -> Exp {
        let word = self.frame.word_size();
        let size = Exp::Const((class.num_fields as i32 + 1) * word);
        let alloc = self.runtime_call(RuntimeFunction::New, vec![size]);
        let vtable = Exp::Name(self.ctx.named_label(&vtable_label(&class.name)));

        let obj = self.ctx.new_temp();
        Exp::eseq(
            Stm::seq(
                Stm::Move(Exp::Temp(obj), alloc),
                Stm::Move(Exp::mem(Exp::Temp(obj)), vtable),
            ),
            Exp::Temp(obj),
        )
    }

    fn gen_new_array(&mut self, num_expr: &ast::Expr) -> Result<Exp> {
        let word = self.frame.word_size();
        let num_elts = self.gen_value(num_expr)?;
        let len = self.ctx.new_temp();
        let array = self.ctx.new_temp();

        // one extra word in front of the elements holds the length
        let alloc_size = Exp::binop(
            BinOp::Plus,
            Exp::binop(BinOp::Mul, Exp::Temp(len), Exp::Const(word)),
            Exp::Const(word),
        );
        let alloc = self.runtime_call(RuntimeFunction::New, vec![alloc_size]);

        Ok(Exp::eseq(
            Stm::seq_all(vec![
                Stm::Move(Exp::Temp(len), num_elts),
                Stm::Move(Exp::Temp(array), alloc),
                Stm::Move(Exp::mem(Exp::Temp(array)), Exp::Temp(len)),
            ]),
            Exp::Temp(array),
        ))
    }

    /// The location of `array[idx]`.
    fn gen_array_access(&mut self, array: &ast::Expr, idx: &ast::Expr) -> Result<Exp> {
        let word = self.frame.word_size();
        let array = self.gen_value(array)?;
        let idx = self.gen_value(idx)?;

        if !self.options.check_array_bounds() {
            let array = self.checked_pointer(array);
            return Ok(array_element(array, idx, word));
        }

        let array_temp = self.ctx.new_temp();
        let idx_temp = self.ctx.new_temp();
        let within_bounds = self.ctx.new_label();
        let out_of_bounds = self.ctx.new_label();
        let checked_array = self.checked_pointer(Exp::Temp(array_temp));
        let err_call = self.runtime_call(RuntimeFunction::ArrayOutOfBounds, vec![]);

        let check = Stm::seq_all(vec![
            Stm::Move(Exp::Temp(array_temp), array),
            Stm::Move(Exp::Temp(idx_temp), idx),
            // unsigned: negative indices compare above every length
            Stm::CJump(
                RelOp::Uge,
                Exp::Temp(idx_temp),
                Exp::mem(checked_array),
                out_of_bounds.clone(),
                within_bounds.clone(),
            ),
            Stm::Label(out_of_bounds),
            Stm::Expr(err_call),
            Stm::Label(within_bounds),
        ]);

        Ok(array_element(
            Exp::eseq(check, Exp::Temp(array_temp)),
            Exp::Temp(idx_temp),
            word,
        ))
    }

    /// `ptr`, preceded by a call of the null usage handler if it is null.
    fn checked_pointer(&mut self, ptr: Exp) -> Exp {
        if !self.options.check_null() {
            return ptr;
        }

        let ptr_temp = self.ctx.new_temp();
        let is_null = self.ctx.new_label();
        let is_not_null = self.ctx.new_label();
        let err_call = self.runtime_call(RuntimeFunction::NullUsage, vec![]);

        let check = Stm::seq_all(vec![
            Stm::Move(Exp::Temp(ptr_temp), ptr),
            Stm::CJump(
                RelOp::Eq,
                Exp::Temp(ptr_temp),
                Exp::Const(0),
                is_null.clone(),
                is_not_null.clone(),
            ),
            Stm::Label(is_null),
            Stm::Expr(err_call),
            Stm::Label(is_not_null),
        ]);
        Exp::eseq(check, Exp::Temp(ptr_temp))
    }

    fn local_var(&self, name: &str) -> Result<Exp> {
        match self.local_vars.get(name) {
            Some(access) => Ok(access.exp(Exp::Temp(self.frame.fp()))),
            None => Err(TranslateError::UndefinedVariable {
                name: name.to_owned(),
            }),
        }
    }

    fn this(&self) -> Result<Exp> {
        match self.this {
            Some(access) => Ok(access.exp(Exp::Temp(self.frame.fp()))),
            None => Err(TranslateError::ThisInStaticMethod {
                method: self.method_name.to_owned(),
            }),
        }
    }
}

fn array_element(array: Exp, idx: Exp, word: i32) -> Exp {
    Exp::mem(Exp::binop(
        BinOp::Plus,
        Exp::binop(
            BinOp::Plus,
            array,
            Exp::binop(BinOp::Mul, idx, Exp::Const(word)),
        ),
        Exp::Const(word),
    ))
}

/// Result of `MethodBodyGenerator::gen_expr`, convertible to whatever the
/// consumer needs.
enum ExprResult {
    /// No Result (e.g. call of void method)
    Void(Stm),
    /// Result is a single value (e.g. method call, integer arithmetic)
    Value(Exp),
    /// Result is control flow that can be branched on (e.g. result of
    /// short-circuiting binary expr, `||`, `==`, `&&`, ...)
    Cond(Condition),
    /// An assignable location, such as a local var, field or array element
    Assignable(Exp),
    /// `dst = src`, where `dst` came from an `Assignable`
    Assignment(Exp, Exp),
}

impl ExprResult {
    /// Enforce that the result is a single value. If self is a `Cond`,
    /// convert it to boolean value
    fn enforce_value(self, ctx: &mut IrContext) -> Result<Exp> {
        use self::ExprResult::*;
        match self {
            Void(_) => Err(TranslateError::VoidValue { usage: "a value" }),
            Value(val) | Assignable(val) => Ok(val),
            Cond(cond) => Ok(cond.into_value(ctx)),
            Assignment(dst, src) => Ok(assignment_value(ctx, dst, src)),
        }
    }

    /// Enforce that the result is a condition. Values are compared against
    /// `true`.
    fn enforce_cond(self, ctx: &mut IrContext) -> Result<Condition> {
        use self::ExprResult::*;
        match self {
            Void(_) => Err(TranslateError::VoidValue {
                usage: "a condition",
            }),
            Cond(cond) => Ok(cond),
            other => other.enforce_value(ctx).map(Condition::from_value),
        }
    }

    /// Evaluate only for side effects.
    fn enforce_effect(self, ctx: &mut IrContext) -> Result<Stm> {
        use self::ExprResult::*;
        Ok(match self {
            Void(stm) => stm,
            Value(val) | Assignable(val) => match val {
                Exp::ESeq(stm, val) if val.kids().is_empty() => *stm,
                val => Stm::Expr(val),
            },
            Cond(cond) => {
                let join = ctx.new_label();
                Stm::seq(cond.gen(ctx, join.clone(), join.clone()), Stm::Label(join))
            }
            Assignment(dst, src) => Stm::Move(dst, src),
        })
    }
}

/// The value of an assignment expression is the stored value. The address
/// of a memory destination is computed before the right hand side.
fn assignment_value(ctx: &mut IrContext, dst: Exp, src: Exp) -> Exp {
    match dst {
        Exp::Mem(addr) => {
            let addr_temp = ctx.new_temp();
            let value = ctx.new_temp();
            Exp::eseq(
                Stm::seq_all(vec![
                    Stm::Move(Exp::Temp(addr_temp), *addr),
                    Stm::Move(Exp::Temp(value), src),
                    Stm::Move(Exp::mem(Exp::Temp(addr_temp)), Exp::Temp(value)),
                ]),
                Exp::Temp(value),
            )
        }
        dst => Exp::eseq(Stm::Move(dst.clone(), src), dst),
    }
}

/// A boolean expression in branch context: jumps to one of two labels once
/// they are known.
#[derive(Debug)]
enum Condition {
    Const(bool),
    Relation(RelOp, Exp, Exp),
    /// Short-circuit: the right operand is only evaluated if the left one
    /// holds.
    And(Box<Condition>, Box<Condition>),
    /// Short-circuit: the right operand is only evaluated if the left one
    /// fails.
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    fn from_value(val: Exp) -> Self {
        match val {
            Exp::Const(0) => Condition::Const(false),
            Exp::Const(1) => Condition::Const(true),
            val => Condition::Relation(RelOp::Eq, val, Exp::Const(1)),
        }
    }

    fn flip(self) -> Self {
        use self::Condition::*;
        match self {
            Const(val) => Const(!val),
            Relation(op, lhs, rhs) => Relation(op.negate(), lhs, rhs),
            And(lhs, rhs) => Or(Box::new(lhs.flip()), Box::new(rhs.flip())),
            Or(lhs, rhs) => And(Box::new(lhs.flip()), Box::new(rhs.flip())),
        }
    }

    fn gen(self, ctx: &mut IrContext, tr: Label, fls: Label) -> Stm {
        use self::Condition::*;
        match self {
            Const(true) => Stm::jump_to(tr),
            Const(false) => Stm::jump_to(fls),
            Relation(op, lhs, rhs) => Stm::CJump(op, lhs, rhs, tr, fls),
            And(lhs, rhs) => {
                let lhs_true = ctx.new_label();
                Stm::seq_all(vec![
                    lhs.gen(ctx, lhs_true.clone(), fls.clone()),
                    Stm::Label(lhs_true),
                    rhs.gen(ctx, tr, fls),
                ])
            }
            Or(lhs, rhs) => {
                let lhs_false = ctx.new_label();
                Stm::seq_all(vec![
                    lhs.gen(ctx, tr.clone(), lhs_false.clone()),
                    Stm::Label(lhs_false),
                    rhs.gen(ctx, tr, fls),
                ])
            }
        }
    }

    fn into_value(self, ctx: &mut IrContext) -> Exp {
        if let Condition::Const(val) = self {
            return Exp::Const(if val { 1 } else { 0 });
        }
        let result = ctx.new_temp();
        let tr = ctx.new_label();
        let fls = ctx.new_label();
        Exp::eseq(
            Stm::seq_all(vec![
                Stm::Move(Exp::Temp(result), Exp::Const(1)),
                self.gen(ctx, tr.clone(), fls.clone()),
                Stm::Label(fls),
                Stm::Move(Exp::Temp(result), Exp::Const(0)),
                Stm::Label(tr),
            ]),
            Exp::Temp(result),
        )
    }
}
