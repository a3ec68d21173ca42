use super::{ast, runtime::RTLib, MethodBodyGenerator, Options, TranslateError};
use ir::{Frame, IrContext, Procedure, Target};

/// The label of method `method` declared in class `class`.
pub fn method_label(class: &str, method: &str) -> String {
    format!("{}${}", class, method)
}

/// The label of the vtable of class `class`.
pub fn vtable_label(class: &str) -> String {
    format!("{}$vtable", class)
}

pub struct ProgramGenerator<'a, T: Target> {
    target: &'a T,
    runtime: &'a dyn RTLib,
    options: &'a Options,
}

impl<'a, T: Target> ProgramGenerator<'a, T> {
    pub fn new(target: &'a T, runtime: &'a dyn RTLib, options: &'a Options) -> Self {
        Self {
            target,
            runtime,
            options,
        }
    }

    /// One procedure per method, in declaration order.
    pub fn generate(
        &self,
        ctx: &mut IrContext,
        program: &ast::Program,
    ) -> Result<Vec<Procedure<T::Frame>>, TranslateError> {
        let mut procedures = vec![];
        for class in &program.classes {
            for method in &class.methods {
                log::debug!("generate method body for {}.{}", class.name, method.name);
                procedures.push(self.generate_method(ctx, class, method)?);
            }
        }
        Ok(procedures)
    }

    pub fn generate_method(
        &self,
        ctx: &mut IrContext,
        class: &ast::Class,
        method: &ast::Method,
    ) -> Result<Procedure<T::Frame>, TranslateError> {
        let name = if method.is_static {
            ctx.named_label(self.runtime.mj_main_name())
        } else {
            ctx.named_label(&method_label(&class.name, &method.name))
        };

        let this_param = if method.is_static { 0 } else { 1 };
        // nothing in the language can take the address of a variable
        let escapes = vec![false; this_param + method.params.len()];
        let mut frame = self.target.new_frame(ctx, name, &escapes);

        let body = MethodBodyGenerator::new(ctx, &mut frame, self.runtime, self.options, method)
            .gen_method(&method.body)?;
        let body = frame.proc_entry_exit1(body);

        Ok(Procedure { frame, body })
    }
}
