use crate::ast::BuiltinMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RuntimeFunction {
    SystemOutPrintln,
    SystemOutWrite,
    SystemOutFlush,
    SystemInRead,
    New,
    NullUsage,
    ArrayOutOfBounds,
}

impl RuntimeFunction {
    /// Whether a call of this function yields a value.
    pub fn returns_value(self) -> bool {
        match self {
            RuntimeFunction::SystemInRead | RuntimeFunction::New => true,
            RuntimeFunction::SystemOutPrintln
            | RuntimeFunction::SystemOutWrite
            | RuntimeFunction::SystemOutFlush
            | RuntimeFunction::NullUsage
            | RuntimeFunction::ArrayOutOfBounds => false,
        }
    }
}

pub trait RTLib {
    fn ld_name(&self, builtin: RuntimeFunction) -> &'static str;
    fn mj_main_name(&self) -> &'static str;
}

impl From<BuiltinMethod> for RuntimeFunction {
    fn from(mb: BuiltinMethod) -> RuntimeFunction {
        match mb {
            BuiltinMethod::SystemOutPrintln => RuntimeFunction::SystemOutPrintln,
            BuiltinMethod::SystemOutWrite => RuntimeFunction::SystemOutWrite,
            BuiltinMethod::SystemOutFlush => RuntimeFunction::SystemOutFlush,
            BuiltinMethod::SystemInRead => RuntimeFunction::SystemInRead,
        }
    }
}

/// The runtime library linked to every compiled program.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mjrt;

impl RTLib for Mjrt {
    fn ld_name(&self, rtf: RuntimeFunction) -> &'static str {
        match rtf {
            RuntimeFunction::SystemOutPrintln => "mjrt_system_out_println",
            RuntimeFunction::SystemOutWrite => "mjrt_system_out_write",
            RuntimeFunction::SystemOutFlush => "mjrt_system_out_flush",
            RuntimeFunction::SystemInRead => "mjrt_system_in_read",
            RuntimeFunction::NullUsage => "mjrt_null_usage",
            RuntimeFunction::ArrayOutOfBounds => "mjrt_array_out_of_bounds",
            RuntimeFunction::New => "mjrt_new",
        }
    }
    fn mj_main_name(&self) -> &'static str {
        "mj_main"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_map_to_runtime_names() {
        let rt = Mjrt;
        assert_eq!(
            rt.ld_name(BuiltinMethod::SystemOutPrintln.into()),
            "mjrt_system_out_println"
        );
        assert_eq!(
            rt.ld_name(BuiltinMethod::SystemInRead.into()),
            "mjrt_system_in_read"
        );
        assert!(RuntimeFunction::from(BuiltinMethod::SystemInRead).returns_value());
        assert!(!RuntimeFunction::from(BuiltinMethod::SystemOutFlush).returns_value());
    }
}
