use std::str::FromStr;

// A safety feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    // Disable all safety features
    None,
    // Enable all safety features
    All,
    // Always check for null before dereferencing (loading) a pointer
    CheckNull,
    // Check the index against the array length before every element access
    CheckArrayBounds,
}

#[derive(Debug, Display)]
#[display(fmt = "unknown safety feature {}", _0)]
pub struct UnknownSafetyFlag(String);

impl FromStr for Flag {
    type Err = UnknownSafetyFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Flag::None),
            "all" => Ok(Flag::All),
            "check-null" | "null" => Ok(Flag::CheckNull),
            "check-bounds" | "bounds" => Ok(Flag::CheckArrayBounds),
            _ => Err(UnknownSafetyFlag(s.to_string())),
        }
    }
}

/// Whether `flag` is in effect given the requested `flags`. `None` wins over
/// everything else, `All` implies every check.
pub fn enabled(flags: &[Flag], flag: Flag) -> bool {
    if flags.contains(&Flag::None) {
        return false;
    }
    flags.contains(&flag) || flags.contains(&Flag::All)
}
