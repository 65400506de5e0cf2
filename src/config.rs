/// Nesting depth the parser accepts before failing with a syntax error.
pub const DEFAULT_PARSE_DEPTH_LIMIT: usize = 100;
/// Nested `execute`/`evaluate` calls the interpreter accepts.
pub const DEFAULT_EVAL_DEPTH_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub parse_depth_limit: usize,
    pub eval_depth_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parse_depth_limit: DEFAULT_PARSE_DEPTH_LIMIT,
            eval_depth_limit: DEFAULT_EVAL_DEPTH_LIMIT,
        }
    }
}
