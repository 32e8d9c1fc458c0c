// Formula parsing and evaluation

pub mod parser;
pub mod value;
pub mod eval;
pub mod functions;
pub mod refs;

pub(crate) mod eval_math;
pub(crate) mod eval_text;
pub(crate) mod eval_logical;
