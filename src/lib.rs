pub mod ast;
pub mod diagnostic;
pub mod field;
pub mod ir;
pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod qap;
pub mod r1cs;
pub mod span;
pub mod symbol;
pub mod witness;

pub use diagnostic::{render_diagnostics, Diagnostic, Severity};
pub use field::{Field, FieldElement, FieldError, U256};
pub use pipeline::{compile_to_qap, CompilationResult, QapCompiler};
pub use qap::Qap;
pub use r1cs::R1cs;
pub use witness::WitnessError;
