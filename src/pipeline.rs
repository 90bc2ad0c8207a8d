//! The compilation pipeline: source text through lexing, parsing, name
//! resolution, lowering, constraint generation and interpolation, ending in
//! an immutable [`CompilationResult`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::Program;
use crate::diagnostic::Diagnostic;
use crate::field::{Field, FieldElement};
use crate::ir::{Ir, IrBuilder};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::qap::Qap;
use crate::r1cs::{R1cs, R1csBuilder};
use crate::symbol::SymbolTable;
use crate::witness::{self, WitnessError};

/// Compiles rule sources over a fixed field.
pub struct QapCompiler {
    field: Field,
}

impl QapCompiler {
    pub fn new(field: Field) -> Self {
        Self { field }
    }

    /// Run the full pipeline. Lex and parse errors abort at the first
    /// diagnostic; resolution and lowering report every error they find.
    pub fn compile(&self, source: &str) -> Result<CompilationResult, Vec<Diagnostic>> {
        let tokens = Lexer::new(source).tokenize()?;
        tracing::debug!(tokens = tokens.len(), "lexed");

        let program = Parser::new(tokens).parse_program()?;
        tracing::debug!(
            decls = program.decls.len(),
            rules = program.rules.len(),
            "parsed"
        );

        let symbols = SymbolTable::from_decls(&program.decls)?;
        let (ir, symbols) = IrBuilder::new(self.field, symbols).lower(&program.rules)?;
        tracing::debug!(
            instrs = ir.instrs.len(),
            witness = symbols.num_witness(),
            "lowered"
        );

        let r1cs = R1csBuilder::build(&ir, &symbols, self.field);
        tracing::debug!(constraints = r1cs.constraints.len(), "constraints built");

        let qap = Qap::from_r1cs(&r1cs, self.field);
        tracing::debug!(
            points = qap.points.len(),
            vanishing_degree = qap.vanishing.degree().unwrap_or(0),
            "interpolated"
        );

        Ok(CompilationResult {
            program,
            symbols,
            ir,
            r1cs,
            qap,
            field: self.field,
        })
    }
}

/// Compile and keep only the QAP.
pub fn compile_to_qap(source: &str, field: Field) -> Result<Qap, Vec<Diagnostic>> {
    QapCompiler::new(field).compile(source).map(|r| r.qap)
}

/// Every artifact of one compilation, immutable once built.
#[derive(Clone, Debug, Serialize)]
pub struct CompilationResult {
    #[serde(skip)]
    pub program: Program,
    pub symbols: SymbolTable,
    #[serde(skip)]
    pub ir: Ir,
    pub r1cs: R1cs,
    pub qap: Qap,
    pub field: Field,
}

impl CompilationResult {
    /// Assign the full witness vector for the given input values.
    pub fn evaluate_witness(
        &self,
        inputs: &BTreeMap<String, u64>,
    ) -> Result<Vec<FieldElement>, WitnessError> {
        witness::evaluate(&self.ir, &self.symbols, self.field, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::U256;

    fn field_101() -> Field {
        Field::new(U256::from_u64(101)).unwrap()
    }

    fn inputs(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_compile_produces_consistent_artifacts() {
        let result = QapCompiler::new(field_101())
            .compile("pub x\nrule r: x != 0")
            .unwrap();
        assert_eq!(result.r1cs.num_witness, result.symbols.num_witness());
        assert_eq!(result.qap.points.len(), result.r1cs.constraints.len());
        assert_eq!(result.qap.a_polys.len(), result.r1cs.num_witness);

        let witness = result.evaluate_witness(&inputs(&[("x", 7)])).unwrap();
        assert_eq!(result.r1cs.check(&witness, &result.field), Ok(()));
        assert!(result.qap.check_witness(&witness));
    }

    #[test]
    fn test_lex_error_propagates() {
        let err = QapCompiler::new(field_101())
            .compile("rule r: x $ 1")
            .unwrap_err();
        assert!(err[0].message.contains("unexpected character"));
    }

    #[test]
    fn test_parse_error_propagates() {
        let err = QapCompiler::new(field_101())
            .compile("rule : x == 1")
            .unwrap_err();
        assert!(err[0].message.contains("expected identifier"));
    }

    #[test]
    fn test_semantic_errors_propagate() {
        let err = QapCompiler::new(field_101())
            .compile("rule r: x in missing")
            .unwrap_err();
        assert!(err[0].message.contains("undefined set 'missing'"));
    }

    #[test]
    fn test_compile_to_qap() {
        let qap = compile_to_qap("pub x\nrule r: x == 3", field_101()).unwrap();
        assert_eq!(qap.points.len(), 3);
    }

    #[test]
    fn test_json_dump_is_well_formed() {
        let result = QapCompiler::new(field_101())
            .compile("pub x\nrule r: x == 3")
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("r1cs").is_some());
        assert!(json.get("qap").is_some());
        assert_eq!(json["field"], "101");
    }
}
