use std::collections::BTreeMap;

use serde::Serialize;

use crate::field::{Field, FieldElement};
use crate::ir::{Ir, IrInstr, Wire, WireOrigin};
use crate::symbol::{Slot, SymbolTable};

/// A sparse linear combination over witness indices.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Lc(pub BTreeMap<usize, FieldElement>);

impl Lc {
    pub fn zero() -> Lc {
        Lc(BTreeMap::new())
    }

    /// The constant `c`, as a coefficient on the constant-one slot.
    pub fn constant(c: FieldElement) -> Lc {
        let mut terms = BTreeMap::new();
        if !c.is_zero() {
            terms.insert(0, c);
        }
        Lc(terms)
    }

    /// The single witness variable at `index` with coefficient one.
    pub fn single(index: usize, one: FieldElement) -> Lc {
        let mut terms = BTreeMap::new();
        terms.insert(index, one);
        Lc(terms)
    }

    pub fn add(&self, rhs: &Lc) -> Lc {
        let mut terms = self.0.clone();
        for (&index, &coeff) in &rhs.0 {
            let entry = match terms.get(&index) {
                Some(&existing) => existing.add(coeff),
                None => coeff,
            };
            if entry.is_zero() {
                terms.remove(&index);
            } else {
                terms.insert(index, entry);
            }
        }
        Lc(terms)
    }

    pub fn sub(&self, rhs: &Lc) -> Lc {
        let mut terms = self.0.clone();
        for (&index, &coeff) in &rhs.0 {
            let entry = match terms.get(&index) {
                Some(&existing) => existing.sub(coeff),
                None => coeff.neg(),
            };
            if entry.is_zero() {
                terms.remove(&index);
            } else {
                terms.insert(index, entry);
            }
        }
        Lc(terms)
    }

    /// Evaluate against a full witness vector.
    pub fn evaluate(&self, witness: &[FieldElement], field: &Field) -> FieldElement {
        let mut acc = field.zero();
        for (&index, &coeff) in &self.0 {
            acc = acc.add(coeff.mul(witness[index]));
        }
        acc
    }
}

/// One rank-1 constraint: `(a · w) * (b · w) = (c · w)`.
#[derive(Clone, Debug, Serialize)]
pub struct Constraint {
    pub a: Lc,
    pub b: Lc,
    pub c: Lc,
    pub label: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct R1cs {
    pub constraints: Vec<Constraint>,
    pub num_witness: usize,
}

impl R1cs {
    /// Check a witness against every constraint. Returns the index of the
    /// first violated constraint.
    pub fn check(&self, witness: &[FieldElement], field: &Field) -> Result<(), usize> {
        for (index, constraint) in self.constraints.iter().enumerate() {
            let a = constraint.a.evaluate(witness, field);
            let b = constraint.b.evaluate(witness, field);
            let c = constraint.c.evaluate(witness, field);
            if a.mul(b) != c {
                return Err(index);
            }
        }
        Ok(())
    }
}

/// Flattens the instruction stream into constraints. `Const`, `Sub` and
/// `Not` fold into linear combinations and emit no rows; `Mul` emits one;
/// the zero-test gadgets emit exactly two; `Assert` pins a wire to its
/// expected constant.
pub struct R1csBuilder<'a> {
    field: Field,
    symbols: &'a SymbolTable,
    ir: &'a Ir,
    wire_lcs: Vec<Lc>,
    constraints: Vec<Constraint>,
}

impl<'a> R1csBuilder<'a> {
    pub fn build(ir: &'a Ir, symbols: &'a SymbolTable, field: Field) -> R1cs {
        let mut builder = R1csBuilder {
            field,
            symbols,
            ir,
            wire_lcs: Vec::with_capacity(ir.wires.len()),
            constraints: Vec::new(),
        };

        // Wires without a defining instruction resolve straight to a slot
        for origin in &ir.wires {
            let lc = match origin {
                WireOrigin::Input { witness, .. } => Lc::single(*witness, field.one()),
                WireOrigin::Hint { witness } => Lc::single(*witness, field.one()),
                _ => Lc::zero(),
            };
            builder.wire_lcs.push(lc);
        }

        for instr in &ir.instrs {
            builder.flatten(instr);
        }

        R1cs {
            constraints: builder.constraints,
            num_witness: symbols.num_witness(),
        }
    }

    fn flatten(&mut self, instr: &IrInstr) {
        match instr {
            IrInstr::Const { out, value } => {
                self.wire_lcs[out.0 as usize] = Lc::constant(*value);
            }
            IrInstr::Sub { out, lhs, rhs } => {
                self.wire_lcs[out.0 as usize] = self.lc(*lhs).sub(&self.lc(*rhs));
            }
            IrInstr::Not { out, input } => {
                let one = Lc::constant(self.field.one());
                self.wire_lcs[out.0 as usize] = one.sub(&self.lc(*input));
            }
            IrInstr::Mul { out, lhs, rhs } => {
                let out_lc = self.output_lc(*out);
                self.constraints.push(Constraint {
                    a: self.lc(*lhs),
                    b: self.lc(*rhs),
                    c: out_lc.clone(),
                    label: self.output_label(*out),
                });
                self.wire_lcs[out.0 as usize] = out_lc;
            }
            IrInstr::IsZero { out, input, hint } => {
                let label = self.output_label(*out);
                self.flatten_zero_test(*out, *input, *hint, label);
            }
            IrInstr::Membership {
                out,
                input,
                hint,
                set,
            } => {
                self.flatten_zero_test(*out, *input, *hint, format!("membership in {}", set));
            }
            IrInstr::Assert {
                wire,
                expected,
                label,
            } => {
                self.constraints.push(Constraint {
                    a: self.lc(*wire),
                    b: Lc::constant(self.field.one()),
                    c: Lc::constant(*expected),
                    label: label.clone(),
                });
            }
        }
    }

    /// The two-constraint zero test: with `x` the input, `m` the inverse
    /// hint and `z` the flag,
    ///
    ///   x * m = 1 - z
    ///   x * z = 0
    ///
    /// forces `z = 1` when `x = 0` (first row) and `z = 0` when `x != 0`
    /// (second row). Booleanity of `z` follows, no third row needed.
    fn flatten_zero_test(&mut self, out: Wire, input: Wire, hint: Wire, label: String) {
        let x = self.lc(input);
        let m = self.lc(hint);
        let z = self.output_lc(out);
        let one = Lc::constant(self.field.one());

        self.constraints.push(Constraint {
            a: x.clone(),
            b: m,
            c: one.sub(&z),
            label: label.clone(),
        });
        self.constraints.push(Constraint {
            a: x,
            b: z.clone(),
            c: Lc::zero(),
            label,
        });
        self.wire_lcs[out.0 as usize] = z;
    }

    fn lc(&self, wire: Wire) -> Lc {
        self.wire_lcs[wire.0 as usize].clone()
    }

    /// Witness index of an instruction output wire.
    fn output_index(&self, wire: Wire) -> usize {
        match self.ir.origin(wire) {
            WireOrigin::Computed {
                witness: Some(index),
            } => *index,
            origin => unreachable!("constrained output without a witness slot: {:?}", origin),
        }
    }

    fn output_lc(&self, wire: Wire) -> Lc {
        Lc::single(self.output_index(wire), self.field.one())
    }

    fn output_label(&self, wire: Wire) -> String {
        match &self.symbols.slots()[self.output_index(wire)] {
            Slot::Aux { label } => label.clone(),
            slot => unreachable!("instruction output in a non-aux slot: {:?}", slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::U256;
    use crate::ir::IrBuilder;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn compile(source: &str) -> (R1cs, SymbolTable, Field) {
        let field = Field::new(U256::from_u64(101)).unwrap();
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let symbols = SymbolTable::from_decls(&program.decls).unwrap();
        let (ir, symbols) = IrBuilder::new(field, symbols).lower(&program.rules).unwrap();
        let r1cs = R1csBuilder::build(&ir, &symbols, field);
        (r1cs, symbols, field)
    }

    fn elems(field: &Field, values: &[u64]) -> Vec<FieldElement> {
        values.iter().map(|&v| field.element(v)).collect()
    }

    #[test]
    fn test_equality_rule_constraint_count() {
        // x == 5: two rows for the zero test, one for the assertion
        let (r1cs, symbols, _) = compile("pub x\nrule r: x == 5");
        assert_eq!(r1cs.constraints.len(), 3);
        // one, x, inverse hint, flag
        assert_eq!(symbols.num_witness(), 4);
        assert_eq!(r1cs.num_witness, 4);
    }

    #[test]
    fn test_subtraction_folds_without_rows() {
        // the whole body is linear except the zero test and assert
        let (r1cs, _, _) = compile("pub x\npub y\nrule r: x - y + 1 == 0");
        assert_eq!(r1cs.constraints.len(), 3);
    }

    #[test]
    fn test_equality_satisfied_witness() {
        let (r1cs, _, field) = compile("pub x\nrule r: x == 5");
        // w = [1, x, m, z]; x = 5 makes the difference zero, so z = 1 and
        // the hint m is zero
        let good = elems(&field, &[1, 5, 0, 1]);
        assert_eq!(r1cs.check(&good, &field), Ok(()));
        // x = 7: difference is 2, z = 0, m = inv(2) = 51; gadget rows hold
        // but the assertion z = 1 fails (last row)
        let bad = elems(&field, &[1, 7, 51, 0]);
        assert_eq!(r1cs.check(&bad, &field), Err(2));
    }

    #[test]
    fn test_nonzero_rule_witnesses() {
        // x != 0: diff = x, gadget rows x*m = 1 - z and x*z = 0, assert 1 - z = 1
        let (r1cs, _, field) = compile("pub x\nrule r: x != 0");
        // x = 5: m = inv(5) = 81, z = 0
        let good = elems(&field, &[1, 5, 81, 0]);
        assert_eq!(r1cs.check(&good, &field), Ok(()));
        // x = 0 forces z = 1, violating the assertion (last row)
        let bad = elems(&field, &[1, 0, 0, 1]);
        assert_eq!(r1cs.check(&bad, &field), Err(2));
    }

    #[test]
    fn test_zero_test_rejects_cheating_flag() {
        let (r1cs, _, field) = compile("pub x\nrule r: x != 0");
        // x = 0 but prover claims z = 0 to pass the assert: first gadget
        // row 0 * m = 1 - 0 is unsatisfiable
        let cheat = elems(&field, &[1, 0, 0, 0]);
        assert_eq!(r1cs.check(&cheat, &field), Err(0));
    }

    #[test]
    fn test_constraint_labels() {
        let (r1cs, _, _) = compile("set allowed { 1, 2 }\npub x\nrule valid: x in allowed");
        assert!(r1cs
            .constraints
            .iter()
            .any(|c| c.label == "membership in allowed"));
        assert!(r1cs.constraints.iter().any(|c| c.label == "valid"));
    }

    #[test]
    fn test_lc_arithmetic_cancels_zeros() {
        let field = Field::new(U256::from_u64(101)).unwrap();
        let a = Lc::single(1, field.one());
        let cancelled = a.sub(&a);
        assert!(cancelled.0.is_empty(), "self-subtraction leaves no terms");

        let sum = Lc::constant(field.element(3)).add(&Lc::constant(field.element(98)));
        assert!(sum.0.is_empty(), "3 + 98 = 0 mod 101 drops the term");
    }

    #[test]
    fn test_lc_evaluate() {
        let field = Field::new(U256::from_u64(101)).unwrap();
        let lc = Lc::constant(field.element(7)).add(&Lc::single(1, field.one()));
        let witness = elems(&field, &[1, 10]);
        assert_eq!(lc.evaluate(&witness, &field), field.element(17));
    }
}
