use std::collections::BTreeMap;

use thiserror::Error;

use crate::field::{Field, FieldElement, FieldError};
use crate::ir::{Ir, IrInstr, Wire, WireOrigin};
use crate::symbol::SymbolTable;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WitnessError {
    #[error("no value supplied for input '{name}'")]
    MissingInput { name: String },
    #[error("'{label}' does not hold for these inputs (constraint {constraint_index})")]
    Unsatisfied {
        label: String,
        constraint_index: usize,
    },
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Replay the instruction stream numerically and produce the full witness
/// vector: slot 0 is one, input slots come from `inputs`, auxiliary slots
/// are computed.
///
/// The zero-test gadgets use the hint rule `m = inv(x)` when `x` is
/// nonzero and `m = 0` otherwise, so witness generation is deterministic.
pub fn evaluate(
    ir: &Ir,
    symbols: &SymbolTable,
    field: Field,
    inputs: &BTreeMap<String, u64>,
) -> Result<Vec<FieldElement>, WitnessError> {
    let mut witness = vec![field.zero(); symbols.num_witness()];
    witness[0] = field.one();
    for (name, index, _public) in symbols.inputs() {
        let value = inputs
            .get(name)
            .ok_or_else(|| WitnessError::MissingInput {
                name: name.to_string(),
            })?;
        witness[index] = field.element(*value);
    }

    let mut values: Vec<Option<FieldElement>> = vec![None; ir.wires.len()];
    for (i, origin) in ir.wires.iter().enumerate() {
        if let WireOrigin::Input { witness: index, .. } = origin {
            values[i] = Some(witness[*index]);
        }
    }

    let value_of = |values: &[Option<FieldElement>], wire: Wire| -> FieldElement {
        match values[wire.0 as usize] {
            Some(v) => v,
            None => unreachable!("instruction operands are defined earlier"),
        }
    };

    // Track the constraint row each instruction would emit, so an assertion
    // failure names the same index the constraint checker would report.
    let mut row = 0usize;

    for instr in &ir.instrs {
        match instr {
            IrInstr::Const { out, value } => {
                values[out.0 as usize] = Some(*value);
            }
            IrInstr::Sub { out, lhs, rhs } => {
                let result = value_of(&values, *lhs).sub(value_of(&values, *rhs));
                values[out.0 as usize] = Some(result);
            }
            IrInstr::Not { out, input } => {
                let result = field.one().sub(value_of(&values, *input));
                values[out.0 as usize] = Some(result);
            }
            IrInstr::Mul { out, lhs, rhs } => {
                let result = value_of(&values, *lhs).mul(value_of(&values, *rhs));
                values[out.0 as usize] = Some(result);
                store(&mut witness, ir, *out, result);
                row += 1;
            }
            IrInstr::IsZero { out, input, hint }
            | IrInstr::Membership {
                out, input, hint, ..
            } => {
                let x = value_of(&values, *input);
                let (z, m) = if x.is_zero() {
                    (field.one(), field.zero())
                } else {
                    (field.zero(), x.inv()?)
                };
                values[out.0 as usize] = Some(z);
                values[hint.0 as usize] = Some(m);
                store(&mut witness, ir, *out, z);
                store_hint(&mut witness, ir, *hint, m);
                row += 2;
            }
            IrInstr::Assert {
                wire,
                expected,
                label,
            } => {
                if value_of(&values, *wire) != *expected {
                    return Err(WitnessError::Unsatisfied {
                        label: label.clone(),
                        constraint_index: row,
                    });
                }
                row += 1;
            }
        }
    }

    Ok(witness)
}

fn store(witness: &mut [FieldElement], ir: &Ir, wire: Wire, value: FieldElement) {
    if let WireOrigin::Computed {
        witness: Some(index),
    } = ir.origin(wire)
    {
        witness[*index] = value;
    }
}

fn store_hint(witness: &mut [FieldElement], ir: &Ir, wire: Wire, value: FieldElement) {
    if let WireOrigin::Hint { witness: index } = ir.origin(wire) {
        witness[*index] = value;
    }
}
