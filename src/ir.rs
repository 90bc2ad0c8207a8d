use std::collections::HashMap;

use crate::ast::{BinOp, CmpOp, Expr, Literal, Rule, SetRef};
use crate::diagnostic::Diagnostic;
use crate::field::{Field, FieldElement};
use crate::span::{Span, Spanned};
use crate::symbol::{Resolved, SymbolTable};

/// An SSA wire id. Instructions only reference wires created earlier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Wire(pub u32);

/// Where a wire's value comes from.
#[derive(Clone, Debug)]
pub enum WireOrigin {
    /// A compile-time constant. Folds into linear combinations; no witness
    /// slot.
    Const(FieldElement),
    /// An input variable bound to a witness slot.
    Input { witness: usize, name: String },
    /// The output of an instruction. `witness` is set for multiplication
    /// and gadget outputs; `Sub`/`Not` outputs stay linear and get none.
    Computed { witness: Option<usize> },
    /// A free witness filled in by the gadget hint rule, not computed by
    /// any instruction.
    Hint { witness: usize },
}

#[derive(Clone, Debug)]
pub enum IrInstr {
    Const {
        out: Wire,
        value: FieldElement,
    },
    Sub {
        out: Wire,
        lhs: Wire,
        rhs: Wire,
    },
    Mul {
        out: Wire,
        lhs: Wire,
        rhs: Wire,
    },
    /// `out = 1` iff `input = 0`. `hint` holds the inverse of `input` when
    /// it is nonzero, and zero otherwise.
    IsZero {
        out: Wire,
        input: Wire,
        hint: Wire,
    },
    /// `out = 1 - input`, for boolean inputs.
    Not {
        out: Wire,
        input: Wire,
    },
    /// IsZero over a product of differences, labeled with the set it
    /// tests so failures name the membership check.
    Membership {
        out: Wire,
        input: Wire,
        hint: Wire,
        set: String,
    },
    /// Constrain `wire` to equal `expected`. `label` names the rule.
    Assert {
        wire: Wire,
        expected: FieldElement,
        label: String,
    },
}

/// The lowered program: instructions plus the wire table.
#[derive(Clone, Debug)]
pub struct Ir {
    pub instrs: Vec<IrInstr>,
    pub wires: Vec<WireOrigin>,
}

impl Ir {
    pub fn origin(&self, wire: Wire) -> &WireOrigin {
        &self.wires[wire.0 as usize]
    }
}

/// Value kind of a lowered subexpression. Boolean connectives and rule
/// bodies require `Bool`; comparisons, membership, `not` and the bool
/// literals produce it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ty {
    Field,
    Bool,
}

pub struct IrBuilder {
    field: Field,
    symbols: SymbolTable,
    instrs: Vec<IrInstr>,
    wires: Vec<WireOrigin>,
    var_wires: HashMap<usize, Wire>,
    rule_name: String,
}

impl IrBuilder {
    pub fn new(field: Field, symbols: SymbolTable) -> Self {
        Self {
            field,
            symbols,
            instrs: Vec::new(),
            wires: Vec::new(),
            var_wires: HashMap::new(),
            rule_name: String::new(),
        }
    }

    /// Lower every rule to the instruction stream. A rule that fails to
    /// lower is skipped and reported; remaining rules are still checked so
    /// one pass reports as much as possible.
    pub fn lower(mut self, rules: &[Rule]) -> Result<(Ir, SymbolTable), Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        for rule in rules {
            self.rule_name = rule.name.node.clone();
            match self.lower_expr(&rule.body) {
                Ok((wire, Ty::Bool)) => {
                    self.instrs.push(IrInstr::Assert {
                        wire,
                        expected: self.field.one(),
                        label: rule.name.node.clone(),
                    });
                }
                Ok((_, Ty::Field)) => {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("rule '{}' is not a boolean expression", rule.name.node),
                            rule.body.span,
                        )
                        .with_help(
                            "a rule body must be a comparison, membership test or boolean \
                             combination of them"
                                .to_string(),
                        ),
                    );
                }
                Err(diag) => diagnostics.push(diag),
            }
        }

        if diagnostics.is_empty() {
            Ok((
                Ir {
                    instrs: self.instrs,
                    wires: self.wires,
                },
                self.symbols,
            ))
        } else {
            Err(diagnostics)
        }
    }

    fn lower_expr(&mut self, expr: &Spanned<Expr>) -> Result<(Wire, Ty), Diagnostic> {
        match &expr.node {
            Expr::Literal(Literal::Integer(n)) => {
                Ok((self.const_wire(self.field.element(*n)), Ty::Field))
            }
            Expr::Literal(Literal::Bool(b)) => {
                Ok((self.const_wire(self.field.element(*b as u64)), Ty::Bool))
            }
            Expr::Var(name) => self.lower_var(name, expr.span),
            Expr::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs, expr.span),
            Expr::Comparison { op, lhs, rhs } => self.lower_comparison(*op, lhs, rhs, expr.span),
            Expr::Not(inner) => {
                let operand = self.lower_boolean_operand(inner, "not")?;
                Ok((self.not(operand), Ty::Bool))
            }
            Expr::In { needle, set } => self.lower_membership(needle, set),
        }
    }

    fn lower_var(&mut self, name: &str, span: Span) -> Result<(Wire, Ty), Diagnostic> {
        match self.symbols.resolve(name, span)? {
            Resolved::Constant(v) => Ok((self.const_wire(self.field.element(v)), Ty::Field)),
            Resolved::Variable(witness) => {
                if let Some(&wire) = self.var_wires.get(&witness) {
                    return Ok((wire, Ty::Field));
                }
                let wire = self.push_wire(WireOrigin::Input {
                    witness,
                    name: name.to_string(),
                });
                self.var_wires.insert(witness, wire);
                Ok((wire, Ty::Field))
            }
        }
    }

    fn lower_binary(
        &mut self,
        op: BinOp,
        lhs: &Spanned<Expr>,
        rhs: &Spanned<Expr>,
        span: Span,
    ) -> Result<(Wire, Ty), Diagnostic> {
        match op {
            BinOp::And => {
                let a = self.lower_boolean_operand(lhs, "and")?;
                let b = self.lower_boolean_operand(rhs, "and")?;
                // both operands are 0/1, so the product is their conjunction
                let out = self.mul(a, b);
                Ok((out, Ty::Bool))
            }
            BinOp::Or => {
                let a = self.lower_boolean_operand(lhs, "or")?;
                let b = self.lower_boolean_operand(rhs, "or")?;
                // a or b = not (not a and not b)
                let na = self.not(a);
                let nb = self.not(b);
                let both_false = self.mul(na, nb);
                Ok((self.not(both_false), Ty::Bool))
            }
            BinOp::Add => {
                let (a, _) = self.lower_expr(lhs)?;
                let (b, _) = self.lower_expr(rhs)?;
                // a + b = a - (0 - b); stays linear, folds at constraint time
                let zero = self.const_wire(self.field.zero());
                let neg_b = self.sub(zero, b);
                Ok((self.sub(a, neg_b), Ty::Field))
            }
            BinOp::Sub => {
                let (a, _) = self.lower_expr(lhs)?;
                let (b, _) = self.lower_expr(rhs)?;
                Ok((self.sub(a, b), Ty::Field))
            }
            BinOp::Mul => {
                let (a, _) = self.lower_expr(lhs)?;
                let (b, _) = self.lower_expr(rhs)?;
                Ok((self.mul(a, b), Ty::Field))
            }
            BinOp::Div => {
                let (a, _) = self.lower_expr(lhs)?;
                let (b, _) = self.lower_expr(rhs)?;
                let divisor = match self.wires[b.0 as usize] {
                    WireOrigin::Const(c) => c,
                    _ => {
                        return Err(Diagnostic::error(
                            "division by a non-constant expression".to_string(),
                            rhs.span,
                        )
                        .with_help(
                            "only division by a nonzero constant is supported; it folds to a \
                             multiplication by the constant's inverse"
                                .to_string(),
                        ));
                    }
                };
                let inv = divisor.inv().map_err(|_| {
                    Diagnostic::error("division by zero".to_string(), span)
                })?;
                let inv_wire = self.const_wire(inv);
                Ok((self.mul(a, inv_wire), Ty::Field))
            }
        }
    }

    fn lower_comparison(
        &mut self,
        op: CmpOp,
        lhs: &Spanned<Expr>,
        rhs: &Spanned<Expr>,
        span: Span,
    ) -> Result<(Wire, Ty), Diagnostic> {
        match op {
            CmpOp::Eq | CmpOp::Ne => {}
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                return Err(Diagnostic::error(
                    format!("ordering comparison '{}' is not supported", op.symbol()),
                    span,
                )
                .with_note(
                    "field elements have no sound ordering without a range check".to_string(),
                )
                .with_help("only '==', '!=' and 'in' tests can be compiled".to_string()));
            }
        }

        let (a, _) = self.lower_expr(lhs)?;
        let (b, _) = self.lower_expr(rhs)?;
        let diff = self.sub(a, b);
        let eq = self.is_zero(diff);
        match op {
            CmpOp::Eq => Ok((eq, Ty::Bool)),
            CmpOp::Ne => Ok((self.not(eq), Ty::Bool)),
            _ => unreachable!("ordering rejected above"),
        }
    }

    fn lower_membership(
        &mut self,
        needle: &Spanned<Expr>,
        set: &Spanned<SetRef>,
    ) -> Result<(Wire, Ty), Diagnostic> {
        let (values, set_name) = match &set.node {
            SetRef::Named(name) => {
                let values = self.symbols.lookup_set(name).ok_or_else(|| {
                    Diagnostic::error(format!("undefined set '{}'", name), set.span)
                        .with_help("declare it with 'set <name> { ... }'".to_string())
                })?;
                (values.to_vec(), name.clone())
            }
            SetRef::Inline(members) => {
                let mut values = Vec::new();
                for member in members {
                    values.push(self.symbols.resolve_set_member(&member.node, member.span)?);
                }
                (values, "set literal".to_string())
            }
        };
        if values.is_empty() {
            return Err(Diagnostic::error(
                format!("membership test against empty set '{}'", set_name),
                set.span,
            ));
        }

        let (needle_wire, _) = self.lower_expr(needle)?;

        // Product of differences vanishes exactly when the needle hits a
        // member, so membership is IsZero over the product.
        let mut product: Option<Wire> = None;
        for value in values {
            let member = self.const_wire(self.field.element(value));
            let diff = self.sub(needle_wire, member);
            product = Some(match product {
                None => diff,
                Some(p) => self.mul(p, diff),
            });
        }
        let Some(product) = product else {
            unreachable!("empty sets are rejected above");
        };

        let hint_idx = self
            .symbols
            .alloc_aux(format!("{}.in_{}.inv", self.rule_name, set_name));
        let hint = self.push_wire(WireOrigin::Hint { witness: hint_idx });
        let out_idx = self
            .symbols
            .alloc_aux(format!("{}.in_{}", self.rule_name, set_name));
        let out = self.push_wire(WireOrigin::Computed {
            witness: Some(out_idx),
        });
        self.instrs.push(IrInstr::Membership {
            out,
            input: product,
            hint,
            set: set_name,
        });
        Ok((out, Ty::Bool))
    }

    fn lower_boolean_operand(
        &mut self,
        expr: &Spanned<Expr>,
        op: &str,
    ) -> Result<Wire, Diagnostic> {
        let (wire, ty) = self.lower_expr(expr)?;
        if ty != Ty::Bool {
            return Err(Diagnostic::error(
                format!("operand of '{}' is not boolean", op),
                expr.span,
            )
            .with_help(
                "boolean operators apply to comparisons, membership tests and bool literals"
                    .to_string(),
            ));
        }
        Ok(wire)
    }

    // --- Instruction emission ---

    fn push_wire(&mut self, origin: WireOrigin) -> Wire {
        let wire = Wire(self.wires.len() as u32);
        self.wires.push(origin);
        wire
    }

    fn const_wire(&mut self, value: FieldElement) -> Wire {
        let out = self.push_wire(WireOrigin::Const(value));
        self.instrs.push(IrInstr::Const { out, value });
        out
    }

    fn sub(&mut self, lhs: Wire, rhs: Wire) -> Wire {
        let out = self.push_wire(WireOrigin::Computed { witness: None });
        self.instrs.push(IrInstr::Sub { out, lhs, rhs });
        out
    }

    fn mul(&mut self, lhs: Wire, rhs: Wire) -> Wire {
        let witness = self.symbols.alloc_aux(format!("{}.product", self.rule_name));
        let out = self.push_wire(WireOrigin::Computed {
            witness: Some(witness),
        });
        self.instrs.push(IrInstr::Mul { out, lhs, rhs });
        out
    }

    fn not(&mut self, input: Wire) -> Wire {
        let out = self.push_wire(WireOrigin::Computed { witness: None });
        self.instrs.push(IrInstr::Not { out, input });
        out
    }

    fn is_zero(&mut self, input: Wire) -> Wire {
        let hint_idx = self
            .symbols
            .alloc_aux(format!("{}.is_zero.inv", self.rule_name));
        let hint = self.push_wire(WireOrigin::Hint { witness: hint_idx });
        let out_idx = self.symbols.alloc_aux(format!("{}.is_zero", self.rule_name));
        let out = self.push_wire(WireOrigin::Computed {
            witness: Some(out_idx),
        });
        self.instrs.push(IrInstr::IsZero { out, input, hint });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn lower(source: &str) -> (Ir, SymbolTable) {
        let field = Field::new(crate::field::U256::from_u64(101)).unwrap();
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let symbols = SymbolTable::from_decls(&program.decls).unwrap();
        IrBuilder::new(field, symbols)
            .lower(&program.rules)
            .expect("lowers cleanly")
    }

    fn lower_err(source: &str) -> Vec<Diagnostic> {
        let field = Field::new(crate::field::U256::from_u64(101)).unwrap();
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let symbols = SymbolTable::from_decls(&program.decls).unwrap();
        IrBuilder::new(field, symbols)
            .lower(&program.rules)
            .expect_err("should fail to lower")
    }

    fn count<F: Fn(&IrInstr) -> bool>(ir: &Ir, pred: F) -> usize {
        ir.instrs.iter().filter(|&i| pred(i)).count()
    }

    #[test]
    fn test_equality_lowers_to_sub_then_is_zero() {
        let (ir, _) = lower("rule r: x == 5");
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Sub { .. })), 1);
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::IsZero { .. })), 1);
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Assert { .. })), 1);
    }

    #[test]
    fn test_inequality_adds_not() {
        let (ir, _) = lower("rule r: x != 0");
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::IsZero { .. })), 1);
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Not { .. })), 1);
    }

    #[test]
    fn test_membership_builds_difference_chain() {
        let (ir, _) = lower("enum S { A, B, C }\nrule r: x in {A, B}");
        // one Sub per member, one Mul joining them, one Membership
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Sub { .. })), 2);
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Mul { .. })), 1);
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Membership { .. })), 1);
        match ir.instrs.iter().find(|i| matches!(i, IrInstr::Membership { .. })) {
            Some(IrInstr::Membership { set, .. }) => assert_eq!(set, "set literal"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_named_set_membership_keeps_name() {
        let (ir, _) = lower("set allowed { 1, 2, 3 }\nrule r: x in allowed");
        match ir.instrs.iter().find(|i| matches!(i, IrInstr::Membership { .. })) {
            Some(IrInstr::Membership { set, .. }) => assert_eq!(set, "allowed"),
            _ => panic!("expected a membership instruction"),
        }
    }

    #[test]
    fn test_and_is_product_of_booleans() {
        let (ir, _) = lower("rule r: x == 1 and y == 2");
        // two IsZero gadgets and the conjunction product
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::IsZero { .. })), 2);
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Mul { .. })), 1);
    }

    #[test]
    fn test_or_uses_de_morgan() {
        let (ir, _) = lower("rule r: x == 1 or y == 2");
        // not a, not b, not (product)
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Not { .. })), 3);
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Mul { .. })), 1);
    }

    #[test]
    fn test_addition_stays_linear() {
        let (ir, symbols) = lower("rule r: x + y == 10");
        // a + b lowers through Sub wires only; the sole aux slots belong to
        // the IsZero gadget (hint + flag)
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Mul { .. })), 0);
        // one, x, y, hint, flag
        assert_eq!(symbols.num_witness(), 5);
    }

    #[test]
    fn test_constant_division_folds_to_mul() {
        let (ir, _) = lower("rule r: x / 2 == 3");
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Mul { .. })), 1);
        // inverse of 2 mod 101 is 51, present as a constant
        let field = Field::new(crate::field::U256::from_u64(101)).unwrap();
        let has_inv = ir.instrs.iter().any(
            |i| matches!(i, IrInstr::Const { value, .. } if *value == field.element(51)),
        );
        assert!(has_inv, "division should fold to multiplication by 51");
    }

    #[test]
    fn test_same_variable_reuses_wire() {
        let (ir, _) = lower("rule r: x * x == 4");
        let input_wires = ir
            .wires
            .iter()
            .filter(|w| matches!(w, WireOrigin::Input { .. }))
            .count();
        assert_eq!(input_wires, 1);
    }

    #[test]
    fn test_error_ordering_comparison() {
        let diags = lower_err("rule r: x < 10");
        assert!(diags[0].message.contains("'<' is not supported"));
        assert!(diags[0].help.is_some());
    }

    #[test]
    fn test_error_division_by_zero_constant() {
        let diags = lower_err("rule r: x / 0 == 1");
        assert!(diags[0].message.contains("division by zero"));
    }

    #[test]
    fn test_error_division_by_variable() {
        let diags = lower_err("rule r: x / y == 1");
        assert!(diags[0].message.contains("non-constant"));
    }

    #[test]
    fn test_error_non_boolean_rule_body() {
        let diags = lower_err("rule r: x + 1");
        assert!(diags[0].message.contains("not a boolean expression"));
    }

    #[test]
    fn test_error_non_boolean_and_operand() {
        let diags = lower_err("rule r: x and y == 1");
        assert!(diags[0].message.contains("operand of 'and' is not boolean"));
    }

    #[test]
    fn test_error_undefined_set() {
        let diags = lower_err("rule r: x in nowhere");
        assert!(diags[0].message.contains("undefined set 'nowhere'"));
    }

    #[test]
    fn test_errors_reported_across_rules() {
        let diags = lower_err("rule a: x < 1\nrule b: y > 2");
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_boolean_literal_rule() {
        let (ir, _) = lower("rule r: true");
        assert_eq!(count(&ir, |i| matches!(i, IrInstr::Assert { .. })), 1);
    }
}
