use rayon::prelude::*;
use serde::Serialize;

use crate::field::{Field, FieldElement};
use crate::r1cs::R1cs;

/// A dense polynomial, coefficients from degree 0 upward, trailing zeros
/// trimmed. The empty vector is the zero polynomial.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Poly(pub Vec<FieldElement>);

impl Poly {
    pub fn zero() -> Poly {
        Poly(Vec::new())
    }

    pub fn from_coeffs(mut coeffs: Vec<FieldElement>) -> Poly {
        while coeffs.last().is_some_and(|c| c.is_zero()) {
            coeffs.pop();
        }
        Poly(coeffs)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Degree, with the zero polynomial mapped to `None`.
    pub fn degree(&self) -> Option<usize> {
        self.0.len().checked_sub(1)
    }

    /// Horner evaluation.
    pub fn eval(&self, x: FieldElement, field: &Field) -> FieldElement {
        let mut acc = field.zero();
        for &coeff in self.0.iter().rev() {
            acc = acc.mul(x).add(coeff);
        }
        acc
    }

    pub fn add(&self, rhs: &Poly, field: &Field) -> Poly {
        let len = self.0.len().max(rhs.0.len());
        let mut coeffs = Vec::with_capacity(len);
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or_else(|| field.zero());
            let b = rhs.0.get(i).copied().unwrap_or_else(|| field.zero());
            coeffs.push(a.add(b));
        }
        Poly::from_coeffs(coeffs)
    }

    pub fn sub(&self, rhs: &Poly, field: &Field) -> Poly {
        let len = self.0.len().max(rhs.0.len());
        let mut coeffs = Vec::with_capacity(len);
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or_else(|| field.zero());
            let b = rhs.0.get(i).copied().unwrap_or_else(|| field.zero());
            coeffs.push(a.sub(b));
        }
        Poly::from_coeffs(coeffs)
    }

    pub fn scale(&self, factor: FieldElement) -> Poly {
        if factor.is_zero() {
            return Poly::zero();
        }
        Poly(self.0.iter().map(|c| c.mul(factor)).collect())
    }

    /// Schoolbook multiplication.
    pub fn mul(&self, rhs: &Poly, field: &Field) -> Poly {
        if self.is_zero() || rhs.is_zero() {
            return Poly::zero();
        }
        let mut coeffs = vec![field.zero(); self.0.len() + rhs.0.len() - 1];
        for (i, &a) in self.0.iter().enumerate() {
            for (j, &b) in rhs.0.iter().enumerate() {
                coeffs[i + j] = coeffs[i + j].add(a.mul(b));
            }
        }
        Poly::from_coeffs(coeffs)
    }

    /// Long division: `(quotient, remainder)` with
    /// `self = quotient * divisor + remainder` and
    /// `deg(remainder) < deg(divisor)`. The divisor must be nonzero.
    pub fn div_rem(&self, divisor: &Poly, field: &Field) -> (Poly, Poly) {
        let lead = match divisor.0.last() {
            Some(&lead) => lead,
            None => unreachable!("division by the zero polynomial"),
        };
        let lead_inv = match lead.inv() {
            Ok(inv) => inv,
            Err(_) => unreachable!("trimmed leading coefficient is nonzero"),
        };

        let mut rem = self.0.clone();
        let mut quot = vec![field.zero(); self.0.len().saturating_sub(divisor.0.len() - 1)];
        while rem.len() >= divisor.0.len() && !rem.is_empty() {
            let factor = rem[rem.len() - 1].mul(lead_inv);
            let shift = rem.len() - divisor.0.len();
            if !factor.is_zero() {
                quot[shift] = factor;
                for (i, &d) in divisor.0.iter().enumerate() {
                    rem[shift + i] = rem[shift + i].sub(factor.mul(d));
                }
            }
            rem.pop();
        }
        (Poly::from_coeffs(quot), Poly::from_coeffs(rem))
    }
}

/// Lagrange interpolation over distinct points: the unique polynomial of
/// degree below `xs.len()` with `p(xs[j]) = ys[j]`.
pub fn lagrange_interpolate(
    xs: &[FieldElement],
    ys: &[FieldElement],
    field: &Field,
) -> Poly {
    debug_assert_eq!(xs.len(), ys.len());
    let mut acc = Poly::zero();
    for (j, &y) in ys.iter().enumerate() {
        if y.is_zero() {
            continue;
        }
        // basis_j(x) = prod_{k != j} (x - x_k) / (x_j - x_k)
        let mut numerator = Poly(vec![field.one()]);
        let mut denominator = field.one();
        for (k, &xk) in xs.iter().enumerate() {
            if k == j {
                continue;
            }
            numerator = numerator.mul(&Poly(vec![xk.neg(), field.one()]), field);
            denominator = denominator.mul(xs[j].sub(xk));
        }
        let denom_inv = match denominator.inv() {
            Ok(inv) => inv,
            Err(_) => unreachable!("interpolation points are distinct"),
        };
        acc = acc.add(&numerator.scale(y.mul(denom_inv)), field);
    }
    acc
}

/// A quadratic arithmetic program: one polynomial triple per witness index,
/// evaluated at one point per constraint.
#[derive(Clone, Debug, Serialize)]
pub struct Qap {
    pub a_polys: Vec<Poly>,
    pub b_polys: Vec<Poly>,
    pub c_polys: Vec<Poly>,
    /// Evaluation points, `r_k = k + 1` for constraint `k`.
    pub points: Vec<FieldElement>,
    /// `Z(x) = prod (x - r_k)`, the vanishing polynomial of the points.
    pub vanishing: Poly,
    #[serde(skip)]
    field: Field,
}

impl Qap {
    /// Interpolate an R1CS into polynomial form. Each witness index gets
    /// `A_i, B_i, C_i` with `A_i(r_k)` equal to its coefficient in
    /// constraint `k`'s `a` combination, and likewise for `b` and `c`.
    pub fn from_r1cs(r1cs: &R1cs, field: Field) -> Qap {
        let points: Vec<FieldElement> = (0..r1cs.constraints.len())
            .map(|k| field.element(k as u64 + 1))
            .collect();

        let column = |pick: &(dyn Fn(usize, usize) -> FieldElement + Sync)| -> Vec<Poly> {
            (0..r1cs.num_witness)
                .into_par_iter()
                .map(|i| {
                    let values: Vec<FieldElement> =
                        (0..points.len()).map(|k| pick(k, i)).collect();
                    lagrange_interpolate(&points, &values, &field)
                })
                .collect()
        };

        let coeff = |lc: &crate::r1cs::Lc, i: usize| {
            lc.0.get(&i).copied().unwrap_or_else(|| field.zero())
        };
        let a_polys = column(&|k, i| coeff(&r1cs.constraints[k].a, i));
        let b_polys = column(&|k, i| coeff(&r1cs.constraints[k].b, i));
        let c_polys = column(&|k, i| coeff(&r1cs.constraints[k].c, i));

        let mut vanishing = Poly(vec![field.one()]);
        for &point in &points {
            vanishing = vanishing.mul(&Poly(vec![point.neg(), field.one()]), &field);
        }

        Qap {
            a_polys,
            b_polys,
            c_polys,
            points,
            vanishing,
            field,
        }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    /// The divisibility oracle: combine the witness into
    /// `P = (sum w_i A_i)(sum w_i B_i) - sum w_i C_i` and test whether the
    /// vanishing polynomial divides it. Holds exactly when the witness
    /// satisfies every constraint.
    pub fn check_witness(&self, witness: &[FieldElement]) -> bool {
        let combine = |polys: &[Poly]| {
            let mut acc = Poly::zero();
            for (poly, &w) in polys.iter().zip(witness) {
                acc = acc.add(&poly.scale(w), &self.field);
            }
            acc
        };
        let a = combine(&self.a_polys);
        let b = combine(&self.b_polys);
        let c = combine(&self.c_polys);
        let p = a.mul(&b, &self.field).sub(&c, &self.field);

        if p.is_zero() {
            return true;
        }
        let (_, rem) = p.div_rem(&self.vanishing, &self.field);
        rem.is_zero()
    }
}
