//! Sparse pressure system: triplet assembly into CSR and a restarted GMRES.

use nalgebra::{DMatrix, DVector};

use crate::config::GmresSettings;
use crate::math::Real;

/// Compressed sparse row matrix, square `n × n`.
#[derive(Clone, Debug, Default)]
pub struct CsrMatrix {
    n: usize,
    row_starts: Vec<usize>,
    columns: Vec<usize>,
    values: Vec<Real>,
}

/// Unordered `(row, col, value)` entries; duplicates are summed on build.
#[derive(Clone, Debug, Default)]
pub struct TripletBuilder {
    n: usize,
    entries: Vec<(usize, usize, Real)>,
}

impl TripletBuilder {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(n: usize, capacity: usize) -> Self {
        Self {
            n,
            entries: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, row: usize, col: usize, value: Real) {
        debug_assert!(row < self.n && col < self.n);
        self.entries.push((row, col, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(mut self) -> CsrMatrix {
        self.entries.sort_unstable_by_key(|&(row, col, _)| (row, col));

        let mut row_starts = vec![0; self.n + 1];
        let mut columns = Vec::with_capacity(self.entries.len());
        let mut values: Vec<Real> = Vec::with_capacity(self.entries.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, value) in self.entries {
            if last == Some((row, col)) {
                if let Some(tail) = values.last_mut() {
                    *tail += value;
                }
                continue;
            }
            columns.push(col);
            values.push(value);
            row_starts[row + 1] += 1;
            last = Some((row, col));
        }
        for row in 0..self.n {
            row_starts[row + 1] += row_starts[row];
        }

        CsrMatrix {
            n: self.n,
            row_starts,
            columns,
            values,
        }
    }
}

impl CsrMatrix {
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `(col, value)` pairs of `row`, sorted by column.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, Real)> + '_ {
        let range = self.row_starts[row]..self.row_starts[row + 1];
        self.columns[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    pub fn get(&self, row: usize, col: usize) -> Real {
        self.row(row)
            .find(|&(c, _)| c == col)
            .map_or(0.0, |(_, value)| value)
    }

    pub fn row_sum(&self, row: usize) -> Real {
        self.row(row).map(|(_, value)| value).sum()
    }

    pub fn diagonal(&self) -> DVector<Real> {
        DVector::from_fn(self.n, |row, _| self.get(row, row))
    }

    /// `out = A x`
    pub fn mul_into(&self, x: &DVector<Real>, out: &mut DVector<Real>) {
        for row in 0..self.n {
            out[row] = self.row(row).map(|(col, value)| value * x[col]).sum();
        }
    }

    pub fn mul(&self, x: &DVector<Real>) -> DVector<Real> {
        let mut out = DVector::zeros(self.n);
        self.mul_into(x, &mut out);
        out
    }
}

/// Outcome of one pressure solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    /// `|b - Ax| / |b|`, or 0 for a zero right-hand side.
    pub residual: Real,
    pub converged: bool,
}

impl Default for SolveReport {
    fn default() -> Self {
        Self {
            iterations: 0,
            residual: 0.0,
            converged: true,
        }
    }
}

/// Restarted GMRES with Jacobi right preconditioning.
#[derive(Clone, Copy, Debug, Default)]
pub struct Gmres {
    pub settings: GmresSettings,
}

impl Gmres {
    pub fn new(settings: GmresSettings) -> Self {
        Self { settings }
    }

    /// Solve `A x = b` from a zero initial guess.
    ///
    /// The approximate solution is returned even when the iteration budget
    /// runs out; the report says how far it got.
    pub fn solve(&self, a: &CsrMatrix, b: &DVector<Real>) -> (DVector<Real>, SolveReport) {
        let n = a.n();
        let mut x = DVector::zeros(n);
        let b_norm = b.norm();
        if n == 0 || b_norm == 0.0 {
            return (x, SolveReport::default());
        }

        let inv_diagonal = a.diagonal().map(|d| if d.abs() > Real::EPSILON { 1.0 / d } else { 1.0 });
        let restart = self.settings.restart.max(1);
        let tolerance = self.settings.tolerance;
        let mut iterations = 0;
        let mut scratch = DVector::zeros(n);

        loop {
            a.mul_into(&x, &mut scratch);
            let r = b - &scratch;
            let beta = r.norm();
            if !beta.is_finite() || beta / b_norm <= tolerance || iterations >= self.settings.max_iterations {
                return (
                    x,
                    SolveReport {
                        iterations,
                        residual: beta / b_norm,
                        converged: beta / b_norm <= tolerance,
                    },
                );
            }

            let mut basis: Vec<DVector<Real>> = Vec::with_capacity(restart + 1);
            basis.push(r / beta);
            let mut hessenberg = DMatrix::<Real>::zeros(restart + 1, restart);
            let mut cs = vec![0.0; restart];
            let mut sn = vec![0.0; restart];
            let mut g = DVector::<Real>::zeros(restart + 1);
            g[0] = beta;
            let mut steps = 0;

            for j in 0..restart {
                if iterations >= self.settings.max_iterations {
                    break;
                }
                let z = basis[j].component_mul(&inv_diagonal);
                let mut w = a.mul(&z);

                // Modified Gram-Schmidt
                for (i, v) in basis.iter().enumerate() {
                    let h = w.dot(v);
                    hessenberg[(i, j)] = h;
                    w.axpy(-h, v, 1.0);
                }
                let h_next = w.norm();
                hessenberg[(j + 1, j)] = h_next;

                for i in 0..j {
                    let upper = hessenberg[(i, j)];
                    let lower = hessenberg[(i + 1, j)];
                    hessenberg[(i, j)] = cs[i] * upper + sn[i] * lower;
                    hessenberg[(i + 1, j)] = -sn[i] * upper + cs[i] * lower;
                }
                let (c, s) = givens(hessenberg[(j, j)], hessenberg[(j + 1, j)]);
                cs[j] = c;
                sn[j] = s;
                hessenberg[(j, j)] = c * hessenberg[(j, j)] + s * hessenberg[(j + 1, j)];
                hessenberg[(j + 1, j)] = 0.0;
                g[j + 1] = -s * g[j];
                g[j] *= c;

                iterations += 1;
                steps = j + 1;

                let breakdown = !(h_next > Real::EPSILON * beta);
                if g[j + 1].abs() / b_norm <= tolerance || breakdown {
                    break;
                }
                basis.push(w / h_next);
            }

            if steps == 0 {
                continue;
            }

            // Back substitution on the triangularized Hessenberg matrix.
            let mut y = vec![0.0; steps];
            for i in (0..steps).rev() {
                let mut sum = g[i];
                for l in (i + 1)..steps {
                    sum -= hessenberg[(i, l)] * y[l];
                }
                let pivot = hessenberg[(i, i)];
                y[i] = if pivot.abs() > Real::MIN_POSITIVE { sum / pivot } else { 0.0 };
            }

            let mut update = DVector::zeros(n);
            for (v, &coefficient) in basis.iter().zip(y.iter()) {
                update.axpy(coefficient, v, 1.0);
            }
            x += update.component_mul(&inv_diagonal);
        }
    }
}

#[inline]
fn givens(a: Real, b: Real) -> (Real, Real) {
    if b == 0.0 {
        return (1.0, 0.0);
    }
    let r = a.hypot(b);
    (a / r, b / r)
}
