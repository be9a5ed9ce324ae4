//! Fully constrained linear spectral unmixing and NDFI
//!
//! Fractions are estimated with non-negative least squares on a system
//! augmented by a heavily weighted sum-to-one row, which enforces both
//! constraints of fully constrained least squares (FCLS).

/// Green vegetation endmember (B1 B2 B3 B4 B5 B7, reflectance × 10000)
pub const GV: [f64; 6] = [500.0, 900.0, 400.0, 6100.0, 3000.0, 1000.0];
pub const SHADE: [f64; 6] = [0.0; 6];
/// Non-photosynthetic vegetation
pub const NPV: [f64; 6] = [1400.0, 1700.0, 2200.0, 3000.0, 5500.0, 3000.0];
pub const SOIL: [f64; 6] = [2000.0, 3000.0, 3400.0, 5800.0, 6000.0, 5800.0];
pub const CLOUD: [f64; 6] = [9000.0, 9600.0, 8000.0, 7800.0, 7200.0, 6500.0];

const N_BANDS: usize = 6;
const N_EM: usize = 5;
/// Rows of the augmented system: bands plus the sum-to-one row
const N_ROWS: usize = N_BANDS + 1;
/// Weight of the sum-to-one row
const DELTA: f64 = 100.0;
const TOL: f64 = 1e-12;
const MAX_ITER: usize = 100;

/// Endmember fractions of one pixel, non-negative and summing to one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fractions {
    pub gv: f64,
    pub shade: f64,
    pub npv: f64,
    pub soil: f64,
    pub cloud: f64,
}

impl Fractions {
    /// NDFI from these fractions, scaled by 1000.
    ///
    /// Green vegetation is shade-normalized first: `GVs = GV / (1 − shade)`.
    pub fn ndfi(&self) -> f64 {
        let gv_shade = self.gv / (1.0 - self.shade);
        let npv_soil = self.npv + self.soil;
        (gv_shade - npv_soil) / (gv_shade + npv_soil) * 1000.0
    }
}

/// Unmix one six-band pixel into gv, shade, npv, soil and cloud fractions.
///
/// Returns `None` for non-finite input or a degenerate system.
pub fn unmix(pixel: &[f64; 6]) -> Option<Fractions> {
    if pixel.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let endmembers = [GV, SHADE, NPV, SOIL, CLOUD];
    // a[r][e]: column e is endmember e in unit reflectance
    let mut a = [[0.0; N_EM]; N_ROWS];
    for (e, em) in endmembers.iter().enumerate() {
        for band in 0..N_BANDS {
            a[band][e] = em[band] / 10_000.0;
        }
        a[N_BANDS][e] = DELTA;
    }
    let mut b = [0.0; N_ROWS];
    for band in 0..N_BANDS {
        b[band] = pixel[band] / 10_000.0;
    }
    b[N_BANDS] = DELTA;

    let x = nnls(&a, &b)?;
    let total: f64 = x.iter().sum();
    if total <= TOL {
        return None;
    }
    Some(Fractions {
        gv: x[0] / total,
        shade: x[1] / total,
        npv: x[2] / total,
        soil: x[3] / total,
        cloud: x[4] / total,
    })
}

/// Normalized Difference Fraction Index of a pixel, NaN when unmixing fails
pub fn ndfi(pixel: &[f64; 6]) -> f64 {
    unmix(pixel).map_or(f64::NAN, |f| f.ndfi())
}

// ---------------------------------------------------------------------------
// Lawson–Hanson active set NNLS
// ---------------------------------------------------------------------------

fn nnls(a: &[[f64; N_EM]; N_ROWS], b: &[f64; N_ROWS]) -> Option<[f64; N_EM]> {
    let mut x = [0.0; N_EM];
    let mut passive = [false; N_EM];

    for _ in 0..MAX_ITER {
        // w = Aᵀ (b − A x)
        let mut residual = *b;
        for (r, row) in a.iter().enumerate() {
            residual[r] -= row.iter().zip(&x).map(|(aij, xj)| aij * xj).sum::<f64>();
        }
        let mut best: Option<(usize, f64)> = None;
        for e in (0..N_EM).filter(|&e| !passive[e]) {
            let w: f64 = (0..N_ROWS).map(|r| a[r][e] * residual[r]).sum();
            if w > TOL && best.map_or(true, |(_, bw)| w > bw) {
                best = Some((e, w));
            }
        }
        let Some((t, _)) = best else {
            return Some(x);
        };
        passive[t] = true;

        loop {
            let z = solve_passive(a, b, &passive)?;
            if (0..N_EM).filter(|&e| passive[e]).all(|e| z[e] > TOL) {
                x = z;
                break;
            }

            // step back to the feasible boundary
            let mut alpha = f64::INFINITY;
            for e in (0..N_EM).filter(|&e| passive[e] && z[e] <= TOL) {
                let step = x[e] / (x[e] - z[e]);
                if step < alpha {
                    alpha = step;
                }
            }
            for e in 0..N_EM {
                x[e] += alpha * (z[e] - x[e]);
                if passive[e] && x[e] <= TOL {
                    passive[e] = false;
                    x[e] = 0.0;
                }
            }
            if !passive.iter().any(|&p| p) {
                break;
            }
        }
    }
    Some(x)
}

/// Unconstrained least squares restricted to the passive set, zeros elsewhere
fn solve_passive(
    a: &[[f64; N_EM]; N_ROWS],
    b: &[f64; N_ROWS],
    passive: &[bool; N_EM],
) -> Option<[f64; N_EM]> {
    let cols: Vec<usize> = (0..N_EM).filter(|&e| passive[e]).collect();
    let n = cols.len();

    // normal equations [AᵀA | Aᵀb]
    let mut m = vec![vec![0.0; n + 1]; n];
    for (i, &ci) in cols.iter().enumerate() {
        for (j, &cj) in cols.iter().enumerate() {
            m[i][j] = (0..N_ROWS).map(|r| a[r][ci] * a[r][cj]).sum();
        }
        m[i][n] = (0..N_ROWS).map(|r| a[r][ci] * b[r]).sum();
    }

    // Gaussian elimination with partial pivoting
    for k in 0..n {
        let pivot = (k..n).max_by(|&p, &q| m[p][k].abs().total_cmp(&m[q][k].abs()))?;
        if m[pivot][k].abs() < 1e-12 {
            return None;
        }
        m.swap(k, pivot);
        for i in (k + 1)..n {
            let factor = m[i][k] / m[k][k];
            for j in k..=n {
                m[i][j] -= factor * m[k][j];
            }
        }
    }
    let mut sol = vec![0.0; n];
    for k in (0..n).rev() {
        let tail: f64 = ((k + 1)..n).map(|j| m[k][j] * sol[j]).sum();
        sol[k] = (m[k][n] - tail) / m[k][k];
    }

    let mut z = [0.0; N_EM];
    for (i, &c) in cols.iter().enumerate() {
        z[c] = sol[i];
    }
    Some(z)
}
