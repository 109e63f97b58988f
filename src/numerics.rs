//! # 一维求根
//!
//! 电中性条件求解使用的 Brent 法与二分法。
//!
//! ## 依赖关系
//! - 被 `fermi/backend.rs` 使用

use crate::error::{DefectError, Result};

/// Brent 法求 `func` 在 `[x1, x2]` 内的根，精度 `tol`
///
/// 参考 Numerical Recipes 的 zbrent；要求端点异号（或其一为零）。
pub fn brent<F: Fn(f64) -> f64>(func: F, x1: f64, x2: f64, tol: f64, max_iter: usize) -> Result<f64> {
    let eps = f64::EPSILON.sqrt();

    let (mut a, mut b, mut c) = (x1, x2, x2);
    let (mut fa, mut fb) = (func(a), func(b));

    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if fa.signum() == fb.signum() || fa.is_nan() || fb.is_nan() {
        return Err(DefectError::RootNotBracketed {
            lower: x1,
            upper: x2,
        });
    }

    let mut fc = fb;
    let (mut d, mut e) = (0.0, 0.0);

    for _ in 0..max_iter {
        if fb.signum() == fc.signum() {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * eps * b.abs() + 0.5 * tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Ok(b);
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            // 逆二次插值
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol1 {
            d
        } else if xm > 0.0 {
            tol1
        } else {
            -tol1
        };
        fb = func(b);
    }

    Err(DefectError::NoConvergence {
        iterations: max_iter,
    })
}

/// 二分法求根；函数需单调且端点异号
pub fn bisect<F: Fn(f64) -> f64>(func: F, x1: f64, x2: f64, tol: f64, max_iter: usize) -> Result<f64> {
    let (mut lo, mut hi) = (x1.min(x2), x1.max(x2));
    let f_lo = func(lo);
    let f_hi = func(hi);

    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return Err(DefectError::RootNotBracketed {
            lower: lo,
            upper: hi,
        });
    }

    let lo_sign = f_lo.signum();
    for _ in 0..max_iter {
        let mid = 0.5 * (lo + hi);
        if hi - lo < tol {
            return Ok(mid);
        }
        let f_mid = func(mid);
        if f_mid == 0.0 {
            return Ok(mid);
        }
        if f_mid.signum() == lo_sign {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    Err(DefectError::NoConvergence {
        iterations: max_iter,
    })
}
