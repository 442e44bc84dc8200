use alloc::vec::Vec;
use num_traits::{AsPrimitive, Float};

/// Default slope resolution of an [`Atan2Table`].
pub const ATAN2_RESOLUTION: usize = 10_000;

/// Offset applied to the minor coordinate of the representative points.
///
/// Keeps the `k == 0` points off the axes so that their angle is not
/// subject to the `(0, 0)` special case.
const MINOR_OFFSET: f64 = 1e-16;

/// 2-argument arctangent strategy.
///
/// Implemented by the exact library function ([`Exact`]) and by the
/// table lookup ([`Atan2Table`]) so that pipelines can be generic over it.
pub trait Atan2<T> {
    /// Angle between the x-axis and the ray to the point `(x, y)` in radians.
    fn atan2(&self, y: T, x: T) -> T;
}

impl<T, A: Atan2<T> + ?Sized> Atan2<T> for &A {
    #[inline]
    fn atan2(&self, y: T, x: T) -> T {
        (**self).atan2(y, x)
    }
}

/// Library (`libm`) arctangent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Exact;

impl<T: Float> Atan2<T> for Exact {
    #[inline]
    fn atan2(&self, y: T, x: T) -> T {
        y.atan2(x)
    }
}

/// Octant index shared by table construction and lookup.
///
/// * bit 0: `|x| >= |y|` (x is the major coordinate)
/// * bit 1: `x >= 0`
/// * bit 2: `y >= 0`
#[inline(always)]
const fn octant(x_major: bool, x_pos: bool, y_pos: bool) -> usize {
    x_major as usize | (x_pos as usize) << 1 | (y_pos as usize) << 2
}

/// Table based 2-argument arctangent.
///
/// The plane is folded into eight octants by the signs of `x` and `y` and by
/// whether `|x| < |y|`. Within an octant the angle is a monotonic function of
/// the slope `min(|x|, |y|)/max(|x|, |y|)` in `[0, 1]`, which is quantized
/// (truncated) to `resolution` buckets.
///
/// Lookup is constant time. The absolute error is bounded by the slope step
/// `1/(resolution - 1)` since `d atan(s)/ds <= 1`, plus rounding of `T`.
/// At the default resolution that is about `1e-4` rad.
///
/// The table is immutable after construction and can be shared by reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Atan2Table<T = f32> {
    // octant-major, `8 * resolution` entries
    table: Vec<T>,
    resolution: usize,
    // `resolution - 1` as `T`
    scale: T,
}

impl<T> Default for Atan2Table<T>
where
    T: Float + 'static,
    f64: AsPrimitive<T>,
    usize: AsPrimitive<T>,
    T: AsPrimitive<usize>,
{
    fn default() -> Self {
        Self::new(ATAN2_RESOLUTION)
    }
}

impl<T> Atan2Table<T>
where
    T: Float + 'static,
    f64: AsPrimitive<T>,
    usize: AsPrimitive<T>,
    T: AsPrimitive<usize>,
{
    /// Build the table.
    ///
    /// Each entry is the exact (`f64`) angle of a representative point of
    /// its octant with the bucket's lower slope bound.
    ///
    /// # Panics
    /// If `resolution < 2`.
    pub fn new(resolution: usize) -> Self {
        assert!(resolution >= 2, "atan2 table resolution must be at least 2");
        let step = ((resolution - 1) as f64).recip();
        let mut table: Vec<T> = Vec::with_capacity(8 * resolution);
        for j in 0..8 {
            let (x_major, x_pos, y_pos) = (j & 1 != 0, j & 2 != 0, j & 4 != 0);
            debug_assert_eq!(octant(x_major, x_pos, y_pos), j);
            table.extend((0..resolution).map(|k| {
                let minor = k as f64 * step + MINOR_OFFSET;
                let (x, y) = if x_major { (1.0, minor) } else { (minor, 1.0) };
                let x = if x_pos { x } else { -x };
                let y = if y_pos { y } else { -y };
                let angle: T = y.atan2(x).as_();
                angle
            }));
        }
        log::debug!("built atan2 table with {} entries", table.len());
        let scale: T = (resolution - 1).as_();
        Self {
            table,
            resolution,
            scale,
        }
    }

    /// Approximate 2-argument arctangent.
    ///
    /// # Arguments
    /// * `y` - Y-axis component.
    /// * `x` - X-axis component.
    ///
    /// # Returns
    /// The angle between the x-axis and the ray to the point `(x, y)` in
    /// `[-pi, pi]`. `(0, 0)` maps to `0`. Negative zero is treated as
    /// positive. Non-finite inputs yield an unspecified table entry.
    #[inline]
    pub fn approx(&self, y: T, x: T) -> T {
        let zero = T::zero();
        if x == zero && y == zero {
            return zero;
        }
        let (xa, ya) = (x.abs(), y.abs());
        let x_major = !(xa < ya);
        let slope = if x_major { ya / xa } else { xa / ya };
        // Saturating cast, then guard against rounding up to `resolution`
        let k: usize = (slope * self.scale).as_();
        let j = octant(x_major, !(x < zero), !(y < zero));
        self.table[j * self.resolution + k.min(self.resolution - 1)]
    }

    /// Number of slope buckets per octant.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Upper bound of the slope quantization error in radians.
    pub fn max_error(&self) -> T {
        self.scale.recip()
    }
}

impl<T> Atan2<T> for Atan2Table<T>
where
    T: Float + 'static,
    f64: AsPrimitive<T>,
    usize: AsPrimitive<T>,
    T: AsPrimitive<usize>,
{
    #[inline]
    fn atan2(&self, y: T, x: T) -> T {
        self.approx(y, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::angle_error;
    use core::f64::consts::PI;
    use quickcheck_macros::quickcheck;
    use std::sync::OnceLock;

    fn shared() -> &'static Atan2Table {
        static TABLE: OnceLock<Atan2Table> = OnceLock::new();
        TABLE.get_or_init(Atan2Table::default)
    }

    // Slope step plus f32 rounding of the stored angle and the slope
    const TOL: f64 = 1.0 / (ATAN2_RESOLUTION - 1) as f64 + 1e-6;

    fn err(t: &Atan2Table, y: f32, x: f32) -> f64 {
        angle_error(t.approx(y, x) as f64, (y as f64).atan2(x as f64))
    }

    #[test]
    fn zero() {
        assert_eq!(shared().approx(0.0, 0.0), 0.0);
        assert_eq!(shared().approx(-0.0, 0.0), 0.0);
        assert_eq!(Atan2Table::<f64>::new(16).approx(0.0, -0.0), 0.0);
    }

    #[test]
    fn axes_and_diagonals() {
        let t = shared();
        let cases = [
            (0.0, 1.0, 0.0),
            (1.0, 0.0, PI / 2.0),
            (0.0, -1.0, PI),
            (-1.0, 0.0, -PI / 2.0),
            (1.0, 1.0, PI / 4.0),
            (1.0, -1.0, 3.0 * PI / 4.0),
            (-1.0, -1.0, -3.0 * PI / 4.0),
            (-1.0, 1.0, -PI / 4.0),
        ];
        for (y, x, want) in cases {
            let have = t.approx(y as f32, x as f32) as f64;
            assert!(angle_error(have, want) < TOL, "{y},{x}: {have} vs {want}");
        }
    }

    #[test]
    fn dense_error() {
        const N: usize = 100_003;
        let t = shared();
        let mut max: f64 = 0.0;
        let mut rms = 0.0;
        for r in [1e-3f64, 1.0, 7.5, 3e4] {
            for i in 0..N {
                let p = -PI + 2.0 * PI * i as f64 / N as f64;
                let (s, c) = p.sin_cos();
                let e = err(t, (r * s) as f32, (r * c) as f32);
                max = max.max(e);
                rms += e * e;
            }
        }
        rms = (rms / (4 * N) as f64).sqrt();
        log::info!("max {max:.3e} rms {rms:.3e}");
        assert!(max < TOL);
        assert!(rms < 0.55 * TOL);
        assert!(t.max_error() as f64 <= TOL);
    }

    #[test]
    fn octant_round_trip() {
        // Representative points reproduce the angle they were built from
        let t = shared();
        let step = 1.0 / (ATAN2_RESOLUTION - 1) as f32;
        for j in 0..8 {
            for k in (1..ATAN2_RESOLUTION).step_by(97) {
                let minor = k as f32 * step;
                let (x, y) = if j & 1 != 0 { (1.0, minor) } else { (minor, 1.0) };
                let x = if j & 2 != 0 { x } else { -x };
                let y = if j & 4 != 0 { y } else { -y };
                assert!(err(t, y, x) < TOL, "octant {j} bucket {k}");
            }
        }
    }

    #[test]
    fn full_slope_is_in_range() {
        let t = Atan2Table::<f32>::new(3);
        assert_eq!(t.resolution(), 3);
        // slope == 1 maps to the last bucket
        assert!(angle_error(t.approx(2.5, 2.5) as f64, PI / 4.0) < 1e-6);
        assert!(angle_error(t.approx(-2.5, -2.5) as f64, -3.0 * PI / 4.0) < 1e-6);
    }

    #[test]
    fn shared_reference_and_exact() {
        let t = shared();
        let by_ref: &dyn Atan2<f32> = &t;
        assert_eq!(by_ref.atan2(0.3, -0.8), t.approx(0.3, -0.8));
        assert_eq!(Exact.atan2(0.3f32, -0.8), 0.3f32.atan2(-0.8));
    }

    #[test]
    fn f64_table() {
        let t = Atan2Table::<f64>::new(1 << 12);
        let e = angle_error(t.approx(-0.1234, 0.987), (-0.1234f64).atan2(0.987));
        assert!(e <= t.max_error() + 1e-12);
    }

    #[test]
    fn non_finite_does_not_panic() {
        let t = shared();
        for v in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            t.approx(v, 1.0);
            t.approx(1.0, v);
            t.approx(v, v);
        }
    }

    #[test]
    #[should_panic]
    fn degenerate_resolution() {
        Atan2Table::<f32>::new(1);
    }

    #[quickcheck]
    fn check_bound(y: f32, x: f32) -> bool {
        if !(y.is_finite() && x.is_finite()) || (x == 0.0 && y == 0.0) {
            return true;
        }
        // Signed zero minor coordinates fold onto the positive half plane
        if y == 0.0 && x < 0.0 {
            return (shared().approx(y, x) as f64 - PI).abs() < TOL;
        }
        err(shared(), y, x) < TOL
    }
}
