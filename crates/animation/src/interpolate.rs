use crate::keyframes::{Bracket, Keyframe, KeyframeTrack};

/// Evaluates a track strictly between `keys[lower]` and `keys[lower + 1]`.
pub trait Interpolator {
    fn interpolate(&self, keys: &[Keyframe], lower: usize, frame: i64) -> f64;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearInterpolator;

impl Interpolator for LinearInterpolator {
    fn interpolate(&self, keys: &[Keyframe], lower: usize, frame: i64) -> f64 {
        lerp_between(keys[lower], keys[lower + 1], frame)
    }
}

/// Parabola through the nearest three keys. Inside an interval with a key on
/// both sides, the parabolas through `[i-1, i, i+1]` and `[i, i+1, i+2]` are
/// cross-faded by the interval parameter `t`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuadraticInterpolator;

impl Interpolator for QuadraticInterpolator {
    fn interpolate(&self, keys: &[Keyframe], lower: usize, frame: i64) -> f64 {
        let upper = lower + 1;
        let leading = lower
            .checked_sub(1)
            .and_then(|first| parabola_at(keys[first], keys[lower], keys[upper], frame));
        let trailing = keys
            .get(upper + 1)
            .and_then(|last| parabola_at(keys[lower], keys[upper], *last, frame));
        match (leading, trailing) {
            (Some(leading), Some(trailing)) => {
                let t = interval_t(keys[lower], keys[upper], frame);
                leading * (1.0 - t) + trailing * t
            }
            (Some(value), None) | (None, Some(value)) => value,
            (None, None) => lerp_between(keys[lower], keys[upper], frame),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Quadratic,
}

impl Interpolation {
    pub fn interpolator(self) -> &'static dyn Interpolator {
        match self {
            Interpolation::Linear => &LinearInterpolator,
            Interpolation::Quadratic => &QuadraticInterpolator,
        }
    }
}

/// Resolves a track at `frame`: exact key, then interpolation, then hold last,
/// then hold first, then the parameter's live value for an empty track.
pub fn value_at(
    track: &KeyframeTrack,
    frame: i64,
    interpolator: &dyn Interpolator,
    live_value: f64,
) -> f64 {
    let keys = track.keys();
    match track.bracket(frame) {
        Bracket::Exact(index) => keys[index].value,
        Bracket::Between { lower } => interpolator.interpolate(keys, lower, frame),
        Bracket::AfterLast(index) => keys[index].value,
        Bracket::BeforeFirst => keys[0].value,
        Bracket::Empty => live_value,
    }
}

fn interval_t(a: Keyframe, b: Keyframe, frame: i64) -> f64 {
    (frame - a.frame) as f64 / (b.frame - a.frame) as f64
}

fn lerp_between(a: Keyframe, b: Keyframe, frame: i64) -> f64 {
    let t = interval_t(a, b, frame);
    a.value + (b.value - a.value) * t
}

fn parabola_at(a: Keyframe, b: Keyframe, c: Keyframe, frame: i64) -> Option<f64> {
    // Frames are shifted to `b` so large absolute frame numbers stay well conditioned.
    let origin = b.frame;
    let row = |key: Keyframe| {
        let x = (key.frame - origin) as f64;
        [x * x, x, 1.0]
    };
    let [quadratic, linear, constant] = solve3(
        [row(a), row(b), row(c)],
        [a.value, b.value, c.value],
    )?;
    let x = (frame - origin) as f64;
    Some(quadratic * x * x + linear * x + constant)
}

/// Gaussian elimination with partial pivoting; `None` for a singular system.
pub fn solve3(mut matrix: [[f64; 3]; 3], mut rhs: [f64; 3]) -> Option<[f64; 3]> {
    const SINGULAR_EPSILON: f64 = 1e-12;

    for column in 0..3 {
        let pivot = (column..3).max_by(|&left, &right| {
            matrix[left][column]
                .abs()
                .total_cmp(&matrix[right][column].abs())
        })?;
        if matrix[pivot][column].abs() < SINGULAR_EPSILON {
            return None;
        }
        matrix.swap(column, pivot);
        rhs.swap(column, pivot);
        for row in column + 1..3 {
            let factor = matrix[row][column] / matrix[column][column];
            for k in column..3 {
                matrix[row][k] -= factor * matrix[column][k];
            }
            rhs[row] -= factor * rhs[column];
        }
    }

    let mut solution = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Some(solution)
}
