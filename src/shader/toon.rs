use serde::{Deserialize, Serialize};

/// Thresholds of the toon index cascade. An index above `THRESHOLDS[k]`
/// (and not above the next one) selects curve `k + 1`; above the last one the
/// shade passes through unchanged.
pub const THRESHOLDS: [f32; 7] = [-0.1, 0.9, 1.9, 2.9, 3.9, 4.9, 5.9];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToonRamp {
    /// Hard two-tone steps at increasing shade levels.
    #[default]
    Stepped,
    /// Soft gradients with the same midpoints.
    Smooth,
}

const STEPPED: [&[[f32; 2]]; 6] = [
    &[[0.0, 0.5], [0.45, 0.5], [0.5, 1.0], [1.0, 1.0]],
    &[[0.0, 0.6], [0.4, 0.6], [0.45, 1.0], [1.0, 1.0]],
    &[[0.0, 0.7], [0.35, 0.7], [0.4, 1.0], [1.0, 1.0]],
    &[[0.0, 0.4], [0.5, 0.4], [0.55, 1.0], [1.0, 1.0]],
    &[[0.0, 0.8], [0.3, 0.8], [0.35, 1.0], [1.0, 1.0]],
    &[[0.0, 0.3], [0.55, 0.3], [0.6, 1.0], [1.0, 1.0]],
];

const SMOOTH: [&[[f32; 2]]; 6] = [
    &[[0.0, 0.5], [0.3, 0.55], [0.7, 0.95], [1.0, 1.0]],
    &[[0.0, 0.6], [0.25, 0.65], [0.65, 0.95], [1.0, 1.0]],
    &[[0.0, 0.7], [0.2, 0.75], [0.6, 0.97], [1.0, 1.0]],
    &[[0.0, 0.4], [0.35, 0.45], [0.75, 0.95], [1.0, 1.0]],
    &[[0.0, 0.8], [0.15, 0.82], [0.5, 0.98], [1.0, 1.0]],
    &[[0.0, 0.3], [0.4, 0.35], [0.8, 0.95], [1.0, 1.0]],
];

impl ToonRamp {
    pub fn curves(self) -> [Vec<[f32; 2]>; 6] {
        let table = match self {
            ToonRamp::Stepped => &STEPPED,
            ToonRamp::Smooth => &SMOOTH,
        };
        std::array::from_fn(|i| table[i].to_vec())
    }
}

/// Piecewise linear lookup, clamped to the first and last points.
pub fn sample(points: &[[f32; 2]], x: f32) -> f32 {
    let Some(first) = points.first() else {
        return x;
    };
    if x <= first[0] {
        return first[1];
    }
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        if x <= b[0] {
            if b[0] - a[0] <= f32::EPSILON {
                return b[1];
            }
            let t = (x - a[0]) / (b[0] - a[0]);
            return a[1] + (b[1] - a[1]) * t;
        }
    }
    points[points.len() - 1][1]
}

/// Curve selected by `index`, `None` meaning pass-through.
pub fn select(index: f32) -> Option<usize> {
    let mut selected = None;
    for (k, threshold) in THRESHOLDS.iter().enumerate() {
        if index > *threshold {
            selected = if k < 6 { Some(k) } else { None };
        }
    }
    selected
}
