/// One library entry: a grid index per sampled torsion.
pub type GridRow = Vec<i32>;

const GRID_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizeOptions {
    /// Storage grid step in degrees.
    pub resolution: f64,
    /// When set, conformers closer than this (in degrees) to an already kept conformer are
    /// rejected before quantization.
    pub min_separation: Option<f64>,
}

impl QuantizeOptions {
    pub fn new(resolution: f64) -> Self {
        Self {
            resolution,
            min_separation: None,
        }
    }

    pub fn with_min_separation(mut self, separation: f64) -> Self {
        self.min_separation = Some(separation);
        self
    }
}

/// Wraps an angle in degrees into [-180, 180).
pub fn wrap_degrees(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Smallest difference between two angles once the 360 degree period is accounted for.
pub fn wrapped_difference(a: f64, b: f64) -> f64 {
    let delta = a - b;
    delta.abs().min((delta + 360.0).abs()).min((delta - 360.0).abs())
}

/// Grid index of an angle, rounding half away from zero.
///
/// Indices are kept inside [-180, 180): a value that rounds onto +180 becomes the -180 index
/// when the step divides 360, and otherwise the nearest index inside the range.
pub fn grid_index(angle: f64, resolution: f64) -> i32 {
    let mut index = (wrap_degrees(angle) / resolution).round();
    if index * resolution >= 180.0 - GRID_TOLERANCE {
        let steps = 360.0 / resolution;
        if (steps - steps.round()).abs() < GRID_TOLERANCE {
            index -= steps.round();
        } else {
            index -= 1.0;
        }
    } else if index * resolution < -180.0 - GRID_TOLERANCE {
        index += 1.0;
    }
    index as i32
}

/// Greedy filter: keeps a conformer only if it differs from every kept one by more than
/// `threshold` on at least one torsion.
///
/// Order dependent: earlier conformers win.
pub fn select_separated(series: &[Vec<f64>], threshold: f64) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::new();
    for (i, values) in series.iter().enumerate() {
        let mut min_diff = threshold * 1000.0;
        for &k in &kept {
            let diff = values
                .iter()
                .zip(&series[k])
                .map(|(&a, &b)| wrapped_difference(a, b))
                .fold(0.0, f64::max);
            min_diff = min_diff.min(diff);
        }
        if min_diff > threshold {
            kept.push(i);
        }
    }
    kept
}

/// Quantizes torsion values (one inner vector per conformer) into sorted, unique grid rows.
pub fn quantize(series: &[Vec<f64>], options: &QuantizeOptions) -> Vec<GridRow> {
    let selected: Vec<&Vec<f64>> = match options.min_separation {
        Some(threshold) => select_separated(series, threshold)
            .into_iter()
            .map(|i| &series[i])
            .collect(),
        None => series.iter().collect(),
    };

    let mut rows: Vec<GridRow> = selected
        .into_iter()
        .map(|values| {
            values
                .iter()
                .map(|&v| grid_index(v, options.resolution))
                .collect()
        })
        .collect();
    rows.sort();
    rows.dedup();
    rows
}
