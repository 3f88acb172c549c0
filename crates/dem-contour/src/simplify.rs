//! Douglas-Peucker polyline simplification.

/// Simplify a polyline, keeping every vertex farther than `epsilon` from the
/// chord of its enclosing span.
///
/// Endpoints are always kept and no vertex is ever added. The recursion of
/// the classic algorithm is replaced by an explicit stack of spans.
pub fn simplify(points: &[(f64, f64)], epsilon: f64) -> Vec<(f64, f64)> {
    if points.len() <= 2 || epsilon <= 0.0 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut spans = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = spans.pop() {
        if end <= start + 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_idx = start;
        for (i, &point) in points.iter().enumerate().take(end).skip(start + 1) {
            let dist = perpendicular_distance(point, points[start], points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_idx = i;
            }
        }

        if max_dist > epsilon {
            keep[max_idx] = true;
            spans.push((max_idx, end));
            spans.push((start, max_idx));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Distance from `point` to the segment `start`-`end`.
fn perpendicular_distance(point: (f64, f64), start: (f64, f64), end: (f64, f64)) -> f64 {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let len_sq = dx * dx + dy * dy;

    // Closed rings start and end on the same vertex
    if len_sq < 1e-24 {
        let pdx = point.0 - start.0;
        let pdy = point.1 - start.1;
        return (pdx * pdx + pdy * pdy).sqrt();
    }

    let t = (((point.0 - start.0) * dx + (point.1 - start.1) * dy) / len_sq).clamp(0.0, 1.0);
    let pdx = point.0 - (start.0 + t * dx);
    let pdy = point.1 - (start.1 + t * dy);
    (pdx * pdx + pdy * pdy).sqrt()
}
