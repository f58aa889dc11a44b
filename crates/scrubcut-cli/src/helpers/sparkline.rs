// crates/scrubcut-cli/src/helpers/sparkline.rs
//
// One-line text rendering of a normalised envelope.

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Max-pool `values` (expected in 0..=1) into at most `columns` bars.
pub fn sparkline(values: &[f32], columns: usize) -> String {
    if values.is_empty() || columns == 0 {
        return String::new();
    }
    let columns = columns.min(values.len());
    (0..columns)
        .map(|c| {
            let s = c * values.len() / columns;
            let e = ((c + 1) * values.len() / columns).max(s + 1);
            let v = values[s..e].iter().copied().fold(0.0f32, f32::max).clamp(0.0, 1.0);
            BARS[((v * (BARS.len() - 1) as f32).round() as usize).min(BARS.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_to_requested_width() {
        let env: Vec<f32> = (0..100).map(|i| i as f32 / 99.0).collect();
        let line = sparkline(&env, 10);
        assert_eq!(line.chars().count(), 10);
        assert_eq!(line.chars().next(), Some('▂'));
        assert_eq!(line.chars().last(), Some('█'));
    }

    #[test]
    fn short_input_is_not_stretched() {
        assert_eq!(sparkline(&[0.0, 1.0], 64), "▁█");
        assert_eq!(sparkline(&[], 8), "");
    }
}
