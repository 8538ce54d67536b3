//! Helpers shared by the integration tests.

/// Find the value of a sample in scraped exposition text.
///
/// `series` is the metric name followed by its label set exactly as rendered.
pub fn sample_value(rendered: &str, series: &str) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (name, value) = line.rsplit_once(' ')?;
            (name == series).then(|| value.parse().ok()).flatten()
        })
}
