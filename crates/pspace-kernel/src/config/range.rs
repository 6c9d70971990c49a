//! Numeric value lists: `PARAM` ranges and `ACC` targets.

/// Most values a single range item may expand to.
pub const MAX_RANGE_VALUES: usize = 10_000_000;

/// Evenly spaced values in `[start, stop)`.
///
/// The length is `ceil((stop - start) / step)`, clamped at zero, and value `i`
/// is `start + i * step` (not an accumulated sum). `None` if the length
/// exceeds [`MAX_RANGE_VALUES`].
pub fn arange(start: f64, stop: f64, step: f64) -> Option<Vec<f64>> {
    let span = (stop - start) / step;
    if span.is_nan() || span <= 0.0 {
        return Some(Vec::new());
    }
    let len = span.ceil();
    if len > MAX_RANGE_VALUES as f64 {
        return None;
    }
    Some((0..len as usize).map(|i| start + i as f64 * step).collect())
}

/// Parse one range item.
///
/// Forms: `N` (single value), `:stop`, `start:stop`, `start:stop:step`. In the
/// three-part form an empty start means 0 and an empty step means 1.
pub fn parse_range(item: &str) -> Result<Vec<f64>, String> {
    let parts: Vec<&str> = item.split(':').collect();
    let number = |s: &str| -> Result<f64, String> {
        s.parse::<f64>()
            .map_err(|_| format!("invalid number {:?} in range {:?}", s, item))
    };
    let values = |start: f64, stop: f64, step: f64| -> Result<Vec<f64>, String> {
        arange(start, stop, step).ok_or_else(|| format!("range {:?} has too many values", item))
    };
    let stop = |s: &str| -> Result<f64, String> {
        if s.is_empty() {
            Err(format!("range {:?} has no stop value", item))
        } else {
            number(s)
        }
    };

    match parts.as_slice() {
        [single] => Ok(vec![number(single)?]),
        [start, end] => {
            let start = if start.is_empty() { 0.0 } else { number(start)? };
            values(start, stop(end)?, 1.0)
        }
        [start, end, step] => {
            let start = if start.is_empty() { 0.0 } else { number(start)? };
            let end = stop(end)?;
            let step = if step.is_empty() { 1.0 } else { number(step)? };
            if step == 0.0 {
                return Err(format!("range {:?} has a zero step", item));
            }
            values(start, end, step)
        }
        _ => Err(format!("too many colons in range {:?}", item)),
    }
}

/// Parse an accuracy target: a number, optionally suffixed `%`, `ppm` or `ppb`.
pub fn parse_accuracy(text: &str) -> Result<f64, String> {
    let (number, scale) = if let Some(n) = text.strip_suffix('%') {
        (n, 1e2)
    } else if let Some(n) = text.strip_suffix("ppm") {
        (n, 1e6)
    } else if let Some(n) = text.strip_suffix("ppb") {
        (n, 1e9)
    } else {
        (text, 1.0)
    };
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid accuracy {:?}", text))?;
    Ok(if scale == 1.0 { value } else { value / scale })
}
