//! Cell parsing helpers shared by the typed table constructors.

/// Parses an integer cell. Accepts thousands separators (`1,204`) and
/// integral decimals (`3.0`) as exported by spreadsheet tools.
pub fn parse_integer(raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("missing value".to_string());
    }

    let digits: String = trimmed.chars().filter(|c| *c != ',').collect();
    if let Ok(value) = digits.parse::<i64>() {
        return Ok(value);
    }

    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 => {
            Ok(value as i64)
        }
        _ => Err(format!("expected an integer, found {raw:?}")),
    }
}

/// Parses a finite floating point cell.
pub fn parse_float(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("missing value".to_string());
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("expected a number, found {raw:?}")),
    }
}

/// Canonical form of a trip identifier used for matching.
///
/// Surrounding whitespace is ignored and `123.0` compares equal to `123`.
/// Leading zeros are significant.
pub fn canonical_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((int, frac)) = trimmed.split_once('.') {
        if !int.is_empty()
            && int.bytes().all(|b| b.is_ascii_digit())
            && !frac.is_empty()
            && frac.bytes().all(|b| b == b'0')
        {
            return int.to_string();
        }
    }
    trimmed.to_string()
}
