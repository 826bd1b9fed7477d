//! 参数解析工具

use anyhow::{Context, Result, bail};

/// 解析逗号分隔的浮点列表，例如 `0.1,0,-0.2`
pub fn parse_values(input: &str) -> Result<Vec<f64>> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().with_context(|| format!("invalid number '{}'", s)))
        .collect()
}

/// 解析三维向量
pub fn parse_vector3(input: &str) -> Result<[f64; 3]> {
    match parse_values(input)?.as_slice() {
        &[x, y, z] => Ok([x, y, z]),
        other => bail!("expected 3 values, got {}", other.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_values("0.1, 0,-0.2").unwrap(), vec![0.1, 0.0, -0.2]);
        assert!(parse_values("0.1,abc").is_err());
    }

    #[test]
    fn test_parse_vector3() {
        assert_eq!(parse_vector3("1,2,3").unwrap(), [1.0, 2.0, 3.0]);
        assert!(parse_vector3("1,2").is_err());
    }
}
