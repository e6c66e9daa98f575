use crate::prelude::*;

pub fn non_empty(value: &str) -> Result<String> {
    if value.trim().is_empty() {
        Err(anyhow!("expected a non-empty value"))
    } else {
        Ok(value.to_string())
    }
}

pub fn sample_rate(value: &str) -> Result<f32> {
    match value.parse::<f32>()? {
        value if (0.0..=1.0).contains(&value) => Ok(value),
        value => Err(anyhow!("{} is not within [0, 1]", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_ok() -> Result {
        assert_eq!(non_empty("fires")?, "fires");
        assert!(non_empty("  ").is_err());
        Ok(())
    }

    #[test]
    fn sample_rate_ok() -> Result {
        assert_eq!(sample_rate("0.25")?, 0.25);
        assert!(sample_rate("1.5").is_err());
        assert!(sample_rate("nope").is_err());
        Ok(())
    }
}
