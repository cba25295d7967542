//! Fixed-width post number keys.

use crate::errors::ServiceError;

/// Shape of a post key: exactly `width` ASCII digits, zero padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyFormat {
    width: usize,
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self { width: 4 }
    }
}

impl KeyFormat {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Check that `raw` is a well-formed key and return it trimmed.
    pub fn normalize(&self, raw: &str) -> Result<String, ServiceError> {
        let key = raw.trim();
        if key.len() != self.width || !key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ServiceError::Validation(format!(
                "post number must be {} digits (e.g., {})",
                self.width,
                self.format(1)
            )));
        }
        Ok(key.to_string())
    }

    pub fn is_valid(&self, raw: &str) -> bool {
        self.normalize(raw).is_ok()
    }

    /// Zero-pad `n` to the configured width.
    pub fn format(&self, n: u64) -> String {
        format!("{:0width$}", n, width = self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exact_width_digits() {
        let fmt = KeyFormat::new(4);
        assert_eq!(fmt.normalize("0001").unwrap(), "0001");
        assert_eq!(fmt.normalize(" 0420 ").unwrap(), "0420");
    }

    #[test]
    fn rejects_wrong_width_or_non_digits() {
        let fmt = KeyFormat::new(4);
        for bad in ["1", "00001", "00a1", "", "-001", "０００１"] {
            assert!(!fmt.is_valid(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn formats_with_padding() {
        assert_eq!(KeyFormat::new(4).format(7), "0007");
        assert_eq!(KeyFormat::new(5).format(42), "00042");
        assert_eq!(KeyFormat::default().width(), 4);
    }
}
