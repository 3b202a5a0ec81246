//! Spot interval mapped to a derivative price bucket.

/// Half-open range of underlying spots quoted at one derivative price.
/// The theoretical bucket size is absent until greeks are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub begin: i64,
    pub end_exclusive: i64,
    pub price: i64,
    pub theo_bucket_size: Option<i64>,
}

impl Interval {
    pub fn new(begin: i64, end_exclusive: i64, price: i64) -> Self {
        Interval {
            begin,
            end_exclusive,
            price,
            theo_bucket_size: None,
        }
    }

    pub fn with_theo(mut self, theo: Option<i64>) -> Self {
        self.theo_bucket_size = theo;
        self
    }

    #[inline]
    pub fn contains(&self, spot: i64) -> bool {
        self.begin <= spot && spot < self.end_exclusive
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.end_exclusive - self.begin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let iv = Interval::new(1000, 1006, 99);
        assert!(iv.contains(1000));
        assert!(iv.contains(1005));
        assert!(!iv.contains(1006));
        assert_eq!(iv.width(), 6);
    }
}
