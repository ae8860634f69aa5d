/// Range of sample values, used for display ranges of channels.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct ValueRange {
    /// Lower bound
    pub low: f32,
    /// Upper bound
    pub high: f32,
}

impl ValueRange {
    /// Constructs new, empty range.
    pub fn empty() -> ValueRange {
        ValueRange {
            low: f32::NAN,
            high: f32::NAN,
        }
    }

    /// Constructs minimal range containing every sample.
    /// Non-finite samples are skipped.
    pub fn from_samples(iter: impl IntoIterator<Item = f32>) -> ValueRange {
        let mut range = ValueRange::empty();
        for val in iter.into_iter().filter(|v| v.is_finite()) {
            range.extend(val);
        }
        range
    }

    /// Extend the range with new value.
    pub fn extend(&mut self, val: f32) {
        if self.is_empty() {
            self.low = val;
            self.high = val;
        }

        if val > self.high {
            self.high = val;
        }

        if val < self.low {
            self.low = val;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_nan() || self.high.is_nan()
    }

    /// Bounds, or `fallback` for an empty range.
    pub fn bounds_or(&self, fallback: (f32, f32)) -> (f32, f32) {
        if self.is_empty() {
            fallback
        } else {
            (self.low, self.high)
        }
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn value_range() {
        let mut range = ValueRange::empty();

        assert!(range.is_empty());
        assert_eq!(range.bounds_or((0.0, 255.0)), (0.0, 255.0));

        range.extend(2.0);
        assert!(!range.is_empty());
        assert_eq!(range.bounds_or((0.0, 255.0)), (2.0, 2.0));

        for val in [0.0, 5.0, 3.0, -2.5] {
            range.extend(val);
        }

        assert_eq!(range.low, -2.5);
        assert_eq!(range.high, 5.0);
    }

    #[test]
    fn from_samples() {
        let samples = [1.0, 2.0, f32::NAN, 10.0, 5.0, 0.0];

        let range = ValueRange::from_samples(samples);

        assert_eq!(
            range,
            ValueRange {
                low: 0.0,
                high: 10.0
            }
        )
    }
}
