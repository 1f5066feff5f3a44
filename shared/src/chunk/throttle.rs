use replica_chunk_serde::SerdeFloat;

/// Decides whether a local write to a [`DataSet`](super::DataSet) is a change
/// worth replicating. Writes the throttle absorbs leave the field untouched.
pub trait DataSetThrottle<T>: Send + Sync {
    /// `value` is close enough to `current` that writing it changes nothing
    fn within_threshold(&self, current: &T, value: &T) -> bool;
}

/// Any difference is a change
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicThrottle;

impl<T: PartialEq> DataSetThrottle<T> for BasicThrottle {
    fn within_threshold(&self, current: &T, value: &T) -> bool {
        current == value
    }
}

/// Ignores writes within `threshold` of the current value
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpsilonThrottle<E> {
    threshold: E,
}

impl<E: Copy> EpsilonThrottle<E> {
    pub fn new(threshold: E) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> E {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: E) {
        self.threshold = threshold;
    }
}

macro_rules! impl_epsilon_throttle {
    ($($float:ty),*) => {$(
        impl DataSetThrottle<$float> for EpsilonThrottle<$float> {
            fn within_threshold(&self, current: &$float, value: &$float) -> bool {
                (*value - *current).abs() <= self.threshold
            }
        }
    )*};
}

impl_epsilon_throttle!(f32, f64);

impl<const S: bool, const V: bool, const B: u8, const F: u8>
    DataSetThrottle<SerdeFloat<S, V, B, F>> for EpsilonThrottle<f32>
{
    fn within_threshold(
        &self,
        current: &SerdeFloat<S, V, B, F>,
        value: &SerdeFloat<S, V, B, F>,
    ) -> bool {
        (value.get() - current.get()).abs() <= self.threshold
    }
}
