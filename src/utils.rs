//! Helper functions and data types

use std::sync::Arc;

/// Named closure taking its input by reference. Equality, ordering and
/// hashing only consider the name.
pub struct WrappedFunc<Input: ?Sized, Output> {
    name: String,
    func: Arc<dyn Fn(&Input) -> Output + Send + Sync + 'static>,
}

impl<I: ?Sized, O> WrappedFunc<I, O> {
    pub fn new<N, F>(name: N, func: F) -> Self
    where
        N: Into<String>,
        F: Fn(&I) -> O + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    #[inline]
    pub fn call(&self, input: &I) -> O {
        (self.func)(input)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<I: ?Sized, O> Clone for WrappedFunc<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<I: ?Sized, O> std::fmt::Debug for WrappedFunc<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<WrappedFunc: {}>", self.name)
    }
}

impl<I: ?Sized, O> PartialEq for WrappedFunc<I, O> {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq(&other.name)
    }
}

impl<I: ?Sized, O> Eq for WrappedFunc<I, O> {}

impl<I: ?Sized, O> PartialOrd for WrappedFunc<I, O> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: ?Sized, O> Ord for WrappedFunc<I, O> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

impl<I: ?Sized, O> std::hash::Hash for WrappedFunc<I, O> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Returns the median of `values`, or NaN if `values` is empty.
pub fn median_of_floats(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::{median_of_floats, WrappedFunc};

    #[test]
    fn median() {
        assert_eq!(median_of_floats(vec![3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median_of_floats(vec![4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(median_of_floats(vec![]).is_nan());
    }

    #[test]
    fn wrapped_funcs_compare_by_name() {
        let a = WrappedFunc::new("a", |x: &u64| x + 1);
        let b = WrappedFunc::new("a", |x: &u64| x * 2);

        assert_eq!(a, b);
        assert_eq!(a.call(&2), 3);
        assert_eq!(format!("{:?}", b.clone()), "<WrappedFunc: a>");
    }
}
