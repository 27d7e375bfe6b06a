use serde_json::Value;

/// Values the cache can decide not to store.
///
/// Empty values are never cached, so a transient empty answer from an
/// upstream is not served for the whole TTL.
pub trait CacheValue {
    /// Returns true if the value carries no data.
    fn is_empty_value(&self) -> bool;
}

impl CacheValue for Value {
    fn is_empty_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }
}

impl CacheValue for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T> CacheValue for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: CacheValue> CacheValue for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.as_ref().map_or(true, CacheValue::is_empty_value)
    }
}

impl<T: CacheValue + ?Sized> CacheValue for std::sync::Arc<T> {
    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}
