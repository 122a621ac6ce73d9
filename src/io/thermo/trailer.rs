use indexmap::IndexMap;

use super::source::TrailerEntry;

pub const CHARGE_STATE: &str = "Charge State:";
pub const MONOISOTOPIC_MZ: &str = "Monoisotopic M/Z:";
pub const ION_INJECTION_TIME: &str = "Ion Injection Time (ms):";
pub const MASTER_INDEX: &str = "Master Index:";
pub const MASTER_SCAN_NUMBER: &str = "Master Scan Number:";

/// The trailer label holding the isolation width of an MSn scan
pub fn isolation_width_key(ms_level: u8) -> String {
    format!("MS{ms_level} Isolation Width:")
}

/// Typed, forgiving access to the per-scan trailer extra values.
///
/// Values are trimmed on construction. Every accessor treats a missing label
/// and an unparsable value alike, returning `None`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanTrailer {
    data: IndexMap<String, String>,
}

impl ScanTrailer {
    pub fn new<'a, I: IntoIterator<Item = &'a TrailerEntry>>(entries: I) -> Self {
        let data = entries
            .into_iter()
            .map(|e| (e.label.clone(), e.value.trim().to_string()))
            .collect();
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|v| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// `Some(true)` for "on", "true" or "yes" in any case, `Some(false)` for any
    /// other value that is present
    pub fn as_bool(&self, key: &str) -> Option<bool> {
        self.get(key)
            .map(|v| matches!(v.to_lowercase().as_str(), "on" | "true" | "yes"))
    }

    pub fn as_double(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn as_int(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Like [`ScanTrailer::as_int`], but only strictly positive values
    pub fn as_positive_int(&self, key: &str) -> Option<i32> {
        self.as_int(key).filter(|v| *v > 0)
    }
}
