//! Kubernetes resource quantity parsing
//!
//! The metrics and capacity APIs report quantities as strings like `250m`,
//! `2`, `128Mi` or `1500k`. Only the magnitude is needed here, so everything
//! is folded down to an f64 in base units.

/// Binary and decimal suffixes, longest first so `Mi` wins over `M`.
const SUFFIXES: &[(&str, f64)] = &[
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Pi", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("Ei", 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Parse a quantity string into base units (cores for CPU, bytes for memory).
pub fn parse_quantity(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for (suffix, factor) in SUFFIXES {
        if let Some(number) = s.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|v| v * factor);
        }
    }

    s.parse::<f64>().ok()
}

/// CPU quantity in milli-cores.
pub fn cpu_millis(s: &str) -> f64 {
    parse_quantity(s).map(|cores| cores * 1000.0).unwrap_or(0.0)
}

/// Memory quantity in bytes.
pub fn memory_bytes(s: &str) -> f64 {
    parse_quantity(s).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_numbers() {
        assert_eq!(parse_quantity("2"), Some(2.0));
        assert_eq!(parse_quantity("0.5"), Some(0.5));
    }

    #[test]
    fn parses_milli_cpu() {
        assert_eq!(cpu_millis("250m"), 250.0);
        assert_eq!(cpu_millis("1"), 1000.0);
        assert_eq!(cpu_millis("1500m"), 1500.0);
    }

    #[test]
    fn parses_nano_cpu() {
        let millis = cpu_millis("123456789n");
        assert!((millis - 123.456789).abs() < 1e-6);
    }

    #[test]
    fn parses_binary_memory() {
        assert_eq!(memory_bytes("128Mi"), 128.0 * 1024.0 * 1024.0);
        assert_eq!(memory_bytes("2Gi"), 2.0 * 1024.0 * 1024.0 * 1024.0);
        assert_eq!(memory_bytes("512Ki"), 512.0 * 1024.0);
    }

    #[test]
    fn parses_decimal_memory() {
        assert_eq!(memory_bytes("1500k"), 1_500_000.0);
        assert_eq!(memory_bytes("1M"), 1_000_000.0);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("abc"), None);
        assert_eq!(cpu_millis("not-a-number"), 0.0);
    }
}
