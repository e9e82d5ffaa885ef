/// Format a byte count for log lines, e.g. `1536` -> `"1.50 KiB"`.
pub fn size_to_human_readable(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// Hex rendering of a digest, for debug logs.
pub fn short_hex(digest: &[u8]) -> String {
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_readable_sizes() {
        assert_eq!(size_to_human_readable(0), "0 B");
        assert_eq!(size_to_human_readable(1023), "1023 B");
        assert_eq!(size_to_human_readable(1536), "1.50 KiB");
        assert_eq!(size_to_human_readable(5 << 30), "5.00 GiB");
    }

    #[test]
    fn short_hex_truncates() {
        assert_eq!(short_hex(&[0xde, 0xad]), "dead");
        assert_eq!(short_hex(&[0xff; 32]).len(), 16);
    }
}
