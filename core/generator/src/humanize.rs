//! Byte-size parsing and formatting matching the descriptor grammar: SI and
//! IEC suffixes in, `"101 B"` / `"1.0 kB"` / `"1.0 KiB"` style out.

const SI_SIZES: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
const IEC_SIZES: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Formats with SI (decimal) units: `format_bytes(102000) == "102 kB"`.
pub fn format_bytes(size: u64) -> String {
    humanate(size, 1000.0, &SI_SIZES)
}

/// Formats with IEC (binary) units: `format_ibytes(1024) == "1.0 KiB"`.
pub fn format_ibytes(size: u64) -> String {
    humanate(size, 1024.0, &IEC_SIZES)
}

fn humanate(size: u64, base: f64, sizes: &[&str; 7]) -> String {
    if size < 10 {
        return format!("{size} B");
    }
    let e = (size as f64).log(base).floor();
    let suffix = sizes[e as usize];
    let value = ((size as f64 / base.powf(e)) * 10.0 + 0.5).floor() / 10.0;
    if value < 10.0 {
        format!("{value:.1} {suffix}")
    } else {
        format!("{value:.0} {suffix}")
    }
}

/// Parses a human-readable byte count: an integer or decimal number followed
/// by an optional SI or IEC suffix, case-insensitive, spaces allowed
/// (`"101"`, `"1.5 kB"`, `"1KiB"`, `"2M"`).
pub fn parse_bytes(s: &str) -> Result<u64, String> {
    let bytes = s.as_bytes();
    let mut last_digit = 0;
    let mut has_comma = false;
    for &b in bytes {
        if !(b.is_ascii_digit() || b == b'.' || b == b',') {
            break;
        }
        if b == b',' {
            has_comma = true;
        }
        last_digit += 1;
    }
    let mut num = s[..last_digit].to_string();
    if has_comma {
        num = num.replace(',', "");
    }
    let value: f64 = num
        .parse()
        .map_err(|_| format!("invalid size: {s}"))?;

    let suffix = s[last_digit..].trim().to_lowercase();
    let multiplier: f64 = match suffix.as_str() {
        "" | "b" => 1.0,
        "k" | "kb" => 1e3,
        "m" | "mb" => 1e6,
        "g" | "gb" => 1e9,
        "t" | "tb" => 1e12,
        "p" | "pb" => 1e15,
        "e" | "eb" => 1e18,
        "ki" | "kib" => (1u64 << 10) as f64,
        "mi" | "mib" => (1u64 << 20) as f64,
        "gi" | "gib" => (1u64 << 30) as f64,
        "ti" | "tib" => (1u64 << 40) as f64,
        "pi" | "pib" => (1u64 << 50) as f64,
        "ei" | "eib" => (1u64 << 60) as f64,
        _ => return Err(format!("unhandled size name: {suffix}")),
    };
    let total = value * multiplier;
    if total >= u64::MAX as f64 {
        return Err(format!("too large: {s}"));
    }
    Ok(total as u64)
}
