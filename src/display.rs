//! Presentation helpers. Nothing here feeds back into filtering or sorting.

const SPECIALTY_COLORS: &[&str] = &[
    "#1976d2", "#388e3c", "#fbc02d", "#7b1fa2", "#d32f2f", "#0097a7", "#8d6e63", "#c2185b",
    "#0288d1", "#43a047", "#ffa000", "#6d4c41", "#512da8", "#455a64",
];

const SPECIALTY_COLORS_HIGH_CONTRAST: &[&str] = &[
    "#0ea5e9", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#14b8a6", "#f97316", "#22c55e",
    "#e11d48", "#3b82f6", "#a855f7", "#06b6d4",
];

const FALLBACK_COLOR: &str = "#777";

/// Rendering preferences passed in by the view layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayOptions {
    /// Show names as "Last, First".
    pub reorder_names: bool,
    pub high_contrast: bool,
}

/// Split "Jane Doe, MD, FACC" into ("Jane Doe", "MD, FACC").
pub fn split_name_and_cred(full: &str) -> (String, String) {
    let full = full.trim();
    match full.split_once(',') {
        None => (full.to_string(), String::new()),
        Some((base, cred)) => (base.trim().to_string(), cred.trim().to_string()),
    }
}

pub fn to_last_first(base: &str) -> String {
    let parts: Vec<&str> = base.split_whitespace().collect();
    match parts.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{last}, {}", rest.join(" ")),
        _ => base.to_string(),
    }
}

pub fn format_display_name(full: &str, reorder: bool) -> String {
    let (base, cred) = split_name_and_cred(full);
    let styled = if reorder { to_last_first(&base) } else { base };
    if cred.is_empty() {
        styled
    } else {
        format!("{styled}, {cred}")
    }
}

/// Deterministic chip colour for a specialty label.
///
/// Uses the `hash * 31 + code` string hash over UTF-16 code units, with the
/// shift wrapping at 32 bits, and indexes the palette by `|hash| % len`.
/// Distinct labels may share a colour.
pub fn color_for_specialty(label: &str, high_contrast: bool) -> &'static str {
    if label.is_empty() {
        return FALLBACK_COLOR;
    }
    let palette = if high_contrast {
        SPECIALTY_COLORS_HIGH_CONTRAST
    } else {
        SPECIALTY_COLORS
    };
    let mut hash: i64 = 0;
    for unit in label.encode_utf16() {
        let shifted = (hash as i32).wrapping_shl(5);
        hash = i64::from(unit) + i64::from(shifted) - hash;
    }
    palette[(hash.unsigned_abs() % palette.len() as u64) as usize]
}

/// Black or white text, whichever reads better on `hex` ("#rrggbb").
pub fn contrast_text(hex: &str) -> &'static str {
    let h = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        h.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .map(f64::from)
    };
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => {
            let luma = (0.299 * r + 0.587 * g + 0.114 * b) / 255.0;
            if luma > 0.6 { "#000" } else { "#fff" }
        }
        _ => "#fff",
    }
}
