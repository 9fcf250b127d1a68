//! Font metrics for the built-in Helvetica faces.
//!
//! Centered text placement needs real advance widths — approximating with a
//! fixed per-character factor drifts visibly on all-caps names. These are
//! the Adobe core AFM advance widths (thousandths of an em) for the
//! printable ASCII range; anything outside it falls back to the average
//! lowercase advance, which is close enough for the occasional accented
//! character in a name.

/// Helvetica advance widths for chars 32..=126, in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667,
    778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'A'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556,
    556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'a'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Helvetica-Bold advance widths for chars 32..=126, in 1/1000 em.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667,
    778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611,
    611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// Fallback advance for characters outside printable ASCII.
const FALLBACK: u16 = 556;

/// Advance width of one character at 1/1000 em.
fn advance(c: char, bold: bool) -> u16 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    match c as u32 {
        32..=126 => table[(c as u32 - 32) as usize],
        _ => FALLBACK,
    }
}

/// Width of `text` in points when set in Helvetica (or Helvetica-Bold) at
/// `size` points. The oblique face shares the regular metrics.
pub fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(|c| advance(c, bold) as u32).sum();
    units as f32 * size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_are_uniform_width() {
        let w0 = text_width("0", 10.0, false);
        let w9 = text_width("9", 10.0, false);
        assert_eq!(w0, w9);
        assert!((w0 - 5.56).abs() < 1e-4);
    }

    #[test]
    fn bold_is_wider_for_lowercase() {
        let regular = text_width("student", 12.0, false);
        let bold = text_width("student", 12.0, true);
        assert!(bold > regular);
    }

    #[test]
    fn width_scales_linearly_with_size() {
        let base = text_width("LEVEL-IX", 10.0, true);
        let double = text_width("LEVEL-IX", 20.0, true);
        assert!((double - base * 2.0).abs() < 1e-3);
    }

    #[test]
    fn non_ascii_uses_fallback_instead_of_zero() {
        assert!(text_width("é", 10.0, false) > 0.0);
    }
}
