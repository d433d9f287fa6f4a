use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string in terminal columns (CJK and emoji count double).
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Fit `s` into exactly `width` columns: right-pad short text, cut long text
/// with a trailing "~". Cuts always land on a char boundary.
pub(crate) fn fit_cell(s: &str, width: usize) -> String {
    let sw = display_width(s);
    if sw <= width {
        return format!("{}{}", s, " ".repeat(width - sw));
    }
    if width == 0 {
        return String::new();
    }

    let budget = width - 1;
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        out.push(ch);
    }
    out.push('~');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

/// Horizontal placement of text inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    /// Unknown names fall back to left.
    pub(crate) fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "center" => Align::Center,
            "right" => Align::Right,
            _ => Align::Left,
        }
    }
}

/// Like [`fit_cell`], but short text is placed according to `align`.
pub(crate) fn align_cell(s: &str, width: usize, align: Align) -> String {
    let sw = display_width(s);
    if sw >= width || align == Align::Left {
        return fit_cell(s, width);
    }
    let pad = width - sw;
    let left = match align {
        Align::Center => pad / 2,
        _ => pad,
    };
    format!("{}{}{}", " ".repeat(left), s, " ".repeat(pad - left))
}

/// Column header letters: 0 -> A, 25 -> Z, 26 -> AA.
pub(crate) fn col_letter(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col as u64 + 1;
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Spreadsheet-style reference for a zero-based cell, e.g. (0, 1) -> "B1".
pub(crate) fn cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", col_letter(col), row as u64 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_counts_wide_chars_twice() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("\u{4e16}\u{754c}"), 4);
    }

    #[test]
    fn fit_pads_short_text() {
        assert_eq!(fit_cell("12", 5), "12   ");
        assert_eq!(fit_cell("12345", 5), "12345");
    }

    #[test]
    fn fit_cuts_long_text() {
        assert_eq!(fit_cell("1234567", 5), "1234~");
        assert_eq!(fit_cell("abc", 1), "~");
        assert_eq!(fit_cell("abc", 0), "");
    }

    #[test]
    fn fit_never_splits_a_wide_char() {
        // Three wide chars are 6 columns; a 4-column cell holds one plus the marker.
        let out = fit_cell("\u{4e16}\u{754c}\u{4f60}", 4);
        assert_eq!(out, "\u{4e16}~ ");
        assert_eq!(display_width(&out), 4);
    }

    #[test]
    fn align_places_short_text() {
        assert_eq!(align_cell("ab", 6, Align::Right), "    ab");
        assert_eq!(align_cell("abc", 6, Align::Center), " abc  ");
        assert_eq!(align_cell("ab", 6, Align::Left), "ab    ");
        assert_eq!(align_cell("1234567", 5, Align::Right), "1234~");
        assert_eq!(Align::parse(" Center "), Align::Center);
        assert_eq!(Align::parse("justify"), Align::Left);
    }

    #[test]
    fn column_letters() {
        assert_eq!(col_letter(0), "A");
        assert_eq!(col_letter(25), "Z");
        assert_eq!(col_letter(26), "AA");
        assert_eq!(col_letter(701), "ZZ");
        assert_eq!(col_letter(702), "AAA");
    }

    #[test]
    fn cell_refs() {
        assert_eq!(cell_ref(0, 0), "A1");
        assert_eq!(cell_ref(9, 27), "AB10");
    }
}
