use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Number of terminal columns `s` occupies (CJK and emoji count as two).
///
/// ```
/// use bananaview::util::display_width;
///
/// assert_eq!(display_width("Mod"), 3);
/// assert_eq!(display_width("角色"), 4);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncates `s` so it fits in `max_width` columns, appending `...` when
/// something was cut.
///
/// Widths of three columns or fewer have no room for the ellipsis, so the
/// result is simply the longest prefix that fits. Returns `Cow::Borrowed`
/// whenever the input already fits.
///
/// ```
/// use bananaview::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Raiden Shogun Outfit", 10), "Raiden ...");
/// assert_eq!(truncate_to_width("雷电将军皮肤", 9), "雷电将...");
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if max_width == 0 {
        return Cow::Borrowed("");
    }
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width <= ELLIPSIS_WIDTH {
        max_width
    } else {
        max_width - ELLIPSIS_WIDTH
    };

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    if max_width <= ELLIPSIS_WIDTH {
        Cow::Owned(s[..cut].to_string())
    } else {
        Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
    }
}

fn is_stripped_control(b: u8) -> bool {
    b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
}

/// Removes terminal control bytes and ANSI escape sequences (CSI and OSC)
/// from text received from the API before it is drawn.
///
/// Tab, newline and carriage return survive. Clean input is returned
/// borrowed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if !bytes.iter().any(|&b| b == 0x1b || is_stripped_control(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x1b => match bytes.get(i + 1) {
                Some(b'[') => {
                    // CSI ends at the first byte in 0x40..=0x7e
                    i += 2;
                    while i < bytes.len() {
                        let c = bytes[i];
                        i += 1;
                        if (0x40..=0x7e).contains(&c) {
                            break;
                        }
                    }
                }
                Some(b']') => {
                    // OSC ends at BEL or ESC '\'
                    i += 2;
                    while i < bytes.len() {
                        if bytes[i] == 0x07 {
                            i += 1;
                            break;
                        }
                        if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                            i += 2;
                            break;
                        }
                        i += 1;
                    }
                }
                _ => i += 1,
            },
            b if is_stripped_control(b) => i += 1,
            _ => {
                let start = i;
                while i < bytes.len() && bytes[i] != 0x1b && !is_stripped_control(bytes[i]) {
                    i += 1;
                }
                // Only ASCII bytes end a run, so the slice is on a char boundary.
                out.push_str(&s[start..i]);
            }
        }
    }
    Cow::Owned(out)
}

/// Converts an HTML fragment (item descriptions, licenses) to plain text.
///
/// `<br>`, list items and block-level tags become line breaks, every other
/// tag is dropped and the common entities are decoded. Blank-line runs
/// collapse to one. A `<` that does not open a tag is kept as text.
///
/// ```
/// use bananaview::util::html_to_text;
///
/// assert_eq!(html_to_text("<p>Fits <b>v2</b>&amp;up</p>"), "Fits v2&up");
/// ```
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        push_decoded(&mut out, &rest[..start]);
        let after = &rest[start + 1..];
        let opens_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');
        let end = after.find('>');
        let (true, Some(end)) = (opens_tag, end) else {
            out.push('<');
            rest = after;
            continue;
        };

        let tag = after[..end].trim();
        let closing = tag.starts_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match name.as_str() {
            "br" => out.push('\n'),
            "li" if !closing => out.push_str("\n- "),
            "p" | "div" | "ul" | "ol" | "tr" | "blockquote" | "h1" | "h2" | "h3" | "h4"
            | "h5" | "h6" => out.push('\n'),
            _ => {}
        }
        rest = &after[end + 1..];
    }
    push_decoded(&mut out, rest);

    let mut text = String::with_capacity(out.len());
    let mut gap = false;
    for line in out.lines().map(str::trim) {
        if line.is_empty() {
            gap = !text.is_empty();
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
            if gap {
                text.push('\n');
            }
        }
        gap = false;
        text.push_str(line);
    }
    strip_control_chars(&text).into_owned()
}

fn push_decoded(out: &mut String, text: &str) {
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let entity = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match entity {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
