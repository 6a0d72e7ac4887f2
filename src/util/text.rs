use std::borrow::Cow;

/// Line-break tags that feeds embed in titles and summaries.
const LINE_BREAK_TAGS: [&str; 3] = ["<br/>", "<br>", "<br />"];

/// Replaces HTML line-break tags with a newline character.
///
/// Feed titles and summaries frequently carry `<br/>`, `<br>` or `<br />`
/// markup. A speech engine would read those aloud literally, so every
/// occurrence is turned into `\n` before the text reaches the speak callback.
/// No other markup is touched.
///
/// Returns `Cow::Borrowed` when the input contains no tags (common case).
///
/// # Examples
///
/// ```
/// use feedvoice::util::replace_line_breaks;
///
/// assert_eq!(replace_line_breaks("Plain headline"), "Plain headline");
/// assert_eq!(replace_line_breaks("a<br>b<br />c<br/>d"), "a\nb\nc\nd");
/// ```
pub fn replace_line_breaks(s: &str) -> Cow<'_, str> {
    // Fast path: every tag starts with "<br"
    if !s.contains("<br") {
        return Cow::Borrowed(s);
    }

    let mut out = s.to_string();
    for tag in LINE_BREAK_TAGS {
        if out.contains(tag) {
            out = out.replace(tag, "\n");
        }
    }

    if out == s {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(out)
    }
}
