//! HTML to plain-text reduction for fetched bookmark pages.
//!
//! Real-world pages are tag soup, so the reader runs in a lenient mode:
//! mismatched end tags are tolerated and a malformed region simply ends
//! extraction with whatever text was collected up to that point. Non-prose
//! subtrees (scripts, styles, chrome) are dropped; block-level elements
//! become paragraph breaks; whitespace is collapsed.

use quick_xml::events::Event;
use quick_xml::Reader;

/// Subtrees that never contain readable prose.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "svg", "form",
];

/// Elements that imply a paragraph break in the output.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table",
    "section", "article", "blockquote", "pre", "hr",
];

/// Reduce an HTML document to readable plain text.
///
/// Returns an empty string when the document holds no prose at all.
pub fn html_to_text(html: &str) -> String {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.trim_text(false);

    let mut out = String::new();
    // Name and depth of the skip subtree we are inside, if any.
    let mut skipping: Option<(String, usize)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                match &mut skipping {
                    Some((tag, depth)) => {
                        if name == *tag {
                            *depth += 1;
                        }
                    }
                    None => {
                        if SKIP_TAGS.contains(&name.as_str()) {
                            skipping = Some((name, 1));
                        } else if BLOCK_TAGS.contains(&name.as_str()) {
                            push_break(&mut out);
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                if let Some((tag, depth)) = &mut skipping {
                    if name == *tag {
                        *depth -= 1;
                        if *depth == 0 {
                            skipping = None;
                        }
                    }
                } else if BLOCK_TAGS.contains(&name.as_str()) {
                    push_break(&mut out);
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                if skipping.is_none() && BLOCK_TAGS.contains(&name.as_str()) {
                    push_break(&mut out);
                }
            }
            Ok(Event::Text(e)) => {
                if skipping.is_none() {
                    // HTML entities quick-xml doesn't know (&nbsp; etc.)
                    // fall back to the raw bytes.
                    let text = match e.unescape() {
                        Ok(t) => t.into_owned(),
                        Err(_) => String::from_utf8_lossy(e.as_ref()).into_owned(),
                    };
                    push_text(&mut out, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if skipping.is_none() {
                    push_text(&mut out, &String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            // Malformed markup past this point; keep what we have.
            Err(_) => break,
            Ok(_) => {}
        }
    }

    out.trim().to_string()
}

/// Append text, collapsing internal whitespace runs to single spaces.
fn push_text(out: &mut String, text: &str) {
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return;
    };
    if !out.is_empty() && !out.ends_with('\n') && !out.ends_with(' ') {
        out.push(' ');
    }
    out.push_str(first);
    for word in words {
        out.push(' ');
        out.push_str(word);
    }
}

/// Append a paragraph break, never more than one blank line.
fn push_break(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
    if out.is_empty() || out.ends_with("\n\n") {
        return;
    }
    if out.ends_with('\n') {
        out.push('\n');
    } else {
        out.push_str("\n\n");
    }
}
