//! Self-contained HTML document hosting a compiled bundle.

use crate::wrapper::PREVIEW_ROOT_ID;

/// Inline the stylesheet and script into a document with the mount root.
///
/// Closing-tag sequences inside the inlined text are escaped so neither
/// the script nor the stylesheet can end its element early.
#[must_use]
pub fn render_preview_document(title: &str, output: &str, css: Option<&str>) -> String {
    let style = css.map_or_else(String::new, |css| format!("    <style>\n{}\n    </style>\n", escape_closing_tag(css, "style")));
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n  \
         <head>\n    \
         <meta charset=\"utf-8\" />\n    \
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n    \
         <title>{title}</title>\n\
         {style}  \
         </head>\n  \
         <body>\n    \
         <div id=\"{PREVIEW_ROOT_ID}\"></div>\n    \
         <script>\n{script}\n    </script>\n  \
         </body>\n\
         </html>\n",
        title = escape_html(title),
        script = escape_closing_tag(output, "script"),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Rewrite `</tag` (any case) as `<\/tag`.
fn escape_closing_tag(text: &str, tag: &str) -> String {
    let needle = format!("</{tag}");
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for (at, _) in lower.match_indices(&needle) {
        out.push_str(&text[copied..at]);
        out.push_str("<\\/");
        copied = at + 2;
    }
    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
#[path = "preview_test.rs"]
mod tests;
