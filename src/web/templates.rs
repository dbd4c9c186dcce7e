use std::borrow::Cow;

/// Escapes text for embedding into HTML bodies and attributes.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const BASE_STYLES: &str = r#"        body { font-family: 'Segoe UI', system-ui, sans-serif; margin: 0; background: #f1f5f9; color: #0f172a; }
        main { max-width: 880px; margin: 0 auto; padding: 2rem 1.5rem 4rem; }
        h1 { font-size: 1.6rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; margin-bottom: 1.5rem; box-shadow: 0 10px 30px rgba(15, 23, 42, 0.06); }
        .panel h2 { margin-top: 0; font-size: 1.15rem; }
        label { display: block; margin: 0.75rem 0 0.25rem; font-weight: 600; }
        input[type="text"], select, textarea { width: 100%; box-sizing: border-box; padding: 0.5rem; border: 1px solid #cbd5e1; border-radius: 8px; }
        textarea { min-height: 140px; }
        button { margin-top: 1rem; background: #2563eb; color: #ffffff; border: none; border-radius: 8px; padding: 0.6rem 1.4rem; font-size: 1rem; cursor: pointer; }
        button:disabled { background: #94a3b8; cursor: wait; }
        .status-box { margin-top: 1rem; padding: 0.75rem; border-radius: 8px; background: #f8fafc; border: 1px dashed #cbd5e1; white-space: pre-wrap; }
        .score { font-size: 2.2rem; font-weight: 700; }
        .note { color: #64748b; font-size: 0.9rem; }
        ul { padding-left: 1.25rem; }
"#;

/// Renders the single-tool page shell. Title and heading are escaped; the
/// body and script are trusted markup.
pub fn render_tool_page(
    meta_title: &str,
    page_heading: &str,
    body_html: Cow<'_, str>,
    body_script: &str,
) -> String {
    let meta_title = escape_html(meta_title);
    let page_heading = escape_html(page_heading);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{meta_title}</title>
    <style>
{BASE_STYLES}    </style>
</head>
<body>
    <main>
        <h1>{page_heading}</h1>
{body_html}
    </main>
    <script>
{body_script}
    </script>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_significant_characters() {
        assert_eq!(
            escape_html(r#"<b>"Dana" & 'Noa'</b>"#),
            "&lt;b&gt;&quot;Dana&quot; &amp; &#39;Noa&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn leaves_hebrew_untouched() {
        assert_eq!(escape_html("ציון: 87"), "ציון: 87");
    }

    #[test]
    fn page_embeds_heading_and_script() {
        let html = render_tool_page(
            "Grader",
            "Homework Grader",
            Cow::Borrowed("<section>x</section>"),
            "console.log('ready');",
        );
        assert!(html.contains("<title>Grader</title>"));
        assert!(html.contains("<h1>Homework Grader</h1>"));
        assert!(html.contains("console.log('ready');"));
    }
}
