//! The single HTML page: upload form, preview, download link, errors.
//!
//! Self-contained (inline CSS and a few lines of JS, no external resources)
//! so the server never has to serve static assets.

use crate::config::UploadConfig;
use crate::error::Doc2MdError;
use crate::output::ConversionOutput;
use crate::pipeline::stage::SUPPORTED_EXTENSIONS;

/// What to show below the upload form.
#[derive(Debug)]
pub enum View<'a> {
    /// Fresh page, nothing uploaded yet.
    Empty,
    Success(&'a ConversionOutput),
    Failed(&'a Doc2MdError),
}

/// Render the full page for `view`.
pub fn render(config: &UploadConfig, view: View<'_>) -> String {
    let accept = SUPPORTED_EXTENSIONS
        .iter()
        .map(|e| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(",");

    let body = match view {
        View::Empty => String::new(),
        View::Success(out) => render_success(out),
        View::Failed(e) => format!(
            r#"<div class="error" role="alert">{}</div>"#,
            escape_html(&e.to_string())
        ),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Document to Markdown Converter</title>
<style>{STYLE}</style>
</head>
<body>
<main>
<h1>Document to Markdown Converter</h1>
<p>Convert your documents to Markdown format. Supported formats include: DOCX, PDF, HTML, and more.</p>
<div class="info">Maximum file size: {max}</div>
<form id="upload" action="/convert" method="post" enctype="multipart/form-data">
<label for="file">Choose a document to convert</label>
<input id="file" type="file" name="file" accept="{accept}" required>
<button type="submit">Convert</button>
</form>
<div id="spinner" class="spinner" hidden>Converting document to Markdown...</div>
{body}
<details>
<summary>Supported Formats Information</summary>
<p>This converter supports the following input formats:</p>
<ul>
<li>Microsoft Word Documents (.docx)</li>
<li>PDF Documents (.pdf)</li>
<li>HTML Files (.html)</li>
<li>Text Files (.txt)</li>
<li>Rich Text Format (.rtf)</li>
</ul>
<p>The output will be a clean, well-formatted Markdown file.</p>
</details>
</main>
<script>{SCRIPT}</script>
</body>
</html>
"#,
        max = config.max_upload,
    )
}

fn render_success(out: &ConversionOutput) -> String {
    format!(
        r#"<div class="success">File uploaded successfully!</div>
<h2>Markdown Preview</h2>
<textarea readonly aria-label="Markdown preview">{preview}</textarea>
<p><a class="download" href="{href}" download="{filename}">Download Markdown File</a></p>
<p class="stats">{input} bytes in, {output} bytes of Markdown, {ms}ms</p>"#,
        preview = escape_html(&out.markdown),
        href = out.artifact.data_uri(),
        filename = escape_html(&out.artifact.filename),
        input = out.stats.input_bytes,
        output = out.stats.markdown_bytes,
        ms = out.stats.total_ms,
    )
}

/// Escape text for element content and double- or single-quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:0;background:#fafafa;color:#222}\
main{max-width:760px;margin:2rem auto;padding:0 1rem}\
.info{background:#e8f0fe;padding:.6rem 1rem;border-radius:6px;margin:1rem 0}\
.success{background:#e6f4ea;padding:.6rem 1rem;border-radius:6px;margin:1rem 0}\
.error{background:#fce8e6;color:#a50e0e;padding:.6rem 1rem;border-radius:6px;margin:1rem 0}\
.spinner{margin:1rem 0;font-style:italic}\
textarea{width:100%;height:300px;font-family:ui-monospace,monospace}\
form{display:flex;gap:.5rem;align-items:center;flex-wrap:wrap}\
details{margin-top:2rem}";

const SCRIPT: &str = "document.getElementById('upload').addEventListener('submit',function(){\
document.getElementById('spinner').hidden=false;\
this.querySelector('button').disabled=true;});";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::present::build_artifact;
    use crate::output::ConversionStats;

    #[test]
    fn empty_page_shows_limit_and_accept_list() {
        let html = render(&UploadConfig::default(), View::Empty);
        assert!(html.contains("Maximum file size: 5MB"));
        assert!(html.contains(r#"accept=".docx,.pdf,.html,.txt,.rtf""#));
        assert!(html.contains("Supported Formats Information"));
        assert!(!html.contains("Markdown Preview"));
    }

    #[test]
    fn success_page_has_preview_and_download() {
        let markdown = "# Title <script>alert(1)</script>\n".to_string();
        let out = ConversionOutput {
            source_filename: "report.docx".into(),
            artifact: build_artifact(&markdown, "report.docx"),
            markdown,
            stats: ConversionStats::default(),
        };
        let html = render(&UploadConfig::default(), View::Success(&out));
        assert!(html.contains("Markdown Preview"));
        assert!(html.contains(r#"download="report.md""#));
        assert!(html.contains("data:text/markdown;base64,"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert(1)"));
    }

    #[test]
    fn failure_page_shows_message() {
        let err = Doc2MdError::ConversionFailed {
            message: "bad <rtf>".into(),
        };
        let html = render(&UploadConfig::default(), View::Failed(&err));
        assert!(html.contains("Error converting file: bad &lt;rtf&gt;"));
    }

    #[test]
    fn escape_html_covers_quotes() {
        assert_eq!(escape_html(r#"a"b'c&"#), "a&quot;b&#39;c&amp;");
    }
}
