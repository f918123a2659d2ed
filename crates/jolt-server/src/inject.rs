//! HTML rewriting that wires served pages to the reload socket.

use std::cell::Cell;
use std::rc::Rc;

use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, EndTag};
use lol_html::{element, end, EndTagHandler, HandlerResult, HtmlRewriter, Settings};

use crate::websocket::{reload_client_script, RELOAD_PATH};

/// Errors from rewriting an HTML document.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("Failed to rewrite HTML: {0}")]
    Rewriting(#[from] RewritingError),
}

/// Build the reload socket URL for a `host[:port]` authority.
pub fn reload_socket_url(authority: &str) -> String {
    format!("ws://{}{}", authority, RELOAD_PATH)
}

/// Rewrite a document for live reload in a single streaming pass.
///
/// Inline scripts directly under `<body>` are dropped, then one inline script
/// connecting to `ws_url` is appended as the last child of `<body>`. When the
/// `</body>` end tag is omitted the script goes at the end of the document
/// instead. Documents without a `<body>` element pass through unchanged.
pub fn inject_reload_script(html: &[u8], ws_url: &str) -> Result<Vec<u8>, RewriteError> {
    let script_tag = format!("<script>{}</script>", reload_client_script(ws_url));
    let mut output = Vec::with_capacity(html.len() + script_tag.len());

    let body_seen = Cell::new(false);
    // Set from an end tag handler, which must be 'static
    let body_closed = Rc::new(Cell::new(false));

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("body > script:not([src])", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("body", |el| {
                    if body_seen.replace(true) {
                        return Ok(());
                    }
                    // Appended content is only written at `</body>`
                    el.append(&script_tag, ContentType::Html);
                    if let Some(handlers) = el.end_tag_handlers() {
                        let closed = Rc::clone(&body_closed);
                        let handler: EndTagHandler<'static> =
                            Box::new(move |_end: &mut EndTag<'_>| -> HandlerResult {
                                closed.set(true);
                                Ok(())
                            });
                        handlers.push(handler);
                    }
                    Ok(())
                }),
            ],
            document_content_handlers: vec![end!(|end| {
                if body_seen.get() && !body_closed.get() {
                    end.append(&script_tag, ContentType::Html);
                }
                Ok(())
            })],
            ..Settings::new()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(html)?;
    rewriter.end()?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "ws://localhost:3000/hot";

    fn rewrite(html: &str) -> String {
        String::from_utf8(inject_reload_script(html.as_bytes(), URL).unwrap()).unwrap()
    }

    #[test]
    fn appends_reload_script_as_last_body_child() {
        let html = rewrite("<html><body><h1>Test</h1></body></html>");

        let script_pos = html.find("<script>").unwrap();
        let heading_pos = html.find("<h1>").unwrap();
        let body_end = html.find("</body>").unwrap();

        assert!(heading_pos < script_pos);
        assert!(script_pos < body_end);
        assert!(html.contains(URL));
    }

    #[test]
    fn strips_inline_body_scripts() {
        let html = rewrite(
            r#"<body><div id="app"></div><script>window.boot()</script><script type="module">import "./x.js"</script></body>"#,
        );

        assert!(!html.contains("window.boot()"));
        assert!(!html.contains("./x.js"));
        assert_eq!(html.matches("<script").count(), 1);
    }

    #[test]
    fn keeps_external_and_nested_scripts() {
        let html = rewrite(
            r#"<head><script>head()</script></head><body><script src="/main.js"></script><div><script>nested()</script></div></body>"#,
        );

        assert!(html.contains("head()"));
        assert!(html.contains(r#"<script src="/main.js"></script>"#));
        assert!(html.contains("nested()"));
        assert_eq!(html.matches("<script").count(), 4);
    }

    #[test]
    fn injects_at_document_end_when_body_is_left_open() {
        let html = rewrite(
            r#"<!doctype html><html><body><div id=app></div><script>x()</script>"#,
        );

        assert!(!html.contains("x()"));
        assert_eq!(html.matches("new WebSocket(").count(), 1);
        assert!(html.starts_with("<!doctype html><html><body><div id=app></div><script>"));
        assert!(html.ends_with("</script>"));
    }

    #[test]
    fn closed_body_gets_exactly_one_script() {
        let html = rewrite("<HTML><BODY><p>hi</p></BODY></HTML>");

        assert_eq!(html.matches("new WebSocket(").count(), 1);
        assert!(html.find("new WebSocket(").unwrap() < html.find("</BODY>").unwrap());
    }

    #[test]
    fn documents_without_body_pass_through() {
        let source = "<p>fragment</p>";

        assert_eq!(rewrite(source), source);
    }

    #[test]
    fn builds_socket_url_from_authority() {
        assert_eq!(reload_socket_url("127.0.0.1:8080"), "ws://127.0.0.1:8080/hot");
    }
}
