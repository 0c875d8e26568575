//! HTML status page rendered by the frontend tier

use super::history::HistoryEntry;
use std::fmt::Write;

/// Everything the status page shows
pub struct StatusPage<'a> {
    pub pod_name: &'a str,
    pub node_name: &'a str,
    /// Meta-refresh interval in seconds, `None` disables auto refresh
    pub refresh_secs: Option<u32>,
    pub history_size: usize,
    pub last: &'a HistoryEntry,
    /// Newest first
    pub history: &'a [HistoryEntry],
}

impl StatusPage<'_> {
    pub fn render(&self) -> String {
        let mut html = String::with_capacity(1024);
        html.push_str("<html>\n  <head>\n");
        if let Some(secs) = self.refresh_secs {
            let _ = writeln!(html, "    <meta http-equiv=\"refresh\" content=\"{}\">", secs);
        }
        html.push_str("  </head>\n  <body style=\"font-family: monospace\">\n");

        html.push_str("    <p>\n      <b>Frontend</b>\n");
        let _ = writeln!(
            html,
            "      <p><span style=\"color: black\">{} {}</span></p>",
            escape_html(self.pod_name),
            escape_html(self.node_name)
        );
        html.push_str("    </p>\n");

        html.push_str("    <p>\n      <b>Backend</b>\n");
        push_entry(&mut html, self.last);
        html.push_str("    </p>\n");

        if !self.history.is_empty() {
            let _ = writeln!(
                html,
                "    <p>\n      <b>History (Last {})</b>",
                self.history_size
            );
            for entry in self.history.iter().take(self.history_size) {
                push_entry(&mut html, entry);
            }
            html.push_str("    </p>\n");
        }

        html.push_str("  </body>\n</html>\n");
        html
    }
}

fn push_entry(html: &mut String, entry: &HistoryEntry) {
    let color = if entry.is_ok() { "green" } else { "red" };
    let _ = writeln!(
        html,
        "      <p><span style=\"color: {}\">[ {} ] {} {}</span></p>",
        color,
        escape_html(&entry.timestamp),
        entry.status,
        escape_html(&entry.body)
    );
}

/// Escape text for interpolation into HTML element content or attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: u16, body: &str) -> HistoryEntry {
        HistoryEntry {
            timestamp: "10:00:00.000".to_string(),
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_render_sections_and_colors() {
        let last = entry(500, "node-b - I feel bad...");
        let history = vec![last.clone(), entry(200, "pod-a node-a")];
        let page = StatusPage {
            pod_name: "frontend-1",
            node_name: "node-f",
            refresh_secs: Some(2),
            history_size: 20,
            last: &last,
            history: &history,
        };

        let html = page.render();

        assert!(html.contains("<meta http-equiv=\"refresh\" content=\"2\">"));
        assert!(html.contains("frontend-1 node-f"));
        assert!(html.contains("History (Last 20)"));
        assert!(html
            .contains("<span style=\"color: red\">[ 10:00:00.000 ] 500 node-b - I feel bad...</span>"));
        assert!(html.contains("<span style=\"color: green\">[ 10:00:00.000 ] 200 pod-a node-a</span>"));
    }

    #[test]
    fn test_render_without_refresh_or_history() {
        let last = entry(200, "ok");
        let page = StatusPage {
            pod_name: "p",
            node_name: "n",
            refresh_secs: None,
            history_size: 0,
            last: &last,
            history: &[],
        };

        let html = page.render();

        assert!(!html.contains("refresh"));
        assert!(!html.contains("History"));
        assert!(html.contains("[ 10:00:00.000 ] 200 ok"));
    }

    #[test]
    fn test_history_is_limited_to_history_size() {
        let last = entry(200, "newest");
        let history = vec![last.clone(), entry(200, "middle"), entry(200, "oldest")];
        let page = StatusPage {
            pod_name: "p",
            node_name: "n",
            refresh_secs: None,
            history_size: 2,
            last: &last,
            history: &history,
        };

        let html = page.render();

        assert!(html.contains("middle"));
        assert!(!html.contains("oldest"));
    }

    #[test]
    fn test_backend_body_is_escaped() {
        let last = entry(200, "<script>alert('x')</script> & more");
        let page = StatusPage {
            pod_name: "p",
            node_name: "n",
            refresh_secs: None,
            history_size: 1,
            last: &last,
            history: &[],
        };

        let html = page.render();

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; more"));
    }
}
