//! Server-rendered HTML for the login and chat pages.
//!
//! User-supplied text is escaped with `ammonia::clean_text`; assistant
//! answers are rendered from Markdown and then sanitized.

use pulldown_cmark::{html, Options, Parser};

use super::session::{ChatEntry, ChatRole, SessionData};
use crate::rag::store::ChunkScope;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 780px; margin: 2rem auto; padding: 0 1rem; color: #1f2328; }
header { display: flex; justify-content: space-between; align-items: center; border-bottom: 1px solid #d0d7de; margin-bottom: 1rem; }
.msg { padding: 0.75rem 1rem; border-radius: 8px; margin: 0.5rem 0; }
.msg.user { background: #ddf4ff; }
.msg.assistant { background: #f6f8fa; }
.sources { font-size: 0.85rem; color: #57606a; margin-top: 0.5rem; }
.notice { color: #cf222e; }
form.inline { display: inline; }
textarea { width: 100%; min-height: 4rem; }
"#;

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        ammonia::clean_text(title),
        STYLE,
        body
    )
}

pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut unsafe_html = String::new();
    html::push_html(&mut unsafe_html, parser);
    ammonia::clean(&unsafe_html)
}

pub fn login_page(error: Option<&str>, username: &str) -> String {
    let notice = error
        .map(|msg| format!("<p class=\"notice\">{}</p>", ammonia::clean_text(msg)))
        .unwrap_or_default();

    let body = format!(
        "<h1>Department Q&amp;A</h1>\n<h2>Login</h2>\n{}\n\
         <form method=\"post\" action=\"/login\">\n\
         <p><label>Username <input name=\"username\" value=\"{}\" autocomplete=\"username\"></label></p>\n\
         <p><label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label></p>\n\
         <p><button type=\"submit\">Login</button></p>\n</form>",
        notice,
        ammonia::clean_text(username)
    );
    page("Login", &body)
}

fn render_entry(entry: &ChatEntry) -> String {
    match entry.role {
        ChatRole::User => format!(
            "<div class=\"msg user\"><strong>You</strong><p>{}</p></div>",
            ammonia::clean_text(&entry.content)
        ),
        ChatRole::Assistant => {
            let mut html = format!(
                "<div class=\"msg assistant\"><strong>Assistant</strong>{}",
                render_markdown(&entry.content)
            );
            if !entry.sources.is_empty() {
                html.push_str("<div class=\"sources\"><em>Sources</em><ol>");
                for source in &entry.sources {
                    let label = match source.scope {
                        ChunkScope::General => " (shared)",
                        ChunkScope::Department => "",
                    };
                    html.push_str(&format!(
                        "<li><code>{}</code>{} &middot; {:.2}<br>{}</li>",
                        ammonia::clean_text(&source.source),
                        label,
                        source.score,
                        ammonia::clean_text(&source.excerpt)
                    ));
                }
                html.push_str("</ol></div>");
            }
            html.push_str("</div>");
            html
        }
    }
}

pub fn chat_page(session: &SessionData, notice: Option<&str>) -> String {
    let principal = &session.principal;
    let history: String = session.messages.iter().map(render_entry).collect();
    let notice = notice
        .map(|msg| format!("<p class=\"notice\">{}</p>", ammonia::clean_text(msg)))
        .unwrap_or_default();

    let body = format!(
        "<header><h1>{} Q&amp;A</h1>\
         <div>Signed in as <strong>{}</strong> \
         <form class=\"inline\" method=\"post\" action=\"/logout\"><button type=\"submit\">Logout</button></form></div>\
         </header>\n\
         <section id=\"history\">{}</section>\n{}\n\
         <form method=\"post\" action=\"/chat\">\n\
         <p><textarea name=\"query\" placeholder=\"Ask a question about {} documents\" required></textarea></p>\n\
         <p><label><input type=\"checkbox\" name=\"show_sources\" value=\"on\"> Show sources</label> \
         <button type=\"submit\">Ask</button></p>\n</form>",
        principal.department.display_name(),
        ammonia::clean_text(&principal.username),
        history,
        notice,
        principal.department.display_name()
    );
    page(&format!("{} Q&A", principal.department.display_name()), &body)
}
