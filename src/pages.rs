//! Server-rendered home page: the creation form, the result panel for the
//! most recently created link, and the alias-edit form.

use axum::response::Html;

use crate::errors::FieldError;
use crate::models::ShortLink;

#[derive(Default)]
pub struct HomeContext<'a> {
    /// The link to show in the result panel, with its full short URL.
    pub created: Option<(&'a ShortLink, String)>,
    pub errors: &'a [FieldError],
    /// Sticky form values re-rendered after a validation failure.
    pub original_url: &'a str,
    pub custom_alias: &'a str,
    pub vapid_public_key: Option<&'a str>,
}

pub fn home_page(ctx: &HomeContext<'_>) -> Html<String> {
    let mut page = String::with_capacity(4096);

    page.push_str(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>pendek</title>\n</head>\n<body>\n<h1>pendek</h1>\n",
    );

    page.push_str("<form method=\"post\" action=\"/\">\n");
    page.push_str("<input type=\"hidden\" name=\"action\" value=\"create\">\n");
    page.push_str(&format!(
        "<label>Long URL\n<input type=\"url\" name=\"original_url\" \
         placeholder=\"Paste your long URL here\" value=\"{}\" required></label>\n",
        escape(ctx.original_url)
    ));
    push_field_errors(&mut page, ctx.errors, "original_url");
    page.push_str(&format!(
        "<label>Custom alias (optional)\n<input type=\"text\" name=\"custom_alias\" \
         placeholder=\"e.g. promo-akhir-tahun\" value=\"{}\"></label>\n",
        escape(ctx.custom_alias)
    ));
    push_field_errors(&mut page, ctx.errors, "custom_alias");
    page.push_str("<button type=\"submit\">Shorten</button>\n</form>\n");

    if let Some((link, full_url)) = &ctx.created {
        page.push_str(&format!(
            "<section id=\"created\" data-short-code=\"{code}\">\n\
             <p>Your short link: <a id=\"short-url\" href=\"{url}\">{url}</a></p>\n\
             <p>Clicks so far: <span id=\"click-count\">{clicks}</span></p>\n\
             <form method=\"post\" action=\"/\">\n\
             <input type=\"hidden\" name=\"action\" value=\"update\">\n\
             <input type=\"hidden\" name=\"link_id\" value=\"{id}\">\n\
             <label>Rename alias\n\
             <input type=\"text\" name=\"new_alias\" value=\"{code}\"></label>\n",
            code = escape(&link.short_code),
            url = escape(full_url),
            clicks = link.click_count,
            id = link.id,
        ));
        push_field_errors(&mut page, ctx.errors, "new_alias");
        page.push_str("<button type=\"submit\">Update</button>\n</form>\n</section>\n");
    }

    if let Some(public_key) = ctx.vapid_public_key {
        page.push_str(&format!(
            "<button id=\"enable-push\">Enable notifications</button>\n\
             <script>\n\
             const VAPID_PUBLIC_KEY = \"{}\";\n\
             function b64ToBytes(b64) {{\n\
               const pad = \"=\".repeat((4 - (b64.length % 4)) % 4);\n\
               const raw = atob((b64 + pad).replace(/-/g, \"+\").replace(/_/g, \"/\"));\n\
               return Uint8Array.from(raw, (c) => c.charCodeAt(0));\n\
             }}\n\
             if (\"serviceWorker\" in navigator) {{\n\
               navigator.serviceWorker.register(\"/sw.js\");\n\
               document.getElementById(\"enable-push\").addEventListener(\"click\", async () => {{\n\
                 const registration = await navigator.serviceWorker.ready;\n\
                 const subscription = await registration.pushManager.subscribe({{\n\
                   userVisibleOnly: true,\n\
                   applicationServerKey: b64ToBytes(VAPID_PUBLIC_KEY),\n\
                 }});\n\
                 await fetch(\"/subscribe\", {{\n\
                   method: \"POST\",\n\
                   headers: {{ \"Content-Type\": \"application/json\" }},\n\
                   body: JSON.stringify(subscription),\n\
                 }});\n\
               }});\n\
             }}\n\
             </script>\n",
            escape(public_key)
        ));
    }

    page.push_str("</body>\n</html>\n");
    Html(page)
}

fn push_field_errors(page: &mut String, errors: &[FieldError], field: &str) {
    for error in errors.iter().filter(|e| e.field == field) {
        page.push_str(&format!(
            "<p class=\"field-error\">{}</p>\n",
            escape(&error.message)
        ));
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_html_metacharacters() {
        assert_eq!(
            escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn errors_render_next_to_their_field() {
        let errors = vec![FieldError::new("custom_alias", "Alias is too short.")];
        let ctx = HomeContext {
            errors: &errors,
            original_url: "https://example.com",
            custom_alias: "ab",
            ..Default::default()
        };

        let Html(page) = home_page(&ctx);
        assert!(page.contains("Alias is too short."));
        assert!(page.contains("value=\"https://example.com\""));
        assert!(page.contains("value=\"ab\""));
    }
}
