//! HTML pages
//!
//! Everything that comes from a provider is escaped before it is written
//! into the page.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::auth::Profile;

/// Human label for a provider name
fn provider_label(name: &str) -> &str {
    match name {
        "google" => "Google",
        "github" => "GitHub",
        other => other,
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <link rel="stylesheet" href="/style.css">
</head>
<body>
{body}
</body>
</html>
"#,
        title = encode_text(title),
    )
}

/// Landing page with one sign-in link per registered provider
pub fn index<'a>(providers: impl IntoIterator<Item = &'a str>) -> String {
    let links: String = providers
        .into_iter()
        .map(|name| {
            format!(
                "        <li><a class=\"login {class}\" href=\"/auth/{href}\">Sign in with {label}</a></li>\n",
                class = encode_double_quoted_attribute(name),
                href = encode_double_quoted_attribute(name),
                label = encode_text(provider_label(name)),
            )
        })
        .collect();

    let body = if links.is_empty() {
        "    <main>\n        <h1>Keyhole</h1>\n        <p>No sign-in providers are configured.</p>\n    </main>".to_string()
    } else {
        format!(
            "    <main>\n        <h1>Keyhole</h1>\n        <p>Sign in to see the protected page.</p>\n        <ul>\n{links}        </ul>\n    </main>"
        )
    };

    page("Keyhole", &body)
}

/// Protected page showing the signed-in user
pub fn welcome(user: &Profile) -> String {
    let avatar = user
        .photos
        .first()
        .map(|photo| {
            format!(
                "        <img class=\"avatar\" src=\"{}\" alt=\"\">\n",
                encode_double_quoted_attribute(photo)
            )
        })
        .unwrap_or_default();

    let emails: String = user
        .emails
        .iter()
        .map(|email| format!("            <li>{}</li>\n", encode_text(email)))
        .collect();
    let emails = if emails.is_empty() {
        String::new()
    } else {
        format!("        <h2>Email</h2>\n        <ul>\n{emails}        </ul>\n")
    };

    let raw = serde_json::to_string_pretty(&user.raw).unwrap_or_default();

    let body = format!(
        r#"    <main>
{avatar}        <h1>Welcome, {name}!</h1>
        <p>Signed in with {provider} as <code>{id}</code>.</p>
{emails}        <h2>Profile</h2>
        <pre>{raw}</pre>
        <p><a href="/logout">Log out</a></p>
    </main>"#,
        name = encode_text(user.greeting_name()),
        provider = encode_text(provider_label(&user.provider)),
        id = encode_text(&user.id),
        raw = encode_text(&raw),
    );

    page("Welcome", &body)
}
