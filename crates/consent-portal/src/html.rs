//! Inline HTML templates for the sign-in, sign-up, consent and error views

use consent_core::{Consent, InvalidRequest, ReconcileError, ValidGrant};

const RFC_6749: &str = "https://datatracker.ietf.org/doc/html/rfc6749";

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>{}</style>
</head>
<body>
    <div class="container">
{}
    </div>
</body>
</html>"#,
        html_escape(title),
        CSS_STYLES,
        body
    )
}

/// Hidden fields carrying the grant through a form post, unchanged.
fn grant_inputs(grant: Option<&ValidGrant>) -> String {
    let Some(grant) = grant else {
        return String::new();
    };
    grant
        .query_pairs()
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<input type="hidden" name="{}" value="{}">"#,
                name,
                html_escape(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n            ")
}

/// `/authorize` link that switches the sign-in/sign-up view and keeps the grant.
fn toggle_href(view: &str, grant: Option<&ValidGrant>) -> String {
    match grant {
        Some(grant) => format!("/authorize?view={}&{}", view, grant.to_query_string()),
        None => format!("/authorize?view={}", view),
    }
}

fn inline_error(error: Option<&str>) -> String {
    error
        .map(|e| format!(r#"<div class="status error">Error: {}</div>"#, html_escape(e)))
        .unwrap_or_default()
}

/// Sign-in form
pub fn signin_page(organization: &str, grant: Option<&ValidGrant>, error: Option<&str>) -> String {
    let body = format!(
        r#"        <h1>Sign in to {org}</h1>
        <form method="post" action="/authorize/signin">
            {grant}
            <div class="field">
                <label for="email">Email Address</label>
                <input type="email" id="email" name="email" required>
            </div>
            <div class="field">
                <label for="password">Password</label>
                <input type="password" id="password" name="password" required>
            </div>
            <button type="submit">Continue</button>
        </form>
        {error}
        <hr>
        <p class="muted">Don't have an account?</p>
        <a class="button secondary" href="{toggle}">Create an account</a>"#,
        org = html_escape(organization),
        grant = grant_inputs(grant),
        error = inline_error(error),
        toggle = html_escape(&toggle_href("signup", grant)),
    );
    page(&format!("Sign in - {}", organization), &body)
}

/// Sign-up form
pub fn signup_page(organization: &str, grant: Option<&ValidGrant>, error: Option<&str>) -> String {
    let body = format!(
        r#"        <h1>Create an {org} Account</h1>
        <form method="post" action="/authorize/signup">
            {grant}
            <div class="field">
                <label for="first_name">First Name</label>
                <input type="text" id="first_name" name="first_name" required>
            </div>
            <div class="field">
                <label for="last_name">Last Name</label>
                <input type="text" id="last_name" name="last_name" required>
            </div>
            <div class="field">
                <label for="email">Email Address</label>
                <input type="email" id="email" name="email" required>
            </div>
            <div class="field">
                <label for="password">Password</label>
                <input type="password" id="password" name="password" required>
            </div>
            <div class="field">
                <label for="password_confirmation">Verify Password</label>
                <input type="password" id="password_confirmation" name="password_confirmation" required>
            </div>
            <button type="submit">Sign Up</button>
        </form>
        {error}
        <hr>
        <p class="muted">Already have an account?</p>
        <a class="button secondary" href="{toggle}">Sign in</a>"#,
        org = html_escape(organization),
        grant = grant_inputs(grant),
        error = inline_error(error),
        toggle = html_escape(&toggle_href("signin", grant)),
    );
    page(&format!("Sign up - {}", organization), &body)
}

/// Shown after sign-up while the email address awaits verification
pub fn verification_pending_page(message: &str) -> String {
    let body = format!(
        r#"        <h1>Check your email</h1>
        <p>We sent a verification link to the address you signed up with. Follow it, then sign in again.</p>
        <div class="status info">{}</div>
        <a class="button" href="/authorize">Back to sign in</a>"#,
        html_escape(message)
    );
    page("Verify your email", &body)
}

fn client_error_page(heading: &str, summary: &str, detail: &str, reason: &str) -> String {
    let body = format!(
        r#"        <h1>{heading}</h1>
        <p>{summary}</p>
        <p><a href="{rfc}">IETF RFC 6749: The OAuth 2.0 Authorization Framework</a></p>
        <details>
            <summary>Additional Debug Information</summary>
            <p>{detail}</p>
            <p><code>{reason}</code></p>
        </details>"#,
        heading = html_escape(heading),
        summary = html_escape(summary),
        rfc = RFC_6749,
        detail = html_escape(detail),
        reason = html_escape(reason),
    );
    page(heading, &body)
}

/// Malformed or partial grant parameters
pub fn invalid_request_page(error: InvalidRequest) -> String {
    let detail = match error {
        InvalidRequest::MissingParams => "The authorization request is missing required URL parameters. Please ensure you're passing all required parameters in URL encoded format, using the \"application/x-www-form-urlencoded\" format.".to_string(),
        other => format!("{}.", other),
    };
    client_error_page(
        "Error: Invalid Client Authorization Request",
        "Sign-in could not be completed at this time, most likely due to an invalid client request. If you're the client's developer, please ensure that you've implemented the authorization request as specified in the OAuth2 documentation:",
        &detail,
        error.reason(),
    )
}

/// Client lookup failed or the client record disagrees with the request
pub fn client_error_page_for(error: &ReconcileError) -> String {
    client_error_page(
        "Error: Client Could Not Be Verified",
        "Sign-in could not be completed because the requesting application could not be verified with the authorization server. If you're the client's developer, check the client registration against the OAuth2 documentation:",
        &format!("The client could not be verified. {}.", error),
        error.reason(),
    )
}

/// Consent screen
pub fn consent_page(organization: &str, consent: &Consent) -> String {
    let client = consent.client();
    let scopes: String = consent
        .scopes()
        .iter()
        .map(|scope| {
            format!(
                r#"<details class="scope"><summary>{}</summary><p>{}</p></details>"#,
                html_escape(scope.title()),
                html_escape(scope.description())
            )
        })
        .collect::<Vec<_>>()
        .join("\n            ");

    let body = format!(
        r#"        <h1>Authorize {name}</h1>
        <p>You are attempting to sign-in to '{name}' using your {org} account. The client is requesting your permission to access the following:</p>
        <div class="scopes">
            <details class="scope" open><summary>Client Description</summary><p>{description}</p></details>
            {scopes}
        </div>
        <p class="muted">Your password will never be shared</p>
        <form method="post" action="/authorize/consent">
            {grant}
            <button type="submit" name="decision" value="accept">Accept</button>
            <button type="submit" name="decision" value="reject" class="danger">Reject</button>
        </form>"#,
        name = html_escape(&client.name),
        org = html_escape(organization),
        description = html_escape(&client.description),
        scopes = scopes,
        grant = grant_inputs(Some(consent.grant())),
    );
    page(&format!("Authorize {}", client.name), &body)
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

const CSS_STYLES: &str = r#"
* {
    box-sizing: border-box;
}
body {
    font-family: "IBM Plex Sans", -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: #161616;
    color: #f4f4f4;
    margin: 0;
    padding: 20px;
    min-height: 100vh;
    display: flex;
    align-items: center;
    justify-content: center;
}
.container {
    background: #262626;
    padding: 40px;
    max-width: 440px;
    width: 100%;
}
h1 {
    margin: 0 0 20px 0;
    font-size: 24px;
    font-weight: 400;
}
p {
    color: #c6c6c6;
    margin: 0 0 20px 0;
    line-height: 1.5;
}
.muted {
    color: #8d8d8d;
    font-size: 14px;
}
.field {
    margin-bottom: 15px;
}
label {
    display: block;
    margin-bottom: 8px;
    color: #c6c6c6;
    font-size: 12px;
}
input {
    width: 100%;
    padding: 11px 16px;
    border: none;
    border-bottom: 1px solid #6f6f6f;
    background: #393939;
    color: #f4f4f4;
    font-size: 14px;
}
input:focus {
    outline: 2px solid #fff;
}
button, .button {
    display: block;
    width: 100%;
    margin-bottom: 10px;
    padding: 14px 16px;
    background: #0f62fe;
    color: #fff;
    border: none;
    font-size: 14px;
    cursor: pointer;
    text-decoration: none;
    text-align: left;
}
button:hover, .button:hover {
    background: #0353e9;
}
.button.secondary {
    background: transparent;
    border: 1px solid #fff;
}
button.danger {
    background: transparent;
    border: 1px solid #fa4d56;
    color: #fa4d56;
}
hr {
    border: none;
    border-top: 1px solid #393939;
    margin: 30px 0 15px 0;
}
details {
    border-top: 1px solid #393939;
    padding: 12px 0;
}
details:last-child {
    border-bottom: 1px solid #393939;
}
summary {
    cursor: pointer;
}
details p {
    margin: 10px 0 0 0;
    font-size: 13px;
}
.scopes {
    margin-bottom: 20px;
}
.status {
    margin-top: 10px;
    margin-bottom: 5px;
    padding: 12px;
    font-size: 14px;
}
.status.error {
    color: #fa4d56;
}
.status.info {
    background: #1e3a5f;
    color: #93c5fd;
}
code {
    background: #161616;
    padding: 2px 6px;
    font-size: 12px;
}
"#;
