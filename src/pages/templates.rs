//! Server-rendered HTML for the sign-in, sign-up and home pages
//!
//! Markup lives under `templates/`; askama escapes every interpolated value.

use askama::Template;

use crate::services::{Provider, Track};

#[derive(Template)]
#[template(path = "signin.html")]
struct SigninTemplate<'a> {
    error: &'a str,
    providers: &'a [Provider],
}

#[derive(Template)]
#[template(path = "signup.html")]
struct SignupTemplate;

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate<'a> {
    avatar_image: Option<&'a str>,
    avatar_letter: String,
    tracks: &'a [Track],
    tracks_json: String,
}

/// JSON that is safe to place inside a `<script>` element
fn script_json(tracks: &[Track]) -> String {
    serde_json::to_string(tracks)
        .unwrap_or_else(|_| "[]".to_string())
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

/// Human-readable text for the `error` query parameter on `/signin`
pub fn signin_error_message(code: &str) -> &'static str {
    match code {
        "AccessDenied" => "Access was denied by the provider.",
        "OAuthAccountNotLinked" => {
            "This email is already linked to a different account for that provider."
        }
        "OAuthCallback" | "OAuthSignin" => "Could not sign in with that provider. Please try again.",
        _ => "Sign in failed. Please try again.",
    }
}

/// Letter shown when the user has no avatar image
pub fn avatar_fallback(name: Option<&str>) -> String {
    name.and_then(|n| n.chars().next())
        .map(|c| c.to_string())
        .unwrap_or_else(|| "U".to_string())
}

pub fn render_signin(error: Option<&str>, providers: &[Provider]) -> askama::Result<String> {
    SigninTemplate {
        error: error.map(signin_error_message).unwrap_or(""),
        providers,
    }
    .render()
}

pub fn render_signup() -> askama::Result<String> {
    SignupTemplate.render()
}

pub fn render_home(
    name: Option<&str>,
    image: Option<&str>,
    tracks: &[Track],
) -> askama::Result<String> {
    HomeTemplate {
        avatar_image: image.filter(|i| !i.is_empty()),
        avatar_letter: avatar_fallback(name),
        tracks,
        tracks_json: script_json(tracks),
    }
    .render()
}
