//! Fixed glyph templates for the simple icon roles
//!
//! Every template is a single filled path on a 24x24 grid, already in
//! normalized form.

use super::IconRole;

const HOME: &str = "M12 3 2 11h3v10h5v-6h4v6h5V11h3z";
const SEARCH: &str = "M10 3a7 7 0 0 1 5.6 11.2l5.1 5.1-1.4 1.4-5.1-5.1A7 7 0 1 1 10 3zm0 2a5 5 0 1 0 0 10 5 5 0 0 0 0-10z";
const PROFILE: &str = "M12 4a4 4 0 1 1 0 8 4 4 0 0 1 0-8zM4 20c0-4 3.6-6 8-6s8 2 8 6z";
const SETTINGS: &str = "M12 8a4 4 0 1 1 0 8 4 4 0 0 1 0-8zm0 2a2 2 0 1 0 0 4 2 2 0 0 0 0-4zM11 2h2v4h-2zm0 16h2v4h-2zM2 11h4v2H2zm16 0h4v2h-4z";
const BACK: &str = "M15.4 4.6 16.8 6l-6 6 6 6-1.4 1.4L8 12z";
const FORWARD: &str = "M8.6 4.6 16 12l-7.4 7.4L7.2 18l6-6-6-6z";
const CLOSE: &str = "M6.4 5 12 10.6 17.6 5 19 6.4 13.4 12l5.6 5.6-1.4 1.4-5.6-5.6L6.4 19 5 17.6l5.6-5.6L5 6.4z";
const MENU: &str = "M3 6h18v2H3zm0 5h18v2H3zm0 5h18v2H3z";
const PLUS: &str = "M11 5h2v6h6v2h-6v6h-2v-6H5v-2h6z";

fn glyph(path: &str, color: &str, even_odd: bool) -> String {
    let rule = if even_odd { " fill-rule=\"evenodd\"" } else { "" };
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 24 24\" width=\"24\" height=\"24\"><path fill=\"{}\"{} d=\"{}\"/></svg>",
        color, rule, path
    )
}

/// Template markup for `role` in `color`, or `None` when the role has no template
pub fn render(role: IconRole, color: &str) -> Option<String> {
    let markup = match role {
        IconRole::AppIcon => return None,
        IconRole::TabBarHome => glyph(HOME, color, false),
        IconRole::TabBarSearch => glyph(SEARCH, color, true),
        IconRole::TabBarProfile => glyph(PROFILE, color, false),
        IconRole::TabBarSettings => glyph(SETTINGS, color, true),
        IconRole::NavigationBack => glyph(BACK, color, false),
        IconRole::NavigationForward => glyph(FORWARD, color, false),
        IconRole::UiClose => glyph(CLOSE, color, false),
        IconRole::UiMenu => glyph(MENU, color, false),
        IconRole::UiPlus => glyph(PLUS, color, false),
    };
    Some(markup)
}
