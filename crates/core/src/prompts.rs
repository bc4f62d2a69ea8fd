//! Instruction templates sent to the model.
//!
//! Placeholders are written as `{{name}}` and filled by [`render`].

pub(crate) const ADVISOR: &str = include_str!("prompts/system.md");
pub(crate) const ANALYZE_REQUEST: &str = include_str!("prompts/analyze.md");
pub(crate) const DRAFT_ITINERARY: &str = include_str!("prompts/itinerary.md");
pub(crate) const ENHANCE_ITINERARY: &str = include_str!("prompts/enhance.md");
pub(crate) const PROVIDE_DEFAULTS: &str = include_str!("prompts/defaults.md");

/// Fills the placeholders of `template` in one pass.
///
/// Values are inserted as is, so a value that itself contains `{{name}}`
/// is never expanded. Unknown placeholders are kept.
pub(crate) fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        text.push_str(&rest[..start]);
        let name = &after[..end];
        match vars.iter().find(|(n, _)| *n == name) {
            Some((_, value)) => text.push_str(value),
            None => text.push_str(&rest[start..start + end + 4]),
        }
        rest = &after[end + 2..];
    }
    text.push_str(rest);
    text
}
