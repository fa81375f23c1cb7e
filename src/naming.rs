//! Identifier normalization.
//!
//! Declaration names are turned into the canonical snake-case keys that the
//! persistence runtime stores values under. Keys have to be stable across
//! builds, so both transforms are pure and single-pass.

use unicode_general_category::{GeneralCategory, get_general_category};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Uppercase,
    Titlecase,
    Lowercase,
    Digit,
}

// Only Lu, Lt, Ll and Nd take part in words; every other character separates them.
fn categorize(ch: char) -> Option<Category> {
    match get_general_category(ch) {
        GeneralCategory::UppercaseLetter => Some(Category::Uppercase),
        GeneralCategory::TitlecaseLetter => Some(Category::Titlecase),
        GeneralCategory::LowercaseLetter => Some(Category::Lowercase),
        GeneralCategory::DecimalNumber => Some(Category::Digit),
        _ => None,
    }
}

/// Converts a declaration name to snake case, trimming leading underscores.
///
/// ```
/// use savegen::naming::to_snake_case;
///
/// assert_eq!(to_snake_case("StringField"), "string_field");
/// assert_eq!(to_snake_case("HTTPServer"), "http_server");
/// assert_eq!(to_snake_case("CONST_VALUE"), "const_value");
/// assert_eq!(to_snake_case("_position"), "position");
/// ```
pub fn to_snake_case(text: &str) -> String {
    to_snake_case_with(text, true)
}

/// Converts a declaration name to snake case.
///
/// An underscore is inserted before an uppercase letter that follows a
/// lowercase letter or a word boundary, and before the last letter of an
/// uppercase run when a lowercase letter follows it. Characters that are not
/// letters, digits or `_` act as word boundaries and are dropped.
pub fn to_snake_case_with(text: &str, trim_underscore: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 4);
    let mut previous: Option<Category> = None;
    // Whitespace or punctuation seen since the last emitted character.
    let mut boundary = false;
    let mut trimmable = true;

    for (index, &ch) in chars.iter().enumerate() {
        if ch == '_' {
            if trim_underscore && trimmable {
                continue;
            }
            out.push('_');
            previous = None;
            boundary = false;
            continue;
        }
        trimmable = false;

        let Some(category) = categorize(ch) else {
            boundary |= previous.is_some();
            continue;
        };

        match category {
            Category::Uppercase | Category::Titlecase => {
                let next_is_lower = chars
                    .get(index + 1)
                    .is_some_and(|next| categorize(*next) == Some(Category::Lowercase));
                let splits = boundary
                    || previous == Some(Category::Lowercase)
                    || (matches!(previous, Some(Category::Uppercase | Category::Titlecase))
                        && next_is_lower);
                if splits {
                    out.push('_');
                }
                out.extend(ch.to_lowercase());
            }
            Category::Lowercase | Category::Digit => {
                if boundary {
                    out.push('_');
                }
                out.push(ch);
            }
        }

        previous = Some(category);
        boundary = false;
    }

    out
}

/// Removes the first prefix that matches completely and is followed by an
/// uppercase letter. Otherwise the text is returned unchanged.
///
/// ```
/// use savegen::naming::trim_decorations;
///
/// assert_eq!(trim_decorations("SetVelocity", &["Set", "Get"]), "Velocity");
/// assert_eq!(trim_decorations("Getter", &["Get"]), "Getter");
/// ```
pub fn trim_decorations<S: AsRef<str>>(text: &str, prefixes: &[S]) -> String {
    let prefixes: Vec<Vec<char>> = prefixes
        .iter()
        .map(|prefix| prefix.as_ref().chars().collect())
        .collect();
    let mut candidates = vec![true; prefixes.len()];

    for (position, (offset, ch)) in text.char_indices().enumerate() {
        for (candidate, prefix) in candidates.iter_mut().zip(&prefixes) {
            if !*candidate {
                continue;
            }
            if position >= prefix.len() {
                if categorize(ch) == Some(Category::Uppercase) {
                    return text[offset..].to_string();
                }
                *candidate = false;
            } else {
                *candidate = prefix[position] == ch;
            }
        }

        if !candidates.iter().any(|candidate| *candidate) {
            break;
        }
    }

    text.to_string()
}
