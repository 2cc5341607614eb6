//! Deck directives.
//!
//! Directives come from front matter and from `<!-- key: value -->`
//! comments. `theme` is global. `class`, `paginate`, `header` and `footer`
//! are inherited by every following slide; their `_`-prefixed spot forms
//! apply to the current slide only. Unknown keys are ignored.

use super::error::RenderError;

/// Effective directives of one slide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideDirectives {
    pub class: Option<String>,
    pub paginate: bool,
    pub header: Option<String>,
    pub footer: Option<String>,
}

/// Spot overrides collected while a slide is open.
#[derive(Debug, Clone, Default)]
struct SpotDirectives {
    class: Option<String>,
    paginate: Option<bool>,
    header: Option<String>,
    footer: Option<String>,
}

/// Directive state carried across slides.
#[derive(Debug, Default)]
pub struct DirectiveState {
    theme: Option<String>,
    inherited: SlideDirectives,
    spot: SpotDirectives,
}

impl DirectiveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `key: value` pair to the current slide.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), RenderError> {
        let value = unquote(value.trim());
        let (spot, name) = match key.strip_prefix('_') {
            Some(name) => (true, name),
            None => (false, key),
        };

        match (spot, name) {
            (false, "theme") => self.theme = Some(value.to_string()),
            (false, "class") => self.inherited.class = non_empty(value),
            (false, "header") => self.inherited.header = non_empty(value),
            (false, "footer") => self.inherited.footer = non_empty(value),
            (false, "paginate") => self.inherited.paginate = parse_bool(key, value)?,
            (true, "class") => self.spot.class = Some(value.to_string()),
            (true, "header") => self.spot.header = Some(value.to_string()),
            (true, "footer") => self.spot.footer = Some(value.to_string()),
            (true, "paginate") => self.spot.paginate = Some(parse_bool(key, value)?),
            _ => crate::debug!("render"; "ignoring directive `{}`", key),
        }
        Ok(())
    }

    /// Close the current slide, returning its effective directives.
    ///
    /// Spot directives are cleared; inherited ones carry over.
    pub fn finish_slide(&mut self) -> SlideDirectives {
        let spot = std::mem::take(&mut self.spot);
        let inherited = &self.inherited;
        SlideDirectives {
            class: pick(spot.class, &inherited.class),
            paginate: spot.paginate.unwrap_or(inherited.paginate),
            header: pick(spot.header, &inherited.header),
            footer: pick(spot.footer, &inherited.footer),
        }
    }

    /// Theme chosen by the deck, if any.
    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }
}

/// Spot value wins; an empty spot value clears the inherited one.
fn pick(spot: Option<String>, inherited: &Option<String>) -> Option<String> {
    match spot {
        Some(value) if value.is_empty() => None,
        Some(value) => Some(value),
        None => inherited.clone(),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, RenderError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(RenderError::InvalidDirective {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Split a `key: value` line. Keys are identifiers, optionally `_`-prefixed.
pub fn split_pair(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then_some((key, value.trim()))
}

/// Parse front matter into `(key, value)` pairs.
///
/// Blank lines and `#` comments are allowed; anything else that is not a
/// `key: value` pair is an error.
pub fn parse_front_matter(text: &str) -> Result<Vec<(&str, &str)>, RenderError> {
    let mut pairs = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match split_pair(trimmed) {
            Some(pair) => pairs.push(pair),
            None => {
                return Err(RenderError::FrontMatter {
                    line: index + 1,
                    text: trimmed.to_string(),
                });
            }
        }
    }
    Ok(pairs)
}

/// Parse an HTML comment made only of `key: value` lines.
///
/// Returns `None` for ordinary comments, which are left in the output.
pub fn parse_comment(html: &str) -> Option<Vec<(&str, &str)>> {
    let body = html
        .trim()
        .strip_prefix("<!--")?
        .strip_suffix("-->")?
        .trim();
    if body.is_empty() || body.contains("-->") {
        return None;
    }

    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(split_pair)
        .collect()
}
