//! Inline Style Cleaning
//!
//! Parses the value of a `style` attribute into declarations and keeps only
//! the ones that are well formed and harmless.

use log::debug;

/// Remove `/* ... */` comments; an unterminated comment swallows the rest
fn strip_comments(style: &str) -> String {
    let mut out = String::with_capacity(style.len());
    let mut rest = style;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Split on `;` outside quotes and parentheses.
///
/// Returns `None` when quotes or parentheses are unbalanced.
fn split_declarations(style: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut parens = 0usize;
    let mut start = 0;
    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => parens += 1,
            (None, ')') => parens = parens.checked_sub(1)?,
            (None, ';') if parens == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() || parens != 0 {
        return None;
    }
    parts.push(&style[start..]);
    Some(parts)
}

/// Arguments of every `url(...)` in `value`, unquoted.
///
/// `None` if a `url(` is never closed.
fn url_arguments(value: &str) -> Option<Vec<String>> {
    let lower = value.to_ascii_lowercase();
    let mut urls = Vec::new();
    let mut from = 0;
    while let Some(found) = lower[from..].find("url") {
        let after = from + found + 3;
        let rest = lower[after..].trim_start();
        if !rest.starts_with('(') {
            from = after;
            continue;
        }
        let open = lower.len() - rest.len();
        let close = open + lower[open..].find(')')?;
        let arg = value[open + 1..close].trim();
        let arg = arg
            .strip_prefix(['"', '\''])
            .and_then(|a| a.strip_suffix(['"', '\'']))
            .unwrap_or(arg);
        urls.push(arg.to_string());
        from = close + 1;
    }
    Some(urls)
}

fn is_property_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_lowercase() || b == b'-')
}

/// Clean one declaration, returning it as `prop: value`
fn clean_declaration<P, U>(decl: &str, is_safe_property: &P, is_safe_uri: &U) -> Option<String>
where
    P: Fn(&str) -> bool,
    U: Fn(&str) -> bool,
{
    let (property, value) = decl.split_once(':')?;
    let property = property.trim().to_ascii_lowercase();
    let value = value.trim();
    if !is_property_name(&property) || value.is_empty() {
        return None;
    }
    if !is_safe_property(&property) {
        return None;
    }
    if value.contains('\\') {
        return None;
    }
    let squeezed: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if squeezed.contains("expression(") {
        return None;
    }
    if !url_arguments(value)?.iter().all(|url| is_safe_uri(url)) {
        return None;
    }
    Some(format!("{}: {}", property, value))
}

/// Keep the safe declarations of a `style` value.
///
/// Returns `None` when nothing survives. Malformed input is dropped, never
/// reported.
pub fn sanitize_style<P, U>(style: &str, is_safe_property: P, is_safe_uri: U) -> Option<String>
where
    P: Fn(&str) -> bool,
    U: Fn(&str) -> bool,
{
    let style = strip_comments(style);
    let Some(declarations) = split_declarations(&style) else {
        debug!("dropping style with unbalanced quotes or parentheses: {:?}", style);
        return None;
    };
    let kept: Vec<String> = declarations
        .into_iter()
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter_map(|decl| {
            let cleaned = clean_declaration(decl, &is_safe_property, &is_safe_uri);
            if cleaned.is_none() {
                debug!("dropping style declaration {:?}", decl);
            }
            cleaned
        })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(style: &str) -> Option<String> {
        sanitize_style(
            style,
            |p| matches!(p, "color" | "background" | "font-family" | "margin"),
            |uri| uri.starts_with("http:") || !uri.contains(':'),
        )
    }

    #[test]
    fn test_keeps_safe_declarations_in_order() {
        assert_eq!(
            clean("color: red;  MARGIN:0 ; ").as_deref(),
            Some("color: red; margin: 0")
        );
    }

    #[test]
    fn test_drops_unknown_properties() {
        assert_eq!(clean("position: fixed; color: blue").as_deref(), Some("color: blue"));
        assert_eq!(clean("position: fixed"), None);
    }

    #[test]
    fn test_drops_expression_and_escapes() {
        assert_eq!(clean("color: expression(alert(1))"), None);
        assert_eq!(clean("color: EXPRESSION (alert(1))"), None);
        assert_eq!(clean("color: \\65xpression(1); margin: 1px").as_deref(), Some("margin: 1px"));
    }

    #[test]
    fn test_url_schemes() {
        assert_eq!(
            clean("background: url('http://x/a.png')").as_deref(),
            Some("background: url('http://x/a.png')")
        );
        assert_eq!(clean("background: url(img.png)").as_deref(), Some("background: url(img.png)"));
        assert_eq!(clean("background: url(javascript:alert(1))"), None);
        assert_eq!(clean("background: URL ( \"javascript:x\" )"), None);
    }

    #[test]
    fn test_malformed() {
        assert_eq!(clean("color red"), None);
        assert_eq!(clean("color:"), None);
        assert_eq!(clean("font-family: 'Times; color: red"), None);
        assert_eq!(clean("background: url(x"), None);
    }

    #[test]
    fn test_semicolons_inside_quotes() {
        assert_eq!(
            clean("font-family: 'a;b', serif; color: red").as_deref(),
            Some("font-family: 'a;b', serif; color: red")
        );
    }

    #[test]
    fn test_comments_removed() {
        assert_eq!(clean("color: /* x */ red").as_deref(), Some("color: red"));
        assert_eq!(clean("color: red; /* margin: 0"), Some("color: red".to_string()));
    }

    #[test]
    fn test_idempotent() {
        let once = clean("color:red;;margin : 2px;position:absolute").unwrap();
        assert_eq!(clean(&once).as_deref(), Some(once.as_str()));
    }
}
