//! Lightweight HTML checks for rendered pages.
//!
//! Two passes share one tag scanner: BEM class naming (always on) and
//! structural validation (doctype, `lang`, `<title>`, balanced tags,
//! duplicate ids).

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<!--.*?-->|<(/?)([a-zA-Z][a-zA-Z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#)
        .expect("valid tag regex")
});

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][a-zA-Z0-9_:.-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid attribute regex")
});

static BEM_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    let word = "[a-z0-9]+(?:-[a-z0-9]+)*";
    Regex::new(&format!(
        "^(?P<block>[a-z]{rest})(?:__(?P<elem>{word}))?(?:--{word}(?:_{word})?)?$",
        rest = "[a-z0-9]*(?:-[a-z0-9]+)*",
        word = word
    ))
    .expect("valid BEM regex")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const OPTIONAL_END: &[&str] = &[
    "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th", "thead", "tbody", "tfoot",
    "colgroup", "rp", "rt", "caption", "head", "body", "html",
];

const RAW_TEXT: &[&str] = &["script", "style"];

/// A problem found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug)]
struct Tag<'a> {
    name: String,
    closing: bool,
    self_closing: bool,
    attrs: &'a str,
    line: usize,
}

impl Tag<'_> {
    fn attr(&self, name: &str) -> Option<&str> {
        ATTR.captures_iter(self.attrs).find_map(|caps| {
            if !caps[1].eq_ignore_ascii_case(name) {
                return None;
            }
            Some(
                caps.get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| m.as_str())
                    .unwrap_or(""),
            )
        })
    }

    fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    fn is_void(&self) -> bool {
        self.self_closing || VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

fn scan(html: &str) -> Vec<Tag<'_>> {
    let mut tags = Vec::new();
    let mut raw_until: Option<String> = None;

    for caps in TAG.captures_iter(html) {
        let Some(name) = caps.get(2) else {
            // comment
            continue;
        };
        let whole = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let name = name.as_str().to_ascii_lowercase();
        let closing = !caps[1].is_empty();

        if let Some(raw) = &raw_until {
            if closing && &name == raw {
                raw_until = None;
            } else {
                continue;
            }
        } else if !closing && RAW_TEXT.contains(&name.as_str()) {
            raw_until = Some(name.clone());
        }

        tags.push(Tag {
            name,
            closing,
            self_closing: !caps[4].is_empty(),
            attrs: caps.get(3).map(|m| m.as_str()).unwrap_or(""),
            line: html[..whole].matches('\n').count() + 1,
        });
    }

    tags
}

/// Check class names against BEM conventions.
///
/// Reports malformed names, modifiers without their base class on the same
/// element, and elements used outside of their block.
pub fn validate_bem(html: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut stack: Vec<(String, Vec<String>)> = Vec::new();

    for tag in scan(html) {
        if tag.closing {
            if let Some(pos) = stack.iter().rposition(|(name, _)| *name == tag.name) {
                stack.truncate(pos);
            }
            continue;
        }

        let classes = tag.classes();
        for class in &classes {
            let Some(caps) = BEM_CLASS.captures(class) else {
                diagnostics.push(Diagnostic {
                    line: tag.line,
                    message: format!("class \"{}\" is not a valid BEM name", class),
                });
                continue;
            };

            if let Some((base, _)) = class.split_once("--") {
                if !classes.contains(&base) {
                    diagnostics.push(Diagnostic {
                        line: tag.line,
                        message: format!(
                            "modifier \"{}\" used without \"{}\" on the same element",
                            class, base
                        ),
                    });
                }
            }

            if caps.name("elem").is_some() {
                let block = &caps["block"];
                let in_block = stack
                    .iter()
                    .any(|(_, ancestors)| ancestors.iter().any(|c| c == block));
                if !in_block {
                    diagnostics.push(Diagnostic {
                        line: tag.line,
                        message: format!(
                            "element \"{}\" is not inside a \"{}\" block",
                            class, block
                        ),
                    });
                }
            }
        }

        if !tag.is_void() {
            stack.push((
                tag.name.clone(),
                classes.iter().map(|c| c.to_string()).collect(),
            ));
        }
    }

    diagnostics
}

/// Structural checks for a complete page.
pub fn validate_html(html: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let starts_with_doctype = html
        .trim_start()
        .get(..15)
        .is_some_and(|s| s.eq_ignore_ascii_case("<!doctype html>"));
    if !starts_with_doctype {
        diagnostics.push(Diagnostic {
            line: 1,
            message: "document does not start with <!DOCTYPE html>".to_string(),
        });
    }

    let tags = scan(html);
    let mut has_title = false;
    let mut ids = HashSet::new();
    let mut stack: Vec<(String, usize)> = Vec::new();

    for tag in &tags {
        if tag.closing {
            if VOID_ELEMENTS.contains(&tag.name.as_str()) {
                diagnostics.push(Diagnostic {
                    line: tag.line,
                    message: format!("stray end tag </{}>", tag.name),
                });
                continue;
            }

            match stack.iter().rposition(|(name, _)| *name == tag.name) {
                Some(pos) => {
                    for (name, line) in stack.drain(pos + 1..) {
                        if !OPTIONAL_END.contains(&name.as_str()) {
                            diagnostics.push(Diagnostic {
                                line,
                                message: format!("unclosed element <{}>", name),
                            });
                        }
                    }
                    stack.pop();
                }
                None => diagnostics.push(Diagnostic {
                    line: tag.line,
                    message: format!("end tag </{}> without matching start tag", tag.name),
                }),
            }
            continue;
        }

        match tag.name.as_str() {
            "html" if tag.attr("lang").map_or(true, str::is_empty) => {
                diagnostics.push(Diagnostic {
                    line: tag.line,
                    message: "<html> is missing a lang attribute".to_string(),
                });
            }
            "title" => has_title = true,
            "img" if tag.attr("alt").is_none() => {
                diagnostics.push(Diagnostic {
                    line: tag.line,
                    message: "<img> is missing an alt attribute".to_string(),
                });
            }
            _ => {}
        }

        if let Some(id) = tag.attr("id") {
            if !ids.insert(id.to_string()) {
                diagnostics.push(Diagnostic {
                    line: tag.line,
                    message: format!("duplicate id \"{}\"", id),
                });
            }
        }

        if !tag.is_void() {
            stack.push((tag.name.clone(), tag.line));
        }
    }

    for (name, line) in stack {
        if !OPTIONAL_END.contains(&name.as_str()) {
            diagnostics.push(Diagnostic {
                line,
                message: format!("unclosed element <{}>", name),
            });
        }
    }

    if !has_title {
        diagnostics.push(Diagnostic {
            line: 1,
            message: "document has no <title>".to_string(),
        });
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Home</title>
  <script>if (a < b && c > d) { document.write("<div>"); }</script>
</head>
<body>
  <!-- <div class="Bad_Name"> -->
  <header class="header header--dark">
    <a class="header__logo" href="/"><img src="logo.png" alt="logo"></a>
    <ul class="menu">
      <li class="menu__item">One
      <li class="menu__item menu__item--active">Two
    </ul>
  </header>
  <p id="intro">Hello<br/>
</body>
</html>"#;

    #[test]
    fn accepts_valid_page() {
        assert_eq!(validate_html(VALID), vec![]);
        assert_eq!(validate_bem(VALID), vec![]);
    }

    #[test]
    fn reports_missing_structure() {
        let html = "<html><head></head><body><div><span></div></body></html>";
        let messages: Vec<String> = validate_html(html).into_iter().map(|d| d.message).collect();

        assert!(messages.iter().any(|m| m.contains("DOCTYPE")));
        assert!(messages.iter().any(|m| m.contains("lang")));
        assert!(messages.iter().any(|m| m.contains("<title>")));
        assert!(messages.iter().any(|m| m.contains("unclosed element <span>")));
    }

    #[test]
    fn reports_duplicate_ids_and_stray_end_tags() {
        let html = concat!(
            "<!DOCTYPE html><html lang=\"en\"><title>x</title>",
            "<p id=\"a\"></p><p id='a'></p></section></html>",
        );
        let messages: Vec<String> = validate_html(html).into_iter().map(|d| d.message).collect();

        assert!(messages.contains(&"duplicate id \"a\"".to_string()));
        assert!(messages.contains(&"end tag </section> without matching start tag".to_string()));
    }

    #[test]
    fn reports_bad_bem_names() {
        let html = "<div class=\"Card\"><span class=\"card__title--big\"></span></div>";
        let diagnostics = validate_bem(html);

        assert!(diagnostics.iter().any(|d| d.message.contains("\"Card\" is not a valid BEM name")));
        assert!(diagnostics.iter().any(|d| d.message.contains("is not inside a \"card\" block")));
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("used without \"card__title\"")));
    }

    #[test]
    fn element_outside_block_is_reported_with_line() {
        let html = "<div class=\"page\">\n<p class=\"nav__link\"></p>\n</div>";
        let diagnostics = validate_bem(html);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 2);
    }
}
