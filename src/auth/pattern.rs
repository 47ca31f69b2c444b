use regex::Regex;
use tracing::error;

/// Compiled URL protection globs.
///
/// The configuration value is a comma-separated list of shell-style globs
/// (`*` and `?`). Matching is done against the URL-decoded request path with
/// the leading `/` normalized away on both sides, so `protect = "private/*"`
/// covers `/private/a` and `private/a` alike.
pub struct UrlPattern {
    patterns: Vec<Regex>,
}

impl UrlPattern {
    pub fn compile(globs: &str) -> Self {
        let patterns = globs
            .split(',')
            .map(str::trim)
            .filter(|glob| !glob.is_empty())
            .filter_map(|glob| {
                let expression = glob_to_regex(glob.trim_start_matches('/'));
                match Regex::new(&expression) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        error!("Invalid URL pattern '{glob}': {e}");
                        None
                    }
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        let subject = path.trim_start_matches('/');
        self.patterns.iter().any(|pattern| pattern.is_match(subject))
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut expression = String::with_capacity(glob.len() + 4);
    expression.push('^');
    for character in glob.chars() {
        match character {
            '*' => expression.push_str(".*"),
            '?' => expression.push('.'),
            c => expression.push_str(&regex::escape(&c.to_string())),
        }
    }
    expression.push('$');
    expression
}
