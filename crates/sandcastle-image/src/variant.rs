//! The closed set of sandbox variants.
//!
//! Each variant names the build-definition file it is built from and may
//! carry a code-formatting rule. Containers of a variant with a rule can run
//! source code directly; the others accept raw shell commands only.

use std::fmt;
use std::str::FromStr;

use sandcastle_common::error::{Result, SandboxError};
use serde::{Deserialize, Serialize};

/// Turns a source snippet into a shell command that runs it.
pub type CodeFormatter = fn(&str) -> String;

/// A fixed category of sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageVariant {
    /// Python interpreter sandbox; supports direct code execution.
    Python,
    /// Plain Ubuntu userland; shell commands only.
    Ubuntu,
}

impl ImageVariant {
    /// Every known variant.
    pub const ALL: [Self; 2] = [Self::Python, Self::Ubuntu];

    /// Lowercase variant name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Ubuntu => "ubuntu",
        }
    }

    /// File name of the build definition, relative to the recipe directory.
    #[must_use]
    pub const fn build_definition_path(self) -> &'static str {
        match self {
            Self::Python => "python.dockerfile",
            Self::Ubuntu => "ubuntu.dockerfile",
        }
    }

    /// The variant's code-formatting rule, if it has one.
    #[must_use]
    pub fn code_formatter(self) -> Option<CodeFormatter> {
        match self {
            Self::Python => Some(format_python as CodeFormatter),
            Self::Ubuntu => None,
        }
    }

    /// Whether containers of this variant can run source code directly.
    #[must_use]
    pub fn supports_code(self) -> bool {
        self.code_formatter().is_some()
    }

    /// Formats `source` into an interpreter invocation.
    ///
    /// Returns `None` for variants without a formatting rule.
    #[must_use]
    pub fn format_code(self, source: &str) -> Option<String> {
        self.code_formatter().map(|format| format(source))
    }
}

impl fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageVariant {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| SandboxError::Config {
                message: format!(
                    "unknown image variant {s:?} (expected one of: {})",
                    Self::ALL.map(Self::name).join(", ")
                ),
            })
    }
}

fn format_python(source: &str) -> String {
    format!("python -c {}", shell_single_quote(&normalize_spaces(source)))
}

/// Replaces non-ASCII whitespace (no-break space, em space, ...) with a plain
/// space and drops NUL bytes, which cannot appear in an argument.
fn normalize_spaces(source: &str) -> String {
    source
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| if !c.is_ascii() && c.is_whitespace() { ' ' } else { c })
        .collect()
}

/// Wraps `s` in single quotes; an embedded `'` becomes `'\''`.
fn shell_single_quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Splits a POSIX shell line into words, honouring single and double
    /// quotes and backslash escapes. Returns `None` on an unterminated quote.
    fn shell_words(line: &str) -> Option<Vec<String>> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    in_word = true;
                    loop {
                        match chars.next()? {
                            '\'' => break,
                            other => current.push(other),
                        }
                    }
                }
                '"' => {
                    in_word = true;
                    loop {
                        match chars.next()? {
                            '"' => break,
                            '\\' => current.push(chars.next()?),
                            other => current.push(other),
                        }
                    }
                }
                '\\' => {
                    in_word = true;
                    current.push(chars.next()?);
                }
                ' ' | '\t' => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                other => {
                    in_word = true;
                    current.push(other);
                }
            }
        }
        if in_word {
            words.push(current);
        }
        Some(words)
    }

    #[test]
    fn build_definition_paths() {
        assert_eq!(ImageVariant::Python.build_definition_path(), "python.dockerfile");
        assert_eq!(ImageVariant::Ubuntu.build_definition_path(), "ubuntu.dockerfile");
    }

    #[test]
    fn only_python_supports_code() {
        assert!(ImageVariant::Python.supports_code());
        assert!(!ImageVariant::Ubuntu.supports_code());
        assert_eq!(ImageVariant::Ubuntu.format_code("print(1)"), None);
    }

    #[test]
    fn python_wraps_source_in_single_quotes() {
        let cmd = ImageVariant::Python.format_code("print(1+1)").expect("python formats");
        assert_eq!(cmd, "python -c 'print(1+1)'");
    }

    #[test]
    fn double_quote_and_nbsp_stay_inside_one_argument() {
        let source = "print(\"a\u{00A0}b\")";
        let cmd = ImageVariant::Python.format_code(source).expect("python formats");
        let words = shell_words(&cmd).expect("quoting must be balanced");
        assert_eq!(words, vec!["python", "-c", "print(\"a b\")"]);
    }

    #[test]
    fn single_quotes_cannot_terminate_the_argument() {
        let source = "print('x'); import os; os.system('id')";
        let cmd = ImageVariant::Python.format_code(source).expect("python formats");
        let words = shell_words(&cmd).expect("quoting must be balanced");
        assert_eq!(words.len(), 3);
        assert_eq!(words[2], source);
    }

    #[test]
    fn unicode_spaces_are_normalized() {
        let source = "x\u{2003}=\u{202F}1\u{3000}";
        let cmd = ImageVariant::Python.format_code(source).expect("python formats");
        let words = shell_words(&cmd).expect("balanced");
        assert_eq!(words[2], "x = 1 ");
    }

    #[test]
    fn newlines_are_preserved() {
        let source = "for i in range(2):\n    print(i)";
        let cmd = ImageVariant::Python.format_code(source).expect("python formats");
        let words = shell_words(&cmd).expect("balanced");
        assert_eq!(words[2], source);
    }

    #[test]
    fn parse_and_display_roundtrip_names() {
        for variant in ImageVariant::ALL {
            let parsed: ImageVariant = variant.to_string().parse().expect("parse");
            assert_eq!(parsed, variant);
        }
        assert_eq!("Python".parse::<ImageVariant>().unwrap(), ImageVariant::Python);
        assert!("alpine".parse::<ImageVariant>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ImageVariant::Ubuntu).expect("serialize");
        assert_eq!(json, "\"ubuntu\"");
    }
}
