//! Safe SQL identifier handling.
//!
//! An [`Ident`] is a validated column reference (optionally schema/table
//! qualified) used as the left-hand side of structured predicates. Identity is
//! structural: `users.id` and `id` are distinct references even though they
//! name the same column, which is exactly the distinction merge-override
//! semantics need.
//!
//! - Unquoted parts are validated against `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `"` as `""`

use crate::error::{ClauseError, ClauseResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentPart {
    /// Unquoted identifier part.
    Unquoted(String),
    /// Quoted identifier part, rendered inside double quotes.
    Quoted(String),
}

impl IdentPart {
    /// The bare name of this part, without quoting.
    pub fn name(&self) -> &str {
        match self {
            Self::Unquoted(s) | Self::Quoted(s) => s,
        }
    }
}

/// A SQL identifier (column, table, or schema name).
///
/// Supports dotted notation (`schema.table.column`) and quoted parts
/// (`"CamelCase"."User"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier string, supporting dotted and quoted forms.
    pub fn parse(s: &str) -> ClauseResult<Self> {
        if s.is_empty() {
            return Err(ClauseError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(ClauseError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();
        loop {
            let part = if chars.peek() == Some(&'"') {
                parse_quoted_part(&mut chars)?
            } else {
                parse_unquoted_part(&mut chars)?
            };
            parts.push(part);

            match chars.next() {
                None => break,
                Some('.') => {
                    if chars.peek().is_none() {
                        return Err(ClauseError::validation("Trailing '.' in identifier"));
                    }
                }
                Some(c) => {
                    return Err(ClauseError::validation(format!(
                        "Expected '.' between identifier parts, got '{c}'"
                    )));
                }
            }
        }

        Ok(Self { parts })
    }

    /// Create a single quoted identifier.
    pub fn quoted(name: &str) -> ClauseResult<Self> {
        if name.is_empty() {
            return Err(ClauseError::validation("Empty quoted identifier"));
        }
        if name.contains('\0') {
            return Err(ClauseError::validation(
                "Identifier cannot contain NUL character",
            ));
        }
        Ok(Self {
            parts: vec![IdentPart::Quoted(name.to_string())],
        })
    }

    /// The identifier parts, leftmost qualifier first.
    pub fn parts(&self) -> &[IdentPart] {
        &self.parts
    }

    /// The column name: the last (rightmost) part.
    pub fn column_name(&self) -> &str {
        self.parts
            .last()
            .map(IdentPart::name)
            .unwrap_or_default()
    }

    /// The table qualifier, if any: the part immediately before the column.
    pub fn table_name(&self) -> Option<&str> {
        if self.parts.len() < 2 {
            return None;
        }
        Some(self.parts[self.parts.len() - 2].name())
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => {
                    out.push('"');
                    for ch in s.chars() {
                        if ch == '"' {
                            out.push('"');
                        }
                        out.push(ch);
                    }
                    out.push('"');
                }
            }
        }
    }
}

fn parse_quoted_part(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> ClauseResult<IdentPart> {
    chars.next(); // opening quote
    let mut name = String::new();
    loop {
        match chars.next() {
            Some('"') => {
                // Escaped quote: ""
                if chars.peek() == Some(&'"') {
                    chars.next();
                    name.push('"');
                } else {
                    break;
                }
            }
            Some(c) => name.push(c),
            None => return Err(ClauseError::validation("Unclosed quoted identifier")),
        }
    }
    if name.is_empty() {
        return Err(ClauseError::validation("Empty quoted identifier"));
    }
    Ok(IdentPart::Quoted(name))
}

fn parse_unquoted_part(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> ClauseResult<IdentPart> {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c == '.' {
            break;
        }
        let valid = if name.is_empty() {
            c == '_' || c.is_ascii_alphabetic()
        } else {
            c == '_' || c == '$' || c.is_ascii_alphanumeric()
        };
        if !valid {
            return Err(ClauseError::validation(format!(
                "Invalid character in identifier: '{c}'"
            )));
        }
        name.push(c);
        chars.next();
    }
    if name.is_empty() {
        return Err(ClauseError::validation("Empty identifier segment"));
    }
    Ok(IdentPart::Unquoted(name))
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in predicate constructors.
pub trait IntoIdent {
    fn into_ident(self) -> ClauseResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> ClauseResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> ClauseResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> ClauseResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> ClauseResult<Ident> {
        Ident::parse(&self)
    }
}
