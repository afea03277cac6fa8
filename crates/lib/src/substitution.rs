//! Substitution parsing and resolution.
//!
//! Build configurations reference substitution variables that are resolved
//! before the steps run. User-defined variables start with an underscore
//! (`_REGION`); built-in variables (`PROJECT_ID`, `BUILD_ID`, ...) are filled
//! in by the build service and always pass through untouched.
//!
//! # Reference Formats
//!
//! - `$NAME` - bare reference, the longest run of `[A-Za-z0-9_]`
//! - `${NAME}` - braced reference, for when the name is followed by word characters
//! - `${_NAME:-default}` - bash parameter expansion, only with [`Mode::dynamic`]
//!
//! # Escaping
//!
//! `$$` produces a literal `$`. A lone `$` that does not start a reference is
//! kept as a literal as well. Inlined values are escaped so they are never
//! expanded a second time.
//!
//! # Example
//!
//! ```
//! use cloudbuild_lib::substitution::{Substitutions, substitute};
//!
//! let mut subs = Substitutions::new();
//! subs.insert("_IMAGE", "app");
//!
//! let out = substitute("gcr.io/$PROJECT_ID/${_IMAGE}:latest", &subs).unwrap();
//! assert_eq!(out, "gcr.io/$PROJECT_ID/app:latest");
//! ```

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Variables the build service resolves on its own.
pub const BUILTINS: &[&str] = &[
  "PROJECT_ID",
  "PROJECT_NUMBER",
  "BUILD_ID",
  "LOCATION",
  "REPO_NAME",
  "REPO_FULL_NAME",
  "BRANCH_NAME",
  "TAG_NAME",
  "REF_NAME",
  "COMMIT_SHA",
  "SHORT_SHA",
  "REVISION_ID",
  "TRIGGER_NAME",
  "TRIGGER_BUILD_CONFIG_PATH",
  "SERVICE_ACCOUNT_EMAIL",
  "SERVICE_ACCOUNT",
  "_HEAD_BRANCH",
  "_BASE_BRANCH",
  "_HEAD_REPO_URL",
  "_PR_NUMBER",
];

/// Whether `name` is resolved by the build service rather than by the caller.
pub fn is_builtin(name: &str) -> bool {
  BUILTINS.contains(&name)
}

/// Whether `name` is a valid key for a user-defined substitution.
pub fn is_user_key(name: &str) -> bool {
  let mut chars = name.chars();
  chars.next() == Some('_')
    && name.len() > 1
    && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text.
  Literal(String),

  /// `$$`, a literal dollar that must stay escaped on the wire.
  Escape,

  /// A variable reference.
  Reference { name: String, braced: bool },

  /// Contents of a `${...}` bash expansion, left for the build service.
  Expression(String),
}

/// Substitution rules a build opts into through its options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
  /// References without a value expand to nothing (`ALLOW_LOOSE`).
  pub allow_loose: bool,
  /// `${...}` may hold a bash parameter expansion (`dynamicSubstitutions`).
  pub dynamic: bool,
}

impl Segment {
  fn render(&self, out: &mut String) {
    match self {
      Segment::Literal(s) => out.push_str(s),
      Segment::Escape => out.push_str("$$"),
      Segment::Reference { name, braced: true } => {
        out.push_str("${");
        out.push_str(name);
        out.push('}');
      }
      Segment::Reference { name, braced: false } => {
        out.push('$');
        out.push_str(name);
      }
      Segment::Expression(expr) => {
        out.push_str("${");
        out.push_str(expr);
        out.push('}');
      }
    }
  }
}

/// Errors that can occur during substitution parsing or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstitutionError {
  #[error("unclosed substitution at position {0}")]
  Unclosed(usize),

  #[error("malformed substitution: '{0}'")]
  Malformed(String),

  #[error("unresolved substitution: {0}")]
  Unresolved(String),

  #[error("invalid substitution key '{0}': user substitutions must match _[A-Z0-9_]+")]
  InvalidKey(String),

  #[error("duplicate substitution key: {0}")]
  DuplicateKey(String),
}

/// Source of values for user-defined substitutions.
pub trait Resolver {
  fn resolve(&self, name: &str) -> Option<&str>;
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}

fn is_name(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_') && chars.all(is_name_char)
}

/// `${#NAME}`, `${!NAME}` or a name followed by an expansion operator.
fn is_expression(content: &str) -> bool {
  if let Some(rest) = content.strip_prefix(['#', '!']) {
    return is_name(rest);
  }
  let end = content.find(|c: char| !is_name_char(c)).unwrap_or(content.len());
  end > 0
    && is_name(&content[..end])
    && content[end..].starts_with([':', '-', '+', '=', '?', '#', '%', '/', '^', ',', '@', '['])
}

/// Parse a string containing substitution references into segments.
///
/// # Errors
///
/// Returns an error for an unclosed `${` or a braced reference whose content
/// is not a valid variable name.
pub fn parse(input: &str) -> Result<Vec<Segment>, SubstitutionError> {
  parse_with(input, Mode::default())
}

/// [`parse`], also accepting bash expansions when `mode.dynamic` is set.
pub fn parse_with(input: &str, mode: Mode) -> Result<Vec<Segment>, SubstitutionError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '$' {
      literal.push(ch);
      continue;
    }

    match chars.peek() {
      Some((_, '$')) => {
        chars.next();
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Escape);
      }
      Some((_, '{')) => {
        chars.next();

        let mut content = String::new();
        let mut found_close = false;
        for (_, c) in chars.by_ref() {
          if c == '}' {
            found_close = true;
            break;
          }
          content.push(c);
        }

        if !found_close {
          return Err(SubstitutionError::Unclosed(pos));
        }
        let segment = if is_name(&content) {
          Segment::Reference {
            name: content,
            braced: true,
          }
        } else if mode.dynamic && is_expression(&content) {
          Segment::Expression(content)
        } else {
          return Err(SubstitutionError::Malformed(format!("${{{content}}}")));
        };

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(segment);
      }
      Some(&(_, c)) if c.is_ascii_alphabetic() || c == '_' => {
        let mut name = String::new();
        while let Some(&(_, c)) = chars.peek() {
          if !is_name_char(c) {
            break;
          }
          name.push(c);
          chars.next();
        }

        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Reference { name, braced: false });
      }
      _ => literal.push('$'),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Names referenced by `input`, in order of appearance.
pub fn references(input: &str) -> Result<Vec<String>, SubstitutionError> {
  references_with(input, Mode::default())
}

/// [`references`] under `mode`. Bash expansions carry their own fallback and
/// are not counted.
pub fn references_with(input: &str, mode: Mode) -> Result<Vec<String>, SubstitutionError> {
  Ok(
    parse_with(input, mode)?
      .into_iter()
      .filter_map(|segment| match segment {
        Segment::Reference { name, .. } => Some(name),
        _ => None,
      })
      .collect(),
  )
}

/// Inline every non-builtin reference in `input`.
///
/// Built-in references and `$$` escapes are preserved as written so the
/// build service can still resolve them.
///
/// # Errors
///
/// Returns [`SubstitutionError::Unresolved`] for any non-builtin reference the
/// resolver has no value for.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, SubstitutionError> {
  substitute_with(input, resolver, Mode::default())
}

/// [`substitute`] under `mode`: loose references expand to nothing and bash
/// expansions pass through.
pub fn substitute_with(input: &str, resolver: &impl Resolver, mode: Mode) -> Result<String, SubstitutionError> {
  let segments = parse_with(input, mode)?;
  let mut out = String::with_capacity(input.len());

  for segment in &segments {
    match segment {
      Segment::Reference { name, .. } if !is_builtin(name) => match resolver.resolve(name) {
        Some(value) => out.push_str(&value.replace('$', "$$")),
        None if mode.allow_loose => {}
        None => return Err(SubstitutionError::Unresolved(name.clone())),
      },
      other => other.render(&mut out),
    }
  }

  Ok(out)
}

/// Insertion-ordered mapping of substitution keys to values.
///
/// Keys are unique: inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
  entries: Vec<(String, String)>,
}

impl Substitutions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a value, returning the previous one if the key existed.
  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
    let key = key.into();
    let value = value.into();
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some((_, existing)) => Some(std::mem::replace(existing, value)),
      None => {
        self.entries.push((key, value));
        None
      }
    }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(k, _)| k.as_str())
  }

  /// Overlay `other` on top of this mapping.
  pub fn merge(&mut self, other: &Substitutions) {
    for (k, v) in other.iter() {
      self.insert(k, v);
    }
  }

  /// Check that every key is a valid user-defined substitution key.
  pub fn validate(&self) -> Result<(), SubstitutionError> {
    match self.keys().find(|k| !is_user_key(k)) {
      Some(bad) => Err(SubstitutionError::InvalidKey(bad.to_string())),
      None => Ok(()),
    }
  }
}

impl Resolver for Substitutions {
  fn resolve(&self, name: &str) -> Option<&str> {
    self.get(name)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Substitutions {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut subs = Substitutions::new();
    for (k, v) in iter {
      subs.insert(k, v);
    }
    subs
  }
}

impl Serialize for Substitutions {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.entries.len()))?;
    for (k, v) in &self.entries {
      map.serialize_entry(k, v)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for Substitutions {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct SubstitutionsVisitor;

    impl<'de> Visitor<'de> for SubstitutionsVisitor {
      type Value = Substitutions;

      fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of substitution keys to string values")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut subs = Substitutions::new();
        while let Some((key, value)) = access.next_entry::<String, String>()? {
          if subs.contains_key(&key) {
            return Err(serde::de::Error::custom(SubstitutionError::DuplicateKey(key)));
          }
          subs.insert(key, value);
        }
        Ok(subs)
      }
    }

    deserializer.deserialize_map(SubstitutionsVisitor)
  }
}
