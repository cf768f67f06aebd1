//! Splits a logical line into a declaration kind and its ordered options.

use std::fmt;

use crate::acctree::tools::error::ParseError;
use crate::acctree::tools::io::lines::{Glyph, LogicalLine};
use crate::acctree::tools::model::MergeSign;

/// Separates fields of a declaration.
pub const FIELD_SEPARATOR: char = ':';
/// Separates a key from its value.
pub const VALUE_SEPARATOR: char = '=';
/// Separates the declaration kind from its body.
pub const KIND_SEPARATOR: char = '-';

/// Entity kind a logical line declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Cluster,
    Parent,
    Account,
    User,
}

impl DeclarationKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cluster" => Some(DeclarationKind::Cluster),
            "parent" => Some(DeclarationKind::Parent),
            "account" => Some(DeclarationKind::Account),
            "user" => Some(DeclarationKind::User),
            _ => None,
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationKind::Cluster => f.write_str("Cluster"),
            DeclarationKind::Parent => f.write_str("Parent"),
            DeclarationKind::Account => f.write_str("Account"),
            DeclarationKind::User => f.write_str("User"),
        }
    }
}

/// One `key=value` field, or the bare entity name when `key` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOption {
    pub key: Option<String>,
    pub value: String,
    pub sign: MergeSign,
}

impl RawOption {
    pub fn keyed(key: impl Into<String>, value: impl Into<String>, sign: MergeSign) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
            sign,
        }
    }
}

/// Options recovered from a line together with the field-level errors hit
/// while splitting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub options: Vec<RawOption>,
    pub errors: Vec<ParseError>,
}

/// One parsed logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub line: usize,
    pub options: Vec<RawOption>,
}

/// Splits `<Kind> - <body>` and tokenizes the body.
///
/// The `Err` case covers lines whose kind cannot be recognised; field-level
/// problems are reported through [`Tokenized::errors`].
pub fn parse_declaration(line: &LogicalLine) -> Result<(Declaration, Vec<ParseError>), ParseError> {
    let dash = line
        .glyphs
        .iter()
        .position(|glyph| glyph.is(KIND_SEPARATOR))
        .ok_or_else(|| {
            ParseError::line_format(format!("expected '<Kind> - <name>', found '{}'", line.text()))
        })?;

    let kind_text: String = line.glyphs[..dash].iter().map(|glyph| glyph.ch).collect();
    let kind = DeclarationKind::parse(&kind_text).ok_or_else(|| {
        ParseError::line_format(format!("unknown declaration kind '{}'", kind_text.trim()))
    })?;

    let tokenized = tokenize(&line.glyphs[dash + 1..]);
    Ok((
        Declaration {
            kind,
            line: line.number,
            options: tokenized.options,
        },
        tokenized.errors,
    ))
}

/// Splits a declaration body on unquoted field separators.
pub fn tokenize(body: &[Glyph]) -> Tokenized {
    let mut tokenized = Tokenized::default();

    for (index, field) in split_fields(body).into_iter().enumerate() {
        if field.unterminated {
            tokenized.errors.push(ParseError::line_format(format!(
                "unterminated quote in '{}'",
                render(field.glyphs).trim()
            )));
            break;
        }

        match find_unquoted(field.glyphs, VALUE_SEPARATOR) {
            Some(split) => {
                let (key, sign) = split_key(&field.glyphs[..split]);
                if key.is_empty() {
                    tokenized.errors.push(ParseError::line_format(format!(
                        "missing key in '{}'",
                        render(field.glyphs).trim()
                    )));
                    continue;
                }
                tokenized.options.push(RawOption {
                    key: Some(key),
                    value: dequote(&field.glyphs[split + 1..]),
                    sign,
                });
            }
            None => {
                let value = dequote(field.glyphs);
                if index == 0 {
                    if !value.is_empty() {
                        tokenized.options.push(RawOption {
                            key: None,
                            value,
                            sign: MergeSign::Set,
                        });
                    }
                } else if !value.is_empty() {
                    tokenized.errors.push(ParseError::line_format(format!(
                        "field '{value}' has no '{VALUE_SEPARATOR}'"
                    )));
                }
            }
        }
    }

    tokenized
}

struct Field<'a> {
    glyphs: &'a [Glyph],
    unterminated: bool,
}

fn split_fields(body: &[Glyph]) -> Vec<Field<'_>> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;

    for (index, glyph) in body.iter().enumerate() {
        if glyph.literal {
            continue;
        }
        match quote {
            Some(open) if glyph.ch == open => quote = None,
            Some(_) => {}
            None if glyph.ch == '\'' || glyph.ch == '"' => quote = Some(glyph.ch),
            None if glyph.ch == FIELD_SEPARATOR => {
                fields.push(Field {
                    glyphs: &body[start..index],
                    unterminated: false,
                });
                start = index + 1;
            }
            None => {}
        }
    }

    fields.push(Field {
        glyphs: &body[start..],
        unterminated: quote.is_some(),
    });
    fields
}

fn find_unquoted(glyphs: &[Glyph], target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (index, glyph) in glyphs.iter().enumerate() {
        if glyph.literal {
            continue;
        }
        match quote {
            Some(open) if glyph.ch == open => quote = None,
            Some(_) => {}
            None if glyph.ch == '\'' || glyph.ch == '"' => quote = Some(glyph.ch),
            None if glyph.ch == target => return Some(index),
            None => {}
        }
    }
    None
}

fn split_key(glyphs: &[Glyph]) -> (String, MergeSign) {
    let text = dequote(glyphs);
    if let Some(key) = text.strip_suffix('+') {
        (key.trim_end().to_string(), MergeSign::Add)
    } else if let Some(key) = text.strip_suffix('-') {
        (key.trim_end().to_string(), MergeSign::Remove)
    } else {
        (text, MergeSign::Set)
    }
}

/// Removes quote delimiters and trims whitespace that is neither quoted nor
/// escaped.
fn dequote(glyphs: &[Glyph]) -> String {
    let mut chars: Vec<(char, bool)> = Vec::with_capacity(glyphs.len());
    let mut quote: Option<char> = None;

    for glyph in glyphs {
        if glyph.literal {
            chars.push((glyph.ch, true));
            continue;
        }
        match quote {
            Some(open) if glyph.ch == open => quote = None,
            Some(_) => chars.push((glyph.ch, true)),
            None if glyph.ch == '\'' || glyph.ch == '"' => quote = Some(glyph.ch),
            None => chars.push((glyph.ch, false)),
        }
    }

    let start = chars
        .iter()
        .position(|(ch, protected)| *protected || !ch.is_whitespace())
        .unwrap_or(chars.len());
    let end = chars
        .iter()
        .rposition(|(ch, protected)| *protected || !ch.is_whitespace())
        .map_or(start, |index| index + 1);

    chars[start..end].iter().map(|(ch, _)| *ch).collect()
}

fn render(glyphs: &[Glyph]) -> String {
    glyphs.iter().map(|glyph| glyph.ch).collect()
}
