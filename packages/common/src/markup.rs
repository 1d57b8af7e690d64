//! # Markup tokenizer
//!
//! A small tag/text tokenizer shared by the HTML data processor and the
//! model/view string dev-utils (`<paragraph>fo[]o</paragraph>`).
//!
//! Logos drives two lexers: the content lexer scans text and tag openings,
//! and on a tag opening it morphs into the attribute lexer until the tag
//! closes. Comments and declarations are consumed with callbacks so their
//! bodies never reach the regex engine.

use logos::{Lexer, Logos};
use std::borrow::Cow;
use std::ops::Range;

use crate::error::MarkupError;
use crate::result::MarkupResult;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum ContentToken {
    #[token("<!--", skip_comment)]
    Comment,

    #[regex(r"<![A-Za-z\[]", skip_declaration)]
    Declaration,

    #[regex(r"</[A-Za-z$][A-Za-z0-9:_$.\-]*[ \t\r\n]*>")]
    EndTag,

    #[regex(r"<[A-Za-z$][A-Za-z0-9:_$.\-]*")]
    TagOpen,

    #[regex(r"[^<]+")]
    Text,

    #[token("<")]
    Lt,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum TagToken {
    #[token(">")]
    Close,

    #[token("/>")]
    SelfClose,

    #[token("=")]
    Equals,

    #[regex(r#""[^"]*""#)]
    DoubleQuoted,

    #[regex(r"'[^']*'")]
    SingleQuoted,

    #[regex(r#"[^ \t\r\n"'=<>]+"#)]
    Word,
}

fn skip_comment(lex: &mut Lexer<ContentToken>) -> bool {
    match lex.remainder().find("-->") {
        Some(end) => {
            lex.bump(end + 3);
            true
        }
        None => false,
    }
}

fn skip_declaration(lex: &mut Lexer<ContentToken>) -> bool {
    match lex.remainder().find('>') {
        Some(end) => {
            lex.bump(end + 1);
            true
        }
        None => false,
    }
}

/// A single attribute of a start tag. Boolean attributes have no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupAttribute<'src> {
    pub name: &'src str,
    pub value: Option<&'src str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupToken<'src> {
    StartTag {
        name: &'src str,
        attributes: Vec<MarkupAttribute<'src>>,
        self_closing: bool,
    },
    EndTag {
        name: &'src str,
    },
    /// Raw text; entities are not decoded.
    Text(&'src str),
    Comment(&'src str),
}

/// Token with its byte span in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Range<usize>,
}

/// Tokenize markup into start tags, end tags, text runs and comments.
///
/// Declarations (`<!DOCTYPE ...>`) are skipped. A lone `<` that does not start
/// a tag is reported as text.
pub fn tokenize(source: &str) -> MarkupResult<Vec<Spanned<MarkupToken<'_>>>> {
    let mut tokens = Vec::new();
    let mut lexer = ContentToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let token = result.map_err(|_| MarkupError::UnexpectedCharacter { offset: span.start })?;
        let slice = lexer.slice();

        match token {
            ContentToken::Comment => tokens.push(Spanned {
                token: MarkupToken::Comment(&slice[4..slice.len() - 3]),
                span,
            }),
            ContentToken::Declaration => {}
            ContentToken::EndTag => {
                let name = slice[2..slice.len() - 1].trim_end();
                tokens.push(Spanned {
                    token: MarkupToken::EndTag { name },
                    span,
                });
            }
            ContentToken::Text => tokens.push(Spanned {
                token: MarkupToken::Text(slice),
                span,
            }),
            ContentToken::Lt => tokens.push(Spanned {
                token: MarkupToken::Text(slice),
                span,
            }),
            ContentToken::TagOpen => {
                let name = &slice[1..];
                let mut tag_lexer = lexer.morph::<TagToken>();
                let (attributes, self_closing) = read_attributes(&mut tag_lexer, name, span.start)?;
                let end = tag_lexer.span().end;
                lexer = tag_lexer.morph();

                tokens.push(Spanned {
                    token: MarkupToken::StartTag {
                        name,
                        attributes,
                        self_closing,
                    },
                    span: span.start..end,
                });
            }
        }
    }

    Ok(tokens)
}

fn read_attributes<'src>(
    lexer: &mut Lexer<'src, TagToken>,
    name: &'src str,
    offset: usize,
) -> MarkupResult<(Vec<MarkupAttribute<'src>>, bool)> {
    let mut attributes: Vec<MarkupAttribute<'src>> = Vec::new();
    let mut awaiting_value = false;

    loop {
        let Some(result) = lexer.next() else {
            return Err(MarkupError::UnterminatedTag {
                name: name.to_string(),
                offset,
            });
        };
        let malformed = || MarkupError::MalformedAttribute {
            name: name.to_string(),
            offset: lexer.span().start,
        };
        let token = result.map_err(|_| malformed())?;
        let slice = lexer.slice();

        match token {
            TagToken::Close if !awaiting_value => return Ok((attributes, false)),
            TagToken::SelfClose if !awaiting_value => return Ok((attributes, true)),
            TagToken::Close | TagToken::SelfClose => return Err(malformed()),
            TagToken::Equals => {
                if attributes.is_empty() || awaiting_value {
                    return Err(malformed());
                }
                awaiting_value = true;
            }
            TagToken::DoubleQuoted | TagToken::SingleQuoted => {
                if !awaiting_value {
                    return Err(malformed());
                }
                if let Some(last) = attributes.last_mut() {
                    last.value = Some(&slice[1..slice.len() - 1]);
                }
                awaiting_value = false;
            }
            TagToken::Word => {
                if awaiting_value {
                    if let Some(last) = attributes.last_mut() {
                        last.value = Some(slice);
                    }
                    awaiting_value = false;
                } else {
                    attributes.push(MarkupAttribute { name: slice, value: None });
                }
            }
        }
    }
}

/// Decode the character references used in attribute values and text.
/// Unknown references are kept verbatim.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest[1..].find(';').and_then(|semi| {
            let entity = &rest[1..semi + 1];
            decode_entity(entity).map(|ch| (ch, semi + 2))
        });

        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Escape text content. Non-breaking spaces are written as `&nbsp;`.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '\u{a0}']) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<MarkupToken<'_>> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_elements_and_text() {
        let tokens = kinds("<p>foo<b>bar</b></p>");
        assert_eq!(
            tokens,
            vec![
                MarkupToken::StartTag {
                    name: "p",
                    attributes: vec![],
                    self_closing: false
                },
                MarkupToken::Text("foo"),
                MarkupToken::StartTag {
                    name: "b",
                    attributes: vec![],
                    self_closing: false
                },
                MarkupToken::Text("bar"),
                MarkupToken::EndTag { name: "b" },
                MarkupToken::EndTag { name: "p" },
            ]
        );
    }

    #[test]
    fn test_attribute_forms() {
        let tokens = kinds(r#"<a href="x.html" title='t' data-x=1 hidden>"#);
        let MarkupToken::StartTag { attributes, .. } = &tokens[0] else {
            panic!("expected start tag");
        };
        assert_eq!(attributes.len(), 4);
        assert_eq!(attributes[0].value, Some("x.html"));
        assert_eq!(attributes[1].value, Some("t"));
        assert_eq!(attributes[2].value, Some("1"));
        assert_eq!(attributes[3].name, "hidden");
        assert_eq!(attributes[3].value, None);
    }

    #[test]
    fn test_self_closing_and_model_names() {
        let tokens = kinds(r#"<br/><$text bold="true">x</$text>"#);
        assert!(matches!(
            tokens[0],
            MarkupToken::StartTag {
                name: "br",
                self_closing: true,
                ..
            }
        ));
        assert!(matches!(tokens[1], MarkupToken::StartTag { name: "$text", .. }));
        assert_eq!(tokens[3], MarkupToken::EndTag { name: "$text" });
    }

    #[test]
    fn test_comments_and_doctype() {
        let tokens = kinds("<!DOCTYPE html><!-- a <b> -->x");
        assert_eq!(tokens, vec![MarkupToken::Comment(" a <b> "), MarkupToken::Text("x")]);
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        let tokens = kinds("a < b");
        assert_eq!(
            tokens,
            vec![MarkupToken::Text("a "), MarkupToken::Text("<"), MarkupToken::Text(" b")]
        );
    }

    #[test]
    fn test_unterminated_tag() {
        let err = tokenize("<p class=\"x\"").unwrap_err();
        assert!(matches!(err, MarkupError::UnterminatedTag { .. }));
        assert_eq!(err.offset(), 0);
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;&#65;&#x42;&nbsp;"), "a & b <AB\u{a0}");
        assert_eq!(decode_entities("&unknown; &"), "&unknown; &");
        assert_eq!(escape_text("<a & b>\u{a0}"), "&lt;a &amp; b&gt;&nbsp;");
        assert_eq!(escape_attribute("say \"hi\""), "say &quot;hi&quot;");
    }
}
