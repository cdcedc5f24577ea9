//! JSON 词法分析
//!
//! 基于 logos 生成的词法器,在标准 JSON 之上识别 shell 扩展:单引号字符串、
//! 未加引号的标识符、`/pattern/flags` 正则字面量以及 `-Infinity`。
//! [`JsonScanner`] 每次从当前偏移处切出一个词法单元,偏移本身就是书签。

use crate::value::Regex;
use crate::{BsonError, BsonResult};
use logos::Logos;
use std::fmt;
use std::ops::Range;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum JsonToken {
    #[token("{")]
    BeginObject,
    #[token("}")]
    EndObject,
    #[token("[")]
    BeginArray,
    #[token("]")]
    EndArray,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unquote(lex.slice()))]
    String(String),

    /// 未加引号的键名或构造函数名
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    UnquotedString(String),

    /// 不含小数点和指数的数字;超出 i64 的整数由 [`JsonScanner`] 改读为浮点数
    #[regex(r"-?(0|[1-9][0-9]*)", |lex| lex.slice().parse::<i64>().ok())]
    Integer(i64),

    #[regex(
        r"-?(0|[1-9][0-9]*)(\.[0-9]+([eE][+-]?[0-9]+)?|[eE][+-]?[0-9]+)",
        |lex| lex.slice().parse::<f64>().ok()
    )]
    #[token("-Infinity", |_| f64::NEG_INFINITY)]
    FloatingPoint(f64),

    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Boolean(bool),

    #[token("null")]
    Null,

    #[regex(r"/([^/\\\n]|\\.)*/[a-z]*", |lex| parse_regex_literal(lex.slice()))]
    RegularExpression(Regex),

    /// 输入结束,由 [`JsonScanner`] 产生
    EndOfFile,
}

impl fmt::Display for JsonToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonToken::BeginObject => f.write_str("{"),
            JsonToken::EndObject => f.write_str("}"),
            JsonToken::BeginArray => f.write_str("["),
            JsonToken::EndArray => f.write_str("]"),
            JsonToken::LeftParen => f.write_str("("),
            JsonToken::RightParen => f.write_str(")"),
            JsonToken::Colon => f.write_str(":"),
            JsonToken::Comma => f.write_str(","),
            JsonToken::String(s) => write!(f, "\"{}\"", s),
            JsonToken::UnquotedString(s) => f.write_str(s),
            JsonToken::Integer(n) => write!(f, "{}", n),
            JsonToken::FloatingPoint(n) => write!(f, "{}", n),
            JsonToken::Boolean(b) => write!(f, "{}", b),
            JsonToken::Null => f.write_str("null"),
            JsonToken::RegularExpression(r) => write!(f, "/{}/{}", r.pattern, r.options),
            JsonToken::EndOfFile => f.write_str("<EOF>"),
        }
    }
}

/// 去掉引号并处理转义
fn unquote(slice: &str) -> Option<String> {
    unescape(&slice[1..slice.len() - 1])
}

/// 处理 `\" \' \\ \/ \b \f \n \r \t \uXXXX`,支持代理对
fn unescape(body: &str) -> Option<String> {
    if !body.contains('\\') {
        return Some(body.to_string());
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let high = read_hex4(&mut chars)?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    if chars.next()? != '\\' || chars.next()? != 'u' {
                        return None;
                    }
                    let low = read_hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return None;
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let mut value = 0;
    for _ in 0..4 {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

/// 拆分 `/pattern/flags`
///
/// 模式中的 `\/` 还原为 `/`,`(?:)` 还原为空模式,其余转义原样保留
fn parse_regex_literal(slice: &str) -> Option<Regex> {
    let close = slice.rfind('/')?;
    let raw = &slice[1..close];
    let options = &slice[close + 1..];
    let pattern = if raw == "(?:)" {
        String::new()
    } else {
        raw.replace("\\/", "/")
    };
    Some(Regex::new(pattern, options))
}

/// 带源码区间的词法单元
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: JsonToken,
    pub span: Range<usize>,
}

/// 按需切分的 JSON 词法器
#[derive(Debug, Clone)]
pub struct JsonScanner {
    source: String,
    position: usize,
}

impl JsonScanner {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            position: 0,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    /// 读取下一个词法单元
    ///
    /// # Returns
    /// 输入耗尽时返回 `JsonToken::EndOfFile`,区间为空
    pub fn next_token(&mut self) -> BsonResult<SpannedToken> {
        let rest = &self.source[self.position..];
        let mut lexer = JsonToken::lexer(rest);
        let base = self.position;
        match lexer.next() {
            None => {
                let end = self.source.len();
                self.position = end;
                Ok(SpannedToken {
                    token: JsonToken::EndOfFile,
                    span: end..end,
                })
            }
            Some(Ok(token)) => {
                let span = lexer.span();
                self.position = base + span.end;
                Ok(SpannedToken {
                    token,
                    span: base + span.start..base + span.end,
                })
            }
            Some(Err(())) => {
                let span = lexer.span();
                if let Some(value) = overflowed_integer(lexer.slice()) {
                    self.position = base + span.end;
                    return Ok(SpannedToken {
                        token: JsonToken::FloatingPoint(value),
                        span: base + span.start..base + span.end,
                    });
                }
                Err(self.error_at(
                    base + span.start,
                    format!("Invalid JSON token '{}'", lexer.slice()),
                ))
            }
        }
    }

    /// 按字符偏移计算从 1 开始的行列号
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.source.len());
        let before = &self.source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }

    pub fn error_at(&self, offset: usize, message: impl Into<String>) -> BsonError {
        let (line, column) = self.line_column(offset);
        BsonError::Json {
            message: message.into(),
            line,
            column,
        }
    }
}

/// 整数字面量溢出 i64 时按双精度读取
fn overflowed_integer(slice: &str) -> Option<f64> {
    let digits = slice.strip_prefix('-').unwrap_or(slice);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    slice.parse::<f64>().ok()
}
