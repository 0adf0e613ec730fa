//! Reads the header of a Go source file: leading line comments, the package
//! clause and the import declarations that follow it. Scanning stops at the
//! first token that is not part of an import declaration, so function bodies
//! are never looked at.

use super::constraint::Constraints;

/// What a file header declares.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileHeader {
    pub package: String,
    pub imports: Vec<String>,
    pub binary_only: bool,
}

/// Header plus the build constraints found above the package clause.
#[derive(Debug, Default)]
pub struct Scanned {
    pub constraints: Constraints,
    pub header: FileHeader,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Semi,
    Dot,
    Other(char),
    Eof,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        // A leading byte-order mark is not part of the source.
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Skips whitespace and comments, passing each line comment's text
    /// (after `//`) to `on_comment`.
    fn skip_trivia(&mut self, on_comment: &mut dyn FnMut(&str)) -> Result<(), String> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if let Some(body) = trimmed.strip_prefix("//") {
                let end = body.find('\n').unwrap_or(body.len());
                on_comment(body[..end].trim_end_matches('\r'));
                self.pos += 2 + end;
            } else if let Some(body) = trimmed.strip_prefix("/*") {
                let end = body.find("*/").ok_or("comment not terminated")?;
                self.pos += 2 + end + 2;
            } else {
                return Ok(());
            }
        }
    }

    fn next(&mut self, on_comment: &mut dyn FnMut(&str)) -> Result<Token, String> {
        self.skip_trivia(on_comment)?;
        let rest = self.rest();
        let Some(c) = rest.chars().next() else {
            return Ok(Token::Eof);
        };
        match c {
            '(' => {
                self.pos += 1;
                Ok(Token::LParen)
            }
            ')' => {
                self.pos += 1;
                Ok(Token::RParen)
            }
            ';' => {
                self.pos += 1;
                Ok(Token::Semi)
            }
            '.' => {
                self.pos += 1;
                Ok(Token::Dot)
            }
            '"' => self.interpreted_string(),
            '`' => {
                let body = &rest[1..];
                let end = body.find('`').ok_or("raw string literal not terminated")?;
                self.pos += 1 + end + 1;
                Ok(Token::Str(body[..end].replace('\r', "")))
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = rest
                    .char_indices()
                    .find(|&(_, d)| !(d.is_alphanumeric() || d == '_'))
                    .map(|(i, _)| i)
                    .unwrap_or(rest.len());
                self.pos += end;
                Ok(Token::Ident(rest[..end].to_string()))
            }
            other => {
                self.pos += other.len_utf8();
                Ok(Token::Other(other))
            }
        }
    }

    fn interpreted_string(&mut self) -> Result<Token, String> {
        let mut chars = self.rest().char_indices().skip(1);
        let mut value = String::new();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(Token::Str(value));
                }
                '\n' => break,
                '\\' => {
                    let (_, esc) = chars.next().ok_or("string literal not terminated")?;
                    value.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        other => return Err(format!("unsupported escape sequence \\{other}")),
                    });
                }
                c => value.push(c),
            }
        }
        Err("string literal not terminated".to_string())
    }
}

/// Scans a whole header. Constraints are collected from line comments seen
/// before the package clause; `binary_only` is set by a
/// `//go:binary-only-package` comment in the same region.
pub fn scan_file(src: &str) -> Result<Scanned, String> {
    let mut lexer = Lexer::new(src);
    let mut constraints = Constraints::default();
    let mut binary_only = false;

    let first = lexer.next(&mut |comment: &str| {
        if comment.trim_end() == "go:binary-only-package" {
            binary_only = true;
        }
        constraints.observe(comment);
    })?;
    if first != Token::Ident("package".to_string()) {
        return Err("expected 'package' clause".to_string());
    }

    let mut ignore = |_: &str| {};
    let package = match lexer.next(&mut ignore)? {
        Token::Ident(name) => name,
        _ => return Err("expected package name".to_string()),
    };

    let mut imports = Vec::new();
    let mut tok = lexer.next(&mut ignore)?;
    loop {
        match tok {
            Token::Semi => {}
            Token::Ident(ref kw) if kw == "import" => match lexer.next(&mut ignore)? {
                Token::LParen => loop {
                    match lexer.next(&mut ignore)? {
                        Token::RParen => break,
                        Token::Semi => {}
                        other => imports.push(import_spec(other, &mut lexer)?),
                    }
                },
                other => imports.push(import_spec(other, &mut lexer)?),
            },
            _ => break,
        }
        tok = lexer.next(&mut ignore)?;
    }

    Ok(Scanned {
        constraints,
        header: FileHeader {
            package,
            imports,
            binary_only,
        },
    })
}

/// Parses one `[name] "path"` spec whose first token is `first`.
fn import_spec(first: Token, lexer: &mut Lexer<'_>) -> Result<String, String> {
    let path_tok = match first {
        Token::Ident(_) | Token::Dot => lexer.next(&mut |_: &str| {})?,
        other => other,
    };
    match path_tok {
        Token::Str(path) if !path.is_empty() => Ok(path),
        Token::Str(_) => Err("empty import path".to_string()),
        Token::Eof => Err("unexpected end of file in import declaration".to_string()),
        other => Err(format!("expected import path, found {other:?}")),
    }
}
