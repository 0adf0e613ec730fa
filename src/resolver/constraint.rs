//! Build constraint evaluation.
//!
//! Handles both spellings a Go file can carry above its package clause:
//! - `//go:build linux && (amd64 || arm64)` expressions
//! - legacy `// +build linux,amd64 darwin` lines (space = OR, comma = AND)
//!
//! When a `//go:build` line is present the legacy lines are ignored.
//! File-name suffixes (`_linux.go`, `_windows_amd64.go`) are matched by
//! [`matches_file_name`].

use std::collections::HashSet;

/// Operating systems recognised in file-name suffixes and tags.
pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

/// Architectures recognised in file-name suffixes and tags.
pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Highest `go1.N` release tag treated as satisfied.
pub const GO_MINOR_RELEASE: u32 = 22;

/// The set of tags a file's constraints are evaluated against.
#[derive(Debug, Clone)]
pub struct TagSet {
    goos: String,
    goarch: String,
    tags: HashSet<String>,
}

impl TagSet {
    /// Tags for `goos`/`goarch`, plus `cgo` when `cgo` is enabled.
    pub fn new(goos: &str, goarch: &str, cgo: bool, extra: &[String]) -> Self {
        let mut tags: HashSet<String> = extra.iter().cloned().collect();
        tags.insert(goos.to_string());
        tags.insert(goarch.to_string());
        tags.insert("gc".to_string());
        if cgo {
            tags.insert("cgo".to_string());
        }
        if UNIX_OS.contains(&goos) {
            tags.insert("unix".to_string());
        }
        // Derived operating systems also satisfy their parent's tag.
        match goos {
            "android" => {
                tags.insert("linux".to_string());
            }
            "illumos" => {
                tags.insert("solaris".to_string());
            }
            "ios" => {
                tags.insert("darwin".to_string());
            }
            _ => {}
        }
        Self {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
            tags,
        }
    }

    pub fn matches(&self, tag: &str) -> bool {
        if self.tags.contains(tag) {
            return true;
        }
        match tag.strip_prefix("go1.") {
            Some(minor) => minor
                .parse::<u32>()
                .map(|n| n <= GO_MINOR_RELEASE)
                .unwrap_or(false),
            None => false,
        }
    }

    fn os_matches(&self, os: &str) -> bool {
        self.goos == os
            || (os == "linux" && self.goos == "android")
            || (os == "solaris" && self.goos == "illumos")
            || (os == "darwin" && self.goos == "ios")
    }
}

/// Reports whether a file name's `_GOOS`/`_GOARCH` suffixes admit the target.
pub fn matches_file_name(name: &str, tags: &TagSet) -> bool {
    let stem = name.strip_suffix(".go").unwrap_or(name);
    let stem = stem.strip_suffix("_test").unwrap_or(stem);
    let Some(idx) = stem.find('_') else {
        return true;
    };
    let parts: Vec<&str> = stem[idx..].split('_').collect();
    let n = parts.len();
    if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
        return tags.os_matches(parts[n - 2]) && tags.goarch == parts[n - 1];
    }
    if n >= 1 {
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) {
            return tags.os_matches(last);
        }
        if KNOWN_ARCH.contains(&last) {
            return tags.goarch == last;
        }
    }
    true
}

/// Build constraint lines collected from a file header.
#[derive(Debug, Default, Clone)]
pub struct Constraints {
    go_build: Option<String>,
    plus_build: Vec<String>,
}

impl Constraints {
    /// Records a line comment's text (without the leading `//`) if it is a
    /// constraint.
    pub fn observe(&mut self, comment: &str) {
        if let Some(expr) = comment.strip_prefix("go:build") {
            if expr.is_empty() || expr.starts_with(char::is_whitespace) {
                self.go_build.get_or_insert_with(|| expr.trim().to_string());
            }
            return;
        }
        if let Some(expr) = comment.trim_start().strip_prefix("+build") {
            if expr.is_empty() || expr.starts_with(char::is_whitespace) {
                self.plus_build.push(expr.trim().to_string());
            }
        }
    }

    /// Evaluates the recorded constraints. A malformed `//go:build`
    /// expression is reported as an error message.
    pub fn eval(&self, tags: &TagSet) -> Result<bool, String> {
        if let Some(expr) = &self.go_build {
            return Ok(parse_expr(expr)?.eval(tags));
        }
        Ok(self.plus_build.iter().all(|line| eval_plus_build(line, tags)))
    }
}

fn eval_plus_build(line: &str, tags: &TagSet) -> bool {
    line.split_whitespace().any(|alt| {
        alt.split(',').all(|term| match term.strip_prefix('!') {
            Some(tag) => !tags.matches(tag),
            None => tags.matches(term),
        })
    })
}

#[derive(Debug, PartialEq)]
enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, tags: &TagSet) -> bool {
        match self {
            Expr::Tag(t) => tags.matches(t),
            Expr::Not(e) => !e.eval(tags),
            Expr::And(a, b) => a.eval(tags) && b.eval(tags),
            Expr::Or(a, b) => a.eval(tags) || b.eval(tags),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Tag(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Tok>, String> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();
    while let Some(&(i, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '!' => {
                chars.next();
                out.push(Tok::Not);
            }
            '(' => {
                chars.next();
                out.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                out.push(Tok::RParen);
            }
            '&' | '|' => {
                chars.next();
                match chars.next() {
                    Some((_, d)) if d == c => out.push(if c == '&' { Tok::And } else { Tok::Or }),
                    _ => return Err(format!("unexpected {c:?} in build constraint")),
                }
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut end = i;
                while let Some(&(j, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '.' {
                        end = j + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push(Tok::Tag(src[i..end].to_string()));
            }
            other => return Err(format!("unexpected {other:?} in build constraint")),
        }
    }
    Ok(out)
}

fn parse_expr(src: &str) -> Result<Expr, String> {
    let toks = tokenize(src)?;
    let mut parser = ExprParser { toks, pos: 0 };
    let expr = parser.or()?;
    if parser.pos != parser.toks.len() {
        return Err(format!("unexpected token in build constraint: {src}"));
    }
    Ok(expr)
}

struct ExprParser {
    toks: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Tok::Or) {
            self.pos += 1;
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.not()?;
        while self.peek() == Some(&Tok::And) {
            self.pos += 1;
            lhs = Expr::And(Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Tok::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.toks.get(self.pos).cloned() {
            Some(Tok::Tag(t)) => {
                self.pos += 1;
                Ok(Expr::Tag(t))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.or()?;
                if self.peek() != Some(&Tok::RParen) {
                    return Err("missing ) in build constraint".to_string());
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err("missing tag in build constraint".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_amd64() -> TagSet {
        TagSet::new("linux", "amd64", true, &[])
    }

    fn eval(line: &str) -> bool {
        let mut c = Constraints::default();
        c.observe(line);
        c.eval(&linux_amd64()).unwrap()
    }

    #[test]
    fn test_go_build_expressions() {
        assert!(eval("go:build linux"));
        assert!(!eval("go:build windows"));
        assert!(eval("go:build linux && (amd64 || arm64)"));
        assert!(!eval("go:build !unix"));
        assert!(!eval("go:build ignore"));
        assert!(eval("go:build go1.18 && gc"));
        assert!(!eval("go:build go1.99"));
    }

    #[test]
    fn test_go_build_takes_precedence_over_plus_build() {
        let mut c = Constraints::default();
        c.observe(" +build windows");
        c.observe("go:build linux");
        assert!(c.eval(&linux_amd64()).unwrap());
    }

    #[test]
    fn test_plus_build_lines() {
        assert!(eval(" +build darwin linux"));
        assert!(!eval(" +build linux,arm64"));
        assert!(eval(" +build !windows"));
        assert!(!eval(" +build ignore"));

        let mut c = Constraints::default();
        c.observe(" +build linux");
        c.observe(" +build arm64");
        assert!(!c.eval(&linux_amd64()).unwrap());
    }

    #[test]
    fn test_non_constraint_comments_are_ignored() {
        assert!(eval(" go:buildfoo"));
        assert!(eval(" +builder says hi"));
        assert!(eval(" just a comment"));
    }

    #[test]
    fn test_malformed_expression() {
        let mut c = Constraints::default();
        c.observe("go:build linux &&");
        assert!(c.eval(&linux_amd64()).is_err());

        let mut c = Constraints::default();
        c.observe("go:build (linux");
        assert!(c.eval(&linux_amd64()).is_err());
    }

    #[test]
    fn test_file_name_suffixes() {
        let tags = linux_amd64();
        assert!(matches_file_name("main.go", &tags));
        assert!(matches_file_name("linux.go", &tags));
        assert!(matches_file_name("sys_linux.go", &tags));
        assert!(!matches_file_name("sys_windows.go", &tags));
        assert!(matches_file_name("sys_linux_amd64.go", &tags));
        assert!(!matches_file_name("sys_linux_arm64.go", &tags));
        assert!(!matches_file_name("asm_arm64.go", &tags));
        assert!(matches_file_name("some_helper.go", &tags));
    }

    #[test]
    fn test_derived_os_tags() {
        let tags = TagSet::new("android", "arm64", true, &[]);
        assert!(tags.matches("linux"));
        assert!(tags.matches("unix"));
        assert!(matches_file_name("x_linux.go", &tags));
    }

    #[test]
    fn test_cgo_tag_follows_flag() {
        let on = TagSet::new("linux", "amd64", true, &[]);
        let off = TagSet::new("linux", "amd64", false, &[]);
        assert!(on.matches("cgo"));
        assert!(!off.matches("cgo"));

        let mut c = Constraints::default();
        c.observe("go:build !cgo");
        assert!(!c.eval(&on).unwrap());
        assert!(c.eval(&off).unwrap());
    }

    #[test]
    fn test_custom_tags() {
        let tags = TagSet::new("linux", "amd64", true, &["integration".to_string()]);
        let mut c = Constraints::default();
        c.observe("go:build integration");
        assert!(c.eval(&tags).unwrap());
    }
}
