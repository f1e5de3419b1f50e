//! TeX math to Unicode typesetter
//!
//! Renders the subset of TeX math that paragraph authors actually use into
//! plain Unicode text: Greek letters and operators from the symbol table,
//! super/subscripts, fractions, roots, `\text`, `\mathbb`, delimiters and
//! environments flattened to lines.
//!
//! Like a browser-side TeX engine it keeps state between calls: labels seen
//! so far and the running equation number. A label defined twice is an error
//! until [`TypesetEngine::reset`] forgets them.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::symbols::{SymbolClass, SymbolTable};
use super::{EngineFuture, RenderError, SurfaceId, TypesetEngine, TypesetOutput};

/// Rendering options
#[derive(Debug, Clone, Copy, Default)]
pub struct TexOptions {
    /// Number display equations that have no explicit tag
    pub number_equations: bool,
}

/// Unicode TeX engine
pub struct TexEngine {
    symbols: SymbolTable,
    options: TexOptions,
    state: Mutex<TexState>,
}

#[derive(Debug, Default)]
struct TexState {
    equation_counter: u32,
    labels: HashSet<String>,
    surfaces: HashMap<SurfaceId, TypesetOutput>,
}

impl TexEngine {
    pub fn new(symbols: SymbolTable, options: TexOptions) -> Self {
        Self {
            symbols,
            options,
            state: Mutex::new(TexState::default()),
        }
    }

    /// Render a source, updating label and numbering state
    pub fn render(&self, source: &str) -> Result<TypesetOutput, RenderError> {
        let (body, display) = strip_delimiters(source);

        let mut parser = Parser::new(body, &self.symbols);
        let text = parser.parse()?;

        let mut state = self
            .state
            .lock()
            .map_err(|_| RenderError::Engine("engine state poisoned".to_string()))?;

        if let Some(label) = parser.labels.iter().find(|l| state.labels.contains(*l)) {
            return Err(RenderError::DuplicateLabel(label.clone()));
        }

        let numbered = display
            && !parser.no_number
            && (self.options.number_equations || !parser.labels.is_empty());
        let tag = match parser.tag.take() {
            Some(tag) => Some(tag),
            None if numbered => {
                state.equation_counter += 1;
                Some(state.equation_counter.to_string())
            }
            None => None,
        };
        state.labels.extend(parser.labels);

        Ok(TypesetOutput {
            text: tidy(&text),
            tag,
        })
    }

    /// What was last typeset onto a surface
    pub fn surface(&self, surface: SurfaceId) -> Option<TypesetOutput> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.surfaces.get(&surface).cloned())
    }

    pub fn equation_counter(&self) -> u32 {
        self.state.lock().map(|s| s.equation_counter).unwrap_or(0)
    }
}

impl TypesetEngine for TexEngine {
    fn typeset<'a>(
        &'a self,
        surface: SurfaceId,
        source: &'a str,
    ) -> EngineFuture<'a, Result<TypesetOutput, RenderError>> {
        Box::pin(async move {
            let output = self.render(source)?;
            if let Ok(mut state) = self.state.lock() {
                state.surfaces.insert(surface, output.clone());
            }
            Ok(output)
        })
    }

    fn clear(&self, surface: SurfaceId) {
        if let Ok(mut state) = self.state.lock() {
            state.surfaces.remove(&surface);
        }
    }

    fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.equation_counter = 0;
            state.labels.clear();
        }
    }
}

/// Math delimiter pairs, with whether each one is display style
const DELIMITERS: [(&str, &str, bool); 4] = [
    ("$$", "$$", true),
    ("\\[", "\\]", true),
    ("\\(", "\\)", false),
    ("$", "$", false),
];

/// Deepest group nesting the parser follows before giving up
const MAX_DEPTH: usize = 64;

/// Whether a source already carries its own math delimiters
pub fn is_delimited(source: &str) -> bool {
    delimited(source.trim()).is_some()
}

fn delimited(trimmed: &str) -> Option<(&str, bool)> {
    DELIMITERS.iter().find_map(|&(open, close, display)| {
        (trimmed.len() >= open.len() + close.len()
            && trimmed.starts_with(open)
            && trimmed.ends_with(close))
        .then(|| (&trimmed[open.len()..trimmed.len() - close.len()], display))
    })
}

/// Strip math delimiters, reporting whether the math is display style.
/// Undelimited sources are treated as display math.
fn strip_delimiters(source: &str) -> (&str, bool) {
    let trimmed = source.trim();
    delimited(trimmed).unwrap_or((trimmed, true))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Symbol(char),
    Open,
    Close,
    Sup,
    Sub,
    Space,
    Char(char),
}

impl Token {
    /// Source text of the token
    fn raw(&self) -> String {
        match self {
            Token::Word(w) => format!("\\{}", w),
            Token::Symbol(c) => format!("\\{}", c),
            Token::Open => "{".to_string(),
            Token::Close => "}".to_string(),
            Token::Sup => "^".to_string(),
            Token::Sub => "_".to_string(),
            Token::Space => " ".to_string(),
            Token::Char(c) => c.to_string(),
        }
    }
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek().copied() {
                Some(n) if n.is_ascii_alphabetic() => {
                    let mut word = String::new();
                    while let Some(&n) = chars.peek() {
                        if !n.is_ascii_alphabetic() {
                            break;
                        }
                        word.push(n);
                        chars.next();
                    }
                    tokens.push(Token::Word(word));
                }
                Some(n) => {
                    chars.next();
                    tokens.push(Token::Symbol(n));
                }
                None => tokens.push(Token::Word(String::new())),
            },
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            '^' => tokens.push(Token::Sup),
            '_' => tokens.push(Token::Sub),
            '%' => {
                // Comment to end of line
                for n in chars.by_ref() {
                    if n == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => tokens.push(Token::Space),
            c => tokens.push(Token::Char(c)),
        }
    }

    tokens
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    symbols: &'a SymbolTable,
    labels: Vec<String>,
    tag: Option<String>,
    no_number: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &str, symbols: &'a SymbolTable) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
            symbols,
            labels: Vec::new(),
            tag: None,
            no_number: false,
            depth: 0,
        }
    }

    fn parse(&mut self) -> Result<String, RenderError> {
        let out = self.parse_sequence()?;
        if self.pos < self.tokens.len() {
            return Err(RenderError::ExtraCloseBrace);
        }
        Ok(out)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(&Token::Space) {
            self.pos += 1;
        }
    }

    /// Parse until a close brace or the end, leaving the brace unconsumed
    fn parse_sequence(&mut self) -> Result<String, RenderError> {
        let mut out = String::new();
        while let Some(token) = self.peek() {
            if *token == Token::Close {
                break;
            }
            let piece = self.parse_item(&out)?;
            out.push_str(&piece);
        }
        Ok(out)
    }

    /// Parse the rest of a group whose open brace was consumed
    fn parse_group(&mut self) -> Result<String, RenderError> {
        let inner = self.parse_sequence()?;
        match self.next() {
            Some(Token::Close) => Ok(inner),
            _ => Err(RenderError::MissingCloseBrace),
        }
    }

    /// Every nested group or argument passes through here
    fn parse_item(&mut self, before: &str) -> Result<String, RenderError> {
        if self.depth >= MAX_DEPTH {
            return Err(RenderError::Engine("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        let item = self.parse_token(before);
        self.depth -= 1;
        item
    }

    fn parse_token(&mut self, before: &str) -> Result<String, RenderError> {
        let Some(token) = self.next() else {
            return Ok(String::new());
        };

        match token {
            Token::Open => self.parse_group(),
            Token::Close => Err(RenderError::ExtraCloseBrace),
            Token::Sup => {
                let arg = self.parse_argument("^")?;
                Ok(superscript(&arg))
            }
            Token::Sub => {
                let arg = self.parse_argument("_")?;
                Ok(subscript(&arg))
            }
            Token::Space => Ok(String::new()),
            Token::Char(c) => Ok(render_char(c, before)),
            Token::Symbol(c) => render_control_symbol(c),
            Token::Word(name) => self.parse_command(&name),
        }
    }

    /// A braced group or a single token
    fn parse_argument(&mut self, command: &str) -> Result<String, RenderError> {
        self.skip_spaces();
        match self.peek() {
            None | Some(Token::Close) => Err(RenderError::MissingArgument(command.to_string())),
            Some(Token::Open) => {
                self.pos += 1;
                self.parse_group()
            }
            Some(_) => self.parse_item(""),
        }
    }

    /// Braced argument taken as source text, without rendering
    fn raw_argument(&mut self, command: &str) -> Result<String, RenderError> {
        self.skip_spaces();
        if self.next() != Some(Token::Open) {
            return Err(RenderError::MissingArgument(command.to_string()));
        }

        let mut depth = 0usize;
        let mut out = String::new();
        loop {
            match self.next() {
                None => return Err(RenderError::MissingCloseBrace),
                Some(Token::Close) if depth == 0 => return Ok(out),
                Some(Token::Close) => {
                    depth -= 1;
                    out.push('}');
                }
                Some(Token::Open) => {
                    depth += 1;
                    out.push('{');
                }
                Some(token) => out.push_str(&token.raw()),
            }
        }
    }

    /// Optional `[...]` argument, rendered
    fn optional_argument(&mut self) -> Result<Option<String>, RenderError> {
        self.skip_spaces();
        if self.peek() != Some(&Token::Char('[')) {
            return Ok(None);
        }
        self.pos += 1;

        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(RenderError::MissingArgument("sqrt".to_string())),
                Some(Token::Char(']')) => {
                    self.pos += 1;
                    return Ok(Some(out));
                }
                Some(_) => {
                    let piece = self.parse_item(&out)?;
                    out.push_str(&piece);
                }
            }
        }
    }

    fn parse_command(&mut self, name: &str) -> Result<String, RenderError> {
        match name {
            "frac" | "dfrac" | "tfrac" => {
                let numerator = self.parse_argument(name)?;
                let denominator = self.parse_argument(name)?;
                Ok(format!("{}/{}", wrap(&numerator), wrap(&denominator)))
            }
            "sqrt" => {
                let index = self.optional_argument()?;
                let body = self.parse_argument(name)?;
                let root = match index.as_deref().map(str::trim) {
                    None | Some("") | Some("2") => "√".to_string(),
                    Some("3") => "∛".to_string(),
                    Some("4") => "∜".to_string(),
                    Some(other) => format!("{}√", superscript(other)),
                };
                Ok(format!("{}{}", root, wrap(&body)))
            }
            "text" | "textrm" | "textit" | "textbf" | "mbox" | "mathrm" | "mathit" | "mathbf"
            | "mathsf" | "mathtt" | "mathcal" | "operatorname" | "boldsymbol" => {
                self.raw_argument(name)
            }
            "mathbb" => {
                let letters = self.raw_argument(name)?;
                Ok(letters
                    .chars()
                    .map(|c| {
                        let key = c.to_string();
                        self.symbols
                            .blackboard(&key)
                            .map(str::to_string)
                            .unwrap_or(key)
                    })
                    .collect())
            }
            "hat" | "bar" | "overline" | "vec" | "dot" | "ddot" | "tilde" => {
                let base = self.parse_argument(name)?;
                let mark = match name {
                    "hat" => '\u{0302}',
                    "bar" | "overline" => '\u{0304}',
                    "vec" => '\u{20D7}',
                    "dot" => '\u{0307}',
                    "ddot" => '\u{0308}',
                    _ => '\u{0303}',
                };
                Ok(format!("{}{}", base, mark))
            }
            "label" => {
                let label = self.raw_argument(name)?;
                if self.labels.contains(&label) {
                    return Err(RenderError::DuplicateLabel(label));
                }
                self.labels.push(label);
                Ok(String::new())
            }
            "tag" => {
                self.tag = Some(self.raw_argument(name)?);
                Ok(String::new())
            }
            "notag" | "nonumber" => {
                self.no_number = true;
                Ok(String::new())
            }
            "begin" | "end" => {
                self.raw_argument(name)?;
                Ok(String::new())
            }
            "left" | "right" | "big" | "Big" | "bigg" | "Bigg" | "bigl" | "bigr" | "Bigl"
            | "Bigr" => self.delimiter(name),
            "quad" | "qquad" => Ok(" ".to_string()),
            "displaystyle" | "textstyle" | "limits" | "nolimits" => Ok(String::new()),
            _ => self.symbol(name),
        }
    }

    fn delimiter(&mut self, command: &str) -> Result<String, RenderError> {
        self.skip_spaces();
        match self.next() {
            Some(Token::Char('.')) => Ok(String::new()),
            Some(Token::Char(c)) => Ok(c.to_string()),
            Some(Token::Symbol('{')) => Ok("{".to_string()),
            Some(Token::Symbol('}')) => Ok("}".to_string()),
            Some(Token::Symbol('|')) => Ok("‖".to_string()),
            Some(Token::Word(word)) => self.symbol(&word),
            _ => Err(RenderError::MissingArgument(command.to_string())),
        }
    }

    fn symbol(&mut self, name: &str) -> Result<String, RenderError> {
        let Some((class, text)) = self.symbols.lookup(name) else {
            return Err(RenderError::UndefinedControlSequence(name.to_string()));
        };

        Ok(match class {
            SymbolClass::Ordinary | SymbolClass::LargeOperator => text.to_string(),
            SymbolClass::Binary | SymbolClass::Relation => format!(" {} ", text),
            SymbolClass::Function => {
                let text = text.to_string();
                self.skip_spaces();
                // `\sin(x)` stays tight, `\sin x` gets a space
                match self.peek() {
                    Some(Token::Char('(')) | Some(Token::Sup) | Some(Token::Sub) | None => text,
                    _ => format!("{} ", text),
                }
            }
        })
    }
}

fn render_char(c: char, before: &str) -> String {
    // Signs directly after an opening or another operator are unary
    let unary = matches!(
        before.trim_end().chars().last(),
        None | Some('(' | '[' | '{' | '=' | ',' | '+' | '−' | '<' | '>')
    );

    match c {
        '+' if unary => "+".to_string(),
        '-' if unary => "−".to_string(),
        '+' => " + ".to_string(),
        '-' => " − ".to_string(),
        '=' | '<' | '>' => format!(" {} ", c),
        '*' => "∗".to_string(),
        '\'' => "′".to_string(),
        ',' => ", ".to_string(),
        '&' | '~' => " ".to_string(),
        c => c.to_string(),
    }
}

fn render_control_symbol(c: char) -> Result<String, RenderError> {
    match c {
        ',' | ':' | ';' | ' ' => Ok(" ".to_string()),
        '!' => Ok(String::new()),
        '\\' => Ok("\n".to_string()),
        '|' => Ok("‖".to_string()),
        '{' | '}' | '%' | '$' | '&' | '#' | '_' => Ok(c.to_string()),
        c => Err(RenderError::UndefinedControlSequence(c.to_string())),
    }
}

/// Parenthesise anything that is not a single name or number
fn wrap(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() <= 1 || s.chars().all(char::is_alphanumeric) {
        s.to_string()
    } else {
        format!("({})", s)
    }
}

fn superscript(arg: &str) -> String {
    let compact: String = arg.chars().filter(|c| !c.is_whitespace()).collect();
    if compact == "′" || compact == "′′" {
        return compact;
    }
    match compact.chars().map(superscript_char).collect::<Option<String>>() {
        Some(s) if !s.is_empty() => s,
        _ => format!("^{}", wrap(&compact)),
    }
}

fn subscript(arg: &str) -> String {
    let compact: String = arg.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.chars().map(subscript_char).collect::<Option<String>>() {
        Some(s) if !s.is_empty() => s,
        _ => format!("_{}", wrap(&compact)),
    }
}

fn superscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' | '−' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'a' => 'ᵃ',
        'b' => 'ᵇ',
        'c' => 'ᶜ',
        'd' => 'ᵈ',
        'e' => 'ᵉ',
        'f' => 'ᶠ',
        'g' => 'ᵍ',
        'h' => 'ʰ',
        'i' => 'ⁱ',
        'j' => 'ʲ',
        'k' => 'ᵏ',
        'l' => 'ˡ',
        'm' => 'ᵐ',
        'n' => 'ⁿ',
        'o' => 'ᵒ',
        'p' => 'ᵖ',
        'r' => 'ʳ',
        's' => 'ˢ',
        't' => 'ᵗ',
        'u' => 'ᵘ',
        'v' => 'ᵛ',
        'w' => 'ʷ',
        'x' => 'ˣ',
        'y' => 'ʸ',
        'z' => 'ᶻ',
        'T' => 'ᵀ',
        _ => return None,
    })
}

fn subscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' | '−' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        'a' => 'ₐ',
        'e' => 'ₑ',
        'h' => 'ₕ',
        'i' => 'ᵢ',
        'j' => 'ⱼ',
        'k' => 'ₖ',
        'l' => 'ₗ',
        'm' => 'ₘ',
        'n' => 'ₙ',
        'o' => 'ₒ',
        'p' => 'ₚ',
        'r' => 'ᵣ',
        's' => 'ₛ',
        't' => 'ₜ',
        'u' => 'ᵤ',
        'v' => 'ᵥ',
        'x' => 'ₓ',
        _ => return None,
    })
}

/// Collapse runs of spaces and trim every line
fn tidy(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::symbols::BUNDLED_TABLE;

    fn engine(number_equations: bool) -> TexEngine {
        TexEngine::new(
            SymbolTable::parse(BUNDLED_TABLE).unwrap(),
            TexOptions { number_equations },
        )
    }

    fn render(source: &str) -> String {
        engine(false).render(source).unwrap().text
    }

    #[test]
    fn test_scripts() {
        assert_eq!(render("$$x^2$$"), "x²");
        assert_eq!(render("a_{ij}"), "aᵢⱼ");
        assert_eq!(render("e^{-x}"), "e⁻ˣ");
        assert_eq!(render("x^{\\alpha}"), "x^α");
        assert_eq!(render("\\sum_{i=1}^{n}"), "∑ᵢ₌₁ⁿ");
    }

    #[test]
    fn test_fractions_and_roots() {
        assert_eq!(render("\\frac{a}{b} + c^2"), "a/b + c²");
        assert_eq!(render("\\frac{x+1}{2}"), "(x + 1)/2");
        assert_eq!(render("\\sqrt{x+1}"), "√(x + 1)");
        assert_eq!(render("\\sqrt[3]{8}"), "∛8");
    }

    #[test]
    fn test_symbols_and_text() {
        assert_eq!(render("\\alpha \\leq \\beta"), "α ≤ β");
        assert_eq!(render("x \\in \\mathbb{R}"), "x ∈ ℝ");
        assert_eq!(render("\\text{if } x > 0"), "if x > 0");
        assert_eq!(render("\\sin(x)"), "sin(x)");
        assert_eq!(render("\\left( -1 \\right)"), "(−1)");
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(
            render("\\begin{aligned} a &= b \\\\ c &= d \\end{aligned}"),
            "a = b\nc = d"
        );
    }

    #[test]
    fn test_errors() {
        let engine = engine(false);
        assert_eq!(
            engine.render("\\foo"),
            Err(RenderError::UndefinedControlSequence("foo".to_string()))
        );
        assert_eq!(engine.render("{x"), Err(RenderError::MissingCloseBrace));
        assert_eq!(engine.render("x}"), Err(RenderError::ExtraCloseBrace));
        assert_eq!(
            engine.render("\\frac{a}"),
            Err(RenderError::MissingArgument("frac".to_string()))
        );
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let engine = engine(false);
        let too_deep = RenderError::Engine("expression nested too deeply".to_string());
        assert_eq!(engine.render(&"{".repeat(100_000)), Err(too_deep.clone()));
        assert_eq!(engine.render(&"^".repeat(100_000)), Err(too_deep.clone()));
        assert_eq!(
            engine.render(&"\\frac{".repeat(10_000)),
            Err(too_deep)
        );

        // Ordinary nesting still renders
        let nested = format!("{}x{}", "{".repeat(20), "}".repeat(20));
        assert_eq!(engine.render(&nested).unwrap().text, "x");
    }

    #[test]
    fn test_delimiter_detection() {
        assert!(is_delimited("$$x$$"));
        assert!(is_delimited("  \\[ x \\] "));
        assert!(is_delimited("$x$"));
        assert!(!is_delimited("x^2"));
        assert!(!is_delimited("$"));
    }

    #[test]
    fn test_labels_accumulate_until_reset() {
        let engine = engine(false);
        let first = engine.render("x = 1 \\label{eq:one}").unwrap();
        assert_eq!(first.tag.as_deref(), Some("1"));

        assert_eq!(
            engine.render("x = 1 \\label{eq:one}"),
            Err(RenderError::DuplicateLabel("eq:one".to_string()))
        );

        engine.reset();
        assert!(engine.render("x = 1 \\label{eq:one}").is_ok());
    }

    #[test]
    fn test_equation_numbers() {
        let engine = engine(true);
        assert_eq!(engine.render("$$a$$").unwrap().tag.as_deref(), Some("1"));
        assert_eq!(engine.render("$$b$$").unwrap().tag.as_deref(), Some("2"));
        assert_eq!(engine.render("$c$").unwrap().tag, None);
        assert_eq!(engine.render("$$d \\tag{A}$$").unwrap().tag.as_deref(), Some("A"));
        assert_eq!(engine.render("$$e \\notag$$").unwrap().tag, None);
        assert_eq!(engine.equation_counter(), 2);

        engine.reset();
        assert_eq!(engine.render("$$a$$").unwrap().tag.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_surfaces() {
        let engine = engine(false);
        let surface = SurfaceId::next();

        let output = engine.typeset(surface, "$$x^2$$").await.unwrap();
        assert_eq!(engine.surface(surface), Some(output));

        engine.clear(surface);
        assert_eq!(engine.surface(surface), None);
    }
}
