//! Style blocks: structured selectors and the style compiler
//!
//! Selectors are parsed once, when the `style { }` block is parsed, into a
//! [`SelectorList`] so later consumers can match structurally. At runtime
//! the interpreter binds every declaration's `{expr}` interpolations and
//! hands the bound rules to [`StyleCompiler`].

use std::fmt;

use crate::runtime::Value;

/// `a, b > c` - one or more comma-separated complex selectors
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorList(pub Vec<ComplexSelector>);

/// Compound selectors joined by combinators, left to right
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComplexSelector {
    pub head: CompoundSelector,
    pub tail: Vec<(Combinator, CompoundSelector)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// whitespace
    Descendant,
    /// `>`
    Child,
    /// `+`
    Adjacent,
    /// `~`
    Sibling,
}

/// `div#main.card.wide:hover`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CompoundSelector {
    pub universal: bool,
    pub tag: Option<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    /// Pseudo-classes and pseudo-elements, with their leading colons
    pub pseudo: Vec<String>,
}

impl CompoundSelector {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.ids.is_empty()
            && self.classes.is_empty()
            && self.pseudo.is_empty()
    }
}

impl SelectorList {
    /// Parse the raw selector text of a style rule
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut selectors = Vec::new();
        for part in split_top_level(text, ',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(format!("Empty selector in '{}'", text.trim()));
            }
            selectors.push(SelectorParser::new(part).complex()?);
        }
        Ok(SelectorList(selectors))
    }

    /// Every compound selector in the list, in source order
    pub fn compounds(&self) -> impl Iterator<Item = &CompoundSelector> {
        self.0
            .iter()
            .flat_map(|c| std::iter::once(&c.head).chain(c.tail.iter().map(|(_, s)| s)))
    }
}

struct SelectorParser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> SelectorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            source,
        }
    }

    fn complex(&mut self) -> Result<ComplexSelector, String> {
        let head = self.compound()?;
        let mut tail = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            if self.pos >= self.chars.len() {
                break;
            }
            let combinator = match self.chars[self.pos] {
                '>' => Combinator::Child,
                '+' => Combinator::Adjacent,
                '~' => Combinator::Sibling,
                _ if had_space => Combinator::Descendant,
                c => return Err(format!("Unexpected '{}' in selector '{}'", c, self.source)),
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_whitespace();
            }
            tail.push((combinator, self.compound()?));
        }

        Ok(ComplexSelector { head, tail })
    }

    fn compound(&mut self) -> Result<CompoundSelector, String> {
        let mut compound = CompoundSelector::default();

        if self.peek() == Some('*') {
            self.pos += 1;
            compound.universal = true;
        } else if self.peek().is_some_and(is_name_start) {
            compound.tag = Some(self.name());
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.required_name('#')?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.required_name('.')?);
                }
                Some(':') => {
                    let start = self.pos;
                    self.pos += 1;
                    if self.peek() == Some(':') {
                        self.pos += 1;
                    }
                    self.required_name(':')?;
                    if self.peek() == Some('(') {
                        let mut depth = 0;
                        while let Some(c) = self.peek() {
                            self.pos += 1;
                            match c {
                                '(' => depth += 1,
                                ')' => {
                                    depth -= 1;
                                    if depth == 0 {
                                        break;
                                    }
                                }
                                _ => {}
                            }
                        }
                        if depth != 0 {
                            return Err(format!("Unclosed '(' in selector '{}'", self.source));
                        }
                    }
                    compound.pseudo.push(self.chars[start..self.pos].iter().collect());
                }
                _ => break,
            }
        }

        if compound.is_empty() {
            return match self.peek() {
                Some(c) => Err(format!("Unexpected '{}' in selector '{}'", c, self.source)),
                None => Err(format!("Incomplete selector '{}'", self.source)),
            };
        }
        Ok(compound)
    }

    fn required_name(&mut self, after: char) -> Result<String, String> {
        if self.peek().is_some_and(is_name_start) {
            Ok(self.name())
        } else {
            Err(format!("Expected a name after '{}' in selector '{}'", after, self.source))
        }
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-'
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::Descendant => write!(f, " "),
            Combinator::Child => write!(f, " > "),
            Combinator::Adjacent => write!(f, " + "),
            Combinator::Sibling => write!(f, " ~ "),
        }
    }
}

impl fmt::Display for CompoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{}", tag)?;
        } else if self.universal {
            write!(f, "*")?;
        }
        for id in &self.ids {
            write!(f, "#{}", id)?;
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        for pseudo in &self.pseudo {
            write!(f, "{}", pseudo)?;
        }
        Ok(())
    }
}

impl fmt::Display for ComplexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (combinator, compound) in &self.tail {
            write!(f, "{}{}", combinator, compound)?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", selector)?;
        }
        Ok(())
    }
}

// ===== Compilation =====

/// A compiled rule: selector plus `(property, value)` pairs in source order
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selectors: SelectorList,
    pub declarations: Vec<(String, String)>,
}

/// Ordered sequence of compiled rules
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stylesheet {
    pub rules: Vec<StyleRule>,
}

impl Stylesheet {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// A style rule whose interpolations have been evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStyleRule {
    pub selectors: SelectorList,
    pub declarations: Vec<BoundDeclaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundDeclaration {
    pub property: String,
    pub parts: Vec<BoundPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundPart {
    Text(String),
    Value(Value),
}

/// Lowers bound style rules into a [`Stylesheet`]
///
/// Values are joined and whitespace-normalized; a declaration whose only
/// interpolation evaluated to `none` is dropped.
#[derive(Debug, Default)]
pub struct StyleCompiler;

impl StyleCompiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, rules: &[BoundStyleRule]) -> Stylesheet {
        let rules = rules
            .iter()
            .map(|rule| StyleRule {
                selectors: rule.selectors.clone(),
                declarations: rule
                    .declarations
                    .iter()
                    .filter_map(|d| self.compile_declaration(d))
                    .collect(),
            })
            .collect();
        Stylesheet { rules }
    }

    fn compile_declaration(&self, declaration: &BoundDeclaration) -> Option<(String, String)> {
        let mut value = String::new();
        let mut interpolated = false;
        let mut all_none = true;

        for part in &declaration.parts {
            match part {
                BoundPart::Text(text) => {
                    if !text.trim().is_empty() {
                        all_none = false;
                    }
                    value.push_str(text);
                }
                BoundPart::Value(Value::None) => interpolated = true,
                BoundPart::Value(v) => {
                    interpolated = true;
                    all_none = false;
                    value.push_str(&v.to_string());
                }
            }
        }

        if interpolated && all_none {
            return None;
        }
        let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
        Some((declaration.property.to_ascii_lowercase(), normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn class(name: &str) -> CompoundSelector {
        CompoundSelector {
            classes: vec![name.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_class_selector() {
        let list = SelectorList::parse(".primary-btn").unwrap();
        assert_eq!(list.0.len(), 1);
        assert_eq!(list.0[0].head, class("primary-btn"));
        assert!(list.0[0].tail.is_empty());
    }

    #[test]
    fn test_parse_combinators() {
        let list = SelectorList::parse("div > p.note + span ~ a b").unwrap();
        let combinators: Vec<Combinator> = list.0[0].tail.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            combinators,
            vec![
                Combinator::Child,
                Combinator::Adjacent,
                Combinator::Sibling,
                Combinator::Descendant
            ]
        );
        assert_eq!(list.0[0].tail[0].1.tag.as_deref(), Some("p"));
        assert_eq!(list.0[0].tail[0].1.classes, vec!["note".to_string()]);
    }

    #[test]
    fn test_parse_compound_parts() {
        let list = SelectorList::parse("a#home.nav.active:hover, *::before, li:nth-child(2n+1)").unwrap();
        assert_eq!(list.0.len(), 3);
        let a = &list.0[0].head;
        assert_eq!(a.tag.as_deref(), Some("a"));
        assert_eq!(a.ids, vec!["home".to_string()]);
        assert_eq!(a.classes, vec!["nav".to_string(), "active".to_string()]);
        assert_eq!(a.pseudo, vec![":hover".to_string()]);
        assert!(list.0[1].head.universal);
        assert_eq!(list.0[2].head.pseudo, vec![":nth-child(2n+1)".to_string()]);
    }

    #[test]
    fn test_selector_display_is_canonical() {
        let list = SelectorList::parse("div>p ,  .a   .b").unwrap();
        assert_eq!(list.to_string(), "div > p, .a .b");
        assert_eq!(SelectorList::parse(&list.to_string()).unwrap(), list);
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse(".").is_err());
        assert!(SelectorList::parse("a >").is_err());
        assert!(SelectorList::parse("a, ,b").is_err());
    }

    #[test]
    fn test_compile_rule() {
        let rule = BoundStyleRule {
            selectors: SelectorList::parse(".primary-btn").unwrap(),
            declarations: vec![BoundDeclaration {
                property: "background".to_string(),
                parts: vec![BoundPart::Text("#3498db".to_string())],
            }],
        };
        let sheet = StyleCompiler::new().compile(&[rule]);
        assert_eq!(sheet.rules.len(), 1);
        assert_eq!(
            sheet.rules[0].declarations,
            vec![("background".to_string(), "#3498db".to_string())]
        );
    }

    #[test]
    fn test_compile_interpolated_values() {
        let rule = BoundStyleRule {
            selectors: SelectorList::parse("div").unwrap(),
            declarations: vec![
                BoundDeclaration {
                    property: "width".to_string(),
                    parts: vec![BoundPart::Value(Value::Int(120)), BoundPart::Text("px".to_string())],
                },
                BoundDeclaration {
                    property: "color".to_string(),
                    parts: vec![BoundPart::Value(Value::None)],
                },
            ],
        };
        let compiler = StyleCompiler::new();
        let first = compiler.compile(std::slice::from_ref(&rule));
        let second = compiler.compile(&[rule]);
        assert_eq!(first, second);
        assert_eq!(first.rules[0].declarations, vec![("width".to_string(), "120px".to_string())]);
    }
}
