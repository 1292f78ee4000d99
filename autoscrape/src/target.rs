//! Scrape targets and their compiled selector rules.
//!
//! A field selector expression is a CSS path optionally followed by a suffix
//! choosing what to extract from the first matching element:
//!
//! - `css::attr(name)` : value of attribute `name`
//! - `css::text`       : trimmed text content
//! - `css`             : same as `css::text`
//!
//! An empty CSS path (`::attr(href)`) designates the item element itself.

use std::collections::BTreeMap;
use std::path::PathBuf;

use scraper::{ElementRef, Selector};
use serde::Deserialize;

use crate::error::SelectorError;

const ATTR_MARKER: &str = "::attr(";
const TEXT_SUFFIX: &str = "::text";

#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    pub name: String,
    pub url: String,
    #[serde(rename = "item", alias = "item_selector")]
    pub item_selector: String,
    pub fields: BTreeMap<String, String>,
    /// Dedicated CSV file for this target, instead of the default one.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

impl Target {
    /// Parse every selector of the target once, before touching any HTML.
    pub fn rules(&self) -> Result<Rules, SelectorError> {
        Rules::compile(&self.item_selector, &self.fields)
    }
}

/// A target with its selectors compiled once, when the configuration is loaded.
///
/// A target with a broken selector is kept; the error is reported each time
/// it is run so the other targets are unaffected.
#[derive(Debug, Clone)]
pub struct CompiledTarget {
    pub target: Target,
    rules: Result<Rules, SelectorError>,
}

impl CompiledTarget {
    pub fn new(target: Target) -> Self {
        let rules = target.rules();
        Self { target, rules }
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }

    pub fn rules(&self) -> Result<&Rules, SelectorError> {
        self.rules.as_ref().map_err(Clone::clone)
    }
}

/// A CSS path evaluated relative to an item element.
#[derive(Debug, Clone)]
pub struct CssPath {
    selector: Option<Selector>,
}

impl CssPath {
    pub fn parse(css: &str) -> Result<Self, SelectorError> {
        let css = css.trim();
        let selector = if css.is_empty() {
            None
        } else {
            Some(compile(css)?)
        };
        Ok(Self { selector })
    }

    /// First descendant-or-self of `scope` matching the path.
    pub fn first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        match &self.selector {
            None => Some(scope),
            Some(sel) if sel.matches(&scope) => Some(scope),
            Some(sel) => scope.select(sel).next(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldRule {
    /// `css::text`
    Text(CssPath),
    /// `css::attr(name)`
    Attribute(CssPath, String),
    /// bare `css`
    DefaultText(CssPath),
}

impl FieldRule {
    pub fn parse(expr: &str) -> Result<Self, SelectorError> {
        let expr = expr.trim();

        if let Some((css, rest)) = expr.split_once(ATTR_MARKER) {
            let attr = rest
                .strip_suffix(')')
                .map(str::trim)
                .filter(|a| !a.is_empty() && !a.contains(['(', ')']))
                .ok_or_else(|| SelectorError::Expression(expr.to_string()))?;
            return Ok(Self::Attribute(CssPath::parse(css)?, attr.to_string()));
        }

        if let Some(css) = expr.strip_suffix(TEXT_SUFFIX) {
            return Ok(Self::Text(CssPath::parse(css)?));
        }

        if expr.is_empty() {
            return Err(SelectorError::Expression(expr.to_string()));
        }
        Ok(Self::DefaultText(CssPath::parse(expr)?))
    }

    /// Evaluate against one item element. No match means no value.
    pub fn evaluate(&self, scope: ElementRef<'_>) -> Option<String> {
        match self {
            Self::Text(path) | Self::DefaultText(path) => path.first(scope).map(text_of),
            Self::Attribute(path, name) => path
                .first(scope)
                .and_then(|el| el.value().attr(name).map(String::from)),
        }
    }
}

/// Compiled form of a target's item selector and field map.
#[derive(Debug, Clone)]
pub struct Rules {
    pub item: Selector,
    pub fields: Vec<(String, FieldRule)>,
}

impl Rules {
    pub fn compile(
        item_selector: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Self, SelectorError> {
        let item = compile(item_selector.trim())?;
        let fields = fields
            .iter()
            .map(|(name, expr)| Ok((name.clone(), FieldRule::parse(expr)?)))
            .collect::<Result<Vec<_>, SelectorError>>()?;
        Ok(Self { item, fields })
    }
}

fn compile(css: &str) -> Result<Selector, SelectorError> {
    Selector::parse(css).map_err(|e| SelectorError::Css {
        css: css.to_string(),
        reason: e.to_string(),
    })
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
