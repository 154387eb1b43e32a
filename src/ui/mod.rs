//! UI and style compilation
//!
//! `ui { }` blocks compile to [`UiElement`] trees and `style { }` blocks to
//! [`Stylesheet`]s; [`render`] turns both into the markup artifact.

pub mod markup;
pub mod render;
pub mod style;

pub use markup::{BoundNode, UiChild, UiCompiler, UiElement};
pub use render::{render_artifact, render_markup, render_stylesheet};
pub use style::{
    BoundDeclaration, BoundPart, BoundStyleRule, Combinator, ComplexSelector, CompoundSelector,
    SelectorList, StyleCompiler, StyleRule, Stylesheet,
};
