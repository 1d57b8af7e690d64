//! # Folio View
//!
//! The editing view of the Folio engine and the DOM it renders into.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ downcast writer                             │
//! │  - the only way conversion edits the view   │
//! │  - keeps attribute elements normalized      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ view tree: one node type + category tag     │
//! │  - marks touched nodes dirty                │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ renderer + DOM converter                    │
//! │  - patches only dirty nodes in the DOM      │
//! │  - fillers, whitespace, DOM selection       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The data pipeline skips the renderer: [`HtmlDataProcessor`] converts a
//! view fragment straight to and from HTML.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_view::{View, ViewPosition};
//!
//! let mut view = View::default();
//! let root = view.create_root("main", "div")?;
//! view.change(|writer| {
//!     let p = writer.create_container_element("p", []);
//!     writer.insert(ViewPosition::new(root, 0), vec![p])
//! })?;
//! assert_eq!(view.dom_html("main").unwrap(), "<p><br data-cke-filler=\"true\"></p>");
//! ```

mod document;
mod dom;
mod dom_converter;
mod errors;
mod html;
mod matcher;
mod node;
mod position;
mod renderer;
mod view;
mod writer;

pub mod dev_utils;

pub use document::ViewDocument;
pub use dom::{is_void_element, DomNodeId, DomNodeKind, DomPosition, DomSelection, DomTree, VOID_ELEMENTS};
pub use dom_converter::{
    filler_offset, is_block_element, BlockFillerMode, DomConverter, BLOCK_ELEMENTS, BLOCK_FILLER_ATTRIBUTE,
    INLINE_FILLER, INLINE_FILLER_LENGTH,
};
pub use errors::{HtmlError, ViewError, ViewResult};
pub use html::{DataProcessor, HtmlDataProcessor};
pub use matcher::{MatchResult, Matcher, MatcherPattern, ValuePattern};
pub use node::{parse_styles, DirtyNodes, ElementCategory, ViewElement, ViewNodeId, ViewTree, DEFAULT_PRIORITY};
pub use position::{ViewPosition, ViewRange, ViewSelection};
pub use renderer::{RenderStats, Renderer};
pub use view::View;
pub use writer::DowncastWriter;
