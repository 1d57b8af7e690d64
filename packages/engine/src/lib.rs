//! # Folio Engine
//!
//! Editing engine built on the Folio model and view.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ editor: plugins, commands, undo             │
//! │  - commands run model change blocks         │
//! │  - closed batches become undo steps         │
//! └─────────────────────────────────────────────┘
//!            ↓                       ↑
//! ┌────────────────────┐   ┌────────────────────┐
//! │ editing controller │   │ data controller    │
//! │ model diff → view  │   │ data ⇄ model       │
//! │ renders once       │   │ via HTML processor │
//! └────────────────────┘   └────────────────────┘
//!            ↓                       ↓
//! ┌─────────────────────────────────────────────┐
//! │ conversion: upcast / downcast dispatchers,  │
//! │ mapper, consumables, converter helpers      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The model is the source of truth**: the view only ever shows what
//!    the model says, and user input comes back as model changes
//! 2. **Conversion is event driven**: converters claim what they convert
//!    through consumables, so the first match wins
//! 3. **One render per change**: the view is updated in a single pass after
//!    the outermost change block closes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_engine::model::{Position, Range};
//! use folio_engine::{Editor, EditorConfig};
//! use serde_json::json;
//!
//! let mut editor = Editor::new(EditorConfig::default())?;
//! editor.set_data("main", "<p>foo</p>")?;
//! editor.change(|writer| {
//!     let range = Range::new(Position::new("main", vec![0, 0]), Position::new("main", vec![0, 3]));
//!     writer.set_selection(vec![range], false);
//!     Ok(())
//! })?;
//! editor.execute("bold", &json!({}))?;
//! assert_eq!(editor.get_data("main")?, "<p><strong>foo</strong></p>");
//! ```

mod config;
mod editor;
mod errors;
mod plugins;
mod undo;

pub mod commands;
pub mod controller;
pub mod conversion;

pub use commands::{Command, CommandCollection, CommandContext, CommandState};
pub use config::{EditorConfig, HeadingOption, UnknownContentPolicy, DEFAULT_CONFIG_NAME};
pub use controller::{DataController, EditingController};
pub use conversion::Conversion;
pub use editor::{Editor, READ_ONLY_LOCK};
pub use errors::{CommandError, EngineError, EngineResult};
pub use plugins::{
    core_plugins, AlignmentPlugin, BasicStylesPlugin, HeadingPlugin, HighlightPlugin, HorizontalLinePlugin,
    HtmlSupportPlugin, ParagraphPlugin, Plugin, TypingPlugin, UndoPlugin, HIGHLIGHT_GROUP,
};
pub use undo::{UndoManager, UndoStep};

pub use folio_model as model;
pub use folio_view as view;
