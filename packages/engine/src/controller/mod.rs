//! # Controllers
//!
//! The two consumers of model changes:
//!
//! ```text
//!                 ┌────────────────────┐
//!   model diff ──►│ EditingController  │──► view ──► renderer ──► DOM
//!                 └────────────────────┘
//!                 ┌────────────────────┐
//!   model root ──►│ DataController     │──► view fragment ──► HTML
//!   HTML ────────►│                    │──► model nodes
//!                 └────────────────────┘
//! ```
//!
//! The editing controller keeps a long-lived view bound to the model and
//! updates it incrementally. The data controller builds a throwaway view for
//! every `get`/`set` call.

mod data;
mod editing;

pub use data::DataController;
pub use editing::EditingController;
