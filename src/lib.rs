//! Headless core of a node-link diagram editor: the graph model, the
//! pointer/keyboard state machine that edits it, automatic layouts, undo and
//! redo, a minimap projection, and an async persistence seam.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod connection;
pub mod editor;
pub mod error;
pub mod gateway;
pub mod geometry;
pub mod graph;
pub mod history;
pub mod input;
pub mod layout;
pub mod layout_dump;
pub mod minimap;
pub mod model;
pub mod render;
pub mod selection;
pub mod theme;
pub mod view;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config, parse_config};
pub use editor::{Editor, HitTarget, SaveStatus};
pub use error::{EditorError, EditorResult};
pub use gateway::{MemoryGateway, ProjectGateway};
pub use graph::GraphModel;
pub use layout::{LayoutAlgorithm, TreeDirection};
pub use model::{Edge, Node, Project};
