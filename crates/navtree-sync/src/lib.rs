//! Navigation panel synchronisation.
//!
//! Keeps a tree-view panel consistent with the page shown in a companion
//! viewer. The crate provides:
//!
//! - [`SyncController`]: sans-IO state machine driven by page events and
//!   fragment completions, with a generation counter so the latest page wins
//! - [`Panel`]: blocking driver that loads fragments through a
//!   [`FragmentSource`](navtree_storage::FragmentSource) and exposes visible
//!   rows
//! - [`SyncToggle`]: labels of the control that switches synchronisation
//!
//! # Example
//!
//! ```ignore
//! use navtree_config::Config;
//! use navtree_sync::{Panel, SyncState};
//!
//! let config = Config::load(None, None)?;
//! let mut panel = Panel::from_config(&config)?;
//!
//! if let SyncState::SyncFailed(reason) = panel.page_displayed("classx.html#details") {
//!     tracing::warn!(%reason, "Page not highlighted");
//! }
//! for row in panel.rows() {
//!     println!("{}{}", "  ".repeat(row.depth), row.title);
//! }
//! ```

mod controller;
mod panel;
mod toggle;

pub use controller::{FetchRequest, Generation, SyncController, SyncError, SyncState, SyncStep};
pub use panel::{Panel, PanelError, PanelOptions, PanelRow, RowState};
pub use toggle::{SYNC_OFF_MESSAGE, SYNC_ON_MESSAGE, SyncToggle};
