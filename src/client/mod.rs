//! Preview-tab behavior: document model, reconciliation and navigation.
//!
//! The browser runs `client.js`; these modules model the same page so the
//! reload pipeline can be tested end to end without a browser.

pub mod dom;
pub mod morph;
pub mod nav;
pub mod reconcile;

pub use reconcile::{ClientSession, Page};
