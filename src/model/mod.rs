//! Catalog data model
//!
//! A [`Qualification`] owns its [`ModuleLevel`]s by value. Each level is an
//! ordered list of [`ModuleGroup`]s, and each group holds shared references to
//! canonical [`Module`] records owned by the module registry.

mod module;
mod qualification;

pub use module::Module;
pub use qualification::{ModuleGroup, ModuleLevel, Qualification, QualificationDocument};
