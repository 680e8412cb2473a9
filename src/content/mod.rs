//! Content components and their registry.
//!
//! An asset flows through three components:
//! - an **Importer** turns source bytes into a value,
//! - a **Processor** transforms the value,
//! - a **Writer** serializes it to the output file.
//!
//! Components are listed by a [`ComponentSource`] and indexed by a
//! [`DescriptorRegistry`].

pub mod builtin;
pub mod component;
pub mod registry;

pub use builtin::BuiltinComponents;
pub use component::*;
pub use registry::*;
