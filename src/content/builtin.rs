//! Built-in importers, processors and writers.
//!
//! | Component | Kind | Types |
//! |-----------|------|-------|
//! | `TextImporter` | importer | `.txt`, `.md` → `text` |
//! | `BinaryImporter` | importer | `.bin`, `.dat` → `bytes` |
//! | `PassthroughProcessor` | processor | `text` → `text` |
//! | `ReverseProcessor` | processor | `text` → `text` |
//! | `UppercaseProcessor` | processor | `text` → `text` |
//! | `CopyProcessor` | processor | `bytes` → `bytes` |
//! | `TextWriter` | writer | `text` |
//! | `BinaryWriter` | writer | `bytes` |

use std::io::Write as _;
use std::path::{Path, PathBuf};

use super::component::{
    downcast, Component, ComponentSource, Content, ContentError, Importer, ImporterDescriptor,
    Processor, ProcessorDescriptor, Writer, WriterDescriptor,
};
use crate::build::BuildContext;

/// Type id of UTF-8 text values (`String`).
pub const TEXT_TYPE: &str = "text";
/// Type id of raw byte values (`Vec<u8>`).
pub const BYTES_TYPE: &str = "bytes";

/// Extension of the sidecar file a text asset may carry.
pub const META_EXTENSION: &str = "meta";

/// Reads UTF-8 text. The `<source>.meta` sidecar is recorded as a
/// dependency, present or not, so editing or creating it triggers a rebuild.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextImporter;

impl Importer for TextImporter {
    fn descriptor(&self) -> ImporterDescriptor {
        ImporterDescriptor::new("Text Importer", &[".txt", ".md"])
            .with_default_processor("passthrough")
            .with_output_type(TEXT_TYPE)
    }

    fn import(&self, ctx: &mut BuildContext<'_>, source: &Path) -> Result<Content, ContentError> {
        let bytes = ctx.fs().read(source)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| ContentError::InvalidData(format!("{} is not UTF-8: {}", source.display(), e)))?;

        ctx.add_optional_dependency(&sidecar_path(source))?;

        Ok(Box::new(text))
    }
}

fn sidecar_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".");
    name.push(META_EXTENSION);
    PathBuf::from(name)
}

/// Reads a file as raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryImporter;

impl Importer for BinaryImporter {
    fn descriptor(&self) -> ImporterDescriptor {
        ImporterDescriptor::new("Binary Importer", &[".bin", ".dat"])
            .with_default_processor("copy")
            .with_output_type(BYTES_TYPE)
    }

    fn import(&self, ctx: &mut BuildContext<'_>, source: &Path) -> Result<Content, ContentError> {
        Ok(Box::new(ctx.fs().read(source)?))
    }
}

/// Returns text unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughProcessor;

impl Processor for PassthroughProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new("passthrough", TEXT_TYPE, TEXT_TYPE)
    }

    fn process(&self, _ctx: &mut BuildContext<'_>, input: Content) -> Result<Content, ContentError> {
        let text: String = downcast(input, TEXT_TYPE)?;
        Ok(Box::new(text))
    }
}

/// Reverses the characters of a text value.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReverseProcessor;

impl Processor for ReverseProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new("reverse", TEXT_TYPE, TEXT_TYPE)
    }

    fn process(&self, _ctx: &mut BuildContext<'_>, input: Content) -> Result<Content, ContentError> {
        let text: String = downcast(input, TEXT_TYPE)?;
        Ok(Box::new(text.chars().rev().collect::<String>()))
    }
}

/// Upper-cases a text value.
#[derive(Debug, Default, Clone, Copy)]
pub struct UppercaseProcessor;

impl Processor for UppercaseProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new("uppercase", TEXT_TYPE, TEXT_TYPE)
    }

    fn process(&self, _ctx: &mut BuildContext<'_>, input: Content) -> Result<Content, ContentError> {
        let text: String = downcast(input, TEXT_TYPE)?;
        Ok(Box::new(text.to_uppercase()))
    }
}

/// Returns bytes unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyProcessor;

impl Processor for CopyProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new("copy", BYTES_TYPE, BYTES_TYPE)
    }

    fn process(&self, _ctx: &mut BuildContext<'_>, input: Content) -> Result<Content, ContentError> {
        let bytes: Vec<u8> = downcast(input, BYTES_TYPE)?;
        Ok(Box::new(bytes))
    }
}

/// Writes text values as UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextWriter;

impl Writer for TextWriter {
    fn descriptor(&self) -> WriterDescriptor {
        WriterDescriptor::new("Text Writer", TEXT_TYPE)
    }

    fn write(&self, ctx: &mut BuildContext<'_>, output: &Path, value: Content) -> Result<(), ContentError> {
        let text: String = downcast(value, TEXT_TYPE)?;
        let mut file = ctx.fs().create(output)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Writes byte values verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryWriter;

impl Writer for BinaryWriter {
    fn descriptor(&self) -> WriterDescriptor {
        WriterDescriptor::new("Binary Writer", BYTES_TYPE)
    }

    fn write(&self, ctx: &mut BuildContext<'_>, output: &Path, value: Content) -> Result<(), ContentError> {
        let bytes: Vec<u8> = downcast(value, BYTES_TYPE)?;
        let mut file = ctx.fs().create(output)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }
}

/// The built-in component table.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinComponents;

impl ComponentSource for BuiltinComponents {
    fn scan(&self) -> Vec<Component> {
        vec![
            Component::importer(TextImporter),
            Component::importer(BinaryImporter),
            Component::processor(PassthroughProcessor),
            Component::processor(ReverseProcessor),
            Component::processor(UppercaseProcessor),
            Component::processor(CopyProcessor),
            Component::writer(TextWriter),
            Component::writer(BinaryWriter),
        ]
    }
}
