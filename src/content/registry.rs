//! Descriptor registry.
//!
//! Indexes discovered components and validates them eagerly, so lookups
//! during a build never fail for structural reasons.
//!
//! - importers by extension (case-insensitive, leading dot optional)
//! - processors by display name (case-insensitive)
//! - writers by target type id (exact)

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use super::component::{
    Component, ComponentSource, Importer, ImporterDescriptor, Processor, ProcessorDescriptor,
    Writer, WriterDescriptor,
};
use crate::build::Asset;

/// Error building the registry. Always fatal for the pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("importer '{importer}' declares no file extensions")]
    NoExtensions { importer: String },
    #[error("extension '.{extension}' is claimed by both '{first}' and '{second}'")]
    DuplicateExtension { extension: String, first: String, second: String },
    #[error("processor '{processor}' does not declare a source type")]
    MissingSourceType { processor: String },
    #[error("processor '{processor}' does not declare a target type")]
    MissingTargetType { processor: String },
    #[error("processor name '{processor}' is registered twice")]
    DuplicateProcessor { processor: String },
    #[error("writer '{writer}' does not declare a target type")]
    MissingWriterType { writer: String },
    #[error("type '{type_id}' is written by both '{first}' and '{second}'")]
    DuplicateWriter { type_id: String, first: String, second: String },
    #[error("importer '{importer}' names unknown default processor '{processor}'")]
    UnknownDefaultProcessor { importer: String, processor: String },
}

/// A registered importer and its metadata.
#[derive(Clone)]
pub struct ImporterEntry {
    pub descriptor: ImporterDescriptor,
    pub component: Arc<dyn Importer>,
}

/// A registered processor and its metadata.
#[derive(Clone)]
pub struct ProcessorEntry {
    pub descriptor: ProcessorDescriptor,
    pub component: Arc<dyn Processor>,
}

impl ProcessorEntry {
    /// Declared source type. Always present for registered processors.
    pub fn source_type(&self) -> &str {
        self.descriptor.source_type.as_deref().unwrap_or_default()
    }

    /// Declared target type. Always present for registered processors.
    pub fn target_type(&self) -> &str {
        self.descriptor.target_type.as_deref().unwrap_or_default()
    }
}

/// A registered writer and its metadata.
#[derive(Clone)]
pub struct WriterEntry {
    pub descriptor: WriterDescriptor,
    pub component: Arc<dyn Writer>,
}

/// Read-only index of components.
#[derive(Clone, Default)]
pub struct DescriptorRegistry {
    importers: Vec<ImporterEntry>,
    by_extension: HashMap<String, usize>,
    processors: HashMap<String, ProcessorEntry>,
    writers: HashMap<String, WriterEntry>,
}

impl std::fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorRegistry")
            .field("importers", &self.importers.iter().map(|e| &e.descriptor.name).collect::<Vec<_>>())
            .field("processors", &self.processors.keys().collect::<Vec<_>>())
            .field("writers", &self.writers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DescriptorRegistry {
    /// Build and validate a registry from a component list.
    pub fn new(components: Vec<Component>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        let mut importers = Vec::new();

        for component in components {
            match component {
                Component::Importer(c) => importers.push(c),
                Component::Processor(c) => registry.add_processor(c)?,
                Component::Writer(c) => registry.add_writer(c)?,
            }
        }
        // Processors first so default-processor references can be checked.
        for importer in importers {
            registry.add_importer(importer)?;
        }

        tracing::debug!(
            importers = registry.importers.len(),
            processors = registry.processors.len(),
            writers = registry.writers.len(),
            "component registry built"
        );
        Ok(registry)
    }

    /// Build a registry from whatever `source` discovers.
    pub fn from_source(source: &dyn ComponentSource) -> Result<Self, RegistryError> {
        Self::new(source.scan())
    }

    fn add_processor(&mut self, component: Arc<dyn Processor>) -> Result<(), RegistryError> {
        let descriptor = component.descriptor();
        let name = descriptor.name.clone();
        if descriptor.source_type.is_none() {
            return Err(RegistryError::MissingSourceType { processor: name });
        }
        if descriptor.target_type.is_none() {
            return Err(RegistryError::MissingTargetType { processor: name });
        }
        let key = name_key(&name);
        if self.processors.contains_key(&key) {
            return Err(RegistryError::DuplicateProcessor { processor: name });
        }
        self.processors.insert(key, ProcessorEntry { descriptor, component });
        Ok(())
    }

    fn add_writer(&mut self, component: Arc<dyn Writer>) -> Result<(), RegistryError> {
        let descriptor = component.descriptor();
        let Some(type_id) = descriptor.target_type.clone() else {
            return Err(RegistryError::MissingWriterType { writer: descriptor.name });
        };
        if let Some(existing) = self.writers.get(&type_id) {
            return Err(RegistryError::DuplicateWriter {
                type_id,
                first: existing.descriptor.name.clone(),
                second: descriptor.name,
            });
        }
        self.writers.insert(type_id, WriterEntry { descriptor, component });
        Ok(())
    }

    fn add_importer(&mut self, component: Arc<dyn Importer>) -> Result<(), RegistryError> {
        let descriptor = component.descriptor();
        let extensions: Vec<String> = descriptor
            .extensions
            .iter()
            .map(|e| extension_key(e))
            .filter(|e| !e.is_empty())
            .collect();
        if extensions.is_empty() {
            return Err(RegistryError::NoExtensions { importer: descriptor.name });
        }
        if let Some(processor) = &descriptor.default_processor {
            if !self.processors.contains_key(&name_key(processor)) {
                return Err(RegistryError::UnknownDefaultProcessor {
                    importer: descriptor.name.clone(),
                    processor: processor.clone(),
                });
            }
        }

        let index = self.importers.len();
        for extension in extensions {
            if let Some(&existing) = self.by_extension.get(&extension) {
                // An importer listing the same extension twice is not a conflict.
                if existing == index {
                    continue;
                }
                return Err(RegistryError::DuplicateExtension {
                    extension,
                    first: self.importers[existing].descriptor.name.clone(),
                    second: descriptor.name,
                });
            }
            self.by_extension.insert(extension, index);
        }
        self.importers.push(ImporterEntry { descriptor, component });
        Ok(())
    }

    /// Importer handling the asset's file extension.
    pub fn importer_for(&self, asset: &Asset) -> Option<&ImporterEntry> {
        self.importer_for_path(&asset.path)
    }

    /// Importer handling the extension of `path`.
    pub fn importer_for_path(&self, path: &Path) -> Option<&ImporterEntry> {
        let extension = path.extension()?.to_str()?;
        self.by_extension.get(&extension_key(extension)).map(|&i| &self.importers[i])
    }

    /// Processor for an asset: the one it names explicitly, else the default
    /// of its importer.
    pub fn processor_for(&self, asset: &Asset) -> Option<&ProcessorEntry> {
        match &asset.processor {
            Some(name) => self.processor_named(name),
            None => {
                let importer = self.importer_for(asset)?;
                self.processor_named(importer.descriptor.default_processor.as_deref()?)
            }
        }
    }

    /// Processor registered under `name`.
    pub fn processor_named(&self, name: &str) -> Option<&ProcessorEntry> {
        self.processors.get(&name_key(name))
    }

    /// Writer producing files from values of `type_id`.
    pub fn writer_for(&self, type_id: &str) -> Option<&WriterEntry> {
        self.writers.get(type_id)
    }

    pub fn importers(&self) -> impl Iterator<Item = &ImporterEntry> {
        self.importers.iter()
    }

    pub fn processors(&self) -> impl Iterator<Item = &ProcessorEntry> {
        self.processors.values()
    }

    pub fn writers(&self) -> impl Iterator<Item = &WriterEntry> {
        self.writers.values()
    }
}

fn extension_key(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn name_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildContext;
    use crate::content::builtin::*;
    use crate::content::component::{Content, ContentError};
    use crate::content::ComponentSource;
    use std::path::PathBuf;

    struct CustomImporter(ImporterDescriptor);

    impl Importer for CustomImporter {
        fn descriptor(&self) -> ImporterDescriptor {
            self.0.clone()
        }

        fn import(&self, _ctx: &mut BuildContext<'_>, _source: &Path) -> Result<Content, ContentError> {
            Ok(Box::new(String::new()))
        }
    }

    struct CustomProcessor(ProcessorDescriptor);

    impl Processor for CustomProcessor {
        fn descriptor(&self) -> ProcessorDescriptor {
            self.0.clone()
        }

        fn process(&self, _ctx: &mut BuildContext<'_>, input: Content) -> Result<Content, ContentError> {
            Ok(input)
        }
    }

    struct CustomWriter(WriterDescriptor);

    impl Writer for CustomWriter {
        fn descriptor(&self) -> WriterDescriptor {
            self.0.clone()
        }

        fn write(&self, _ctx: &mut BuildContext<'_>, _output: &Path, _value: Content) -> Result<(), ContentError> {
            Ok(())
        }
    }

    fn asset(path: &str, processor: Option<&str>) -> Asset {
        Asset { path: PathBuf::from(path), processor: processor.map(str::to_string), definition: 0 }
    }

    fn builtin() -> DescriptorRegistry {
        DescriptorRegistry::from_source(&BuiltinComponents).unwrap()
    }

    #[test]
    fn test_importer_lookup_by_extension() {
        let registry = builtin();
        assert_eq!(registry.importer_for(&asset("/a/b.txt", None)).unwrap().descriptor.name, "Text Importer");
        assert_eq!(registry.importer_for(&asset("/a/B.TXT", None)).unwrap().descriptor.name, "Text Importer");
        assert_eq!(registry.importer_for(&asset("/a/x.dat", None)).unwrap().descriptor.name, "Binary Importer");
        assert!(registry.importer_for(&asset("/a/x.png", None)).is_none());
        assert!(registry.importer_for(&asset("/a/noext", None)).is_none());
    }

    #[test]
    fn test_processor_lookup() {
        let registry = builtin();
        assert_eq!(registry.processor_for(&asset("/a.txt", None)).unwrap().descriptor.name, "passthrough");
        assert_eq!(registry.processor_for(&asset("/a.txt", Some("Reverse"))).unwrap().descriptor.name, "reverse");
        assert!(registry.processor_for(&asset("/a.txt", Some("missing"))).is_none());
        assert!(registry.processor_for(&asset("/a.png", None)).is_none());
    }

    #[test]
    fn test_writer_lookup() {
        let registry = builtin();
        assert_eq!(registry.writer_for(TEXT_TYPE).unwrap().descriptor.name, "Text Writer");
        assert_eq!(registry.writer_for(BYTES_TYPE).unwrap().descriptor.name, "Binary Writer");
        assert!(registry.writer_for("image").is_none());
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let mut components = BuiltinComponents.scan();
        components.push(Component::importer(CustomImporter(ImporterDescriptor::new("Other", &["TXT"]))));

        let err = DescriptorRegistry::new(components).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateExtension {
                extension: "txt".to_string(),
                first: "Text Importer".to_string(),
                second: "Other".to_string()
            }
        );
    }

    #[test]
    fn test_importer_without_extensions_rejected() {
        let components = vec![Component::importer(CustomImporter(ImporterDescriptor::new("Empty", &[])))];
        assert!(matches!(DescriptorRegistry::new(components), Err(RegistryError::NoExtensions { .. })));
    }

    #[test]
    fn test_writer_without_type_rejected() {
        let components = vec![Component::writer(CustomWriter(WriterDescriptor::untyped("Broken")))];
        assert!(matches!(DescriptorRegistry::new(components), Err(RegistryError::MissingWriterType { .. })));
    }

    #[test]
    fn test_duplicate_writer_rejected() {
        let mut components = BuiltinComponents.scan();
        components.push(Component::writer(CustomWriter(WriterDescriptor::new("Other", TEXT_TYPE))));
        assert!(matches!(DescriptorRegistry::new(components), Err(RegistryError::DuplicateWriter { .. })));
    }

    #[test]
    fn test_processor_without_types_rejected() {
        let components = vec![Component::processor(CustomProcessor(ProcessorDescriptor::untyped("p")))];
        assert!(matches!(DescriptorRegistry::new(components), Err(RegistryError::MissingSourceType { .. })));

        let mut half = ProcessorDescriptor::new("p", TEXT_TYPE, TEXT_TYPE);
        half.target_type = None;
        let components = vec![Component::processor(CustomProcessor(half))];
        assert!(matches!(DescriptorRegistry::new(components), Err(RegistryError::MissingTargetType { .. })));
    }

    #[test]
    fn test_duplicate_processor_rejected() {
        let mut components = BuiltinComponents.scan();
        components.push(Component::processor(CustomProcessor(ProcessorDescriptor::new(
            "REVERSE", TEXT_TYPE, TEXT_TYPE,
        ))));
        assert!(matches!(DescriptorRegistry::new(components), Err(RegistryError::DuplicateProcessor { .. })));
    }

    #[test]
    fn test_unknown_default_processor_rejected() {
        let components = vec![Component::importer(CustomImporter(
            ImporterDescriptor::new("Img", &[".png"]).with_default_processor("resize"),
        ))];
        let err = DescriptorRegistry::new(components).unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownDefaultProcessor { importer: "Img".to_string(), processor: "resize".to_string() }
        );
    }

    #[test]
    fn test_registration_order_does_not_matter() {
        let mut components = BuiltinComponents.scan();
        components.reverse();
        assert!(DescriptorRegistry::new(components).is_ok());
    }
}
