//! Component model: importers, processors and writers.
//!
//! Components describe themselves through descriptors instead of being
//! discovered by inspecting their types. Values flowing between stages are
//! type-erased and tagged by the string type ids the descriptors declare.

use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::build::BuildContext;
use crate::hash::HashError;

/// Value passed between pipeline stages.
pub type Content = Box<dyn Any + Send>;

/// Error raised by a component while handling one asset.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Input bytes could not be interpreted
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// A stage received a value of the wrong type
    #[error("expected a value of type '{expected}'")]
    UnexpectedType { expected: String },
    /// Fingerprinting a dependency failed
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Take ownership of a stage value as a concrete type.
pub fn downcast<T: Any>(value: Content, type_id: &str) -> Result<T, ContentError> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| ContentError::UnexpectedType { expected: type_id.to_string() })
}

/// Metadata an importer exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterDescriptor {
    pub name: String,
    /// File extensions handled, with or without the leading dot
    pub extensions: Vec<String>,
    /// Processor used when an asset does not name one
    pub default_processor: Option<String>,
    /// Type id of the imported value
    pub output_type: Option<String>,
    /// Extension for written outputs when the processor has none
    pub output_extension: Option<String>,
}

impl ImporterDescriptor {
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            default_processor: None,
            output_type: None,
            output_extension: None,
        }
    }

    pub fn with_default_processor(mut self, processor: &str) -> Self {
        self.default_processor = Some(processor.to_string());
        self
    }

    pub fn with_output_type(mut self, type_id: &str) -> Self {
        self.output_type = Some(type_id.to_string());
        self
    }

    pub fn with_output_extension(mut self, extension: &str) -> Self {
        self.output_extension = Some(extension.to_string());
        self
    }
}

/// Metadata a processor exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorDescriptor {
    pub name: String,
    pub source_type: Option<String>,
    pub target_type: Option<String>,
    pub output_extension: Option<String>,
}

impl ProcessorDescriptor {
    /// A processor converting `source_type` values into `target_type` values.
    pub fn new(name: &str, source_type: &str, target_type: &str) -> Self {
        Self {
            name: name.to_string(),
            source_type: Some(source_type.to_string()),
            target_type: Some(target_type.to_string()),
            output_extension: None,
        }
    }

    /// A processor with no declared types. Rejected by the registry.
    pub fn untyped(name: &str) -> Self {
        Self { name: name.to_string(), source_type: None, target_type: None, output_extension: None }
    }

    pub fn with_output_extension(mut self, extension: &str) -> Self {
        self.output_extension = Some(extension.to_string());
        self
    }
}

/// Metadata a writer exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterDescriptor {
    pub name: String,
    pub target_type: Option<String>,
}

impl WriterDescriptor {
    pub fn new(name: &str, target_type: &str) -> Self {
        Self { name: name.to_string(), target_type: Some(target_type.to_string()) }
    }

    /// A writer with no declared type. Rejected by the registry.
    pub fn untyped(name: &str) -> Self {
        Self { name: name.to_string(), target_type: None }
    }
}

/// Reads a source file into an in-memory value.
pub trait Importer: Send + Sync {
    fn descriptor(&self) -> ImporterDescriptor;

    /// Import `source`. Secondary files consulted should be recorded with
    /// [`BuildContext::add_dependency`].
    fn import(&self, ctx: &mut BuildContext<'_>, source: &Path) -> Result<Content, ContentError>;
}

/// Transforms one value into another.
pub trait Processor: Send + Sync {
    fn descriptor(&self) -> ProcessorDescriptor;

    fn process(&self, ctx: &mut BuildContext<'_>, input: Content) -> Result<Content, ContentError>;
}

/// Serializes a final value to an output file.
pub trait Writer: Send + Sync {
    fn descriptor(&self) -> WriterDescriptor;

    fn write(
        &self,
        ctx: &mut BuildContext<'_>,
        output: &Path,
        value: Content,
    ) -> Result<(), ContentError>;
}

/// A discovered component tagged by capability.
#[derive(Clone)]
pub enum Component {
    Importer(Arc<dyn Importer>),
    Processor(Arc<dyn Processor>),
    Writer(Arc<dyn Writer>),
}

impl Component {
    pub fn importer(importer: impl Importer + 'static) -> Self {
        Component::Importer(Arc::new(importer))
    }

    pub fn processor(processor: impl Processor + 'static) -> Self {
        Component::Processor(Arc::new(processor))
    }

    pub fn writer(writer: impl Writer + 'static) -> Self {
        Component::Writer(Arc::new(writer))
    }

    /// The component's metadata.
    pub fn descriptor(&self) -> ComponentDescriptor {
        match self {
            Component::Importer(c) => ComponentDescriptor::Importer(c.descriptor()),
            Component::Processor(c) => ComponentDescriptor::Processor(c.descriptor()),
            Component::Writer(c) => ComponentDescriptor::Writer(c.descriptor()),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.descriptor()).finish()
    }
}

/// Metadata of any component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentDescriptor {
    Importer(ImporterDescriptor),
    Processor(ProcessorDescriptor),
    Writer(WriterDescriptor),
}

impl ComponentDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ComponentDescriptor::Importer(d) => &d.name,
            ComponentDescriptor::Processor(d) => &d.name,
            ComponentDescriptor::Writer(d) => &d.name,
        }
    }
}

/// Produces the list of components a registry is built from.
pub trait ComponentSource {
    fn scan(&self) -> Vec<Component>;
}

/// A caller-supplied component list.
#[derive(Debug, Clone, Default)]
pub struct StaticComponents {
    components: Vec<Component>,
}

impl StaticComponents {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn with(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }
}

impl ComponentSource for StaticComponents {
    fn scan(&self) -> Vec<Component> {
        self.components.clone()
    }
}
