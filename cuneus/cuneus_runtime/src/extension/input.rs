//! Extension inputs.
//!
//! The application builder accepts extensions in three forms: a ready
//! instance, a type built from the build context, or a factory closure
//! called with that context. Every form records the concrete extension type up
//! front, so defaults can be matched against user inputs before anything
//! is instantiated.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use cuneus_core::error::ConfigError;
use cuneus_core::traits::{short_type_name, Extension, ExtensionContext, FromContext};

type Constructor =
    Box<dyn FnOnce(&ExtensionContext) -> anyhow::Result<Box<dyn Extension>> + Send>;

/// How an input produces its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// An already constructed instance
    Instance,
    /// A type constructed from the build context
    Type,
    /// A closure called with the build context
    Factory,
}

enum Source {
    Instance(Box<dyn Extension>),
    Type(Constructor),
    Factory(Constructor),
}

/// One entry of the extension list passed to the application builder.
pub struct ExtensionInput {
    type_id: TypeId,
    type_name: &'static str,
    source: Source,
}

impl ExtensionInput {
    /// Use an existing instance as is.
    pub fn instance<E: Extension>(extension: E) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            source: Source::Instance(Box::new(extension)),
        }
    }

    /// Construct `E` from the build context.
    pub fn of<E: Extension + FromContext>() -> Self {
        Self::typed::<E>(Box::new(|context: &ExtensionContext| {
            E::from_context(context).map(|extension| Box::new(extension) as Box<dyn Extension>)
        }))
    }

    /// Construct `E` without looking at the build context.
    pub fn of_default<E: Extension + Default>() -> Self {
        Self::typed::<E>(Box::new(|_: &ExtensionContext| {
            Ok(Box::new(E::default()) as Box<dyn Extension>)
        }))
    }

    /// Construct `E` from the build context, falling back to
    /// `E::default()` when the context-accepting constructor refuses it.
    pub fn of_type<E: Extension + FromContext + Default>() -> Self {
        Self::typed::<E>(Box::new(|context: &ExtensionContext| {
            let extension = match E::from_context(context) {
                Ok(extension) => extension,
                Err(err) => {
                    context.logger("extensions").debug(format!(
                        "{} rejected the settings ({:#}), using its default",
                        short_type_name(type_name::<E>()),
                        err
                    ));
                    E::default()
                }
            };
            Ok(Box::new(extension) as Box<dyn Extension>)
        }))
    }

    /// Call `factory` with the build context.
    pub fn factory<E, F>(factory: F) -> Self
    where
        E: Extension,
        F: FnOnce(&ExtensionContext) -> anyhow::Result<E> + Send + 'static,
    {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            source: Source::Factory(Box::new(move |context: &ExtensionContext| {
                factory(context).map(|extension| Box::new(extension) as Box<dyn Extension>)
            })),
        }
    }

    fn typed<E: Extension>(constructor: Constructor) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            source: Source::Type(constructor),
        }
    }

    /// The concrete extension type this input produces.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full name of the concrete extension type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Which form this input takes.
    pub fn kind(&self) -> InputKind {
        match self.source {
            Source::Instance(_) => InputKind::Instance,
            Source::Type(_) => InputKind::Type,
            Source::Factory(_) => InputKind::Factory,
        }
    }

    /// Turn the input into an instance.
    pub fn resolve(self, context: &ExtensionContext) -> Result<Arc<dyn Extension>, ConfigError> {
        let extension = match self.source {
            Source::Instance(extension) => extension,
            Source::Type(construct) | Source::Factory(construct) => {
                construct(context).map_err(|err| ConfigError::Construction {
                    extension: short_type_name(self.type_name).to_string(),
                    reason: format!("{:#}", err),
                })?
            }
        };
        Ok(Arc::from(extension))
    }
}

impl<E: Extension> From<E> for ExtensionInput {
    fn from(extension: E) -> Self {
        Self::instance(extension)
    }
}

impl fmt::Debug for ExtensionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionInput")
            .field("type", &self.type_name)
            .field("kind", &self.kind())
            .finish()
    }
}
