//! Primitives for loading and querying configuration.
#![deny(warnings)]
#![deny(missing_docs)]

use std::{borrow::Cow, collections::HashSet, path::Path, sync::Arc};

use figment::{
    error::Kind,
    providers::{Env, Format as _, Json, Serialized, Yaml},
    Figment, Provider,
};
use serde::Deserialize;
use sluice_error::GenericError;
use snafu::Snafu;
use tracing::debug;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// A configuration file could not be read or parsed.
    #[snafu(display("Failed to load configuration file '{}': {}", path, source))]
    File {
        /// Path of the file.
        path: String,

        /// Error source.
        source: GenericError,
    },

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Help text describing how to set the missing field, including the environment variable form when
        /// environment variables were loaded.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// Requested field did not have the expected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated path to the invalid field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Generic configuration error.
    #[snafu(display("Failed to query configuration: {}", source))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum LookupSource {
    Environment { prefix: String },
}

impl LookupSource {
    fn transform_key(&self, key: &str) -> String {
        match self {
            // The prefix is already uppercased and ends with an underscore.
            LookupSource::Environment { prefix } => {
                format!("{}{}", prefix, key.replace('.', "_")).to_uppercase()
            }
        }
    }
}

struct BoxedProvider(Box<dyn Provider + Send + Sync>);

impl Provider for BoxedProvider {
    fn metadata(&self) -> figment::Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// A configuration loader that merges multiple sources.
///
/// Sources added later take precedence over sources added earlier. Once all sources are added, the merged data can
/// either be deserialized directly ([`into_typed`][Self::into_typed]) or wrapped for key-based querying
/// ([`into_generic`][Self::into_generic]).
///
/// # Supported sources
///
/// - YAML file
/// - JSON file
/// - environment variables (must be prefixed; see [`from_environment`][Self::from_environment])
#[derive(Default)]
pub struct ConfigurationLoader {
    lookup_sources: HashSet<LookupSource>,
    providers: Vec<BoxedProvider>,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or is not valid YAML, an error will be returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let data = read_file(path.as_ref())?;
        let provider = Yaml::string(&data);
        self.push_resolved(provider, path.as_ref())?;
        Ok(self)
    }

    /// Attempts to load the given YAML configuration file, ignoring any errors.
    ///
    /// Errors include the file not existing, not being readable, and not being valid YAML.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let result = read_file(path).and_then(|data| self.push_resolved(Yaml::string(&data), path));
        if let Err(e) = result {
            debug!(error = %e, file_path = %path.to_string_lossy(), "Unable to read YAML configuration file. Ignoring.");
        }
        self
    }

    /// Loads the given JSON configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or is not valid JSON, an error will be returned.
    pub fn from_json<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let data = read_file(path.as_ref())?;
        let provider = Json::string(&data);
        self.push_resolved(provider, path.as_ref())?;
        Ok(self)
    }

    /// Loads configuration from environment variables.
    ///
    /// An underscore is appended to the prefix if it does not already end with one, so a prefix of `sluice` matches
    /// any variable starting with `SLUICE_`. The prefix is case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error will be returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_uppercase()
        } else {
            format!("{}_", prefix.to_uppercase())
        };

        // `Env` is not `Send + Sync`, so snapshot its data into a serialized provider.
        let env = Env::prefixed(&prefix);
        let values = env.data().map_err(|e| ConfigurationError::Generic { source: e.into() })?;
        if let Some(default_dict) = values.get(&figment::Profile::Default) {
            self.providers
                .push(BoxedProvider(Box::new(Serialized::defaults(default_dict.clone()))));
            self.lookup_sources.insert(LookupSource::Environment { prefix });
        }
        Ok(self)
    }

    /// Adds a fixed set of values as a configuration source.
    ///
    /// Mostly useful for overriding values from the command line, or for tests.
    pub fn add_values<T>(mut self, values: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        self.providers.push(BoxedProvider(Box::new(Serialized::defaults(values))));
        self
    }

    /// Consumes the loader, deserializing the merged configuration as `T`.
    ///
    /// ## Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn into_typed<'a, T>(self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        let lookup_sources = self.lookup_sources.clone();
        self.build_figment()
            .extract()
            .map_err(|e| from_figment_error(&lookup_sources, e))
    }

    /// Consumes the loader and wraps the merged configuration for key-based querying.
    pub fn into_generic(self) -> GenericConfiguration {
        let lookup_sources = self.lookup_sources.clone();
        GenericConfiguration {
            inner: Arc::new(Inner {
                figment: self.build_figment(),
                lookup_sources,
            }),
        }
    }

    fn push_resolved<P>(&mut self, provider: P, path: &Path) -> Result<(), ConfigurationError>
    where
        P: Provider,
    {
        // Resolve eagerly so that parse errors surface at load time rather than on first query.
        let data = provider.data().map_err(|e| ConfigurationError::File {
            path: path.to_string_lossy().into_owned(),
            source: e.into(),
        })?;
        if let Some(default_dict) = data.get(&figment::Profile::Default) {
            self.providers
                .push(BoxedProvider(Box::new(Serialized::defaults(default_dict.clone()))));
        }
        Ok(())
    }

    fn build_figment(self) -> Figment {
        self.providers
            .into_iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider))
    }
}

fn read_file(path: &Path) -> Result<String, ConfigurationError> {
    std::fs::read_to_string(path).map_err(|e| ConfigurationError::File {
        path: path.to_string_lossy().into_owned(),
        source: e.into(),
    })
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    lookup_sources: HashSet<LookupSource>,
}

/// A generic configuration object.
///
/// Holds the merged configuration from [`ConfigurationLoader`] in its raw form. Keys use `a.b.c` notation, where
/// periods indicate nesting. Because environment variables cannot express nesting, a nested key that is not found is
/// retried with periods replaced by underscores, so `queue.capacity` also matches `SLUICE_QUEUE_CAPACITY`.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.inner.figment.extract_inner(key) {
            Ok(value) => Ok(value),
            Err(e) => {
                if matches!(e.kind, Kind::MissingField(_)) {
                    let fallback_key = key.replace('.', "_");
                    self.inner
                        .figment
                        .extract_inner(&fallback_key)
                        .map_err(|fallback_e| from_figment_error(&self.inner.lookup_sources, fallback_e))
                } else {
                    Err(from_figment_error(&self.inner.lookup_sources, e))
                }
            }
        }
    }

    /// Gets a configuration value by key.
    ///
    /// ## Errors
    ///
    /// If the key does not exist, or the value could not be deserialized into `T`, an error will be returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.get(key)
    }

    /// Gets a configuration value by key, falling back to `T::default()` if it is missing or invalid.
    ///
    /// This swallows deserialization errors and should be used sparingly.
    pub fn get_typed_or_default<'a, T>(&self, key: &str) -> T
    where
        T: Default + Deserialize<'a>,
    {
        self.get(key).unwrap_or_default()
    }

    /// Gets a configuration value by key, if it exists.
    ///
    /// ## Errors
    ///
    /// If the key exists but the value could not be deserialized into `T`, an error will be returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deserializes the entire configuration as `T`.
    ///
    /// ## Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn as_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner
            .figment
            .extract()
            .map_err(|e| from_figment_error(&self.inner.lookup_sources, e))
    }
}

fn from_figment_error(lookup_sources: &HashSet<LookupSource>, e: figment::Error) -> ConfigurationError {
    match e.kind {
        Kind::MissingField(field) => {
            let mut valid_keys = lookup_sources
                .iter()
                .map(|source| source.transform_key(&field))
                .collect::<Vec<_>>();
            valid_keys.insert(0, field.to_string());

            let help_text = format!("Try setting `{}`.", valid_keys.join("` or `"));
            ConfigurationError::MissingField { help_text, field }
        }
        Kind::InvalidType(actual_ty, expected_ty) => ConfigurationError::InvalidFieldType {
            field: e.path.join("."),
            expected_ty,
            actual_ty: actual_ty.to_string(),
        },
        _ => ConfigurationError::Generic { source: e.into() },
    }
}
