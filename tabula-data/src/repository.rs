use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tabula_core::QueryParams;

use crate::config::DataConfig;
use crate::entity::{Entity, EntityHooks, EntityKind, NoHooks};
use crate::error::DataError;
use crate::page::{PageSettings, Paginator, RESERVED_PARAMS};
use crate::payload::Payload;
use crate::schema::EntityConfig;
use crate::storage::StorageEngine;
use crate::translate::ErrorTranslator;
use crate::typed::{TypeLookup, TypeTableHooks, TypedHooks, DEFAULT_LABEL_FIELD};
use crate::Record;

enum Role {
    Plain,
    TypeTable { label_field: String },
    Typed { type_kind: String },
    Custom(Arc<dyn EntityHooks>),
}

struct Registration {
    config: EntityConfig,
    role: Role,
}

/// Assembles a [`Repository`]: every entity kind is declared here with an
/// explicit name, and the wiring between typed kinds and their type tables
/// is checked once in [`build`](Self::build).
///
/// ```ignore
/// let repo = RepositoryBuilder::new(storage)
///     .settings(config.typed().clone())
///     .type_table(EntityConfig::new("document_type").with_column(ColumnDefinition::string("label")))
///     .typed_entity(document_config, "document_type")
///     .default_kind("document")
///     .build()?;
/// ```
pub struct RepositoryBuilder {
    storage: Arc<dyn StorageEngine>,
    settings: DataConfig,
    translator: Option<Arc<ErrorTranslator>>,
    registrations: Vec<Registration>,
    default_kind: Option<String>,
}

impl RepositoryBuilder {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self {
            storage,
            settings: DataConfig::default(),
            translator: None,
            registrations: Vec::new(),
            default_kind: None,
        }
    }

    pub fn settings(mut self, settings: DataConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Use `translator` instead of the one derived from the settings.
    pub fn translator(mut self, translator: ErrorTranslator) -> Self {
        self.translator = Some(Arc::new(translator));
        self
    }

    pub fn entity(self, config: EntityConfig) -> Self {
        self.register(config, Role::Plain)
    }

    pub fn entity_with_hooks(self, config: EntityConfig, hooks: Arc<dyn EntityHooks>) -> Self {
        self.register(config, Role::Custom(hooks))
    }

    /// An `(id, label)` enumeration table whose writes invalidate its cached snapshot.
    pub fn type_table(self, config: EntityConfig) -> Self {
        self.type_table_with_label(config, DEFAULT_LABEL_FIELD)
    }

    pub fn type_table_with_label(self, config: EntityConfig, label_field: &str) -> Self {
        self.register(
            config,
            Role::TypeTable {
                label_field: label_field.to_string(),
            },
        )
    }

    /// An entity that stores `type_id` but accepts a `type` label resolved
    /// through `type_kind`.
    pub fn typed_entity(self, config: EntityConfig, type_kind: &str) -> Self {
        self.register(
            config,
            Role::Typed {
                type_kind: type_kind.to_string(),
            },
        )
    }

    /// Kind used when a caller asks for the empty name.
    pub fn default_kind(mut self, name: &str) -> Self {
        self.default_kind = Some(name.to_string());
        self
    }

    fn register(mut self, config: EntityConfig, role: Role) -> Self {
        self.registrations.push(Registration { config, role });
        self
    }

    pub fn build(self) -> Result<Repository, DataError> {
        let lookup = TypeLookup::new(self.storage.clone());
        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(self.settings.translator()));

        for reg in &self.registrations {
            if reg.config.name.is_empty() {
                return Err(DataError::Schema("entity kinds need a name".to_string()));
            }
            if let Role::TypeTable { label_field } = &reg.role {
                if !reg.config.can_filter(label_field) {
                    return Err(DataError::Schema(format!(
                        "type table {} has no '{label_field}' column",
                        reg.config.name
                    )));
                }
                lookup.register(&reg.config.name, &reg.config.id_field, label_field);
            }
        }

        let mut kinds = HashMap::with_capacity(self.registrations.len());
        for reg in self.registrations {
            let hooks: Arc<dyn EntityHooks> = match reg.role {
                Role::Plain => Arc::new(NoHooks),
                Role::Custom(hooks) => hooks,
                Role::TypeTable { .. } => Arc::new(TypeTableHooks::new(lookup.clone())),
                Role::Typed { type_kind } => {
                    if !lookup.is_registered(&type_kind) {
                        return Err(DataError::Schema(format!(
                            "{} references {type_kind}, which is not a registered type table",
                            reg.config.name
                        )));
                    }
                    let hooks = TypedHooks::new(lookup.clone(), type_kind);
                    if !reg.config.can_filter(hooks.foreign_key()) {
                        return Err(DataError::Schema(format!(
                            "typed entity {} has no '{}' column",
                            reg.config.name,
                            hooks.foreign_key()
                        )));
                    }
                    Arc::new(hooks)
                }
            };

            let name = reg.config.name.clone();
            let kind = EntityKind::new(reg.config, self.storage.clone())
                .with_translator(translator.clone())
                .with_sanitizer(self.settings.sanitizer())
                .with_hooks(hooks)
                .with_max_limit(self.settings.max_limit);
            if kinds.insert(name.clone(), Arc::new(kind)).is_some() {
                return Err(DataError::Schema(format!("entity kind {name} registered twice")));
            }
        }

        if let Some(default) = &self.default_kind {
            if !kinds.contains_key(default) {
                return Err(DataError::Schema(format!("default kind {default} is not registered")));
            }
        }

        tracing::debug!(kinds = kinds.len(), "repository built");
        Ok(Repository {
            kinds,
            default_kind: self.default_kind,
            lookup,
            page: self.settings.page_settings(),
        })
    }
}

/// Registry of entity kinds with uniform CRUD and list operations.
pub struct Repository {
    kinds: HashMap<String, Arc<EntityKind>>,
    default_kind: Option<String>,
    lookup: TypeLookup,
    page: PageSettings,
}

impl Repository {
    pub fn builder(storage: Arc<dyn StorageEngine>) -> RepositoryBuilder {
        RepositoryBuilder::new(storage)
    }

    /// Resolve `name`; the empty name means the default kind.
    pub fn kind(&self, name: &str) -> Result<&Arc<EntityKind>, DataError> {
        let name = match (name, &self.default_kind) {
            ("", Some(default)) => default.as_str(),
            (name, _) => name,
        };
        self.kinds
            .get(name)
            .ok_or_else(|| DataError::UnknownModel(name.to_string()))
    }

    /// A fresh, unloaded entity of kind `name`.
    pub fn get_model(&self, name: &str) -> Result<Entity, DataError> {
        Ok(self.kind(name)?.entity())
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn type_lookup(&self) -> &TypeLookup {
        &self.lookup
    }

    pub fn page_settings(&self) -> PageSettings {
        self.page
    }

    pub async fn find_all(&self, name: &str, filters: &Record, limit: u64, offset: u64) -> Result<Vec<Record>, DataError> {
        self.kind(name)?.find_all(filters, limit, offset).await
    }

    /// The entity with id `id`, or [`DataError::NotLoaded`].
    pub async fn find_by_id(&self, name: &str, id: i64) -> Result<Entity, DataError> {
        let kind = self.kind(name)?;
        let mut entity = kind.entity();
        entity.load(id).await?;
        if !entity.is_loaded() {
            return Err(DataError::not_loaded(kind.name(), id));
        }
        Ok(entity)
    }

    pub async fn create(&self, name: &str, fields: Record) -> Result<i64, DataError> {
        self.get_model(name)?.store(fields).await
    }

    /// Store `fields` on the existing row `id`.
    ///
    /// The id is written into the submission under the kind's id field, so
    /// the update always targets the addressed row.
    pub async fn update_by_id(&self, name: &str, id: i64, mut fields: Record) -> Result<i64, DataError> {
        let mut entity = self.find_by_id(name, id).await?;
        fields.insert(entity.id_field().to_string(), Value::from(id));
        entity.store(fields).await
    }

    pub async fn delete_by_id(&self, name: &str, id: i64) -> Result<u64, DataError> {
        self.kind(name)?.delete_by_id(id).await
    }

    pub async fn count(&self, name: &str) -> Result<u64, DataError> {
        self.kind(name)?.count().await
    }

    /// One page of `name` as a list envelope.
    ///
    /// `limit` and `offset` drive the paginator; every other query parameter
    /// is applied as an equality filter (undeclared columns are ignored).
    pub async fn list(&self, name: &str, path: &str, params: &QueryParams) -> Result<Payload, DataError> {
        let kind = self.kind(name)?;
        let paginator = Paginator::new(kind.clone(), path, params.clone(), self.page);

        let filters: Record = params
            .without(&RESERVED_PARAMS)
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();

        let rows = kind
            .find_all(&filters, paginator.limit(), paginator.offset())
            .await?
            .iter()
            .map(|row| Value::Object(kind.visible(row)))
            .collect();
        let links = paginator.links().await?;
        Ok(Payload::list(Value::Array(rows), links))
    }
}
