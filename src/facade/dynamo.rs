use crate::catalog::validation::{
    validate_field_name, validate_help_text, validate_key_segment, validate_label,
};
use crate::catalog::{
    CatalogStore, EntityDef, EntityKey, EntityRecord, FieldDef, FieldRecord, NamespaceDef,
    NamespaceRecord,
};
use crate::config::DynamoConfig;
use crate::core::{DynamoError, Result};
use crate::fields::{ChoiceSet, ChoiceSetProvider, ColumnSpec, FieldSpecRegistry};
use crate::rows::TypeHandle;
use crate::schema::{AlterOutcome, SchemaMutator};
use crate::storage::{InMemoryStorage, StorageEngine};
use crate::synth::{EntityTypeCache, SynthesizedType, TypeSynthesizer};
use crate::transaction::TransactionId;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a save: the stored record and whether it was newly created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Saved<T> {
    pub record: T,
    pub created: bool,
}

/// Outcome of the bulk create-table action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateTablesReport {
    pub created: Vec<EntityKey>,
    /// Entities whose table already existed.
    pub skipped: Vec<EntityKey>,
}

/// Entry point for defining namespaces, entities and fields at runtime.
///
/// Each save or delete runs as one unit of work: catalog rows and physical
/// schema changes commit together or not at all. The affected cached types
/// are invalidated once the unit ends, whether it committed or rolled back.
///
/// # Examples
///
/// ```
/// use dynamo::{Dynamo, EntityDef, FieldDef, NamespaceDef};
///
/// # tokio_test::block_on(async {
/// let dynamo = Dynamo::in_memory().await.unwrap();
/// dynamo.save_namespace(NamespaceDef::new("blog", "Blog")).await.unwrap();
/// dynamo.save_entity(EntityDef::new("blog", "post", "Post")).await.unwrap();
/// dynamo
///     .save_field(FieldDef::new("blog", "post", "title", "dynamiccharfield"))
///     .await
///     .unwrap();
///
/// let post = dynamo.get_type("blog", "post").await.unwrap();
/// assert_eq!(post.field_names(), vec!["title"]);
/// # });
/// ```
pub struct Dynamo {
    config: DynamoConfig,
    pub(super) storage: Arc<dyn StorageEngine>,
    catalog: CatalogStore,
    registry: FieldSpecRegistry,
    cache: EntityTypeCache,
    choices: ChoiceSetProvider,
    mutator: SchemaMutator,
}

impl Dynamo {
    /// Build an engine over `storage`. Call [`install`](Self::install) before
    /// defining anything.
    pub fn new(storage: Arc<dyn StorageEngine>, config: DynamoConfig) -> Self {
        let catalog = CatalogStore::new(Arc::clone(&storage));
        let synthesizer = TypeSynthesizer::new(&config);
        Self {
            registry: FieldSpecRegistry::new(&config),
            cache: EntityTypeCache::new(catalog.clone(), synthesizer),
            choices: ChoiceSetProvider::new(catalog.clone()),
            mutator: SchemaMutator::new(Arc::clone(&storage)),
            catalog,
            storage,
            config,
        }
    }

    /// Installed engine over a fresh in-memory store with default config.
    pub async fn in_memory() -> Result<Self> {
        let dynamo = Self::new(Arc::new(InMemoryStorage::new()), DynamoConfig::default());
        dynamo.install().await?;
        Ok(dynamo)
    }

    pub fn config(&self) -> &DynamoConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        &self.storage
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn cache(&self) -> &EntityTypeCache {
        &self.cache
    }

    /// Create the catalog system tables; safe to call repeatedly.
    pub async fn install(&self) -> Result<()> {
        self.catalog.install().await
    }

    // ------------------------------------------------------------------
    // Type catalog
    // ------------------------------------------------------------------

    pub async fn get_type(&self, namespace: &str, name: &str) -> Result<Arc<SynthesizedType>> {
        self.cache.get(namespace, name).await
    }

    /// Row-level access to the physical table of a synthesized type.
    pub async fn handle(&self, namespace: &str, name: &str) -> Result<TypeHandle> {
        let ty = self.get_type(namespace, name).await?;
        Ok(TypeHandle::new(ty, Arc::clone(&self.storage)))
    }

    pub async fn choices(&self) -> ChoiceSet {
        self.choices.current_choices().await
    }

    // ------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------

    pub async fn save_namespace(&self, def: NamespaceDef) -> Result<Saved<NamespaceRecord>> {
        validate_key_segment(&def.name)?;
        validate_label(&def.label)?;

        let txn = self.begin_unit().await?;
        let outcome = self.save_namespace_in_unit(txn, &def).await;
        let saved = self.finish(txn, outcome).await;
        self.cache.invalidate_namespace(&def.name).await;

        let saved = saved?;
        if saved.created {
            info!("Created namespace '{}'", def.name);
        }
        Ok(saved)
    }

    async fn save_namespace_in_unit(
        &self,
        txn: TransactionId,
        def: &NamespaceDef,
    ) -> Result<Saved<NamespaceRecord>> {
        let catalog = self.catalog.in_unit(txn);
        match catalog.namespace(&def.name).await? {
            Some(mut record) => {
                record.label = def.label.clone();
                catalog.update_namespace(&record).await?;
                Ok(Saved {
                    record,
                    created: false,
                })
            }
            None => Ok(Saved {
                record: catalog.insert_namespace(def).await?,
                created: true,
            }),
        }
    }

    /// Like [`save_namespace`](Self::save_namespace) but refuses to update.
    pub async fn create_namespace(&self, def: NamespaceDef) -> Result<NamespaceRecord> {
        validate_key_segment(&def.name)?;
        if self.catalog.namespace(&def.name).await?.is_some() {
            return Err(DynamoError::DuplicateDefinition(format!(
                "namespace '{}' already exists",
                def.name
            )));
        }
        Ok(self.save_namespace(def).await?.record)
    }

    /// Remove an empty namespace.
    pub async fn delete_namespace(&self, name: &str) -> Result<()> {
        let namespace = self.catalog.require_namespace(name).await?;
        if !self.catalog.entities_in(namespace.id).await?.is_empty() {
            return Err(DynamoError::NamespaceNotEmpty(name.to_string()));
        }
        let txn = self.begin_unit().await?;
        let outcome = self
            .catalog
            .in_unit(txn)
            .delete_namespace(namespace.id)
            .await
            .map(|_| ());
        let finished = self.finish(txn, outcome).await;
        self.cache.invalidate_namespace(name).await;
        finished?;
        info!("Deleted namespace '{}'", name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Insert or update an entity definition.
    ///
    /// The first save creates the physical table.
    pub async fn save_entity(&self, def: EntityDef) -> Result<Saved<EntityRecord>> {
        validate_key_segment(&def.name)?;
        validate_label(&def.label)?;

        let txn = self.begin_unit().await?;
        let outcome = self.save_entity_in_unit(txn, &def).await;
        let saved = self.finish(txn, outcome).await;
        self.cache.invalidate(&def.namespace, &def.name).await;

        let saved = saved?;
        if saved.created {
            info!("Created entity {}", def.key());
        }
        Ok(saved)
    }

    async fn save_entity_in_unit(
        &self,
        txn: TransactionId,
        def: &EntityDef,
    ) -> Result<Saved<EntityRecord>> {
        let catalog = self.catalog.in_unit(txn);
        let namespace = catalog.require_namespace(&def.namespace).await?;

        if let Some(mut record) = catalog.entity(namespace.id, &def.name).await? {
            record.label = def.label.clone();
            catalog.update_entity(&record).await?;
            return Ok(Saved {
                record,
                created: false,
            });
        }

        let record = catalog.insert_entity(namespace.id, def).await?;
        let snapshot = catalog.snapshot(&def.key()).await?;
        let ty = self.cache.synthesizer().synthesize(&snapshot)?;
        self.mutator.in_unit(txn).create_table(&ty).await?;
        Ok(Saved {
            record,
            created: true,
        })
    }

    /// Like [`save_entity`](Self::save_entity) but refuses to update.
    pub async fn create_entity(&self, def: EntityDef) -> Result<EntityRecord> {
        validate_key_segment(&def.name)?;
        let namespace = self.catalog.require_namespace(&def.namespace).await?;
        if self.catalog.entity(namespace.id, &def.name).await?.is_some() {
            return Err(DynamoError::DuplicateDefinition(format!(
                "entity '{}' already exists",
                def.key()
            )));
        }
        Ok(self.save_entity(def).await?.record)
    }

    /// Drop an entity's table, fields and record.
    ///
    /// Refused while another field in the namespace references the entity.
    pub async fn delete_entity(&self, namespace: &str, name: &str) -> Result<()> {
        let key = EntityKey::new(namespace, name);
        let txn = self.begin_unit().await?;
        let outcome = self.delete_entity_in_unit(txn, &key).await;
        let finished = self.finish(txn, outcome).await;
        self.cache.invalidate_namespace(namespace).await;
        finished?;

        info!("Deleted entity {}", key);
        Ok(())
    }

    async fn delete_entity_in_unit(&self, txn: TransactionId, key: &EntityKey) -> Result<()> {
        let catalog = self.catalog.in_unit(txn);
        let (namespace, entity) = catalog.require_entity(key).await?;

        for sibling in catalog.entities_in(namespace.id).await? {
            if sibling.id == entity.id {
                continue;
            }
            let referencing = catalog
                .fields_of(sibling.id)
                .await?
                .into_iter()
                .find(|f| f.field_type == entity.name && !FieldSpecRegistry::is_builtin(&f.field_type));
            if let Some(field) = referencing {
                return Err(DynamoError::ConstraintViolation(format!(
                    "{} is referenced by field '{}' of '{}'",
                    key, field.name, sibling.name
                )));
            }
        }

        let table = key.table_name();
        if self.storage.table_exists(&table).await {
            self.mutator.in_unit(txn).drop_table(&table).await?;
        }
        for field in catalog.fields_of(entity.id).await? {
            catalog.delete_field(field.id).await?;
        }
        catalog.delete_entity(entity.id).await?;
        Ok(())
    }

    /// Admin bulk action: create the physical table of each listed entity
    /// that does not have one yet.
    pub async fn create_tables(&self, keys: &[EntityKey]) -> Result<CreateTablesReport> {
        let mut report = CreateTablesReport::default();
        for key in keys {
            let ty = self.get_type(&key.namespace, &key.name).await?;
            if self.storage.table_exists(&ty.table_name).await {
                report.skipped.push(key.clone());
                continue;
            }
            let txn = self.begin_unit().await?;
            let outcome = self.mutator.in_unit(txn).create_table(&ty).await;
            self.finish(txn, outcome).await?;
            report.created.push(key.clone());
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Insert or update a field definition.
    ///
    /// The first save adds the physical column; later saves go through the
    /// alter-column hook, which leaves the column as it is.
    pub async fn save_field(&self, def: FieldDef) -> Result<Saved<FieldRecord>> {
        validate_field_name(&def.name)?;
        validate_label(&def.label)?;
        validate_help_text(def.help_text.as_deref())?;

        let key = def.entity_key();
        let (namespace, entity) = self.catalog.require_entity(&key).await?;
        let spec = self.column_for(&namespace, &def).await?;

        let txn = self.begin_unit().await?;
        let outcome = self
            .save_field_in_unit(txn, &namespace, &entity, &def, &spec)
            .await;
        let saved = self.finish(txn, outcome).await;
        self.cache.invalidate(&key.namespace, &key.name).await;

        let saved = saved?;
        if saved.created {
            info!("Added field '{}' ({}) to {}", def.name, def.field_type, key);
        }
        Ok(saved)
    }

    async fn save_field_in_unit(
        &self,
        txn: TransactionId,
        namespace: &NamespaceRecord,
        entity: &EntityRecord,
        def: &FieldDef,
        spec: &ColumnSpec,
    ) -> Result<Saved<FieldRecord>> {
        let table = def.entity_key().table_name();
        let catalog = self.catalog.in_unit(txn);
        let mutator = self.mutator.in_unit(txn);

        let Some(existing) = catalog.field(entity.id, &def.name).await? else {
            let record = catalog.insert_field(entity.id, def).await?;
            mutator.add_column(&table, &def.name, spec).await?;
            return Ok(Saved {
                record,
                created: true,
            });
        };

        let record = FieldRecord {
            id: existing.id,
            entity_id: existing.entity_id,
            name: def.name.clone(),
            label: def.label.clone(),
            field_type: def.field_type.clone(),
            nullable: def.nullable,
            blank: def.blank,
            unique: def.unique,
            default: def.default.clone(),
            help_text: def.help_text.clone(),
        };
        catalog.update_field(&record).await?;

        match self.existing_column(namespace, &existing).await {
            Some(old) => {
                if mutator.alter_column(&table, &def.name, &old, spec).await?
                    == AlterOutcome::Deferred
                {
                    warn!(
                        "Field '{}' on {} now differs from its physical column",
                        def.name,
                        def.entity_key()
                    );
                }
            }
            None => warn!(
                "Previous type '{}' of field '{}' no longer resolves; alter skipped",
                existing.field_type, def.name
            ),
        }

        Ok(Saved {
            record,
            created: false,
        })
    }

    /// Like [`save_field`](Self::save_field) but refuses to update.
    pub async fn create_field(&self, def: FieldDef) -> Result<FieldRecord> {
        let (_, entity) = self.catalog.require_entity(&def.entity_key()).await?;
        if self.catalog.field(entity.id, &def.name).await?.is_some() {
            return Err(DynamoError::DuplicateDefinition(format!(
                "field '{}' on '{}' already exists",
                def.name,
                def.entity_key()
            )));
        }
        Ok(self.save_field(def).await?.record)
    }

    /// Drop the field's column, then its catalog row.
    pub async fn delete_field(&self, namespace: &str, entity: &str, field: &str) -> Result<()> {
        let key = EntityKey::new(namespace, entity);
        let txn = self.begin_unit().await?;
        let outcome = self.delete_field_in_unit(txn, &key, field).await;
        let finished = self.finish(txn, outcome).await;
        self.cache.invalidate(namespace, entity).await;
        finished?;

        info!("Removed field '{}' from {}", field, key);
        Ok(())
    }

    async fn delete_field_in_unit(
        &self,
        txn: TransactionId,
        key: &EntityKey,
        field: &str,
    ) -> Result<()> {
        let catalog = self.catalog.in_unit(txn);
        let (_, entity) = catalog.require_entity(key).await?;
        let record = catalog
            .field(entity.id, field)
            .await?
            .ok_or_else(|| DynamoError::FieldNotFound(field.to_string(), key.to_string()))?;

        self.mutator
            .in_unit(txn)
            .drop_column(&key.table_name(), field)
            .await?;
        catalog.delete_field(record.id).await?;
        Ok(())
    }

    /// Resolve a field definition's tag and attributes to a column now, so a
    /// bad tag or default is rejected at save time.
    async fn column_for(&self, namespace: &NamespaceRecord, def: &FieldDef) -> Result<ColumnSpec> {
        let attrs = def.attributes();
        let unresolvable = || DynamoError::UnresolvableFieldType {
            field: def.name.clone(),
            tag: def.field_type.clone(),
        };

        if self.config.validate_choices_on_save {
            let choices = self.choices.current_choices().await;
            if !choices.degraded && !choices.contains(&def.field_type) {
                return Err(unresolvable());
            }
        }

        if let Some(spec) = self.registry.resolve(&def.field_type, &attrs)? {
            return Ok(spec);
        }
        match self.catalog.entity(namespace.id, &def.field_type).await? {
            Some(target) => self
                .registry
                .reference(EntityKey::new(namespace.name.clone(), target.name), &attrs),
            None => Err(unresolvable()),
        }
    }

    async fn existing_column(
        &self,
        namespace: &NamespaceRecord,
        record: &FieldRecord,
    ) -> Option<ColumnSpec> {
        let attrs = record.attributes();
        match self.registry.resolve(&record.field_type, &attrs) {
            Ok(Some(spec)) => return Some(spec),
            Ok(None) => {}
            Err(_) => return None,
        }
        let target = self
            .catalog
            .entity(namespace.id, &record.field_type)
            .await
            .ok()??;
        self.registry
            .reference(EntityKey::new(namespace.name.clone(), target.name), &attrs)
            .ok()
    }
}
