mod common;

use common::{blog_post, field, recording_dynamo};
use dynamo::catalog::FIELD_TABLE;
use dynamo::core::DataType;
use dynamo::{
    ColumnKind, Dynamo, DynamoConfig, DynamoError, EntityDef, EntityKey, InMemoryStorage,
    NamespaceDef, UnresolvedFieldPolicy,
};
use std::sync::Arc;

#[tokio::test]
async fn test_blog_post_title_scenario() {
    let (dynamo, storage) = recording_dynamo().await;
    blog_post(&dynamo).await;
    assert_eq!(storage.count("create_table blog__post"), 1);
    dynamo.get_type("blog", "post").await.unwrap();

    let saved = dynamo
        .save_field(field("post", "title", "dynamiccharfield").label("Title"))
        .await
        .unwrap();
    assert!(saved.created);
    assert_eq!(storage.count("add_column blog__post"), 1);
    assert!(!dynamo.cache().contains("blog", "post").await);

    let schema = dynamo.storage().get_schema("blog__post").await.unwrap();
    let column = schema.schema().get_column("title").unwrap();
    assert_eq!(column.data_type, DataType::Text);
    assert!(column.nullable);

    let post = dynamo.get_type("blog", "post").await.unwrap();
    assert_eq!(post.table_name, "blog__post");
    assert_eq!(post.field_names(), vec!["title"]);
    let title = post.field("title").unwrap();
    assert_eq!(title.column.kind, ColumnKind::Char);
    assert_eq!(title.column.max_length, Some(255));
    assert_eq!(title.column.label, "Title");
    assert!(title.column.nullable);
    assert!(!title.column.unique);
    assert_eq!(post.meta.verbose_name, "Post");
    assert_eq!(post.meta.verbose_name_plural, "Posts");
    assert_eq!(post.meta.namespace_label, "Blog");
}

#[tokio::test]
async fn test_reference_field_resolves_to_sibling_entity() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    blog_post(&dynamo).await;
    dynamo
        .save_entity(EntityDef::new("blog", "author", "Author"))
        .await
        .unwrap();

    dynamo
        .save_field(field("post", "author", "author"))
        .await
        .unwrap();

    let post = dynamo.get_type("blog", "post").await.unwrap();
    let author = post.field("author").unwrap();
    assert_eq!(
        author.column.kind,
        ColumnKind::Reference {
            target: EntityKey::new("blog", "author")
        }
    );
    assert_eq!(author.column.kind.data_type(), DataType::Integer);
    assert!(post.warnings.is_empty());
}

#[tokio::test]
async fn test_reference_to_other_namespace_is_rejected() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    blog_post(&dynamo).await;
    dynamo
        .save_namespace(NamespaceDef::new("shop", "Shop"))
        .await
        .unwrap();
    dynamo
        .save_entity(EntityDef::new("shop", "product", "Product"))
        .await
        .unwrap();

    let err = dynamo
        .save_field(dynamo::FieldDef::new("shop", "product", "post", "post"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::UnresolvableFieldType { .. }));
    let schema = dynamo.storage().get_schema("shop__product").await.unwrap();
    assert!(schema.schema().get_column("post").is_none());
}

#[tokio::test]
async fn test_unknown_tag_rejected_at_save() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    blog_post(&dynamo).await;

    let err = dynamo
        .save_field(field("post", "price", "dynamicmoneyfield"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::UnresolvableFieldType { .. }));
}

#[tokio::test]
async fn test_entity_resave_creates_table_once() {
    let (dynamo, storage) = recording_dynamo().await;
    blog_post(&dynamo).await;
    assert_eq!(storage.count("create_table blog__post"), 1);

    let saved = dynamo
        .save_entity(EntityDef::new("blog", "post", "Article"))
        .await
        .unwrap();
    assert!(!saved.created);
    assert_eq!(saved.record.label, "Article");
    assert_eq!(storage.count("create_table blog__post"), 1);

    let post = dynamo.get_type("blog", "post").await.unwrap();
    assert_eq!(post.meta.verbose_name, "Article");
}

#[tokio::test]
async fn test_field_delete_drops_column_before_catalog_row() {
    let (dynamo, storage) = recording_dynamo().await;
    blog_post(&dynamo).await;
    dynamo
        .save_field(field("post", "title", "dynamiccharfield"))
        .await
        .unwrap();
    storage.clear();

    dynamo.delete_field("blog", "post", "title").await.unwrap();

    let drop = storage.position("drop_column blog__post").unwrap();
    let delete = storage
        .position(&format!("delete_row {}", FIELD_TABLE))
        .unwrap();
    assert!(drop < delete);
    assert_eq!(storage.calls().last().map(String::as_str), Some("commit"));

    let post = dynamo.get_type("blog", "post").await.unwrap();
    assert!(post.fields.is_empty());
}

#[tokio::test]
async fn test_failed_add_column_rolls_back_field_row() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    blog_post(&dynamo).await;
    dynamo
        .save_field(field("post", "title", "dynamiccharfield"))
        .await
        .unwrap();
    let posts = dynamo.handle("blog", "post").await.unwrap();
    posts
        .insert(&dynamo::EntityInstance::new().with("title", "Hello"))
        .await
        .unwrap();

    let err = dynamo
        .save_field(field("post", "slug", "dynamiccharfield").not_null())
        .await
        .unwrap_err();
    match err {
        DynamoError::SchemaMutationFailure {
            table, operation, ..
        } => {
            assert_eq!(table, "blog__post");
            assert_eq!(operation, "add_column");
        }
        other => panic!("unexpected error: {other}"),
    }

    let key = EntityKey::new("blog", "post");
    let (_, entity) = dynamo.catalog().require_entity(&key).await.unwrap();
    assert!(dynamo.catalog().field(entity.id, "slug").await.unwrap().is_none());
    let post = dynamo.get_type("blog", "post").await.unwrap();
    assert_eq!(post.field_names(), vec!["title"]);
}

#[tokio::test]
async fn test_field_update_keeps_physical_column() {
    let (dynamo, storage) = recording_dynamo().await;
    blog_post(&dynamo).await;
    dynamo
        .save_field(field("post", "body", "dynamiccharfield"))
        .await
        .unwrap();
    storage.clear();

    let saved = dynamo
        .save_field(field("post", "body", "dynamictextfield").label("Body"))
        .await
        .unwrap();
    assert!(!saved.created);
    assert!(storage.position("add_column blog__post").is_none());
    assert!(storage.position("drop_column blog__post").is_none());

    let post = dynamo.get_type("blog", "post").await.unwrap();
    let body = post.field("body").unwrap();
    assert_eq!(body.column.kind, ColumnKind::Text);
    assert_eq!(body.column.label, "Body");
}

#[tokio::test]
async fn test_create_variants_refuse_existing_keys() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    dynamo
        .create_namespace(NamespaceDef::new("blog", "Blog"))
        .await
        .unwrap();
    let err = dynamo
        .create_namespace(NamespaceDef::new("blog", "Other"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::DuplicateDefinition(_)));

    dynamo
        .create_entity(EntityDef::new("blog", "post", "Post"))
        .await
        .unwrap();
    let err = dynamo
        .create_entity(EntityDef::new("blog", "post", "Post"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::DuplicateDefinition(_)));

    dynamo
        .create_field(field("post", "title", "dynamiccharfield"))
        .await
        .unwrap();
    let err = dynamo
        .create_field(field("post", "title", "dynamictextfield"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::DuplicateDefinition(_)));
}

#[tokio::test]
async fn test_invalid_names_and_defaults() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    let err = dynamo
        .save_namespace(NamespaceDef::new("my blog", "Blog"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::InvalidName(..)));

    blog_post(&dynamo).await;
    let err = dynamo
        .save_field(field("post", "id", "dynamicintegerfield"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::InvalidName(..)));

    let err = dynamo
        .save_field(field("post", "views", "dynamicintegerfield").default_value("many"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::InvalidDefault { .. }));
}

#[tokio::test]
async fn test_delete_entity_guards_and_cleanup() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    blog_post(&dynamo).await;
    dynamo
        .save_entity(EntityDef::new("blog", "author", "Author"))
        .await
        .unwrap();
    dynamo
        .save_field(field("post", "author", "author"))
        .await
        .unwrap();

    let err = dynamo.delete_entity("blog", "author").await.unwrap_err();
    assert!(matches!(err, DynamoError::ConstraintViolation(_)));
    assert!(dynamo.storage().table_exists("blog__author").await);

    dynamo.delete_field("blog", "post", "author").await.unwrap();
    dynamo.delete_entity("blog", "author").await.unwrap();
    assert!(!dynamo.storage().table_exists("blog__author").await);
    assert!(matches!(
        dynamo.get_type("blog", "author").await.unwrap_err(),
        DynamoError::EntityNotFound(..)
    ));

    let err = dynamo.delete_namespace("blog").await.unwrap_err();
    assert!(matches!(err, DynamoError::NamespaceNotEmpty(_)));
    dynamo.delete_entity("blog", "post").await.unwrap();
    dynamo.delete_namespace("blog").await.unwrap();
    assert!(dynamo.catalog().namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_tables_skips_existing() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    blog_post(&dynamo).await;

    let namespace = dynamo.catalog().require_namespace("blog").await.unwrap();
    dynamo
        .catalog()
        .insert_entity(namespace.id, &EntityDef::new("blog", "draft", "Draft"))
        .await
        .unwrap();
    assert!(!dynamo.storage().table_exists("blog__draft").await);

    let report = dynamo
        .create_tables(&[EntityKey::new("blog", "post"), EntityKey::new("blog", "draft")])
        .await
        .unwrap();
    assert_eq!(report.created, vec![EntityKey::new("blog", "draft")]);
    assert_eq!(report.skipped, vec![EntityKey::new("blog", "post")]);
    assert!(dynamo.storage().table_exists("blog__draft").await);
}

#[tokio::test]
async fn test_table_names_never_collide() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    for namespace in ["blog", "blog_x"] {
        dynamo
            .save_namespace(NamespaceDef::new(namespace, namespace))
            .await
            .unwrap();
    }
    dynamo
        .save_entity(EntityDef::new("blog_x", "post", "Post"))
        .await
        .unwrap();
    dynamo
        .save_entity(EntityDef::new("blog", "x_post", "X Post"))
        .await
        .unwrap();
    assert!(dynamo.storage().table_exists("blog_x__post").await);
    assert!(dynamo.storage().table_exists("blog__x_post").await);

    dynamo
        .save_namespace(NamespaceDef::new("dynamo", "Dynamo"))
        .await
        .unwrap();
    dynamo
        .save_entity(EntityDef::new("dynamo", "field", "Field"))
        .await
        .unwrap();
    assert!(dynamo.storage().table_exists("dynamo__field").await);
    assert_eq!(dynamo.catalog().namespaces().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_names_that_break_table_encoding_are_rejected() {
    let dynamo = Dynamo::in_memory().await.unwrap();
    for name in ["blog__x", "_blog", "blog_"] {
        let err = dynamo
            .save_namespace(NamespaceDef::new(name, "Blog"))
            .await
            .unwrap_err();
        assert!(matches!(err, DynamoError::InvalidName(..)), "{name}");
    }

    blog_post(&dynamo).await;
    for name in ["x__post", "_post", "post_"] {
        let err = dynamo
            .create_entity(EntityDef::new("blog", name, "Post"))
            .await
            .unwrap_err();
        assert!(matches!(err, DynamoError::InvalidName(..)), "{name}");
    }
    assert_eq!(dynamo.storage().list_tables().await.len(), 4);
}

#[tokio::test]
async fn test_fallback_policy_still_rejects_unknown_tag_at_save() {
    let config =
        DynamoConfig::default().unresolved_field_policy(UnresolvedFieldPolicy::FallbackToChar);
    let dynamo = Dynamo::new(Arc::new(InMemoryStorage::new()), config);
    dynamo.install().await.unwrap();
    blog_post(&dynamo).await;

    let err = dynamo
        .save_field(field("post", "price", "dynamicmoneyfield"))
        .await
        .unwrap_err();
    assert!(matches!(err, DynamoError::UnresolvableFieldType { .. }));
    let post = dynamo.get_type("blog", "post").await.unwrap();
    assert!(post.fields.is_empty());
}
