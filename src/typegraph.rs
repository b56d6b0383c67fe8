//! Schema-to-GraphQL-type compiler.
//!
//! Walks a custom type *schema* (not content) and emits the object, union and
//! enum types the normalized content will have. Names come from the same
//! [`naming`](crate::naming) functions the normalizer and slice materializer
//! use, so a node's `internal.type` is always one of the compiled type names.
//!
//! For a `page` type with a `body` slice zone and a `links` group:
//!
//! ```text
//! PrismicPage                    document node (implements Node)
//! PrismicPageDataType            its `data` record
//! PrismicPageLinksGroupType      entries of `links`
//! PrismicPageBodySlicesType      union of the zone's variants
//! PrismicPageBodyText            slice node (implements Node)
//! PrismicPageBodyTextPrimaryType only when the slice has non-repeat fields
//! PrismicPageBodyTextItemType    only when the slice has repeat fields
//! ```
//!
//! Unknown field types do not fail the compile: the field is typed `JSON`,
//! marked unprocessed, and listed in [`TypeGraph::unprocessed`]. The same
//! happens to fields nested deeper than `max_depth`.
//!
//! Besides types the compiler records [`TypePaths`]: for every field path the
//! [`FieldKind`] it normalizes as, so content can be normalized correctly
//! where no schema is at hand (preview).

use crate::classify::FieldKind;
use crate::naming::{
    TypePath, data_type, document_type_name, slice_item_type, slice_items_owner,
    slice_primary_owner, slice_primary_type,
};
use crate::schema::{CustomTypeSchema, FieldSchema, SchemaSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A field of an object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub list: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Original schema type of a field the compiler could not type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unprocessed: Option<String>,
}

impl FieldDef {
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            list: false,
            required: false,
            unprocessed: None,
        }
    }

    pub fn list_of(type_name: impl Into<String>) -> Self {
        Self {
            list: true,
            ..Self::named(type_name)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn unprocessed(field_type: &str) -> Self {
        Self {
            unprocessed: Some(field_type.to_string()),
            ..Self::named(JSON)
        }
    }

    /// GraphQL type reference, e.g. `[PrismicPageBodySlicesType]` or `ID!`.
    pub fn type_ref(&self) -> String {
        let mut out = if self.list {
            format!("[{}]", self.type_name)
        } else {
            self.type_name.clone()
        };
        if self.required {
            out.push('!');
        }
        out
    }
}

/// One emitted type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDescriptor {
    Object {
        name: String,
        fields: BTreeMap<String, FieldDef>,
        /// Node types are registered as nodes by the orchestrator.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        node: bool,
    },
    Union {
        name: String,
        members: Vec<String>,
    },
    Enum {
        name: String,
        values: Vec<String>,
    },
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        match self {
            TypeDescriptor::Object { name, .. }
            | TypeDescriptor::Union { name, .. }
            | TypeDescriptor::Enum { name, .. } => name,
        }
    }

    fn object(name: impl Into<String>, fields: BTreeMap<String, FieldDef>) -> Self {
        TypeDescriptor::Object {
            name: name.into(),
            fields,
            node: false,
        }
    }
}

/// Field path → normalized kind, keyed by owner type and dotted path
/// (`PrismicPage.links.label`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypePaths(BTreeMap<String, FieldKind>);

impl TypePaths {
    fn key(path: &TypePath) -> String {
        format!("{}.{}", path.owner, path.dotted())
    }

    pub fn insert(&mut self, path: &TypePath, kind: FieldKind) {
        self.0.insert(Self::key(path), kind);
    }

    pub fn get(&self, path: &TypePath) -> Option<FieldKind> {
        self.0.get(&Self::key(path)).copied()
    }

    pub fn extend(&mut self, other: TypePaths) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A field the compiler typed as unprocessed `JSON`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprocessedField {
    /// Dotted path from the owning type, e.g. `PrismicPage.body`.
    pub path: String,
    pub field_type: String,
}

/// Compiled types of one custom type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeGraph {
    pub custom_type: String,
    /// Name of the document node type.
    pub root: String,
    pub types: BTreeMap<String, TypeDescriptor>,
    pub type_paths: TypePaths,
    pub unprocessed: Vec<UnprocessedField>,
}

impl TypeGraph {
    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    /// Merge another graph's types and paths into this one.
    pub fn merge(&mut self, other: TypeGraph) {
        self.types.extend(other.types);
        self.type_paths.extend(other.type_paths);
        self.unprocessed.extend(other.unprocessed);
    }

    pub fn to_sdl(&self) -> String {
        to_sdl(self.types.values())
    }
}

const JSON: &str = "JSON";
const STRING: &str = "String";

/// Names of the shared types every custom type refers to.
#[derive(Debug, Clone)]
pub struct BaseTypeNames {
    pub structured_text: String,
    pub link: String,
    pub link_types: String,
    pub image: String,
    pub image_dimensions: String,
    pub image_thumbnail: String,
    pub embed: String,
    pub geo_point: String,
    pub alternate_language: String,
}

impl BaseTypeNames {
    pub fn new(prefix: &str) -> Self {
        Self {
            structured_text: format!("{prefix}StructuredTextType"),
            link: format!("{prefix}LinkType"),
            link_types: format!("{prefix}LinkTypes"),
            image: format!("{prefix}ImageType"),
            image_dimensions: format!("{prefix}ImageDimensionsType"),
            image_thumbnail: format!("{prefix}ImageThumbnailType"),
            embed: format!("{prefix}EmbedType"),
            geo_point: format!("{prefix}GeoPointType"),
            alternate_language: format!("{prefix}AlternateLanguageType"),
        }
    }
}

fn fields(entries: &[(&str, FieldDef)]) -> BTreeMap<String, FieldDef> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn image_fields(names: &BaseTypeNames) -> BTreeMap<String, FieldDef> {
    fields(&[
        ("alt", FieldDef::named(STRING)),
        ("copyright", FieldDef::named(STRING)),
        ("url", FieldDef::named(STRING)),
        ("dimensions", FieldDef::named(&names.image_dimensions)),
        ("localFile", FieldDef::named("File")),
    ])
}

/// Shared types emitted once per build.
pub fn base_types(prefix: &str) -> Vec<TypeDescriptor> {
    let names = BaseTypeNames::new(prefix);
    vec![
        TypeDescriptor::object(
            &names.structured_text,
            fields(&[
                ("html", FieldDef::named(STRING)),
                ("text", FieldDef::named(STRING)),
                ("raw", FieldDef::named(JSON)),
            ]),
        ),
        TypeDescriptor::Enum {
            name: names.link_types.clone(),
            values: vec!["Any".into(), "Document".into(), "Media".into(), "Web".into()],
        },
        TypeDescriptor::object(
            &names.link,
            fields(&[
                ("link_type", FieldDef::named(&names.link_types)),
                ("isBroken", FieldDef::named("Boolean")),
                ("url", FieldDef::named(STRING)),
                ("target", FieldDef::named(STRING)),
                ("size", FieldDef::named("Int")),
                ("id", FieldDef::named("ID")),
                ("type", FieldDef::named(STRING)),
                ("tags", FieldDef::list_of(STRING)),
                ("lang", FieldDef::named(STRING)),
                ("slug", FieldDef::named(STRING)),
                ("uid", FieldDef::named(STRING)),
                ("document", FieldDef::named("Node")),
                ("raw", FieldDef::named(JSON)),
            ]),
        ),
        TypeDescriptor::object(
            &names.image_dimensions,
            fields(&[
                ("width", FieldDef::named("Int").required()),
                ("height", FieldDef::named("Int").required()),
            ]),
        ),
        TypeDescriptor::object(&names.image, image_fields(&names)),
        TypeDescriptor::object(&names.image_thumbnail, image_fields(&names)),
        TypeDescriptor::object(
            &names.embed,
            fields(&[
                ("type", FieldDef::named(STRING)),
                ("embed_url", FieldDef::named(STRING)),
                ("title", FieldDef::named(STRING)),
                ("provider_name", FieldDef::named(STRING)),
                ("thumbnail_url", FieldDef::named(STRING)),
                ("html", FieldDef::named(STRING)),
                ("raw", FieldDef::named(JSON)),
            ]),
        ),
        TypeDescriptor::object(
            &names.geo_point,
            fields(&[
                ("latitude", FieldDef::named("Float")),
                ("longitude", FieldDef::named("Float")),
            ]),
        ),
        TypeDescriptor::object(
            &names.alternate_language,
            fields(&[
                ("id", FieldDef::named("ID")),
                ("uid", FieldDef::named(STRING)),
                ("type", FieldDef::named(STRING)),
                ("lang", FieldDef::named(STRING)),
                ("url", FieldDef::named(STRING)),
                ("document", FieldDef::named("Node")),
                ("raw", FieldDef::named(JSON)),
            ]),
        ),
    ]
}

struct Compiler<'a> {
    names: BaseTypeNames,
    max_depth: usize,
    graph: &'a mut TypeGraph,
}

impl Compiler<'_> {
    fn add(&mut self, descriptor: TypeDescriptor) {
        self.graph
            .types
            .insert(descriptor.name().to_string(), descriptor);
    }

    fn record<'s>(
        &mut self,
        path: &TypePath,
        entries: impl IntoIterator<Item = (&'s str, &'s FieldSchema)>,
        depth: usize,
    ) -> BTreeMap<String, FieldDef> {
        entries
            .into_iter()
            .map(|(key, schema)| {
                let def = self.field(&path.child(key), schema, depth + 1);
                (key.to_string(), def)
            })
            .collect()
    }

    fn mark_unprocessed(&mut self, path: &TypePath, field_type: &str) -> FieldDef {
        self.graph.unprocessed.push(UnprocessedField {
            path: format!("{}.{}", path.owner, path.dotted()),
            field_type: field_type.to_string(),
        });
        FieldDef::unprocessed(field_type)
    }

    fn field(&mut self, path: &TypePath, schema: &FieldSchema, depth: usize) -> FieldDef {
        if depth > self.max_depth {
            return self.mark_unprocessed(path, &schema.field_type);
        }
        self.graph
            .type_paths
            .insert(path, FieldKind::from_field_type(&schema.field_type));

        match schema.field_type.as_str() {
            "StructuredText" => FieldDef::named(&self.names.structured_text),
            "Link" => FieldDef::named(&self.names.link),
            "Image" => self.image(path, schema),
            "Embed" => FieldDef::named(&self.names.embed),
            "GeoPoint" => FieldDef::named(&self.names.geo_point),
            "Text" | "Select" | "Color" | "UID" => FieldDef::named(STRING),
            "Number" | "Range" => FieldDef::named("Float"),
            "Boolean" => FieldDef::named("Boolean"),
            "Date" | "Timestamp" => FieldDef::named("Date"),
            "IntegrationFields" => FieldDef::named(JSON),
            "Group" => {
                let name = path.group_type();
                let group_fields = self.record(
                    path,
                    schema.config.fields.iter().map(|(k, v)| (k.as_str(), v)),
                    depth,
                );
                self.add(TypeDescriptor::object(&name, group_fields));
                FieldDef::list_of(name)
            }
            "Slices" => self.slices(path, schema, depth),
            other => self.mark_unprocessed(path, other),
        }
    }

    fn image(&mut self, path: &TypePath, schema: &FieldSchema) -> FieldDef {
        if schema.config.thumbnails.is_empty() {
            return FieldDef::named(&self.names.image);
        }
        let name = format!("{}ImageType", path.base_name());
        let mut image = image_fields(&self.names);
        for thumbnail in &schema.config.thumbnails {
            image.insert(
                thumbnail.name.clone(),
                FieldDef::named(&self.names.image_thumbnail),
            );
        }
        self.add(TypeDescriptor::object(&name, image));
        FieldDef::named(name)
    }

    fn slices(&mut self, path: &TypePath, schema: &FieldSchema, depth: usize) -> FieldDef {
        let union = path.slices_union();
        let mut members = Vec::new();
        for (slice_type, choice) in &schema.config.choices {
            let node_type = path.slice_node(slice_type);
            let mut slice_fields = fields(&[
                ("id", FieldDef::named("ID").required()),
                ("slice_type", FieldDef::named(STRING).required()),
                ("slice_label", FieldDef::named(STRING)),
            ]);

            if !choice.non_repeat.is_empty() {
                let owner = TypePath::root(slice_primary_owner(&node_type));
                let primary = self.record(
                    &owner,
                    choice.non_repeat.iter().map(|(k, v)| (k.as_str(), v)),
                    depth + 1,
                );
                let name = slice_primary_type(&node_type);
                self.add(TypeDescriptor::object(&name, primary));
                slice_fields.insert("primary".to_string(), FieldDef::named(name));
            }
            if !choice.repeat.is_empty() {
                let owner = TypePath::root(slice_items_owner(&node_type));
                let items = self.record(
                    &owner,
                    choice.repeat.iter().map(|(k, v)| (k.as_str(), v)),
                    depth + 1,
                );
                let name = slice_item_type(&node_type);
                self.add(TypeDescriptor::object(&name, items));
                slice_fields.insert("items".to_string(), FieldDef::list_of(name));
            }

            self.add(TypeDescriptor::Object {
                name: node_type.clone(),
                fields: slice_fields,
                node: true,
            });
            members.push(node_type);
        }
        if members.is_empty() {
            return FieldDef::list_of(JSON);
        }
        self.add(TypeDescriptor::Union {
            name: union.clone(),
            members,
        });
        FieldDef::list_of(union)
    }

    fn document(&mut self, schema: &CustomTypeSchema, root: &str) {
        let path = TypePath::root(root);
        let data = self.record(&path, schema.fields(), 0);
        let data_field = if data.is_empty() {
            FieldDef::named(JSON)
        } else {
            let name = data_type(root);
            self.add(TypeDescriptor::object(&name, data));
            FieldDef::named(name)
        };

        let mut document = fields(&[
            ("id", FieldDef::named("ID").required()),
            ("prismicId", FieldDef::named("ID").required()),
            ("uid", FieldDef::named(STRING)),
            ("type", FieldDef::named(STRING).required()),
            ("lang", FieldDef::named(STRING)),
            ("tags", FieldDef::list_of(STRING)),
            ("href", FieldDef::named(STRING)),
            ("url", FieldDef::named(STRING)),
            ("first_publication_date", FieldDef::named("Date")),
            ("last_publication_date", FieldDef::named("Date")),
            (
                "alternate_languages",
                FieldDef::list_of(&self.names.alternate_language),
            ),
            ("dataRaw", FieldDef::named(JSON)),
            ("dataString", FieldDef::named(STRING)),
            ("_previewable", FieldDef::named("ID").required()),
        ]);
        document.insert("data".to_string(), data_field);
        self.add(TypeDescriptor::Object {
            name: root.to_string(),
            fields: document,
            node: true,
        });
    }
}

/// Compile one custom type schema.
pub fn compile_schema(
    custom_type_id: &str,
    schema: &CustomTypeSchema,
    prefix: &str,
    max_depth: usize,
) -> TypeGraph {
    let root = document_type_name(prefix, custom_type_id);
    let mut graph = TypeGraph {
        custom_type: custom_type_id.to_string(),
        root: root.clone(),
        ..TypeGraph::default()
    };
    let mut compiler = Compiler {
        names: BaseTypeNames::new(prefix),
        max_depth,
        graph: &mut graph,
    };
    compiler.document(schema, &root);
    graph
}

/// Compile every schema plus the shared base types into one graph.
pub fn compile_schemas(schemas: &SchemaSet, prefix: &str, max_depth: usize) -> TypeGraph {
    let mut all = TypeGraph::default();
    for descriptor in base_types(prefix) {
        all.types.insert(descriptor.name().to_string(), descriptor);
    }
    for (id, schema) in schemas {
        all.merge(compile_schema(id, schema, prefix, max_depth));
    }
    all
}

/// Render types as GraphQL SDL.
pub fn to_sdl<'a>(types: impl IntoIterator<Item = &'a TypeDescriptor>) -> String {
    let mut out = String::new();
    for descriptor in types {
        if !out.is_empty() {
            out.push('\n');
        }
        match descriptor {
            TypeDescriptor::Object { name, fields, node } => {
                let implements = if *node { " implements Node" } else { "" };
                let _ = writeln!(out, "type {name}{implements} {{");
                for (field, def) in fields {
                    match &def.unprocessed {
                        Some(original) => {
                            let _ = writeln!(out, "  {field}: {} # unprocessed: {original}", def.type_ref());
                        }
                        None => {
                            let _ = writeln!(out, "  {field}: {}", def.type_ref());
                        }
                    }
                }
                out.push_str("}\n");
            }
            TypeDescriptor::Union { name, members } => {
                let _ = writeln!(out, "union {name} = {}", members.join(" | "));
            }
            TypeDescriptor::Enum { name, values } => {
                let _ = writeln!(out, "enum {name} {{");
                for value in values {
                    let _ = writeln!(out, "  {value}");
                }
                out.push_str("}\n");
            }
        }
    }
    out
}
