//! Field classification: decide how a raw field value is normalized.
//!
//! ## Resolution priority
//!
//! A declared kind always wins. Declarations come from the custom type schema
//! at build time, or from a compiled [`TypePaths`](crate::typegraph::TypePaths)
//! index during preview. Without a declaration the value's shape decides, with
//! the predicates applied in this fixed order:
//!
//! ```text
//! 1. rich text   array whose first element is an object with a `spans` array
//! 2. link        object with a `link_type` string
//! 3. image       object with `url` and `dimensions`
//! 4. slice zone  array whose first element is an object with `slice_type`
//! 5. group       array whose first element is an object
//! 6. scalar      anything else, including empty arrays
//! ```
//!
//! Slice zones are checked before groups because a slice zone is itself an
//! array of objects. Links are checked before images because media links also
//! carry a `url`.

use crate::schema::FieldSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Semantic kind of a field, deciding which normalization applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    RichText,
    Link,
    Image,
    Group,
    SliceZone,
    Scalar,
}

impl FieldKind {
    /// Kind declared by a schema field type. Unknown types normalize as scalars.
    pub fn from_field_type(field_type: &str) -> Self {
        match field_type {
            "StructuredText" => FieldKind::RichText,
            "Link" => FieldKind::Link,
            "Image" => FieldKind::Image,
            "Group" => FieldKind::Group,
            "Slices" => FieldKind::SliceZone,
            _ => FieldKind::Scalar,
        }
    }
}

/// Classify a field value, trusting the schema entry when one is supplied.
pub fn classify(value: &Value, schema: Option<&FieldSchema>) -> FieldKind {
    match schema {
        Some(field) => FieldKind::from_field_type(&field.field_type),
        None => classify_shape(value),
    }
}

/// Classify a field value with an optional pre-resolved kind.
pub fn classify_declared(value: &Value, declared: Option<FieldKind>) -> FieldKind {
    declared.unwrap_or_else(|| classify_shape(value))
}

/// Shape-only classification, in the documented priority order.
pub fn classify_shape(value: &Value) -> FieldKind {
    if is_rich_text(value) {
        FieldKind::RichText
    } else if is_link(value) {
        FieldKind::Link
    } else if is_image(value) {
        FieldKind::Image
    } else if is_slice_zone(value) {
        FieldKind::SliceZone
    } else if is_group(value) {
        FieldKind::Group
    } else {
        FieldKind::Scalar
    }
}

fn first_object(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    value.as_array()?.first()?.as_object()
}

pub fn is_rich_text(value: &Value) -> bool {
    first_object(value).is_some_and(|block| block.get("spans").is_some_and(Value::is_array))
}

pub fn is_link(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.get("link_type").is_some_and(Value::is_string))
}

pub fn is_image(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("url") && map.contains_key("dimensions"))
}

pub fn is_slice_zone(value: &Value) -> bool {
    first_object(value).is_some_and(|entry| entry.get("slice_type").is_some_and(Value::is_string))
}

pub fn is_group(value: &Value) -> bool {
    first_object(value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(field_type: &str) -> FieldSchema {
        serde_json::from_value(json!({"type": field_type})).unwrap()
    }

    #[test]
    fn heading_block_is_rich_text() {
        let value = json!([{"type": "heading1", "text": "Hi", "spans": []}]);
        assert_eq!(classify(&value, None), FieldKind::RichText);
    }

    #[test]
    fn document_link_is_link() {
        let value = json!({"link_type": "Document", "id": "abc", "type": "page"});
        assert_eq!(classify(&value, None), FieldKind::Link);
    }

    #[test]
    fn media_link_with_url_is_link_not_image() {
        let value = json!({"link_type": "Media", "url": "https://x/y.pdf", "dimensions": null});
        assert_eq!(classify(&value, None), FieldKind::Link);
    }

    #[test]
    fn image_shape() {
        let value = json!({
            "url": "https://images.prismic.io/a.jpg",
            "dimensions": {"width": 10, "height": 20},
            "alt": null,
            "copyright": null
        });
        assert_eq!(classify(&value, None), FieldKind::Image);
    }

    #[test]
    fn slice_zone_checked_before_group() {
        let value = json!([{"slice_type": "text", "primary": {}, "items": []}]);
        assert_eq!(classify(&value, None), FieldKind::SliceZone);
    }

    #[test]
    fn array_of_records_is_group() {
        let value = json!([{"name": "a"}, {"name": "b"}]);
        assert_eq!(classify(&value, None), FieldKind::Group);
    }

    #[test]
    fn empty_array_is_scalar() {
        assert_eq!(classify(&json!([]), None), FieldKind::Scalar);
    }

    #[test]
    fn primitives_are_scalar() {
        assert_eq!(classify(&json!("text"), None), FieldKind::Scalar);
        assert_eq!(classify(&json!(42), None), FieldKind::Scalar);
        assert_eq!(classify(&json!(null), None), FieldKind::Scalar);
        assert_eq!(classify(&json!(["a", "b"]), None), FieldKind::Scalar);
    }

    #[test]
    fn schema_is_authoritative() {
        // Looks like a group, but the schema says rich text.
        let value = json!([{"name": "a"}]);
        assert_eq!(
            classify(&value, Some(&schema("StructuredText"))),
            FieldKind::RichText
        );
        // Empty array declared as a slice zone stays a slice zone.
        assert_eq!(
            classify(&json!([]), Some(&schema("Slices"))),
            FieldKind::SliceZone
        );
    }

    #[test]
    fn unknown_schema_type_is_scalar() {
        let value = json!([{"spans": []}]);
        assert_eq!(classify(&value, Some(&schema("Color"))), FieldKind::Scalar);
        assert_eq!(FieldKind::from_field_type("Mystery"), FieldKind::Scalar);
    }

    #[test]
    fn declared_kind_overrides_shape() {
        let value = json!([{"name": "a"}]);
        assert_eq!(
            classify_declared(&value, Some(FieldKind::SliceZone)),
            FieldKind::SliceZone
        );
        assert_eq!(classify_declared(&value, None), FieldKind::Group);
    }
}
