//! Centralized type naming for generated nodes and schema types.
//!
//! Content-time node creation ([`slices`](crate::slices), [`document`](crate::document))
//! and schema-time type compilation ([`typegraph`](crate::typegraph)) must agree
//! on every type name, otherwise the external query layer cannot bind a node to
//! its type. Both sides build names exclusively through [`TypePath`].
//!
//! ## Naming scheme
//!
//! Every name is the concatenation of PascalCase segments:
//!
//! ```text
//! document          Prismic + Page                       → PrismicPage
//! group field       PrismicPage + Gallery + GroupType    → PrismicPageGalleryGroupType
//! slice zone union  PrismicPage + Body + SlicesType      → PrismicPageBodySlicesType
//! slice node        PrismicPage + Body + Text            → PrismicPageBodyText
//! slice primary     PrismicPageBodyText + PrimaryType    → PrismicPageBodyTextPrimaryType
//! slice items       PrismicPageBodyText + ItemType       → PrismicPageBodyTextItemType
//! ```
//!
//! Field paths never include list indices, so every entry of a group or slice
//! zone maps to the same type regardless of its position.

/// Convert an API identifier to PascalCase.
///
/// Splits on any non-alphanumeric character and upper-cases the first letter of
/// each piece. Existing capitals inside a piece are kept:
/// - `"blog_post"` → `"BlogPost"`
/// - `"text-block"` → `"TextBlock"`
/// - `"heroBanner"` → `"HeroBanner"`
pub fn pascal_case(input: &str) -> String {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            let mut chars = piece.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Convert an identifier to camelCase (PascalCase with a lower-case first letter).
///
/// Used to derive the root query key of a node type: `"PrismicPage"` → `"prismicPage"`.
pub fn camel_case(input: &str) -> String {
    let pascal = pascal_case(input);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Document node type name for a custom type: `("Prismic", "blog_post")` → `"PrismicBlogPost"`.
pub fn document_type_name(prefix: &str, custom_type: &str) -> String {
    format!("{}{}", pascal_case(prefix), pascal_case(custom_type))
}

/// Position of a field inside the type that owns it.
///
/// `owner` is the name of the nearest type that becomes its own object in the
/// graph (a document node, a slice's primary record, a slice's item record).
/// `segments` are the field keys walked from that owner, without list indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePath {
    pub owner: String,
    pub segments: Vec<String>,
}

impl TypePath {
    /// Start a path at an owning type.
    pub fn root(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            segments: Vec::new(),
        }
    }

    /// Descend into a field.
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Self {
            owner: self.owner.clone(),
            segments,
        }
    }

    /// Owner name followed by every segment in PascalCase.
    pub fn base_name(&self) -> String {
        let mut name = self.owner.clone();
        for segment in &self.segments {
            name.push_str(&pascal_case(segment));
        }
        name
    }

    /// Dotted form of the segments, e.g. `body.primary.title`.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// Object type for the entries of a group field at this path.
    pub fn group_type(&self) -> String {
        format!("{}GroupType", self.base_name())
    }

    /// Union type for the slice zone at this path.
    pub fn slices_union(&self) -> String {
        format!("{}SlicesType", self.base_name())
    }

    /// Node type for one slice variant of the slice zone at this path.
    pub fn slice_node(&self, slice_type: &str) -> String {
        format!("{}{}", self.base_name(), pascal_case(slice_type))
    }
}

/// Object type holding a slice's non-repeatable fields.
pub fn slice_primary_type(slice_node_type: &str) -> String {
    format!("{slice_node_type}PrimaryType")
}

/// Object type holding one entry of a slice's repeatable fields.
pub fn slice_item_type(slice_node_type: &str) -> String {
    format!("{slice_node_type}ItemType")
}

/// Owner name used for fields nested inside a slice's primary record.
pub fn slice_primary_owner(slice_node_type: &str) -> String {
    format!("{slice_node_type}Primary")
}

/// Owner name used for fields nested inside a slice's item records.
pub fn slice_items_owner(slice_node_type: &str) -> String {
    format!("{slice_node_type}Items")
}

/// Object type wrapping a document's `data` record.
pub fn data_type(document_type: &str) -> String {
    format!("{document_type}DataType")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case_snake() {
        assert_eq!(pascal_case("blog_post"), "BlogPost");
    }

    #[test]
    fn pascal_case_kebab_and_spaces() {
        assert_eq!(pascal_case("text-block"), "TextBlock");
        assert_eq!(pascal_case("call to action"), "CallToAction");
    }

    #[test]
    fn pascal_case_keeps_inner_capitals() {
        assert_eq!(pascal_case("heroBanner"), "HeroBanner");
    }

    #[test]
    fn pascal_case_empty() {
        assert_eq!(pascal_case(""), "");
        assert_eq!(pascal_case("__"), "");
    }

    #[test]
    fn camel_case_from_type_name() {
        assert_eq!(camel_case("PrismicPage"), "prismicPage");
        assert_eq!(camel_case("prismic_blog_post"), "prismicBlogPost");
    }

    #[test]
    fn document_type_name_prefixes() {
        assert_eq!(document_type_name("Prismic", "page"), "PrismicPage");
        assert_eq!(document_type_name("prismic", "blog_post"), "PrismicBlogPost");
    }

    #[test]
    fn slice_node_names_are_distinct_per_variant() {
        let zone = TypePath::root("PrismicPage").child("body");
        assert_eq!(zone.slice_node("text"), "PrismicPageBodyText");
        assert_eq!(zone.slice_node("quote"), "PrismicPageBodyQuote");
        assert_eq!(zone.slices_union(), "PrismicPageBodySlicesType");
    }

    #[test]
    fn group_type_uses_full_path() {
        let path = TypePath::root("PrismicPage").child("team").child("links");
        assert_eq!(path.group_type(), "PrismicPageTeamLinksGroupType");
        assert_eq!(path.dotted(), "team.links");
    }

    #[test]
    fn slice_record_types() {
        assert_eq!(
            slice_primary_type("PrismicPageBodyText"),
            "PrismicPageBodyTextPrimaryType"
        );
        assert_eq!(
            slice_item_type("PrismicPageBodyText"),
            "PrismicPageBodyTextItemType"
        );
        assert_eq!(data_type("PrismicPage"), "PrismicPageDataType");
    }
}
