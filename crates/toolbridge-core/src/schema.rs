//! Tool input schemas and the union-collapsing normalizer.
//!
//! Some LLM backends reject JSON Schema unions (`anyOf`) in function
//! declarations. [`normalize_schema`] rewrites the top-level properties of a
//! tool's input schema so each one declares a single concrete `type`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node of a JSON-Schema-like tree.
///
/// Only the keywords the normalizer reasons about are lifted into fields.
/// Everything else (`description`, `default`, `enum`, `required`, ...) is kept
/// in `keywords` and written back unchanged. Subschemas that are not objects
/// (`true`, `false`) are carried as [`SchemaNode::Raw`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum SchemaNode {
    Scalar(ScalarNode),
    Object(ObjectNode),
    Union(UnionNode),
    Raw(Value),
}

/// A node with at most one declared type and no `properties`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarNode {
    pub ty: Option<String>,
    /// Item schema for `type: array`.
    pub items: Option<Box<SchemaNode>>,
    pub keywords: Map<String, Value>,
}

/// A node carrying a `properties` mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectNode {
    pub properties: BTreeMap<String, SchemaNode>,
    pub keywords: Map<String, Value>,
}

/// An `anyOf` node: an ordered list of alternatives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnionNode {
    pub any_of: Vec<SchemaNode>,
    pub keywords: Map<String, Value>,
}

impl SchemaNode {
    /// The single type this node declares, if it can be determined.
    ///
    /// A union reports the type of its first alternative.
    #[must_use]
    pub fn type_name(&self) -> Option<String> {
        match self {
            Self::Scalar(scalar) => scalar.ty.clone(),
            Self::Object(object) => Some(
                object
                    .keywords
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("object")
                    .to_string(),
            ),
            Self::Union(union) => union.any_of.first().and_then(Self::type_name),
            Self::Raw(_) => None,
        }
    }

    /// Top-level properties, when this node is an object.
    #[must_use]
    pub fn properties(&self) -> Option<&BTreeMap<String, SchemaNode>> {
        match self {
            Self::Object(object) => Some(&object.properties),
            _ => None,
        }
    }

    /// Whether any top-level property is still a union.
    #[must_use]
    pub fn has_union_property(&self) -> bool {
        self.properties()
            .is_some_and(|props| props.values().any(|p| matches!(p, Self::Union(_))))
    }
}

impl TryFrom<Value> for SchemaNode {
    type Error = String;

    /// Parse a root schema. Only the root has to be an object; anything
    /// below it that is not understood is kept verbatim.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err("schema must be a JSON object".to_string());
        }
        Ok(Self::parse(value))
    }
}

impl SchemaNode {
    fn parse(value: Value) -> Self {
        let Value::Object(mut keywords) = value else {
            return Self::Raw(value);
        };

        match keywords.remove("anyOf") {
            Some(Value::Array(alternatives)) => {
                let any_of = alternatives.into_iter().map(Self::parse).collect();
                return Self::Union(UnionNode { any_of, keywords });
            }
            Some(other) => {
                keywords.insert("anyOf".to_string(), other);
            }
            None => {}
        }

        match keywords.remove("properties") {
            Some(Value::Object(properties)) => {
                let properties = properties
                    .into_iter()
                    .map(|(name, node)| (name, Self::parse(node)))
                    .collect();
                return Self::Object(ObjectNode {
                    properties,
                    keywords,
                });
            }
            Some(other) => {
                keywords.insert("properties".to_string(), other);
            }
            None => {}
        }

        let ty = match keywords.remove("type") {
            Some(Value::String(ty)) => Some(ty),
            // `type: [..]` and other shapes are left for the backend to judge.
            Some(other) => {
                keywords.insert("type".to_string(), other);
                None
            }
            None => None,
        };

        let items = match keywords.remove("items") {
            Some(items @ Value::Object(_)) => Some(Box::new(Self::parse(items))),
            Some(other) => {
                keywords.insert("items".to_string(), other);
                None
            }
            None => None,
        };

        Self::Scalar(ScalarNode {
            ty,
            items,
            keywords,
        })
    }
}

impl From<SchemaNode> for Value {
    fn from(node: SchemaNode) -> Self {
        match node {
            SchemaNode::Scalar(scalar) => {
                let mut map = scalar.keywords;
                if let Some(ty) = scalar.ty {
                    map.insert("type".to_string(), Value::String(ty));
                }
                if let Some(items) = scalar.items {
                    map.insert("items".to_string(), Value::from(*items));
                }
                Value::Object(map)
            }
            SchemaNode::Object(object) => {
                let mut map = object.keywords;
                let properties = object
                    .properties
                    .into_iter()
                    .map(|(name, node)| (name, Value::from(node)))
                    .collect();
                map.insert("properties".to_string(), Value::Object(properties));
                Value::Object(map)
            }
            SchemaNode::Union(union) => {
                let mut map = union.keywords;
                let any_of = union.any_of.into_iter().map(Value::from).collect();
                map.insert("anyOf".to_string(), Value::Array(any_of));
                Value::Object(map)
            }
            SchemaNode::Raw(value) => value,
        }
    }
}

/// Rewrite every top-level union property of `schema` into a single-typed
/// scalar. Nested objects are not visited.
///
/// The first alternative wins. An array alternative collapses to its item
/// type, dropping the array wrapper: `anyOf: [{type: array, items: {type:
/// string}}, {type: null}]` becomes `type: string`. This is lossy; a tool that
/// accepted a list now advertises a single value.
///
/// Applying this to a schema without union properties changes nothing.
pub fn normalize_schema(schema: &mut SchemaNode) {
    let SchemaNode::Object(object) = schema else {
        return;
    };

    for node in object.properties.values_mut() {
        if let SchemaNode::Union(union) = node {
            let collapsed = collapse_union(std::mem::take(union));
            *node = SchemaNode::Scalar(collapsed);
        }
    }
}

fn collapse_union(union: UnionNode) -> ScalarNode {
    let ty = union.any_of.first().and_then(|first| match first {
        SchemaNode::Scalar(ScalarNode {
            ty: Some(ty),
            items,
            ..
        }) if ty == "array" => match items {
            Some(items) => items.type_name(),
            // Nothing to collapse to; keep the array.
            None => Some(ty.clone()),
        },
        other => other.type_name(),
    });

    let mut keywords = union.keywords;
    keywords.remove("type");

    ScalarNode {
        ty,
        items: None,
        keywords,
    }
}
