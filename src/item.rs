//! Schema-checked scraped items.
//!
//! Every item belongs to an [`ItemSchema`] that fixes the set of keys it may
//! hold. Fields are read and written by key only.
//!
//! ```rust
//! use spider_engine::item::{Item, ItemSchema};
//!
//! static ARTICLE: ItemSchema = ItemSchema::new("Article", &["title", "url"]);
//!
//! let mut article = Item::new(&ARTICLE);
//! article.set("title", "Hello").unwrap();
//! assert!(article.set("author", "me").is_err());
//! assert_eq!(article.get("title").unwrap().and_then(|v| v.as_str()), Some("Hello"));
//! assert!(article.get("author").is_err());
//! ```

use crate::error::SpiderError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The declared shape of one kind of item.
#[derive(Debug, PartialEq, Eq)]
pub struct ItemSchema {
    name: &'static str,
    fields: &'static [&'static str],
}

impl ItemSchema {
    /// Declares a schema named `name` with the given field names.
    pub const fn new(name: &'static str, fields: &'static [&'static str]) -> Self {
        ItemSchema { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// True if `key` is one of the declared fields.
    pub fn declares(&self, key: &str) -> bool {
        self.fields.contains(&key)
    }
}

/// A scraped record whose keys are restricted to its schema.
#[derive(Clone, Serialize)]
pub struct Item {
    #[serde(skip)]
    schema: &'static ItemSchema,
    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

impl Item {
    /// Creates an item with no field set.
    pub fn new(schema: &'static ItemSchema) -> Self {
        Item {
            schema,
            values: BTreeMap::new(),
        }
    }

    /// Builds an item from key/value pairs, failing on the first undeclared key.
    pub fn from_pairs<I, K, V>(schema: &'static ItemSchema, pairs: I) -> Result<Self, SpiderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut item = Item::new(schema);
        for (key, value) in pairs {
            item.set(key, value)?;
        }
        Ok(item)
    }

    pub fn schema(&self) -> &'static ItemSchema {
        self.schema
    }

    fn check(&self, key: &str) -> Result<(), SpiderError> {
        if self.schema.declares(key) {
            Ok(())
        } else {
            Err(SpiderError::Schema {
                item: self.schema.name,
                key: key.to_string(),
            })
        }
    }

    /// Sets a declared field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), SpiderError> {
        let key = key.into();
        self.check(&key)?;
        self.values.insert(key, value.into());
        Ok(())
    }

    /// Returns the value of a declared field, `None` if it was never set.
    ///
    /// Reading a key the schema does not declare is a `SpiderError::Schema`.
    pub fn get(&self, key: &str) -> Result<Option<&Value>, SpiderError> {
        self.check(key)?;
        Ok(self.values.get(key))
    }

    /// Clears a declared field and returns its previous value.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, SpiderError> {
        self.check(key)?;
        Ok(self.values.remove(key))
    }

    /// Iterates over the fields that are set, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields that are set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The set fields as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
        )
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.schema.name)
            .field("values", &self.values)
            .finish()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.schema.name, self.to_json())
    }
}
