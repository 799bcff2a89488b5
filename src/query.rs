//! Struct-to-query conversion through explicit, per-type schemas.
//!
//! A type opts in by implementing [`QueryFields`], naming the query key of
//! each field it exposes. The schema is built once per type and kept in a
//! process-wide, append-only cache keyed by [`TypeId`].
//!
//! ```
//! use chainreq::{QueryFields, QuerySchemaBuilder};
//!
//! struct Search {
//!     keyword: String,
//!     page: u32,
//!     tags: Vec<String>,
//! }
//!
//! impl QueryFields for Search {
//!     fn query_fields(schema: &mut QuerySchemaBuilder<Self>) {
//!         schema
//!             .field("keyword", "q", |search| search.keyword.clone())
//!             .field("page", "page", |search| search.page)
//!             .field("tags", "tag", |search| search.tags.clone());
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::error::Error;

pub trait ToQueryValues {
    fn to_query_values(&self) -> Vec<String>;
}

impl ToQueryValues for str {
    fn to_query_values(&self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl ToQueryValues for String {
    fn to_query_values(&self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl ToQueryValues for bool {
    fn to_query_values(&self) -> Vec<String> {
        vec![if *self { "true" } else { "false" }.to_owned()]
    }
}

macro_rules! impl_integer_query_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToQueryValues for $ty {
                fn to_query_values(&self) -> Vec<String> {
                    vec![self.to_string()]
                }
            }
        )*
    };
}

impl_integer_query_values!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl<T> ToQueryValues for &T
where
    T: ToQueryValues + ?Sized,
{
    fn to_query_values(&self) -> Vec<String> {
        (**self).to_query_values()
    }
}

impl<T: ToQueryValues> ToQueryValues for Option<T> {
    fn to_query_values(&self) -> Vec<String> {
        self.as_ref()
            .map(ToQueryValues::to_query_values)
            .unwrap_or_default()
    }
}

impl<T: ToQueryValues> ToQueryValues for [T] {
    fn to_query_values(&self) -> Vec<String> {
        self.iter().flat_map(ToQueryValues::to_query_values).collect()
    }
}

impl<T: ToQueryValues, const N: usize> ToQueryValues for [T; N] {
    fn to_query_values(&self) -> Vec<String> {
        self.as_slice().to_query_values()
    }
}

impl<T: ToQueryValues> ToQueryValues for Vec<T> {
    fn to_query_values(&self) -> Vec<String> {
        self.as_slice().to_query_values()
    }
}

/// Declares which fields of `Self` become query parameters.
pub trait QueryFields: Sized + 'static {
    fn query_fields(schema: &mut QuerySchemaBuilder<Self>);
}

type FieldReader<T> = Box<dyn Fn(&T) -> Vec<String> + Send + Sync>;

struct QueryField<T> {
    name: &'static str,
    key: &'static str,
    read: FieldReader<T>,
}

pub struct QuerySchemaBuilder<T> {
    fields: Vec<QueryField<T>>,
}

impl<T> QuerySchemaBuilder<T> {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Maps the field called `name` to the query key `key`.
    pub fn field<V, F>(&mut self, name: &'static str, key: &'static str, read: F) -> &mut Self
    where
        V: ToQueryValues,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.fields.push(QueryField {
            name,
            key,
            read: Box::new(move |value: &T| read(value).to_query_values()),
        });
        self
    }

    fn build(self) -> Result<QuerySchema<T>, Error> {
        let type_name = std::any::type_name::<T>();
        let mut seen = HashMap::new();
        for field in &self.fields {
            if field.key.is_empty() {
                return Err(Error::InvalidQuerySchema {
                    type_name,
                    message: format!("field {} has an empty query key", field.name),
                });
            }
            if let Some(previous) = seen.insert(field.key, field.name) {
                return Err(Error::InvalidQuerySchema {
                    type_name,
                    message: format!(
                        "fields {previous} and {} both map to query key {}",
                        field.name, field.key
                    ),
                });
            }
        }
        Ok(QuerySchema {
            fields: self.fields,
        })
    }
}

pub struct QuerySchema<T> {
    fields: Vec<QueryField<T>>,
}

impl<T> QuerySchema<T> {
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.key)
    }

    pub fn to_pairs(&self, value: &T) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for field in &self.fields {
            for item in (field.read)(value) {
                pairs.push((field.key.to_owned(), item));
            }
        }
        pairs
    }
}

type SchemaEntry<T> = Result<Arc<QuerySchema<T>>, Error>;

static SCHEMA_CACHE: LazyLock<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

fn cached_entry<T: QueryFields>() -> Option<SchemaEntry<T>> {
    let cache = SCHEMA_CACHE.read().unwrap_or_else(PoisonError::into_inner);
    cache
        .get(&TypeId::of::<T>())
        .and_then(|entry| entry.downcast_ref::<SchemaEntry<T>>())
        .cloned()
}

/// Returns the cached schema for `T`, deriving it on first use.
///
/// A malformed schema is cached as well, so every later lookup reports the
/// same error without re-running [`QueryFields::query_fields`].
pub fn query_schema<T: QueryFields>() -> Result<Arc<QuerySchema<T>>, Error> {
    if let Some(entry) = cached_entry::<T>() {
        return entry;
    }

    let mut builder = QuerySchemaBuilder::new();
    T::query_fields(&mut builder);
    let built: SchemaEntry<T> = builder.build().map(Arc::new);

    let mut cache = SCHEMA_CACHE.write().unwrap_or_else(PoisonError::into_inner);
    let entry = cache
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Arc::new(built) as Arc<dyn Any + Send + Sync>);
    entry
        .downcast_ref::<SchemaEntry<T>>()
        .cloned()
        .unwrap_or_else(|| {
            Err(Error::InvalidQuerySchema {
                type_name: std::any::type_name::<T>(),
                message: "schema cache entry has an unexpected type".to_owned(),
            })
        })
}

pub fn query_pairs<T: QueryFields>(value: &T) -> Result<Vec<(String, String)>, Error> {
    Ok(query_schema::<T>()?.to_pairs(value))
}
