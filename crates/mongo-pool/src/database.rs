//! Database and collection handles.
//!
//! These carry no pooling semantics of their own. A [`Database`] is a
//! connection paired with the configured database name; a [`Collection`]
//! adds a collection name resolved from a literal or from a Rust type.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::connection::Connection;

/// Anything that names a collection.
///
/// Implemented for string types (the name is used verbatim) and for
/// [`Typed`] placeholders (the name is the type's own name).
pub trait CollectionName {
    /// The collection name.
    fn collection_name(&self) -> Cow<'_, str>;
}

impl CollectionName for str {
    fn collection_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl CollectionName for String {
    fn collection_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl CollectionName for Cow<'_, str> {
    fn collection_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_ref())
    }
}

impl<T: CollectionName + ?Sized> CollectionName for &T {
    fn collection_name(&self) -> Cow<'_, str> {
        (**self).collection_name()
    }
}

/// Placeholder naming a collection after the type `T`.
///
/// `Typed::<blog::Post>::new()` resolves to `"Post"`. Module path and
/// generic arguments are dropped.
pub struct Typed<T: ?Sized>(PhantomData<fn() -> T>);

impl<T: ?Sized> Typed<T> {
    /// Placeholder for `T`.
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }

    /// Placeholder for the type of `value`.
    #[must_use]
    pub fn of(_value: &T) -> Self {
        Self(PhantomData)
    }
}

impl<T: ?Sized> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Typed<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Typed<T> {}

impl<T: ?Sized> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Typed").field(&short_type_name::<T>()).finish()
    }
}

impl<T: ?Sized> CollectionName for Typed<T> {
    fn collection_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(short_type_name::<T>())
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .trim_start_matches(['&', '*'])
        .trim_start_matches("mut ")
        .trim_start_matches("const ")
}

/// A connection scoped to one database.
pub struct Database<S> {
    connection: Connection<S>,
    name: Arc<str>,
}

impl<S> Database<S> {
    pub(crate) fn new(connection: Connection<S>, name: Arc<str>) -> Self {
        Self { connection, name }
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pooled connection backing this handle.
    #[must_use]
    pub fn connection(&self) -> &Connection<S> {
        &self.connection
    }

    /// Give up the handle, keeping the connection for release.
    #[must_use]
    pub fn into_connection(self) -> Connection<S> {
        self.connection
    }

    /// Resolve a collection in this database.
    pub fn collection(&self, target: impl CollectionName) -> Collection<S> {
        Collection {
            database: self.clone(),
            name: target.collection_name().into_owned(),
        }
    }
}

impl<S> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            name: Arc::clone(&self.name),
        }
    }
}

impl<S> fmt::Debug for Database<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("connection", &self.connection)
            .finish()
    }
}

/// A collection within a [`Database`].
pub struct Collection<S> {
    database: Database<S>,
    name: String,
}

impl<S> Collection<S> {
    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `database.collection`, the form drivers use for namespaces.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database.name(), self.name)
    }

    /// The owning database handle.
    #[must_use]
    pub fn database(&self) -> &Database<S> {
        &self.database
    }

    /// The pooled connection backing this handle.
    #[must_use]
    pub fn connection(&self) -> &Connection<S> {
        self.database.connection()
    }
}

impl<S> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            name: self.name.clone(),
        }
    }
}

impl<S> fmt::Debug for Collection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("namespace", &self.namespace())
            .field("connection", self.connection())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod blog {
        pub struct Post;
        pub struct Page<T>(pub T);
    }

    fn database() -> Database<()> {
        Database::new(Connection::new((), true), Arc::from("foodblog"))
    }

    #[test]
    fn test_literal_names() {
        let db = database();
        assert_eq!(db.collection("recipes").name(), "recipes");
        assert_eq!(db.collection(String::from("users")).name(), "users");
    }

    #[test]
    fn test_typed_name_strips_module_path() {
        let db = database();
        assert_eq!(db.collection(Typed::<blog::Post>::new()).name(), "Post");
    }

    #[test]
    fn test_typed_name_strips_generics() {
        let page = blog::Page(blog::Post);
        assert_eq!(Typed::of(&page).collection_name(), "Page");
        assert_eq!(Typed::<&blog::Post>::new().collection_name(), "Post");
    }

    #[test]
    fn test_namespace_and_connection_sharing() {
        let db = database();
        let recipes = db.collection("recipes");
        assert_eq!(recipes.namespace(), "foodblog.recipes");
        assert!(recipes.connection().same_as(db.connection()));
        assert_eq!(recipes.database().name(), "foodblog");
    }
}
