//! Persistence engine: model instances, their lifecycle against a
//! [`DocumentStore`](crate::store::DocumentStore), and class-level reads.

use crate::core::{Document, Result};
use crate::query::{Ids, Query};
use crate::schema::Schema;
use async_trait::async_trait;
use serde_json::Value;

mod fetch;
mod instance;
mod macros;
mod session;

pub use instance::{Instance, Lifecycle};
pub use session::Session;

/// Result of a read: one document for a single identifier, otherwise a
/// (possibly empty) list.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Fetched<T> {
    pub fn map<U, F>(self, mut f: F) -> Fetched<U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            Fetched::One(item) => Fetched::One(f(item)),
            Fetched::Many(items) => Fetched::Many(items.into_iter().map(f).collect()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Fetched::One(_) => 1,
            Fetched::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single fetched item; `None` for list results.
    pub fn one(self) -> Option<T> {
        match self {
            Fetched::One(item) => Some(item),
            Fetched::Many(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Fetched::One(item) => vec![item],
            Fetched::Many(items) => items,
        }
    }
}

/// A model type: a typed handle over an [`Instance`] of a fixed schema.
///
/// Usually implemented through [`model!`](crate::model). Per-instance
/// operations (`get`, `set`, `save`, `reload`, `rm`, ...) live on
/// [`Instance`], which model types dereference to.
#[async_trait]
pub trait Model: Sized + Send + Sync + 'static {
    fn schema() -> &'static Schema;
    fn from_instance(instance: Instance) -> Self;
    fn instance(&self) -> &Instance;
    fn instance_mut(&mut self) -> &mut Instance;

    /// A blank, unbound instance.
    fn create() -> Self {
        Self::from_instance(Instance::new(Self::schema()))
    }

    /// An unbound instance with explicitly specified fields, each validated.
    fn with_fields<I, K, V>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Instance::with_fields(Self::schema(), fields).map(Self::from_instance)
    }

    async fn get(session: &Session, query: Query) -> Result<Fetched<Self>> {
        let fetched = session.fetch(Self::schema(), &query).await?;
        Ok(fetched.map(Self::from_instance))
    }

    /// Fetches one document by identifier.
    async fn get_by_id<I>(session: &Session, id: I) -> Result<Self>
    where
        I: Into<Value> + Send,
    {
        session
            .fetch_by_id(Self::schema(), id.into())
            .await
            .map(Self::from_instance)
    }

    /// Reads projected documents and returns `handler`'s view of each,
    /// skipping model hydration for the caller.
    async fn complex<I, S, F>(
        session: &Session,
        ids: I,
        fields: S,
        handler: F,
    ) -> Result<Fetched<Document>>
    where
        I: Into<Ids> + Send,
        S: IntoIterator + Send,
        S::Item: Into<String>,
        F: Fn(Document) -> Document + Send + Sync,
    {
        let fields = fields.into_iter().map(Into::into).collect();
        session
            .fetch_complex(Self::schema(), ids.into(), fields, handler)
            .await
    }
}
