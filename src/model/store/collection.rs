use std::marker::PhantomData;

use mongodb::bson::{from_document, to_document, Bson, Document};
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    State,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

use super::{Id, StoreHandle};

/// A type that can be directly inserted/read to/from the store.
pub trait StoredRecord {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A typed view of one collection in the store.
pub struct Coll<T> {
    store: StoreHandle,
    _record: PhantomData<fn() -> T>,
}

impl<T> Coll<T>
where
    T: StoredRecord,
{
    /// Get a handle on this collection in the given store.
    pub fn from_store(store: &StoreHandle) -> Self {
        Self {
            store: store.clone(),
            _record: PhantomData,
        }
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.find_one_sorted(filter, None).await
    }

    pub async fn find_one_sorted(
        &self,
        filter: Document,
        sort: impl Into<Option<Document>>,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let record = self.store.find_one(T::NAME, filter, sort.into()).await?;
        Ok(record.map(from_document::<T>).transpose()?)
    }

    pub async fn find(&self, filter: Document) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.store
            .find_many(T::NAME, filter)
            .await?
            .into_iter()
            .map(|record| from_document::<T>(record).map_err(Into::into))
            .collect()
    }

    pub async fn insert_one(&self, record: &T) -> Result<Id>
    where
        T: Serialize,
    {
        self.store.insert(T::NAME, to_document(record)?).await
    }

    /// Returns the number of records matched, so callers can use the filter
    /// as a compare-and-set guard.
    pub async fn update_one(&self, filter: Document, set: Document) -> Result<u64> {
        self.store.update_one(T::NAME, filter, set).await
    }

    pub async fn update_by_id(&self, id: Id, set: Document) -> Result<u64> {
        self.update_one(id.as_doc(), set).await
    }

    pub async fn upsert(&self, filter: Document, set: Document) -> Result<()> {
        self.store.upsert(T::NAME, filter, set).await
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.store.count(T::NAME, filter).await
    }

    pub async fn group_count(&self, key: &str) -> Result<Vec<(Bson, u64)>> {
        self.store.group_count(T::NAME, key).await
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: StoredRecord,
{
    type Error = ();

    /// Get the store from the managed state and wrap it in a collection.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<StoreHandle>>().await {
            request::Outcome::Success(store) => request::Outcome::Success(Coll::from_store(store)),
            _ => {
                error!("No record store is managed by this instance");
                request::Outcome::Failure((Status::InternalServerError, ()))
            }
        }
    }
}
