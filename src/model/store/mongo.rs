use mongodb::{
    bson::{doc, Bson, Document},
    error::Error as DbError,
    options::{FindOneOptions, IndexOptions, UpdateOptions},
    Client, Collection, Database, IndexModel,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{otp::OtpRequest, verification::Verification, vote::Vote, voter::Voter};

use super::{is_duplicate_key_error, Id, Store, StoredRecord};

/// A store backed by a MongoDB database.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect to the database at `uri` and make sure it is ready for use.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self { db })
    }

    #[cfg(test)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    fn collection(&self, kind: &str) -> Collection<Document> {
        self.db.collection(kind)
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn find_one(
        &self,
        kind: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Option<Document>> {
        let options = sort.map(|sort| FindOneOptions::builder().sort(sort).build());
        Ok(self.collection(kind).find_one(filter, options).await?)
    }

    async fn find_many(&self, kind: &str, filter: Document) -> Result<Vec<Document>> {
        Ok(self
            .collection(kind)
            .find(filter, None)
            .await?
            .try_collect()
            .await?)
    }

    async fn insert(&self, kind: &str, record: Document) -> Result<Id> {
        self.collection(kind)
            .insert_one(record, None)
            .await?
            .inserted_id
            .as_object_id()
            .map(Id::from)
            .ok_or_else(|| Error::Internal(format!("Non object ID assigned in {kind}")))
    }

    async fn update_one(&self, kind: &str, filter: Document, set: Document) -> Result<u64> {
        let update = doc! {
            "$set": set,
        };
        let result = self.collection(kind).update_one(filter, update, None).await?;
        Ok(result.matched_count)
    }

    async fn upsert(&self, kind: &str, filter: Document, set: Document) -> Result<()> {
        let update = doc! {
            "$set": set,
        };
        let options = UpdateOptions::builder().upsert(true).build();
        let collection = self.collection(kind);
        match collection
            .update_one(filter.clone(), update.clone(), options.clone())
            .await
        {
            Ok(_) => Ok(()),
            // Two concurrent upserts can both miss and both try to insert; the
            // unique index rejects the loser, whose retry then matches.
            Err(err) if is_duplicate_key_error(&err) => {
                debug!("Upsert into {kind} raced, retrying as update");
                collection.update_one(filter, update, options).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn count(&self, kind: &str, filter: Document) -> Result<u64> {
        Ok(self.collection(kind).count_documents(filter, None).await?)
    }

    async fn group_count(&self, kind: &str, key: &str) -> Result<Vec<(Bson, u64)>> {
        let pipeline = [
            doc! {
                "$group": {
                    "_id": format!("${key}"),
                    "count": { "$sum": 1 },
                    "first": { "$min": "$_id" },
                }
            },
            // Generated object IDs increase with insertion, so this orders
            // groups by their first-inserted record.
            doc! {
                "$sort": { "first": 1 },
            },
        ];
        let groups: Vec<Document> = self
            .collection(kind)
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;
        groups
            .into_iter()
            .map(|group| {
                let count = match group.get("count") {
                    Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
                    Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
                    other => {
                        return Err(Error::Internal(format!(
                            "Unexpected group count {other:?} in {kind}"
                        )))
                    }
                };
                let key = group.get("_id").cloned().unwrap_or(Bson::Null);
                Ok((key, count))
            })
            .collect()
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        let mut names = self.db.list_collection_names(None).await?;
        names.sort();
        Ok(names)
    }
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> std::result::Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    let unique_aadhaar = IndexModel::builder()
        .keys(doc! {"aadhaar": 1})
        .options(unique)
        .build();

    // One voter, one verification record and one vote per aadhaar.
    for name in [Voter::NAME, Verification::NAME, Vote::NAME] {
        db.collection::<Document>(name)
            .create_index(unique_aadhaar.clone(), None)
            .await?;
    }

    // OTP lookups select the newest matching request.
    let otp_index = IndexModel::builder()
        .keys(doc! {"aadhaar": 1, "otp": 1, "created_at": -1})
        .build();
    db.collection::<Document>(OtpRequest::NAME)
        .create_index(otp_index, None)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{
        aadhaar::Aadhaar,
        store::{Coll, StoreHandle},
        verification::{mark_verified, VerificationStep},
    };

    #[backend_test(mongo)]
    async fn filters_match_equality_and_missing_as_null(store: StoreHandle) {
        store
            .insert("things", doc! { "name": "a", "colour": "red" })
            .await
            .unwrap();
        store.insert("things", doc! { "name": "b" }).await.unwrap();

        let red = store
            .find_many("things", doc! { "colour": "red" })
            .await
            .unwrap();
        assert_eq!(1, red.len());
        assert_eq!(Some("a"), red[0].get_str("name").ok());

        let uncoloured = store
            .find_many("things", doc! { "colour": Bson::Null })
            .await
            .unwrap();
        assert_eq!(1, uncoloured.len());
        assert_eq!(Some("b"), uncoloured[0].get_str("name").ok());
    }

    #[backend_test(mongo)]
    async fn find_one_honours_sort_direction(store: StoreHandle) {
        for n in [2, 7, 4] {
            store.insert("numbers", doc! { "n": n }).await.unwrap();
        }

        let highest = store
            .find_one("numbers", doc! {}, Some(doc! { "n": -1 }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(7, highest.get_i32("n").unwrap());

        let lowest = store
            .find_one("numbers", doc! {}, Some(doc! { "n": 1 }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(2, lowest.get_i32("n").unwrap());
    }

    #[backend_test(mongo)]
    async fn conditional_update_reports_matches(store: StoreHandle) {
        let id = store
            .insert("flags", doc! { "set": false })
            .await
            .unwrap();

        let filter = doc! { "_id": id, "set": false };
        let set = doc! { "set": true };
        assert_eq!(1, store.update_one("flags", filter.clone(), set.clone()).await.unwrap());
        assert_eq!(0, store.update_one("flags", filter, set).await.unwrap());
        assert_eq!(1, store.count("flags", doc! { "set": true }).await.unwrap());
    }

    #[backend_test(mongo)]
    async fn upsert_inserts_once_then_updates(store: StoreHandle) {
        store
            .upsert("marks", doc! { "key": "k" }, doc! { "a": 1 })
            .await
            .unwrap();
        store
            .upsert("marks", doc! { "key": "k" }, doc! { "b": 2 })
            .await
            .unwrap();

        let records = store.find_many("marks", doc! {}).await.unwrap();
        assert_eq!(1, records.len());
        assert_eq!(1, records[0].get_i32("a").unwrap());
        assert_eq!(2, records[0].get_i32("b").unwrap());
    }

    #[backend_test(mongo)]
    async fn racing_upserts_leave_one_record(verifications: Coll<Verification>) {
        let aadhaar = Aadhaar::from("111122223333");

        let tasks = (0..8)
            .map(|n| {
                let verifications = verifications.clone();
                let aadhaar = aadhaar.clone();
                let step = if n % 2 == 0 {
                    VerificationStep::Otp
                } else {
                    VerificationStep::Face
                };
                rocket::tokio::spawn(async move {
                    mark_verified(&verifications, &aadhaar, step, Utc::now()).await
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(1, verifications.count(aadhaar.as_doc()).await.unwrap());
        let record = verifications.find_one(aadhaar.as_doc()).await.unwrap().unwrap();
        assert!(record.is_complete());
    }

    #[backend_test(mongo)]
    async fn group_count_keeps_first_seen_order(store: StoreHandle) {
        for key in ["x", "y", "x", "z", "x"] {
            store.insert("tags", doc! { "key": key }).await.unwrap();
        }

        let groups = store.group_count("tags", "key").await.unwrap();
        assert_eq!(
            vec![
                (Bson::String("x".to_string()), 3),
                (Bson::String("y".to_string()), 1),
                (Bson::String("z".to_string()), 1),
            ],
            groups
        );
    }

    #[backend_test(mongo)]
    async fn one_vote_per_aadhaar(store: StoreHandle) {
        store
            .insert(Vote::NAME, doc! { "aadhaar": "111122223333" })
            .await
            .unwrap();
        let second = store
            .insert(Vote::NAME, doc! { "aadhaar": "111122223333" })
            .await;
        assert!(matches!(second, Err(Error::Db(_))), "{second:?}");
        assert_eq!(1, store.count(Vote::NAME, doc! {}).await.unwrap());
    }
}
