use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::FirestoreConfig;
use crate::error::{Error, Result};
use crate::types::ParkingLot;

pub const PARKING_LOTS_COLLECTION: &str = "parkingLots";
pub const USERS_COLLECTION: &str = "users";

const USER_AGENT: &str = concat!("SeneParking/", env!("CARGO_PKG_VERSION"));

/// A field value in the document store's tagged-value encoding,
/// e.g. `{"integerValue": "42"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    StringValue(String),
    /// Sent as a decimal string; a bare JSON number is accepted as well.
    IntegerValue(#[serde(with = "integer_value")] i64),
    DoubleValue(f64),
    TimestampValue(String),
    BooleanValue(bool),
    NullValue(()),
    /// A value kind this client does not read (maps, arrays, geo points), or
    /// a malformed one.
    #[serde(skip)]
    Unsupported(String),
}

mod integer_value {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s.trim().parse().map_err(D::Error::custom),
        }
    }
}

/// One document as returned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Full resource name, `projects/.../documents/{collection}/{id}`.
    pub name: String,
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    /// The trailing id segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name.rsplit('/').next().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, serde_json::Value>,
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        let fields = raw
            .fields
            .into_iter()
            .map(|(key, json)| {
                let value = serde_json::from_value::<Value>(json.clone())
                    .unwrap_or_else(|_| Value::Unsupported(json.to_string()));
                (key, value)
            })
            .collect();
        Document {
            name: raw.name,
            fields,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    // Kept raw so one malformed document does not fail the whole page.
    #[serde(default)]
    documents: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

impl ListDocumentsResponse {
    fn into_documents(self) -> Vec<Document> {
        self.documents
            .into_iter()
            .filter_map(|json| match serde_json::from_value::<RawDocument>(json) {
                Ok(raw) => Some(raw.into()),
                Err(e) => {
                    tracing::debug!("Skipping malformed document: {e}");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct CreateDocumentRequest<'a> {
    fields: &'a BTreeMap<String, Value>,
}

/// The remote document database.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>>;

    async fn create_document(
        &self,
        collection: &str,
        fields: BTreeMap<String, Value>,
    ) -> Result<Document>;
}

/// Build the REST URL of a collection.
fn build_collection_url(base_url: &str, project_id: &str, collection: &str) -> String {
    format!(
        "{}/projects/{}/databases/(default)/documents/{}",
        base_url.trim_end_matches('/'),
        project_id,
        collection
    )
}

/// [`RemoteStore`] over the Firestore REST API.
pub struct FirestoreClient {
    client: Client,
    base_url: String,
    project_id: String,
}

impl FirestoreClient {
    pub fn new(config: &FirestoreConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            project_id: config.project_id.clone(),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        build_collection_url(&self.base_url, &self.project_id, collection)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Remote {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RemoteStore for FirestoreClient {
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let url = self.collection_url(collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let response = check_status(request.send().await?).await?;
            let page: ListDocumentsResponse = response.json().await?;
            let next_page_token = page.next_page_token.clone();
            documents.extend(page.into_documents());

            match next_page_token {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    tracing::warn!(collection, %token, "Page token repeated, stopping pagination");
                    break;
                }
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(collection, count = documents.len(), "Listed documents");
        Ok(documents)
    }

    async fn create_document(
        &self,
        collection: &str,
        fields: BTreeMap<String, Value>,
    ) -> Result<Document> {
        let response = self
            .client
            .post(self.collection_url(collection))
            .json(&CreateDocumentRequest { fields: &fields })
            .send()
            .await?;
        let raw: RawDocument = check_status(response).await?.json().await?;
        tracing::info!(collection, name = %raw.name, "Created document");
        Ok(raw.into())
    }
}

struct Mismatch;

/// First present, non-null value among `names`.
fn lookup<'a>(document: &'a Document, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| document.fields.get(*name))
        .find(|value| !matches!(value, Value::NullValue(())))
}

fn string_field(document: &Document, names: &[&str]) -> Result<Option<String>, Mismatch> {
    match lookup(document, names) {
        None => Ok(None),
        Some(Value::StringValue(s)) | Some(Value::TimestampValue(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Mismatch),
    }
}

fn integer_field(document: &Document, names: &[&str]) -> Result<Option<i64>, Mismatch> {
    match lookup(document, names) {
        None => Ok(None),
        Some(Value::IntegerValue(n)) => Ok(Some(*n)),
        Some(_) => Err(Mismatch),
    }
}

fn double_field(document: &Document, names: &[&str]) -> Result<Option<f64>, Mismatch> {
    match lookup(document, names) {
        None => Ok(None),
        Some(Value::DoubleValue(d)) => Ok(Some(*d)),
        Some(Value::IntegerValue(n)) => Ok(Some(*n as f64)),
        Some(_) => Err(Mismatch),
    }
}

impl ParkingLot {
    /// Map a stored document onto a lot.
    ///
    /// Fields are read by their camelCase names, falling back to the
    /// snake_case names the owner registration form writes. `None` if any
    /// present field has the wrong value type.
    pub fn from_document(document: &Document) -> Option<ParkingLot> {
        let map = || -> Result<ParkingLot, Mismatch> {
            Ok(ParkingLot {
                id: document.id().map(str::to_string),
                name: string_field(document, &["name"])?,
                latitude: double_field(document, &["latitude"])?,
                longitude: double_field(document, &["longitude"])?,
                total_spots: integer_field(document, &["totalSpots", "total_spots"])?,
                available_spots: integer_field(document, &["availableSpots", "available_spots"])?,
                available_ev_spots: integer_field(
                    document,
                    &["availableEvSpots", "available_ev_spots"],
                )?,
                address: string_field(document, &["address"])?,
                city: string_field(document, &["city"])?,
                district: string_field(document, &["district"])?,
                fare_per_day: integer_field(document, &["farePerDay", "fare_per_day"])?,
                open_time: string_field(document, &["openTime", "open_time"])?,
                close_time: string_field(document, &["closeTime", "close_time"])?,
            })
        };
        map().ok()
    }
}
