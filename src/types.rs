use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A price stored as integer cents and rendered with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Price(pub i64);

impl Price {
    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal().to_string())
    }
}

/// Accepts both `"777.77"` and `777.77`. Numbers go through their JSON text form
/// so no binary float rounding leaks into the value.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let text = match &raw {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => return Err(de::Error::custom("A valid number is required.")),
    };
    Decimal::from_str(&text).map_err(|_| de::Error::custom("A valid number is required."))
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_decimal(deserializer).map(Some)
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A reader of a book, i.e. any user holding a relation to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderDto {
    pub first_name: String,
    pub last_name: String,
}

/// A book as returned by the list and detail endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BookDto {
    pub id: i64,
    pub name: String,
    pub price: Price,
    pub author_name: String,
    pub owner_name: String,
    pub annotated_likes: i64,
    /// Mean of all ratings, two decimal places; `null` when unrated.
    pub rating: Option<String>,
    pub readers_book: Vec<ReaderDto>,
}

/// Body of `POST /book/` and `PUT /book/{id}/`.
///
/// Unknown keys (notably `owner`) are accepted and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BookWrite {
    pub name: String,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub price: Decimal,
    pub author_name: String,
}

/// Body of `PATCH /book/{id}/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub author_name: Option<String>,
}

/// Validated column values for a book write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub author_name: Option<String>,
}

/// Query string of `GET /book/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookListQuery {
    pub price: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// Body of `PATCH /book-relation/{book_id}/`.
///
/// `rating: null` clears the rating, an absent key leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationPatch {
    #[serde(default)]
    pub like: Option<bool>,
    #[serde(default)]
    pub in_bookmarks: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub rating: Option<Option<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDto {
    pub book: i64,
    pub like: bool,
    pub in_bookmarks: bool,
    pub rating: Option<i64>,
}
