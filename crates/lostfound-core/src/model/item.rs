use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

use crate::identity;
use crate::model::user::User;

/// The five item categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronic,
    Document,
    Clothing,
    Accessory,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Self; 5] = [
        Self::Electronic,
        Self::Document,
        Self::Clothing,
        Self::Accessory,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Electronic => "electronic",
            Self::Document => "document",
            Self::Clothing => "clothing",
            Self::Accessory => "accessory",
            Self::Other => "other",
        }
    }
}

/// Whether the report describes something lost or something found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Lost,
    Found,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lost => "Lost",
            Self::Found => "Found",
        }
    }
}

/// Moderation state derived from the independent `approved`/`rejected` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Review {
    Pending,
    Approved,
    Rejected,
    /// Both flags set by the backend.
    Conflicting,
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "electronic" | "electronics" => Ok(Self::Electronic),
            "document" | "documents" => Ok(Self::Document),
            "clothing" => Ok(Self::Clothing),
            "accessory" | "accessories" => Ok(Self::Accessory),
            "other" => Ok(Self::Other),
            _ => Err(ParseEnumError {
                expected: "category",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "lost" => Ok(Self::Lost),
            "found" => Ok(Self::Found),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

/// Reference to the user who reported an item.
///
/// Some endpoints send the bare user id, others embed the whole user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerRef {
    Id(String),
    User(User),
}

impl OwnerRef {
    /// Identity of the referenced user, whichever form it arrived in.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => identity::clean(id),
            Self::User(user) => user.id.as_deref().and_then(identity::clean),
        }
    }
}

/// `extra` key holding the original object of an entry that failed decoding.
pub const UNPARSED_KEY: &str = "_unparsed";

/// One lost-or-found report.
///
/// Decoding goes through [`ItemWire`] so that `id`/`_id`, lenient enums,
/// and unknown fields all land in one canonical shape. Encoding always
/// writes `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ItemWire", rename_all = "camelCase")]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerRef>,
    pub claimed: bool,
    pub approved: bool,
    pub rejected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Fields this crate does not model, carried through unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Item {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn with_claimed(mut self, claimed: bool) -> Self {
        self.claimed = claimed;
        self
    }

    /// Canonical identity, see [`identity::identity_of`].
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        identity::identity_of(self)
    }

    #[must_use]
    pub fn owner_id(&self) -> Option<&str> {
        self.owner.as_ref().and_then(OwnerRef::id)
    }

    /// Set `claimed`. Nothing in this crate clears it again.
    pub const fn mark_claimed(&mut self) {
        self.claimed = true;
    }

    #[must_use]
    pub const fn review(&self) -> Review {
        match (self.approved, self.rejected) {
            (false, false) => Review::Pending,
            (true, false) => Review::Approved,
            (false, true) => Review::Rejected,
            (true, true) => Review::Conflicting,
        }
    }

    /// Creation time from `createdAt`, falling back to `date`.
    ///
    /// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.date.as_deref().and_then(parse_timestamp))
    }

    /// Decode one list element without ever discarding an object.
    ///
    /// Objects that fail typed decoding (e.g. `"claimed": "yes"`) are kept
    /// as opaque items: identity and title are still extracted, the original
    /// object is kept under [`UNPARSED_KEY`]. Non-object values return `None`.
    #[must_use]
    pub fn from_value_lossy(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        match serde_json::from_value::<Self>(Value::Object(map.clone())) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!(error = %err, "keeping undecodable item as opaque entry");
                Some(Self::opaque(map))
            }
        }
    }

    fn opaque(map: Map<String, Value>) -> Self {
        let id = identity::raw_identity(&map);
        let title = map
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut extra = BTreeMap::new();
        extra.insert(UNPARSED_KEY.to_string(), Value::Object(map));
        Self {
            id,
            title,
            extra,
            ..Self::default()
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Tolerant on-the-wire shape of an [`Item`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ItemWire {
    id: Option<WireId>,
    #[serde(rename = "_id")]
    underscore_id: Option<WireId>,
    title: Option<String>,
    description: Option<String>,
    location: Option<String>,
    category: Option<String>,
    status: Option<String>,
    contact: Option<String>,
    phone: Option<String>,
    image_url: Option<String>,
    owner: Option<OwnerRef>,
    claimed: Option<bool>,
    approved: Option<bool>,
    rejected: Option<bool>,
    created_at: Option<String>,
    date: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Ids arrive as strings from one backend and as numbers from another.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Text(String),
    Number(serde_json::Number),
}

impl WireId {
    pub(crate) fn into_identity(self) -> Option<String> {
        match self {
            Self::Text(text) => identity::clean(&text).map(str::to_string),
            Self::Number(number) => Some(number.to_string()),
        }
    }
}

impl From<ItemWire> for Item {
    fn from(wire: ItemWire) -> Self {
        let id = wire
            .id
            .and_then(WireId::into_identity)
            .or_else(|| wire.underscore_id.and_then(WireId::into_identity));

        Self {
            id,
            title: wire.title.unwrap_or_default(),
            description: wire.description.unwrap_or_default(),
            location: wire.location.unwrap_or_default(),
            category: wire
                .category
                .as_deref()
                .and_then(|raw| Category::from_str(raw).ok())
                .unwrap_or_default(),
            status: wire
                .status
                .as_deref()
                .and_then(|raw| Status::from_str(raw).ok()),
            contact: wire.contact,
            phone: wire.phone,
            image_url: wire.image_url,
            owner: wire.owner,
            claimed: wire.claimed.unwrap_or(false),
            approved: wire.approved.unwrap_or(false),
            rejected: wire.rejected.unwrap_or(false),
            created_at: wire.created_at,
            date: wire.date,
            extra: wire.extra,
        }
    }
}

/// User input for a new report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Reporting user, taken from the session by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl NewItem {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Materialize the draft as a pending item with a local identity.
    #[must_use]
    pub fn into_item(self, id: String, created_at: DateTime<Utc>) -> Item {
        Item {
            id: Some(id),
            title: self.title,
            description: self.description,
            location: self.location,
            category: self.category,
            status: self.status,
            contact: self.contact,
            phone: self.phone,
            image_url: self.image_url,
            owner: self.owner.map(OwnerRef::Id),
            created_at: Some(created_at.to_rfc3339()),
            ..Item::default()
        }
    }
}

/// Field-level changes for `update`.
///
/// Has no `claimed` field: that flag only moves through `claim`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<bool>,
}

impl ItemPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            item.description.clone_from(description);
        }
        if let Some(location) = &self.location {
            item.location.clone_from(location);
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(status) = self.status {
            item.status = Some(status);
        }
        if let Some(contact) = &self.contact {
            item.contact = Some(contact.clone());
        }
        if let Some(phone) = &self.phone {
            item.phone = Some(phone.clone());
        }
        if let Some(image_url) = &self.image_url {
            item.image_url = Some(image_url.clone());
        }
        if let Some(approved) = self.approved {
            item.approved = approved;
        }
        if let Some(rejected) = self.rejected {
            item.rejected = rejected;
        }
    }
}
