use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a record as the backend hands it out: usually an integer, but
/// string keys are accepted unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| Self::Text(value.to_string()))
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(id) => Self::Int(id),
            Err(_) => Self::Text(s.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    People,
    Planets,
}

impl Resource {
    pub const ALL: [Resource; 2] = [Resource::People, Resource::Planets];

    /// Path segment under the API base, also used as the insight `entity_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::People => "people",
            Self::Planets => "planets",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            Self::People => "person",
            Self::Planets => "planet",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown resource '{0}' (expected 'people' or 'planets')")]
pub struct UnknownResource(pub String);

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "people" => Ok(Self::People),
            "planets" => Ok(Self::Planets),
            other => Err(UnknownResource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A row type served by one of the collection endpoints.
pub trait Record: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Partial payload accepted by the update endpoint.
    type Update: Serialize + DeserializeOwned + Default + fmt::Debug + Send + Sync + 'static;

    const RESOURCE: Resource;
    const FILTER_FIELDS: &'static [&'static str];
    const SORT_FIELDS: &'static [&'static str];

    fn id(&self) -> &RecordId;
    fn name(&self) -> &str;
    /// Named attributes in display order, `name` first.
    fn attributes(&self) -> Vec<(&'static str, Option<&str>)>;

    fn is_filterable(field: &str) -> bool {
        Self::FILTER_FIELDS.contains(&field)
    }

    fn is_sortable(field: &str) -> bool {
        Self::SORT_FIELDS.contains(&field)
    }
}

/// Attribute values arrive as strings in the reference dataset, but some
/// deployments emit bare numbers for measurements.
mod attribute {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Raw>::deserialize(deserializer)?;
        Ok(raw.map(|raw| match raw {
            Raw::Text(value) => value,
            Raw::Int(value) => value.to_string(),
            Raw::Float(value) => value.to_string(),
            Raw::Bool(value) => value.to_string(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: RecordId,
    pub name: String,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub height: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub mass: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub hair_color: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub skin_color: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub eye_color: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub birth_year: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hair_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eye_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl Record for Person {
    type Update = PersonUpdate;

    const RESOURCE: Resource = Resource::People;
    const FILTER_FIELDS: &'static [&'static str] = &[
        "name",
        "height",
        "mass",
        "hair_color",
        "skin_color",
        "eye_color",
        "birth_year",
        "gender",
    ];
    const SORT_FIELDS: &'static [&'static str] = Self::FILTER_FIELDS;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("name", Some(self.name.as_str())),
            ("height", self.height.as_deref()),
            ("mass", self.mass.as_deref()),
            ("hair_color", self.hair_color.as_deref()),
            ("skin_color", self.skin_color.as_deref()),
            ("eye_color", self.eye_color.as_deref()),
            ("birth_year", self.birth_year.as_deref()),
            ("gender", self.gender.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id: RecordId,
    pub name: String,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub diameter: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub rotation_period: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub orbital_period: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub gravity: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub population: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub climate: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub terrain: Option<String>,
    #[serde(default, deserialize_with = "attribute::deserialize")]
    pub surface_water: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanetUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbital_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_water: Option<String>,
}

impl Record for Planet {
    type Update = PlanetUpdate;

    const RESOURCE: Resource = Resource::Planets;
    const FILTER_FIELDS: &'static [&'static str] = &[
        "name",
        "diameter",
        "rotation_period",
        "orbital_period",
        "gravity",
        "population",
        "climate",
        "terrain",
        "surface_water",
    ];
    const SORT_FIELDS: &'static [&'static str] = Self::FILTER_FIELDS;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("name", Some(self.name.as_str())),
            ("diameter", self.diameter.as_deref()),
            ("rotation_period", self.rotation_period.as_deref()),
            ("orbital_period", self.orbital_period.as_deref()),
            ("gravity", self.gravity.as_deref()),
            ("population", self.population.as_deref()),
            ("climate", self.climate.as_deref()),
            ("terrain", self.terrain.as_deref()),
            ("surface_water", self.surface_water.as_deref()),
        ]
    }
}
