//! Value objects for the partnership domain.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PartnershipError;

/// Identifier of the brand side of a partnership.
///
/// Brands are owned by another service; this is only a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrandId(Uuid);

impl BrandId {
    /// Creates a new random brand ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a brand ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BrandId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BrandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for BrandId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier of the partner side (affiliate, influencer, ...) of a partnership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(Uuid);

impl PartnerId {
    /// Creates a new random partner ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a partner ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PartnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PartnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PartnerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Kind of relationship between the two parties. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartnershipType {
    #[serde(rename = "marca_afiliado")]
    BrandAffiliate,
    #[serde(rename = "marca_influencer")]
    BrandInfluencer,
    #[serde(rename = "marca_embajador")]
    BrandAmbassador,
    #[serde(rename = "marca_socio_b2b")]
    BrandB2bPartner,
    #[serde(rename = "afiliado_influencer")]
    AffiliateInfluencer,
    #[serde(rename = "influencer_embajador")]
    InfluencerAmbassador,
}

impl PartnershipType {
    pub const ALL: [PartnershipType; 6] = [
        PartnershipType::BrandAffiliate,
        PartnershipType::BrandInfluencer,
        PartnershipType::BrandAmbassador,
        PartnershipType::BrandB2bPartner,
        PartnershipType::AffiliateInfluencer,
        PartnershipType::InfluencerAmbassador,
    ];

    /// Returns the wire value of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnershipType::BrandAffiliate => "marca_afiliado",
            PartnershipType::BrandInfluencer => "marca_influencer",
            PartnershipType::BrandAmbassador => "marca_embajador",
            PartnershipType::BrandB2bPartner => "marca_socio_b2b",
            PartnershipType::AffiliateInfluencer => "afiliado_influencer",
            PartnershipType::InfluencerAmbassador => "influencer_embajador",
        }
    }
}

impl FromStr for PartnershipType {
    type Err = PartnershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PartnershipError::UnknownPartnershipType(s.to_string()))
    }
}

impl std::fmt::Display for PartnershipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier of an active partnership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PartnershipLevel {
    #[default]
    #[serde(rename = "bronce")]
    Bronze,
    #[serde(rename = "plata")]
    Silver,
    #[serde(rename = "oro")]
    Gold,
    #[serde(rename = "platino")]
    Platinum,
    #[serde(rename = "diamante")]
    Diamond,
}

impl PartnershipLevel {
    pub const ALL: [PartnershipLevel; 5] = [
        PartnershipLevel::Bronze,
        PartnershipLevel::Silver,
        PartnershipLevel::Gold,
        PartnershipLevel::Platinum,
        PartnershipLevel::Diamond,
    ];

    /// Returns the wire value of this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnershipLevel::Bronze => "bronce",
            PartnershipLevel::Silver => "plata",
            PartnershipLevel::Gold => "oro",
            PartnershipLevel::Platinum => "platino",
            PartnershipLevel::Diamond => "diamante",
        }
    }
}

impl FromStr for PartnershipLevel {
    type Err = PartnershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| PartnershipError::UnknownLevel(s.to_string()))
    }
}

impl std::fmt::Display for PartnershipLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
