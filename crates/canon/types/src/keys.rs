//! Logical truth keys.
//!
//! A `TruthKey` names one logical data domain: a named domain, a market
//! data series, or a versioned indicator definition. The registry holds at
//! most one active canonical store per key.

use serde::{Deserialize, Serialize};

/// Sampling frequency of a market data series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Tick,
    Minute,
    Hourly,
    Daily,
    Weekly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tick => write!(f, "tick"),
            Self::Minute => write!(f, "minute"),
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

/// Price type of a market data series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Trade,
    Bid,
    Ask,
    Mid,
    Settlement,
}

impl std::fmt::Display for PriceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trade => write!(f, "trade"),
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
            Self::Mid => write!(f, "mid"),
            Self::Settlement => write!(f, "settlement"),
        }
    }
}

/// Category of a registered domain; drives the allowed contract options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainCategory {
    MarketData,
    Indicators,
    Decisions,
    Research,
    Operations,
}

impl std::fmt::Display for DomainCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarketData => write!(f, "market-data"),
            Self::Indicators => write!(f, "indicators"),
            Self::Decisions => write!(f, "decisions"),
            Self::Research => write!(f, "research"),
            Self::Operations => write!(f, "operations"),
        }
    }
}

/// Logical key of one data domain.
///
/// The three key spaces are disjoint: a domain name, a
/// (asset, frequency, price type, listing) series, or an
/// (indicator, version, method) definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TruthKey {
    Domain {
        name: String,
    },
    Series {
        asset: String,
        frequency: Frequency,
        price_type: PriceType,
        listing: String,
    },
    Indicator {
        name: String,
        version: String,
        method: String,
    },
}

impl TruthKey {
    pub fn domain(name: impl Into<String>) -> Self {
        Self::Domain { name: name.into() }
    }

    pub fn series(
        asset: impl Into<String>,
        frequency: Frequency,
        price_type: PriceType,
        listing: impl Into<String>,
    ) -> Self {
        Self::Series {
            asset: asset.into(),
            frequency,
            price_type,
            listing: listing.into(),
        }
    }

    pub fn indicator(
        name: impl Into<String>,
        version: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self::Indicator {
            name: name.into(),
            version: version.into(),
            method: method.into(),
        }
    }
}

impl std::fmt::Display for TruthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain { name } => write!(f, "domain:{name}"),
            Self::Series {
                asset,
                frequency,
                price_type,
                listing,
            } => write!(f, "series:{asset}:{frequency}:{price_type}:{listing}"),
            Self::Indicator {
                name,
                version,
                method,
            } => write!(f, "indicator:{name}:{version}:{method}"),
        }
    }
}
