use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::locale::{resolve_with_source, LocaleMap, ResolvedFrom};

/// Entities whose fields carry localized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Commodity,
    Site,
    Gateway,
    Trade,
    Invite,
}

impl EntityKind {
    /// Returns the canonical representation stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commodity => "commodity",
            Self::Site => "site",
            Self::Gateway => "gateway",
            Self::Trade => "trade",
            Self::Invite => "invite",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityKind(pub String);

impl fmt::Display for UnknownEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEntityKind {}

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "commodity" => Ok(Self::Commodity),
            "site" => Ok(Self::Site),
            "gateway" => Ok(Self::Gateway),
            "trade" => Ok(Self::Trade),
            "invite" => Ok(Self::Invite),
            other => Err(UnknownEntityKind(other.to_string())),
        }
    }
}

/// Request-scoped context carrying the caller's active locale.
///
/// The locale is passed through as given; unsupported codes simply never
/// match a translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationContext {
    locale: String,
}

impl TranslationContext {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }
}

/// Anything able to hand out the stored [`LocaleMap`] for an entity field.
pub trait LocaleSource {
    fn locale_map(&self, kind: EntityKind, entity_id: &str, field: &str) -> Option<&LocaleMap>;
}

/// In-memory index of locale maps keyed by entity kind, id and field.
#[derive(Debug, Clone, Default)]
pub struct LocaleIndex {
    entries: HashMap<EntityKind, HashMap<String, HashMap<String, LocaleMap>>>,
}

impl LocaleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        kind: EntityKind,
        entity_id: impl Into<String>,
        field: impl Into<String>,
        map: LocaleMap,
    ) -> Option<LocaleMap> {
        self.entries
            .entry(kind)
            .or_default()
            .entry(entity_id.into())
            .or_default()
            .insert(field.into(), map)
    }

    /// Number of stored locale maps across all entities.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(|entities| entities.values())
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocaleSource for LocaleIndex {
    fn locale_map(&self, kind: EntityKind, entity_id: &str, field: &str) -> Option<&LocaleMap> {
        self.entries.get(&kind)?.get(entity_id)?.get(field)
    }
}

/// Resolves entity fields for one translation context.
#[derive(Debug)]
pub struct Translator<'a, S: ?Sized> {
    source: &'a S,
    context: &'a TranslationContext,
}

impl<'a, S: LocaleSource + ?Sized> Translator<'a, S> {
    pub fn new(source: &'a S, context: &'a TranslationContext) -> Self {
        Self { source, context }
    }

    pub fn context(&self) -> &TranslationContext {
        self.context
    }

    /// Returns the best text for `field` of the given entity, or `fallback`.
    pub fn translate_entity(
        &self,
        kind: EntityKind,
        entity_id: &str,
        field: &str,
        fallback: &str,
    ) -> String {
        self.translate_entity_with_source(kind, entity_id, field, fallback).0
    }

    /// Like [`Translator::translate_entity`], also reporting the matching tier.
    pub fn translate_entity_with_source(
        &self,
        kind: EntityKind,
        entity_id: &str,
        field: &str,
        fallback: &str,
    ) -> (String, ResolvedFrom) {
        let map = self.source.locale_map(kind, entity_id, field);
        let (text, source) = resolve_with_source(map, self.context.locale(), fallback);
        (text.to_string(), source)
    }

    /// Binds an entity kind so callers only supply id, field and fallback.
    pub fn for_kind(&self, kind: EntityKind) -> EntityTranslator<'a, S> {
        EntityTranslator {
            translator: Translator {
                source: self.source,
                context: self.context,
            },
            kind,
        }
    }
}

/// A [`Translator`] bound to a single entity kind.
#[derive(Debug)]
pub struct EntityTranslator<'a, S: ?Sized> {
    translator: Translator<'a, S>,
    kind: EntityKind,
}

impl<S: LocaleSource + ?Sized> EntityTranslator<'_, S> {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn translate(&self, entity_id: &str, field: &str, fallback: &str) -> String {
        self.translator.translate_entity(self.kind, entity_id, field, fallback)
    }
}
