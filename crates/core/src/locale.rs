use std::fmt;

use serde::{Deserialize, Serialize};

/// Locale code used as the last localized fallback before the caller's default.
pub const CANONICAL_LOCALE: Locale = Locale::En;

/// Locales the dashboard ships translations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    He,
    Ar,
    Th,
}

impl Locale {
    pub const ALL: [Locale; 4] = [Self::En, Self::He, Self::Ar, Self::Th];

    /// Parses a locale code. Codes outside the supported set yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Self::En),
            "he" => Some(Self::He),
            "ar" => Some(Self::Ar),
            "th" => Some(Self::Th),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::He => "he",
            Self::Ar => "ar",
            Self::Th => "th",
        }
    }

    /// Returns `true` for right-to-left scripts.
    pub fn is_rtl(self) -> bool {
        matches!(self, Self::He | Self::Ar)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text direction for a requested locale code. Unknown codes render left-to-right.
pub fn direction_for(code: &str) -> &'static str {
    match Locale::from_code(code) {
        Some(locale) if locale.is_rtl() => "rtl",
        _ => "ltr",
    }
}

/// Per-field translations keyed by supported locale.
///
/// Values are stored exactly as provided; blank values are only treated as
/// absent when resolving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocaleMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub he: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub th: Option<String>,
}

impl LocaleMap {
    pub fn get(&self, locale: Locale) -> Option<&str> {
        match locale {
            Locale::En => self.en.as_deref(),
            Locale::He => self.he.as_deref(),
            Locale::Ar => self.ar.as_deref(),
            Locale::Th => self.th.as_deref(),
        }
    }

    /// Looks up an arbitrary locale code; unsupported codes have no entry.
    pub fn lookup(&self, code: &str) -> Option<&str> {
        Locale::from_code(code).and_then(|locale| self.get(locale))
    }

    pub fn set(&mut self, locale: Locale, value: impl Into<String>) {
        let slot = match locale {
            Locale::En => &mut self.en,
            Locale::He => &mut self.he,
            Locale::Ar => &mut self.ar,
            Locale::Th => &mut self.th,
        };
        *slot = Some(value.into());
    }

    pub fn with(mut self, locale: Locale, value: impl Into<String>) -> Self {
        self.set(locale, value);
        self
    }

    /// Returns `true` when no locale carries a non-blank value.
    pub fn is_blank(&self) -> bool {
        Locale::ALL
            .iter()
            .all(|locale| non_blank(self.get(*locale)).is_none())
    }
}

/// Which tier of the fallback chain produced a resolved text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedFrom {
    Requested,
    Canonical,
    Fallback,
}

impl ResolvedFrom {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Canonical => "canonical",
            Self::Fallback => "fallback",
        }
    }
}

/// Resolves localized text: requested locale, then `en`, then `fallback`.
///
/// Whitespace-only values count as missing, but a matching value is returned
/// untrimmed.
pub fn resolve_text<'a>(
    locale_map: Option<&'a LocaleMap>,
    requested: &str,
    fallback: &'a str,
) -> &'a str {
    resolve_with_source(locale_map, requested, fallback).0
}

/// Same as [`resolve_text`] but also reports the tier that matched.
pub fn resolve_with_source<'a>(
    locale_map: Option<&'a LocaleMap>,
    requested: &str,
    fallback: &'a str,
) -> (&'a str, ResolvedFrom) {
    let Some(map) = locale_map else {
        return (fallback, ResolvedFrom::Fallback);
    };

    if let Some(text) = non_blank(map.lookup(requested)) {
        return (text, ResolvedFrom::Requested);
    }

    if let Some(text) = non_blank(map.get(CANONICAL_LOCALE)) {
        return (text, ResolvedFrom::Canonical);
    }

    (fallback, ResolvedFrom::Fallback)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}
