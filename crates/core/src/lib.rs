//! Domain layer shared by the storage and HTTP crates.
//!
//! `locale` resolves localized text through the requested locale, English and
//! a caller default; `translate` binds that resolution to stored entity fields.
pub mod locale;
pub mod translate;

pub use locale::{resolve_text, resolve_with_source, Locale, LocaleMap, ResolvedFrom};
pub use translate::{
    EntityKind, EntityTranslator, LocaleIndex, LocaleSource, TranslationContext, Translator,
    UnknownEntityKind,
};
