//! Typed per-language message catalog.
//!
//! Templates are validated once at load time: every supported language must
//! cover every key with the same placeholder set, so a missing translation
//! or a renamed placeholder fails startup instead of a user interaction.

use crate::gate::locale::{DEFAULT_LANG, SUPPORTED_LANGS};
use lazy_regex::lazy_regex;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Match `{name}` placeholders inside a template.
static RE_PLACEHOLDER: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\{([a-z_]+)\}");

/// Every user-facing message the gate can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    /// Caption of the UI card.
    Welcome,
    /// Label of the share button.
    ShareButton,
    /// Label of the exclusive-channel button.
    ChannelButton,
    /// Label of the ACCESS button.
    AccessButton,
    /// Alert shown while the gate is still locked.
    AccessLocked,
    /// Message sent once the gate unlocks.
    AccessUnlocked,
    /// Notification to a referrer when a share lands.
    ShareProgress,
    /// Confirmation after a language press.
    LanguageSet,
    /// Confirmation after a vote press.
    VoteRecorded,
    /// Answer when a vote no longer fits the poll.
    VoteRejected,
}

impl MessageKey {
    /// All keys, for load-time validation.
    pub const ALL: &'static [Self] = &[
        Self::Welcome,
        Self::ShareButton,
        Self::ChannelButton,
        Self::AccessButton,
        Self::AccessLocked,
        Self::AccessUnlocked,
        Self::ShareProgress,
        Self::LanguageSet,
        Self::VoteRecorded,
        Self::VoteRejected,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::ShareButton => "share_button",
            Self::ChannelButton => "channel_button",
            Self::AccessButton => "access_button",
            Self::AccessLocked => "access_locked",
            Self::AccessUnlocked => "access_unlocked",
            Self::ShareProgress => "share_progress",
            Self::LanguageSet => "language_set",
            Self::VoteRecorded => "vote_recorded",
            Self::VoteRejected => "vote_rejected",
        }
    }
}

const EN: &[(MessageKey, &str)] = &[
    (
        MessageKey::Welcome,
        "Share with your friends to unlock exclusive access.",
    ),
    (MessageKey::ShareButton, "{count}/{goal} SHARE"),
    (MessageKey::ChannelButton, "Exclusive channel"),
    (MessageKey::AccessButton, "ACCESS"),
    (MessageKey::AccessLocked, "Shares {count}/{goal}\n{bar}"),
    (MessageKey::AccessUnlocked, "Access unlocked! Welcome in."),
    (MessageKey::ShareProgress, "+1 share! {count}/{goal}\n{bar}"),
    (MessageKey::LanguageSet, "Language saved."),
    (MessageKey::VoteRecorded, "Vote recorded."),
    (MessageKey::VoteRejected, "That option is no longer available."),
];

const RU: &[(MessageKey, &str)] = &[
    (
        MessageKey::Welcome,
        "Поделись с друзьями, чтобы открыть эксклюзивный доступ.",
    ),
    (MessageKey::ShareButton, "{count}/{goal} SHARE"),
    (MessageKey::ChannelButton, "Эксклюзивный канал"),
    (MessageKey::AccessButton, "ДОСТУП"),
    (MessageKey::AccessLocked, "Репосты {count}/{goal}\n{bar}"),
    (MessageKey::AccessUnlocked, "Доступ открыт! Добро пожаловать."),
    (MessageKey::ShareProgress, "+1 репост! {count}/{goal}\n{bar}"),
    (MessageKey::LanguageSet, "Язык сохранён."),
    (MessageKey::VoteRecorded, "Голос учтён."),
    (MessageKey::VoteRejected, "Этот вариант больше недоступен."),
];

const ES: &[(MessageKey, &str)] = &[
    (
        MessageKey::Welcome,
        "Comparte con tus amigos para desbloquear el acceso exclusivo.",
    ),
    (MessageKey::ShareButton, "{count}/{goal} COMPARTIR"),
    (MessageKey::ChannelButton, "Canal exclusivo"),
    (MessageKey::AccessButton, "ACCESO"),
    (MessageKey::AccessLocked, "Compartidos {count}/{goal}\n{bar}"),
    (MessageKey::AccessUnlocked, "¡Acceso desbloqueado! Bienvenido."),
    (MessageKey::ShareProgress, "¡+1 compartido! {count}/{goal}\n{bar}"),
    (MessageKey::LanguageSet, "Idioma guardado."),
    (MessageKey::VoteRecorded, "Voto registrado."),
    (MessageKey::VoteRejected, "Esa opción ya no está disponible."),
];

fn table(lang: &str) -> &'static [(MessageKey, &'static str)] {
    match lang {
        "en" => EN,
        "ru" => RU,
        "es" => ES,
        _ => &[],
    }
}

/// Catalog validation failure; a build defect, not a runtime condition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// A supported language misses a template.
    #[error("language {lang} has no template for {key}")]
    MissingTemplate { lang: &'static str, key: &'static str },
    /// A translation drifted from the reference placeholder set.
    #[error("template {key} in {lang} expects placeholders [{expected}], found [{found}]")]
    PlaceholderMismatch {
        lang: &'static str,
        key: &'static str,
        expected: String,
        found: String,
    },
}

fn placeholders(template: &str) -> BTreeSet<String> {
    RE_PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Validated message catalog; one per process.
pub struct Catalog {
    templates: HashMap<MessageKey, HashMap<&'static str, &'static str>>,
}

impl Catalog {
    /// Build and validate the catalog.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogError` when any supported language misses a key or
    /// disagrees with the default language's placeholders.
    pub fn load() -> Result<Self, CatalogError> {
        let mut templates: HashMap<MessageKey, HashMap<&'static str, &'static str>> =
            HashMap::new();
        for &lang in SUPPORTED_LANGS {
            for &(key, template) in table(lang) {
                templates.entry(key).or_default().insert(lang, template);
            }
        }

        for &key in MessageKey::ALL {
            let by_lang = templates.get(&key);
            let reference = by_lang
                .and_then(|langs| langs.get(DEFAULT_LANG))
                .ok_or(CatalogError::MissingTemplate {
                    lang: DEFAULT_LANG,
                    key: key.as_str(),
                })?;
            let expected = placeholders(reference);

            for &lang in SUPPORTED_LANGS {
                let template = by_lang.and_then(|langs| langs.get(lang)).ok_or(
                    CatalogError::MissingTemplate {
                        lang,
                        key: key.as_str(),
                    },
                )?;
                let found = placeholders(template);
                if found != expected {
                    return Err(CatalogError::PlaceholderMismatch {
                        lang,
                        key: key.as_str(),
                        expected: join(&expected),
                        found: join(&found),
                    });
                }
            }
        }

        Ok(Self { templates })
    }

    /// Render `key` in `lang`, substituting `{name}` placeholders from
    /// `args`. Unknown languages fall back to the default language.
    #[must_use]
    pub fn render(&self, lang: &str, key: MessageKey, args: &[(&str, String)]) -> String {
        let template = self
            .templates
            .get(&key)
            .and_then(|langs| langs.get(lang).or_else(|| langs.get(DEFAULT_LANG)))
            .copied()
            .unwrap_or_default();

        let mut output = template.to_string();
        for (name, value) in args {
            output = output.replace(&format!("{{{name}}}"), value);
        }
        output
    }
}
