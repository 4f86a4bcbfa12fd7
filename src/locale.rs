use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ja,
    En,
}

/// Keys for every user-facing string the service and the terminal stage print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    SituationRequired,
    SituationTooLong,
    PersonaIdsRequired,
    LocaleRequired,
    NoValidPersonas,
    InvalidBody,
    GenerationFailed,
    GhostsDidNotAppear,
    Timeout,
    NetworkError,
    Loading,
    ErrorTitle,
    RetryHint,
    Appears,
    ConversationOver,
    Title,
    SituationPlaceholder,
    Submit,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::Ja => "ja",
            Locale::En => "en",
        }
    }

    pub fn text(self, key: Text) -> &'static str {
        match self {
            Locale::Ja => ja(key),
            Locale::En => en(key),
        }
    }
}

fn ja(key: Text) -> &'static str {
    match key {
        Text::SituationRequired => "シチュエーションが必要です",
        Text::SituationTooLong => "最大500文字まで入力できます",
        Text::PersonaIdsRequired => "ペルソナIDが必要です",
        Text::LocaleRequired => "有効なロケールが必要です",
        Text::NoValidPersonas => "有効なペルソナが見つかりません",
        Text::InvalidBody => "リクエストの形式が正しくありません",
        Text::GenerationFailed => "会話の生成に失敗しました",
        Text::GhostsDidNotAppear => "お化けたちが現れませんでした。もう一度お試しください。",
        Text::Timeout => "タイムアウトしました。もう一度お試しください。",
        Text::NetworkError => "ネットワークエラーが発生しました。接続を確認してください。",
        Text::Loading => "会話を生成中...",
        Text::ErrorTitle => "エラー",
        Text::RetryHint => "もう一度試すには、同じコマンドを再実行してください。",
        Text::Appears => "が現れた！",
        Text::ConversationOver => "会話はここまで。",
        Text::Title => "ゴーストチャット",
        Text::SituationPlaceholder => "シチュエーションを入力してください...",
        Text::Submit => "お化けを呼ぶ",
    }
}

fn en(key: Text) -> &'static str {
    match key {
        Text::SituationRequired => "A situation is required",
        Text::SituationTooLong => "The situation can be at most 500 characters",
        Text::PersonaIdsRequired => "Persona IDs are required",
        Text::LocaleRequired => "A valid locale is required",
        Text::NoValidPersonas => "No valid personas were found",
        Text::InvalidBody => "The request body is malformed",
        Text::GenerationFailed => "Failed to generate the conversation",
        Text::GhostsDidNotAppear => "The ghosts did not appear. Please try again.",
        Text::Timeout => "The request timed out. Please try again.",
        Text::NetworkError => "A network error occurred. Please check your connection.",
        Text::Loading => "Generating conversation...",
        Text::ErrorTitle => "Error",
        Text::RetryHint => "Run the same command again to retry.",
        Text::Appears => " appears!",
        Text::ConversationOver => "The conversation is over.",
        Text::Title => "Ghost Chat",
        Text::SituationPlaceholder => "Describe a situation...",
        Text::Submit => "Summon the ghosts",
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ja" => Ok(Locale::Ja),
            "en" => Ok(Locale::En),
            other => Err(format!("unsupported locale '{}'", other)),
        }
    }
}
